//! Login key derivation.
//!
//! The upstream expects a key computed from the account credentials:
//!
//! ```text
//! password[..6 chars] + username + suffix ─► BLAKE2b-128 ─► salt
//!                                                            │
//! password ─────────────────────────► Argon2id(t=2, m=1953 KiB, p=1) ─► 64 bytes
//!                                                            │
//!                               URL-safe base64, first 64 characters ◄─┘
//! ```
//!
//! Every parameter is part of the login protocol; changing any of them
//! produces a key the upstream rejects.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use blake2::digest::consts::U16;
use blake2::{Blake2b, Digest};

use crate::error::GatewayError;

const DOMAIN_SUFFIX: &str = "novelai_data_access_key";
const PASSWORD_PREFIX_CHARS: usize = 6;

const TIME_COST: u32 = 2;
/// `2_000_000 / 1024`, truncated.
const MEMORY_COST_KIB: u32 = 1953;
const PARALLELISM: u32 = 1;
const HASH_LEN: usize = 64;

/// Length of the derived key in characters.
pub const KEY_LENGTH: usize = 64;

type Blake2b128 = Blake2b<U16>;

/// Derive the upstream login key for an account.
pub fn derive_key(username: &str, password: &str) -> Result<String, GatewayError> {
    derive_key_with_suffix(username, password, DOMAIN_SUFFIX)
}

fn derive_key_with_suffix(
    username: &str,
    password: &str,
    suffix: &str,
) -> Result<String, GatewayError> {
    let prefix: String = password.chars().take(PASSWORD_PREFIX_CHARS).collect();
    let salt = Blake2b128::digest(format!("{prefix}{username}{suffix}").as_bytes());

    let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, Some(HASH_LEN))
        .map_err(|e| GatewayError::KeyDerivation(e.to_string()))?;
    let mut raw = [0u8; HASH_LEN];
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(password.as_bytes(), &salt, &mut raw)
        .map_err(|e| GatewayError::KeyDerivation(e.to_string()))?;

    let mut key = URL_SAFE.encode(raw);
    key.truncate(KEY_LENGTH);
    Ok(key)
}
