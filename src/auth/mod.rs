//! Authentication on both sides of the proxy.
//!
//! - [`allow_list`] -- inbound: which caller bearer tokens are accepted.
//! - [`key`] -- derivation of the upstream login key from account credentials.
//! - [`credentials`] -- outbound: the upstream access token and its refresh.

pub mod allow_list;
pub mod credentials;
pub mod key;

pub use allow_list::AllowList;
pub use credentials::{Account, CredentialManager};
