//! Serde data structures for the imagegate configuration file.
//!
//! Contains [`Config`] (the root), [`Endpoint`], and [`UpstreamSettings`].
//! All types derive `Serialize` and `Deserialize` with
//! `deny_unknown_fields` for strict parsing. Secrets (account password,
//! caller tokens) are deliberately absent: they come from the CLI or the
//! environment only.

use serde::{Deserialize, Serialize};

pub const OCTET_STREAM: &str = "binary/octet-stream";
pub const ZIP_ARCHIVE: &str = "application/x-zip-compressed";

const DEFAULT_LOGIN_URL: &str = "https://api.novelai.net/user/login";
const DEFAULT_ORIGIN: &str = "https://novelai.net";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

fn default_endpoints() -> Vec<Endpoint> {
    vec![
        Endpoint {
            name: "api".into(),
            url: "https://api.novelai.net".into(),
            accept: ZIP_ARCHIVE.into(),
        },
        Endpoint {
            name: "image".into(),
            url: "https://image.novelai.net".into(),
            accept: OCTET_STREAM.into(),
        },
    ]
}

fn default_login_url() -> String {
    DEFAULT_LOGIN_URL.into()
}

fn default_origin() -> String {
    DEFAULT_ORIGIN.into()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.into()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<Endpoint>,

    #[serde(default)]
    pub upstream: UpstreamSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            upstream: UpstreamSettings::default(),
        }
    }
}

/// One upstream service address plus the media type it is asked for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Endpoint {
    pub name: String,
    pub url: String,
    pub accept: String,
}

impl Endpoint {
    /// Absolute upstream URL for an inbound path (query included).
    #[must_use]
    pub fn url_for(&self, path_and_query: &str) -> String {
        format!("{}{}", self.url.trim_end_matches('/'), path_and_query)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamSettings {
    #[serde(default = "default_login_url")]
    pub login_url: String,

    /// Sent as both `Origin` and `Referer`.
    #[serde(default = "default_origin")]
    pub origin: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            login_url: default_login_url(),
            origin: default_origin(),
            user_agent: default_user_agent(),
        }
    }
}
