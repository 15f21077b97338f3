//! Configuration loading and validation.
//!
//! [`load`] resolves the config file (explicit path, auto-detected file in
//! the working directory, or built-in defaults), parses it according to its
//! extension with [`parse_config_str`], and validates it. Submodules provide
//! the data model and validation logic.

pub mod model;
pub mod validation;

use std::path::{Path, PathBuf};

use crate::error::GatewayError;
use model::Config;

const CANDIDATES: [&str; 4] = [
    "imagegate.yaml",
    "imagegate.yml",
    "imagegate.json",
    "imagegate.toml",
];

/// Parse a config string based on file extension.
pub fn parse_config_str(
    ext: &str,
    content: &str,
    path_display: &str,
) -> Result<Config, GatewayError> {
    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => serde_yml::from_str(content).map_err(|e| GatewayError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "json")]
        "json" => serde_json::from_str(content).map_err(|e| GatewayError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "toml")]
        "toml" => toml::from_str(content).map_err(|e| GatewayError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        other => Err(GatewayError::UnsupportedFormat(other.to_string())),
    }
}

/// Read, parse, and validate one config file.
pub async fn load_file(path: &Path) -> Result<Config, GatewayError> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            GatewayError::ConfigFileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            GatewayError::Io(e)
        }
    })?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let config = parse_config_str(ext, &content, &path.display().to_string())?;

    validation::validate(&config).map_err(|errors| GatewayError::ConfigValidation { errors })?;
    Ok(config)
}

/// Resolve the effective configuration.
///
/// Returns the config plus a label naming where it came from.
pub async fn load(explicit: Option<&Path>) -> Result<(Config, String), GatewayError> {
    if let Some(path) = explicit {
        let config = load_file(path).await?;
        return Ok((config, path.display().to_string()));
    }

    for name in &CANDIDATES {
        let path = PathBuf::from(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::info!(path = %path.display(), "auto-detected config file");
            let config = load_file(&path).await?;
            return Ok((config, path.display().to_string()));
        }
    }

    Ok((Config::default(), "built-in defaults".to_string()))
}
