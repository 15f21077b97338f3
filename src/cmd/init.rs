//! `imagegate init`: generate a starter configuration file.
//!
//! Writes the built-in defaults (both upstream endpoints and the login
//! settings) in YAML, JSON, or TOML so they can be edited in place.
//! Credentials are never written; they come from the environment.

use std::path::PathBuf;

use crate::cli::{ConfigFormat, InitArgs};
use crate::config::model::Config;
use crate::error::GatewayError;

const HEADER: &str = "# imagegate config\n\
    # Credentials are read from NOVELAI_USERNAME / NOVELAI_PASSWORD and\n\
    # caller tokens from SERVER_TOKENS; they do not belong in this file.\n\n";

pub fn execute(args: &InitArgs) -> Result<(), GatewayError> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("imagegate.{}", args.format.extension())));

    if output.exists() {
        return Err(GatewayError::FileExists { path: output });
    }

    let content = render(&Config::default(), &args.format)?;
    std::fs::write(&output, content)?;
    println!("Created {}", output.display());
    Ok(())
}

/// Serialize `config` in `format`, with a comment header where the format
/// allows one.
pub fn render(config: &Config, format: &ConfigFormat) -> Result<String, GatewayError> {
    match format {
        #[cfg(feature = "yaml")]
        ConfigFormat::Yaml => serde_yml::to_string(config)
            .map(|body| format!("{HEADER}{body}"))
            .map_err(|e| GatewayError::Io(std::io::Error::other(e.to_string()))),

        #[cfg(not(feature = "yaml"))]
        ConfigFormat::Yaml => Err(GatewayError::UnsupportedFormat("yaml".into())),

        ConfigFormat::Json => serde_json::to_string_pretty(config)
            .map(|body| body + "\n")
            .map_err(|e| GatewayError::Io(std::io::Error::other(e.to_string()))),

        #[cfg(feature = "toml")]
        ConfigFormat::Toml => toml::to_string_pretty(config)
            .map(|body| format!("{HEADER}{body}"))
            .map_err(|e| GatewayError::Io(std::io::Error::other(e.to_string()))),

        #[cfg(not(feature = "toml"))]
        ConfigFormat::Toml => Err(GatewayError::UnsupportedFormat("toml".into())),
    }
}
