//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a parsed [`Config`] for structural
//! errors: missing or duplicate endpoints, malformed upstream URLs, and
//! values that cannot be sent as HTTP header values. Returns a list of
//! [`ValidationError`] values with per-field suggestions.

use http::HeaderValue;
use url::Url;

use super::model::Config;
use crate::error::ValidationError;

/// Validate an upstream base URL. Returns `Ok(())` or a human-readable error.
pub fn validate_base_url(url: &str) -> Result<(), String> {
    let parsed = validate_http_url(url)?;
    if parsed.query().is_some() {
        return Err("base URL must not carry a query string".into());
    }
    Ok(())
}

fn validate_http_url(url: &str) -> Result<Url, String> {
    match Url::parse(url) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            if scheme == "http" || scheme == "https" {
                Ok(parsed)
            } else {
                Err(format!(
                    "unsupported scheme '{scheme}' (expected http or https)"
                ))
            }
        }
        Err(_) => Err(format!("'{url}' is not a valid URL")),
    }
}

/// Check that a configured string can be sent verbatim as a header value.
pub fn validate_header_value(value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err("value cannot be empty".into());
    }
    HeaderValue::from_str(value)
        .map(|_| ())
        .map_err(|_| format!("'{value}' is not a valid header value"))
}

pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let upstream = &config.upstream;
    if let Err(msg) = validate_http_url(&upstream.login_url) {
        errors.push(ValidationError {
            scope: "upstream".into(),
            field: "login_url".into(),
            message: msg,
            suggestion: None,
        });
    }
    for (field, value) in [
        ("origin", &upstream.origin),
        ("user_agent", &upstream.user_agent),
    ] {
        if let Err(msg) = validate_header_value(value) {
            errors.push(ValidationError {
                scope: "upstream".into(),
                field: field.into(),
                message: msg,
                suggestion: None,
            });
        }
    }

    if config.endpoints.is_empty() {
        errors.push(ValidationError {
            scope: "(root)".into(),
            field: "endpoints".into(),
            message: "at least one endpoint must be defined".into(),
            suggestion: Some("remove the 'endpoints' key to use the built-in pair".into()),
        });
        return Err(errors);
    }

    let mut seen_names = std::collections::HashSet::new();

    for (i, endpoint) in config.endpoints.iter().enumerate() {
        let scope = if endpoint.name.is_empty() {
            format!("endpoints[{i}]")
        } else {
            format!("endpoint {}", endpoint.name)
        };

        if endpoint.name.trim().is_empty() {
            errors.push(ValidationError {
                scope: scope.clone(),
                field: "name".into(),
                message: "name cannot be empty".into(),
                suggestion: None,
            });
        } else if !seen_names.insert(endpoint.name.as_str()) {
            errors.push(ValidationError {
                scope: scope.clone(),
                field: "name".into(),
                message: "duplicate endpoint name".into(),
                suggestion: None,
            });
        }

        if let Err(msg) = validate_base_url(&endpoint.url) {
            errors.push(ValidationError {
                scope: scope.clone(),
                field: "url".into(),
                message: msg,
                suggestion: if endpoint.url.contains("://") {
                    None
                } else {
                    Some(format!("did you mean 'https://{}'?", endpoint.url))
                },
            });
        }

        if let Err(msg) = validate_header_value(&endpoint.accept) {
            errors.push(ValidationError {
                scope,
                field: "accept".into(),
                message: msg,
                suggestion: None,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[must_use]
pub fn format_validation_report(path: &str, config: &Config) -> String {
    let mut lines = vec![format!("  {} endpoints\n", config.endpoints.len())];

    for endpoint in &config.endpoints {
        lines.push(format!("  {}  -> {}", endpoint.name, endpoint.url));
        lines.push(format!("    accept: {}", endpoint.accept));
    }
    lines.push(format!("\n  login: {}", config.upstream.login_url));

    format!("{} is valid\n{}", path, lines.join("\n"))
}
