//! Caller-facing bearer token allow-list.

use std::collections::HashSet;

use crate::error::CallError;

/// Tokens accepted in the inbound `Authorization: Bearer <token>` header.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    tokens: HashSet<String>,
}

impl AllowList {
    /// Parse a comma-delimited list. Entries are trimmed; empty ones dropped.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        Self {
            tokens: raw
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect(),
        }
    }

    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Check a raw `Authorization` header value.
    pub fn authorize(&self, header: Option<&str>) -> Result<(), CallError> {
        let token = header
            .and_then(|value| value.trim().split_once(' '))
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
            .map(|(_, token)| token.trim())
            .filter(|token| !token.is_empty());

        match token {
            Some(token) if self.contains(token) => Ok(()),
            _ => Err(CallError::Unauthorized),
        }
    }
}
