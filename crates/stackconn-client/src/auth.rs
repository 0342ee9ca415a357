use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

/// Wrapper for sensitive strings with redacted Debug/Display.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Identity presented to Elasticsearch with HTTP basic auth.
#[derive(Debug, Clone)]
pub struct User {
    pub name: String,
    pub password: Secret,
}

impl User {
    pub fn new(name: impl Into<String>, password: Secret) -> Self {
        Self {
            name: name.into(),
            password,
        }
    }

    /// Value for the `Authorization` header.
    #[must_use]
    pub fn basic_auth(&self) -> String {
        let raw = format!("{}:{}", self.name, self.password.expose());
        format!("Basic {}", STANDARD.encode(raw))
    }
}
