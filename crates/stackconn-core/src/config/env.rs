use std::path::PathBuf;

use super::{Config, ForwardRule};

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("STACKCONN_AUTO_PORT_FORWARD") {
            match parse_flag(&v) {
                Some(enabled) => self.dialer.auto_port_forward = enabled,
                None => tracing::warn!("ignoring invalid STACKCONN_AUTO_PORT_FORWARD value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("STACKCONN_FORWARDS") {
            let rules: anyhow::Result<Vec<ForwardRule>> = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::parse::<ForwardRule>)
                .collect();
            match rules {
                Ok(rules) => self.dialer.forwards.extend(rules),
                Err(e) => tracing::warn!("ignoring invalid STACKCONN_FORWARDS value: {e:#}"),
            }
        }
        if let Ok(v) = std::env::var("STACKCONN_VAULT_BACKEND") {
            self.vault.backend = v;
        }
        if let Ok(v) = std::env::var("STACKCONN_VAULT_KEY") {
            self.vault.key_path = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("STACKCONN_VAULT_PATH") {
            self.vault.vault_path = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("STACKCONN_CONNECT_TIMEOUT") {
            match parse_secs(&v) {
                Some(secs) => self.client.connect_timeout_secs = secs,
                None => tracing::warn!("ignoring invalid STACKCONN_CONNECT_TIMEOUT value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("STACKCONN_REQUEST_TIMEOUT") {
            match parse_secs(&v) {
                Some(secs) => self.client.request_timeout_secs = secs,
                None => tracing::warn!("ignoring invalid STACKCONN_REQUEST_TIMEOUT value: {v}"),
            }
        }
    }
}

/// Accepts `true`/`false` and `1`/`0`.
pub(crate) fn parse_flag(v: &str) -> Option<bool> {
    match v.trim() {
        "1" => Some(true),
        "0" => Some(false),
        other => other.parse().ok(),
    }
}

fn parse_secs(v: &str) -> Option<u64> {
    v.trim().parse().ok()
}
