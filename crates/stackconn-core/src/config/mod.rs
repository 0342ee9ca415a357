mod env;
mod types;


pub use types::*;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail, ensure};
use stackconn_client::{ClientOptions, DialerMode, StaticForwards};

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error on zero timeouts, an unknown vault backend, an `age`
    /// backend without key/vault paths, or a malformed forward rule.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.client.connect_timeout_secs > 0,
            "client.connect_timeout_secs must be greater than zero"
        );
        ensure!(
            self.client.request_timeout_secs > 0,
            "client.request_timeout_secs must be greater than zero"
        );
        match self.vault.backend.as_str() {
            "env" => {}
            "age" => {
                ensure!(
                    self.vault.key_path.is_some(),
                    "vault.key_path is required for the age backend"
                );
                ensure!(
                    self.vault.vault_path.is_some(),
                    "vault.vault_path is required for the age backend"
                );
            }
            other => bail!("unknown vault backend: {other}"),
        }
        for rule in &self.dialer.forwards {
            rule.target()?;
        }
        Ok(())
    }

    #[must_use]
    pub fn dialer_mode(&self) -> DialerMode {
        DialerMode::from_auto_port_forward(self.dialer.auto_port_forward)
    }

    /// Forward table built from `[[dialer.forwards]]`.
    ///
    /// # Errors
    ///
    /// Returns an error if a rule's service is not a cluster service address.
    pub fn forwards(&self) -> anyhow::Result<StaticForwards> {
        let mut forwards = StaticForwards::new();
        for rule in &self.dialer.forwards {
            forwards.insert(rule.target()?, rule.local);
        }
        Ok(forwards)
    }

    #[must_use]
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            connect_timeout: Duration::from_secs(self.client.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.client.request_timeout_secs),
        }
    }
}
