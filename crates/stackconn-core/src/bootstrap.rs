//! Wiring from a loaded [`Config`] to a ready [`ClientFactory`] and credential source.

use std::sync::Arc;

#[cfg(feature = "vault-age")]
use anyhow::Context;
use anyhow::bail;
use stackconn_client::{EsClientConstructor, select_dialer};

use crate::config::{Config, VaultConfig};
use crate::credentials::VaultCredentials;
use crate::factory::ClientFactory;
#[cfg(feature = "vault-age")]
use crate::vault::AgeVaultProvider;
use crate::vault::{EnvVaultProvider, VaultProvider};

/// # Errors
///
/// Returns an error for an unknown backend or an age vault that cannot be opened.
pub fn create_vault(config: &VaultConfig) -> anyhow::Result<Box<dyn VaultProvider>> {
    let vault: Box<dyn VaultProvider> = match config.backend.as_str() {
        "env" => Box::new(EnvVaultProvider),
        #[cfg(feature = "vault-age")]
        "age" => {
            let key = config
                .key_path
                .as_deref()
                .context("vault.key_path required for age backend")?;
            let path = config
                .vault_path
                .as_deref()
                .context("vault.vault_path required for age backend")?;
            Box::new(AgeVaultProvider::new(key, path)?)
        }
        other => bail!("unknown vault backend: {other}"),
    };
    tracing::debug!(backend = %config.backend, "vault backend ready");
    Ok(vault)
}

/// # Errors
///
/// See [`create_vault`].
pub fn create_credentials(
    config: &VaultConfig,
) -> anyhow::Result<VaultCredentials<Box<dyn VaultProvider>>> {
    Ok(VaultCredentials::new(create_vault(config)?))
}

/// Factory using the process-wide dialer mode and the configured forwards.
///
/// Call [`stackconn_client::init_dialer_mode`] first; without it the direct
/// dialer is used.
///
/// # Errors
///
/// Returns an error if a configured forward rule is invalid.
pub fn build_factory(config: &Config) -> anyhow::Result<ClientFactory> {
    let forwards = Arc::new(config.forwards()?);
    let dialer = select_dialer(forwards);
    tracing::info!(dialer = ?dialer.kind(), "client factory ready");
    Ok(ClientFactory::with_constructor(
        dialer,
        EsClientConstructor::new(config.client_options()),
    ))
}
