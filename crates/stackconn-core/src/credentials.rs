//! Per-cluster credential lookup on top of a [`VaultProvider`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::vault::{Secret, VaultProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    ElasticPassword,
    CaCert,
}

impl CredentialKind {
    fn key_suffix(self) -> &'static str {
        match self {
            Self::ElasticPassword => "ELASTIC_PASSWORD",
            Self::CaCert => "CA_PEM",
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ElasticPassword => f.write_str("elastic user password"),
            Self::CaCert => f.write_str("CA certificate"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("{kind} not found for cluster '{cluster}'")]
    NotFound {
        cluster: String,
        kind: CredentialKind,
    },

    #[error("secret store lookup of {kind} for cluster '{cluster}' failed: {source}")]
    Backend {
        cluster: String,
        kind: CredentialKind,
        source: anyhow::Error,
    },

    #[error("invalid cluster name '{cluster}': expected a lowercase RFC 1123 label")]
    InvalidClusterName { cluster: String },
}

pub type CredentialFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, CredentialError>> + Send + 'a>>;

/// Where cluster credentials come from.
pub trait CredentialSource: Send + Sync {
    fn elastic_password<'a>(&'a self, cluster: &'a str) -> CredentialFuture<'a, Secret>;

    /// Raw PEM bytes of the cluster's HTTP CA.
    fn ca_cert<'a>(&'a self, cluster: &'a str) -> CredentialFuture<'a, Vec<u8>>;
}

/// Vault key for a cluster credential: `STACKCONN_<CLUSTER>_<KIND>`.
///
/// The cluster name must be a lowercase RFC 1123 label (it also names the
/// `<cluster>-es-public` service). It is upper-cased with `-` mapped to `_`,
/// so `my-stack` maps to `STACKCONN_MY_STACK_ELASTIC_PASSWORD`. Restricting
/// the input alphabet keeps the mapping one-to-one.
///
/// # Errors
///
/// Returns [`CredentialError::InvalidClusterName`] for any other name.
pub fn secret_key(cluster: &str, kind: CredentialKind) -> Result<String, CredentialError> {
    if !is_dns_label(cluster) {
        return Err(CredentialError::InvalidClusterName {
            cluster: cluster.to_owned(),
        });
    }
    let cluster: String = cluster
        .chars()
        .map(|c| if c == '-' { '_' } else { c.to_ascii_uppercase() })
        .collect();
    Ok(format!("STACKCONN_{cluster}_{}", kind.key_suffix()))
}

fn is_dns_label(name: &str) -> bool {
    (1..=63).contains(&name.len())
        && !name.starts_with('-')
        && !name.ends_with('-')
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

pub struct VaultCredentials<V> {
    vault: V,
}

impl<V: VaultProvider> VaultCredentials<V> {
    pub fn new(vault: V) -> Self {
        Self { vault }
    }

    async fn lookup(&self, cluster: &str, kind: CredentialKind) -> Result<String, CredentialError> {
        let key = secret_key(cluster, kind)?;
        tracing::debug!(%cluster, %kind, %key, "resolving cluster credential");
        self.vault
            .get_secret(&key)
            .await
            .map_err(|source| CredentialError::Backend {
                cluster: cluster.to_owned(),
                kind,
                source,
            })?
            .ok_or_else(|| CredentialError::NotFound {
                cluster: cluster.to_owned(),
                kind,
            })
    }
}

impl<V: VaultProvider> CredentialSource for VaultCredentials<V> {
    fn elastic_password<'a>(&'a self, cluster: &'a str) -> CredentialFuture<'a, Secret> {
        Box::pin(async move {
            self.lookup(cluster, CredentialKind::ElasticPassword)
                .await
                .map(Secret::new)
        })
    }

    fn ca_cert<'a>(&'a self, cluster: &'a str) -> CredentialFuture<'a, Vec<u8>> {
        Box::pin(async move {
            self.lookup(cluster, CredentialKind::CaCert)
                .await
                .map(String::into_bytes)
        })
    }
}
