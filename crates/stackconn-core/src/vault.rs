use std::future::Future;
use std::pin::Pin;

#[cfg(feature = "vault-age")]
use std::collections::HashMap;
#[cfg(feature = "vault-age")]
use std::fmt;
#[cfg(feature = "vault-age")]
use std::io::Read as _;
#[cfg(feature = "vault-age")]
use std::path::{Path, PathBuf};

pub use stackconn_client::Secret;

pub type SecretFuture<'a> =
    Pin<Box<dyn Future<Output = anyhow::Result<Option<String>>> + Send + 'a>>;

/// Pluggable secret retrieval backend.
///
/// `Ok(None)` means the key is absent; `Err` means the store itself failed.
pub trait VaultProvider: Send + Sync {
    fn get_secret(&self, key: &str) -> SecretFuture<'_>;
}

impl<V: VaultProvider + ?Sized> VaultProvider for Box<V> {
    fn get_secret(&self, key: &str) -> SecretFuture<'_> {
        (**self).get_secret(key)
    }
}

/// Reads secrets from environment variables.
pub struct EnvVaultProvider;

impl VaultProvider for EnvVaultProvider {
    fn get_secret(&self, key: &str) -> SecretFuture<'_> {
        let key = key.to_owned();
        Box::pin(async move { Ok(std::env::var(&key).ok()) })
    }
}

#[cfg(feature = "vault-age")]
#[derive(Debug, thiserror::Error)]
pub enum AgeVaultError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no usable age identity in {}: {reason}", path.display())]
    Identity { path: PathBuf, reason: String },
    #[error("age decryption failed: {0}")]
    Decrypt(#[from] age::DecryptError),
    #[error("decrypted vault is not a JSON object of strings: {0}")]
    Json(#[from] serde_json::Error),
}

/// Cluster credentials decrypted once from an age file holding a flat JSON
/// object, e.g. `{"STACKCONN_DEMO_ELASTIC_PASSWORD": "..."}`.
#[cfg(feature = "vault-age")]
pub struct AgeVaultProvider {
    secrets: HashMap<String, String>,
}

#[cfg(feature = "vault-age")]
impl fmt::Debug for AgeVaultProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AgeVaultProvider([{} secrets])", self.secrets.len())
    }
}

#[cfg(feature = "vault-age")]
impl AgeVaultProvider {
    /// # Errors
    ///
    /// Returns [`AgeVaultError`] if either file is unreadable, the identity
    /// file has no valid X25519 identity, or decryption fails.
    pub fn new(key_path: &Path, vault_path: &Path) -> Result<Self, AgeVaultError> {
        let identities = read_identities(key_path)?;
        let ciphertext = std::fs::read(vault_path).map_err(|source| AgeVaultError::Read {
            path: vault_path.to_owned(),
            source,
        })?;
        let secrets = serde_json::from_slice(&decrypt(&identities, &ciphertext)?)?;
        Ok(Self { secrets })
    }
}

/// Every non-comment line of an identity file is one X25519 identity.
#[cfg(feature = "vault-age")]
fn read_identities(path: &Path) -> Result<Vec<age::x25519::Identity>, AgeVaultError> {
    let contents = std::fs::read_to_string(path).map_err(|source| AgeVaultError::Read {
        path: path.to_owned(),
        source,
    })?;
    let identities = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::parse::<age::x25519::Identity>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|reason| AgeVaultError::Identity {
            path: path.to_owned(),
            reason: reason.to_owned(),
        })?;
    if identities.is_empty() {
        return Err(AgeVaultError::Identity {
            path: path.to_owned(),
            reason: "file is empty".into(),
        });
    }
    Ok(identities)
}

#[cfg(feature = "vault-age")]
fn decrypt(
    identities: &[age::x25519::Identity],
    ciphertext: &[u8],
) -> Result<Vec<u8>, AgeVaultError> {
    let decryptor = age::Decryptor::new(ciphertext)?;
    let mut reader = decryptor.decrypt(identities.iter().map(|i| i as &dyn age::Identity))?;
    let mut plaintext = Vec::new();
    reader
        .read_to_end(&mut plaintext)
        .map_err(|e| AgeVaultError::Decrypt(age::DecryptError::Io(e)))?;
    Ok(plaintext)
}

#[cfg(feature = "vault-age")]
impl VaultProvider for AgeVaultProvider {
    fn get_secret(&self, key: &str) -> SecretFuture<'_> {
        let found = self.secrets.get(key).cloned();
        Box::pin(async move { Ok(found) })
    }
}

/// Test helper with HashMap-based secret storage.
#[cfg(test)]
#[derive(Default)]
pub struct MockVaultProvider {
    secrets: std::collections::HashMap<String, String>,
    fail: bool,
}

#[cfg(test)]
impl MockVaultProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_secret(mut self, key: &str, value: &str) -> Self {
        self.secrets.insert(key.to_owned(), value.to_owned());
        self
    }

    /// Every lookup fails as if the store were unreachable.
    #[must_use]
    pub fn unreachable() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[cfg(test)]
impl VaultProvider for MockVaultProvider {
    fn get_secret(&self, key: &str) -> SecretFuture<'_> {
        let result = if self.fail {
            Err(anyhow::anyhow!("secret store unreachable"))
        } else {
            Ok(self.secrets.get(key).cloned())
        };
        Box::pin(async move { result })
    }
}
