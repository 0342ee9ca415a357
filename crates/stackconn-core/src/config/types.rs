use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use stackconn_client::ServiceAddress;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub dialer: DialerConfig,
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct DialerConfig {
    /// Dev mode: reach services through local port-forwards instead of
    /// in-cluster DNS.
    #[serde(default)]
    pub auto_port_forward: bool,
    #[serde(default)]
    pub forwards: Vec<ForwardRule>,
}

/// One established port-forward: cluster service address → local endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ForwardRule {
    pub service: String,
    pub local: SocketAddr,
}

impl ForwardRule {
    /// # Errors
    ///
    /// Returns an error if `service` is not a cluster service address.
    pub fn target(&self) -> anyhow::Result<ServiceAddress> {
        ServiceAddress::parse(&self.service)
            .with_context(|| format!("invalid port-forward service '{}'", self.service))
    }
}

/// Parses `<service-address>=<local-socket-addr>`.
impl FromStr for ForwardRule {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (service, local) = s
            .split_once('=')
            .with_context(|| format!("expected <service>=<local addr>, got '{s}'"))?;
        let rule = Self {
            service: service.trim().to_owned(),
            local: local
                .trim()
                .parse()
                .with_context(|| format!("invalid local address in '{s}'"))?,
        };
        rule.target()?;
        Ok(rule)
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct VaultConfig {
    #[serde(default = "default_vault_backend")]
    pub backend: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_path: Option<PathBuf>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            backend: default_vault_backend(),
            key_path: None,
            vault_path: None,
        }
    }
}

fn default_vault_backend() -> String {
    "env".into()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ClientConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    60
}
