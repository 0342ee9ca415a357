//! Connection strategies: direct in-cluster DNS, or a local port-forward.
//!
//! The process picks one [`DialerMode`] at startup. Everything downstream only
//! sees an `Arc<dyn Dialer>` and never knows which variant it got.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use tokio::net::TcpStream;

use crate::error::TransportError;

pub type DialFuture<'a> =
    Pin<Box<dyn Future<Output = Result<TcpStream, TransportError>> + Send + 'a>>;

pub type ResolveFuture<'a> =
    Pin<Box<dyn Future<Output = Result<SocketAddr, TransportError>> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialerKind {
    Direct,
    Forwarding,
}

/// Opens a TCP connection for a logical `host:port` address.
pub trait Dialer: Send + Sync {
    fn kind(&self) -> DialerKind;

    fn dial<'a>(&'a self, address: &'a str) -> DialFuture<'a>;
}

/// Standard resolution: the address is resolved and connected as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectDialer;

impl Dialer for DirectDialer {
    fn kind(&self) -> DialerKind {
        DialerKind::Direct
    }

    fn dial<'a>(&'a self, address: &'a str) -> DialFuture<'a> {
        Box::pin(async move {
            tracing::debug!(%address, "dialing directly");
            TcpStream::connect(address)
                .await
                .map_err(|source| TransportError::Connect {
                    address: address.to_owned(),
                    source,
                })
        })
    }
}

/// A Kubernetes service address: `<service>.<namespace>.svc[.cluster.local]:<port>`.
///
/// The `.svc` suffix is required; `<service>.<namespace>` alone is
/// indistinguishable from an external host such as `example.com`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceAddress {
    pub service: String,
    pub namespace: String,
    pub port: u16,
}

impl ServiceAddress {
    /// # Errors
    ///
    /// Returns [`TransportError::NotForwardable`] if `address` is not a
    /// cluster service name with an explicit port.
    pub fn parse(address: &str) -> Result<Self, TransportError> {
        let not_forwardable = || TransportError::NotForwardable {
            address: address.to_owned(),
        };

        let (host, port) = address.rsplit_once(':').ok_or_else(not_forwardable)?;
        let port = port.parse::<u16>().map_err(|_| not_forwardable())?;

        let host = host.trim_end_matches('.');
        let host = host
            .strip_suffix(".svc.cluster.local")
            .or_else(|| host.strip_suffix(".svc"))
            .ok_or_else(not_forwardable)?;

        let mut labels = host.split('.');
        let (Some(service), Some(namespace), None) = (labels.next(), labels.next(), labels.next())
        else {
            return Err(not_forwardable());
        };
        if service.is_empty() || namespace.is_empty() {
            return Err(not_forwardable());
        }

        Ok(Self {
            service: service.to_owned(),
            namespace: namespace.to_owned(),
            port,
        })
    }
}

impl FromStr for ServiceAddress {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ServiceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.svc.cluster.local:{}",
            self.service, self.namespace, self.port
        )
    }
}

/// Looks up the local endpoint of an already established port-forward.
///
/// How forwards get established is up to the implementation (a `kubectl
/// port-forward` wrapper, a test fixture, a static table).
pub trait ForwardResolver: Send + Sync {
    fn local_endpoint<'a>(&'a self, target: &'a ServiceAddress) -> ResolveFuture<'a>;
}

/// Fixed table of forwards, keyed by service address.
#[derive(Debug, Default, Clone)]
pub struct StaticForwards {
    entries: HashMap<ServiceAddress, SocketAddr>,
}

impl StaticForwards {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_forward(mut self, target: ServiceAddress, local: SocketAddr) -> Self {
        self.insert(target, local);
        self
    }

    pub fn insert(&mut self, target: ServiceAddress, local: SocketAddr) {
        self.entries.insert(target, local);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ForwardResolver for StaticForwards {
    fn local_endpoint<'a>(&'a self, target: &'a ServiceAddress) -> ResolveFuture<'a> {
        let found = self.entries.get(target).copied();
        Box::pin(async move {
            found.ok_or_else(|| TransportError::Unavailable {
                address: target.to_string(),
                reason: "no port-forward established for this service".into(),
            })
        })
    }
}

/// Connects to the local end of a port-forward instead of the cluster address.
///
/// TLS still verifies against the logical in-cluster host name; only the TCP
/// endpoint changes.
#[derive(Clone)]
pub struct ForwardingDialer {
    forwards: Arc<dyn ForwardResolver>,
}

impl ForwardingDialer {
    #[must_use]
    pub fn new(forwards: Arc<dyn ForwardResolver>) -> Self {
        Self { forwards }
    }
}

impl fmt::Debug for ForwardingDialer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForwardingDialer").finish_non_exhaustive()
    }
}

impl Dialer for ForwardingDialer {
    fn kind(&self) -> DialerKind {
        DialerKind::Forwarding
    }

    fn dial<'a>(&'a self, address: &'a str) -> DialFuture<'a> {
        Box::pin(async move {
            let target = ServiceAddress::parse(address)?;
            let local = self.forwards.local_endpoint(&target).await?;
            tracing::debug!(%address, %local, "dialing through port-forward");
            TcpStream::connect(local)
                .await
                .map_err(|source| TransportError::Connect {
                    address: format!("{local} (forward of {address})"),
                    source,
                })
        })
    }
}

/// Process-wide transport choice. Defaults to [`DialerMode::Direct`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DialerMode {
    #[default]
    Direct,
    Forwarding,
}

impl DialerMode {
    #[must_use]
    pub fn from_auto_port_forward(enabled: bool) -> Self {
        if enabled {
            Self::Forwarding
        } else {
            Self::Direct
        }
    }

    /// Build the dialer for this mode. `forwards` is only consulted in
    /// forwarding mode.
    #[must_use]
    pub fn dialer(self, forwards: Arc<dyn ForwardResolver>) -> Arc<dyn Dialer> {
        match self {
            Self::Direct => Arc::new(DirectDialer),
            Self::Forwarding => Arc::new(ForwardingDialer::new(forwards)),
        }
    }
}

static DIALER_MODE: OnceLock<DialerMode> = OnceLock::new();

/// Fix the process-wide dialer mode. Must run before any client is built.
///
/// # Errors
///
/// Returns the already installed mode if called more than once.
pub fn init_dialer_mode(mode: DialerMode) -> Result<(), DialerMode> {
    DIALER_MODE.set(mode).map_err(|_| dialer_mode())?;
    tracing::info!(?mode, "dialer mode initialized");
    Ok(())
}

#[must_use]
pub fn dialer_mode() -> DialerMode {
    DIALER_MODE.get().copied().unwrap_or_default()
}

/// Dialer for the current process-wide mode.
#[must_use]
pub fn select_dialer(forwards: Arc<dyn ForwardResolver>) -> Arc<dyn Dialer> {
    dialer_mode().dialer(forwards)
}
