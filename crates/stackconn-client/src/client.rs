//! Elasticsearch HTTP client over an injected dialer.
//!
//! Each request dials a fresh connection through the [`Dialer`], runs a TLS
//! handshake against the logical host name using only the [`TrustPool`], and
//! sends one HTTP/1.1 request with basic auth.

use std::sync::Arc;
use std::time::Duration;

use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HOST, HeaderValue, USER_AGENT};
use http::{Method, Request};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_rustls::TlsConnector;
use url::Url;

use crate::auth::User;
use crate::dialer::{Dialer, DialerKind};
use crate::error::{ClientError, TransportError};
use crate::trust::TrustPool;

const USER_AGENT_VALUE: &str = concat!("stackconn/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Builds a client from the parts assembled by the factory.
pub trait ClientConstructor: Send + Sync {
    type Client;

    /// # Errors
    ///
    /// Returns [`ClientError`] if the parts cannot form a usable client.
    fn construct(
        &self,
        dialer: Arc<dyn Dialer>,
        address: &str,
        user: User,
        trust: TrustPool,
    ) -> Result<Self::Client, ClientError>;
}

/// Default constructor producing [`EsClient`].
#[derive(Debug, Default, Clone, Copy)]
pub struct EsClientConstructor {
    pub options: ClientOptions,
}

impl EsClientConstructor {
    #[must_use]
    pub fn new(options: ClientOptions) -> Self {
        Self { options }
    }
}

impl ClientConstructor for EsClientConstructor {
    type Client = EsClient;

    fn construct(
        &self,
        dialer: Arc<dyn Dialer>,
        address: &str,
        user: User,
        trust: TrustPool,
    ) -> Result<EsClient, ClientError> {
        Ok(EsClient::new(dialer, address, user, trust)?.with_options(self.options))
    }
}

#[derive(Debug, Clone)]
pub struct EsResponse {
    pub status: u16,
    pub body: Bytes,
}

impl EsResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// # Errors
    ///
    /// Returns [`ClientError::Json`] if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub name: String,
    pub cluster_name: String,
    pub version: VersionInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterHealth {
    pub cluster_name: String,
    pub status: String,
    #[serde(default)]
    pub number_of_nodes: u32,
}

pub struct EsClient {
    address: Url,
    authority: String,
    server_name: ServerName<'static>,
    user: User,
    auth_header: HeaderValue,
    trust: TrustPool,
    tls: TlsConnector,
    dialer: Arc<dyn Dialer>,
    options: ClientOptions,
}

impl EsClient {
    /// # Errors
    ///
    /// Returns [`ClientError::Address`] if `address` is not an `https` URL with
    /// a host, or [`ClientError::Trust`] if the TLS config cannot be built.
    pub fn new(
        dialer: Arc<dyn Dialer>,
        address: &str,
        user: User,
        trust: TrustPool,
    ) -> Result<Self, ClientError> {
        let invalid = |reason: &str| ClientError::Address {
            address: address.to_owned(),
            reason: reason.to_owned(),
        };

        let url = Url::parse(address).map_err(|e| invalid(&e.to_string()))?;
        if url.scheme() != "https" {
            return Err(invalid("scheme must be https"));
        }
        let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| invalid("missing port"))?;
        let authority = format!("{host}:{port}");
        let server_name =
            ServerName::try_from(host.to_owned()).map_err(|e| invalid(&e.to_string()))?;

        let mut auth_header =
            HeaderValue::from_str(&user.basic_auth()).map_err(|e| invalid(&e.to_string()))?;
        auth_header.set_sensitive(true);

        let tls = TlsConnector::from(Arc::new(trust.client_config()?));

        tracing::info!(
            %address,
            user = %user.name,
            dialer = ?dialer.kind(),
            "elasticsearch client constructed"
        );

        Ok(Self {
            address: url,
            authority,
            server_name,
            user,
            auth_header,
            trust,
            tls,
            dialer,
            options: ClientOptions::default(),
        })
    }

    #[must_use]
    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Base URL, e.g. `https://demo-es-public.ns1.svc.cluster.local:9200/`.
    #[must_use]
    pub fn address(&self) -> &Url {
        &self.address
    }

    /// `host:port` handed to the dialer.
    #[must_use]
    pub fn authority(&self) -> &str {
        &self.authority
    }

    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }

    #[must_use]
    pub fn trust_pool(&self) -> &TrustPool {
        &self.trust
    }

    #[must_use]
    pub fn dialer_kind(&self) -> DialerKind {
        self.dialer.kind()
    }

    #[must_use]
    pub fn options(&self) -> ClientOptions {
        self.options
    }

    /// Send one request and return the raw response regardless of status.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on dial, TLS, HTTP or timeout failures.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<EsResponse, ClientError> {
        let path = if path.starts_with('/') {
            path.to_owned()
        } else {
            format!("/{path}")
        };
        let timeout = self.options.request_timeout;
        tokio::time::timeout(timeout, self.exchange(method, &path, body))
            .await
            .map_err(|_| ClientError::Timeout {
                path: path.clone(),
                timeout,
            })?
    }

    /// `GET /`, the cluster banner.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Status`] on a non-2xx answer, or any transport error.
    pub async fn info(&self) -> Result<ClusterInfo, ClientError> {
        self.get_json("/").await
    }

    /// # Errors
    ///
    /// Returns [`ClientError::Status`] on a non-2xx answer, or any transport error.
    pub async fn cluster_health(&self) -> Result<ClusterHealth, ClientError> {
        self.get_json("/_cluster/health").await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let resp = self.request(Method::GET, path, None).await?;
        if !resp.is_success() {
            return Err(ClientError::Status {
                status: resp.status,
                path: path.to_owned(),
                body: String::from_utf8_lossy(&resp.body).into_owned(),
            });
        }
        resp.json()
    }

    async fn exchange(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<EsResponse, ClientError> {
        let connect_timeout = self.options.connect_timeout;
        let stream = tokio::time::timeout(connect_timeout, self.dialer.dial(&self.authority))
            .await
            .map_err(|_| TransportError::Timeout {
                address: self.authority.clone(),
                timeout: connect_timeout,
            })??;

        let tls = self
            .tls
            .connect(self.server_name.clone(), stream)
            .await
            .map_err(|source| ClientError::Handshake {
                host: self.server_name.to_str().into_owned(),
                source,
            })?;

        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(tls)).await?;
        let _conn = ConnectionTask(tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!("elasticsearch connection closed with error: {e}");
            }
        }));

        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header(HOST, &self.authority)
            .header(AUTHORIZATION, self.auth_header.clone())
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, USER_AGENT_VALUE);
        let payload = match body {
            Some(value) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Bytes::from(serde_json::to_vec(value)?)
            }
            None => Bytes::new(),
        };
        let request = builder.body(Full::new(payload))?;

        let response = sender.send_request(request).await?;
        let status = response.status().as_u16();
        let body = response.into_body().collect().await?.to_bytes();
        tracing::debug!(%path, status, "elasticsearch request completed");

        Ok(EsResponse { status, body })
    }
}

/// Drives one connection; aborted when the exchange that opened it ends or is
/// dropped by the request timeout.
struct ConnectionTask(tokio::task::JoinHandle<()>);

impl Drop for ConnectionTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl std::fmt::Debug for EsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EsClient")
            .field("address", &self.address.as_str())
            .field("user", &self.user)
            .field("trust", &self.trust)
            .field("dialer", &self.dialer.kind())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
