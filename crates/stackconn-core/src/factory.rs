//! Assembles an Elasticsearch client for one target cluster.
//!
//! The pipeline is linear and all-or-nothing: password, CA, trust pool,
//! address, then the client constructor. The first failure aborts it.

use std::fmt;
use std::sync::Arc;

use stackconn_client::{
    ClientConstructor, ClientError, Dialer, DialerKind, EsClientConstructor, TrustError,
    TrustPool, User,
};

use crate::credentials::{CredentialError, CredentialSource};
use crate::target::Target;

/// Built-in superuser every client authenticates as.
pub const ELASTIC_USER: &str = "elastic";

#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("cannot establish trust pool for cluster '{cluster}': {source}")]
    TrustPool { cluster: String, source: TrustError },

    #[error("cannot construct client for cluster '{cluster}': {source}")]
    Client { cluster: String, source: ClientError },
}

/// Builds clients that all share one dialer.
///
/// The dialer is chosen once by the caller (usually through
/// [`stackconn_client::select_dialer`]) and injected here.
pub struct ClientFactory<C = EsClientConstructor> {
    dialer: Arc<dyn Dialer>,
    constructor: C,
}

impl ClientFactory<EsClientConstructor> {
    #[must_use]
    pub fn new(dialer: Arc<dyn Dialer>) -> Self {
        Self::with_constructor(dialer, EsClientConstructor::default())
    }
}

impl<C: ClientConstructor> ClientFactory<C> {
    pub fn with_constructor(dialer: Arc<dyn Dialer>, constructor: C) -> Self {
        Self {
            dialer,
            constructor,
        }
    }

    #[must_use]
    pub fn dialer_kind(&self) -> DialerKind {
        self.dialer.kind()
    }

    /// Resolve credentials for `target` and construct a client for it.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error: a missing or unreadable
    /// credential, an unusable CA, or a constructor failure.
    pub async fn new_client(
        &self,
        target: &Target,
        credentials: &dyn CredentialSource,
    ) -> Result<C::Client, FactoryError> {
        let cluster = target.cluster_name.as_str();

        let password = credentials.elastic_password(cluster).await?;
        let user = User::new(ELASTIC_USER, password);

        let ca_cert = credentials.ca_cert(cluster).await?;
        let trust = TrustPool::from_pem(&ca_cert).map_err(|source| FactoryError::TrustPool {
            cluster: cluster.to_owned(),
            source,
        })?;

        let address = target.es_public_url();
        tracing::debug!(
            %cluster,
            namespace = %target.namespace,
            %address,
            ca_certs = trust.len(),
            "assembled client parts"
        );

        self.constructor
            .construct(Arc::clone(&self.dialer), &address, user, trust)
            .map_err(|source| FactoryError::Client {
                cluster: cluster.to_owned(),
                source,
            })
    }
}

impl<C> fmt::Debug for ClientFactory<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientFactory")
            .field("dialer", &self.dialer.kind())
            .finish_non_exhaustive()
    }
}
