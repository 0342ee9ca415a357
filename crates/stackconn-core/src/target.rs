/// HTTP port of the Elasticsearch public service.
pub const ES_HTTP_PORT: u16 = 9200;

/// Which Elasticsearch cluster to talk to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub cluster_name: String,
    pub namespace: String,
}

impl Target {
    pub fn new(cluster_name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            namespace: namespace.into(),
        }
    }

    /// In-cluster URL of the `<cluster>-es-public` service.
    #[must_use]
    pub fn es_public_url(&self) -> String {
        format!(
            "https://{}-es-public.{}.svc.cluster.local:{ES_HTTP_PORT}",
            self.cluster_name, self.namespace
        )
    }
}
