//! Credential resolution, configuration and the Elasticsearch client factory.

pub mod bootstrap;
pub mod config;
pub mod credentials;
pub mod factory;
pub mod target;
pub mod vault;

pub use credentials::{CredentialError, CredentialKind, CredentialSource, VaultCredentials};
pub use factory::{ClientFactory, ELASTIC_USER, FactoryError};
pub use target::{ES_HTTP_PORT, Target};
