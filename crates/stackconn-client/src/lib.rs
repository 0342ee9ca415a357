//! Trust pool, pluggable dialers and the Elasticsearch client they feed.

#![forbid(unsafe_code)]

pub mod auth;
pub mod client;
pub mod dialer;
pub mod error;
pub mod trust;

pub use auth::{Secret, User};
pub use client::{
    ClientConstructor, ClientOptions, ClusterHealth, ClusterInfo, EsClient, EsClientConstructor,
    EsResponse,
};
pub use dialer::{
    Dialer, DialerKind, DialerMode, DirectDialer, ForwardResolver, ForwardingDialer,
    ServiceAddress, StaticForwards, dialer_mode, init_dialer_mode, select_dialer,
};
pub use error::{ClientError, TransportError, TrustError};
pub use trust::TrustPool;
