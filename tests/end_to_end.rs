//! Factory to TLS stub: credentials, trust pool, forwarding dialer and basic auth.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::AUTHORIZATION;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use rcgen::{BasicConstraints, CertificateParams, IsCa, Issuer, KeyPair};
use rustls::pki_types::{CertificateDer, PrivatePkcs8KeyDer};
use stackconn_client::{
    ClientError, DialerKind, ForwardingDialer, Secret, ServiceAddress, StaticForwards,
};
use stackconn_core::credentials::{CredentialError, CredentialFuture, CredentialKind};
use stackconn_core::{ClientFactory, CredentialSource, FactoryError, Target};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

const HOST: &str = "demo-es-public.ns1.svc.cluster.local";
// base64("elastic:secret123")
const EXPECTED_AUTH: &str = "Basic ZWxhc3RpYzpzZWNyZXQxMjM=";

struct Pki {
    ca_pem: String,
    leaf_der: CertificateDer<'static>,
    leaf_key: Vec<u8>,
}

fn pki() -> Pki {
    let ca_key = KeyPair::generate().unwrap();
    let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
    ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let ca_cert = ca_params.self_signed(&ca_key).unwrap();
    let issuer = Issuer::from_ca_cert_pem(&ca_cert.pem(), &ca_key).unwrap();

    let leaf_key = KeyPair::generate().unwrap();
    let leaf = CertificateParams::new(vec![HOST.to_owned()])
        .unwrap()
        .signed_by(&leaf_key, &issuer)
        .unwrap();

    Pki {
        ca_pem: ca_cert.pem(),
        leaf_der: leaf.der().clone(),
        leaf_key: leaf_key.serialize_der(),
    }
}

struct FixedCredentials {
    password: &'static str,
    ca: Vec<u8>,
}

impl CredentialSource for FixedCredentials {
    fn elastic_password<'a>(&'a self, cluster: &'a str) -> CredentialFuture<'a, Secret> {
        Box::pin(async move {
            if cluster == "demo" {
                Ok(Secret::new(self.password))
            } else {
                Err(CredentialError::NotFound {
                    cluster: cluster.to_owned(),
                    kind: CredentialKind::ElasticPassword,
                })
            }
        })
    }

    fn ca_cert<'a>(&'a self, _cluster: &'a str) -> CredentialFuture<'a, Vec<u8>> {
        Box::pin(async move { Ok(self.ca.clone()) })
    }
}

async fn handle(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    let authorized = req
        .headers()
        .get(AUTHORIZATION)
        .is_some_and(|v| v.as_bytes() == EXPECTED_AUTH.as_bytes());
    if !authorized {
        let resp = Response::builder()
            .status(StatusCode::UNAUTHORIZED)
            .body(Full::new(Bytes::from_static(b"{\"error\":\"unauthorized\"}")))
            .unwrap();
        return Ok(resp);
    }

    let body = match req.uri().path() {
        "/_cluster/health" => {
            r#"{"cluster_name":"demo","status":"green","number_of_nodes":3,"active_shards":12}"#
        }
        "/" => r#"{"name":"demo-es-default-0","cluster_name":"demo","version":{"number":"8.15.0"}}"#,
        _ => {
            let resp = Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(Full::new(Bytes::new()))
                .unwrap();
            return Ok(resp);
        }
    };
    Ok(Response::new(Full::new(Bytes::from_static(body.as_bytes()))))
}

/// TLS Elasticsearch stand-in on an ephemeral local port.
async fn spawn_stub(pki: &Pki) -> SocketAddr {
    let config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::aws_lc_rs::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .unwrap()
    .with_no_client_auth()
    .with_single_cert(
        vec![pki.leaf_der.clone()],
        PrivatePkcs8KeyDer::from(pki.leaf_key.clone()).into(),
    )
    .unwrap();
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                let Ok(tls) = acceptor.accept(stream).await else {
                    return;
                };
                let _ = hyper::server::conn::http1::Builder::new()
                    .serve_connection(TokioIo::new(tls), service_fn(handle))
                    .await;
            });
        }
    });
    addr
}

fn forwarding_factory(local: SocketAddr) -> ClientFactory {
    let target: ServiceAddress = format!("{HOST}:9200").parse().unwrap();
    let forwards = StaticForwards::new().with_forward(target, local);
    ClientFactory::new(Arc::new(ForwardingDialer::new(Arc::new(forwards))))
}

#[tokio::test]
async fn health_through_forwarded_tls_connection() {
    let pki = pki();
    let local = spawn_stub(&pki).await;
    let factory = forwarding_factory(local);
    assert_eq!(factory.dialer_kind(), DialerKind::Forwarding);

    let creds = FixedCredentials {
        password: "secret123",
        ca: pki.ca_pem.clone().into_bytes(),
    };
    let client = factory
        .new_client(&Target::new("demo", "ns1"), &creds)
        .await
        .unwrap();
    assert_eq!(client.address().as_str(), format!("https://{HOST}:9200/"));
    assert_eq!(client.dialer_kind(), DialerKind::Forwarding);

    let health = client.cluster_health().await.unwrap();
    assert_eq!(health.cluster_name, "demo");
    assert_eq!(health.status, "green");
    assert_eq!(health.number_of_nodes, 3);

    let info = client.info().await.unwrap();
    assert_eq!(info.version.number, "8.15.0");
}

#[tokio::test]
async fn wrong_password_surfaces_status() {
    let pki = pki();
    let local = spawn_stub(&pki).await;
    let creds = FixedCredentials {
        password: "wrong",
        ca: pki.ca_pem.clone().into_bytes(),
    };
    let client = forwarding_factory(local)
        .new_client(&Target::new("demo", "ns1"), &creds)
        .await
        .unwrap();

    let err = client.cluster_health().await.unwrap_err();
    assert!(
        matches!(err, ClientError::Status { status: 401, .. }),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn foreign_ca_fails_handshake() {
    let served = pki();
    let local = spawn_stub(&served).await;
    let other = pki();
    let creds = FixedCredentials {
        password: "secret123",
        ca: other.ca_pem.into_bytes(),
    };
    let client = forwarding_factory(local)
        .new_client(&Target::new("demo", "ns1"), &creds)
        .await
        .unwrap();

    let err = client.cluster_health().await.unwrap_err();
    assert!(
        matches!(err, ClientError::Handshake { .. }),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn unforwarded_target_is_a_dial_error() {
    let pki = pki();
    let local = spawn_stub(&pki).await;
    let creds = FixedCredentials {
        password: "secret123",
        ca: pki.ca_pem.clone().into_bytes(),
    };
    let mut target = Target::new("demo", "ns1");
    target.namespace = "ns2".into();
    let client = forwarding_factory(local)
        .new_client(&target, &creds)
        .await
        .unwrap();

    let err = client.cluster_health().await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)), "unexpected error: {err}");
}

#[tokio::test]
async fn missing_credentials_abort_before_dialing() {
    let creds = FixedCredentials {
        password: "secret123",
        ca: Vec::new(),
    };
    let factory = forwarding_factory("127.0.0.1:1".parse().unwrap());
    let err = factory
        .new_client(&Target::new("other", "ns1"), &creds)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FactoryError::Credential(CredentialError::NotFound {
            kind: CredentialKind::ElasticPassword,
            ..
        })
    ));
}
