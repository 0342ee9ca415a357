//! CA trust material parsed from PEM bytes.

use std::sync::Arc;

use rustls::RootCertStore;
use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::ServerCertVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};

use crate::error::TrustError;

/// Crypto provider shared by every TLS config built in this crate.
pub(crate) fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::aws_lc_rs::default_provider())
}

/// A non-empty, fully parsed set of trusted CA certificates.
///
/// Cheap to clone; the underlying root store is shared.
#[derive(Clone)]
pub struct TrustPool {
    certs: Arc<[CertificateDer<'static>]>,
    roots: Arc<RootCertStore>,
}

impl TrustPool {
    /// Parse one or more concatenated PEM certificates.
    ///
    /// PEM sections that are not certificates (private keys, CSRs) are skipped.
    /// Malformed PEM, a certificate the verifier cannot use as a trust anchor,
    /// or an input without any certificate is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::InvalidCertificate`] in all of the cases above.
    pub fn from_pem(pem: &[u8]) -> Result<Self, TrustError> {
        let certs = CertificateDer::pem_slice_iter(pem)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| TrustError::InvalidCertificate {
                reason: format!("malformed PEM: {e}"),
            })?;

        if certs.is_empty() {
            return Err(TrustError::InvalidCertificate {
                reason: "no certificates found in PEM input".into(),
            });
        }

        let mut roots = RootCertStore::empty();
        for (idx, cert) in certs.iter().enumerate() {
            roots
                .add(cert.clone())
                .map_err(|e| TrustError::InvalidCertificate {
                    reason: format!("certificate #{idx} is not a usable trust anchor: {e}"),
                })?;
        }

        Ok(Self {
            certs: certs.into(),
            roots: Arc::new(roots),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.certs.len()
    }

    /// Always `false`: an empty pool cannot be constructed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    /// DER encodings of the accepted certificates, in input order.
    #[must_use]
    pub fn certificates(&self) -> &[CertificateDer<'static>] {
        &self.certs
    }

    #[must_use]
    pub fn root_store(&self) -> Arc<RootCertStore> {
        Arc::clone(&self.roots)
    }

    /// Check a server certificate chain the same way a TLS handshake would.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::Rejected`] when the chain does not lead to a
    /// certificate in this pool or does not cover `server_name`.
    pub fn verify_server(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &str,
    ) -> Result<(), TrustError> {
        let verifier =
            WebPkiServerVerifier::builder_with_provider(self.root_store(), crypto_provider())
                .build()
                .map_err(|e| TrustError::Rejected(rustls::Error::General(e.to_string())))?;
        let name = ServerName::try_from(server_name.to_owned()).map_err(|e| {
            TrustError::Rejected(rustls::Error::General(format!(
                "invalid server name '{server_name}': {e}"
            )))
        })?;
        verifier
            .verify_server_cert(end_entity, intermediates, &name, &[], UnixTime::now())
            .map(|_| ())
            .map_err(TrustError::Rejected)
    }

    /// Build a rustls client config that trusts only this pool.
    ///
    /// # Errors
    ///
    /// Returns [`TrustError::Tls`] if the crypto provider rejects the default
    /// protocol versions.
    pub fn client_config(&self) -> Result<rustls::ClientConfig, TrustError> {
        let config = rustls::ClientConfig::builder_with_provider(crypto_provider())
            .with_safe_default_protocol_versions()?
            .with_root_certificates(self.root_store())
            .with_no_client_auth();
        Ok(config)
    }
}

impl PartialEq for TrustPool {
    fn eq(&self, other: &Self) -> bool {
        self.certs == other.certs
    }
}

impl Eq for TrustPool {}

impl std::fmt::Debug for TrustPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustPool")
            .field("certificates", &self.certs.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use rcgen::{
        BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, Issuer, KeyPair,
        KeyUsagePurpose,
    };

    use super::*;

    fn self_signed(san: &str) -> rcgen::Certificate {
        let key = KeyPair::generate().unwrap();
        CertificateParams::new(vec![san.to_owned()])
            .unwrap()
            .self_signed(&key)
            .unwrap()
    }

    fn ca(common_name: &str) -> (rcgen::Certificate, KeyPair) {
        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, common_name);
        params.distinguished_name = dn;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
        let key = KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap();
        (cert, key)
    }

    fn leaf(san: &str, ca_cert: &rcgen::Certificate, ca_key: &KeyPair) -> rcgen::Certificate {
        let issuer = Issuer::from_ca_cert_pem(&ca_cert.pem(), ca_key).unwrap();
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(vec![san.to_owned()]).unwrap();
        params.extended_key_usages = vec![rcgen::ExtendedKeyUsagePurpose::ServerAuth];
        params.signed_by(&key, &issuer).unwrap()
    }

    #[test]
    fn rejects_non_pem_text() {
        let err = TrustPool::from_pem(b"not-a-cert").unwrap_err();
        assert!(matches!(err, TrustError::InvalidCertificate { .. }));
    }

    #[test]
    fn rejects_empty_input() {
        let err = TrustPool::from_pem(b"").unwrap_err();
        assert!(matches!(err, TrustError::InvalidCertificate { .. }));
    }

    #[test]
    fn rejects_key_only_pem() {
        let key = KeyPair::generate().unwrap();
        let err = TrustPool::from_pem(key.serialize_pem().as_bytes()).unwrap_err();
        match err {
            TrustError::InvalidCertificate { reason } => {
                assert!(reason.contains("no certificates"));
            }
            other => panic!("expected InvalidCertificate, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unterminated_certificate_section() {
        let cert = self_signed("localhost");
        let pem = cert.pem();
        let truncated = pem.split("-----END").next().unwrap();
        match TrustPool::from_pem(truncated.as_bytes()).unwrap_err() {
            TrustError::InvalidCertificate { reason } => {
                assert!(reason.starts_with("malformed PEM"), "{reason}");
            }
            other => panic!("expected InvalidCertificate, got {other:?}"),
        }
    }

    #[test]
    fn rejects_corrupted_certificate_body() {
        let pem = "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n";
        let err = TrustPool::from_pem(pem.as_bytes()).unwrap_err();
        assert!(matches!(err, TrustError::InvalidCertificate { .. }));
    }

    #[test]
    fn self_signed_certificate_is_trusted() {
        let cert = self_signed("localhost");
        let pool = TrustPool::from_pem(cert.pem().as_bytes()).unwrap();
        assert_eq!(pool.len(), 1);
        assert!(!pool.is_empty());
        pool.verify_server(cert.der(), &[], "localhost").unwrap();
    }

    #[test]
    fn other_self_signed_certificate_is_rejected() {
        let trusted = self_signed("localhost");
        let stranger = self_signed("localhost");
        let pool = TrustPool::from_pem(trusted.pem().as_bytes()).unwrap();
        let err = pool.verify_server(stranger.der(), &[], "localhost").unwrap_err();
        assert!(matches!(err, TrustError::Rejected(_)));
    }

    #[test]
    fn leaf_signed_by_pool_ca_is_trusted() {
        let (ca_cert, ca_key) = ca("demo-http");
        let server = leaf("demo-es-public.ns1.svc.cluster.local", &ca_cert, &ca_key);
        let pool = TrustPool::from_pem(ca_cert.pem().as_bytes()).unwrap();
        pool.verify_server(server.der(), &[], "demo-es-public.ns1.svc.cluster.local")
            .unwrap();
    }

    #[test]
    fn leaf_with_wrong_name_is_rejected() {
        let (ca_cert, ca_key) = ca("demo-http");
        let server = leaf("other-es-public.ns1.svc.cluster.local", &ca_cert, &ca_key);
        let pool = TrustPool::from_pem(ca_cert.pem().as_bytes()).unwrap();
        assert!(
            pool.verify_server(server.der(), &[], "demo-es-public.ns1.svc.cluster.local")
                .is_err()
        );
    }

    #[test]
    fn leaf_signed_by_foreign_ca_is_rejected() {
        let (trusted_ca, _) = ca("trusted");
        let (foreign_ca, foreign_key) = ca("foreign");
        let server = leaf("localhost", &foreign_ca, &foreign_key);
        let pool = TrustPool::from_pem(trusted_ca.pem().as_bytes()).unwrap();
        assert!(pool.verify_server(server.der(), &[], "localhost").is_err());
    }

    #[test]
    fn accepts_concatenated_pem_blocks() {
        let (first, _) = ca("first");
        let (second, second_key) = ca("second");
        let bundle = format!("{}{}", first.pem(), second.pem());
        let pool = TrustPool::from_pem(bundle.as_bytes()).unwrap();
        assert_eq!(pool.len(), 2);

        let server = leaf("localhost", &second, &second_key);
        pool.verify_server(server.der(), &[], "localhost").unwrap();
    }

    #[test]
    fn skips_non_certificate_sections() {
        let (ca_cert, ca_key) = ca("mixed");
        let bundle = format!("{}{}", ca_key.serialize_pem(), ca_cert.pem());
        let pool = TrustPool::from_pem(bundle.as_bytes()).unwrap();
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn same_input_yields_same_accepted_set() {
        let (ca_cert, _) = ca("stable");
        let pem = ca_cert.pem();
        let a = TrustPool::from_pem(pem.as_bytes()).unwrap();
        let b = TrustPool::from_pem(pem.as_bytes()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.certificates()[0].as_ref(), ca_cert.der().as_ref());
    }

    #[test]
    fn client_config_builds() {
        let cert = self_signed("localhost");
        let pool = TrustPool::from_pem(cert.pem().as_bytes()).unwrap();
        let config = pool.client_config().unwrap();
        assert!(config.alpn_protocols.is_empty());
    }

    #[test]
    fn debug_shows_count_only() {
        let cert = self_signed("localhost");
        let pool = TrustPool::from_pem(cert.pem().as_bytes()).unwrap();
        assert_eq!(format!("{pool:?}"), "TrustPool { certificates: 1 }");
    }
}
