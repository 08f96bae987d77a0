//! TLS material for `wss://` brokers.
//!
//! The client certificate and key are PEM files. Without a CA bundle the
//! webpki roots are trusted; `insecure` accepts any server certificate and is
//! only meant for self-signed test brokers.

use std::path::Path;
use std::sync::Arc;

use rustls::RootCertStore;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};

use crate::config::BrokerSettings;
use crate::utils::BenchError;

/// Build the client TLS config when a certificate pair is configured.
pub fn from_settings(
    broker: &BrokerSettings,
) -> Result<Option<Arc<rustls::ClientConfig>>, BenchError> {
    match (&broker.client_cert, &broker.client_key) {
        (Some(cert), Some(key)) => Ok(Some(build_client_config(
            cert,
            key,
            broker.ca_cert.as_deref(),
            broker.insecure,
        )?)),
        _ => Ok(None),
    }
}

pub fn build_client_config(
    cert_file: &Path,
    key_file: &Path,
    ca_file: Option<&Path>,
    insecure: bool,
) -> Result<Arc<rustls::ClientConfig>, BenchError> {
    let certs = load_certs(cert_file)?;
    let key = PrivateKeyDer::from_pem_file(key_file).map_err(|e| {
        BenchError::Tls(format!(
            "error reading private key {}: {e}",
            key_file.display()
        ))
    })?;

    let builder = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| BenchError::Tls(e.to_string()))?;

    let builder = if insecure {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(danger::NoCertVerifier))
    } else {
        builder.with_root_certificates(root_store(ca_file)?)
    };

    let config = builder
        .with_client_auth_cert(certs, key)
        .map_err(|e| BenchError::Tls(format!("invalid client certificate: {e}")))?;

    Ok(Arc::new(config))
}

/// Trust store without client authentication, used for plain `wss://`.
pub fn default_client_config() -> Result<Arc<rustls::ClientConfig>, BenchError> {
    let config = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| BenchError::Tls(e.to_string()))?
    .with_root_certificates(root_store(None)?)
    .with_no_client_auth();
    Ok(Arc::new(config))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, BenchError> {
    let read_err = |e: rustls::pki_types::pem::Error| {
        BenchError::Tls(format!(
            "error reading certificate file {}: {e}",
            path.display()
        ))
    };

    let certs = CertificateDer::pem_file_iter(path)
        .map_err(read_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_err)?;

    if certs.is_empty() {
        return Err(BenchError::Tls(format!(
            "no certificate found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

fn root_store(ca_file: Option<&Path>) -> Result<RootCertStore, BenchError> {
    let mut roots = RootCertStore::empty();
    match ca_file {
        Some(path) => {
            for cert in load_certs(path)? {
                roots.add(cert).map_err(|e| {
                    BenchError::Tls(format!("error parsing CA certificate {}: {e}", path.display()))
                })?;
            }
        }
        None => roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned()),
    }
    Ok(roots)
}

mod danger {
    use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
    use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
    use rustls::{DigitallySignedStruct, SignatureScheme};

    /// Accepts any server certificate.
    #[derive(Debug)]
    pub(super) struct NoCertVerifier;

    impl ServerCertVerifier for NoCertVerifier {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> Result<ServerCertVerified, rustls::Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn verify_tls13_signature(
            &self,
            _message: &[u8],
            _cert: &CertificateDer<'_>,
            _dss: &DigitallySignedStruct,
        ) -> Result<HandshakeSignatureValid, rustls::Error> {
            Ok(HandshakeSignatureValid::assertion())
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            vec![
                SignatureScheme::RSA_PKCS1_SHA256,
                SignatureScheme::RSA_PKCS1_SHA384,
                SignatureScheme::RSA_PSS_SHA256,
                SignatureScheme::ECDSA_NISTP256_SHA256,
                SignatureScheme::ECDSA_NISTP384_SHA384,
                SignatureScheme::ED25519,
            ]
        }
    }
}
