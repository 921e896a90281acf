// Shared transport configuration for building reqwest::Client instances.
//
// The sensor client and the feed client share TLS, timeout, and bearer
// token settings through this module.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use secrecy::{ExposeSecret, SecretString};
use tokio_tungstenite::Connector;

use crate::error::Error;

const USER_AGENT: &str = concat!("hivewatch/", env!("CARGO_PKG_VERSION"));

/// TLS verification mode.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// Use the system certificate store.
    #[default]
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (self-hosted gateways with self-signed certs).
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
    /// Bearer token sent on every request, if any.
    pub token: Option<SecretString>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
            token: None,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    ///
    /// The bearer token (if set) is installed as a default header, so the
    /// individual endpoint methods never touch credentials.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT);

        if let Some(value) = self.authorization_header()? {
            let mut headers = HeaderMap::new();
            headers.insert(AUTHORIZATION, value);
            builder = builder.default_headers(headers);
        }

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }

    /// `Authorization: Bearer …` header value, marked sensitive.
    pub fn authorization_header(&self) -> Result<Option<HeaderValue>, Error> {
        let Some(ref token) = self.token else {
            return Ok(None);
        };
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|_| Error::Authentication {
                message: "token contains characters not allowed in a header".into(),
            })?;
        value.set_sensitive(true);
        Ok(Some(value))
    }

    /// Attach a bearer token.
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }
}

/// Build the TLS connector the feed client hands to tokio-tungstenite.
///
/// `None` keeps tokio-tungstenite's bundled webpki roots. A custom CA
/// replaces those roots with the certificates in the PEM file.
pub fn feed_connector(tls: &TlsMode) -> Result<Option<Connector>, Error> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(format!("unsupported TLS configuration: {e}")))?;

    let config = match tls {
        TlsMode::System => return Ok(None),
        TlsMode::CustomCa(path) => {
            let certs = CertificateDer::pem_file_iter(path)
                .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
            let mut roots = RootCertStore::empty();
            let (added, _ignored) = roots.add_parsable_certificates(certs);
            if added == 0 {
                return Err(Error::Tls(format!(
                    "no usable CA certificates in {}",
                    path.display()
                )));
            }
            builder.with_root_certificates(roots).with_no_client_auth()
        }
        TlsMode::DangerAcceptInvalid => builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCert(provider)))
            .with_no_client_auth(),
    };

    Ok(Some(Connector::Rustls(Arc::new(config))))
}

/// Skips chain and hostname checks but still verifies handshake signatures.
#[derive(Debug)]
struct AcceptAnyCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCert {
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
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn no_token_means_no_header() {
        let config = TransportConfig::default();
        assert!(config.authorization_header().unwrap().is_none());
    }

    #[test]
    fn token_becomes_sensitive_bearer_header() {
        let config = TransportConfig::default().with_token(SecretString::from("abc123".to_string()));
        let header = config.authorization_header().unwrap().unwrap();
        assert!(header.is_sensitive());
        assert_eq!(header.to_str().unwrap(), "Bearer abc123");
    }

    #[test]
    fn token_with_newline_is_rejected() {
        let config = TransportConfig::default().with_token(SecretString::from("bad\ntoken".to_string()));
        assert!(matches!(
            config.authorization_header(),
            Err(Error::Authentication { .. })
        ));
    }

    #[test]
    fn system_tls_keeps_default_feed_connector() {
        assert!(feed_connector(&TlsMode::System).unwrap().is_none());
    }

    #[test]
    fn accept_invalid_builds_rustls_feed_connector() {
        let connector = feed_connector(&TlsMode::DangerAcceptInvalid).unwrap();
        assert!(matches!(connector, Some(Connector::Rustls(_))));
    }

    #[test]
    fn missing_ca_file_fails_feed_connector() {
        let path = std::env::temp_dir().join("hivewatch-no-such-ca.pem");
        let result = feed_connector(&TlsMode::CustomCa(path));
        assert!(matches!(result, Err(Error::Tls(_))));
    }

    #[test]
    fn ca_file_without_certificates_fails_feed_connector() {
        let path = std::env::temp_dir().join(format!("hivewatch-empty-ca-{}.pem", std::process::id()));
        std::fs::write(&path, "not a certificate\n").unwrap();
        let result = feed_connector(&TlsMode::CustomCa(path.clone()));
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(Error::Tls(_))));
    }
}
