//! TLS support using rustls
//!
//! Loads a PEM certificate chain and private key from disk and builds the
//! acceptor used by the file server. Only HTTP/1.1 is offered over ALPN.

use crate::{Error, Result};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

/// TLS configuration
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    /// ALPN protocols (default: ["http/1.1"])
    pub alpn_protocols: Vec<Vec<u8>>,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self::new("temporary.crt", "temporary.key")
    }
}

impl TlsConfig {
    /// Create a new TLS config
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
            alpn_protocols: vec![b"http/1.1".to_vec()],
        }
    }

    /// Build rustls ServerConfig
    pub fn build_server_config(&self) -> Result<Arc<rustls::ServerConfig>> {
        let certs = load_certs(&self.cert_path)?;
        let key = load_private_key(&self.key_path)?;

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let mut config = rustls::ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| Error::Tls(e.to_string()))?
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| Error::Tls(e.to_string()))?;

        config.alpn_protocols = self.alpn_protocols.clone();

        Ok(Arc::new(config))
    }

    /// Build the acceptor wrapping accepted sockets
    pub fn build_acceptor(&self) -> Result<TlsAcceptor> {
        Ok(TlsAcceptor::from(self.build_server_config()?))
    }
}

/// Load certificates from PEM file
pub fn load_certs(path: impl AsRef<Path>) -> Result<Vec<CertificateDer<'static>>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        Error::Tls(format!("Failed to open cert file {}: {}", path.display(), e))
    })?;
    let mut reader = BufReader::new(file);

    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Tls(format!("Failed to parse certs: {}", e)))?;

    if certs.is_empty() {
        return Err(Error::Tls(format!(
            "No certificates found in {}",
            path.display()
        )));
    }

    Ok(certs)
}

/// Load private key from PEM file (PKCS#1, PKCS#8 or SEC1)
pub fn load_private_key(path: impl AsRef<Path>) -> Result<PrivateKeyDer<'static>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        Error::Tls(format!("Failed to open key file {}: {}", path.display(), e))
    })?;
    let mut reader = BufReader::new(file);

    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| Error::Tls(format!("Failed to parse key: {}", e)))?
        .ok_or_else(|| Error::Tls(format!("No private key found in {}", path.display())))
}
