//! # TLS Configuration
//!
//! This file is part of the Network RPC project.
//!
//! It builds the rustls configurations QUIC connections are secured with.
//! QUIC mandates TLS 1.3, so both sides pin that version and negotiate the
//! [`ALPN_PROTOCOL`] identifier.
//!
//! ## Responsibilities
//! - Load server certificates from PEM files, or generate a self-signed one
//! - Build client trust from native roots, explicit certificates, or a pinned
//!   certificate hash
//! - Provide an insecure mode for development

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::{Certificate, ClientConfig, PrivateKey, RootCertStore, ServerConfig, ServerName};
use rustls_pemfile::{certs, pkcs8_private_keys};
use tracing::{debug, warn};

use crate::config::ALPN_PROTOCOL;
use crate::error::constants::ERR_NO_PRIVATE_KEY;
use crate::error::{Result, RpcError};

/// Where the server's certificate and key come from
#[derive(Debug, Clone)]
enum Identity {
    Files { cert_path: PathBuf, key_path: PathBuf },
    InMemory { chain: Vec<Certificate>, key: PrivateKey },
}

/// TLS server configuration
#[derive(Debug, Clone)]
pub struct TlsServerConfig {
    identity: Identity,
}

impl TlsServerConfig {
    /// Use a PEM certificate chain and PKCS#8 key from disk
    pub fn new<P: AsRef<Path>>(cert_path: P, key_path: P) -> Self {
        Self {
            identity: Identity::Files {
                cert_path: cert_path.as_ref().to_path_buf(),
                key_path: key_path.as_ref().to_path_buf(),
            },
        }
    }

    /// Use DER encoded certificates and PKCS#8 key already in memory
    pub fn from_der(chain: Vec<Vec<u8>>, key: Vec<u8>) -> Self {
        Self {
            identity: Identity::InMemory {
                chain: chain.into_iter().map(Certificate).collect(),
                key: PrivateKey(key),
            },
        }
    }

    /// Generate a self-signed certificate for bootstrapping and tests
    ///
    /// Covers `localhost` and the loopback addresses.
    pub fn self_signed() -> Result<Self> {
        let names = vec![
            "localhost".to_string(),
            "127.0.0.1".to_string(),
            "::1".to_string(),
        ];
        let generated = rcgen::generate_simple_self_signed(names)
            .map_err(|e| RpcError::Tls(format!("Certificate generation error: {e}")))?;

        debug!("Generated self-signed server certificate");
        Ok(Self::from_der(
            vec![generated.cert.der().to_vec()],
            generated.signing_key.serialize_der(),
        ))
    }

    /// The certificate chain this server presents
    pub fn certificate_chain(&self) -> Result<Vec<Certificate>> {
        match &self.identity {
            Identity::Files { cert_path, .. } => load_certs(cert_path),
            Identity::InMemory { chain, .. } => Ok(chain.clone()),
        }
    }

    fn load_identity(&self) -> Result<(Vec<Certificate>, PrivateKey)> {
        match &self.identity {
            Identity::Files {
                cert_path,
                key_path,
            } => Ok((load_certs(cert_path)?, load_private_key(key_path)?)),
            Identity::InMemory { chain, key } => Ok((chain.clone(), key.clone())),
        }
    }

    /// Build the rustls server configuration
    pub fn load_server_config(&self) -> Result<ServerConfig> {
        let (chain, key) = self.load_identity()?;
        if chain.is_empty() {
            return Err(RpcError::Tls("No certificates found".into()));
        }

        let mut config = ServerConfig::builder()
            .with_safe_default_cipher_suites()
            .with_safe_default_kx_groups()
            .with_protocol_versions(&[&rustls::version::TLS13])
            .map_err(|e| RpcError::Tls(format!("TLS error: {e}")))?
            .with_no_client_auth()
            .with_single_cert(chain, key)
            .map_err(|e| RpcError::Tls(format!("TLS error: {e}")))?;

        config.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];
        Ok(config)
    }
}

fn load_certs(path: &Path) -> Result<Vec<Certificate>> {
    let file = File::open(path)
        .map_err(|e| RpcError::Tls(format!("Failed to open cert file: {e}")))?;
    let mut reader = BufReader::new(file);
    let chain = certs(&mut reader)
        .map_err(|_| RpcError::Tls("Failed to parse certificate".into()))?;
    Ok(chain.into_iter().map(Certificate).collect())
}

fn load_private_key(path: &Path) -> Result<PrivateKey> {
    let file = File::open(path)
        .map_err(|e| RpcError::Tls(format!("Failed to open key file: {e}")))?;
    let mut reader = BufReader::new(file);
    let mut keys = pkcs8_private_keys(&mut reader)
        .map_err(|_| RpcError::Tls("Failed to parse private key".into()))?;

    if keys.is_empty() {
        return Err(RpcError::Tls(ERR_NO_PRIVATE_KEY.into()));
    }
    Ok(PrivateKey(keys.swap_remove(0)))
}

/// How the client decides to trust the server certificate
#[derive(Debug, Clone)]
enum Trust {
    NativeRoots,
    Certificates(Vec<Certificate>),
    Pinned(Vec<u8>),
    Insecure,
}

/// TLS Client Configuration
#[derive(Debug, Clone)]
pub struct TlsClientConfig {
    trust: Trust,
}

impl Default for TlsClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TlsClientConfig {
    /// Verify servers against the platform's native root certificates
    pub fn new() -> Self {
        Self {
            trust: Trust::NativeRoots,
        }
    }

    /// Trust exactly the given certificate (for example a self-signed server)
    pub fn with_trusted_cert(mut self, cert: Certificate) -> Self {
        match &mut self.trust {
            Trust::Certificates(list) => list.push(cert),
            _ => self.trust = Trust::Certificates(vec![cert]),
        }
        self
    }

    /// Trust every certificate found in a PEM file
    pub fn with_trusted_cert_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        for cert in load_certs(path.as_ref())? {
            self = self.with_trusted_cert(cert);
        }
        Ok(self)
    }

    /// Accept only a server whose certificate has this SHA-256 fingerprint
    pub fn with_pinned_cert_hash(mut self, hash: Vec<u8>) -> Self {
        if hash.len() != 32 {
            warn!(
                "Certificate hash has unexpected length: {} (expected 32 bytes for SHA-256)",
                hash.len()
            );
        }
        self.trust = Trust::Pinned(hash);
        self
    }

    /// Allow insecure connections (skip certificate verification)
    ///
    /// # WARNING: Security Risk
    /// This mode disables certificate verification entirely and should ONLY be used for
    /// development and testing.
    pub fn insecure(mut self) -> Self {
        warn!("INSECURE MODE ENABLED: Certificate verification is disabled. This should only be used for development/testing.");
        self.trust = Trust::Insecure;
        self
    }

    /// Calculate SHA-256 hash for a certificate to use with pinning
    pub fn calculate_cert_hash(cert: &Certificate) -> Vec<u8> {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(&cert.0);
        hasher.finalize().to_vec()
    }

    /// Build the rustls client configuration
    pub fn load_client_config(&self) -> Result<ClientConfig> {
        let builder = ClientConfig::builder()
            .with_safe_default_cipher_suites()
            .with_safe_default_kx_groups()
            .with_protocol_versions(&[&rustls::version::TLS13])
            .map_err(|e| RpcError::Tls(format!("TLS error: {e}")))?;

        let mut config = match &self.trust {
            Trust::NativeRoots => {
                let native_certs = rustls_native_certs::load_native_certs()
                    .map_err(|e| RpcError::Tls(format!("Failed to load native certs: {e}")))?;
                let der: Vec<Vec<u8>> = native_certs.into_iter().map(|c| c.0).collect();

                let mut root_store = RootCertStore::empty();
                let (added, skipped) = root_store.add_parsable_certificates(&der);
                debug!(added, skipped, "Loaded native root certificates");

                builder
                    .with_root_certificates(root_store)
                    .with_no_client_auth()
            }
            Trust::Certificates(list) => {
                let mut root_store = RootCertStore::empty();
                for cert in list {
                    root_store.add(cert).map_err(|e| {
                        RpcError::Tls(format!("Failed to add cert to root store: {e}"))
                    })?;
                }
                builder
                    .with_root_certificates(root_store)
                    .with_no_client_auth()
            }
            Trust::Pinned(hash) => builder
                .with_custom_certificate_verifier(Arc::new(CertificateFingerprint {
                    fingerprint: hash.clone(),
                }))
                .with_no_client_auth(),
            Trust::Insecure => builder
                .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
                .with_no_client_auth(),
        };

        config.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];
        Ok(config)
    }
}

/// Validate a server name before handing it to the handshake
pub fn server_name(name: &str) -> Result<ServerName> {
    ServerName::try_from(name).map_err(|_| RpcError::Tls(format!("Invalid server name: {name}")))
}

struct CertificateFingerprint {
    fingerprint: Vec<u8>,
}

impl rustls::client::ServerCertVerifier for CertificateFingerprint {
    fn verify_server_cert(
        &self,
        end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: std::time::SystemTime,
    ) -> std::result::Result<rustls::client::ServerCertVerified, rustls::Error> {
        if TlsClientConfig::calculate_cert_hash(end_entity) == self.fingerprint {
            Ok(rustls::client::ServerCertVerified::assertion())
        } else {
            Err(rustls::Error::General(
                "Pinned certificate hash mismatch".into(),
            ))
        }
    }
}

struct AcceptAnyServerCert;

impl rustls::client::ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: std::time::SystemTime,
    ) -> std::result::Result<rustls::client::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::ServerCertVerified::assertion())
    }
}
