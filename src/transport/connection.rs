//! # Connection Establishment
//!
//! Client side: [`dial`] resolves a `host:port` target and completes a QUIC
//! handshake. Unset options fall back to a TLS 1.3 configuration scoped to
//! the target host and the default keep-alive.
//!
//! Server side: [`Listener`] installs a server configuration on a bound
//! [`Transport`] and yields incoming handshakes.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::config::{ClientSettings, TransportSettings};
use crate::error::constants::{ERR_EMPTY_TARGET, ERR_ENDPOINT_CLOSED, ERR_SERVER_CLOSING};
use crate::error::{Result, RpcError};
use crate::transport::binder::Transport;
use crate::transport::tls::{server_name, TlsClientConfig, TlsServerConfig};

#[derive(Debug, Clone)]
enum ClientTls {
    Settings(TlsClientConfig),
    Rustls(Arc<rustls::ClientConfig>),
}

/// Options for [`dial`]. Every field is optional.
#[derive(Debug, Clone, Default)]
pub struct ConnectionConfig {
    tls: Option<ClientTls>,
    transport: Option<TransportSettings>,
    server_name: Option<String>,
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the serde client and transport settings
    pub fn from_settings(client: &ClientSettings, transport: &TransportSettings) -> Result<Self> {
        let tls = if client.insecure {
            TlsClientConfig::new().insecure()
        } else if let Some(path) = &client.trusted_cert_path {
            TlsClientConfig::new().with_trusted_cert_file(path)?
        } else {
            TlsClientConfig::new()
        };

        Ok(Self::new()
            .with_tls(tls)
            .with_transport_settings(transport.clone()))
    }

    pub fn with_tls(mut self, tls: TlsClientConfig) -> Self {
        self.tls = Some(ClientTls::Settings(tls));
        self
    }

    /// Use a prebuilt rustls configuration as is
    pub fn with_tls_config(mut self, config: Arc<rustls::ClientConfig>) -> Self {
        self.tls = Some(ClientTls::Rustls(config));
        self
    }

    pub fn with_transport_settings(mut self, settings: TransportSettings) -> Self {
        self.transport = Some(settings);
        self
    }

    /// Override the name the server certificate is verified against
    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    fn quinn_client_config(&self, host: &str) -> Result<quinn::ClientConfig> {
        let crypto = match &self.tls {
            Some(ClientTls::Rustls(config)) => config.clone(),
            Some(ClientTls::Settings(tls)) => Arc::new(tls.load_client_config()?),
            None => {
                debug!(host, "Using default TLS client configuration");
                Arc::new(TlsClientConfig::new().load_client_config()?)
            }
        };
        let transport = self.transport.clone().unwrap_or_default().to_quinn()?;

        let mut config = quinn::ClientConfig::new(crypto);
        config.transport_config(Arc::new(transport));
        Ok(config)
    }
}

/// Split `host:port`, accepting bracketed IPv6 hosts
pub fn split_host_port(target: &str) -> Result<(&str, u16)> {
    let invalid = |why: &str| RpcError::Dial(format!("{target}: {why}"));

    let (host, port) = target
        .rsplit_once(':')
        .ok_or_else(|| invalid("missing port"))?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() {
        return Err(invalid("missing host"));
    }
    if host.contains(':') && !target.starts_with('[') {
        return Err(invalid("too many colons in address"));
    }
    let port = port.parse::<u16>().map_err(|_| invalid("invalid port"))?;
    Ok((host, port))
}

/// Dial `target` and complete the QUIC handshake.
#[instrument(skip(config))]
pub async fn dial(target: &str, config: Option<ConnectionConfig>) -> Result<Connection> {
    if target.is_empty() {
        return Err(RpcError::Dial(ERR_EMPTY_TARGET.into()));
    }
    let (host, port) = split_host_port(target)?;
    let config = config.unwrap_or_default();

    let remote = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| RpcError::Dial(format!("{target}: {e}")))?
        .next()
        .ok_or_else(|| RpcError::Dial(format!("{target}: no addresses resolved")))?;

    let name = config.server_name.as_deref().unwrap_or(host);
    server_name(name).map_err(|e| RpcError::Dial(e.to_string()))?;
    let client_config = config
        .quinn_client_config(host)
        .map_err(|e| RpcError::Dial(e.to_string()))?;

    let local: SocketAddr = if remote.is_ipv6() {
        SocketAddr::from(([0u16; 8], 0))
    } else {
        SocketAddr::from(([0u8; 4], 0))
    };
    let endpoint = quinn::Endpoint::client(local)
        .map_err(|e| RpcError::Dial(format!("failed to bind client endpoint: {e}")))?;

    let connecting = endpoint
        .connect_with(client_config, remote, name)
        .map_err(|e| RpcError::Dial(format!("{target}: {e}")))?;
    let inner = connecting
        .await
        .map_err(|e| RpcError::Dial(format!("{target}: {e}")))?;

    info!(peer = %remote, "Connected");
    Ok(Connection {
        inner,
        endpoint: Some(endpoint),
    })
}

/// A secured, multiplexed QUIC connection.
///
/// Dropping a `Connection` closes it.
#[derive(Debug)]
pub struct Connection {
    inner: quinn::Connection,
    endpoint: Option<quinn::Endpoint>,
}

impl Connection {
    /// Wrap a connection accepted or dialed elsewhere
    pub fn from_quinn(inner: quinn::Connection) -> Self {
        Self {
            inner,
            endpoint: None,
        }
    }

    /// Open a bidirectional stream for one exchange
    pub async fn open_stream(&self) -> Result<(quinn::SendStream, quinn::RecvStream)> {
        Ok(self.inner.open_bi().await?)
    }

    pub fn remote_address(&self) -> SocketAddr {
        self.inner.remote_address()
    }

    pub fn inner(&self) -> &quinn::Connection {
        &self.inner
    }

    /// Close with application code 0
    pub fn close(&self) {
        self.inner.close(quinn::VarInt::from_u32(0), b"");
    }

    /// Close and wait for the close to reach the peer
    pub async fn shutdown(mut self) {
        self.close();
        if let Some(endpoint) = self.endpoint.take() {
            endpoint.wait_idle().await;
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Build the quinn server configuration for a listener
pub fn server_config(
    tls: &TlsServerConfig,
    settings: &TransportSettings,
) -> Result<quinn::ServerConfig> {
    let crypto = tls
        .load_server_config()
        .map_err(|e| RpcError::Listen(e.to_string()))?;
    let transport = settings
        .to_quinn()
        .map_err(|e| RpcError::Listen(e.to_string()))?;

    let mut config = quinn::ServerConfig::with_crypto(Arc::new(crypto));
    config.transport_config(Arc::new(transport));
    Ok(config)
}

/// Accepts incoming connections on a [`Transport`]
#[derive(Debug)]
pub struct Listener {
    transport: Transport,
    owned: bool,
}

impl Listener {
    /// Start listening. The transport stays open when the listener is dropped.
    pub fn new(
        transport: Transport,
        tls: &TlsServerConfig,
        settings: &TransportSettings,
    ) -> Result<Self> {
        let config = server_config(tls, settings)?;
        transport.endpoint().set_server_config(Some(config));
        info!(addr = %transport.local_addr(), "Listening");
        Ok(Self {
            transport,
            owned: false,
        })
    }

    /// Close the transport when the listener is dropped
    pub fn owning(mut self) -> Self {
        self.owned = true;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    /// Wait for the next incoming handshake
    pub async fn accept(&self) -> Result<quinn::Connecting> {
        self.transport
            .endpoint()
            .accept()
            .await
            .ok_or(RpcError::Closed(ERR_ENDPOINT_CLOSED))
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if self.owned {
            debug!(addr = %self.transport.local_addr(), reason = ERR_SERVER_CLOSING, "Closing owned transport");
            self.transport.close();
        } else {
            self.transport.endpoint().set_server_config(None);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn splits_targets() {
        assert_eq!(split_host_port("localhost:6121").unwrap(), ("localhost", 6121));
        assert_eq!(split_host_port("[::1]:7000").unwrap(), ("::1", 7000));
        assert!(split_host_port("localhost").is_err());
        assert!(split_host_port(":6121").is_err());
        assert!(split_host_port("host:notaport").is_err());
        assert!(split_host_port("::1:7000").is_err());
    }

    #[tokio::test]
    async fn empty_target_fails_to_dial() {
        let err = dial("", None).await.unwrap_err();
        assert!(matches!(err, RpcError::Dial(ref m) if m == ERR_EMPTY_TARGET));
    }

    #[tokio::test]
    async fn unparsable_target_fails_to_dial() {
        let err = dial("no-port-here", None).await.unwrap_err();
        assert!(matches!(err, RpcError::Dial(_)));
    }

    #[tokio::test]
    async fn closed_endpoint_is_a_graceful_accept_error() {
        use crate::transport::classify::Classify;

        let transport = Transport::from_socket(std::net::UdpSocket::bind("127.0.0.1:0").unwrap())
            .unwrap();
        let tls = TlsServerConfig::self_signed().unwrap();
        let listener = Listener::new(transport.clone(), &tls, &TransportSettings::default()).unwrap();

        transport.close();
        let err = listener.accept().await.unwrap_err();
        assert!(err.classify().is_graceful());
    }
}
