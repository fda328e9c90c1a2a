//! # UDP Transport Binder
//!
//! Acquires the local UDP socket a QUIC endpoint runs on.
//!
//! A port of zero is replaced by [`DEFAULT_PORT`]. When the port is taken the
//! binder walks upward `port, port+1, ...` for [`MAX_BIND_ATTEMPTS`] tries,
//! skipping only on "address in use". Any other bind failure aborts straight
//! away. When every candidate is busy it falls back once to an OS-assigned
//! port.
//!
//! The resulting [`Transport`] holds the socket open until it is closed or
//! the last clone is dropped.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::DEFAULT_PORT;
use crate::error::constants::ERR_SERVER_CLOSING;
use crate::error::{BindError, Result, RpcError};

/// Number of consecutive ports tried before the ephemeral fallback
pub const MAX_BIND_ATTEMPTS: u16 = 32;

/// Parse `host:port`, `:port`, or a bare `host` into a socket address.
///
/// A missing port is reported as port 0.
pub fn parse_bind_addr(addr: &str) -> std::result::Result<SocketAddr, BindError> {
    let invalid = || BindError::InvalidAddress(addr.to_string());
    if addr.is_empty() {
        return Err(invalid());
    }

    let candidate = if addr.starts_with(':') {
        format!("{}{addr}", Ipv4Addr::UNSPECIFIED)
    } else {
        addr.to_string()
    };

    if let Ok(sa) = candidate.parse::<SocketAddr>() {
        return Ok(sa);
    }
    if let Ok(ip) = candidate.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, 0));
    }

    let has_port = candidate
        .rsplit_once(':')
        .is_some_and(|(_, port)| port.parse::<u16>().is_ok());
    let with_port = if has_port {
        candidate
    } else {
        format!("{candidate}:0")
    };

    with_port
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(invalid)
}

fn classify_bind_error(addr: SocketAddr, err: io::Error) -> BindError {
    if err.kind() == io::ErrorKind::AddrInUse {
        BindError::AddrInUse(addr.to_string())
    } else {
        BindError::Other {
            addr: addr.to_string(),
            source: err,
        }
    }
}

/// Run the port retry policy with a caller-supplied bind primitive.
///
/// Returns the bound resource and the address that was requested for it.
pub fn bind_with<T, F>(addr: &str, mut bind: F) -> Result<(T, SocketAddr)>
where
    F: FnMut(SocketAddr) -> io::Result<T>,
{
    let base = parse_bind_addr(addr)?;
    let port = if base.port() == 0 {
        DEFAULT_PORT
    } else {
        base.port()
    };

    for attempt in 0..MAX_BIND_ATTEMPTS {
        let Some(try_port) = port.checked_add(attempt) else {
            break;
        };
        let try_addr = SocketAddr::new(base.ip(), try_port);

        match bind(try_addr).map_err(|e| classify_bind_error(try_addr, e)) {
            Ok(bound) => {
                info!(addr = %try_addr, "Bound UDP socket");
                return Ok((bound, try_addr));
            }
            Err(BindError::AddrInUse(_)) => {
                warn!(port = try_port, "Port busy, trying another port");
            }
            Err(err) => return Err(err.into()),
        }
    }

    let ephemeral = SocketAddr::new(base.ip(), 0);
    let bound = bind(ephemeral).map_err(|e| classify_bind_error(ephemeral, e))?;
    info!(addr = %ephemeral, "Bound UDP socket on an ephemeral port");
    Ok((bound, ephemeral))
}

/// Bind a UDP socket following the retry policy.
pub fn bind_udp(addr: &str) -> Result<UdpSocket> {
    bind_with(addr, UdpSocket::bind).map(|(socket, _)| socket)
}

/// A bound QUIC endpoint ready to listen or dial.
///
/// Clones share the same socket. A server handed a `Transport` never closes
/// it; the party that created it does.
#[derive(Debug, Clone)]
pub struct Transport {
    endpoint: quinn::Endpoint,
    local_addr: SocketAddr,
}

impl Transport {
    /// Bind `addr` with the port retry policy.
    ///
    /// Must be called from within a Tokio runtime.
    #[instrument]
    pub fn bind(addr: &str) -> Result<Self> {
        Self::from_socket(bind_udp(addr)?)
    }

    /// Wrap a socket the caller already bound.
    pub fn from_socket(socket: UdpSocket) -> Result<Self> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(RpcError::Listen(
                "transport must be created inside a Tokio runtime".into(),
            ));
        }
        socket.set_nonblocking(true)?;
        let local_addr = socket.local_addr()?;
        let endpoint = quinn::Endpoint::new(
            quinn::EndpointConfig::default(),
            None,
            socket,
            Arc::new(quinn::TokioRuntime),
        )?;
        info!(addr = %local_addr, "Created QUIC transport");
        Ok(Self {
            endpoint,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn endpoint(&self) -> &quinn::Endpoint {
        &self.endpoint
    }

    /// Close every connection on this transport and release the socket.
    pub fn close(&self) {
        self.endpoint
            .close(quinn::VarInt::from_u32(0), ERR_SERVER_CLOSING.as_bytes());
    }

    /// Wait until all connections on this transport have drained.
    pub async fn wait_idle(&self) {
        self.endpoint.wait_idle().await;
    }
}
