//! # Error Types
//!
//! Error handling for the RPC framework.
//!
//! Every fallible operation in the crate returns [`RpcError`]. The variants
//! follow the lifecycle of a call:
//!
//! ## Error Categories
//! - **Start-up**: [`RpcError::Bind`], [`RpcError::Listen`], [`RpcError::Dial`],
//!   [`RpcError::Tls`], [`RpcError::Config`]
//! - **Framing**: [`RpcError::Encode`], [`RpcError::Decode`],
//!   [`RpcError::UnexpectedMessage`]
//! - **Dispatch**: [`RpcError::InvalidServiceMethod`], [`RpcError::ServiceNotFound`],
//!   [`RpcError::MethodNotFound`], [`RpcError::ArgumentMismatch`],
//!   [`RpcError::Service`], [`RpcError::DispatchFault`]
//! - **Transport**: [`RpcError::Io`], [`RpcError::Connection`],
//!   [`RpcError::Timeout`], [`RpcError::Cancelled`], [`RpcError::Closed`]
//! - **Remote**: [`RpcError::Remote`] carries the message text of an error
//!   raised on the server side of a call.
//!
//! Transport errors are further sorted into graceful, timeout, and fatal
//! classes by [`crate::transport::classify`].
//!
//! ## Example Usage
//! ```rust
//! use network_rpc::error::{RpcError, Result};
//!
//! fn check_divisor(b: i64) -> Result<()> {
//!     if b == 0 {
//!         return Err(RpcError::Service("division by zero".into()));
//!     }
//!     Ok(())
//! }
//!
//! assert_eq!(check_divisor(0).unwrap_err().to_string(), "division by zero");
//! ```

use std::io;
use thiserror::Error;

/// Error message constants shared by log lines and error payloads.
pub mod constants {
    pub const ERR_EMPTY_TARGET: &str = "empty target";
    pub const ERR_TRUNCATED_FRAME: &str = "truncated frame";
    pub const ERR_OVERSIZED_FRAME: &str = "frame exceeds maximum size";
    pub const ERR_NON_FINITE_FLOAT: &str = "json cannot carry NaN or infinite floats";
    pub const ERR_NO_REQUEST: &str = "stream closed before a request arrived";
    pub const ERR_NO_RESPONSE: &str = "stream closed before a response arrived";
    pub const ERR_ENDPOINT_CLOSED: &str = "endpoint closed";
    pub const ERR_NO_PRIVATE_KEY: &str = "no private keys found";
    pub const ERR_SERVER_CLOSING: &str = "server closing";
}

/// Why a UDP bind attempt failed.
#[derive(Error, Debug)]
pub enum BindError {
    /// The port is taken; the binder moves on to the next candidate.
    #[error("address in use: {0}")]
    AddrInUse(String),

    /// Any other failure; the binder gives up immediately.
    #[error("failed to bind {addr}: {source}")]
    Other {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid UDP address {0:?}")]
    InvalidAddress(String),
}

// RpcError is the primary error type for all framework operations
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("connection error: {0}")]
    Connection(#[from] quinn::ConnectionError),

    #[error("failed to dial: {0}")]
    Dial(String),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error("listener failure: {0}")]
    Listen(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("unexpected message type")]
    UnexpectedMessage,

    #[error("invalid service method: {0}")]
    InvalidServiceMethod(String),

    #[error("service not found: {0}")]
    ServiceNotFound(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("argument mismatch: {0}")]
    ArgumentMismatch(String),

    /// The trailing error returned by a service method.
    #[error("{0}")]
    Service(String),

    /// A method panicked while being invoked.
    #[error("dispatch fault: {0}")]
    DispatchFault(String),

    /// An error reported by the remote peer inside a response.
    #[error("{0}")]
    Remote(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("operation timed out")]
    Timeout,

    #[error("operation cancelled")]
    Cancelled,

    #[error("closed: {0}")]
    Closed(&'static str),
}

impl From<tokio::time::error::Elapsed> for RpcError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        RpcError::Timeout
    }
}

/// Type alias for Results using RpcError
pub type Result<T> = std::result::Result<T, RpcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_display_bare_message() {
        assert_eq!(
            RpcError::Service("division by zero".into()).to_string(),
            "division by zero"
        );
        assert_eq!(RpcError::Remote("boom".into()).to_string(), "boom");
    }

    #[test]
    fn dispatch_errors_name_the_missing_part() {
        assert_eq!(
            RpcError::ServiceNotFound("Missing".into()).to_string(),
            "service not found: Missing"
        );
        assert_eq!(
            RpcError::InvalidServiceMethod("NoDotHere".into()).to_string(),
            "invalid service method: NoDotHere"
        );
    }

    #[test]
    fn bind_error_is_transparent() {
        let err: RpcError = BindError::AddrInUse("127.0.0.1:6121".into()).into();
        assert_eq!(err.to_string(), "address in use: 127.0.0.1:6121");
    }
}
