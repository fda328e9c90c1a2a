//! # Transport Error Classification
//!
//! Every blocking accept or read on the transport can fail for one of three
//! reasons, and callers react differently to each:
//!
//! - [`ErrorClass::GracefulClose`]: orderly termination. The loop stops and
//!   reports success.
//! - [`ErrorClass::Timeout`]: a deadline or idle timer fired. The loop stops
//!   quietly but the exit is logged as a timeout.
//! - [`ErrorClass::Fatal`]: anything else. Logged and propagated.

use std::fmt;
use std::io;

use crate::error::RpcError;

/// Outcome class of a transport failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    GracefulClose,
    Timeout,
    Fatal,
}

impl ErrorClass {
    pub fn is_graceful(self) -> bool {
        self == ErrorClass::GracefulClose
    }

    pub fn is_timeout(self) -> bool {
        self == ErrorClass::Timeout
    }

    pub fn is_fatal(self) -> bool {
        self == ErrorClass::Fatal
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorClass::GracefulClose => "graceful",
            ErrorClass::Timeout => "timeout",
            ErrorClass::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

/// Sort an error into an [`ErrorClass`]
pub trait Classify {
    fn classify(&self) -> ErrorClass;
}

impl Classify for quinn::ConnectionError {
    fn classify(&self) -> ErrorClass {
        use quinn::ConnectionError::*;
        match self {
            ApplicationClosed(_) | LocallyClosed => ErrorClass::GracefulClose,
            // transport close with NO_ERROR (0)
            ConnectionClosed(close) if u64::from(close.error_code) == 0 => ErrorClass::GracefulClose,
            TimedOut => ErrorClass::Timeout,
            VersionMismatch | TransportError(_) | ConnectionClosed(_) | Reset => ErrorClass::Fatal,
        }
    }
}

impl Classify for quinn::ReadError {
    fn classify(&self) -> ErrorClass {
        use quinn::ReadError::*;
        match self {
            Reset(_) | UnknownStream => ErrorClass::GracefulClose,
            ConnectionLost(e) => e.classify(),
            IllegalOrderedRead | ZeroRttRejected => ErrorClass::Fatal,
        }
    }
}

impl Classify for quinn::WriteError {
    fn classify(&self) -> ErrorClass {
        use quinn::WriteError::*;
        match self {
            Stopped(_) | UnknownStream => ErrorClass::GracefulClose,
            ConnectionLost(e) => e.classify(),
            ZeroRttRejected => ErrorClass::Fatal,
        }
    }
}

impl Classify for io::Error {
    fn classify(&self) -> ErrorClass {
        // quinn stream errors surface through AsyncRead/AsyncWrite as io::Error
        if let Some(inner) = self.get_ref() {
            if let Some(e) = inner.downcast_ref::<quinn::ReadError>() {
                return e.classify();
            }
            if let Some(e) = inner.downcast_ref::<quinn::WriteError>() {
                return e.classify();
            }
            if let Some(e) = inner.downcast_ref::<quinn::ConnectionError>() {
                return e.classify();
            }
        }

        match self.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected => ErrorClass::GracefulClose,
            io::ErrorKind::TimedOut => ErrorClass::Timeout,
            _ => ErrorClass::Fatal,
        }
    }
}

impl Classify for tokio::time::error::Elapsed {
    fn classify(&self) -> ErrorClass {
        ErrorClass::Timeout
    }
}

impl Classify for RpcError {
    fn classify(&self) -> ErrorClass {
        match self {
            RpcError::Io(e) => e.classify(),
            RpcError::Connection(e) => e.classify(),
            RpcError::Cancelled | RpcError::Closed(_) => ErrorClass::GracefulClose,
            RpcError::Timeout => ErrorClass::Timeout,
            _ => ErrorClass::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::error::constants::ERR_ENDPOINT_CLOSED;

    #[test]
    fn connection_errors() {
        assert_eq!(
            quinn::ConnectionError::LocallyClosed.classify(),
            ErrorClass::GracefulClose
        );
        assert_eq!(
            quinn::ConnectionError::TimedOut.classify(),
            ErrorClass::Timeout
        );
        assert_eq!(quinn::ConnectionError::Reset.classify(), ErrorClass::Fatal);
        assert_eq!(
            quinn::ConnectionError::VersionMismatch.classify(),
            ErrorClass::Fatal
        );
    }

    #[test]
    fn stream_errors() {
        let reset = quinn::ReadError::Reset(quinn::VarInt::from_u32(0));
        assert!(reset.classify().is_graceful());
        let stopped = quinn::WriteError::Stopped(quinn::VarInt::from_u32(0));
        assert!(stopped.classify().is_graceful());
        let lost = quinn::ReadError::ConnectionLost(quinn::ConnectionError::TimedOut);
        assert!(lost.classify().is_timeout());
        assert!(quinn::ReadError::IllegalOrderedRead.classify().is_fatal());
    }

    #[test]
    fn io_errors() {
        assert!(io::Error::from(io::ErrorKind::UnexpectedEof)
            .classify()
            .is_graceful());
        assert!(io::Error::from(io::ErrorKind::ConnectionAborted)
            .classify()
            .is_graceful());
        assert!(io::Error::from(io::ErrorKind::TimedOut)
            .classify()
            .is_timeout());
        assert!(io::Error::from(io::ErrorKind::PermissionDenied)
            .classify()
            .is_fatal());
    }

    #[test]
    fn io_errors_wrapping_quinn_errors_use_the_inner_class() {
        let wrapped = io::Error::new(
            io::ErrorKind::Other,
            quinn::ReadError::ConnectionLost(quinn::ConnectionError::LocallyClosed),
        );
        assert!(wrapped.classify().is_graceful());

        let wrapped = io::Error::new(io::ErrorKind::Other, quinn::ConnectionError::TimedOut);
        assert!(wrapped.classify().is_timeout());
    }

    #[test]
    fn rpc_errors() {
        assert!(RpcError::Cancelled.classify().is_graceful());
        assert!(RpcError::Closed(ERR_ENDPOINT_CLOSED).classify().is_graceful());
        assert!(RpcError::Timeout.classify().is_timeout());
        assert!(RpcError::Decode("bad".into()).classify().is_fatal());
        assert!(RpcError::Connection(quinn::ConnectionError::LocallyClosed)
            .classify()
            .is_graceful());
    }

    #[tokio::test]
    async fn elapsed_is_timeout() {
        let elapsed = tokio::time::timeout(
            std::time::Duration::from_millis(1),
            std::future::pending::<()>(),
        )
        .await
        .unwrap_err();
        assert!(elapsed.classify().is_timeout());
        assert!(RpcError::from(elapsed).classify().is_timeout());
    }
}
