//! Accept, spawn, classify.
//!
//! The server's connection loop and each session's stream loop share one
//! policy: hand every accepted item to a callback, and on failure consult
//! [`Classify`] to decide how to stop.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::{Result, RpcError};
use crate::transport::classify::{Classify, ErrorClass};

/// How an accept loop ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Graceful,
    Timeout,
}

/// Run `accept` until it fails, the token is cancelled, or `deadline` passes.
///
/// Cancellation counts as a graceful close and an elapsed deadline as a
/// timeout. Fatal errors are logged and returned.
pub async fn accept_loop<T, A, Fut, H>(
    label: &str,
    shutdown: &CancellationToken,
    deadline: Option<Duration>,
    mut accept: A,
    mut on_item: H,
) -> Result<LoopExit>
where
    A: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    H: FnMut(T),
{
    let expiry = async {
        match deadline {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(expiry);

    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.cancelled() => Err(RpcError::Cancelled),
            _ = &mut expiry => Err(RpcError::Timeout),
            accepted = accept() => accepted,
        };

        let err = match next {
            Ok(item) => {
                on_item(item);
                continue;
            }
            Err(err) => err,
        };

        return match err.classify() {
            ErrorClass::GracefulClose => {
                info!(component = label, reason = %err, "Accept loop closed");
                Ok(LoopExit::Graceful)
            }
            ErrorClass::Timeout => {
                debug!(component = label, reason = %err, "Accept loop timed out");
                Ok(LoopExit::Timeout)
            }
            ErrorClass::Fatal => {
                error!(component = label, error = %err, "Accept loop failed");
                Err(err)
            }
        };
    }
}
