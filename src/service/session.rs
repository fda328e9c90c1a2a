//! # Session Handler
//!
//! Owns one accepted connection: completes the handshake, then accepts
//! streams and spawns a [`handle_stream`] task for each one until the peer
//! goes away or the server shuts down.
//!
//! On every exit the connection is closed with application code 0 so the
//! peer sees an orderly close instead of an idle timeout.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, warn, Instrument};

use crate::error::constants::ERR_SERVER_CLOSING;
use crate::error::RpcError;
use crate::service::stream::{handle_stream, StreamContext};
use crate::transport::accept_loop::accept_loop;
use crate::transport::classify::Classify;
use crate::utils::metrics::Metrics;

struct SessionGuard {
    connection: quinn::Connection,
    metrics: Arc<Metrics>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.connection.close(
            quinn::VarInt::from_u32(0),
            ERR_SERVER_CLOSING.as_bytes(),
        );
        self.metrics.connection_closed();
    }
}

/// Drive one connection until it closes or `shutdown` fires
pub async fn run_session(
    connecting: quinn::Connecting,
    ctx: StreamContext,
    shutdown: CancellationToken,
) {
    let metrics = Arc::clone(ctx.metrics());
    let connection = match connecting.await {
        Ok(connection) => connection,
        Err(e) => {
            metrics.handshake_failed();
            if e.classify().is_fatal() {
                warn!(error = %e, "Handshake failed");
            } else {
                debug!(reason = %e, "Handshake abandoned");
            }
            return;
        }
    };

    metrics.connection_established();
    debug!("Session started");
    let _guard = SessionGuard {
        connection: connection.clone(),
        metrics: Arc::clone(&metrics),
    };

    let conn = &connection;
    let exit = accept_loop(
        "session",
        &shutdown,
        None,
        move || async move { conn.accept_bi().await.map_err(RpcError::from) },
        |(send, recv): (quinn::SendStream, quinn::RecvStream)| {
            metrics.stream_accepted();
            let span = debug_span!("stream", id = %send.id());
            tokio::spawn(handle_stream(send, recv, ctx.clone()).instrument(span));
        },
    )
    .await;

    // fatal exits are already logged by the loop
    if let Ok(exit) = exit {
        debug!(?exit, "Session ended");
    }
}
