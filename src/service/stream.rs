//! # Stream Handler
//!
//! One bidirectional stream carries exactly one exchange:
//!
//! ```text
//! Idle -> Decoding -> Dispatching -> Encoding -> Closed
//!            |             |
//!            +-- failed    +-- panicked --> stream cancelled, no response
//! ```
//!
//! A request that fails to decode is never answered; both halves of the
//! stream are cancelled. A dispatch error is answered with an error response.
//! A panicking method cancels its own stream and nothing else.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, warn};

use crate::core::codec::{Codec, WireCodec};
use crate::core::message::{Message, Response};
use crate::error::constants::ERR_NO_REQUEST;
use crate::error::{Result, RpcError};
use crate::service::registry::ServiceRegistry;
use crate::transport::classify::{Classify, ErrorClass};
use crate::utils::metrics::{Metrics, Timer};

const CANCEL_CODE: quinn::VarInt = quinn::VarInt::from_u32(0);

/// Read-only state every stream handler shares
#[derive(Debug, Clone)]
pub struct StreamContext {
    registry: Arc<ServiceRegistry>,
    codec: Arc<dyn Codec>,
    metrics: Arc<Metrics>,
}

impl StreamContext {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        codec: Arc<dyn Codec>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            registry,
            codec,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}

fn cancel(send: &mut quinn::SendStream, recv: Option<&mut quinn::RecvStream>) {
    if let Some(recv) = recv {
        let _ = recv.stop(CANCEL_CODE);
    }
    let _ = send.reset(CANCEL_CODE);
}

async fn read_request(
    recv: quinn::RecvStream,
    codec: &Arc<dyn Codec>,
) -> (quinn::RecvStream, Result<Message>) {
    let mut reader = FramedRead::new(recv, WireCodec::new(Arc::clone(codec)));
    let decoded = match reader.next().await {
        Some(Ok(message)) => Ok(message),
        Some(Err(e)) => Err(e),
        None => Err(RpcError::Decode(ERR_NO_REQUEST.into())),
    };
    (reader.into_inner(), decoded)
}

/// Serve one exchange on `send`/`recv`. Every exit path releases the stream.
pub async fn handle_stream(
    mut send: quinn::SendStream,
    recv: quinn::RecvStream,
    ctx: StreamContext,
) {
    let (mut recv, decoded) = read_request(recv, &ctx.codec).await;
    let request = match decoded.and_then(Message::into_request) {
        Ok(request) => request,
        Err(e) => {
            match e.classify() {
                ErrorClass::GracefulClose => debug!(reason = %e, "Stream closed before a request"),
                ErrorClass::Timeout => debug!(reason = %e, "Stream timed out before a request"),
                ErrorClass::Fatal => warn!(error = %e, "Failed to decode request"),
            }
            ctx.metrics.decode_failure();
            cancel(&mut send, Some(&mut recv));
            return;
        }
    };
    drop(recv);

    let service_method = request.service_method.clone();
    let registry = Arc::clone(&ctx.registry);
    let dispatched = tokio::task::spawn_blocking(move || {
        let _timer = Timer::start("dispatch");
        registry.dispatch(&request.service_method, request.args)
    })
    .await;

    let response = match dispatched {
        Ok(Ok(value)) => Response::Ok(value),
        Ok(Err(e)) => {
            debug!(%service_method, error = %e, "Call failed");
            Response::error(e.to_string())
        }
        Err(join) => {
            let fault = RpcError::DispatchFault(if join.is_panic() {
                format!("{service_method} panicked")
            } else {
                format!("{service_method} was cancelled")
            });
            error!(%service_method, error = %fault, "Dispatch fault");
            ctx.metrics.dispatch_fault();
            cancel(&mut send, None);
            return;
        }
    };

    let succeeded = response.is_ok();
    let mut writer = FramedWrite::new(send, WireCodec::new(Arc::clone(&ctx.codec)));
    let sent = writer.send(Message::Response(response)).await;
    let mut send = writer.into_inner();
    match sent {
        Ok(()) if succeeded => {
            debug!(%service_method, "Call succeeded");
            ctx.metrics.call_succeeded();
        }
        Ok(()) => ctx.metrics.call_failed(),
        Err(e) => {
            warn!(%service_method, error = %e, "Failed to send response");
            if matches!(e, RpcError::Encode(_)) {
                ctx.metrics.encode_failure();
            }
            cancel(&mut send, None);
            return;
        }
    }

    if let Err(e) = send.finish().await {
        match e.classify() {
            ErrorClass::Fatal => warn!(%service_method, error = %e, "Failed to finish stream"),
            _ => debug!(%service_method, reason = %e, "Peer stopped stream"),
        }
    }
}
