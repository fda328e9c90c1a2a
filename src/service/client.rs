//! # RPC Client
//!
//! Each call opens a fresh stream on an existing [`Connection`], writes one
//! request, finishes the send side, and reads exactly one response.
//!
//! ```rust,no_run
//! use network_rpc::service::client::{Client, ClientConfig};
//! use network_rpc::transport::{dial, ConnectionConfig};
//! use network_rpc::transport::tls::TlsClientConfig;
//! use network_rpc::rpc_args;
//!
//! # async fn run() -> network_rpc::error::Result<()> {
//! let config = ConnectionConfig::new().with_tls(TlsClientConfig::new().insecure());
//! let conn = dial("localhost:6121", Some(config)).await?;
//!
//! let client = Client::new(ClientConfig::default());
//! let sum: i64 = client.call_as(&conn, "Calc.Add", rpc_args![10, 20]).await?;
//! assert_eq!(sum, 30);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, debug_span, Instrument, Span};

use crate::config::ClientSettings;
use crate::core::codec::{BincodeCodec, Codec, WireCodec};
use crate::core::message::{Message, Request};
use crate::core::value::{FromValue, Value};
use crate::error::constants::ERR_NO_RESPONSE;
use crate::error::{Result, RpcError};
use crate::transport::connection::Connection;

/// Client options
#[derive(Debug, Clone)]
pub struct ClientConfig {
    codec: Arc<dyn Codec>,
    call_timeout: Option<Duration>,
    span: Option<Span>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            codec: Arc::new(BincodeCodec),
            call_timeout: None,
            span: None,
        }
    }
}

impl ClientConfig {
    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self {
            codec: settings.codec.codec(),
            call_timeout: settings.call_timeout,
            span: None,
        }
    }

    /// Must match the server's codec
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    /// Fail calls that take longer than `timeout`. Calls are unbounded by
    /// default.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Parent span for every call
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }
}

/// Issues calls over established connections
#[derive(Debug, Clone, Default)]
pub struct Client {
    config: ClientConfig,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Call `service_method` with positional `args`.
    ///
    /// An error returned by the remote method comes back as
    /// [`RpcError::Remote`], displaying exactly the remote message.
    pub async fn call(
        &self,
        conn: &Connection,
        service_method: &str,
        args: Vec<Value>,
    ) -> Result<Value> {
        let span = match &self.config.span {
            Some(parent) => debug_span!(parent: parent, "call", %service_method),
            None => debug_span!("call", %service_method),
        };
        let exchange = self
            .exchange(conn, Request::new(service_method, args))
            .instrument(span);

        match self.config.call_timeout {
            Some(timeout) => tokio::time::timeout(timeout, exchange).await?,
            None => exchange.await,
        }
    }

    /// [`Client::call`] and convert the result
    pub async fn call_as<T: FromValue>(
        &self,
        conn: &Connection,
        service_method: &str,
        args: Vec<Value>,
    ) -> Result<T> {
        let value = self.call(conn, service_method, args).await?;
        T::from_value(value).map_err(|e| RpcError::Decode(format!("unexpected result: {e}")))
    }

    async fn exchange(&self, conn: &Connection, request: Request) -> Result<Value> {
        let (send, recv) = conn.open_stream().await?;

        let mut writer = FramedWrite::new(send, WireCodec::new(Arc::clone(&self.config.codec)));
        writer.send(Message::Request(request)).await?;
        let mut send = writer.into_inner();
        send.finish()
            .await
            .map_err(|e| RpcError::Io(e.into()))?;
        debug!("Request sent");

        let mut reader = FramedRead::new(recv, WireCodec::new(Arc::clone(&self.config.codec)));
        match reader.next().await {
            Some(Ok(message)) => message.into_response()?.into_result(),
            Some(Err(e)) => Err(e),
            None => Err(RpcError::Decode(ERR_NO_RESPONSE.into())),
        }
    }
}

/// Call with a default [`Client`]
pub async fn call(conn: &Connection, service_method: &str, args: Vec<Value>) -> Result<Value> {
    Client::default().call(conn, service_method, args).await
}
