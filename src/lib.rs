//! # Network RPC
//!
//! Remote procedure calls over QUIC.
//!
//! A server registers named services, each exposing typed methods. A client
//! dials a connection once and issues calls as `"Service.Method"` with
//! positional arguments. Every call travels on its own bidirectional stream,
//! so a slow or failing call never holds up its siblings.
//!
//! ## Layers
//! - [`core`]: transportable values, request/response messages, codecs
//! - [`transport`]: UDP binding, TLS, connection setup, error classification
//! - [`service`]: registry, per-connection and per-stream handlers, server,
//!   client
//! - [`utils`]: logging setup and metrics
//!
//! ## Example
//! ```rust,no_run
//! use network_rpc::{dial, rpc_args, Client, ClientConfig, ConnectionConfig};
//! use network_rpc::{Server, ServerConfig, Service, Transport};
//! use network_rpc::transport::tls::TlsClientConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! struct Calc;
//!
//! impl Calc {
//!     fn divide(&self, a: i64, b: i64) -> Result<f64, String> {
//!         if b == 0 {
//!             return Err("division by zero".into());
//!         }
//!         Ok(a as f64 / b as f64)
//!     }
//! }
//!
//! # async fn run() -> network_rpc::Result<()> {
//! let transport = Transport::bind("127.0.0.1:0")?;
//! let addr = transport.local_addr();
//!
//! let mut server = Server::new(ServerConfig::default()).with_transport(transport);
//! server.register_service("Calc", Service::new(Calc).method("Divide", Calc::divide));
//! let shutdown = CancellationToken::new();
//! tokio::spawn({
//!     let shutdown = shutdown.clone();
//!     async move { server.serve(shutdown).await }
//! });
//!
//! let tls = TlsClientConfig::new().insecure();
//! let conn = dial(&addr.to_string(), Some(ConnectionConfig::new().with_tls(tls))).await?;
//! let client = Client::new(ClientConfig::default());
//! let quotient: f64 = client.call_as(&conn, "Calc.Divide", rpc_args![10, 4]).await?;
//! assert_eq!(quotient, 2.5);
//!
//! shutdown.cancel();
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod core;
pub mod error;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::core::message::{Request, Response};
pub use crate::core::value::{FromValue, IntoValue, Value};
pub use error::{Result, RpcError};
pub use service::{Client, ClientConfig, Server, ServerConfig, Service, ServiceRegistry};
pub use tokio_util::sync::CancellationToken;
pub use transport::{dial, Connection, ConnectionConfig, Transport};
