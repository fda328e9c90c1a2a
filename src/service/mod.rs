//! # Service Layer
//!
//! RPC on top of the transport.
//!
//! ## Components
//! - **Registry**: `"Service.Method"` to typed handler dispatch
//! - **Stream**: one request/response exchange per stream
//! - **Session**: per-connection stream accept loop
//! - **Server**: connection accept loop and shutdown
//! - **Client**: issuing calls over a connection

pub mod client;
pub mod registry;
pub mod server;
pub mod session;
pub mod stream;

pub use client::{Client, ClientConfig};
pub use registry::{Service, ServiceRegistry};
pub use server::{Server, ServerConfig};
