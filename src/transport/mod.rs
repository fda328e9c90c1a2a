//! # Transport Layer
//!
//! QUIC plumbing underneath the RPC layer.
//!
//! ## Components
//! - **Binder**: UDP socket acquisition with port-conflict retry
//! - **TLS**: rustls server and client configurations (TLS 1.3, ALPN)
//! - **Connection**: client dial and server listener
//! - **Classify**: graceful / timeout / fatal error classes
//! - **Accept Loop**: the shared accept, spawn, classify loop

pub mod accept_loop;
pub mod binder;
pub mod classify;
pub mod connection;
pub mod tls;

pub use binder::Transport;
pub use classify::{Classify, ErrorClass};
pub use connection::{dial, Connection, ConnectionConfig, Listener};
