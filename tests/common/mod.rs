//! Shared fixtures for the integration tests

#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use network_rpc::core::codec::{BincodeCodec, Codec};
use network_rpc::transport::tls::{TlsClientConfig, TlsServerConfig};
use network_rpc::utils::metrics::Metrics;
use network_rpc::{
    dial, CancellationToken, Connection, ConnectionConfig, Server, ServerConfig, Service,
    Transport,
};
use tokio::task::JoinHandle;

pub struct Calculator;

impl Calculator {
    pub fn add(&self, a: i64, b: i64) -> i64 {
        a + b
    }

    pub fn subtract(&self, a: i64, b: i64) -> i64 {
        a - b
    }

    pub fn multiply(&self, a: i64, b: i64) -> i64 {
        a * b
    }

    pub fn divide(&self, a: i64, b: i64) -> Result<f64, String> {
        if b == 0 {
            return Err("division by zero".to_string());
        }
        Ok(a as f64 / b as f64)
    }

    pub fn explode(&self) -> i64 {
        panic!("calculator exploded")
    }

    pub fn blob(&self, len: u64) -> Bytes {
        Bytes::from(vec![7u8; len as usize])
    }

    pub fn slow(&self, millis: u64) -> u64 {
        std::thread::sleep(Duration::from_millis(millis));
        millis
    }
}

pub fn calculator() -> Service {
    Service::new(Calculator)
        .method("Add", Calculator::add)
        .method("Subtract", Calculator::subtract)
        .method("Multiply", Calculator::multiply)
        .method("Divide", Calculator::divide)
        .method("Explode", Calculator::explode)
        .method("Slow", Calculator::slow)
        .method("Blob", Calculator::blob)
        .build()
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub tls: TlsServerConfig,
    pub metrics: Arc<Metrics>,
    pub transport: Transport,
    shutdown: CancellationToken,
    handle: JoinHandle<network_rpc::Result<()>>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with_codec(Arc::new(BincodeCodec)).await
    }

    pub async fn start_with_codec(codec: Arc<dyn Codec>) -> Self {
        let transport =
            Transport::from_socket(UdpSocket::bind("127.0.0.1:0").unwrap()).unwrap();
        let tls = TlsServerConfig::self_signed().unwrap();

        let mut server = Server::new(ServerConfig::default())
            .with_transport(transport.clone())
            .with_tls_config(tls.clone())
            .with_codec(codec);
        server.register_service("Calc", calculator());

        let metrics = Arc::clone(server.metrics());
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn({
            let shutdown = shutdown.clone();
            async move { server.serve(shutdown).await }
        });

        Self {
            addr: transport.local_addr(),
            tls,
            metrics,
            transport,
            shutdown,
            handle,
        }
    }

    /// Client configuration that trusts exactly this server's certificate
    pub fn connection_config(&self) -> ConnectionConfig {
        let cert = self.tls.certificate_chain().unwrap().remove(0);
        ConnectionConfig::new()
            .with_tls(TlsClientConfig::new().with_trusted_cert(cert))
            .with_server_name("localhost")
    }

    pub async fn connect(&self) -> Connection {
        dial(&self.addr.to_string(), Some(self.connection_config()))
            .await
            .expect("dial test server")
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        self.handle.await.unwrap().unwrap();
    }
}
