//! # RPC Server
//!
//! Accepts QUIC connections and serves registered services on them.
//!
//! ```rust,no_run
//! use network_rpc::service::registry::Service;
//! use network_rpc::service::server::{Server, ServerConfig};
//! use network_rpc::transport::Transport;
//! use tokio_util::sync::CancellationToken;
//!
//! struct Calc;
//!
//! impl Calc {
//!     fn add(&self, a: i64, b: i64) -> i64 {
//!         a + b
//!     }
//! }
//!
//! # async fn run() -> network_rpc::error::Result<()> {
//! let transport = Transport::bind("127.0.0.1:0")?;
//! let mut server = Server::new(ServerConfig::default()).with_transport(transport);
//! server.register_service("Calc", Service::new(Calc).method("Add", Calc::add));
//!
//! let shutdown = CancellationToken::new();
//! server.serve(shutdown).await
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument, Span};

use crate::config::{ServerSettings, TransportSettings, DEFAULT_SERVER_ADDRESS};
use crate::core::codec::{BincodeCodec, Codec};
use crate::error::Result;
use crate::service::registry::{Service, ServiceRegistry};
use crate::service::session::run_session;
use crate::service::stream::StreamContext;
use crate::transport::accept_loop::{accept_loop, LoopExit};
use crate::transport::binder::Transport;
use crate::transport::connection::Listener;
use crate::transport::tls::TlsServerConfig;
use crate::utils::metrics::Metrics;

/// Server construction options. Unset fields are filled in at `serve`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    tls: Option<TlsServerConfig>,
    transport_settings: TransportSettings,
    transport: Option<Transport>,
    address: String,
    codec: Arc<dyn Codec>,
    span: Option<Span>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tls: None,
            transport_settings: TransportSettings::default(),
            transport: None,
            address: DEFAULT_SERVER_ADDRESS.to_string(),
            codec: Arc::new(BincodeCodec),
            span: None,
        }
    }
}

impl ServerConfig {
    /// Build from the serde server and transport settings
    pub fn from_settings(settings: &ServerSettings, transport: &TransportSettings) -> Self {
        let tls = match (&settings.cert_path, &settings.key_path) {
            (Some(cert), Some(key)) => Some(TlsServerConfig::new(cert, key)),
            _ => None,
        };
        Self {
            tls,
            transport_settings: transport.clone(),
            transport: None,
            address: settings.address.clone(),
            codec: settings.codec.codec(),
            span: Some(info_span!("server", name = %settings.name)),
        }
    }
}

/// An RPC server
#[derive(Debug)]
pub struct Server {
    registry: Arc<ServiceRegistry>,
    config: ServerConfig,
    metrics: Arc<Metrics>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        info!("Server object created");
        Self {
            registry: Arc::new(ServiceRegistry::new()),
            config,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Serve on a transport the caller bound. The server never closes it.
    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.config.transport = Some(transport);
        self
    }

    pub fn with_tls_config(mut self, tls: TlsServerConfig) -> Self {
        self.config.tls = Some(tls);
        self
    }

    pub fn with_transport_settings(mut self, settings: TransportSettings) -> Self {
        self.config.transport_settings = settings;
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.config.codec = codec;
        self
    }

    /// Parent span for every event the server emits
    pub fn with_span(mut self, span: Span) -> Self {
        self.config.span = Some(span);
        self
    }

    /// Register `service` under `name`, replacing any earlier registration
    pub fn register_service(&mut self, name: impl Into<String>, service: impl Into<Service>) {
        let name = name.into();
        info!(service = %name, "Service added");
        Arc::make_mut(&mut self.registry).register(name, service);
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Serve until `shutdown` is cancelled or the endpoint closes.
    ///
    /// Returns `Ok(())` on graceful shutdown and on timeout.
    pub async fn serve(&self, shutdown: CancellationToken) -> Result<()> {
        self.serve_inner(shutdown, None).await
    }

    /// Like [`Server::serve`], but also stops once `deadline` has elapsed
    pub async fn serve_with_deadline(
        &self,
        shutdown: CancellationToken,
        deadline: Duration,
    ) -> Result<()> {
        self.serve_inner(shutdown, Some(deadline)).await
    }

    async fn serve_inner(&self, shutdown: CancellationToken, deadline: Option<Duration>) -> Result<()> {
        let span = self
            .config
            .span
            .clone()
            .unwrap_or_else(|| info_span!("server"));
        self.run(shutdown, deadline).instrument(span).await
    }

    async fn run(&self, shutdown: CancellationToken, deadline: Option<Duration>) -> Result<()> {
        let (transport, owned) = match &self.config.transport {
            Some(transport) => (transport.clone(), false),
            None => (Transport::bind(&self.config.address)?, true),
        };

        let tls = match &self.config.tls {
            Some(tls) => tls.clone(),
            None => TlsServerConfig::self_signed()?,
        };

        let listener = Listener::new(transport, &tls, &self.config.transport_settings)?;
        let listener = if owned { listener.owning() } else { listener };
        info!(addr = %listener.local_addr(), codec = self.config.codec.name(), "Server listening");

        let ctx = StreamContext::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.config.codec),
            Arc::clone(&self.metrics),
        );
        let sessions = shutdown.child_token();
        let _stop_sessions = sessions.clone().drop_guard();

        let listener = &listener;
        let exit = accept_loop(
            "server",
            &shutdown,
            deadline,
            move || listener.accept(),
            |connecting: quinn::Connecting| {
                let span = info_span!("session", peer = %connecting.remote_address());
                tokio::spawn(
                    run_session(connecting, ctx.clone(), sessions.clone()).instrument(span),
                );
            },
        )
        .await?;

        match exit {
            LoopExit::Graceful => info!("Server shutting down"),
            LoopExit::Timeout => info!("Server deadline reached"),
        }
        self.metrics.log_metrics();
        Ok(())
    }
}
