//! # Configuration Management
//!
//! File and environment level settings for servers and clients.
//!
//! The runtime objects ([`crate::service::server::ServerConfig`],
//! [`crate::service::client::ClientConfig`],
//! [`crate::transport::connection::ConnectionConfig`]) are built from these
//! settings with their `from_settings` constructors, or directly in code.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides (`NETWORK_RPC_*`)

use crate::core::serialization::SerializationFormat;
use crate::error::{Result, RpcError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

/// ALPN protocol identifier negotiated on every connection
pub const ALPN_PROTOCOL: &[u8] = b"network-rpc";

/// Port used when a bind address leaves the port at zero
pub const DEFAULT_PORT: u16 = 6121;

/// Address a server binds when no transport is supplied
pub const DEFAULT_SERVER_ADDRESS: &str = ":6121";

/// Default keep-alive period for both sides of a connection
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Default idle timeout before a silent connection is dropped
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default budget of concurrent streams a peer may open
pub const MAX_CONCURRENT_STREAMS: u32 = 256;

/// Top-level settings document
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RpcConfig {
    /// Server-specific configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Client-specific configuration
    #[serde(default)]
    pub client: ClientSettings,

    /// QUIC transport configuration shared by both sides
    #[serde(default)]
    pub transport: TransportSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RpcConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| RpcError::Config(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| RpcError::Config(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `NETWORK_RPC_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("NETWORK_RPC_SERVER_ADDRESS") {
            self.server.address = addr;
        }

        if let Some(addr) = lookup("NETWORK_RPC_CLIENT_ADDRESS") {
            self.client.address = addr;
        }

        if let Some(codec) = lookup("NETWORK_RPC_CODEC") {
            let format = codec.parse::<SerializationFormat>()?;
            self.server.codec = format;
            self.client.codec = format;
        }

        if let Some(ms) = lookup("NETWORK_RPC_KEEPALIVE_MS") {
            let val = parse_millis("NETWORK_RPC_KEEPALIVE_MS", &ms)?;
            self.transport.keep_alive_interval = val;
        }

        if let Some(ms) = lookup("NETWORK_RPC_IDLE_TIMEOUT_MS") {
            let val = parse_millis("NETWORK_RPC_IDLE_TIMEOUT_MS", &ms)?;
            self.transport.max_idle_timeout = val;
        }

        if let Some(ms) = lookup("NETWORK_RPC_CALL_TIMEOUT_MS") {
            let val = parse_millis("NETWORK_RPC_CALL_TIMEOUT_MS", &ms)?;
            self.client.call_timeout = Some(val);
        }

        Ok(())
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| RpcError::Config(format!("Failed to serialize config: {e}")))?;

        fs::write(path, content)
            .map_err(|e| RpcError::Config(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.client.validate());
        errors.extend(self.transport.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(RpcError::Config(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

fn parse_millis(key: &str, raw: &str) -> Result<Duration> {
    raw.parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| RpcError::Config(format!("{key}: invalid milliseconds {raw:?}: {e}")))
}

/// Server-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address (`host:port`, `:port`, or `host`)
    pub address: String,

    /// Name attached to the server's log span
    pub name: String,

    /// PEM certificate chain; a self-signed certificate is generated when unset
    pub cert_path: Option<PathBuf>,

    /// PEM PKCS#8 private key matching `cert_path`
    pub key_path: Option<PathBuf>,

    /// Codec used for every stream
    pub codec: SerializationFormat,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            address: String::from(DEFAULT_SERVER_ADDRESS),
            name: String::from("network-rpc-server"),
            cert_path: None,
            key_path: None,
            codec: SerializationFormat::default(),
        }
    }
}

impl ServerSettings {
    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Server address cannot be empty".to_string());
        } else if crate::transport::binder::parse_bind_addr(&self.address).is_err() {
            errors.push(format!(
                "Invalid server address format: '{}' (expected format: '0.0.0.0:6121' or ':6121')",
                self.address
            ));
        }

        if self.name.is_empty() {
            errors.push("Server name cannot be empty".to_string());
        }

        match (&self.cert_path, &self.key_path) {
            (Some(_), None) => errors.push("cert_path requires key_path".to_string()),
            (None, Some(_)) => errors.push("key_path requires cert_path".to_string()),
            _ => {}
        }

        errors
    }
}

/// Client-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Target server address (`host:port`)
    pub address: String,

    /// Skip certificate verification (development only)
    pub insecure: bool,

    /// PEM certificates to trust instead of the native roots
    pub trusted_cert_path: Option<PathBuf>,

    /// Codec used for every call
    pub codec: SerializationFormat,

    /// Optional per-call deadline; unset means no deadline beyond the
    /// transport's idle timeout
    #[serde(with = "opt_duration_serde")]
    pub call_timeout: Option<Duration>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            address: String::from("localhost:6121"),
            insecure: false,
            trusted_cert_path: None,
            codec: SerializationFormat::default(),
            call_timeout: None,
        }
    }
}

impl ClientSettings {
    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Client address cannot be empty".to_string());
        } else if self.address.rsplit_once(':').is_none() {
            errors.push(format!(
                "Invalid client address format: '{}' (expected format: 'example.com:6121')",
                self.address
            ));
        }

        if let Some(timeout) = self.call_timeout {
            if timeout.as_millis() < 10 {
                errors.push("Call timeout too short (minimum: 10ms)".to_string());
            }
        }

        if self.insecure && self.trusted_cert_path.is_some() {
            errors.push("insecure and trusted_cert_path are mutually exclusive".to_string());
        }

        errors
    }
}

/// QUIC transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Interval between keep-alive packets
    #[serde(with = "duration_serde")]
    pub keep_alive_interval: Duration,

    /// Idle period after which the connection times out
    #[serde(with = "duration_serde")]
    pub max_idle_timeout: Duration,

    /// Concurrent bidirectional streams a peer may open
    pub max_concurrent_streams: u32,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            keep_alive_interval: KEEPALIVE_INTERVAL,
            max_idle_timeout: IDLE_TIMEOUT,
            max_concurrent_streams: MAX_CONCURRENT_STREAMS,
        }
    }
}

impl TransportSettings {
    /// Validate transport configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.keep_alive_interval.as_millis() < 100 {
            errors.push("Keep-alive interval too short (minimum: 100ms)".to_string());
        }

        if self.max_idle_timeout.as_millis() < 100 {
            errors.push("Idle timeout too short (minimum: 100ms)".to_string());
        } else if self.keep_alive_interval >= self.max_idle_timeout {
            errors.push(
                "Keep-alive interval must be shorter than the idle timeout".to_string(),
            );
        }

        if self.max_concurrent_streams == 0 {
            errors.push("Max concurrent streams must be greater than 0".to_string());
        }

        errors
    }

    /// Build the quinn transport parameters
    pub fn to_quinn(&self) -> Result<quinn::TransportConfig> {
        let idle = quinn::IdleTimeout::try_from(self.max_idle_timeout)
            .map_err(|e| RpcError::Config(format!("idle timeout out of range: {e}")))?;

        let mut transport = quinn::TransportConfig::default();
        transport
            .keep_alive_interval(Some(self.keep_alive_interval))
            .max_idle_timeout(Some(idle))
            .max_concurrent_bidi_streams(quinn::VarInt::from_u32(self.max_concurrent_streams))
            .max_concurrent_uni_streams(quinn::VarInt::from_u32(0));
        Ok(transport)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("network-rpc"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

mod opt_duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration
            .map(|d| d.as_millis() as u64)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = level.as_str().to_ascii_lowercase();
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
