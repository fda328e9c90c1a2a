//! # Serialization Formats
//!
//! Body encodings available to the stream codecs.
//! Supports bincode (default), JSON (debugging/interop), and MessagePack (compact encoding).
//!
//! The format only decides how a [`Message`] body is turned into bytes.
//! Delimiting the body on the stream is the job of the codec in
//! [`crate::core::codec`].
//!
//! ## Usage
//! ```rust
//! use network_rpc::core::serialization::SerializationFormat;
//!
//! let format: SerializationFormat = "msgpack".parse().unwrap();
//! assert_eq!(format.name(), "MessagePack");
//! let codec = format.codec();
//! assert_eq!(codec.name(), "msgpack");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::core::codec::{BincodeCodec, Codec, JsonCodec, MessagePackCodec};
use crate::core::message::Message;
use crate::error::{Result, RpcError};

/// Supported serialization formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationFormat {
    /// Binary compact format (default, fastest)
    #[default]
    Bincode,
    /// Human-readable JSON format (debugging, interop)
    Json,
    /// Compact binary format (MessagePack, efficient)
    #[serde(alias = "msgpack")]
    MessagePack,
}

impl SerializationFormat {
    /// Get human-readable name
    pub fn name(self) -> &'static str {
        match self {
            SerializationFormat::Bincode => "Bincode",
            SerializationFormat::Json => "JSON",
            SerializationFormat::MessagePack => "MessagePack",
        }
    }

    /// Build the stream codec for this format.
    pub fn codec(self) -> Arc<dyn Codec> {
        match self {
            SerializationFormat::Bincode => Arc::new(BincodeCodec),
            SerializationFormat::Json => Arc::new(JsonCodec),
            SerializationFormat::MessagePack => Arc::new(MessagePackCodec),
        }
    }
}

impl fmt::Display for SerializationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SerializationFormat {
    type Err = RpcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bincode" => Ok(SerializationFormat::Bincode),
            "json" => Ok(SerializationFormat::Json),
            "messagepack" | "msgpack" => Ok(SerializationFormat::MessagePack),
            other => Err(RpcError::Config(format!(
                "unknown serialization format: {other}"
            ))),
        }
    }
}

/// Trait for types that support multiple serialization formats
pub trait MultiFormat: Serialize + for<'de> Deserialize<'de> + Sized {
    /// Serialize to bytes using the given format
    fn serialize_format(&self, format: SerializationFormat) -> Result<Vec<u8>> {
        match format {
            SerializationFormat::Bincode => {
                bincode::serialize(self).map_err(|e| RpcError::Encode(e.to_string()))
            }
            SerializationFormat::Json => {
                serde_json::to_vec(self).map_err(|e| RpcError::Encode(e.to_string()))
            }
            SerializationFormat::MessagePack => {
                rmp_serde::to_vec(self).map_err(|e| RpcError::Encode(e.to_string()))
            }
        }
    }

    /// Deserialize from bytes using the given format
    fn deserialize_format(data: &[u8], format: SerializationFormat) -> Result<Self> {
        match format {
            SerializationFormat::Bincode => {
                bincode::deserialize(data).map_err(|e| RpcError::Decode(e.to_string()))
            }
            SerializationFormat::Json => {
                serde_json::from_slice(data).map_err(|e| RpcError::Decode(e.to_string()))
            }
            SerializationFormat::MessagePack => {
                rmp_serde::from_slice(data).map_err(|e| RpcError::Decode(e.to_string()))
            }
        }
    }
}

impl MultiFormat for Message {}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::core::message::{Request, Response};
    use crate::core::value::Value;

    fn sample() -> Message {
        Message::Request(Request::new(
            "Calc.Add",
            vec![Value::Int(10), Value::Int(20)],
        ))
    }

    #[test]
    fn test_format_names() {
        assert_eq!(SerializationFormat::Bincode.name(), "Bincode");
        assert_eq!(SerializationFormat::Json.name(), "JSON");
        assert_eq!(SerializationFormat::MessagePack.name(), "MessagePack");
    }

    #[test]
    fn test_default_format() {
        assert_eq!(SerializationFormat::default(), SerializationFormat::Bincode);
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(
            "JSON".parse::<SerializationFormat>().unwrap(),
            SerializationFormat::Json
        );
        assert_eq!(
            "msgpack".parse::<SerializationFormat>().unwrap(),
            SerializationFormat::MessagePack
        );
        assert!("gob".parse::<SerializationFormat>().is_err());
    }

    #[test]
    fn test_every_format_roundtrips_a_request() {
        for format in [
            SerializationFormat::Bincode,
            SerializationFormat::Json,
            SerializationFormat::MessagePack,
        ] {
            let bytes = sample().serialize_format(format).expect("serialize");
            let recovered = Message::deserialize_format(&bytes, format).expect("deserialize");
            assert_eq!(recovered, sample(), "format {format}");
        }
    }

    #[test]
    fn test_json_body_is_readable() {
        let msg = Message::Response(Response::error("division by zero"));
        let bytes = msg.serialize_format(SerializationFormat::Json).unwrap();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.contains("division by zero"));
        assert!(!text.contains('\n'));
    }

    #[test]
    fn test_format_sizes() {
        let msg = sample();
        let json_size = msg.serialize_format(SerializationFormat::Json).unwrap().len();
        let msgpack_size = msg
            .serialize_format(SerializationFormat::MessagePack)
            .unwrap()
            .len();

        // MessagePack should be more compact than JSON
        assert!(msgpack_size < json_size);
    }

    #[test]
    fn test_garbage_is_a_decode_error() {
        let err = Message::deserialize_format(&[0xFF, 0xFF, 0xFF], SerializationFormat::Bincode)
            .unwrap_err();
        assert!(matches!(err, RpcError::Decode(_)));
    }
}
