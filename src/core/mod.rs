//! # Core Protocol Components
//!
//! Values, messages, and the codecs that frame them on a stream.
//!
//! ## Components
//! - **Value**: the closed set of types that can cross the wire
//! - **Message**: one request or one response
//! - **Serialization**: body formats (bincode, JSON, MessagePack)
//! - **Codec**: self-delimiting framing of a message on a byte stream
//!
//! ## Wire Format
//! ```text
//! stream:  [Request frame] -> <- [Response frame]
//! bincode / msgpack frame:  [Length(4, BE)] [Body(N)]
//! json frame:               [Body(N)] '\n'
//! ```
//!
//! ## Security
//! - Maximum frame size: 16MB (prevents memory exhaustion)
//! - Length validation before allocation

pub mod codec;
pub mod message;
pub mod serialization;
pub mod value;
