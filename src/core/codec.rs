//! # Stream Codecs
//!
//! A [`Codec`] turns one [`Message`] into self-delimiting bytes and back.
//! Streams carry no framing of their own, so every codec embeds whatever it
//! needs to find the end of a message:
//!
//! - [`BincodeCodec`] and [`MessagePackCodec`]: `[len: u32 BE][body]`
//! - [`JsonCodec`]: one JSON document per line
//!
//! Decoding is incremental. `Ok(None)` means more bytes are needed, which lets
//! a reader yield a message before the peer closes its side of the stream.
//!
//! [`WireCodec`] adapts a shared codec object to `tokio_util`'s
//! `Encoder`/`Decoder` so it plugs into `FramedRead`/`FramedWrite`.

use bytes::{Buf, BufMut, BytesMut};
use std::fmt;
use std::sync::Arc;
use tokio_util::codec::{Decoder, Encoder};

use crate::core::message::Message;
use crate::core::serialization::{MultiFormat, SerializationFormat};
use crate::error::constants::{
    ERR_NON_FINITE_FLOAT, ERR_OVERSIZED_FRAME, ERR_TRUNCATED_FRAME,
};
use crate::error::{Result, RpcError};

/// Max allowed frame body (16 MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

const LENGTH_PREFIX: usize = 4;

/// Serializer for a single in-flight message.
///
/// Implementations must not keep mutable state between calls; one instance
/// is shared by every stream of a process.
pub trait Codec: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn encode(&self, message: &Message, dst: &mut BytesMut) -> Result<()>;

    fn decode(&self, src: &mut BytesMut) -> Result<Option<Message>>;
}

fn put_length_prefixed(body: &[u8], dst: &mut BytesMut) -> Result<()> {
    if body.len() > MAX_FRAME_SIZE {
        return Err(RpcError::Encode(format!(
            "{ERR_OVERSIZED_FRAME}: {} bytes",
            body.len()
        )));
    }
    dst.reserve(LENGTH_PREFIX + body.len());
    dst.put_u32(body.len() as u32);
    dst.extend_from_slice(body);
    Ok(())
}

fn take_length_prefixed(src: &mut BytesMut) -> Result<Option<BytesMut>> {
    if src.len() < LENGTH_PREFIX {
        return Ok(None);
    }
    let len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(RpcError::Decode(format!(
            "{ERR_OVERSIZED_FRAME}: {len} bytes"
        )));
    }
    if src.len() < LENGTH_PREFIX + len {
        src.reserve(LENGTH_PREFIX + len - src.len());
        return Ok(None);
    }
    src.advance(LENGTH_PREFIX);
    Ok(Some(src.split_to(len)))
}

/// Length-prefixed bincode. The default codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl Codec for BincodeCodec {
    fn name(&self) -> &'static str {
        "bincode"
    }

    fn encode(&self, message: &Message, dst: &mut BytesMut) -> Result<()> {
        let body = message.serialize_format(SerializationFormat::Bincode)?;
        put_length_prefixed(&body, dst)
    }

    fn decode(&self, src: &mut BytesMut) -> Result<Option<Message>> {
        match take_length_prefixed(src)? {
            Some(body) => {
                Message::deserialize_format(&body, SerializationFormat::Bincode).map(Some)
            }
            None => Ok(None),
        }
    }
}

/// Length-prefixed MessagePack.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessagePackCodec;

impl Codec for MessagePackCodec {
    fn name(&self) -> &'static str {
        "msgpack"
    }

    fn encode(&self, message: &Message, dst: &mut BytesMut) -> Result<()> {
        let body = message.serialize_format(SerializationFormat::MessagePack)?;
        put_length_prefixed(&body, dst)
    }

    fn decode(&self, src: &mut BytesMut) -> Result<Option<Message>> {
        match take_length_prefixed(src)? {
            Some(body) => {
                Message::deserialize_format(&body, SerializationFormat::MessagePack).map(Some)
            }
            None => Ok(None),
        }
    }
}

/// Newline-delimited JSON. Compact `serde_json` output never contains a raw
/// newline, so the line break is an unambiguous terminator.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, message: &Message, dst: &mut BytesMut) -> Result<()> {
        // serde_json writes NaN and infinities as null
        if !message.is_finite() {
            return Err(RpcError::Encode(ERR_NON_FINITE_FLOAT.to_string()));
        }
        let body = message.serialize_format(SerializationFormat::Json)?;
        if body.len() > MAX_FRAME_SIZE {
            return Err(RpcError::Encode(format!(
                "{ERR_OVERSIZED_FRAME}: {} bytes",
                body.len()
            )));
        }
        dst.reserve(body.len() + 1);
        dst.extend_from_slice(&body);
        dst.put_u8(b'\n');
        Ok(())
    }

    fn decode(&self, src: &mut BytesMut) -> Result<Option<Message>> {
        match src.iter().position(|b| *b == b'\n') {
            Some(pos) => {
                let line = src.split_to(pos + 1);
                Message::deserialize_format(&line[..pos], SerializationFormat::Json).map(Some)
            }
            None if src.len() > MAX_FRAME_SIZE => Err(RpcError::Decode(format!(
                "{ERR_OVERSIZED_FRAME}: {} bytes without terminator",
                src.len()
            ))),
            None => Ok(None),
        }
    }
}

/// Adapter from a shared [`Codec`] to `tokio_util::codec`.
#[derive(Debug, Clone)]
pub struct WireCodec {
    inner: Arc<dyn Codec>,
}

impl WireCodec {
    pub fn new(inner: Arc<dyn Codec>) -> Self {
        Self { inner }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name()
    }
}

impl Decoder for WireCodec {
    type Item = Message;
    type Error = RpcError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>> {
        self.inner.decode(src)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Message>> {
        match self.inner.decode(src)? {
            Some(message) => Ok(Some(message)),
            None if src.is_empty() => Ok(None),
            None => Err(RpcError::Decode(format!(
                "{ERR_TRUNCATED_FRAME}: {} trailing bytes",
                src.len()
            ))),
        }
    }
}

impl Encoder<Message> for WireCodec {
    type Error = RpcError;

    fn encode(&mut self, message: Message, dst: &mut BytesMut) -> Result<()> {
        self.inner.encode(&message, dst)
    }
}
