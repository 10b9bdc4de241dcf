//! # Wire Envelopes
//!
//! Layout of requests and replies on the device-control channel.
//!
//! ## Request
//!
//! ```text
//! +----------------+----------------------------------+
//! | key (8, clear) | payload (word-XORed with the key) |
//! +----------------+----------------------------------+
//! ```
//!
//! ## Response
//!
//! ```text
//! +---------------------+---------------------------+
//! | first field (8)     | payload                   |
//! +---------------------+---------------------------+
//!   all full words XORed with the key
//! ```
//!
//! The first word of a reply sits where the key sits in a request, but it is
//! operation data. The two envelopes are kept as separate types so that one
//! byte range is never read in both roles.
//!
//! Every scalar is one little-endian word. Narrow integers are widened,
//! signed ones sign-extended. Fixed-capacity fields are zero-padded to a
//! whole number of words.
//!
//! Replies that carry an OS structure verbatim (the region snapshot is a
//! native x64 `MEMORY_BASIC_INFORMATION`) keep that structure's own layout
//! and are read with the sub-word accessors of [`FieldReader`].

use crate::codec::{self, ObfuscationKey, WORD_SIZE};
use crate::error::{DriverError, Result};
use crate::opcode::Opcode;
use crate::types::RemotePointer;

/// A typed request routed through the generic call contract
pub trait Request
{
    /// Backend operation this request targets.
    const OPCODE: Opcode;

    /// Shape of the reply.
    type Response: Response;

    /// Append the operation-specific fields.
    ///
    /// Capacity checks on embedded fields happen here, before anything is
    /// sent.
    fn write_payload(&self, payload: &mut PayloadWriter) -> Result<()>;
}

/// A fixed-shape reply
pub trait Response: Sized
{
    /// Size of the reply buffer the transport must fill.
    const WIRE_SIZE: usize;

    /// Extract the typed value from a decoded reply.
    fn read_fields(fields: &mut FieldReader<'_>) -> Result<Self>;
}

/// Operations that reply with nothing but success.
impl Response for ()
{
    const WIRE_SIZE: usize = 0;

    fn read_fields(_fields: &mut FieldReader<'_>) -> Result<Self>
    {
        Ok(())
    }
}

/// Single-word replies (counts, return values).
impl Response for u64
{
    const WIRE_SIZE: usize = WORD_SIZE;

    fn read_fields(fields: &mut FieldReader<'_>) -> Result<Self>
    {
        fields.word()
    }
}

/// One word read as a flag; any nonzero value is true.
impl Response for bool
{
    const WIRE_SIZE: usize = WORD_SIZE;

    fn read_fields(fields: &mut FieldReader<'_>) -> Result<Self>
    {
        fields.flag()
    }
}

impl Response for RemotePointer
{
    const WIRE_SIZE: usize = WORD_SIZE;

    fn read_fields(fields: &mut FieldReader<'_>) -> Result<Self>
    {
        fields.pointer()
    }
}

/// Builder for the payload part of a request
#[derive(Debug, Default)]
pub struct PayloadWriter
{
    bytes: Vec<u8>,
}

impl PayloadWriter
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Append one word.
    pub fn word(&mut self, value: u64) -> &mut Self
    {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Append a `u32`, zero-extended to a word.
    pub fn u32(&mut self, value: u32) -> &mut Self
    {
        self.word(u64::from(value))
    }

    /// Append a boolean as 0 or 1.
    pub fn flag(&mut self, value: bool) -> &mut Self
    {
        self.word(u64::from(value))
    }

    pub fn pointer(&mut self, value: RemotePointer) -> &mut Self
    {
        self.word(value.value())
    }

    /// Append a size. `usize` is at most 64 bits on every supported target.
    pub fn size(&mut self, value: usize) -> &mut Self
    {
        self.word(value as u64)
    }

    /// Append a fixed-capacity field, zero-padded to a word boundary.
    pub fn field(&mut self, bytes: &[u8]) -> &mut Self
    {
        self.bytes.extend_from_slice(bytes);
        let rem = bytes.len() % WORD_SIZE;
        if rem != 0 {
            self.bytes.resize(self.bytes.len() + WORD_SIZE - rem, 0);
        }
        self
    }

    pub fn len(&self) -> usize
    {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8>
    {
        self.bytes
    }
}

/// Request with its session key, before obfuscation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEnvelope
{
    key: ObfuscationKey,
    payload: Vec<u8>,
}

impl RequestEnvelope
{
    pub fn new(key: ObfuscationKey, payload: Vec<u8>) -> Self
    {
        Self { key, payload }
    }

    /// Build the envelope for a typed request.
    pub fn for_request<R: Request>(key: ObfuscationKey, request: &R) -> Result<Self>
    {
        let mut payload = PayloadWriter::new();
        request.write_payload(&mut payload)?;
        Ok(Self::new(key, payload.into_bytes()))
    }

    pub fn key(&self) -> ObfuscationKey
    {
        self.key
    }

    pub fn payload(&self) -> &[u8]
    {
        &self.payload
    }

    /// Total bytes on the wire
    pub fn wire_len(&self) -> usize
    {
        WORD_SIZE + self.payload.len()
    }

    /// Serialize and scramble: the key in clear, the payload encoded.
    pub fn seal(self) -> Vec<u8>
    {
        let mut bytes = Vec::with_capacity(self.wire_len());
        bytes.extend_from_slice(&self.key.to_le_bytes());
        bytes.extend_from_slice(&self.payload);
        codec::encode(&mut bytes, self.key);
        bytes
    }

    /// Recover a request from the wire, as the backend does.
    ///
    /// Returns `None` if the buffer is too short to carry a key.
    pub fn open(bytes: &[u8]) -> Option<Self>
    {
        let key_bytes: [u8; WORD_SIZE] = bytes.get(..WORD_SIZE)?.try_into().ok()?;
        let key = ObfuscationKey::new(u64::from_le_bytes(key_bytes));
        let mut plain = bytes.to_vec();
        codec::encode(&mut plain, key);
        plain.drain(..WORD_SIZE);
        Some(Self::new(key, plain))
    }
}

/// Decoded reply
#[derive(Debug, Clone, Copy)]
pub struct ResponseEnvelope<'a>
{
    opcode: Opcode,
    bytes: &'a [u8],
}

impl<'a> ResponseEnvelope<'a>
{
    /// Decode a reply in place and wrap it.
    pub fn unseal(opcode: Opcode, bytes: &'a mut [u8], key: ObfuscationKey) -> Self
    {
        codec::decode(bytes, key);
        Self { opcode, bytes }
    }

    /// Scramble a plain reply, as the backend does before returning it.
    pub fn seal(mut bytes: Vec<u8>, key: ObfuscationKey) -> Vec<u8>
    {
        codec::decode(&mut bytes, key);
        bytes
    }

    /// The leading word, if the reply has one.
    pub fn first_field(&self) -> Option<u64>
    {
        let word: [u8; WORD_SIZE] = self.bytes.get(..WORD_SIZE)?.try_into().ok()?;
        Some(u64::from_le_bytes(word))
    }

    /// Everything after the first field
    pub fn payload(&self) -> &'a [u8]
    {
        self.bytes.get(WORD_SIZE..).unwrap_or(&[])
    }

    pub fn as_bytes(&self) -> &'a [u8]
    {
        self.bytes
    }

    /// Sequential reader over all fields, starting with the first.
    pub fn fields(&self) -> FieldReader<'a>
    {
        FieldReader::new(self.opcode, self.bytes)
    }
}

/// Cursor over the words of a decoded reply
#[derive(Debug)]
pub struct FieldReader<'a>
{
    opcode: Opcode,
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> FieldReader<'a>
{
    pub fn new(opcode: Opcode, bytes: &'a [u8]) -> Self
    {
        Self { opcode, bytes, offset: 0 }
    }

    /// Borrow the next `len` bytes.
    pub fn field(&mut self, len: usize) -> Result<&'a [u8]>
    {
        let end = self.offset.checked_add(len).filter(|&end| end <= self.bytes.len());
        let Some(end) = end else {
            return Err(DriverError::ResponseTooShort {
                opcode: self.opcode,
                expected: self.offset.saturating_add(len),
                actual: self.bytes.len(),
            });
        };
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    pub fn word(&mut self) -> Result<u64>
    {
        let bytes = self.field(WORD_SIZE)?;
        let mut word = [0u8; WORD_SIZE];
        word.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(word))
    }

    /// Low 32 bits of the next word.
    pub fn u32(&mut self) -> Result<u32>
    {
        Ok(self.word()? as u32)
    }

    /// Low 32 bits of the next word, as a signed value.
    pub fn i32(&mut self) -> Result<i32>
    {
        Ok(self.word()? as u32 as i32)
    }

    pub fn flag(&mut self) -> Result<bool>
    {
        Ok(self.word()? != 0)
    }

    /// Next four bytes as a packed little-endian `u32`.
    pub fn u32_le(&mut self) -> Result<u32>
    {
        let bytes = self.field(4)?;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(bytes);
        Ok(u32::from_le_bytes(raw))
    }

    /// Next two bytes as a packed little-endian `u16`.
    pub fn u16_le(&mut self) -> Result<u16>
    {
        let bytes = self.field(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Step over `len` bytes of padding.
    pub fn skip(&mut self, len: usize) -> Result<()>
    {
        self.field(len).map(|_| ())
    }

    pub fn pointer(&mut self) -> Result<RemotePointer>
    {
        self.word().map(RemotePointer::new)
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize
    {
        self.offset
    }
}
