//! Scripted in-memory backend shared by the integration tests
//!
//! The backend opens every keyed request with the key found in its first
//! word, records it, and answers through a handler closure. Replies are
//! scrambled with the session key before they are handed back, the way the
//! real backend does it.

#![allow(dead_code)]

use std::sync::Mutex;

use kbridge_core::opcode::Opcode;
use kbridge_core::wire::{RequestEnvelope, ResponseEnvelope};
use kbridge_core::{DeviceTransport, DriverClient, ObfuscationKey, TransportError};

pub const TEST_KEY: ObfuscationKey = ObfuscationKey::new(0x0BAD_C0DE_5EED_F00D);

/// One request as the backend saw it
#[derive(Debug, Clone)]
pub struct Recorded
{
    pub opcode: Opcode,
    /// Key found in the request, `None` for unkeyed calls
    pub key: Option<ObfuscationKey>,
    /// Decoded payload, without the key word
    pub payload: Vec<u8>,
    /// Length of the reply buffer offered by the client
    pub capacity: usize,
}

impl Recorded
{
    /// Payload word `index`, little-endian.
    pub fn word(&self, index: usize) -> u64
    {
        let start = index * 8;
        let bytes: [u8; 8] = self.payload[start..start + 8].try_into().unwrap();
        u64::from_le_bytes(bytes)
    }

    /// Whether a query request asked for the size only.
    pub fn is_size_only(&self) -> bool
    {
        self.word(3) != 0
    }
}

/// What the backend answers
#[derive(Debug, Clone)]
pub enum Reply
{
    /// Plain reply bytes, scrambled with the request key before returning
    Fields(Vec<u8>),
    /// Reply bytes returned exactly as given
    Raw(Vec<u8>),
    /// Success with no reply bytes
    Empty,
    /// Refuse the call
    Fail,
    /// Report that the reply buffer is too small
    TooSmall,
}

impl Reply
{
    /// Plain reply made of little-endian words.
    pub fn words(words: &[u64]) -> Self
    {
        Reply::Fields(words.iter().flat_map(|w| w.to_le_bytes()).collect())
    }
}

type Handler = Box<dyn Fn(&Recorded) -> Reply + Send + Sync>;

pub struct ScriptedBackend
{
    handler: Handler,
    calls: Mutex<Vec<Recorded>>,
    fail_on_call: Option<usize>,
}

impl ScriptedBackend
{
    pub fn new(handler: impl Fn(&Recorded) -> Reply + Send + Sync + 'static) -> Self
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
            fail_on_call: None,
        }
    }

    /// Backend that accepts everything and replies with nothing.
    pub fn accepting() -> Self
    {
        Self::new(|_| Reply::Empty)
    }

    /// Refuse the `n`th call (1-based), whatever the handler says.
    pub fn fail_on_call(mut self, n: usize) -> Self
    {
        self.fail_on_call = Some(n);
        self
    }

    pub fn calls(&self) -> Vec<Recorded>
    {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize
    {
        self.calls.lock().unwrap().len()
    }
}

impl DeviceTransport for ScriptedBackend
{
    fn send(&self, opcode: Opcode, request: &[u8], response: Option<&mut [u8]>) -> Result<usize, TransportError>
    {
        let (key, payload) = match RequestEnvelope::open(request) {
            Some(envelope) => (Some(envelope.key()), envelope.payload().to_vec()),
            None => (None, Vec::new()),
        };
        let recorded = Recorded {
            opcode,
            key,
            payload,
            capacity: response.as_ref().map_or(0, |buf| buf.len()),
        };

        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(recorded.clone());
            calls.len()
        };
        if self.fail_on_call == Some(index) {
            return Err(TransportError::rejected());
        }

        let bytes = match (self.handler)(&recorded) {
            Reply::Fields(plain) => match key {
                Some(key) => ResponseEnvelope::seal(plain, key),
                None => plain,
            },
            Reply::Raw(bytes) => bytes,
            Reply::Empty => return Ok(0),
            Reply::Fail => return Err(TransportError::rejected()),
            Reply::TooSmall => return Err(TransportError::BufferTooSmall),
        };

        match response {
            Some(buffer) => {
                let n = bytes.len().min(buffer.len());
                buffer[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            None => Ok(0),
        }
    }
}

/// Fill the `size`-byte local destination a read request names with `plain`
/// followed by zeros, scrambled over the whole range with the request key,
/// as the backend does for reads.
pub fn write_through(call: &Recorded, destination: u64, size: usize, plain: &[u8])
{
    assert!(plain.len() <= size, "reply larger than the requested read");
    let mut bytes = plain.to_vec();
    bytes.resize(size, 0);
    if let Some(key) = call.key {
        bytes = ResponseEnvelope::seal(bytes, key);
    }
    // SAFETY: `destination` is the buffer the client lent for this call; it is
    // exclusively borrowed until the call returns and holds `size` bytes.
    unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), destination as *mut u8, size);
    }
}

/// Client over `backend` with the shared test key.
pub fn client(backend: ScriptedBackend) -> DriverClient<ScriptedBackend>
{
    DriverClient::new(backend, TEST_KEY)
}

/// Handler for a two-phase query whose output is `data`.
pub fn query_handler(data: Vec<u8>) -> impl Fn(&Recorded) -> Reply + Send + Sync + 'static
{
    move |call| {
        if call.is_size_only() {
            Reply::Raw((data.len() as u32).to_le_bytes().to_vec())
        } else if call.capacity < data.len() {
            Reply::TooSmall
        } else {
            Reply::Fields(data.clone())
        }
    }
}

/// Little-endian UTF-16 bytes of `text` in a zeroed field of `units` code units.
pub fn wide_field(text: &str, units: usize) -> Vec<u8>
{
    let mut bytes = vec![0u8; units * 2];
    for (slot, unit) in bytes.chunks_exact_mut(2).zip(text.encode_utf16()) {
        slot.copy_from_slice(&unit.to_le_bytes());
    }
    bytes
}
