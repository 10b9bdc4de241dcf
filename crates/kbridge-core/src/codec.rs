//! # Obfuscation Codec
//!
//! XOR scrambling of request and response buffers.
//!
//! The transform works on 8-byte little-endian words. Any trailing bytes that
//! do not form a full word are left as they are, by both directions. This is
//! part of the wire format: a 12-byte buffer has its last 4 bytes sent in the
//! clear.
//!
//! - [`encode`] skips the first word of a request, which carries the key in
//!   plaintext so the backend can find it.
//! - [`decode`] covers the whole reply, including its first field.
//!
//! This only keeps fixed-shape requests from being trivially pattern-matched.
//! Anyone who captures traffic and knows the scheme can read it.

use std::fmt;
use std::str::FromStr;

use crate::error::DriverError;

/// Size of one obfuscation word, and of the key field leading every request.
pub const WORD_SIZE: usize = 8;

/// Per-session XOR key
///
/// Fixed at client construction and never mutated. The value is redacted
/// from `Debug` output so it does not end up in logs.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObfuscationKey(u64);

impl ObfuscationKey
{
    /// Create a key from its raw value.
    pub const fn new(value: u64) -> Self
    {
        ObfuscationKey(value)
    }

    /// Raw key value
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// Key as it appears in the leading request field.
    pub const fn to_le_bytes(self) -> [u8; WORD_SIZE]
    {
        self.0.to_le_bytes()
    }
}

impl fmt::Debug for ObfuscationKey
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str("ObfuscationKey(..)")
    }
}

impl From<u64> for ObfuscationKey
{
    fn from(value: u64) -> Self
    {
        ObfuscationKey(value)
    }
}

/// Parses `0x`-prefixed hex or plain decimal.
impl FromStr for ObfuscationKey
{
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        let trimmed = s.trim();
        let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
            None => trimmed.replace('_', "").parse::<u64>(),
        };
        parsed
            .map(ObfuscationKey)
            .map_err(|err| DriverError::InvalidKey(format!("{trimmed:?}: {err}")))
    }
}

/// Byte range a transform applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage
{
    /// Everything after the leading key field (requests)
    Payload,
    /// The entire buffer (responses)
    Whole,
}

impl Coverage
{
    const fn start(self) -> usize
    {
        match self {
            Coverage::Payload => WORD_SIZE,
            Coverage::Whole => 0,
        }
    }
}

/// XOR every full word in the covered range with `key`.
pub fn apply(buffer: &mut [u8], key: ObfuscationKey, coverage: Coverage)
{
    let Some(covered) = buffer.get_mut(coverage.start()..) else {
        return;
    };
    let mask = key.to_le_bytes();
    for word in covered.chunks_exact_mut(WORD_SIZE) {
        for (byte, m) in word.iter_mut().zip(mask) {
            *byte ^= m;
        }
    }
}

/// Scramble a request in place, leaving the key field untouched.
pub fn encode(buffer: &mut [u8], key: ObfuscationKey)
{
    apply(buffer, key, Coverage::Payload);
}

/// Unscramble a response in place.
pub fn decode(buffer: &mut [u8], key: ObfuscationKey)
{
    apply(buffer, key, Coverage::Whole);
}
