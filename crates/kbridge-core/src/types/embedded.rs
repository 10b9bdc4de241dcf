//! Values copied into fixed-capacity request fields.
//!
//! Both types here check their length against the receiving field before any
//! byte is copied, so an oversized argument fails with
//! [`DriverError::InputTooLarge`] and never reaches the transport.

use std::fmt;

use crate::error::{DriverError, Result};

/// Size in bytes of a self-relative `SECURITY_DESCRIPTOR` on x64.
pub const SECURITY_DESCRIPTOR_CAPACITY: usize = 40;

/// Wide (UTF-16) string bound for a fixed-capacity, NUL-terminated field
///
/// ## Example
///
/// ```rust
/// use kbridge_core::types::EncodedString;
///
/// let name = EncodedString::from("kbridge.sys");
/// assert_eq!(name.len(), 11);
/// assert!(name.embed("name_pattern", 8).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncodedString
{
    units: Vec<u16>,
}

impl EncodedString
{
    /// Wrap raw UTF-16 code units.
    ///
    /// Anything after an embedded NUL would be invisible to the backend, so
    /// the units are cut there.
    pub fn from_units(units: &[u16]) -> Self
    {
        let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
        Self {
            units: units[..end].to_vec(),
        }
    }

    /// Read a NUL-terminated string out of a little-endian field.
    ///
    /// Stops at the first NUL, or at the end of the field if it has none.
    pub fn from_field(bytes: &[u8]) -> Self
    {
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .take_while(|&u| u != 0)
            .collect();
        Self { units }
    }

    /// Number of code units, excluding the terminator
    pub fn len(&self) -> usize
    {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.units.is_empty()
    }

    pub fn units(&self) -> &[u16]
    {
        &self.units
    }

    /// Lay the string out in a field of `capacity` code units.
    ///
    /// The result is `capacity * 2` bytes, NUL-terminated and zero-padded.
    /// The string must leave room for the terminator.
    ///
    /// ## Errors
    ///
    /// `InputTooLarge` when `len() >= capacity`.
    pub fn embed(&self, field: &'static str, capacity: usize) -> Result<Vec<u8>>
    {
        if self.units.len() >= capacity {
            return Err(DriverError::InputTooLarge {
                field,
                len: self.units.len(),
                capacity,
            });
        }
        let mut bytes = vec![0u8; capacity * 2];
        for (slot, unit) in bytes.chunks_exact_mut(2).zip(&self.units) {
            slot.copy_from_slice(&unit.to_le_bytes());
        }
        Ok(bytes)
    }

    /// Lossy conversion back to a Rust string.
    pub fn to_string_lossy(&self) -> String
    {
        String::from_utf16_lossy(&self.units)
    }
}

impl From<&str> for EncodedString
{
    fn from(value: &str) -> Self
    {
        Self::from_units(&value.encode_utf16().collect::<Vec<_>>())
    }
}

impl fmt::Display for EncodedString
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(&self.to_string_lossy())
    }
}

/// Security descriptor for a remote thread, as opaque bytes
///
/// The bytes are copied by value into the request. Descriptors larger than
/// [`SECURITY_DESCRIPTOR_CAPACITY`] are rejected before the copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityDescriptor(Vec<u8>);

impl SecurityDescriptor
{
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self
    {
        SecurityDescriptor(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8]
    {
        &self.0
    }

    /// Copy into the fixed descriptor field, zero-padded.
    ///
    /// ## Errors
    ///
    /// `InputTooLarge` when the descriptor exceeds the field.
    pub fn embed(&self) -> Result<[u8; SECURITY_DESCRIPTOR_CAPACITY]>
    {
        if self.0.len() > SECURITY_DESCRIPTOR_CAPACITY {
            return Err(DriverError::InputTooLarge {
                field: "thread_security_descriptor",
                len: self.0.len(),
                capacity: SECURITY_DESCRIPTOR_CAPACITY,
            });
        }
        let mut field = [0u8; SECURITY_DESCRIPTOR_CAPACITY];
        field[..self.0.len()].copy_from_slice(&self.0);
        Ok(field)
    }
}
