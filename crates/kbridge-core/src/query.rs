//! # Two-Phase Queries
//!
//! Variable-length information queries.
//!
//! 1. **Size phase**: the request carries the size-only flag and no
//!    destination. The backend answers with the number of bytes it would
//!    produce, as a 4-byte value.
//! 2. **Fill phase**: the request carries the capacity of the caller's
//!    buffer. If the backend needs more, the call fails with
//!    [`DriverError::CapacityTooSmall`]; there is no truncated success. On
//!    success the reported length may be smaller than the capacity.
//!
//! The size reply is shorter than one obfuscation word, so it travels in the
//! clear even though it goes through the normal decode step.

use crate::client::{transport_failure, DriverClient};
use crate::codec;
use crate::error::{DriverError, Result};
use crate::opcode::Opcode;
use crate::transport::{DeviceTransport, TransportError};
use crate::types::ThreadId;
use crate::wire::{PayloadWriter, RequestEnvelope};

/// Size of the reply to a size-only query.
pub const SIZE_REPLY_LEN: usize = 4;

/// Which phase a query request is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode
{
    /// Ask only for the required size
    SizeOnly,
    /// Fill a buffer of this many bytes
    Fill
    {
        capacity: usize,
    },
}

impl QueryMode
{
    fn capacity(self) -> usize
    {
        match self {
            QueryMode::SizeOnly => 0,
            QueryMode::Fill { capacity } => capacity,
        }
    }

    fn is_size_only(self) -> bool
    {
        matches!(self, QueryMode::SizeOnly)
    }
}

/// A query whose output size is not known in advance
pub trait VariableQuery
{
    const OPCODE: Opcode;

    fn write_payload(&self, mode: QueryMode, payload: &mut PayloadWriter);
}

/// `NtQuerySystemInformation`-style query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemInformationQuery
{
    pub information_class: u64,
}

impl VariableQuery for SystemInformationQuery
{
    const OPCODE: Opcode = Opcode::QuerySystemInformation;

    fn write_payload(&self, mode: QueryMode, payload: &mut PayloadWriter)
    {
        // Leading reserved id, always zero.
        payload
            .word(0)
            .word(self.information_class)
            .size(mode.capacity())
            .flag(mode.is_size_only());
    }
}

/// `NtQueryInformationThread`-style query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadInformationQuery
{
    pub thread: ThreadId,
    pub information_class: u64,
}

impl VariableQuery for ThreadInformationQuery
{
    const OPCODE: Opcode = Opcode::QueryThreadInformation;

    fn write_payload(&self, mode: QueryMode, payload: &mut PayloadWriter)
    {
        payload
            .word(self.thread.raw())
            .word(self.information_class)
            .size(mode.capacity())
            .flag(mode.is_size_only());
    }
}

impl<T: DeviceTransport> DriverClient<T>
{
    fn query_envelope<Q: VariableQuery>(&self, query: &Q, mode: QueryMode) -> Vec<u8>
    {
        let mut payload = PayloadWriter::new();
        query.write_payload(mode, &mut payload);
        RequestEnvelope::new(self.key(), payload.into_bytes()).seal()
    }

    /// Phase 1: bytes the backend would produce.
    pub fn query_size<Q: VariableQuery>(&self, query: &Q) -> Result<usize>
    {
        let wire = self.query_envelope(query, QueryMode::SizeOnly);
        let mut reply = [0u8; SIZE_REPLY_LEN];
        let returned = self
            .dispatch(Q::OPCODE, &wire, Some(&mut reply[..]))
            .map_err(|err| transport_failure(Q::OPCODE, &err))?;
        if returned < SIZE_REPLY_LEN {
            return Err(DriverError::ResponseTooShort {
                opcode: Q::OPCODE,
                expected: SIZE_REPLY_LEN,
                actual: returned,
            });
        }
        codec::decode(&mut reply, self.key());
        Ok(u32::from_le_bytes(reply) as usize)
    }

    /// Phase 2: fill `destination` and return the bytes written.
    ///
    /// ## Errors
    ///
    /// - `CapacityTooSmall`: `destination` cannot hold the output; run
    ///   [`DriverClient::query_size`] again and reallocate
    /// - `TransportFailure`: any other refusal
    pub fn query_into<Q: VariableQuery>(&self, query: &Q, destination: &mut [u8]) -> Result<usize>
    {
        let capacity = destination.len();
        let wire = self.query_envelope(query, QueryMode::Fill { capacity });
        match self.dispatch(Q::OPCODE, &wire, Some(&mut *destination)) {
            Ok(returned) => {
                let produced = returned.min(capacity);
                codec::decode(&mut destination[..produced], self.key());
                Ok(produced)
            }
            Err(TransportError::BufferTooSmall) => Err(DriverError::CapacityTooSmall {
                opcode: Q::OPCODE,
                capacity,
            }),
            Err(err) => Err(transport_failure(Q::OPCODE, &err)),
        }
    }

    /// Run both phases once and return the output.
    ///
    /// If the output grows between the two phases this fails with
    /// `CapacityTooSmall` like any other undersized fill.
    pub fn query_owned<Q: VariableQuery>(&self, query: &Q) -> Result<Vec<u8>>
    {
        let size = self.query_size(query)?;
        let mut buffer = vec![0u8; size];
        let produced = self.query_into(query, &mut buffer)?;
        buffer.truncate(produced);
        Ok(buffer)
    }
}
