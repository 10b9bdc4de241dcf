//! # Error Types
//!
//! Error handling for device-control operations.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.

use thiserror::Error;

use crate::opcode::Opcode;

/// Main error type for backend operations
///
/// Every typed operation returns one of these instead of panicking. The
/// variants map onto the failure categories of the wire protocol:
///
/// 1. **Transport errors**: TransportFailure, ResponseTooShort
/// 2. **Sizing errors**: CapacityTooSmall, InputTooLarge
/// 3. **Partial effects**: PartialTransfer
/// 4. **Surface gaps**: Unsupported
/// 5. **Setup errors**: InvalidKey, Io
#[derive(Error, Debug)]
pub enum DriverError
{
    /// The backend rejected the request or the channel could not complete it
    ///
    /// No finer-grained code is recovered at this layer. The operation did not
    /// happen; retrying is entirely the caller's decision.
    #[error("Transport failure on {opcode}")]
    TransportFailure
    {
        /// Operation that failed
        opcode: Opcode,
    },

    /// The destination buffer of a two-phase query is too small
    ///
    /// Re-run the size query and reallocate. No truncated output is ever
    /// returned.
    #[error("Capacity of {capacity} bytes too small for {opcode}")]
    CapacityTooSmall
    {
        /// Query that was issued
        opcode: Opcode,
        /// Capacity supplied by the caller
        capacity: usize,
    },

    /// An argument does not fit a fixed-size field of the request
    ///
    /// Raised before anything is sent to the backend.
    #[error("Input too large for {field}: {len} exceeds capacity {capacity}")]
    InputTooLarge
    {
        /// Name of the embedded field
        field: &'static str,
        /// Length of the supplied value, in field units
        len: usize,
        /// Capacity of the field, in field units
        capacity: usize,
    },

    /// A chunked write stopped before the whole range was written
    ///
    /// The first `written` bytes of the destination range have already been
    /// modified. Nothing is rolled back.
    #[error("Partial transfer on {opcode}: {written} of {requested} bytes written")]
    PartialTransfer
    {
        /// Operation that was interrupted
        opcode: Opcode,
        /// Bytes confirmed written before the failing chunk
        written: usize,
        /// Bytes the caller asked to write
        requested: usize,
    },

    /// The backend reported success but returned fewer bytes than the reply needs
    #[error("Response too short for {opcode}: expected {expected} bytes, got {actual}")]
    ResponseTooShort
    {
        /// Operation whose reply was short
        opcode: Opcode,
        /// Size of the reply structure
        expected: usize,
        /// Bytes the transport reported
        actual: usize,
    },

    /// The operation is part of the surface but the backend has no protocol for it
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    /// An obfuscation key could not be parsed
    #[error("Invalid obfuscation key: {0}")]
    InvalidKey(String),

    /// I/O error while opening or closing the device
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriverError
{
    /// Number of bytes already committed by an interrupted transfer
    ///
    /// Returns `Some` only for [`DriverError::PartialTransfer`]. Every other
    /// failure means the operation did not happen.
    pub fn bytes_written(&self) -> Option<usize>
    {
        match self {
            DriverError::PartialTransfer { written, .. } => Some(*written),
            _ => None,
        }
    }

    /// Whether the transport itself refused the call.
    pub fn is_transport_failure(&self) -> bool
    {
        matches!(self, DriverError::TransportFailure { .. })
    }
}

/// Convenience type alias for `Result<T, DriverError>`
///
/// ```rust
/// use kbridge_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, DriverError>;
