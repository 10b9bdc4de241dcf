//! # Device-Control Transport
//!
//! The boundary to the privileged backend.
//!
//! A transport takes an opcode, a request buffer and an optional reply
//! buffer, and reports how many reply bytes were produced. Everything behind
//! it (the device, the driver, the kernel) is a black box to this crate.
//!
//! ## Implementations
//!
//! - **Windows**: [`crate::platform::windows::DeviceHandle`] issues
//!   `DeviceIoControl` on an opened device.
//! - **Tests**: any in-memory backend can implement [`DeviceTransport`] and
//!   be handed to [`crate::DriverClient`].
//!
//! ## Reentrancy
//!
//! The client adds no locking of its own. Sharing one client between threads
//! is exactly as safe as calling the transport concurrently.

use std::io;

use thiserror::Error;

use crate::opcode::Opcode;

/// Why a transport call failed
#[derive(Error, Debug)]
pub enum TransportError
{
    /// The reply buffer was smaller than what the backend needed to produce
    #[error("reply buffer too small")]
    BufferTooSmall,

    /// Any other refusal or channel failure
    #[error("device control failed: {0}")]
    Rejected(#[from] io::Error),
}

impl TransportError
{
    /// A refusal with no further detail.
    pub fn rejected() -> Self
    {
        TransportError::Rejected(io::Error::other("request rejected by backend"))
    }
}

/// One synchronous request/response exchange with the backend
pub trait DeviceTransport
{
    /// Send `request` under `opcode` and wait for the reply.
    ///
    /// On success returns the number of bytes written into `response`, which
    /// never exceeds its length. `None` means the operation has no reply
    /// buffer.
    fn send(&self, opcode: Opcode, request: &[u8], response: Option<&mut [u8]>) -> Result<usize, TransportError>;
}

impl<T: DeviceTransport + ?Sized> DeviceTransport for &T
{
    fn send(&self, opcode: Opcode, request: &[u8], response: Option<&mut [u8]>) -> Result<usize, TransportError>
    {
        (**self).send(opcode, request, response)
    }
}

impl<T: DeviceTransport + ?Sized> DeviceTransport for Box<T>
{
    fn send(&self, opcode: Opcode, request: &[u8], response: Option<&mut [u8]>) -> Result<usize, TransportError>
    {
        (**self).send(opcode, request, response)
    }
}

impl<T: DeviceTransport + ?Sized> DeviceTransport for std::sync::Arc<T>
{
    fn send(&self, opcode: Opcode, request: &[u8], response: Option<&mut [u8]>) -> Result<usize, TransportError>
    {
        (**self).send(opcode, request, response)
    }
}
