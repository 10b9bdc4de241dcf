//! # Driver Client
//!
//! The generic call contract every typed operation goes through.
//!
//! A call builds the fixed-shape request, writes the session key into its
//! leading field, encodes it, hands it to the transport together with a reply
//! buffer, and decodes whatever comes back with the same key.
//!
//! ## Failure semantics
//!
//! - A transport failure is reported as [`DriverError::TransportFailure`].
//!   The OS error behind it is logged, not returned.
//! - Nothing is retried. Whether to try again is the caller's decision.
//! - Calls block the current thread for one round trip and cannot be
//!   cancelled once issued.
//!
//! ## Example
//!
//! ```rust,no_run
//! # #[cfg(windows)]
//! # fn demo() -> kbridge_core::Result<()> {
//! use kbridge_core::platform::windows::DeviceHandle;
//! use kbridge_core::types::ProcessId;
//! use kbridge_core::{DriverClient, ObfuscationKey};
//!
//! let device = DeviceHandle::open(r"\\.\kbridge")?;
//! let client = DriverClient::new(device, ObfuscationKey::new(0x5eed_1234_abcd_0042));
//! let base = client.process_base(ProcessId::from(4242))?;
//! println!("image base at {base}");
//! # Ok(())
//! # }
//! ```

use tracing::{debug, trace};

use crate::codec::ObfuscationKey;
use crate::error::{DriverError, Result};
use crate::opcode::Opcode;
use crate::transport::{DeviceTransport, TransportError};
use crate::wire::{Request, RequestEnvelope, Response, ResponseEnvelope};

/// Client bound to one transport and one obfuscation key
///
/// The key is fixed at construction. Several clients with different keys can
/// share a process, which is how the tests run independent sessions.
pub struct DriverClient<T>
{
    transport: T,
    key: ObfuscationKey,
}

impl<T> DriverClient<T>
{
    pub fn new(transport: T, key: ObfuscationKey) -> Self
    {
        Self { transport, key }
    }

    /// Session key injected into every request
    pub fn key(&self) -> ObfuscationKey
    {
        self.key
    }

    pub fn transport(&self) -> &T
    {
        &self.transport
    }

    pub fn into_transport(self) -> T
    {
        self.transport
    }
}

impl<T: DeviceTransport> DriverClient<T>
{
    /// Issue a typed request and decode its fixed-shape reply.
    ///
    /// ## Errors
    ///
    /// - `InputTooLarge`: an embedded field did not fit (nothing was sent)
    /// - `TransportFailure`: the backend refused the call
    /// - `ResponseTooShort`: the reply was smaller than its structure
    ///
    /// ## Example
    ///
    /// ```rust
    /// use kbridge_core::opcode::Opcode;
    /// use kbridge_core::ops::process::ProtectProcess;
    /// use kbridge_core::types::ProcessId;
    /// use kbridge_core::{DeviceTransport, DriverClient, DriverError, ObfuscationKey, TransportError};
    ///
    /// /// Backend that refuses everything
    /// struct Refusing;
    ///
    /// impl DeviceTransport for Refusing
    /// {
    ///     fn send(&self, _: Opcode, _: &[u8], _: Option<&mut [u8]>) -> Result<usize, TransportError>
    ///     {
    ///         Err(TransportError::rejected())
    ///     }
    /// }
    ///
    /// let client = DriverClient::new(Refusing, ObfuscationKey::new(0x5eed));
    /// let err = client.call(&ProtectProcess { pid: ProcessId::from(4242) }).unwrap_err();
    /// assert!(matches!(err, DriverError::TransportFailure { opcode: Opcode::ProtectProcess }));
    /// ```
    pub fn call<R: Request>(&self, request: &R) -> Result<R::Response>
    {
        let wire = RequestEnvelope::for_request(self.key, request)?.seal();
        let expected = <R::Response as Response>::WIRE_SIZE;
        let mut reply = vec![0u8; expected];
        let buffer = (expected > 0).then_some(reply.as_mut_slice());

        let returned = self
            .dispatch(R::OPCODE, &wire, buffer)
            .map_err(|err| transport_failure(R::OPCODE, &err))?;
        if returned < expected {
            return Err(DriverError::ResponseTooShort {
                opcode: R::OPCODE,
                expected,
                actual: returned,
            });
        }

        let response = ResponseEnvelope::unseal(R::OPCODE, &mut reply, self.key);
        <R::Response as Response>::read_fields(&mut response.fields())
    }

    /// Issue a call that carries no request and no key.
    ///
    /// The reply, if any, is returned as the backend wrote it.
    pub(crate) fn call_unkeyed(&self, opcode: Opcode, response: Option<&mut [u8]>) -> Result<usize>
    {
        self.dispatch(opcode, &[], response)
            .map_err(|err| transport_failure(opcode, &err))
    }

    /// Raw round trip with logging, leaving error mapping to the caller.
    pub(crate) fn dispatch(
        &self,
        opcode: Opcode,
        request: &[u8],
        response: Option<&mut [u8]>,
    ) -> std::result::Result<usize, TransportError>
    {
        let capacity = response.as_ref().map_or(0, |buf| buf.len());
        trace!(%opcode, request_len = request.len(), capacity, "device control");
        let returned = self.transport.send(opcode, request, response)?;
        trace!(%opcode, returned, "device control completed");
        Ok(returned)
    }
}

/// Collapse a transport error into the uniform failure this layer reports.
pub(crate) fn transport_failure(opcode: Opcode, err: &TransportError) -> DriverError
{
    debug!(%opcode, error = %err, "device control failed");
    DriverError::TransportFailure { opcode }
}
