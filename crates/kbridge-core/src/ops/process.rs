//! # Process Operations
//!
//! Identity, accounting and lifetime queries on a foreign process.

use std::time::Duration;

use crate::client::DriverClient;
use crate::codec::WORD_SIZE;
use crate::error::Result;
use crate::opcode::Opcode;
use crate::transport::DeviceTransport;
use crate::types::{EncodedString, NtStatus, ProcessId, ProcessTimes, RemotePointer};
use crate::wire::{FieldReader, PayloadWriter, Request, Response};

/// Capacity of the image name returned by [`GetProcessName`], in UTF-16 units.
pub const PROCESS_NAME_CAPACITY: usize = 256;

/// Timeout as the backend expects it: nanoseconds, saturating at `u64::MAX`.
pub(crate) fn timeout_nanos(timeout: Duration) -> u64
{
    u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX)
}

/// Requests whose only field is the target process
macro_rules! pid_request {
    ($(#[$doc:meta])* $name:ident, $opcode:expr, $response:ty) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name
        {
            pub pid: ProcessId,
        }

        impl Request for $name
        {
            const OPCODE: Opcode = $opcode;
            type Response = $response;

            fn write_payload(&self, payload: &mut PayloadWriter) -> Result<()>
            {
                payload.word(u64::from(self.pid.0));
                Ok(())
            }
        }
    };
}

pid_request!(
    /// Image base address of the main module
    GetProcessBase,
    Opcode::GetProcessBase,
    RemotePointer
);
pid_request!(
    /// Creation, exit, kernel and user times
    GetProcessTimes,
    Opcode::GetProcessTimes,
    ProcessTimes
);
pid_request!(
    /// Image file name, as a fixed-capacity wide string
    GetProcessName,
    Opcode::GetProcessName,
    ProcessName
);
pid_request!(
    /// Exit status, or `STATUS_PENDING` while the process runs
    GetProcessExitStatus,
    Opcode::GetProcessExitStatus,
    NtStatus
);
pid_request!(
    /// Guard a process against termination by other processes
    ///
    /// ## Example
    ///
    /// ```rust
    /// use kbridge_core::ops::process::ProtectProcess;
    /// use kbridge_core::opcode::Opcode;
    /// use kbridge_core::wire::{PayloadWriter, Request};
    /// use kbridge_core::types::ProcessId;
    ///
    /// let request = ProtectProcess { pid: ProcessId::from(4242) };
    /// let mut payload = PayloadWriter::new();
    /// request.write_payload(&mut payload)?;
    /// assert_eq!(payload.into_bytes(), 4242u64.to_le_bytes());
    /// assert_eq!(ProtectProcess::OPCODE, Opcode::ProtectProcess);
    /// # Ok::<(), kbridge_core::DriverError>(())
    /// ```
    ProtectProcess,
    Opcode::ProtectProcess,
    ()
);

/// Image file name of a process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessName(pub EncodedString);

impl Response for ProcessName
{
    const WIRE_SIZE: usize = PROCESS_NAME_CAPACITY * 2;

    fn read_fields(fields: &mut FieldReader<'_>) -> Result<Self>
    {
        let raw = fields.field(Self::WIRE_SIZE)?;
        Ok(ProcessName(EncodedString::from_field(raw)))
    }
}

impl Response for ProcessTimes
{
    const WIRE_SIZE: usize = 4 * WORD_SIZE;

    fn read_fields(fields: &mut FieldReader<'_>) -> Result<Self>
    {
        Ok(ProcessTimes {
            creation_time: fields.word()?,
            exit_time: fields.word()?,
            kernel_time: fields.word()?,
            user_time: fields.word()?,
        })
    }
}

impl Response for NtStatus
{
    const WIRE_SIZE: usize = WORD_SIZE;

    fn read_fields(fields: &mut FieldReader<'_>) -> Result<Self>
    {
        fields.i32().map(NtStatus)
    }
}

/// Wait for a process to exit
///
/// The timeout goes out in nanoseconds; durations beyond `u64::MAX`
/// nanoseconds saturate.
#[derive(Debug, Clone, Copy)]
pub struct WaitForProcess
{
    pub pid: ProcessId,
    pub timeout: Duration,
}

impl Request for WaitForProcess
{
    const OPCODE: Opcode = Opcode::WaitForProcess;
    type Response = NtStatus;

    fn write_payload(&self, payload: &mut PayloadWriter) -> Result<()>
    {
        payload.word(u64::from(self.pid.0)).word(timeout_nanos(self.timeout));
        Ok(())
    }
}

/// Take a lock object that lives in the target's address space
#[derive(Debug, Clone, Copy)]
pub struct AcquireLock
{
    pub pid: ProcessId,
    pub lock: RemotePointer,
}

impl Request for AcquireLock
{
    const OPCODE: Opcode = Opcode::AcquireLock;
    type Response = bool;

    fn write_payload(&self, payload: &mut PayloadWriter) -> Result<()>
    {
        payload.word(u64::from(self.pid.0)).pointer(self.lock);
        Ok(())
    }
}

impl<T: DeviceTransport> DriverClient<T>
{
    /// Base address of the main image of `pid`.
    pub fn process_base(&self, pid: ProcessId) -> Result<RemotePointer>
    {
        self.call(&GetProcessBase { pid })
    }

    pub fn process_times(&self, pid: ProcessId) -> Result<ProcessTimes>
    {
        self.call(&GetProcessTimes { pid })
    }

    /// Image file name of `pid`, as the backend reports it.
    pub fn process_name(&self, pid: ProcessId) -> Result<String>
    {
        let ProcessName(name) = self.call(&GetProcessName { pid })?;
        Ok(name.to_string_lossy())
    }

    /// Exit status of `pid`; `STATUS_PENDING` while it still runs.
    pub fn process_exit_status(&self, pid: ProcessId) -> Result<NtStatus>
    {
        self.call(&GetProcessExitStatus { pid })
    }

    /// Block until `pid` exits or `timeout` elapses.
    ///
    /// A timeout is not an error: the returned status is
    /// [`NtStatus::TIMEOUT`].
    pub fn wait_for_process(&self, pid: ProcessId, timeout: Duration) -> Result<NtStatus>
    {
        self.call(&WaitForProcess { pid, timeout })
    }

    /// Acquire the lock at `lock` in process `pid`.
    ///
    /// Returns whether the backend reported the lock as taken.
    pub fn acquire_lock(&self, pid: ProcessId, lock: RemotePointer) -> Result<bool>
    {
        self.call(&AcquireLock { pid, lock })
    }

    /// Mark `pid` as protected.
    pub fn protect_process(&self, pid: ProcessId) -> Result<()>
    {
        self.call(&ProtectProcess { pid })
    }

    /// Clear the protection set by the last [`DriverClient::protect_process`].
    ///
    /// The backend tracks the protected process itself, so the request is
    /// empty and carries no key.
    pub fn unprotect_process(&self) -> Result<()>
    {
        self.call_unkeyed(Opcode::UnprotectProcess, None)?;
        Ok(())
    }
}
