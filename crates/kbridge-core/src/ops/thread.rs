//! # Thread Operations
//!
//! Information queries, waits and remote thread creation.

use std::time::Duration;

use crate::client::DriverClient;
use crate::codec::WORD_SIZE;
use crate::error::{DriverError, Result};
use crate::opcode::Opcode;
use crate::ops::process::timeout_nanos;
use crate::query::ThreadInformationQuery;
use crate::transport::DeviceTransport;
use crate::types::{
    CreatedThread, NtStatus, ProcessId, RemotePointer, SecurityDescriptor, ThreadId, ThreadStart,
    SECURITY_DESCRIPTOR_CAPACITY,
};
use crate::wire::{FieldReader, PayloadWriter, Request, Response};

/// `ThreadBasicInformation`
pub const THREAD_BASIC_INFORMATION: u64 = 0;

/// Size of `THREAD_BASIC_INFORMATION` on x64.
pub const THREAD_BASIC_INFORMATION_SIZE: usize = 48;

/// Offset of `TebBaseAddress` within `THREAD_BASIC_INFORMATION`.
const TEB_OFFSET: usize = 8;

/// Wait for a thread to exit, with the same timeout encoding as
/// [`WaitForProcess`](crate::ops::process::WaitForProcess)
#[derive(Debug, Clone, Copy)]
pub struct WaitForThread
{
    pub thread: ThreadId,
    pub timeout: Duration,
}

impl Request for WaitForThread
{
    const OPCODE: Opcode = Opcode::WaitForThread;
    type Response = NtStatus;

    fn write_payload(&self, payload: &mut PayloadWriter) -> Result<()>
    {
        payload.word(self.thread.raw()).word(timeout_nanos(self.timeout));
        Ok(())
    }
}

/// `RtlCreateUserThread` in a foreign process
///
/// Payload: pid, the descriptor field zero-padded to
/// [`SECURITY_DESCRIPTOR_CAPACITY`] bytes, a flag saying whether the field is
/// set, the suspended flag, both stack sizes, the start address and the
/// parameter.
///
/// ## Example
///
/// ```rust
/// use kbridge_core::ops::thread::CreateUserThread;
/// use kbridge_core::types::{ProcessId, RemotePointer, ThreadStart};
/// use kbridge_core::wire::{PayloadWriter, Request};
///
/// let request = CreateUserThread {
///     pid: ProcessId::from(4242),
///     security_descriptor: None,
///     start: ThreadStart::new(RemotePointer::new(0x7FF6_0000_1000), 0),
/// };
/// let mut payload = PayloadWriter::new();
/// request.write_payload(&mut payload)?;
/// assert_eq!(payload.len(), 8 + 40 + 6 * 8);
/// # Ok::<(), kbridge_core::DriverError>(())
/// ```
#[derive(Debug, Clone)]
pub struct CreateUserThread<'a>
{
    pub pid: ProcessId,
    /// Optional descriptor for the new thread object
    pub security_descriptor: Option<&'a SecurityDescriptor>,
    pub start: ThreadStart,
}

impl Request for CreateUserThread<'_>
{
    const OPCODE: Opcode = Opcode::CreateUserThread;
    type Response = CreatedThread;

    fn write_payload(&self, payload: &mut PayloadWriter) -> Result<()>
    {
        let descriptor = match self.security_descriptor {
            Some(sd) => sd.embed()?,
            None => [0u8; SECURITY_DESCRIPTOR_CAPACITY],
        };
        payload
            .word(u64::from(self.pid.0))
            .field(&descriptor)
            .flag(self.security_descriptor.is_some())
            .flag(self.start.suspended)
            .word(self.start.maximum_stack_size)
            .word(self.start.committed_stack_size)
            .pointer(self.start.start_address)
            .word(self.start.parameter);
        Ok(())
    }
}

impl Response for CreatedThread
{
    const WIRE_SIZE: usize = 2 * WORD_SIZE;

    fn read_fields(fields: &mut FieldReader<'_>) -> Result<Self>
    {
        Ok(CreatedThread {
            process: ProcessId(fields.u32()?),
            thread: ThreadId(fields.word()?),
        })
    }
}

impl<T: DeviceTransport> DriverClient<T>
{
    /// Bytes a thread information query for `class` would produce.
    pub fn query_thread_information_size(&self, thread: ThreadId, class: u64) -> Result<usize>
    {
        self.query_size(&ThreadInformationQuery {
            thread,
            information_class: class,
        })
    }

    /// Fill `destination` with thread information; returns bytes written.
    pub fn query_thread_information_into(&self, thread: ThreadId, class: u64, destination: &mut [u8]) -> Result<usize>
    {
        let query = ThreadInformationQuery {
            thread,
            information_class: class,
        };
        self.query_into(&query, destination)
    }

    /// Run both query phases and return the information as an owned buffer.
    pub fn query_thread_information_owned(&self, thread: ThreadId, class: u64) -> Result<Vec<u8>>
    {
        self.query_owned(&ThreadInformationQuery {
            thread,
            information_class: class,
        })
    }

    /// Address of the thread environment block of `thread`.
    ///
    /// Queries basic information into a stack buffer and reads
    /// `TebBaseAddress` from it.
    pub fn thread_environment_block(&self, thread: ThreadId) -> Result<RemotePointer>
    {
        let mut info = [0u8; THREAD_BASIC_INFORMATION_SIZE];
        let produced = self.query_thread_information_into(thread, THREAD_BASIC_INFORMATION, &mut info)?;
        let end = TEB_OFFSET + WORD_SIZE;
        if produced < end {
            return Err(DriverError::ResponseTooShort {
                opcode: Opcode::QueryThreadInformation,
                expected: end,
                actual: produced,
            });
        }
        FieldReader::new(Opcode::QueryThreadInformation, &info[TEB_OFFSET..end]).pointer()
    }

    /// Block until `thread` exits or `timeout` elapses.
    ///
    /// A timeout is not an error; it comes back as
    /// [`NtStatus::TIMEOUT`].
    pub fn wait_for_thread(&self, thread: ThreadId, timeout: Duration) -> Result<NtStatus>
    {
        self.call(&WaitForThread { thread, timeout })
    }

    /// Start a thread in `pid`.
    ///
    /// ## Errors
    ///
    /// `InputTooLarge` if the descriptor does not fit its field; nothing is
    /// sent in that case.
    pub fn create_user_thread(
        &self,
        pid: ProcessId,
        security_descriptor: Option<&SecurityDescriptor>,
        start: ThreadStart,
    ) -> Result<CreatedThread>
    {
        self.call(&CreateUserThread {
            pid,
            security_descriptor,
            start,
        })
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_create_thread_layout()
    {
        let sd = SecurityDescriptor::new(vec![1u8; 20]);
        let request = CreateUserThread {
            pid: ProcessId(8),
            security_descriptor: Some(&sd),
            start: ThreadStart::new(RemotePointer::new(0x1400_0000), 7).suspended(),
        };
        let mut payload = PayloadWriter::new();
        request.write_payload(&mut payload).unwrap();
        let bytes = payload.into_bytes();
        // pid, sd[40], has_sd, suspended, max, committed, start, parameter
        assert_eq!(bytes.len(), 8 + 40 + 6 * 8);
        assert_eq!(&bytes[8..28], &[1u8; 20]);
        assert_eq!(&bytes[48..56], &1u64.to_le_bytes());
        assert_eq!(&bytes[56..64], &1u64.to_le_bytes());
        assert_eq!(&bytes[80..88], &0x1400_0000u64.to_le_bytes());
        assert_eq!(&bytes[88..96], &7u64.to_le_bytes());
    }

    #[test]
    fn test_oversized_descriptor_is_rejected()
    {
        let sd = SecurityDescriptor::new(vec![0u8; 41]);
        let request = CreateUserThread {
            pid: ProcessId(8),
            security_descriptor: Some(&sd),
            start: ThreadStart::new(RemotePointer::NULL, 0),
        };
        let err = request.write_payload(&mut PayloadWriter::new()).unwrap_err();
        assert!(matches!(err, DriverError::InputTooLarge { len: 41, capacity: 40, .. }));
    }

    #[test]
    fn test_wait_payload()
    {
        let mut payload = PayloadWriter::new();
        WaitForThread {
            thread: ThreadId(3),
            timeout: Duration::from_secs(1),
        }
        .write_payload(&mut payload)
        .unwrap();
        let bytes = payload.into_bytes();
        assert_eq!(&bytes[8..16], &1_000_000_000u64.to_le_bytes());
    }
}
