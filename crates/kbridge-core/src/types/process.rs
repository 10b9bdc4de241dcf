//! Process and thread identifiers and the values the backend reports about them.

use std::fmt;

use super::RemotePointer;

/// Process identifier (PID)
///
/// Opaque and value-comparable. The backend receives it widened to a 64-bit
/// wire word.
///
/// ## Example
///
/// ```rust
/// use kbridge_core::types::ProcessId;
///
/// let pid = ProcessId::from(4);
/// assert_eq!(u32::from(pid), 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId(pub u32);

impl From<u32> for ProcessId
{
    fn from(pid: u32) -> Self
    {
        ProcessId(pid)
    }
}

impl From<ProcessId> for u32
{
    fn from(pid: ProcessId) -> Self
    {
        pid.0
    }
}

impl fmt::Display for ProcessId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// Thread identifier
///
/// Stored as a `u64` so it can travel in one wire word without conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadId(pub u64);

impl ThreadId
{
    /// Raw `u64` representation of the thread identifier
    pub fn raw(&self) -> u64
    {
        self.0
    }
}

impl From<u64> for ThreadId
{
    fn from(value: u64) -> Self
    {
        Self(value)
    }
}

impl fmt::Display for ThreadId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// Kernel status code (`NTSTATUS`)
///
/// Negative values are errors. Warnings and informational codes such as
/// [`NtStatus::TIMEOUT`] count as success, matching `NT_SUCCESS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NtStatus(pub i32);

impl NtStatus
{
    /// `STATUS_SUCCESS`
    pub const SUCCESS: Self = NtStatus(0);
    /// `STATUS_TIMEOUT`, returned by waits that elapsed
    pub const TIMEOUT: Self = NtStatus(0x0000_0102);
    /// `STATUS_PENDING`, the exit status of a process that is still running
    pub const PENDING: Self = NtStatus(0x0000_0103);

    /// `NT_SUCCESS(status)`
    pub const fn is_success(self) -> bool
    {
        self.0 >= 0
    }

    /// Bit pattern as the kernel prints it.
    pub const fn code(self) -> u32
    {
        self.0 as u32
    }
}

impl fmt::Display for NtStatus
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:08x}", self.code())
    }
}

/// Accounting times of a process, in 100-nanosecond units
///
/// Creation and exit times are absolute `FILETIME` values; kernel and user
/// times are durations. `exit_time` is zero while the process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessTimes
{
    pub creation_time: u64,
    pub exit_time: u64,
    pub kernel_time: u64,
    pub user_time: u64,
}

impl ProcessTimes
{
    /// Whether the backend reported an exit time.
    pub fn has_exited(&self) -> bool
    {
        self.exit_time != 0
    }
}

/// Identity of a thread created in a foreign process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedThread
{
    /// Owning process, as reported in the thread's client id
    pub process: ProcessId,
    /// The new thread
    pub thread: ThreadId,
}

/// Parameters of a remote user-mode thread
///
/// Mirrors `RtlCreateUserThread`. Zero stack sizes let the backend use the
/// image defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadStart
{
    /// Entry point in the target process
    pub start_address: RemotePointer,
    /// Value passed to the entry point
    pub parameter: u64,
    /// Create the thread suspended
    pub suspended: bool,
    /// Reserved stack size
    pub maximum_stack_size: u64,
    /// Initially committed stack size
    pub committed_stack_size: u64,
}

impl ThreadStart
{
    /// Thread starting at `start_address` with default stack sizes.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use kbridge_core::types::{RemotePointer, ThreadStart};
    ///
    /// let start = ThreadStart::new(RemotePointer::new(0x7FF6_0000_1000), 42)
    ///     .suspended()
    ///     .with_stack(0x10_0000, 0x1000);
    /// assert!(start.suspended);
    /// assert_eq!(start.parameter, 42);
    /// assert_eq!(start.committed_stack_size, 0x1000);
    /// ```
    pub fn new(start_address: RemotePointer, parameter: u64) -> Self
    {
        Self {
            start_address,
            parameter,
            suspended: false,
            maximum_stack_size: 0,
            committed_stack_size: 0,
        }
    }

    /// Create the thread suspended.
    pub fn suspended(mut self) -> Self
    {
        self.suspended = true;
        self
    }

    /// Override reserved and committed stack sizes.
    pub fn with_stack(mut self, maximum: u64, committed: u64) -> Self
    {
        self.maximum_stack_size = maximum;
        self.committed_stack_size = committed;
        self
    }
}
