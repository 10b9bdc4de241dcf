//! # Opcode Catalog
//!
//! Symbolic names for every backend operation and the device-control codes
//! they travel under.
//!
//! Codes follow the `CTL_CODE` layout used by Windows drivers:
//!
//! ```text
//! bits 31..16  device type   (FILE_DEVICE_UNKNOWN = 0x22)
//! bits 15..14  access        (FILE_ANY_ACCESS = 0)
//! bits 13..2   function      (0x800 + index)
//! bits  1..0   method        (METHOD_BUFFERED = 0)
//! ```

use std::fmt;

/// Device type for non-hardware drivers.
pub const FILE_DEVICE_UNKNOWN: u32 = 0x22;

/// Buffered I/O transfer method.
pub const METHOD_BUFFERED: u32 = 0;

/// No access check beyond opening the device.
pub const FILE_ANY_ACCESS: u32 = 0;

/// First function number available to third-party drivers.
pub const FUNCTION_BASE: u32 = 0x800;

/// Build a device-control code from its four components.
pub const fn ctl_code(device_type: u32, function: u32, method: u32, access: u32) -> u32
{
    (device_type << 16) | (access << 14) | (function << 2) | method
}

/// Backend operation selector
///
/// The declaration order fixes the function number of each code, so new
/// variants go at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode
{
    QuerySystemInformation,
    ReadProcessMemory,
    WriteProcessMemory,
    AcquireLock,
    ReadSystemMemory,
    WriteSystemMemory,
    AllocateNonpagedMemory,
    ForceWriteProcessMemory,
    QueryVirtualMemory,
    GetMappedFile,
    GetProcessBase,
    GetProcessTimes,
    GetProcessName,
    GetProcessExitStatus,
    WaitForProcess,
    WaitForThread,
    QueryThreadInformation,
    CreateUserThread,
    AllocateVirtualMemory,
    FreeVirtualMemory,
    ProtectVirtualMemory,
    DeleteUnloadedDrivers,
    RunDriverEntry,
    GetMousePos,
    ProtectProcess,
    UnprotectProcess,
}

impl Opcode
{
    /// Every opcode, in function-number order.
    pub const ALL: [Opcode; 26] = [
        Opcode::QuerySystemInformation,
        Opcode::ReadProcessMemory,
        Opcode::WriteProcessMemory,
        Opcode::AcquireLock,
        Opcode::ReadSystemMemory,
        Opcode::WriteSystemMemory,
        Opcode::AllocateNonpagedMemory,
        Opcode::ForceWriteProcessMemory,
        Opcode::QueryVirtualMemory,
        Opcode::GetMappedFile,
        Opcode::GetProcessBase,
        Opcode::GetProcessTimes,
        Opcode::GetProcessName,
        Opcode::GetProcessExitStatus,
        Opcode::WaitForProcess,
        Opcode::WaitForThread,
        Opcode::QueryThreadInformation,
        Opcode::CreateUserThread,
        Opcode::AllocateVirtualMemory,
        Opcode::FreeVirtualMemory,
        Opcode::ProtectVirtualMemory,
        Opcode::DeleteUnloadedDrivers,
        Opcode::RunDriverEntry,
        Opcode::GetMousePos,
        Opcode::ProtectProcess,
        Opcode::UnprotectProcess,
    ];

    /// Device-control code sent to the backend.
    pub const fn code(self) -> u32
    {
        ctl_code(FILE_DEVICE_UNKNOWN, FUNCTION_BASE + self as u32, METHOD_BUFFERED, FILE_ANY_ACCESS)
    }

    /// Wire-level symbolic name
    pub const fn name(self) -> &'static str
    {
        match self {
            Opcode::QuerySystemInformation => "QUERY_SYSTEM_INFORMATION",
            Opcode::ReadProcessMemory => "READ_PROCESS_MEMORY",
            Opcode::WriteProcessMemory => "WRITE_PROCESS_MEMORY",
            Opcode::AcquireLock => "ACQUIRE_LOCK",
            Opcode::ReadSystemMemory => "READ_SYSTEM_MEMORY",
            Opcode::WriteSystemMemory => "WRITE_SYSTEM_MEMORY",
            Opcode::AllocateNonpagedMemory => "ALLOCATE_NONPAGED_MEMORY",
            Opcode::ForceWriteProcessMemory => "FORCE_WRITE_PROCESS_MEMORY",
            Opcode::QueryVirtualMemory => "QUERY_VIRTUAL_MEMORY",
            Opcode::GetMappedFile => "GET_MAPPED_FILE",
            Opcode::GetProcessBase => "GET_PROCESS_BASE",
            Opcode::GetProcessTimes => "GET_PROCESS_TIMES",
            Opcode::GetProcessName => "GET_PROCESS_NAME",
            Opcode::GetProcessExitStatus => "GET_PROCESS_EXIT_STATUS",
            Opcode::WaitForProcess => "WAIT_FOR_PROCESS",
            Opcode::WaitForThread => "WAIT_FOR_THREAD",
            Opcode::QueryThreadInformation => "QUERY_THREAD_INFORMATION",
            Opcode::CreateUserThread => "CREATE_USER_THREAD",
            Opcode::AllocateVirtualMemory => "ALLOCATE_VIRTUAL_MEMORY",
            Opcode::FreeVirtualMemory => "FREE_VIRTUAL_MEMORY",
            Opcode::ProtectVirtualMemory => "PROTECT_VIRTUAL_MEMORY",
            Opcode::DeleteUnloadedDrivers => "DELETE_UNLOADED_DRIVERS",
            Opcode::RunDriverEntry => "RUN_DRIVER_ENTRY",
            Opcode::GetMousePos => "GET_MOUSE_POS",
            Opcode::ProtectProcess => "PROTECT_PROCESS",
            Opcode::UnprotectProcess => "UNPROTECT_PROCESS",
        }
    }

    /// Look an opcode up by its device-control code.
    pub fn from_code(code: u32) -> Option<Opcode>
    {
        Opcode::ALL.iter().copied().find(|op| op.code() == code)
    }
}

impl fmt::Display for Opcode
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(self.name())
    }
}
