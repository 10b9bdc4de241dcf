//! # Types
//!
//! Values exchanged with the backend.
//!
//! Identifiers and addresses are newtypes so a PID cannot be passed where a
//! size or a foreign pointer is expected.

pub mod address;
pub mod embedded;
pub mod memory;
pub mod process;

// Re-export all public types
pub use address::RemotePointer;
pub use embedded::{EncodedString, SecurityDescriptor, SECURITY_DESCRIPTOR_CAPACITY};
pub use memory::{AllocationType, MemoryRegionDescriptor, PageProtection, ProtectedRange, VirtualRange};
pub use process::{CreatedThread, NtStatus, ProcessId, ProcessTimes, ThreadId, ThreadStart};

/// Screen position of the cursor, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorPosition
{
    pub x: i32,
    pub y: i32,
}
