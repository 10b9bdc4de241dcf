//! Common module for library exports

pub use crate::client::DriverClient;
pub use crate::codec::ObfuscationKey;
pub use crate::error::{DriverError, Result};
pub use crate::opcode::Opcode;
#[cfg(windows)]
pub use crate::platform::windows::DeviceHandle;
pub use crate::transport::{DeviceTransport, TransportError};
pub use crate::types::{
    AllocationType, CreatedThread, CursorPosition, EncodedString, MemoryRegionDescriptor, NtStatus, PageProtection,
    ProcessId, ProcessTimes, ProtectedRange, RemotePointer, SecurityDescriptor, ThreadId, ThreadStart, VirtualRange,
};
