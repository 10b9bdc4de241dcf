//! # Platform-Specific Implementations
//!
//! Native transports for [`DeviceTransport`](crate::DeviceTransport).
//!
//! - **Windows**: opens the backend's device object with `CreateFileW` and
//!   talks to it through `DeviceIoControl`
//!   - See: [DeviceIoControl](https://learn.microsoft.com/en-us/windows/win32/api/ioapiset/nf-ioapiset-deviceiocontrol)
//!
//! Other hosts have no native transport. The client itself compiles
//! everywhere, so it can be driven by an in-memory transport in tests.

#[cfg(windows)]
pub mod windows;
