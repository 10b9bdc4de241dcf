//! # kbridge-core
//!
//! Client side of a keyed device-control protocol to a privileged backend.
//!
//! This crate provides:
//! - The word-XOR obfuscation codec and the request/response envelopes
//! - A transport trait over the device-control channel
//! - The generic call contract, two-phase size discovery and chunked writes
//! - A typed catalog of process, thread, memory and system operations
//!
//! ## Platform Support
//!
//! - **Windows**: native transport through `DeviceIoControl`
//! - **Other hosts**: the protocol layer builds and runs against any
//!   [`DeviceTransport`], which is how it is tested
//!
//! ## Why unsafe code is needed
//!
//! Only the Windows transport uses `unsafe`, to call `CreateFileW`,
//! `DeviceIoControl` and `CloseHandle`. Everything above it is safe code.

#![allow(unsafe_code)] // Required for the Win32 device-control calls

mod chunked;
pub mod client;
pub mod codec;
pub mod error;
pub mod opcode;
pub mod ops;
pub mod platform;
pub mod prelude;
pub mod query;
pub mod transport;
pub mod types;
pub mod wire;

pub use client::DriverClient;
pub use codec::ObfuscationKey;
// Re-export commonly used types
pub use error::{DriverError, Result};
pub use opcode::Opcode;
#[cfg(windows)]
pub use platform::windows::DeviceHandle;
pub use transport::{DeviceTransport, TransportError};
