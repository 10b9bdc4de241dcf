//! # Operation Catalog
//!
//! One request struct per backend operation, plus the typed
//! [`DriverClient`](crate::DriverClient) methods built on them.
//!
//! - [`memory`]: process memory reads, writes and virtual-memory management
//! - [`process`]: process identity, accounting and lifetime
//! - [`thread`]: thread queries, waits and remote thread creation
//! - [`system`]: kernel memory, pool allocation and driver maintenance
//!
//! The request structs are public so callers can go through
//! [`DriverClient::call`](crate::DriverClient::call) directly.

pub mod memory;
pub mod process;
pub mod system;
pub mod thread;

pub use crate::chunked::FORCE_WRITE_CHUNK;
pub use memory::{MAPPED_FILE_CAPACITY, MEMORY_BASIC_INFORMATION_SIZE};
pub use process::PROCESS_NAME_CAPACITY;
pub use system::UNLOADED_DRIVER_NAME_CAPACITY;
pub use thread::{THREAD_BASIC_INFORMATION, THREAD_BASIC_INFORMATION_SIZE};
