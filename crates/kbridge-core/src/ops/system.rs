//! # System Operations
//!
//! Kernel-address-space access, pool allocation, driver maintenance and the
//! cursor query.

use tracing::debug;

use crate::client::DriverClient;
use crate::codec;
use crate::error::{DriverError, Result};
use crate::opcode::Opcode;
use crate::ops::memory::destination_address;
use crate::query::SystemInformationQuery;
use crate::transport::DeviceTransport;
use crate::types::{CursorPosition, EncodedString, RemotePointer};
use crate::wire::{PayloadWriter, Request};

/// Capacity of the driver name pattern in [`DeleteUnloadedDrivers`], in UTF-16 units.
pub const UNLOADED_DRIVER_NAME_CAPACITY: usize = 64;

/// Size of the cursor reply: two `i32` coordinates.
const CURSOR_REPLY_LEN: usize = 8;

/// Copy `size` bytes of kernel memory at `address` to local `destination`
///
/// The reply is the byte count the backend reports.
#[derive(Debug, Clone, Copy)]
pub struct ReadSystemMemory
{
    pub address: RemotePointer,
    pub size: usize,
    /// Local address the backend writes to
    pub destination: u64,
}

impl Request for ReadSystemMemory
{
    const OPCODE: Opcode = Opcode::ReadSystemMemory;
    type Response = u64;

    fn write_payload(&self, payload: &mut PayloadWriter) -> Result<()>
    {
        payload
            .pointer(self.address)
            .size(self.size)
            .word(self.destination);
        Ok(())
    }
}

/// Copy `data` to kernel memory at `address`
///
/// Like the process writes, only the local address of `data` travels in the
/// request.
#[derive(Debug, Clone, Copy)]
pub struct WriteSystemMemory<'a>
{
    pub address: RemotePointer,
    pub data: &'a [u8],
}

impl Request for WriteSystemMemory<'_>
{
    const OPCODE: Opcode = Opcode::WriteSystemMemory;
    type Response = u64;

    fn write_payload(&self, payload: &mut PayloadWriter) -> Result<()>
    {
        payload
            .pointer(self.address)
            .size(self.data.len())
            .word(self.data.as_ptr() as u64);
        Ok(())
    }
}

/// Allocate from nonpaged pool; the reply is the pool address
#[derive(Debug, Clone, Copy)]
pub struct AllocateNonpagedMemory
{
    pub size: u64,
}

impl Request for AllocateNonpagedMemory
{
    const OPCODE: Opcode = Opcode::AllocateNonpagedMemory;
    type Response = RemotePointer;

    fn write_payload(&self, payload: &mut PayloadWriter) -> Result<()>
    {
        payload.word(self.size);
        Ok(())
    }
}

/// Scrub entries matching `name` from the kernel's unloaded-driver history
#[derive(Debug, Clone)]
pub struct DeleteUnloadedDrivers<'a>
{
    /// Address of the `MmUnloadedDrivers` array pointer
    pub list: RemotePointer,
    /// Address of `MmLastUnloadedDriver`
    pub last_index: RemotePointer,
    pub name: &'a EncodedString,
}

impl Request for DeleteUnloadedDrivers<'_>
{
    const OPCODE: Opcode = Opcode::DeleteUnloadedDrivers;
    type Response = u64;

    fn write_payload(&self, payload: &mut PayloadWriter) -> Result<()>
    {
        let name = self.name.embed("unloaded_driver_name", UNLOADED_DRIVER_NAME_CAPACITY)?;
        payload.pointer(self.list).pointer(self.last_index).field(&name);
        Ok(())
    }
}

/// Call a driver entry point mapped into kernel space
#[derive(Debug, Clone, Copy)]
pub struct RunDriverEntry
{
    pub entry: RemotePointer,
    pub first_argument: u64,
    pub second_argument: u64,
}

impl Request for RunDriverEntry
{
    const OPCODE: Opcode = Opcode::RunDriverEntry;
    type Response = u64;

    fn write_payload(&self, payload: &mut PayloadWriter) -> Result<()>
    {
        payload
            .pointer(self.entry)
            .word(self.first_argument)
            .word(self.second_argument);
        Ok(())
    }
}

impl<T: DeviceTransport> DriverClient<T>
{
    /// Bytes a system information query for `class` would produce.
    pub fn query_system_information_size(&self, class: u64) -> Result<usize>
    {
        self.query_size(&SystemInformationQuery { information_class: class })
    }

    /// Fill `destination` with system information; returns bytes written.
    pub fn query_system_information_into(&self, class: u64, destination: &mut [u8]) -> Result<usize>
    {
        self.query_into(&SystemInformationQuery { information_class: class }, destination)
    }

    /// Run both query phases and return the information as an owned buffer.
    ///
    /// ## Example
    ///
    /// ```rust,no_run
    /// # fn demo<T: kbridge_core::DeviceTransport>(client: &kbridge_core::DriverClient<T>) -> kbridge_core::Result<()> {
    /// // SystemModuleInformation
    /// let modules = client.query_system_information_owned(11)?;
    /// println!("{} bytes of module information", modules.len());
    /// # Ok(())
    /// # }
    /// ```
    pub fn query_system_information_owned(&self, class: u64) -> Result<Vec<u8>>
    {
        self.query_owned(&SystemInformationQuery { information_class: class })
    }

    /// Copy kernel memory at `address` into `buffer`.
    ///
    /// The backend writes straight into `buffer`, which is decoded as a
    /// whole afterwards. Returns the byte count the backend reports, which
    /// may be less than `buffer.len()`.
    pub fn read_system_memory(&self, address: RemotePointer, buffer: &mut [u8]) -> Result<u64>
    {
        let request = ReadSystemMemory {
            address,
            size: buffer.len(),
            destination: destination_address(buffer),
        };
        let read = self.call(&request)?;
        codec::decode(buffer, self.key());
        Ok(read)
    }

    /// Copy `data` to kernel memory at `address`; returns bytes written.
    pub fn write_system_memory(&self, address: RemotePointer, data: &[u8]) -> Result<u64>
    {
        self.call(&WriteSystemMemory { address, data })
    }

    /// Allocate `size` bytes of nonpaged pool.
    ///
    /// The address is returned as reported. A null pointer is passed through
    /// rather than turned into an error.
    pub fn allocate_nonpaged_memory(&self, size: u64) -> Result<RemotePointer>
    {
        let pointer = self.call(&AllocateNonpagedMemory { size })?;
        if pointer.is_null() {
            debug!(size, "nonpaged allocation returned null");
        }
        Ok(pointer)
    }

    /// Release nonpaged pool.
    ///
    /// The backend defines no protocol for this; always `Unsupported`.
    pub fn free_nonpaged_memory(&self, _pointer: RemotePointer) -> Result<()>
    {
        Err(DriverError::Unsupported("free_nonpaged_memory"))
    }

    /// Remove entries whose name matches `name` from the unloaded-driver list.
    ///
    /// Returns the number of entries removed.
    ///
    /// ## Errors
    ///
    /// `InputTooLarge` if `name` has 64 or more code units.
    pub fn delete_unloaded_drivers(
        &self,
        list: RemotePointer,
        last_index: RemotePointer,
        name: &EncodedString,
    ) -> Result<u64>
    {
        self.call(&DeleteUnloadedDrivers { list, last_index, name })
    }

    /// Invoke `entry(first_argument, second_argument)` in kernel context and
    /// return its result.
    pub fn run_driver_entry(&self, entry: RemotePointer, first_argument: u64, second_argument: u64) -> Result<u64>
    {
        self.call(&RunDriverEntry {
            entry,
            first_argument,
            second_argument,
        })
    }

    /// Screen position of the mouse cursor.
    ///
    /// Unkeyed: the request is empty and the reply is not obfuscated.
    pub fn cursor_position(&self) -> Result<CursorPosition>
    {
        let mut reply = [0u8; CURSOR_REPLY_LEN];
        let returned = self.call_unkeyed(Opcode::GetMousePos, Some(&mut reply[..]))?;
        if returned < CURSOR_REPLY_LEN {
            return Err(DriverError::ResponseTooShort {
                opcode: Opcode::GetMousePos,
                expected: CURSOR_REPLY_LEN,
                actual: returned,
            });
        }
        let [x0, x1, x2, x3, y0, y1, y2, y3] = reply;
        Ok(CursorPosition {
            x: i32::from_le_bytes([x0, x1, x2, x3]),
            y: i32::from_le_bytes([y0, y1, y2, y3]),
        })
    }
}
