//! # Process Memory Operations
//!
//! Reads, writes and virtual-memory management in a foreign process.
//!
//! Write requests carry the local address of the source bytes; the backend
//! copies from the caller's buffer while the call is in flight. Those source
//! bytes are not obfuscated, only the request describing them is.
//!
//! Read requests carry the local address of the destination instead. The
//! backend fills the caller's buffer directly, scrambled with the session
//! key, and the client decodes it in place once the call returns.

use crate::chunked::{write_in_chunks, FORCE_WRITE_CHUNK};
use crate::client::DriverClient;
use crate::codec::{self, WORD_SIZE};
use crate::error::{DriverError, Result};
use crate::opcode::Opcode;
use crate::transport::DeviceTransport;
use crate::types::{
    AllocationType, EncodedString, MemoryRegionDescriptor, PageProtection, ProcessId, ProtectedRange, RemotePointer,
    VirtualRange,
};
use crate::wire::{FieldReader, PayloadWriter, Request, Response};

/// Capacity of the image path returned by [`GetMappedFile`], in UTF-16 units.
pub const MAPPED_FILE_CAPACITY: usize = 512;

fn pid_word(pid: ProcessId) -> u64
{
    u64::from(pid.0)
}

fn source_address(data: &[u8]) -> u64
{
    data.as_ptr() as u64
}

pub(crate) fn destination_address(buffer: &mut [u8]) -> u64
{
    buffer.as_mut_ptr() as u64
}

/// Read of `size` bytes at `address` into local memory at `destination`
#[derive(Debug, Clone, Copy)]
pub struct ReadProcessMemory
{
    pub pid: ProcessId,
    pub address: RemotePointer,
    pub size: usize,
    /// Local address the backend writes to
    pub destination: u64,
}

impl Request for ReadProcessMemory
{
    const OPCODE: Opcode = Opcode::ReadProcessMemory;
    type Response = ();

    fn write_payload(&self, payload: &mut PayloadWriter) -> Result<()>
    {
        payload
            .word(pid_word(self.pid))
            .pointer(self.address)
            .size(self.size)
            .word(self.destination);
        Ok(())
    }
}

/// Plain or forced write of `data` at `address`
///
/// `FORCE` selects the protection-bypassing variant.
#[derive(Debug, Clone, Copy)]
pub struct WriteProcessMemory<'a, const FORCE: bool = false>
{
    pub pid: ProcessId,
    pub address: RemotePointer,
    pub data: &'a [u8],
}

/// Write that ignores page protection
pub type ForceWriteProcessMemory<'a> = WriteProcessMemory<'a, true>;

impl<const FORCE: bool> Request for WriteProcessMemory<'_, FORCE>
{
    const OPCODE: Opcode = if FORCE {
        Opcode::ForceWriteProcessMemory
    } else {
        Opcode::WriteProcessMemory
    };
    type Response = ();

    fn write_payload(&self, payload: &mut PayloadWriter) -> Result<()>
    {
        payload
            .word(pid_word(self.pid))
            .pointer(self.address)
            .size(self.data.len())
            .word(source_address(self.data));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QueryVirtualMemory
{
    pub pid: ProcessId,
    pub address: RemotePointer,
}

impl Request for QueryVirtualMemory
{
    const OPCODE: Opcode = Opcode::QueryVirtualMemory;
    type Response = MemoryRegionDescriptor;

    fn write_payload(&self, payload: &mut PayloadWriter) -> Result<()>
    {
        payload.word(pid_word(self.pid)).pointer(self.address);
        Ok(())
    }
}

/// Size of an x64 `MEMORY_BASIC_INFORMATION`.
pub const MEMORY_BASIC_INFORMATION_SIZE: usize = 48;

/// Native x64 `MEMORY_BASIC_INFORMATION`, as the backend copies it out:
///
/// ```text
///  0  BaseAddress        8
///  8  AllocationBase     8
/// 16  AllocationProtect  4
/// 20  PartitionId        2  (+2 padding)
/// 24  RegionSize         8
/// 32  State              4
/// 36  Protect            4
/// 40  Type               4  (+4 padding)
/// ```
impl Response for MemoryRegionDescriptor
{
    const WIRE_SIZE: usize = MEMORY_BASIC_INFORMATION_SIZE;

    fn read_fields(fields: &mut FieldReader<'_>) -> Result<Self>
    {
        let base = fields.pointer()?;
        let allocation_base = fields.pointer()?;
        let allocation_protection = PageProtection(fields.u32_le()?);
        let _partition_id = fields.u16_le()?;
        fields.skip(2)?;
        let size = fields.word()?;
        let state = AllocationType(fields.u32_le()?);
        let protection = PageProtection(fields.u32_le()?);
        let kind = AllocationType(fields.u32_le()?);
        fields.skip(4)?;
        Ok(MemoryRegionDescriptor {
            base,
            allocation_base,
            allocation_protection,
            size,
            state,
            protection,
            kind,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GetMappedFile
{
    pub pid: ProcessId,
    pub address: RemotePointer,
}

/// Image path backing a mapped address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedFileName(pub EncodedString);

impl Request for GetMappedFile
{
    const OPCODE: Opcode = Opcode::GetMappedFile;
    type Response = MappedFileName;

    fn write_payload(&self, payload: &mut PayloadWriter) -> Result<()>
    {
        payload.word(pid_word(self.pid)).pointer(self.address);
        Ok(())
    }
}

impl Response for MappedFileName
{
    const WIRE_SIZE: usize = MAPPED_FILE_CAPACITY * 2;

    fn read_fields(fields: &mut FieldReader<'_>) -> Result<Self>
    {
        let raw = fields.field(Self::WIRE_SIZE)?;
        Ok(MappedFileName(EncodedString::from_field(raw)))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AllocateVirtualMemory
{
    pub pid: ProcessId,
    /// Preferred base, or null to let the backend choose
    pub address: RemotePointer,
    pub size: u64,
    pub allocation_type: AllocationType,
    pub protection: PageProtection,
}

impl Request for AllocateVirtualMemory
{
    const OPCODE: Opcode = Opcode::AllocateVirtualMemory;
    type Response = VirtualRange;

    fn write_payload(&self, payload: &mut PayloadWriter) -> Result<()>
    {
        payload
            .word(pid_word(self.pid))
            .pointer(self.address)
            .word(self.size)
            .u32(self.allocation_type.bits())
            .u32(self.protection.bits());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FreeVirtualMemory
{
    pub pid: ProcessId,
    pub address: RemotePointer,
    pub size: u64,
    pub free_type: AllocationType,
}

impl Request for FreeVirtualMemory
{
    const OPCODE: Opcode = Opcode::FreeVirtualMemory;
    type Response = VirtualRange;

    fn write_payload(&self, payload: &mut PayloadWriter) -> Result<()>
    {
        payload
            .word(pid_word(self.pid))
            .pointer(self.address)
            .word(self.size)
            .u32(self.free_type.bits());
        Ok(())
    }
}

impl Response for VirtualRange
{
    const WIRE_SIZE: usize = 2 * WORD_SIZE;

    fn read_fields(fields: &mut FieldReader<'_>) -> Result<Self>
    {
        Ok(VirtualRange {
            base: fields.pointer()?,
            size: fields.word()?,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProtectVirtualMemory
{
    pub pid: ProcessId,
    pub address: RemotePointer,
    pub size: u64,
    pub protection: PageProtection,
}

impl Request for ProtectVirtualMemory
{
    const OPCODE: Opcode = Opcode::ProtectVirtualMemory;
    type Response = ProtectedRange;

    fn write_payload(&self, payload: &mut PayloadWriter) -> Result<()>
    {
        payload
            .word(pid_word(self.pid))
            .pointer(self.address)
            .word(self.size)
            .u32(self.protection.bits());
        Ok(())
    }
}

impl Response for ProtectedRange
{
    const WIRE_SIZE: usize = 3 * WORD_SIZE;

    fn read_fields(fields: &mut FieldReader<'_>) -> Result<Self>
    {
        Ok(ProtectedRange {
            base: fields.pointer()?,
            size: fields.word()?,
            old_protection: PageProtection(fields.u32()?),
        })
    }
}

impl<T: DeviceTransport> DriverClient<T>
{
    /// Fill `buffer` from `address` in process `pid`.
    ///
    /// The backend writes straight into `buffer`; the whole buffer is then
    /// decoded with the session key. There is no reply, so a read the
    /// backend accepted is a read of the full length.
    pub fn read_process_memory(&self, pid: ProcessId, address: RemotePointer, buffer: &mut [u8]) -> Result<()>
    {
        let request = ReadProcessMemory {
            pid,
            address,
            size: buffer.len(),
            destination: destination_address(buffer),
        };
        self.call(&request)?;
        codec::decode(buffer, self.key());
        Ok(())
    }

    /// Read a little-endian `u64` from process memory.
    pub fn read_process_u64(&self, pid: ProcessId, address: RemotePointer) -> Result<u64>
    {
        let mut bytes = [0u8; 8];
        self.read_process_memory(pid, address, &mut bytes)?;
        Ok(u64::from_le_bytes(bytes))
    }

    /// Write `data` at `address`, honoring page protection.
    pub fn write_process_memory(&self, pid: ProcessId, address: RemotePointer, data: &[u8]) -> Result<()>
    {
        self.call(&WriteProcessMemory::<false> { pid, address, data })
    }

    /// Write `data` at `address` regardless of page protection.
    ///
    /// Payloads over [`FORCE_WRITE_CHUNK`] bytes go out as a sequence of
    /// chunked calls.
    ///
    /// ## Errors
    ///
    /// - `TransportFailure`: nothing was written
    /// - `PartialTransfer`: a later chunk failed; the reported prefix of the
    ///   range has already been modified
    pub fn force_write_process_memory(&self, pid: ProcessId, address: RemotePointer, data: &[u8]) -> Result<()>
    {
        write_in_chunks(
            Opcode::ForceWriteProcessMemory,
            address,
            data,
            FORCE_WRITE_CHUNK,
            |destination, chunk| {
                self.call(&ForceWriteProcessMemory {
                    pid,
                    address: destination,
                    data: chunk,
                })
            },
        )
    }

    /// Describe the region containing `address`.
    pub fn virtual_query(&self, pid: ProcessId, address: RemotePointer) -> Result<MemoryRegionDescriptor>
    {
        self.call(&QueryVirtualMemory { pid, address })
    }

    /// Path of the image or file mapped at `address`.
    pub fn mapped_file_name(&self, pid: ProcessId, address: RemotePointer) -> Result<String>
    {
        let MappedFileName(name) = self.call(&GetMappedFile { pid, address })?;
        Ok(name.to_string_lossy())
    }

    /// Reserve and/or commit memory in process `pid`.
    pub fn allocate_virtual_memory(
        &self,
        pid: ProcessId,
        address: RemotePointer,
        size: u64,
        allocation_type: AllocationType,
        protection: PageProtection,
    ) -> Result<VirtualRange>
    {
        self.call(&AllocateVirtualMemory {
            pid,
            address,
            size,
            allocation_type,
            protection,
        })
    }

    /// Decommit or release memory in process `pid`.
    pub fn free_virtual_memory(
        &self,
        pid: ProcessId,
        address: RemotePointer,
        size: u64,
        free_type: AllocationType,
    ) -> Result<VirtualRange>
    {
        self.call(&FreeVirtualMemory {
            pid,
            address,
            size,
            free_type,
        })
    }

    /// Change page protection and return the previous one.
    pub fn protect_virtual_memory(
        &self,
        pid: ProcessId,
        address: RemotePointer,
        size: u64,
        protection: PageProtection,
    ) -> Result<ProtectedRange>
    {
        self.call(&ProtectVirtualMemory {
            pid,
            address,
            size,
            protection,
        })
    }

    /// Translate a virtual address to a physical one.
    ///
    /// The backend defines no protocol for this.
    pub fn physical_address(&self, _pid: ProcessId, _address: RemotePointer) -> Result<u64>
    {
        Err(DriverError::Unsupported("physical_address"))
    }

    /// Write to physical memory.
    ///
    /// The backend defines no protocol for this.
    pub fn write_physical_memory(&self, _address: u64, _data: &[u8]) -> Result<()>
    {
        Err(DriverError::Unsupported("write_physical_memory"))
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_write_payload_carries_source_address()
    {
        let data = [1u8, 2, 3];
        let request = WriteProcessMemory::<false> {
            pid: ProcessId(9),
            address: RemotePointer::new(0x4000),
            data: &data,
        };
        let mut payload = PayloadWriter::new();
        request.write_payload(&mut payload).unwrap();
        let bytes = payload.into_bytes();
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[16..24], &3u64.to_le_bytes());
        assert_eq!(&bytes[24..32], &(data.as_ptr() as u64).to_le_bytes());
    }

    #[test]
    fn test_force_variant_opcode()
    {
        assert_eq!(<ForceWriteProcessMemory<'_> as Request>::OPCODE, Opcode::ForceWriteProcessMemory);
        assert_eq!(<WriteProcessMemory<'_> as Request>::OPCODE, Opcode::WriteProcessMemory);
    }

    #[test]
    fn test_read_payload_carries_destination()
    {
        let mut buffer = [0u8; 16];
        let request = ReadProcessMemory {
            pid: ProcessId(9),
            address: RemotePointer::new(0x4000),
            size: buffer.len(),
            destination: destination_address(&mut buffer),
        };
        let mut payload = PayloadWriter::new();
        request.write_payload(&mut payload).unwrap();
        let bytes = payload.into_bytes();
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[16..24], &16u64.to_le_bytes());
        assert_eq!(&bytes[24..32], &(buffer.as_ptr() as u64).to_le_bytes());
        assert_eq!(<<ReadProcessMemory as Request>::Response as Response>::WIRE_SIZE, 0);
    }

    #[test]
    fn test_region_descriptor_decoding()
    {
        let mut bytes = vec![0u8; MEMORY_BASIC_INFORMATION_SIZE];
        bytes[0..8].copy_from_slice(&0x7000u64.to_le_bytes());
        bytes[8..16].copy_from_slice(&0x6000u64.to_le_bytes());
        bytes[16..20].copy_from_slice(&0x04u32.to_le_bytes());
        bytes[20..22].copy_from_slice(&3u16.to_le_bytes());
        bytes[24..32].copy_from_slice(&0x2000u64.to_le_bytes());
        bytes[32..36].copy_from_slice(&0x1000u32.to_le_bytes());
        bytes[36..40].copy_from_slice(&0x20u32.to_le_bytes());
        bytes[40..44].copy_from_slice(&0x100_0000u32.to_le_bytes());
        let mut fields = FieldReader::new(Opcode::QueryVirtualMemory, &bytes);
        let region = MemoryRegionDescriptor::read_fields(&mut fields).unwrap();
        assert_eq!(fields.position(), MEMORY_BASIC_INFORMATION_SIZE);
        assert_eq!(region.base, RemotePointer::new(0x7000));
        assert_eq!(region.allocation_base, RemotePointer::new(0x6000));
        assert_eq!(region.allocation_protection, PageProtection::READWRITE);
        assert_eq!(region.size, 0x2000);
        assert_eq!(region.state, AllocationType::COMMIT);
        assert_eq!(region.protection, PageProtection::EXECUTE_READ);
        assert_eq!(region.kind, AllocationType::IMAGE);
    }

    #[test]
    fn test_region_descriptor_rejects_short_reply()
    {
        let bytes = [0u8; 40];
        let mut fields = FieldReader::new(Opcode::QueryVirtualMemory, &bytes);
        assert!(matches!(
            MemoryRegionDescriptor::read_fields(&mut fields),
            Err(DriverError::ResponseTooShort { expected: 44, actual: 40, .. })
        ));
    }
}
