//! End-to-end tests of the typed operation catalog against a scripted backend

mod common;

use std::time::Duration;

use common::{client, wide_field, write_through, Reply, ScriptedBackend};
use kbridge_core::opcode::Opcode;
use kbridge_core::ops::{MAPPED_FILE_CAPACITY, MEMORY_BASIC_INFORMATION_SIZE, PROCESS_NAME_CAPACITY};
use kbridge_core::types::{
    AllocationType, EncodedString, NtStatus, PageProtection, ProcessId, RemotePointer, SecurityDescriptor, ThreadId,
    ThreadStart,
};
use kbridge_core::DriverError;

const PID: ProcessId = ProcessId(4242);

#[test]
fn test_allocate_nonpaged_returns_pointer()
{
    let client = client(ScriptedBackend::new(|call| {
        assert_eq!(call.opcode, Opcode::AllocateNonpagedMemory);
        assert_eq!(call.word(0), 4096);
        Reply::words(&[0xFFFF_A000_1234_0000])
    }));

    let pointer = client.allocate_nonpaged_memory(4096).unwrap();
    assert!(!pointer.is_null());
    assert_eq!(pointer, RemotePointer::new(0xFFFF_A000_1234_0000));
}

#[test]
fn test_free_nonpaged_is_unsupported_without_transport_call()
{
    let client = client(ScriptedBackend::accepting());
    let err = client
        .free_nonpaged_memory(RemotePointer::new(0xFFFF_A000_1234_0000))
        .unwrap_err();
    assert!(matches!(err, DriverError::Unsupported("free_nonpaged_memory")));
    assert_eq!(client.transport().call_count(), 0);
}

#[test]
fn test_physical_memory_is_unsupported()
{
    let client = client(ScriptedBackend::accepting());
    assert!(matches!(
        client.physical_address(PID, RemotePointer::new(0x1000)),
        Err(DriverError::Unsupported(_))
    ));
    assert!(matches!(
        client.write_physical_memory(0x1000, &[0u8; 4]),
        Err(DriverError::Unsupported(_))
    ));
    assert_eq!(client.transport().call_count(), 0);
}

#[test]
fn test_oversized_name_is_rejected_locally()
{
    let client = client(ScriptedBackend::accepting());
    let name = EncodedString::from("a".repeat(200).as_str());

    let err = client
        .delete_unloaded_drivers(RemotePointer::new(0x10), RemotePointer::new(0x20), &name)
        .unwrap_err();

    assert!(matches!(err, DriverError::InputTooLarge { len: 200, capacity: 64, .. }));
    assert_eq!(client.transport().call_count(), 0);
}

#[test]
fn test_oversized_security_descriptor_is_rejected_locally()
{
    let client = client(ScriptedBackend::accepting());
    let descriptor = SecurityDescriptor::new(vec![0u8; 64]);

    let err = client
        .create_user_thread(PID, Some(&descriptor), ThreadStart::new(RemotePointer::new(0x1000), 0))
        .unwrap_err();

    assert!(matches!(err, DriverError::InputTooLarge { len: 64, capacity: 40, .. }));
    assert_eq!(client.transport().call_count(), 0);
}

#[test]
fn test_delete_unloaded_drivers_counts()
{
    let client = client(ScriptedBackend::new(|call| {
        let name: Vec<u8> = call.payload[16..24].to_vec();
        assert_eq!(name, vec![b'e', 0, b'v', 0, b'i', 0, b'l', 0]);
        Reply::words(&[3])
    }));
    let deleted = client
        .delete_unloaded_drivers(RemotePointer::new(0x10), RemotePointer::new(0x20), &EncodedString::from("evil.sys"))
        .unwrap();
    assert_eq!(deleted, 3);
}

#[test]
fn test_read_process_memory_fills_buffer()
{
    let client = client(ScriptedBackend::new(|call| {
        assert_eq!(call.opcode, Opcode::ReadProcessMemory);
        assert_eq!(call.payload.len(), 32);
        assert_eq!(call.capacity, 0);
        assert_eq!(call.word(0), 4242);
        assert_eq!(call.word(1), 0x4000);
        let size = call.word(2) as usize;
        let data: Vec<u8> = (0..size).map(|i| i as u8).collect();
        write_through(call, call.word(3), size, &data);
        Reply::Empty
    }));

    let mut buffer = [0u8; 24];
    let destination = buffer.as_ptr() as u64;
    client
        .read_process_memory(PID, RemotePointer::new(0x4000), &mut buffer)
        .unwrap();
    let expected: Vec<u8> = (0..24).collect();
    assert_eq!(buffer.to_vec(), expected);
    assert_eq!(client.transport().calls()[0].word(3), destination);
}

#[test]
fn test_read_process_memory_decodes_trailing_bytes_as_sent()
{
    let client = client(ScriptedBackend::new(|call| {
        write_through(call, call.word(3), 11, &[0x11; 11]);
        Reply::Empty
    }));

    let mut buffer = [0u8; 11];
    client
        .read_process_memory(PID, RemotePointer::new(0x4000), &mut buffer)
        .unwrap();
    assert_eq!(buffer, [0x11; 11]);
}

#[test]
fn test_failed_process_read_is_transport_failure()
{
    let client = client(ScriptedBackend::new(|_| Reply::Fail));
    let mut buffer = [0u8; 16];
    let err = client
        .read_process_memory(PID, RemotePointer::new(0x4000), &mut buffer)
        .unwrap_err();
    assert!(matches!(err, DriverError::TransportFailure { opcode: Opcode::ReadProcessMemory }));
}

#[test]
fn test_read_process_u64()
{
    let client = client(ScriptedBackend::new(|call| {
        write_through(call, call.word(3), 8, &0xDEAD_BEEFu64.to_le_bytes());
        Reply::Empty
    }));
    let value = client.read_process_u64(PID, RemotePointer::new(0x4000)).unwrap();
    assert_eq!(value, 0xDEAD_BEEF);
}

#[test]
fn test_system_memory_round_trip()
{
    let client = client(ScriptedBackend::new(|call| match call.opcode {
        Opcode::ReadSystemMemory => {
            assert_eq!(call.payload.len(), 24);
            assert_eq!(call.capacity, 8);
            assert_eq!(call.word(1), 32);
            write_through(call, call.word(2), call.word(1) as usize, &[0xAB; 12]);
            Reply::words(&[12])
        }
        Opcode::WriteSystemMemory => Reply::words(&[call.word(1)]),
        _ => Reply::Fail,
    }));

    let mut buffer = [0u8; 32];
    let read = client
        .read_system_memory(RemotePointer::new(0xFFFF_F800_0000_0000), &mut buffer)
        .unwrap();
    assert_eq!(read, 12);
    assert_eq!(&buffer[..12], &[0xAB; 12]);
    assert_eq!(&buffer[12..], &[0u8; 20]);

    let written = client
        .write_system_memory(RemotePointer::new(0xFFFF_F800_0000_0000), &[1, 2, 3, 4, 5])
        .unwrap();
    assert_eq!(written, 5);
}

#[test]
fn test_virtual_query_descriptor()
{
    let client = client(ScriptedBackend::new(|call| {
        assert_eq!(call.capacity, MEMORY_BASIC_INFORMATION_SIZE);
        let mut mbi = vec![0u8; MEMORY_BASIC_INFORMATION_SIZE];
        mbi[0..8].copy_from_slice(&0x7FF6_0000_1000u64.to_le_bytes());
        mbi[8..16].copy_from_slice(&0x7FF6_0000_0000u64.to_le_bytes());
        mbi[16..20].copy_from_slice(&0x80u32.to_le_bytes());
        mbi[24..32].copy_from_slice(&0x3000u64.to_le_bytes());
        mbi[32..36].copy_from_slice(&0x1000u32.to_le_bytes());
        mbi[36..40].copy_from_slice(&0x20u32.to_le_bytes());
        mbi[40..44].copy_from_slice(&0x100_0000u32.to_le_bytes());
        Reply::Fields(mbi)
    }));
    let region = client.virtual_query(PID, RemotePointer::new(0x7FF6_0000_1800)).unwrap();
    assert_eq!(region.base, RemotePointer::new(0x7FF6_0000_1000));
    assert_eq!(region.allocation_protection, PageProtection::EXECUTE_WRITECOPY);
    assert_eq!(region.size, 0x3000);
    assert!(region.is_committed());
    assert!(region.contains(RemotePointer::new(0x7FF6_0000_1800)));
    assert!(region.protection.is_executable());
    assert_eq!(region.kind, AllocationType::IMAGE);
}

#[test]
fn test_mapped_file_and_process_name()
{
    let client = client(ScriptedBackend::new(|call| match call.opcode {
        Opcode::GetMappedFile => Reply::Fields(wide_field(
            r"\Device\HarddiskVolume3\Windows\System32\ntdll.dll",
            MAPPED_FILE_CAPACITY,
        )),
        Opcode::GetProcessName => Reply::Fields(wide_field("notepad.exe", PROCESS_NAME_CAPACITY)),
        _ => Reply::Fail,
    }));

    let path = client.mapped_file_name(PID, RemotePointer::new(0x7FFA_0000_0000)).unwrap();
    assert!(path.ends_with("ntdll.dll"));
    assert_eq!(client.process_name(PID).unwrap(), "notepad.exe");
}

#[test]
fn test_process_times_and_status()
{
    let client = client(ScriptedBackend::new(|call| match call.opcode {
        Opcode::GetProcessTimes => Reply::words(&[133_000_000_000_000_000, 0, 1_500_000, 2_500_000]),
        Opcode::GetProcessExitStatus => Reply::words(&[NtStatus::PENDING.0 as u64]),
        Opcode::WaitForProcess => {
            assert_eq!(call.word(1), 250_000_000);
            Reply::words(&[NtStatus::TIMEOUT.0 as u64])
        }
        _ => Reply::Fail,
    }));

    let times = client.process_times(PID).unwrap();
    assert!(!times.has_exited());
    assert_eq!(times.user_time, 2_500_000);
    assert_eq!(client.process_exit_status(PID).unwrap(), NtStatus::PENDING);
    assert_eq!(
        client.wait_for_process(PID, Duration::from_millis(250)).unwrap(),
        NtStatus::TIMEOUT
    );
}

#[test]
fn test_wait_for_thread_status()
{
    let client = client(ScriptedBackend::new(|call| {
        assert_eq!(call.word(0), 99);
        Reply::words(&[0])
    }));
    let status = client.wait_for_thread(ThreadId(99), Duration::from_secs(2)).unwrap();
    assert!(status.is_success());
}

#[test]
fn test_virtual_memory_lifecycle()
{
    let client = client(ScriptedBackend::new(|call| match call.opcode {
        Opcode::AllocateVirtualMemory => {
            assert_eq!(call.word(3), u64::from((AllocationType::COMMIT | AllocationType::RESERVE).bits()));
            assert_eq!(call.word(4), u64::from(PageProtection::READWRITE.bits()));
            Reply::words(&[0x2000_0000, 0x1000])
        }
        Opcode::ProtectVirtualMemory => Reply::words(&[0x2000_0000, 0x1000, u64::from(PageProtection::READWRITE.bits())]),
        Opcode::FreeVirtualMemory => Reply::words(&[0x2000_0000, 0x1000]),
        _ => Reply::Fail,
    }));

    let range = client
        .allocate_virtual_memory(
            PID,
            RemotePointer::NULL,
            0x1000,
            AllocationType::COMMIT | AllocationType::RESERVE,
            PageProtection::READWRITE,
        )
        .unwrap();
    assert_eq!(range.base, RemotePointer::new(0x2000_0000));

    let protected = client
        .protect_virtual_memory(PID, range.base, range.size, PageProtection::EXECUTE_READ)
        .unwrap();
    assert_eq!(protected.old_protection, PageProtection::READWRITE);

    let freed = client
        .free_virtual_memory(PID, range.base, 0, AllocationType::RELEASE)
        .unwrap();
    assert_eq!(freed.size, 0x1000);
}

#[test]
fn test_create_user_thread_returns_client_id()
{
    let client = client(ScriptedBackend::new(|call| {
        assert_eq!(call.opcode, Opcode::CreateUserThread);
        // has_sd follows the 40-byte descriptor field
        assert_eq!(call.word(6), 0);
        assert_eq!(call.word(7), 1);
        Reply::words(&[u64::from(PID.0), 0x1A2C])
    }));

    let created = client
        .create_user_thread(PID, None, ThreadStart::new(RemotePointer::new(0x7FF6_0000_2000), 0).suspended())
        .unwrap();
    assert_eq!(created.process, PID);
    assert_eq!(created.thread, ThreadId(0x1A2C));
}

#[test]
fn test_lock_entry_and_protection()
{
    let client = client(ScriptedBackend::new(|call| match call.opcode {
        Opcode::AcquireLock => Reply::words(&[1]),
        Opcode::RunDriverEntry => Reply::words(&[call.word(1) + call.word(2)]),
        Opcode::ProtectProcess => Reply::Empty,
        _ => Reply::Fail,
    }));

    assert!(client.acquire_lock(PID, RemotePointer::new(0x5000)).unwrap());
    assert_eq!(client.run_driver_entry(RemotePointer::new(0xFFFF_F801_0000_0000), 40, 2).unwrap(), 42);
    client.protect_process(PID).unwrap();
}

#[test]
fn test_run_driver_entry_failure()
{
    let client = client(ScriptedBackend::new(|_| Reply::Fail));
    let err = client
        .run_driver_entry(RemotePointer::new(0xFFFF_F801_0000_0000), 0, 0)
        .unwrap_err();
    assert!(matches!(
        err,
        DriverError::TransportFailure {
            opcode: Opcode::RunDriverEntry
        }
    ));
}
