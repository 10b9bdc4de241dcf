//! Tests for forced writes split into chunks

mod common;

use common::{client, ScriptedBackend};
use kbridge_core::opcode::Opcode;
use kbridge_core::ops::FORCE_WRITE_CHUNK;
use kbridge_core::types::{ProcessId, RemotePointer};
use kbridge_core::DriverError;

const PID: ProcessId = ProcessId(1337);
const BASE: u64 = 0x0000_7FF7_0000_0000;

#[test]
fn test_ten_thousand_bytes_in_three_chunks()
{
    let data = vec![0xCCu8; 10_000];
    let client = client(ScriptedBackend::accepting());

    client
        .force_write_process_memory(PID, RemotePointer::new(BASE), &data)
        .unwrap();

    let calls = client.transport().calls();
    assert_eq!(calls.len(), 3);
    let sizes: Vec<u64> = calls.iter().map(|c| c.word(2)).collect();
    assert_eq!(sizes, vec![4096, 4096, 1808]);

    let source = data.as_ptr() as u64;
    for (i, call) in calls.iter().enumerate() {
        let offset = (i * FORCE_WRITE_CHUNK) as u64;
        assert_eq!(call.opcode, Opcode::ForceWriteProcessMemory);
        assert_eq!(call.word(0), u64::from(PID.0));
        assert_eq!(call.word(1), BASE + offset);
        assert_eq!(call.word(3), source + offset);
    }
}

#[test]
fn test_second_chunk_failure_reports_first_chunk()
{
    let data = vec![0u8; 10_000];
    let client = client(ScriptedBackend::accepting().fail_on_call(2));

    let err = client
        .force_write_process_memory(PID, RemotePointer::new(BASE), &data)
        .unwrap_err();

    assert_eq!(err.bytes_written(), Some(4096));
    match err {
        DriverError::PartialTransfer {
            opcode,
            written,
            requested,
        } => {
            assert_eq!(opcode, Opcode::ForceWriteProcessMemory);
            assert_eq!(written, 4096);
            assert_eq!(requested, 10_000);
        }
        other => panic!("Expected PartialTransfer, got {other:?}"),
    }
    // No further chunks after the failure
    assert_eq!(client.transport().call_count(), 2);
}

#[test]
fn test_first_chunk_failure_writes_nothing()
{
    let data = vec![0u8; 10_000];
    let client = client(ScriptedBackend::accepting().fail_on_call(1));
    let err = client
        .force_write_process_memory(PID, RemotePointer::new(BASE), &data)
        .unwrap_err();
    assert!(err.is_transport_failure());
    assert_eq!(client.transport().call_count(), 1);
}

#[test]
fn test_small_write_is_single_call()
{
    let data = [0x90u8; 16];
    let client = client(ScriptedBackend::accepting());
    client
        .force_write_process_memory(PID, RemotePointer::new(BASE), &data)
        .unwrap();

    let calls = client.transport().calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].word(2), 16);
}

#[test]
fn test_plain_write_is_never_chunked()
{
    let data = vec![0u8; 10_000];
    let client = client(ScriptedBackend::accepting());
    client
        .write_process_memory(PID, RemotePointer::new(BASE), &data)
        .unwrap();

    let calls = client.transport().calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].opcode, Opcode::WriteProcessMemory);
    assert_eq!(calls[0].word(2), 10_000);
}
