//! # Chunked Writes
//!
//! Splits a write that exceeds one transport message into bounded pieces.
//!
//! Each round advances the destination address and the source offset by the
//! chunk limit. The sequence stops at the first failing chunk. Chunks already
//! sent stay committed: the target range is left partially modified and the
//! number of bytes confirmed written is reported in
//! [`DriverError::PartialTransfer`].

use tracing::warn;

use crate::error::{DriverError, Result};
use crate::opcode::Opcode;
use crate::types::RemotePointer;

/// Largest payload sent in one forced write.
pub const FORCE_WRITE_CHUNK: usize = 0x1000;

/// Write `data` to `base` through `write_chunk`, at most `limit` bytes per call.
///
/// A payload that fits in one chunk is a single call whose error is returned
/// unchanged. For longer payloads, a failure of the very first chunk is also
/// returned unchanged, since nothing was written; a later failure becomes
/// `PartialTransfer` carrying the committed prefix length.
pub(crate) fn write_in_chunks<F>(
    opcode: Opcode,
    base: RemotePointer,
    data: &[u8],
    limit: usize,
    mut write_chunk: F,
) -> Result<()>
where
    F: FnMut(RemotePointer, &[u8]) -> Result<()>,
{
    let limit = limit.max(1);
    if data.len() <= limit {
        return write_chunk(base, data);
    }

    let mut written = 0usize;
    for chunk in data.chunks(limit) {
        let destination = base + written as u64;
        if let Err(err) = write_chunk(destination, chunk) {
            if written == 0 {
                return Err(err);
            }
            warn!(
                %opcode,
                %base,
                written,
                requested = data.len(),
                "chunked write stopped early: {err}"
            );
            return Err(DriverError::PartialTransfer {
                opcode,
                written,
                requested: data.len(),
            });
        }
        written += chunk.len();
    }

    Ok(())
}
