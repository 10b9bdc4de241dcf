//! # Windows Device Transport
//!
//! [`DeviceHandle`] owns a handle to the backend's device object and issues
//! buffered device-control calls on it.
//!
//! ## Example
//!
//! ```rust,no_run
//! use kbridge_core::platform::windows::DeviceHandle;
//! use kbridge_core::{DriverClient, ObfuscationKey};
//!
//! let device = DeviceHandle::open(r"\\.\kbridge")?;
//! let client = DriverClient::new(device, ObfuscationKey::new(0x1122_3344_5566_7788));
//! let cursor = client.cursor_position()?;
//! println!("cursor at {},{}", cursor.x, cursor.y);
//! # Ok::<(), kbridge_core::DriverError>(())
//! ```

use std::ffi::c_void;
use std::io;
use std::ptr;

use tracing::{debug, info};
use windows_sys::Win32::Foundation::{
    CloseHandle, ERROR_INSUFFICIENT_BUFFER, ERROR_MORE_DATA, GENERIC_READ, GENERIC_WRITE, HANDLE,
    INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, FILE_ATTRIBUTE_NORMAL, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
};
use windows_sys::Win32::System::IO::DeviceIoControl;

use crate::error::Result;
use crate::opcode::Opcode;
use crate::transport::{DeviceTransport, TransportError};

/// Open handle to the backend device
///
/// Closed on drop.
#[derive(Debug)]
pub struct DeviceHandle
{
    handle: HANDLE,
    path: String,
}

// SAFETY: the handle is a kernel object reference, not thread-affine memory.
// DeviceIoControl on one synchronous handle from several threads is allowed,
// and the handle is only closed in Drop, when no borrow can be alive.
unsafe impl Send for DeviceHandle {}
unsafe impl Sync for DeviceHandle {}

impl DeviceHandle
{
    /// Open the device at `path` (for example `\\.\kbridge`) for read/write.
    ///
    /// ## Errors
    ///
    /// `DriverError::Io` carrying the OS error, typically "file not found"
    /// when the backend is not loaded or "access denied" without elevation.
    pub fn open(path: &str) -> Result<Self>
    {
        let wide: Vec<u16> = path.encode_utf16().chain(std::iter::once(0)).collect();

        // SAFETY: `wide` is NUL-terminated and outlives the call; null security
        // attributes and template handle are documented as valid.
        let handle = unsafe {
            CreateFileW(
                wide.as_ptr(),
                GENERIC_READ | GENERIC_WRITE,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                ptr::null(),
                OPEN_EXISTING,
                FILE_ATTRIBUTE_NORMAL,
                ptr::null_mut(),
            )
        };
        if handle == INVALID_HANDLE_VALUE {
            let err = io::Error::last_os_error();
            debug!(path, error = %err, "failed to open device");
            return Err(err.into());
        }

        info!(path, "opened device");
        Ok(Self {
            handle,
            path: path.to_string(),
        })
    }

    /// Path the handle was opened with
    pub fn path(&self) -> &str
    {
        &self.path
    }
}

fn buffer_len(len: usize) -> std::result::Result<u32, TransportError>
{
    u32::try_from(len).map_err(|_| TransportError::Rejected(io::Error::from(io::ErrorKind::InvalidInput)))
}

impl DeviceTransport for DeviceHandle
{
    fn send(&self, opcode: Opcode, request: &[u8], response: Option<&mut [u8]>) -> std::result::Result<usize, TransportError>
    {
        let (in_ptr, in_len) = if request.is_empty() {
            (ptr::null(), 0)
        } else {
            (request.as_ptr().cast::<c_void>(), buffer_len(request.len())?)
        };
        let (out_ptr, out_len) = match response {
            Some(buf) if !buf.is_empty() => (buf.as_mut_ptr().cast::<c_void>(), buffer_len(buf.len())?),
            _ => (ptr::null_mut(), 0),
        };
        let mut returned = 0u32;

        // SAFETY: both buffers are valid for their stated lengths for the
        // duration of this synchronous call; no OVERLAPPED is used.
        let ok = unsafe {
            DeviceIoControl(
                self.handle,
                opcode.code(),
                in_ptr,
                in_len,
                out_ptr,
                out_len,
                &mut returned,
                ptr::null_mut(),
            )
        };
        if ok == 0 {
            let err = io::Error::last_os_error();
            let code = err.raw_os_error().map(|c| c as u32);
            if code == Some(ERROR_INSUFFICIENT_BUFFER) || code == Some(ERROR_MORE_DATA) {
                return Err(TransportError::BufferTooSmall);
            }
            return Err(TransportError::Rejected(err));
        }

        Ok((returned as usize).min(out_len as usize))
    }
}

impl Drop for DeviceHandle
{
    fn drop(&mut self)
    {
        // SAFETY: the handle came from CreateFileW and is closed exactly once.
        unsafe {
            CloseHandle(self.handle);
        }
        debug!(path = %self.path, "closed device");
    }
}
