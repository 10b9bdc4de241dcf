//! Foreign address type.

use std::fmt;
use std::ops::{Add, Sub};

/// Address in a foreign address space (target process or kernel)
///
/// This wrapper around `u64` is never dereferenced locally. It only travels
/// to the backend inside requests and comes back inside replies, so the only
/// thing you can do with it here is offset arithmetic.
///
/// ## Example
///
/// ```rust
/// use kbridge_core::types::RemotePointer;
///
/// let base = RemotePointer::from(0x1000);
/// let field = base + 0x100;
/// assert_eq!(field.value(), 0x1100);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RemotePointer(u64);

impl RemotePointer
{
    /// The null address (0x0)
    pub const NULL: Self = RemotePointer(0);

    /// Create a pointer from a raw address.
    ///
    /// ```rust
    /// use kbridge_core::types::RemotePointer;
    ///
    /// const KUSER_SHARED_DATA: RemotePointer = RemotePointer::new(0x7ffe_0000);
    /// ```
    pub const fn new(value: u64) -> Self
    {
        RemotePointer(value)
    }

    /// Raw `u64` value of this address
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// Whether this is the null address.
    pub const fn is_null(self) -> bool
    {
        self.0 == 0
    }

    /// Add an offset, returning `None` on overflow.
    ///
    /// ```rust
    /// use kbridge_core::types::RemotePointer;
    ///
    /// let ptr = RemotePointer::from(0x1000);
    /// assert_eq!(ptr.checked_add(0x100), Some(RemotePointer::from(0x1100)));
    /// assert_eq!(ptr.checked_add(u64::MAX), None);
    /// ```
    pub fn checked_add(self, offset: u64) -> Option<Self>
    {
        self.0.checked_add(offset).map(RemotePointer)
    }

    /// Subtract an offset, returning `None` on underflow.
    pub fn checked_sub(self, offset: u64) -> Option<Self>
    {
        self.0.checked_sub(offset).map(RemotePointer)
    }

    /// Add an offset, saturating at the top of the address space.
    pub fn saturating_add(self, offset: u64) -> Self
    {
        RemotePointer(self.0.saturating_add(offset))
    }
}

impl From<u64> for RemotePointer
{
    fn from(value: u64) -> Self
    {
        RemotePointer(value)
    }
}

impl From<RemotePointer> for u64
{
    fn from(pointer: RemotePointer) -> Self
    {
        pointer.0
    }
}

impl fmt::Display for RemotePointer
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:016x}", self.0)
    }
}

impl fmt::LowerHex for RemotePointer
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl Add<u64> for RemotePointer
{
    type Output = RemotePointer;

    fn add(self, rhs: u64) -> Self::Output
    {
        RemotePointer(self.0.wrapping_add(rhs))
    }
}

impl Sub<u64> for RemotePointer
{
    type Output = RemotePointer;

    fn sub(self, rhs: u64) -> Self::Output
    {
        RemotePointer(self.0.wrapping_sub(rhs))
    }
}
