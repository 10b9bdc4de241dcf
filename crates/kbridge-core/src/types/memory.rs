//! Virtual-memory values: region snapshots, protections and allocation types.

use std::fmt;

use super::RemotePointer;

/// Page protection flags (`PAGE_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PageProtection(pub u32);

impl PageProtection
{
    pub const NOACCESS: Self = PageProtection(0x01);
    pub const READONLY: Self = PageProtection(0x02);
    pub const READWRITE: Self = PageProtection(0x04);
    pub const WRITECOPY: Self = PageProtection(0x08);
    pub const EXECUTE: Self = PageProtection(0x10);
    pub const EXECUTE_READ: Self = PageProtection(0x20);
    pub const EXECUTE_READWRITE: Self = PageProtection(0x40);
    pub const EXECUTE_WRITECOPY: Self = PageProtection(0x80);
    pub const GUARD: Self = PageProtection(0x100);

    const READABLE: u32 = 0x02 | 0x04 | 0x08 | 0x20 | 0x40 | 0x80;
    const WRITABLE: u32 = 0x04 | 0x08 | 0x40 | 0x80;
    const EXECUTABLE: u32 = 0x10 | 0x20 | 0x40 | 0x80;

    /// Raw flag value
    pub const fn bits(self) -> u32
    {
        self.0
    }

    pub const fn is_readable(self) -> bool
    {
        self.0 & Self::READABLE != 0
    }

    pub const fn is_writable(self) -> bool
    {
        self.0 & Self::WRITABLE != 0
    }

    pub const fn is_executable(self) -> bool
    {
        self.0 & Self::EXECUTABLE != 0
    }

    /// Short `rwx` rendering, dashes for missing rights.
    pub fn permissions(self) -> String
    {
        let mut perms = String::with_capacity(3);
        perms.push(if self.is_readable() { 'r' } else { '-' });
        perms.push(if self.is_writable() { 'w' } else { '-' });
        perms.push(if self.is_executable() { 'x' } else { '-' });
        perms
    }
}

impl fmt::Display for PageProtection
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{} (0x{:x})", self.permissions(), self.0)
    }
}

/// Allocation and free types (`MEM_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AllocationType(pub u32);

impl AllocationType
{
    pub const COMMIT: Self = AllocationType(0x1000);
    pub const RESERVE: Self = AllocationType(0x2000);
    pub const DECOMMIT: Self = AllocationType(0x4000);
    pub const RELEASE: Self = AllocationType(0x8000);
    pub const FREE: Self = AllocationType(0x1_0000);
    pub const PRIVATE: Self = AllocationType(0x2_0000);
    pub const MAPPED: Self = AllocationType(0x4_0000);
    pub const IMAGE: Self = AllocationType(0x100_0000);

    /// Raw flag value
    pub const fn bits(self) -> u32
    {
        self.0
    }

    /// Whether every flag of `other` is set.
    pub const fn contains(self, other: AllocationType) -> bool
    {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for AllocationType
{
    type Output = AllocationType;

    fn bitor(self, rhs: Self) -> Self::Output
    {
        AllocationType(self.0 | rhs.0)
    }
}

/// Snapshot of one virtual-memory region in a foreign process
///
/// Mirrors `MEMORY_BASIC_INFORMATION`. The values are only valid at the
/// instant the backend answered; nothing refreshes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegionDescriptor
{
    /// Base of the page range containing the queried address
    pub base: RemotePointer,
    /// Base of the original allocation
    pub allocation_base: RemotePointer,
    /// Protection the allocation was created with
    pub allocation_protection: PageProtection,
    /// Size of the range sharing the same attributes
    pub size: u64,
    /// `MEM_COMMIT`, `MEM_RESERVE` or `MEM_FREE`
    pub state: AllocationType,
    /// Current protection
    pub protection: PageProtection,
    /// `MEM_PRIVATE`, `MEM_MAPPED` or `MEM_IMAGE`
    pub kind: AllocationType,
}

impl MemoryRegionDescriptor
{
    /// One past the last byte of the region.
    pub fn end(&self) -> RemotePointer
    {
        self.base.saturating_add(self.size)
    }

    /// Whether `address` falls inside this region.
    pub fn contains(&self, address: RemotePointer) -> bool
    {
        address >= self.base && address < self.end()
    }

    pub fn is_committed(&self) -> bool
    {
        self.state.contains(AllocationType::COMMIT)
    }
}

/// Range the backend actually allocated or freed (sizes are page-rounded)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualRange
{
    pub base: RemotePointer,
    pub size: u64,
}

/// Range whose protection changed, with the protection it had before
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectedRange
{
    pub base: RemotePointer,
    pub size: u64,
    pub old_protection: PageProtection,
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_protection_permissions()
    {
        assert_eq!(PageProtection::READWRITE.permissions(), "rw-");
        assert_eq!(PageProtection::EXECUTE_READ.permissions(), "r-x");
        assert_eq!(PageProtection::NOACCESS.permissions(), "---");
    }

    #[test]
    fn test_region_contains()
    {
        let region = MemoryRegionDescriptor {
            base: RemotePointer::new(0x1000),
            allocation_base: RemotePointer::new(0x1000),
            allocation_protection: PageProtection::READWRITE,
            size: 0x2000,
            state: AllocationType::COMMIT,
            protection: PageProtection::READWRITE,
            kind: AllocationType::PRIVATE,
        };
        assert!(region.contains(RemotePointer::new(0x1000)));
        assert!(region.contains(RemotePointer::new(0x2fff)));
        assert!(!region.contains(RemotePointer::new(0x3000)));
        assert!(region.is_committed());
    }

    #[test]
    fn test_allocation_type_bitor()
    {
        let both = AllocationType::COMMIT | AllocationType::RESERVE;
        assert_eq!(both.bits(), 0x3000);
        assert!(both.contains(AllocationType::RESERVE));
    }
}
