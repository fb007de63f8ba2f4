/// Read/write/execute bits of a memory page.
///
/// The raw value is kept exactly as returned by the platform; the accessors
/// decode bit 0 as read, bit 1 as write and bit 2 as execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryPermission {
    bits: u8,
}

impl MemoryPermission {
    const READ: u8 = 1 << 0;
    const WRITE: u8 = 1 << 1;
    const EXECUTE: u8 = 1 << 2;

    /// Wrap a raw permission bitmask.
    #[must_use]
    pub fn from_bits(bits: u8) -> Self {
        Self { bits }
    }

    /// Build a bitmask from individual flags.
    #[must_use]
    pub fn from_flags(read: bool, write: bool, execute: bool) -> Self {
        let mut bits = 0;
        if read {
            bits |= Self::READ;
        }
        if write {
            bits |= Self::WRITE;
        }
        if execute {
            bits |= Self::EXECUTE;
        }
        Self { bits }
    }

    /// Raw bitmask as returned by the platform.
    #[must_use]
    pub fn raw(self) -> u8 {
        self.bits
    }

    /// Whether the page is readable.
    #[must_use]
    pub fn read(self) -> bool {
        self.bits & Self::READ != 0
    }

    /// Whether the page is writable.
    #[must_use]
    pub fn write(self) -> bool {
        self.bits & Self::WRITE != 0
    }

    /// Whether the page is executable.
    #[must_use]
    pub fn execute(self) -> bool {
        self.bits & Self::EXECUTE != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode() {
        let perm = MemoryPermission::from_bits(0b101);
        assert_eq!(perm.raw(), 5);
        assert!(perm.read());
        assert!(!perm.write());
        assert!(perm.execute());
    }

    #[test]
    fn test_from_flags() {
        assert_eq!(
            MemoryPermission::from_flags(true, true, false),
            MemoryPermission::from_bits(0b011)
        );
        assert_eq!(MemoryPermission::from_flags(false, false, false).raw(), 0);
    }

    #[test]
    fn test_high_bits_kept_raw() {
        // Bits above the three permission flags are reported raw but do not
        // affect the decoded flags.
        let perm = MemoryPermission::from_bits(0b1001);
        assert_eq!(perm.raw(), 9);
        assert!(perm.read());
        assert!(!perm.write());
        assert!(!perm.execute());
    }
}
