//! Cell flag byte.

use std::fmt;

/// Bit set describing what an agent believes about one cell.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CellFlags(pub u8);

impl CellFlags {
    pub const FREE: u8 = 1 << 0;
    pub const OBSTACLE: u8 = 1 << 1;
    pub const SAFE: u8 = 1 << 2;
    pub const KNOWN_AT_BASE: u8 = 1 << 3;
    pub const GOT_RELAYED: u8 = 1 << 4;
    pub const FINAL_TOPOLOGICAL: u8 = 1 << 5;

    /// Bits that are per-agent bookkeeping rather than shared truth.
    pub const LOCAL_MASK: u8 = Self::GOT_RELAYED | Self::FINAL_TOPOLOGICAL;

    #[inline]
    pub fn contains(self, bits: u8) -> bool {
        self.0 & bits == bits
    }

    #[inline]
    pub fn is_free(self) -> bool {
        self.contains(Self::FREE)
    }

    #[inline]
    pub fn is_obstacle(self) -> bool {
        self.contains(Self::OBSTACLE)
    }

    #[inline]
    pub fn is_safe(self) -> bool {
        self.contains(Self::SAFE)
    }

    #[inline]
    pub fn is_known_at_base(self) -> bool {
        self.contains(Self::KNOWN_AT_BASE)
    }

    #[inline]
    pub fn is_relayed(self) -> bool {
        self.contains(Self::GOT_RELAYED)
    }

    /// Neither free nor obstacle.
    #[inline]
    pub fn is_unknown(self) -> bool {
        self.0 & (Self::FREE | Self::OBSTACLE) == 0
    }

    /// Shared-truth projection, as compared during merge.
    #[inline]
    pub fn shared(self) -> u8 {
        self.0 & !Self::LOCAL_MASK
    }
}

impl fmt::Debug for CellFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(u8, &str); 6] = [
            (CellFlags::FREE, "Free"),
            (CellFlags::OBSTACLE, "Obstacle"),
            (CellFlags::SAFE, "Safe"),
            (CellFlags::KNOWN_AT_BASE, "KnownAtBase"),
            (CellFlags::GOT_RELAYED, "GotRelayed"),
            (CellFlags::FINAL_TOPOLOGICAL, "Final"),
        ];
        let mut set = f.debug_set();
        for (bit, name) in NAMES {
            if self.0 & bit != 0 {
                set.entry(&format_args!("{name}"));
            }
        }
        set.finish()
    }
}
