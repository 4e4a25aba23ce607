//! NTAG215 page map
//!
//! Page addresses and the fixed byte patterns that put a freshly written
//! figurine tag into the same lock/config state it left the factory with.

use serde::{Deserialize, Serialize};

/// Index into the tag's page space
pub type PageAddress = u8;

/// Bytes per page
pub const PAGE_SIZE: usize = 4;

/// One page, the atomic unit of a read or write
pub type Page = [u8; PAGE_SIZE];

/// Static lock bits (bytes 2..4 of page 2)
pub const STATIC_LOCK_PAGE: PageAddress = 2;
/// Capability container
pub const CAPABILITY_CONTAINER_PAGE: PageAddress = 3;
/// First page of user memory
pub const USER_MEMORY_FIRST: PageAddress = 4;
/// Figure id, first half
pub const CHARACTER_MODEL_HEAD: PageAddress = 21;
/// Figure id, second half
pub const CHARACTER_MODEL_TAIL: PageAddress = 22;
/// Last page of user memory
pub const USER_MEMORY_LAST: PageAddress = 129;
/// Last user page the write pipeline copies from the packed image
pub const USER_WRITE_LAST: PageAddress = 128;
/// Dynamic lock bits
pub const DYNAMIC_LOCK_PAGE: PageAddress = 130;
/// CFG0 (mirror, AUTH0)
pub const CONFIG0_PAGE: PageAddress = 131;
/// CFG1 (ACCESS)
pub const CONFIG1_PAGE: PageAddress = 132;
/// PWD
pub const PASSWORD_PAGE: PageAddress = 133;
/// PACK and RFUI
pub const PACK_PAGE: PageAddress = 134;
/// Number of addressable pages
pub const TOTAL_PAGES: PageAddress = 135;

/// Size of a full tag image in bytes
pub const DUMP_SIZE: usize = TOTAL_PAGES as usize * PAGE_SIZE;

/// Static lock bits as shipped on retail figures
pub const STATIC_LOCK_BITS: Page = [0x00, 0x00, 0x0f, 0xe0];
/// Capability container as shipped on retail figures
pub const CAPABILITY_CONTAINER: Page = [0xf1, 0x10, 0xff, 0xee];
/// Dynamic lock bits as shipped on retail figures
pub const DYNAMIC_LOCK_BITS: Page = [0x01, 0x00, 0x0f, 0xbd];
/// CFG0: password protection starts at page 4
pub const CONFIG0: Page = [0x00, 0x00, 0x00, 0x04];
/// CFG1: protect writes, lock config
pub const CONFIG1: Page = [0x5f, 0x00, 0x00, 0x00];
/// PACK returned after a successful PWD_AUTH
pub const PACK_RFUI: Page = [0x80, 0x80, 0x00, 0x00];

/// Capability container size byte of an NTAG213
pub const CC_SIZE_NTAG213: u8 = 0x12;
/// Capability container size byte of an NTAG215
pub const CC_SIZE_NTAG215: u8 = 0x3e;
/// Capability container size byte of an NTAG216
pub const CC_SIZE_NTAG216: u8 = 0x6d;

/// Byte offset of a page inside a full dump
#[inline]
#[must_use]
pub const fn page_offset(page: PageAddress) -> usize {
    page as usize * PAGE_SIZE
}

/// Tag class as reported by the capability container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagClass {
    /// 144 bytes of user memory
    Ntag213,
    /// 504 bytes of user memory, the only supported class
    Ntag215,
    /// 888 bytes of user memory
    Ntag216,
    /// Anything else; tolerated
    Unknown(u8),
}

impl TagClass {
    /// Classify from the third byte of the capability container
    #[must_use]
    pub fn from_size_byte(size: u8) -> Self {
        match size {
            CC_SIZE_NTAG213 => Self::Ntag213,
            CC_SIZE_NTAG215 => Self::Ntag215,
            CC_SIZE_NTAG216 => Self::Ntag216,
            other => Self::Unknown(other),
        }
    }

    /// Whether the write pipeline refuses this class outright
    #[inline]
    #[must_use]
    pub fn is_rejected(self) -> bool {
        matches!(self, Self::Ntag213 | Self::Ntag216)
    }
}

impl std::fmt::Display for TagClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ntag213 => f.write_str("NTAG213"),
            Self::Ntag215 => f.write_str("NTAG215"),
            Self::Ntag216 => f.write_str("NTAG216"),
            Self::Unknown(size) => write!(f, "unknown (CC size 0x{size:02x})"),
        }
    }
}
