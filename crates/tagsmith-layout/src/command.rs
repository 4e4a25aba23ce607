//! MIFARE Ultralight / NTAG command framing
//!
//! Packets are opcode, page address, then payload. A READ answers with
//! 16 bytes (four consecutive pages); a WRITE carries exactly one page and
//! answers with an ACK.

use crate::layout::{Page, PageAddress, PAGE_SIZE};

/// Pages returned by one READ
pub const PAGES_PER_READ: u8 = 4;

/// Bytes returned by one READ
pub const READ_RESPONSE_LEN: usize = PAGES_PER_READ as usize * PAGE_SIZE;

/// Command opcodes used by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// READ four pages
    Read = 0x30,
    /// WRITE one page
    Write = 0xa2,
}

impl Opcode {
    /// Wire byte
    #[inline]
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Opcode for a wire byte, `None` for anything the pipeline does not send
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        [Self::Read, Self::Write]
            .into_iter()
            .find(|op| op.code() == code)
    }
}

/// A single framed command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Read four pages starting at `page`
    Read {
        /// First page
        page: PageAddress,
    },
    /// Write one page
    Write {
        /// Target page
        page: PageAddress,
        /// New contents
        data: Page,
    },
}

impl Command {
    /// Opcode of this command
    #[inline]
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Read { .. } => Opcode::Read,
            Self::Write { .. } => Opcode::Write,
        }
    }

    /// Page this command addresses
    #[inline]
    #[must_use]
    pub fn page(&self) -> PageAddress {
        match self {
            Self::Read { page } | Self::Write { page, .. } => *page,
        }
    }

    /// Wire bytes
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Read { page } => vec![Opcode::Read.code(), *page],
            Self::Write { page, data } => {
                let mut packet = Vec::with_capacity(2 + PAGE_SIZE);
                packet.push(Opcode::Write.code());
                packet.push(*page);
                packet.extend_from_slice(data);
                packet
            }
        }
    }

    /// Parse wire bytes back into a command
    ///
    /// Returns `None` for unknown opcodes or truncated packets.
    #[must_use]
    pub fn from_bytes(packet: &[u8]) -> Option<Self> {
        let (&code, rest) = packet.split_first()?;
        match (Opcode::from_code(code)?, rest) {
            (Opcode::Read, [page]) => Some(Self::Read { page: *page }),
            (Opcode::Write, [page, a, b, c, d]) => Some(Self::Write {
                page: *page,
                data: [*a, *b, *c, *d],
            }),
            _ => None,
        }
    }
}
