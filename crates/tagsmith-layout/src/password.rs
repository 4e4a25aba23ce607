//! Write password derivation
//!
//! Retail figures protect pages 4 and up with a password computed from the
//! tag serial. Byte 0 of the serial is the manufacturer code and does not
//! take part.

use crate::dump::TagSerial;
use crate::layout::Page;

/// Four-byte PWD page value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WritePassword(Page);

impl WritePassword {
    /// Derive the password for a serial
    #[must_use]
    pub fn derive(serial: &TagSerial) -> Self {
        let uid = serial.as_bytes();
        Self([
            uid[1] ^ uid[3] ^ 0xaa,
            uid[2] ^ uid[4] ^ 0x55,
            uid[3] ^ uid[5] ^ 0xaa,
            uid[4] ^ uid[6] ^ 0x55,
        ])
    }

    /// Page value to write at the PWD address
    #[inline]
    #[must_use]
    pub fn as_page(&self) -> Page {
        self.0
    }
}
