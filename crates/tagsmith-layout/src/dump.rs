//! Raw tag images and identity values
//!
//! `TagDump` is the full 540-byte memory of an NTAG215. `TagHeader` is the
//! 16-byte answer to `READ 0`, which carries the UID and the capability
//! container.

use crate::error::LayoutError;
use crate::layout::{
    page_offset, Page, PageAddress, TagClass, CAPABILITY_CONTAINER_PAGE, CHARACTER_MODEL_HEAD,
    DUMP_SIZE, PAGE_SIZE, TOTAL_PAGES,
};
use serde::{Deserialize, Serialize};

/// Width of the UID as laid out in pages 0 and 1
pub const UID_SIZE: usize = 8;

/// Width of the hardware serial number
pub const SERIAL_SIZE: usize = 7;

/// Bytes returned by a single READ
pub const HEADER_SIZE: usize = 16;

/// First two pages of the tag: UID0..2, BCC0, UID3..6
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UniqueId(pub [u8; UID_SIZE]);

impl UniqueId {
    /// Raw bytes
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; UID_SIZE] {
        &self.0
    }

    /// Manufacturer code (first byte)
    #[inline]
    #[must_use]
    pub fn manufacturer(&self) -> u8 {
        self.0[0]
    }
}

impl std::fmt::Display for UniqueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Seven-byte hardware serial as reported by the reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagSerial(pub [u8; SERIAL_SIZE]);

impl TagSerial {
    /// Build from a reader-supplied identifier
    ///
    /// # Errors
    /// `LayoutError::SerialLength` unless exactly 7 bytes are given
    pub fn from_slice(bytes: &[u8]) -> Result<Self, LayoutError> {
        let array: [u8; SERIAL_SIZE] = bytes
            .try_into()
            .map_err(|_| LayoutError::SerialLength(bytes.len()))?;
        Ok(Self(array))
    }

    /// Raw bytes
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; SERIAL_SIZE] {
        &self.0
    }
}

impl std::fmt::Display for TagSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Answer to `READ 0`: pages 0 through 3
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagHeader([u8; HEADER_SIZE]);

impl TagHeader {
    /// Validate a header read
    ///
    /// # Errors
    /// `LayoutError::HeaderLength` unless exactly 16 bytes came back
    pub fn parse(bytes: &[u8]) -> Result<Self, LayoutError> {
        let array: [u8; HEADER_SIZE] = bytes
            .try_into()
            .map_err(|_| LayoutError::HeaderLength(bytes.len()))?;
        Ok(Self(array))
    }

    /// UID bytes as stored in pages 0 and 1
    #[must_use]
    pub fn uid(&self) -> UniqueId {
        let mut uid = [0u8; UID_SIZE];
        uid.copy_from_slice(&self.0[..UID_SIZE]);
        UniqueId(uid)
    }

    /// Page 3
    #[must_use]
    pub fn capability_container(&self) -> Page {
        let start = page_offset(CAPABILITY_CONTAINER_PAGE);
        let mut page = [0u8; PAGE_SIZE];
        page.copy_from_slice(&self.0[start..start + PAGE_SIZE]);
        page
    }

    /// Memory size byte of the capability container (header byte 14)
    #[inline]
    #[must_use]
    pub fn size_byte(&self) -> u8 {
        self.capability_container()[2]
    }

    /// Class derived from the size byte
    #[inline]
    #[must_use]
    pub fn tag_class(&self) -> TagClass {
        TagClass::from_size_byte(self.size_byte())
    }
}

/// Full raw memory image of an NTAG215
#[derive(Clone, PartialEq, Eq)]
pub struct TagDump(Vec<u8>);

impl TagDump {
    /// Wrap a buffer holding exactly one tag image
    ///
    /// # Errors
    /// `LayoutError::DumpLength` if the buffer is not 540 bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, LayoutError> {
        if bytes.len() != DUMP_SIZE {
            return Err(LayoutError::DumpLength {
                expected: DUMP_SIZE,
                actual: bytes.len(),
            });
        }
        Ok(Self(bytes))
    }

    /// All-zero image
    #[must_use]
    pub fn blank() -> Self {
        Self(vec![0u8; DUMP_SIZE])
    }

    /// Copy of one page
    ///
    /// # Errors
    /// `LayoutError::PageOutOfRange` for addresses past the last page
    pub fn page(&self, page: PageAddress) -> Result<Page, LayoutError> {
        if page >= TOTAL_PAGES {
            return Err(LayoutError::PageOutOfRange(page));
        }
        let start = page_offset(page);
        let mut out = [0u8; PAGE_SIZE];
        out.copy_from_slice(&self.0[start..start + PAGE_SIZE]);
        Ok(out)
    }

    /// Overwrite one page
    ///
    /// # Errors
    /// `LayoutError::PageOutOfRange` for addresses past the last page
    pub fn set_page(&mut self, page: PageAddress, data: Page) -> Result<(), LayoutError> {
        if page >= TOTAL_PAGES {
            return Err(LayoutError::PageOutOfRange(page));
        }
        let start = page_offset(page);
        self.0[start..start + PAGE_SIZE].copy_from_slice(&data);
        Ok(())
    }

    /// Figure identifier stored in pages 21 and 22
    #[must_use]
    pub fn character_id(&self) -> [u8; 8] {
        let start = page_offset(CHARACTER_MODEL_HEAD);
        let mut id = [0u8; 8];
        id.copy_from_slice(&self.0[start..start + 8]);
        id
    }

    /// Raw bytes
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume into raw bytes
    #[inline]
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl std::fmt::Debug for TagDump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagDump")
            .field("uid", &hex::encode(&self.0[..UID_SIZE]))
            .field("character_id", &hex::encode(self.character_id()))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{PACK_PAGE, USER_MEMORY_FIRST};
    use pretty_assertions::assert_eq;

    fn header_with_size(size: u8) -> Vec<u8> {
        let mut bytes = vec![
            0x04, 0x11, 0x22, 0xbb, 0x33, 0x44, 0x55, 0x66, // UID + BCC
            0x77, 0x48, 0x00, 0x00, // BCC1, internal, lock bytes
            0xe1, 0x10, 0x00, 0x00, // CC
        ];
        bytes[14] = size;
        bytes
    }

    #[test]
    fn header_requires_sixteen_bytes() {
        assert_eq!(TagHeader::parse(&[0u8; 4]), Err(LayoutError::HeaderLength(4)));
        assert_eq!(TagHeader::parse(&[0u8; 17]), Err(LayoutError::HeaderLength(17)));
        assert!(TagHeader::parse(&[0u8; 16]).is_ok());
    }

    #[test]
    fn header_exposes_uid_and_class() {
        let header = TagHeader::parse(&header_with_size(0x3e)).unwrap();
        assert_eq!(
            header.uid().as_bytes(),
            &[0x04, 0x11, 0x22, 0xbb, 0x33, 0x44, 0x55, 0x66]
        );
        assert_eq!(header.uid().manufacturer(), 0x04);
        assert_eq!(header.capability_container(), [0xe1, 0x10, 0x3e, 0x00]);
        assert_eq!(header.tag_class(), TagClass::Ntag215);

        let small = TagHeader::parse(&header_with_size(0x12)).unwrap();
        assert_eq!(small.tag_class(), TagClass::Ntag213);
    }

    #[test]
    fn dump_length_is_enforced() {
        let err = TagDump::from_bytes(vec![0u8; 532]).unwrap_err();
        assert_eq!(
            err,
            LayoutError::DumpLength {
                expected: 540,
                actual: 532
            }
        );
    }

    #[test]
    fn page_access() {
        let mut dump = TagDump::blank();
        dump.set_page(USER_MEMORY_FIRST, [1, 2, 3, 4]).unwrap();
        dump.set_page(PACK_PAGE, [9, 9, 9, 9]).unwrap();

        assert_eq!(dump.page(USER_MEMORY_FIRST).unwrap(), [1, 2, 3, 4]);
        assert_eq!(&dump.as_bytes()[16..20], &[1, 2, 3, 4]);
        assert_eq!(&dump.as_bytes()[536..540], &[9, 9, 9, 9]);
        assert_eq!(dump.page(135), Err(LayoutError::PageOutOfRange(135)));
        assert!(dump.set_page(200, [0; 4]).is_err());
    }

    #[test]
    fn character_id_spans_pages_21_and_22() {
        let mut dump = TagDump::blank();
        dump.set_page(21, [0x01, 0x02, 0x03, 0x04]).unwrap();
        dump.set_page(22, [0x05, 0x06, 0x07, 0x08]).unwrap();
        assert_eq!(dump.character_id(), [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn serial_width() {
        assert!(TagSerial::from_slice(&[0u8; 7]).is_ok());
        assert_eq!(
            TagSerial::from_slice(&[0u8; 4]),
            Err(LayoutError::SerialLength(4))
        );
        let serial = TagSerial::from_slice(&[0x04, 0xa1, 0xb2, 0xc3, 0xd4, 0xe5, 0xf6]).unwrap();
        assert_eq!(serial.to_string(), "04a1b2c3d4e5f6");
    }
}
