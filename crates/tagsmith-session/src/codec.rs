//! Image codec boundary
//!
//! The encrypted on-tag image and its plaintext working form are converted
//! by an external codec backed by secret key material. The session only
//! ever patches the UID field of the plain image; everything else is opaque.

use crate::error::CodecError;
use parking_lot::RwLock;
use std::fmt;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use tagsmith_layout::{TagDump, UniqueId};

/// Location of the tag UID inside a plain image
pub const UID_RANGE: Range<usize> = 468..476;

/// Decoded working copy of a figurine image
#[derive(Clone, PartialEq, Eq)]
pub struct PlainImage(Vec<u8>);

impl PlainImage {
    /// Wrap decoded bytes
    ///
    /// # Errors
    /// `CodecError::Malformed` if the buffer cannot hold the UID field
    pub fn new(bytes: Vec<u8>) -> Result<Self, CodecError> {
        if bytes.len() < UID_RANGE.end {
            return Err(CodecError::Malformed(format!(
                "plain image is {} bytes, need at least {}",
                bytes.len(),
                UID_RANGE.end
            )));
        }
        Ok(Self(bytes))
    }

    /// Copy with the UID field replaced by `uid`
    #[must_use]
    pub fn with_uid(&self, uid: &UniqueId) -> Self {
        let mut bytes = self.0.clone();
        bytes[UID_RANGE].copy_from_slice(uid.as_bytes());
        Self(bytes)
    }

    /// UID currently stored in the image
    #[must_use]
    pub fn uid(&self) -> UniqueId {
        let mut uid = [0u8; 8];
        uid.copy_from_slice(&self.0[UID_RANGE]);
        UniqueId(uid)
    }

    /// Raw bytes
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; a plain image holds at least the UID field
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for PlainImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlainImage")
            .field("len", &self.0.len())
            .field("uid", &self.uid().to_string())
            .finish()
    }
}

/// Converts between raw tag dumps and plain images
pub trait ImageCodec: Send + Sync {
    /// Decode a raw dump
    ///
    /// # Errors
    /// Malformed input or unusable key material
    fn unpack(&self, raw: &[u8]) -> Result<PlainImage, CodecError>;

    /// Re-encode a plain image into a writable dump
    ///
    /// # Errors
    /// Only if the codec produces a dump of the wrong size
    fn pack(&self, plain: &PlainImage) -> Result<TagDump, CodecError>;
}

/// Opens a codec from a key file
pub trait CodecLoader: Send + Sync {
    /// Load key material
    ///
    /// # Errors
    /// `CodecError::MissingKey` or `CodecError::InvalidKey`
    fn open(&self, key_path: &Path) -> Result<Arc<dyn ImageCodec>, CodecError>;
}

/// The configured codec and the currently loaded plain image
///
/// Shared between the store and the running attempt. The image survives
/// repeated scans until the next successful load replaces it.
#[derive(Default)]
pub struct ImageSlot {
    codec: RwLock<Option<Arc<dyn ImageCodec>>>,
    plain: RwLock<Option<PlainImage>>,
}

impl ImageSlot {
    /// Empty slot: no codec, no image
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install key material
    pub fn set_codec(&self, codec: Arc<dyn ImageCodec>) {
        *self.codec.write() = Some(codec);
    }

    /// Configured codec, if any
    #[must_use]
    pub fn codec(&self) -> Option<Arc<dyn ImageCodec>> {
        self.codec.read().clone()
    }

    /// Whether key material has been configured
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.codec.read().is_some()
    }

    /// Decode `raw` and make it the current image
    ///
    /// The previous image is kept if decoding fails.
    ///
    /// # Errors
    /// `CodecError` from the codec; `None` codec is reported by the caller
    pub fn load(&self, codec: &dyn ImageCodec, raw: &[u8]) -> Result<(), CodecError> {
        let plain = codec.unpack(raw)?;
        *self.plain.write() = Some(plain);
        Ok(())
    }

    /// Copy of the current image
    #[must_use]
    pub fn plain(&self) -> Option<PlainImage> {
        self.plain.read().clone()
    }
}

impl fmt::Debug for ImageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageSlot")
            .field("configured", &self.is_configured())
            .field("plain", &*self.plain.read())
            .finish()
    }
}
