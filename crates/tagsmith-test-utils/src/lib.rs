//! Testing utilities for tagsmith workspace
//!
//! Shared fixtures: a recording codec, sample images and a temporary figure
//! directory with key material.

#![allow(missing_docs)]

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tagsmith_layout::{TagDump, TagSerial, DUMP_SIZE};
use tagsmith_session::{CodecError, CodecLoader, ImageCodec, PlainImage};
use tempfile::TempDir;

pub const TEST_SERIAL: [u8; 7] = [0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66];

pub const KEY_FILE: &str = "key.bin";

pub fn test_serial() -> TagSerial {
    TagSerial(TEST_SERIAL)
}

/// Deterministic 540-byte image, distinct in every page
pub fn sample_image() -> Vec<u8> {
    (0..DUMP_SIZE).map(|i| ((i * 7 + 3) % 256) as u8).collect()
}

/// Codec that XORs every byte with a mask and records what it packs
#[derive(Debug, Default)]
pub struct RecordingCodec {
    mask: u8,
    packed: Mutex<Vec<PlainImage>>,
}

impl RecordingCodec {
    pub fn new(mask: u8) -> Self {
        Self {
            mask,
            packed: Mutex::new(Vec::new()),
        }
    }

    /// Plain images passed to `pack`, oldest first
    pub fn packed(&self) -> Vec<PlainImage> {
        self.packed.lock().clone()
    }

    fn apply(&self, bytes: &[u8]) -> Vec<u8> {
        bytes.iter().map(|b| b ^ self.mask).collect()
    }
}

impl ImageCodec for RecordingCodec {
    fn unpack(&self, raw: &[u8]) -> Result<PlainImage, CodecError> {
        if raw.len() != DUMP_SIZE {
            return Err(CodecError::Malformed(format!("{} bytes", raw.len())));
        }
        PlainImage::new(self.apply(raw))
    }

    fn pack(&self, plain: &PlainImage) -> Result<TagDump, CodecError> {
        self.packed.lock().push(plain.clone());
        Ok(TagDump::from_bytes(self.apply(plain.as_bytes()))?)
    }
}

/// Loader handing out one shared [`RecordingCodec`]
#[derive(Debug, Clone)]
pub struct RecordingLoader {
    codec: Arc<RecordingCodec>,
}

impl RecordingLoader {
    pub fn new(codec: Arc<RecordingCodec>) -> Self {
        Self { codec }
    }
}

impl CodecLoader for RecordingLoader {
    fn open(&self, key_path: &Path) -> Result<Arc<dyn ImageCodec>, CodecError> {
        if !key_path.is_file() {
            return Err(CodecError::MissingKey(key_path.to_path_buf()));
        }
        let codec: Arc<dyn ImageCodec> = self.codec.clone();
        Ok(codec)
    }
}

/// Temporary root directory laid out like the figure browser's
pub struct FigureDir {
    dir: TempDir,
}

impl FigureDir {
    /// Empty directory, no key file
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Directory with a key file
    pub fn with_key() -> Self {
        let dir = Self::new();
        std::fs::write(dir.path().join(KEY_FILE), [0x5a; 160]).unwrap();
        dir
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a figure file and return its path
    pub fn add_figure(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    /// Create a sub-directory and return its path
    pub fn add_dir(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::create_dir_all(&path).unwrap();
        path
    }
}

impl Default for FigureDir {
    fn default() -> Self {
        Self::new()
    }
}
