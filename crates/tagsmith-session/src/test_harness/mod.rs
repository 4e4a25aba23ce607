// Test harness module
// Simulated reader/tag and a development codec

pub mod simulator;

pub use simulator::*;

use crate::channel::TagReader;
use crate::codec::{CodecLoader, ImageCodec, ImageSlot, PlainImage};
use crate::error::{CodecError, SessionError};
use crate::session::{ScanOutcome, SessionContext, SessionMode, TagSession};
use crate::snapshot::{SnapshotPublisher, StoreSnapshot};
use std::path::Path;
use std::sync::Arc;
use tagsmith_layout::{PageAddress, TagDump, TagSerial};

/// Codec that treats the raw dump as its own plain image
///
/// Stands in for the real key-backed codec when no key material is
/// involved: development runs and the simulator.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCodec;

impl ImageCodec for PassthroughCodec {
    fn unpack(&self, raw: &[u8]) -> Result<PlainImage, CodecError> {
        let dump = TagDump::from_bytes(raw.to_vec())?;
        PlainImage::new(dump.into_bytes())
    }

    fn pack(&self, plain: &PlainImage) -> Result<TagDump, CodecError> {
        Ok(TagDump::from_bytes(plain.as_bytes().to_vec())?)
    }
}

/// Loader for [`PassthroughCodec`]; only checks that the key file exists
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughLoader;

impl CodecLoader for PassthroughLoader {
    fn open(&self, key_path: &Path) -> Result<Arc<dyn ImageCodec>, CodecError> {
        let key = std::fs::read(key_path).map_err(|_| CodecError::MissingKey(key_path.to_path_buf()))?;
        if key.is_empty() {
            return Err(CodecError::InvalidKey("empty key file".into()));
        }
        Ok(Arc::new(PassthroughCodec))
    }
}

/// Parameters for a simulated write
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Serial of the blank tag
    pub serial: TagSerial,
    /// Capability-container size byte
    pub size_byte: u8,
    /// Page whose WRITE is NAKed
    pub fail_write_at: Option<PageAddress>,
    /// Raw image to write
    pub image: Vec<u8>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            serial: TagSerial([0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66]),
            size_byte: tagsmith_layout::layout::CC_SIZE_NTAG215,
            fail_write_at: None,
            image: vec![0u8; tagsmith_layout::DUMP_SIZE],
        }
    }
}

/// Result of a simulated write
#[derive(Debug)]
pub struct SimulationReport {
    /// Session result
    pub outcome: Result<ScanOutcome, SessionError>,
    /// Pages acknowledged by the tag, in order
    pub written_pages: Vec<PageAddress>,
    /// Observable state after the attempt
    pub snapshot: StoreSnapshot,
    /// Tag memory after the attempt
    pub memory: TagDump,
}

impl SimulationReport {
    /// Whether the image was written in full
    #[must_use]
    pub fn passed(&self) -> bool {
        matches!(self.outcome, Ok(ScanOutcome::Written { .. }))
    }
}

/// Write `config.image` onto a simulated blank tag
///
/// # Errors
/// `CodecError` if the image cannot be decoded
pub async fn run_simulation(config: SimulatorConfig) -> Result<SimulationReport, CodecError> {
    let tag = SimulatedTag::ntag215(config.serial).with_size_byte(config.size_byte);
    let tag = match config.fail_write_at {
        Some(page) => tag.failing_write_at(page),
        None => tag,
    };
    let tag = tag.shared();
    let reader = SimulatedReader::with_tag(Arc::clone(&tag));

    let image = ImageSlot::new();
    image.set_codec(Arc::new(PassthroughCodec));
    image.load(&PassthroughCodec, &config.image)?;

    let publisher = SnapshotPublisher::new(reader.reading_available(), true);
    let ctx = SessionContext {
        reader: &reader,
        image: &image,
        publisher: &publisher,
        alert_message: crate::config::DEFAULT_ALERT,
    };
    let outcome = TagSession::new(ctx, SessionMode::Write).run().await;

    let tag = tag.lock();
    Ok(SimulationReport {
        outcome,
        written_pages: tag.written_pages(),
        snapshot: publisher.current(),
        memory: tag.memory(),
    })
}
