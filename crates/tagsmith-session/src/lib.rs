//! tagsmith session - writing figurine images onto NTAG215 tags
//!
//! The central pieces:
//! - [`TagStore`]: load/scan/tap/dump operations and their observable state
//! - [`TagSession`]: one attempt, driven as a sequence of awaited steps
//! - [`state_machine`]: the legal session transitions
//! - [`pipeline`]: the ordered write plan and page I/O
//!
//! The codec ([`ImageCodec`]) and the reader ([`TagReader`]) are
//! capabilities supplied by the embedding application. The
//! [`test_harness`] module ships an in-memory tag and reader.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tagsmith_session::{StoreConfig, TagStore};
//! use tagsmith_session::test_harness::{PassthroughLoader, SimulatedReader};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StoreConfig::new().with_root_dir("/srv/figures");
//! let store = TagStore::new(config, Arc::new(SimulatedReader::new()), Arc::new(PassthroughLoader));
//!
//! let outcome = store.tap("/srv/figures/link.bin".as_ref()).await?;
//! println!("{outcome:?}, progress {}", store.snapshot().progress());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod channel;
pub mod codec;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod session;
pub mod snapshot;
pub mod state_machine;
pub mod store;

// Test harness
pub mod test_harness;

pub use channel::{DetectedTag, PollEvent, PollingSession, SessionEnd, TagChannel, TagReader};
pub use codec::{CodecLoader, ImageCodec, ImageSlot, PlainImage, UID_RANGE};
pub use config::StoreConfig;
pub use error::{
    ChannelError, CodecError, ConfigError, SessionError, StateMachineError, StoreError,
};
pub use session::{ScanOutcome, SessionContext, SessionMode, TagSession};
pub use snapshot::{SnapshotPublisher, StoreSnapshot};
pub use state_machine::{LockStep, SecurityStep, SessionState};
pub use store::TagStore;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
