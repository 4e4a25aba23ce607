//! Observable session state
//!
//! Progress, the last error and reader readiness are published through a
//! `watch` channel. Only the store and the attempt it is running write to
//! it; observers hold receivers.

use std::path::PathBuf;
use tagsmith_layout::{PageAddress, TOTAL_PAGES};
use tokio::sync::watch;

/// Point-in-time view for the UI
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot {
    /// Last successfully written page, 0 when none
    pub last_page_written: PageAddress,
    /// Last error message, empty when none
    pub error: String,
    /// Whether the device has a tag reader
    pub reading_available: bool,
    /// Whether the key file exists in the root directory
    pub has_key_material: bool,
    /// Source file of the loaded image
    pub selected: Option<PathBuf>,
}

impl StoreSnapshot {
    /// Fraction of the tag written, 0.0 to 1.0
    #[must_use]
    pub fn progress(&self) -> f32 {
        f32::from(self.last_page_written) / f32::from(TOTAL_PAGES)
    }

    /// Error message if one is set
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        if self.error.is_empty() {
            None
        } else {
            Some(&self.error)
        }
    }
}

/// Write side of the snapshot channel
#[derive(Debug)]
pub struct SnapshotPublisher {
    tx: watch::Sender<StoreSnapshot>,
}

impl SnapshotPublisher {
    /// Publisher with an initial snapshot
    #[must_use]
    pub fn new(reading_available: bool, has_key_material: bool) -> Self {
        let (tx, _rx) = watch::channel(StoreSnapshot {
            last_page_written: 0,
            error: String::new(),
            reading_available,
            has_key_material,
            selected: None,
        });
        Self { tx }
    }

    /// New observer
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.tx.subscribe()
    }

    /// Current snapshot
    #[must_use]
    pub fn current(&self) -> StoreSnapshot {
        self.tx.borrow().clone()
    }

    /// Record a successful page write
    pub fn page_written(&self, page: PageAddress) {
        self.tx.send_modify(|s| s.last_page_written = page);
    }

    /// Set the error message and reset progress
    pub fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        self.tx.send_modify(|s| {
            s.error = message;
            s.last_page_written = 0;
        });
    }

    /// Set the error message, leaving progress alone
    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        self.tx.send_modify(|s| s.error = message);
    }

    /// Clear the error message
    pub fn clear_error(&self) {
        self.tx.send_if_modified(|s| {
            let changed = !s.error.is_empty();
            s.error.clear();
            changed
        });
    }

    /// Successful attempt: progress and error both cleared
    pub fn complete(&self) {
        self.tx.send_modify(|s| {
            s.error.clear();
            s.last_page_written = 0;
        });
    }

    /// Record the loaded source file
    pub fn select(&self, path: PathBuf) {
        self.tx.send_modify(|s| s.selected = Some(path));
    }

    /// Record whether the key file is present
    pub fn set_key_material(&self, present: bool) {
        self.tx.send_if_modified(|s| {
            let changed = s.has_key_material != present;
            s.has_key_material = present;
            changed
        });
    }
}
