//! Tag store
//!
//! Session context shared with the UI:
//! - Lazy key material configuration from the root directory
//! - Loading a source image through the codec
//! - Running write and dump attempts, one at a time
//! - Publishing progress, error and readiness

use crate::channel::TagReader;
use crate::codec::{CodecLoader, ImageSlot};
use crate::config::StoreConfig;
use crate::error::{CodecError, StoreError};
use crate::session::{ScanOutcome, SessionContext, SessionMode, TagSession};
use crate::snapshot::{SnapshotPublisher, StoreSnapshot};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tagsmith_layout::TagDump;
use tokio::sync::{watch, Mutex, MutexGuard};

/// Owner of the loaded image and the reader
pub struct TagStore {
    config: StoreConfig,
    reader: Arc<dyn TagReader>,
    loader: Arc<dyn CodecLoader>,
    image: ImageSlot,
    publisher: SnapshotPublisher,
    attempt: Mutex<()>,
}

impl TagStore {
    /// Create a store; no key material is opened yet
    #[must_use]
    pub fn new(
        config: StoreConfig,
        reader: Arc<dyn TagReader>,
        loader: Arc<dyn CodecLoader>,
    ) -> Self {
        let publisher =
            SnapshotPublisher::new(reader.reading_available(), config.key_path().is_file());
        Self {
            config,
            reader,
            loader,
            image: ImageSlot::new(),
            publisher,
            attempt: Mutex::new(()),
        }
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Observe progress, error and readiness
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.publisher.subscribe()
    }

    /// Current observable state
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        self.publisher.current()
    }

    /// Whether key material has been opened
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.image.is_configured()
    }

    /// Open the key file once; later calls are no-ops
    ///
    /// # Errors
    /// `StoreError::MissingKey` or `StoreError::Codec`
    pub fn configure(&self) -> Result<(), StoreError> {
        if self.image.is_configured() {
            return Ok(());
        }

        let key_path = self.config.key_path();
        let present = key_path.is_file();
        self.publisher.set_key_material(present);
        if !present {
            return Err(self.surface(StoreError::MissingKey(key_path)));
        }

        match self.loader.open(&key_path) {
            Ok(codec) => {
                tracing::info!(key = %key_path.display(), "key material loaded");
                self.image.set_codec(codec);
                Ok(())
            }
            Err(CodecError::MissingKey(path)) => Err(self.surface(StoreError::MissingKey(path))),
            Err(e) => Err(self.surface(StoreError::Codec(e))),
        }
    }

    /// Decode `path` and make it the image for subsequent scans
    ///
    /// On failure the previously loaded image stays in place.
    ///
    /// # Errors
    /// `StoreError::NotInitialized` without key material, `StoreError::Load`
    /// if the file cannot be read or decoded
    pub async fn load(&self, path: &Path) -> Result<(), StoreError> {
        let Some(codec) = self.image.codec() else {
            return Err(self.surface(StoreError::NotInitialized));
        };

        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(e) => return Err(self.load_failed(path, e.to_string())),
        };
        if let Err(e) = self.image.load(codec.as_ref(), &raw) {
            return Err(self.load_failed(path, e.to_string()));
        }

        match TagDump::from_bytes(raw) {
            Ok(dump) => {
                tracing::info!(path = %path.display(), figure = %hex::encode(dump.character_id()), "loaded");
            }
            Err(_) => tracing::info!(path = %path.display(), "loaded"),
        }
        self.publisher.select(path.to_path_buf());
        Ok(())
    }

    /// Run one write attempt with the loaded image
    ///
    /// Opens key material on first use and clears the previous error.
    /// Timeouts and cancellations return `ScanOutcome::Ended` without
    /// touching the published state.
    ///
    /// # Errors
    /// `StoreError::ScanInProgress` if another attempt holds the reader,
    /// configuration errors, `StoreError::Session` if the attempt aborted
    pub async fn scan(&self) -> Result<ScanOutcome, StoreError> {
        let guard = self.begin_attempt()?;
        self.configure()?;
        self.run(guard, SessionMode::Write).await
    }

    /// Read the full memory of the next tag presented
    ///
    /// # Errors
    /// As [`TagStore::scan`]
    pub async fn dump(&self) -> Result<ScanOutcome, StoreError> {
        let guard = self.begin_attempt()?;
        self.run(guard, SessionMode::Dump).await
    }

    /// Handle a tapped item from the file browser
    ///
    /// Directories and the key file are ignored. Anything else configures
    /// key material if needed, loads the item and scans.
    ///
    /// # Errors
    /// Configuration, load or session errors
    pub async fn tap(&self, item: &Path) -> Result<ScanOutcome, StoreError> {
        let is_dir = tokio::fs::metadata(item)
            .await
            .is_ok_and(|meta| meta.is_dir());
        if is_dir || self.config.is_key_file(item) {
            tracing::debug!(item = %item.display(), "ignoring tap");
            return Ok(ScanOutcome::Skipped);
        }

        let guard = self.begin_attempt()?;
        self.configure()?;
        self.load(item).await?;
        self.run(guard, SessionMode::Write).await
    }

    /// Path of the currently loaded image
    #[must_use]
    pub fn selected(&self) -> Option<PathBuf> {
        self.publisher.current().selected
    }

    fn begin_attempt(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.attempt.try_lock().map_err(|_| {
            tracing::warn!("scan requested while another is running");
            StoreError::ScanInProgress
        })
    }

    async fn run(
        &self,
        _guard: MutexGuard<'_, ()>,
        mode: SessionMode,
    ) -> Result<ScanOutcome, StoreError> {
        tracing::info!(?mode, "scan");
        self.publisher.clear_error();

        let ctx = SessionContext {
            reader: self.reader.as_ref(),
            image: &self.image,
            publisher: &self.publisher,
            alert_message: &self.config.alert_message,
        };
        Ok(TagSession::new(ctx, mode).run().await?)
    }

    fn load_failed(&self, path: &Path, reason: String) -> StoreError {
        tracing::warn!(path = %path.display(), %reason, "load failed");
        self.surface(StoreError::Load {
            path: path.to_path_buf(),
            reason,
        })
    }

    fn surface(&self, error: StoreError) -> StoreError {
        if error.is_user_visible() {
            self.publisher.warn(error.to_string());
        }
        error
    }
}

impl std::fmt::Debug for TagStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagStore")
            .field("config", &self.config)
            .field("image", &self.image)
            .field("snapshot", &self.publisher.current())
            .finish_non_exhaustive()
    }
}
