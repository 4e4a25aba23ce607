//! Tag session
//!
//! One attempt, start to finish, as a sequence of awaited steps. Every
//! command is awaited before the next is issued and every state change goes
//! through [`StateTracker`], so the write order cannot drift from the
//! session graph.
//!
//! Progress and errors are published as they happen. Failures reset
//! progress to zero; timeouts and cancellations leave everything alone.

use crate::channel::{DetectedTag, PollEvent, PollingSession, SessionEnd, TagChannel, TagReader};
use crate::codec::ImageSlot;
use crate::error::SessionError;
use crate::pipeline::{self, PlannedWrite};
use crate::snapshot::SnapshotPublisher;
use crate::state_machine::{SessionState, StateTracker};
use tagsmith_layout::{TagClass, TagDump, TagHeader, UniqueId, WritePassword};

/// What a session attempt should do with the tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Write the loaded image
    Write,
    /// Read the full tag memory
    Dump,
}

/// How an attempt ended, short of an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Image written and tag locked
    Written {
        /// UID patched into the image
        uid: UniqueId,
        /// Number of page writes acknowledged
        pages_written: usize,
    },
    /// Tag memory read back
    Dumped(TagDump),
    /// Timeout or cancellation before a tag was handled
    Ended(SessionEnd),
    /// Tapped item is not a figure image
    Skipped,
}

/// Borrowed collaborators for one attempt
#[derive(Clone, Copy)]
pub struct SessionContext<'a> {
    /// Reader hardware
    pub reader: &'a dyn TagReader,
    /// Codec and loaded image
    pub image: &'a ImageSlot,
    /// Observable state
    pub publisher: &'a SnapshotPublisher,
    /// Polling prompt
    pub alert_message: &'a str,
}

/// A single attempt against the reader
pub struct TagSession<'a> {
    ctx: SessionContext<'a>,
    mode: SessionMode,
    state: StateTracker,
}

impl<'a> TagSession<'a> {
    /// New attempt in `Idle`
    #[must_use]
    pub fn new(ctx: SessionContext<'a>, mode: SessionMode) -> Self {
        Self {
            ctx,
            mode,
            state: StateTracker::new(),
        }
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.current()
    }

    /// States visited so far
    #[inline]
    #[must_use]
    pub fn history(&self) -> &[SessionState] {
        self.state.history()
    }

    /// Poll for a tag and handle the first usable one
    ///
    /// # Errors
    /// Any hardware, codec or ordering failure; the message has already
    /// been published when this returns
    pub async fn run(&mut self) -> Result<ScanOutcome, SessionError> {
        self.state.advance(SessionState::Active)?;
        tracing::info!(mode = ?self.mode, "starting tag session");

        let result = match self.ctx.reader.begin(self.ctx.alert_message).await {
            Ok(mut session) => {
                let result = self.poll(session.as_mut()).await;
                session.invalidate().await;
                result
            }
            Err(e) => Err(SessionError::Session(e)),
        };

        let result = result.map_err(|e| self.abort(e));
        if let Err(e) = self.state.advance(SessionState::Idle) {
            tracing::error!(error = %e, "session did not return to idle");
        }
        result
    }

    async fn poll(&mut self, session: &mut dyn PollingSession) -> Result<ScanOutcome, SessionError> {
        loop {
            match session.next_event().await {
                PollEvent::Invalidated(SessionEnd::Failed(e)) => {
                    return Err(SessionError::Session(e));
                }
                PollEvent::Invalidated(end) => {
                    tracing::info!(?end, "tag session ended");
                    return Ok(ScanOutcome::Ended(end));
                }
                PollEvent::Detected(tags) => {
                    let Some(tag) = tags.into_iter().next() else {
                        continue;
                    };
                    self.state.advance(SessionState::Detected)?;

                    if !tag.is_mifare() {
                        tracing::warn!(?tag, "Ignoring non-mifare tag");
                        self.ctx.publisher.warn("Ignoring non-mifare tag");
                        self.state.advance(SessionState::Active)?;
                        continue;
                    }

                    return self.handle(session, &tag).await;
                }
            }
        }
    }

    async fn handle(
        &mut self,
        session: &mut dyn PollingSession,
        tag: &DetectedTag,
    ) -> Result<ScanOutcome, SessionError> {
        self.state.advance(SessionState::Connecting)?;
        let mut channel = session.connect(tag).await.map_err(|e| {
            tracing::error!(error = %e, "Error during connect");
            SessionError::Connect(e)
        })?;
        self.state.advance(SessionState::Connected)?;

        let outcome = match self.mode {
            SessionMode::Write => self.write(channel.as_mut()).await?,
            SessionMode::Dump => {
                self.state.advance(SessionState::ReadingDump)?;
                let dump = pipeline::read_dump(channel.as_mut()).await?;
                tracing::info!(?dump, "tag read");
                ScanOutcome::Dumped(dump)
            }
        };

        self.state.advance(SessionState::Completed)?;
        self.ctx.publisher.complete();
        Ok(outcome)
    }

    async fn write(&mut self, channel: &mut dyn TagChannel) -> Result<ScanOutcome, SessionError> {
        let raw = pipeline::read_header(channel).await?;
        let header = TagHeader::parse(&raw).map_err(|_| SessionError::MissingUid)?;

        self.state.advance(SessionState::ValidatingSize)?;
        match header.tag_class() {
            class @ (TagClass::Ntag213 | TagClass::Ntag216) => {
                return Err(SessionError::WrongTagClass(class));
            }
            TagClass::Ntag215 => {}
            TagClass::Unknown(size) => {
                tracing::warn!("Unexpected size from CC: 0x{size:02x}");
            }
        }

        self.state.advance(SessionState::Patching)?;
        let uid = header.uid();
        let image = self.patch(&uid)?;

        let password = WritePassword::derive(&channel.serial());
        let plan = pipeline::write_plan(&image, password)
            .map_err(|e| SessionError::Pack(e.into()))?;
        self.write_all(channel, &plan).await?;

        tracing::info!(%uid, pages = plan.len(), "done writing");
        Ok(ScanOutcome::Written {
            uid,
            pages_written: plan.len(),
        })
    }

    fn patch(&self, uid: &UniqueId) -> Result<TagDump, SessionError> {
        let (Some(codec), Some(plain)) = (self.ctx.image.codec(), self.ctx.image.plain()) else {
            return Err(SessionError::NotInitialized);
        };
        tracing::debug!(%uid, "patching uid into plain image");
        codec.pack(&plain.with_uid(uid)).map_err(SessionError::Pack)
    }

    async fn write_all(
        &mut self,
        channel: &mut dyn TagChannel,
        plan: &[PlannedWrite],
    ) -> Result<(), SessionError> {
        for write in plan {
            self.state.advance(write.state())?;
            pipeline::write_page(channel, write).await?;
            self.ctx.publisher.page_written(write.page);
        }
        Ok(())
    }

    fn abort(&mut self, error: SessionError) -> SessionError {
        tracing::error!(
            error = %error,
            state = ?self.state.current(),
            hardware = error.is_hardware(),
            partial_write = error.may_leave_partial_write(),
            "tag session aborted"
        );
        if let Err(e) = self.state.advance(SessionState::Aborted) {
            tracing::error!(error = %e, "abort from unexpected state");
        }
        self.ctx.publisher.fail(error.to_string());
        error
    }
}
