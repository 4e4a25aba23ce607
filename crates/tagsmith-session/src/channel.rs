//! Command channel boundary
//!
//! A reader opens polling sessions; a polling session reports detected tags
//! and connects to them; a connected tag accepts one framed command at a
//! time. All three are capabilities so the session can run against the
//! simulator in tests.

use crate::error::ChannelError;
use async_trait::async_trait;
use tagsmith_layout::{Command, TagSerial};

/// A tag reported by the reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectedTag {
    /// ISO 14443-A MIFARE family tag (Ultralight / NTAG)
    Mifare {
        /// Hardware serial
        serial: TagSerial,
    },
    /// Any other technology
    Other {
        /// Reader's name for the technology
        kind: String,
    },
}

impl DetectedTag {
    /// Whether the write pipeline can talk to this tag
    #[inline]
    #[must_use]
    pub fn is_mifare(&self) -> bool {
        matches!(self, Self::Mifare { .. })
    }
}

/// Why a polling session ended on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// No tag presented in time
    Timeout,
    /// Operator dismissed the session
    UserCancelled,
    /// Reader failure
    Failed(ChannelError),
}

impl SessionEnd {
    /// Timeouts and cancellations end the attempt without an error
    #[inline]
    #[must_use]
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::Timeout | Self::UserCancelled)
    }
}

/// Notification from a polling session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    /// One or more tags entered the field
    Detected(Vec<DetectedTag>),
    /// The session is over
    Invalidated(SessionEnd),
}

/// Tag reader hardware
#[async_trait]
pub trait TagReader: Send + Sync {
    /// Whether this device can read tags at all
    fn reading_available(&self) -> bool;

    /// Start polling, showing `alert_message` to the operator
    ///
    /// # Errors
    /// Reader unavailable or already busy
    async fn begin(&self, alert_message: &str) -> Result<Box<dyn PollingSession>, ChannelError>;
}

/// One polling session
#[async_trait]
pub trait PollingSession: Send {
    /// Wait for the next detection or for the session to end
    async fn next_event(&mut self) -> PollEvent;

    /// Connect to a detected tag
    ///
    /// # Errors
    /// Tag left the field or refused the connection
    async fn connect(&mut self, tag: &DetectedTag) -> Result<Box<dyn TagChannel>, ChannelError>;

    /// End polling; idempotent
    async fn invalidate(&mut self);
}

/// A connected tag
#[async_trait]
pub trait TagChannel: Send {
    /// Hardware serial of the connected tag
    fn serial(&self) -> TagSerial;

    /// Send one command and wait for its answer
    ///
    /// Reads answer with data, writes with an acknowledgement.
    ///
    /// # Errors
    /// NAK, timeout or lost connection
    async fn send(&mut self, command: Command) -> Result<Vec<u8>, ChannelError>;
}
