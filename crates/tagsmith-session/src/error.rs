//! Error types for tagsmith sessions
//!
//! Four families, matching how each is handled:
//! - Configuration errors: key material missing or unreadable
//! - Hardware/channel errors: connect, read, write, wrong tag class
//! - Benign session ends: not errors at all, see [`crate::channel::SessionEnd`]
//! - Load errors: source file unreadable or undecodable
//!
//! The `Display` of [`SessionError`] and [`StoreError`] is the exact message
//! surfaced to the operator.

use crate::state_machine::SessionState;
use std::path::PathBuf;
use tagsmith_layout::{LayoutError, PageAddress, TagClass};

/// Failure reported by the command channel
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// Transport-level failure with the reader's description
    #[error("{0}")]
    Transport(String),

    /// Tag left the field or the session was torn down
    #[error("Tag connection lost")]
    ConnectionLost,
}

/// Failure reported by the image codec
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// No key file at the expected location
    #[error("key material not found at {}", .0.display())]
    MissingKey(PathBuf),

    /// Key file exists but cannot be used
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// Input image cannot be decoded
    #[error("malformed image: {0}")]
    Malformed(String),

    /// Codec produced or received a buffer of the wrong shape
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// Illegal session state changes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateMachineError {
    /// Transition not permitted by the session graph
    #[error("illegal transition {from:?} -> {to:?}")]
    IllegalTransition {
        /// Current state
        from: SessionState,
        /// Requested state
        to: SessionState,
    },
}

/// Reasons a tag session attempt aborted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Reader could not start polling, or polling ended abnormally
    #[error("Error during session: {0}")]
    Session(ChannelError),

    /// Tag detected but the connection failed
    #[error("Error during connect: {0}")]
    Connect(ChannelError),

    /// A READ failed
    #[error("Error during read: {0}")]
    Read(ChannelError),

    /// Header read did not return four pages
    #[error("Couldn't read tag UID")]
    MissingUid,

    /// Tag is an NTAG213 or NTAG216
    #[error("{0}")]
    WrongTagClass(TagClass),

    /// No codec or no decoded image at patch time
    #[error("Internal error: amiitool not initialized")]
    NotInitialized,

    /// Re-encoding the patched image failed
    #[error("Error during pack: {0}")]
    Pack(CodecError),

    /// A page WRITE failed
    ///
    /// Pages already acknowledged stay written on the tag. There is no
    /// rollback; the tag may be left half-written and must be rewritten
    /// from the start.
    #[error("Error during write: {source}")]
    Write {
        /// Page whose write failed
        page: PageAddress,
        /// Channel failure
        source: ChannelError,
    },

    /// Session graph violated
    #[error("Internal error: {0}")]
    StateMachine(#[from] StateMachineError),
}

impl SessionError {
    /// Whether the failure came from the tag or the reader
    #[inline]
    #[must_use]
    pub fn is_hardware(&self) -> bool {
        matches!(
            self,
            Self::Session(_)
                | Self::Connect(_)
                | Self::Read(_)
                | Self::MissingUid
                | Self::WrongTagClass(_)
                | Self::Write { .. }
        )
    }

    /// Whether the tag may hold a partially written image
    #[inline]
    #[must_use]
    pub fn may_leave_partial_write(&self) -> bool {
        matches!(self, Self::Write { .. })
    }
}

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("couldn't read config {path}: {source}")]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// File is not valid TOML for [`crate::config::StoreConfig`]
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors from store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The tag session aborted
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Source file unreadable or undecodable
    #[error("Couldn't read {}", .path.display())]
    Load {
        /// Source file
        path: PathBuf,
        /// Why
        reason: String,
    },

    /// Key file missing from the root directory
    #[error("Encryption key not found: {}", .0.display())]
    MissingKey(PathBuf),

    /// Key file present but rejected by the codec
    #[error("Couldn't load key material: {0}")]
    Codec(CodecError),

    /// Load attempted before key material was configured
    #[error("Internal error: amiitool not initialized")]
    NotInitialized,

    /// Another attempt holds the reader
    #[error("A scan is already in progress")]
    ScanInProgress,

    /// Config file problem
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl StoreError {
    /// Whether this error belongs on the operator's screen
    ///
    /// `ScanInProgress` is refused silently so it does not clobber the
    /// running attempt's message.
    #[inline]
    #[must_use]
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, Self::ScanInProgress)
    }
}
