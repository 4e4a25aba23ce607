//! Ordered page read/write pipeline
//!
//! The write plan is built up front as data so the order can be checked in
//! isolation: user pages ascending, then PWD, PACK, CC, CFG0, CFG1, then
//! the dynamic and static lock bits. Config pages enable password
//! protection and lock bits freeze pages, so nothing from those groups may
//! reach the tag before every user page is acknowledged.

use crate::channel::TagChannel;
use crate::error::{ChannelError, SessionError};
use crate::state_machine::{LockStep, SecurityStep, SessionState};
use tagsmith_layout::command::{PAGES_PER_READ, READ_RESPONSE_LEN};
use tagsmith_layout::layout::{
    CAPABILITY_CONTAINER, CONFIG0, CONFIG1, DYNAMIC_LOCK_BITS, PACK_RFUI, STATIC_LOCK_BITS,
    USER_MEMORY_FIRST, USER_WRITE_LAST,
};
use tagsmith_layout::{Command, Page, PageAddress, TagDump, WritePassword, DUMP_SIZE, TOTAL_PAGES};

/// Which part of the sequence a write belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    /// Image data
    User,
    /// Password, PACK, CC and config
    Security(SecurityStep),
    /// Lock bits
    Locks(LockStep),
}

/// One page write in the plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedWrite {
    /// Target page
    pub page: PageAddress,
    /// Contents
    pub data: Page,
    /// Stage
    pub stage: WriteStage,
}

impl PlannedWrite {
    /// Session state while this write is in flight
    #[must_use]
    pub fn state(&self) -> SessionState {
        match self.stage {
            WriteStage::User => SessionState::WritingUser(self.page),
            WriteStage::Security(step) => SessionState::WritingSecurity(step),
            WriteStage::Locks(step) => SessionState::WritingLocks(step),
        }
    }

    /// Framed command
    #[inline]
    #[must_use]
    pub fn command(&self) -> Command {
        Command::Write {
            page: self.page,
            data: self.data,
        }
    }
}

/// Full write sequence for a packed image
///
/// # Errors
/// Propagates page lookups on the dump; a 540-byte dump never fails
pub fn write_plan(
    image: &TagDump,
    password: WritePassword,
) -> Result<Vec<PlannedWrite>, tagsmith_layout::LayoutError> {
    let mut plan = Vec::with_capacity(usize::from(USER_WRITE_LAST - USER_MEMORY_FIRST) + 8);

    for page in USER_MEMORY_FIRST..=USER_WRITE_LAST {
        plan.push(PlannedWrite {
            page,
            data: image.page(page)?,
            stage: WriteStage::User,
        });
    }

    for step in SecurityStep::ORDER {
        let data = match step {
            SecurityStep::Password => password.as_page(),
            SecurityStep::Pack => PACK_RFUI,
            SecurityStep::CapabilityContainer => CAPABILITY_CONTAINER,
            SecurityStep::Config0 => CONFIG0,
            SecurityStep::Config1 => CONFIG1,
        };
        plan.push(PlannedWrite {
            page: step.page(),
            data,
            stage: WriteStage::Security(step),
        });
    }

    for step in LockStep::ORDER {
        let data = match step {
            LockStep::Dynamic => DYNAMIC_LOCK_BITS,
            LockStep::Static => STATIC_LOCK_BITS,
        };
        plan.push(PlannedWrite {
            page: step.page(),
            data,
            stage: WriteStage::Locks(step),
        });
    }

    Ok(plan)
}

/// READ page 0 and return the raw answer
///
/// Length is not checked here; the caller decides what a short header means.
///
/// # Errors
/// `SessionError::Read` on channel failure
pub async fn read_header(channel: &mut dyn TagChannel) -> Result<Vec<u8>, SessionError> {
    channel
        .send(Command::Read { page: 0 })
        .await
        .map_err(SessionError::Read)
}

/// WRITE one page
///
/// # Errors
/// `SessionError::Write` naming the page on channel failure
pub async fn write_page(
    channel: &mut dyn TagChannel,
    write: &PlannedWrite,
) -> Result<(), SessionError> {
    tracing::debug!(page = write.page, stage = ?write.stage, "writing page");
    channel
        .send(write.command())
        .await
        .map(|_ack| ())
        .map_err(|source| SessionError::Write {
            page: write.page,
            source,
        })
}

/// Read the whole tag, four pages per command
///
/// The last READ starts at page 132 and rolls over past the end of
/// memory; the surplus is discarded.
///
/// # Errors
/// `SessionError::Read` on channel failure or a short answer
pub async fn read_dump(channel: &mut dyn TagChannel) -> Result<TagDump, SessionError> {
    let mut bytes = Vec::with_capacity(DUMP_SIZE + READ_RESPONSE_LEN);
    let mut page: PageAddress = 0;

    while page < TOTAL_PAGES {
        tracing::debug!(page, "reading pages");
        let data = channel
            .send(Command::Read { page })
            .await
            .map_err(SessionError::Read)?;
        if data.len() != READ_RESPONSE_LEN {
            return Err(SessionError::Read(ChannelError::Transport(format!(
                "short read at page {page}: {} bytes",
                data.len()
            ))));
        }
        bytes.extend_from_slice(&data);
        page += PAGES_PER_READ;
    }

    bytes.truncate(DUMP_SIZE);
    TagDump::from_bytes(bytes).map_err(|e| SessionError::Read(ChannelError::Transport(e.to_string())))
}
