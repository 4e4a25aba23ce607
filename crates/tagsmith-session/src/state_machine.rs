//! Tag session state graph
//!
//! One attempt walks `Idle -> Active -> Detected -> Connecting -> Connected
//! -> ValidatingSize -> Patching -> WritingUser -> WritingSecurity ->
//! WritingLocks -> Completed`. `Aborted` is reachable from every
//! non-terminal state and both terminal states fall back to `Idle`.

use crate::error::StateMachineError;
use tagsmith_layout::layout::{
    CAPABILITY_CONTAINER_PAGE, CONFIG0_PAGE, CONFIG1_PAGE, DYNAMIC_LOCK_PAGE, PACK_PAGE,
    PASSWORD_PAGE, STATIC_LOCK_PAGE, USER_MEMORY_FIRST, USER_WRITE_LAST,
};
use tagsmith_layout::PageAddress;

/// Security pages, in write order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityStep {
    /// PWD
    Password,
    /// PACK
    Pack,
    /// Capability container
    CapabilityContainer,
    /// CFG0
    Config0,
    /// CFG1
    Config1,
}

impl SecurityStep {
    /// All steps in write order
    pub const ORDER: [Self; 5] = [
        Self::Password,
        Self::Pack,
        Self::CapabilityContainer,
        Self::Config0,
        Self::Config1,
    ];

    /// Target page
    #[must_use]
    pub fn page(self) -> PageAddress {
        match self {
            Self::Password => PASSWORD_PAGE,
            Self::Pack => PACK_PAGE,
            Self::CapabilityContainer => CAPABILITY_CONTAINER_PAGE,
            Self::Config0 => CONFIG0_PAGE,
            Self::Config1 => CONFIG1_PAGE,
        }
    }

    /// Following step, `None` after CFG1
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Password => Some(Self::Pack),
            Self::Pack => Some(Self::CapabilityContainer),
            Self::CapabilityContainer => Some(Self::Config0),
            Self::Config0 => Some(Self::Config1),
            Self::Config1 => None,
        }
    }
}

/// Lock pages, in write order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockStep {
    /// Dynamic lock bits
    Dynamic,
    /// Static lock bits
    Static,
}

impl LockStep {
    /// All steps in write order
    pub const ORDER: [Self; 2] = [Self::Dynamic, Self::Static];

    /// Target page
    #[must_use]
    pub fn page(self) -> PageAddress {
        match self {
            Self::Dynamic => DYNAMIC_LOCK_PAGE,
            Self::Static => STATIC_LOCK_PAGE,
        }
    }
}

/// Session states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No attempt running
    Idle,
    /// Reader polling for tags
    Active,
    /// Tag in the field
    Detected,
    /// Connect issued
    Connecting,
    /// Connected, header not yet read
    Connected,
    /// Classifying the tag from its capability container
    ValidatingSize,
    /// Writing the tag UID into the plain image and re-encoding
    Patching,
    /// Writing a user page
    WritingUser(PageAddress),
    /// Writing a security page
    WritingSecurity(SecurityStep),
    /// Writing a lock page
    WritingLocks(LockStep),
    /// Reading the whole tag instead of writing it
    ReadingDump,
    /// Attempt finished
    Completed,
    /// Attempt failed
    Aborted,
}

impl SessionState {
    /// Whether the attempt is over
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }

    /// Whether a page write is in flight
    #[inline]
    #[must_use]
    pub fn is_writing(self) -> bool {
        matches!(
            self,
            Self::WritingUser(_) | Self::WritingSecurity(_) | Self::WritingLocks(_)
        )
    }
}

/// Validates a state transition.
///
/// # Errors
/// `StateMachineError::IllegalTransition` when `to` is not a successor of `from`
pub fn validate_transition(from: SessionState, to: SessionState) -> Result<(), StateMachineError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(StateMachineError::IllegalTransition { from, to })
    }
}

/// Every state reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: SessionState) -> Vec<SessionState> {
    use SessionState::*;
    match from {
        Idle => vec![Active],
        Active => vec![Detected, Idle, Aborted],
        Detected => vec![Connecting, Active, Aborted],
        Connecting => vec![Connected, Aborted],
        Connected => vec![ValidatingSize, ReadingDump, Aborted],
        ValidatingSize => vec![Patching, Aborted],
        Patching => vec![WritingUser(USER_MEMORY_FIRST), Aborted],
        WritingUser(page) if page < USER_WRITE_LAST => vec![WritingUser(page + 1), Aborted],
        WritingUser(_) => vec![WritingSecurity(SecurityStep::Password), Aborted],
        WritingSecurity(step) => match step.next() {
            Some(next) => vec![WritingSecurity(next), Aborted],
            None => vec![WritingLocks(LockStep::Dynamic), Aborted],
        },
        WritingLocks(LockStep::Dynamic) => vec![WritingLocks(LockStep::Static), Aborted],
        WritingLocks(LockStep::Static) => vec![Completed, Aborted],
        ReadingDump => vec![Completed, Aborted],
        Completed | Aborted => vec![Idle],
    }
}

/// Current state of one attempt, advanced only along legal edges
#[derive(Debug)]
pub struct StateTracker {
    current: SessionState,
    history: Vec<SessionState>,
}

impl StateTracker {
    /// Start in `Idle`
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: SessionState::Idle,
            history: vec![SessionState::Idle],
        }
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn current(&self) -> SessionState {
        self.current
    }

    /// Every state visited, oldest first
    #[inline]
    #[must_use]
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    /// Move to `to`
    ///
    /// # Errors
    /// Rejects transitions outside the session graph
    pub fn advance(&mut self, to: SessionState) -> Result<(), StateMachineError> {
        validate_transition(self.current, to)?;
        tracing::trace!(from = ?self.current, ?to, "session transition");
        self.current = to;
        self.history.push(to);
        if to.is_terminal() {
            tracing::debug!(state = ?to, steps = self.history.len(), "attempt finished");
        }
        Ok(())
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_pages_chain_into_security() {
        assert!(validate_transition(SessionState::WritingUser(4), SessionState::WritingUser(5)).is_ok());
        assert!(validate_transition(SessionState::WritingUser(4), SessionState::WritingUser(6)).is_err());
        assert!(validate_transition(
            SessionState::WritingUser(128),
            SessionState::WritingSecurity(SecurityStep::Password)
        )
        .is_ok());
        assert!(validate_transition(SessionState::WritingUser(128), SessionState::WritingUser(129)).is_err());
    }

    #[test]
    fn locks_only_after_config1() {
        assert!(validate_transition(
            SessionState::WritingSecurity(SecurityStep::Config0),
            SessionState::WritingLocks(LockStep::Dynamic)
        )
        .is_err());
        assert!(validate_transition(
            SessionState::WritingSecurity(SecurityStep::Config1),
            SessionState::WritingLocks(LockStep::Dynamic)
        )
        .is_ok());
        assert!(validate_transition(
            SessionState::WritingLocks(LockStep::Dynamic),
            SessionState::Completed
        )
        .is_err());
    }

    #[test]
    fn tracker_records_history() {
        let mut tracker = StateTracker::new();
        tracker.advance(SessionState::Active).unwrap();
        tracker.advance(SessionState::Detected).unwrap();
        tracker.advance(SessionState::Active).unwrap();

        let err = tracker.advance(SessionState::Patching).unwrap_err();
        assert_eq!(
            err,
            StateMachineError::IllegalTransition {
                from: SessionState::Active,
                to: SessionState::Patching
            }
        );
        assert_eq!(tracker.current(), SessionState::Active);
        assert_eq!(tracker.history().len(), 4);
    }

    #[test]
    fn security_order() {
        let pages: Vec<_> = SecurityStep::ORDER.iter().map(|s| s.page()).collect();
        assert_eq!(pages, vec![133, 134, 3, 131, 132]);
        let locks: Vec<_> = LockStep::ORDER.iter().map(|s| s.page()).collect();
        assert_eq!(locks, vec![130, 2]);
    }
}
