//! Gate state machine
//!
//! The gate has no state of its own beyond `AuthorizationStatus`; its phase
//! is derived from the three flags. `next_state` is evaluated after every
//! status mutation and decides whether to unlock or which precondition the
//! recovery prompt should show.

use crate::types::{AuthorizationStatus, GatePhase};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A step the user can take to resolve a missing precondition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecoveryAction {
    /// Sign in through the external auth flow
    Authenticate,
    /// Fork the source repository under the user's account
    CreateFork,
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authenticate => f.write_str("authenticate"),
            Self::CreateFork => f.write_str("create-fork"),
        }
    }
}

/// Outcome of evaluating a status snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// A pending request can be granted now
    pub should_unlock: bool,
    /// Prompt to show while recovering, if any
    pub next_recovery_action: Option<RecoveryAction>,
}

/// Evaluate a status snapshot.
///
/// Unlock only fires for a pending request (`authorizing`). The recovery
/// action is only offered while recovering and follows priority order.
#[must_use]
pub fn next_state(status: &AuthorizationStatus) -> Transition {
    if !status.authorizing {
        return Transition {
            should_unlock: false,
            next_recovery_action: None,
        };
    }

    match pending_precondition(status) {
        None => Transition {
            should_unlock: true,
            next_recovery_action: None,
        },
        Some(action) => Transition {
            should_unlock: false,
            next_recovery_action: Some(action),
        },
    }
}

/// First unresolved precondition: authentication before fork validity.
#[must_use]
pub fn pending_precondition(status: &AuthorizationStatus) -> Option<RecoveryAction> {
    if !status.authenticated {
        Some(RecoveryAction::Authenticate)
    } else if !status.fork_valid {
        Some(RecoveryAction::CreateFork)
    } else {
        None
    }
}

/// Phase a status snapshot is in
#[must_use]
pub fn phase(status: &AuthorizationStatus) -> GatePhase {
    if status.is_complete() {
        GatePhase::Unlocked
    } else if status.authorizing {
        GatePhase::Recovering
    } else {
        GatePhase::Locked
    }
}

/// Phases reachable in one status mutation
#[must_use]
pub fn allowed_transitions(from: GatePhase) -> Vec<GatePhase> {
    use GatePhase::{Locked, Recovering, Unlocked};
    match from {
        // request while incomplete, request while complete, or a recheck
        // that completes both flags before any request
        Locked => vec![Recovering, Unlocked],
        // a flag resolved (still incomplete), or auto-unlock
        Recovering => vec![Recovering, Unlocked],
        // a recheck invalidated a flag
        Unlocked => vec![Locked],
    }
}

/// Illegal phase change
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal gate transition: {from:?} -> {to:?}")]
pub struct IllegalTransition {
    /// Phase before the mutation
    pub from: GatePhase,
    /// Phase after the mutation
    pub to: GatePhase,
}

/// Validate a phase change. Staying in the same phase is always allowed.
pub fn validate_transition(from: GatePhase, to: GatePhase) -> Result<(), IllegalTransition> {
    if from == to || allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(IllegalTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(authenticated: bool, fork_valid: bool, authorizing: bool) -> AuthorizationStatus {
        AuthorizationStatus {
            authenticated,
            fork_valid,
            authorizing,
        }
    }

    #[test]
    fn idle_never_unlocks() {
        let t = next_state(&status(true, true, false));
        assert!(!t.should_unlock);
        assert_eq!(t.next_recovery_action, None);
    }

    #[test]
    fn authorizing_and_complete_unlocks() {
        let t = next_state(&status(true, true, true));
        assert!(t.should_unlock);
        assert_eq!(t.next_recovery_action, None);
    }

    #[test]
    fn authentication_has_priority() {
        let t = next_state(&status(false, false, true));
        assert_eq!(t.next_recovery_action, Some(RecoveryAction::Authenticate));
        let t = next_state(&status(false, true, true));
        assert_eq!(t.next_recovery_action, Some(RecoveryAction::Authenticate));
    }

    #[test]
    fn fork_after_authentication() {
        let t = next_state(&status(true, false, true));
        assert!(!t.should_unlock);
        assert_eq!(t.next_recovery_action, Some(RecoveryAction::CreateFork));
    }

    #[test]
    fn phases() {
        assert_eq!(phase(&status(false, false, false)), GatePhase::Locked);
        assert_eq!(phase(&status(true, false, true)), GatePhase::Recovering);
        assert_eq!(phase(&status(true, true, false)), GatePhase::Unlocked);
    }

    #[test]
    fn unlocked_cannot_jump_to_recovering() {
        assert!(validate_transition(GatePhase::Unlocked, GatePhase::Recovering).is_err());
        assert!(validate_transition(GatePhase::Unlocked, GatePhase::Locked).is_ok());
        assert!(validate_transition(GatePhase::Recovering, GatePhase::Locked).is_err());
    }
}
