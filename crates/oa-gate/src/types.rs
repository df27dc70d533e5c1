//! Core types for the gate
//!
//! - Authorization status and the derived phase
//! - Fork and branch names
//! - Results of gate operations
//! - Gate statistics

use crate::error::GateError;
use crate::state_machine::RecoveryAction;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default head branch, used when none is configured
pub const DEFAULT_HEAD_BRANCH: &str = "master";

/// Two verified preconditions plus the "recovery UI open" flag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthorizationStatus {
    /// Session oracle returned a user on the last committed check
    pub authenticated: bool,
    /// Fork oracle confirmed the head branch on the last committed check
    pub fork_valid: bool,
    /// Recovery UI is open for a pending edit-mode request
    pub authorizing: bool,
}

impl AuthorizationStatus {
    /// Both preconditions hold
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.authenticated && self.fork_valid
    }
}

/// Phase derived from `AuthorizationStatus`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatePhase {
    /// A precondition is missing and no request is pending
    Locked,
    /// A request is pending and the recovery UI is open
    Recovering,
    /// Both preconditions hold
    Unlocked,
}

impl fmt::Display for GatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locked => f.write_str("locked"),
            Self::Recovering => f.write_str("recovering"),
            Self::Unlocked => f.write_str("unlocked"),
        }
    }
}

/// Full name of a fork, `owner/repo`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ForkName(String);

impl ForkName {
    /// Parse a fork name. Surrounding whitespace is trimmed; empty names
    /// mean "no fork" and are rejected.
    pub fn new(name: impl AsRef<str>) -> Result<Self, InvalidForkName> {
        let trimmed = name.as_ref().trim();
        if trimmed.is_empty() {
            return Err(InvalidForkName);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Full name as stored
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Owner segment, if the name has one
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        self.0.split_once('/').map(|(owner, _)| owner)
    }

    /// Repository segment (whole name when unqualified)
    #[must_use]
    pub fn repo(&self) -> &str {
        self.0.split_once('/').map_or(self.0.as_str(), |(_, repo)| repo)
    }
}

impl fmt::Display for ForkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ForkName {
    type Error = InvalidForkName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ForkName> for String {
    fn from(value: ForkName) -> Self {
        value.0
    }
}

/// Empty fork name
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("fork name must not be empty")]
pub struct InvalidForkName;

/// Branch the fork must carry; edits commit to it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeadBranch(String);

impl HeadBranch {
    /// Wrap a branch name
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Branch name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for HeadBranch {
    fn default() -> Self {
        Self::new(DEFAULT_HEAD_BRANCH)
    }
}

impl fmt::Display for HeadBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity returned by the session oracle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Account login
    pub login: String,
}

impl UserIdentity {
    /// Create identity
    #[inline]
    #[must_use]
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
        }
    }
}

/// What `request_edit_mode` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditModeDecision {
    /// Preconditions held; `enter_edit_mode` was invoked
    Entered,
    /// Recovery UI is open showing this action
    Recovering(RecoveryAction),
}

/// Result of a recovery action invoked from the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Action succeeded and the gate unlocked into edit mode
    Unlocked,
    /// Action succeeded but a precondition is still missing
    Pending(Option<RecoveryAction>),
    /// Action failed; status is unchanged and the prompt is re-offered
    Failed(GateError),
    /// Action no longer matches the pending precondition
    Ignored,
}

impl ActionOutcome {
    /// Whether the action itself succeeded
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Unlocked | Self::Pending(_))
    }
}

/// Gate counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GateStats {
    /// Auth checks started
    pub checks_issued: u64,
    /// Auth checks whose results were applied
    pub checks_committed: u64,
    /// Auth checks dropped because a newer one already committed
    pub stale_checks_discarded: u64,
    /// Times the gate entered edit mode
    pub edit_mode_entries: u64,
    /// Recovery actions that failed
    pub action_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fork_name_trims_and_splits() {
        let fork = ForkName::new("  alice/site-fork ").unwrap();
        assert_eq!(fork.as_str(), "alice/site-fork");
        assert_eq!(fork.owner(), Some("alice"));
        assert_eq!(fork.repo(), "site-fork");
    }

    #[test]
    fn fork_name_rejects_empty() {
        assert_eq!(ForkName::new(""), Err(InvalidForkName));
        assert_eq!(ForkName::new("   "), Err(InvalidForkName));
    }

    #[test]
    fn fork_name_without_owner() {
        let fork = ForkName::new("site").unwrap();
        assert_eq!(fork.owner(), None);
        assert_eq!(fork.repo(), "site");
    }

    #[test]
    fn fork_name_serde() {
        let fork: ForkName = serde_json::from_str("\"alice/site\"").unwrap();
        assert_eq!(fork.as_str(), "alice/site");
        assert!(serde_json::from_str::<ForkName>("\"\"").is_err());
    }

    #[test]
    fn status_complete() {
        let mut status = AuthorizationStatus::default();
        assert!(!status.is_complete());
        status.authenticated = true;
        status.fork_valid = true;
        assert!(status.is_complete());
    }

    #[test]
    fn default_head_branch() {
        assert_eq!(HeadBranch::default().as_str(), "master");
    }
}
