//! Error types for the Open Authoring Gate
//!
//! Three families:
//! - `GateError`: why a precondition is still unsatisfied (absorbed by the gate)
//! - `CollaboratorError`: what an external collaborator reported
//! - `ConfigError`: configuration loading and validation

use crate::state_machine::RecoveryAction;
use std::path::PathBuf;

/// Reason a gate precondition is not (yet) satisfied.
///
/// The gate never returns these as `Err`; they are logged, kept as the
/// last failure and turned into "precondition still false".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// Session oracle returned no user
    #[error("no authenticated user")]
    AuthUnresolved,

    /// Fork missing or head branch not found on it
    #[error("fork {} has no branch {branch}", .fork.as_deref().unwrap_or("<unset>"))]
    ForkInvalid {
        /// Registered fork name, if any
        fork: Option<String>,
        /// Required head branch
        branch: String,
    },

    /// Authenticate or create-fork action rejected
    #[error("{action} action failed: {source}")]
    ActionFailed {
        /// Which recovery action failed
        action: RecoveryAction,
        /// Collaborator failure
        #[source]
        source: CollaboratorError,
    },

    /// Oracle call exceeded its time budget
    #[error("{operation} timed out after {duration_ms}ms")]
    Timeout {
        /// Operation that timed out
        operation: &'static str,
        /// Budget in milliseconds
        duration_ms: u64,
    },
}

impl GateError {
    /// Whether another user-driven attempt may succeed.
    ///
    /// Every gate failure is user-recoverable except a fork creator that
    /// refuses outright because the user lacks access.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::ActionFailed {
                action: RecoveryAction::CreateFork,
                source: CollaboratorError::Unauthorized,
            }
        )
    }

    /// The precondition this failure leaves unresolved, when known.
    #[inline]
    #[must_use]
    pub fn precondition(&self) -> Option<RecoveryAction> {
        match self {
            Self::AuthUnresolved => Some(RecoveryAction::Authenticate),
            Self::ForkInvalid { .. } => Some(RecoveryAction::CreateFork),
            Self::ActionFailed { action, .. } => Some(*action),
            Self::Timeout { .. } => None,
        }
    }
}

/// Failure reported by an external collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    /// Transport-level failure
    #[error("network error: {0}")]
    Network(String),

    /// Credentials missing or refused
    #[error("unauthorized")]
    Unauthorized,

    /// User or service declined the request
    #[error("rejected: {0}")]
    Rejected(String),

    /// No answer within the action budget (milliseconds)
    #[error("timed out after {0}ms")]
    TimedOut(u64),

    /// Persisting or loading local state failed
    #[error("storage error: {0}")]
    Storage(String),

    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for CollaboratorError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for CollaboratorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config text is not valid TOML for `GateConfig`
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Parsed but semantically invalid
    #[error("invalid config: {0}")]
    Invalid(String),
}
