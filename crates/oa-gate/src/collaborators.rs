//! External collaborator contracts
//!
//! The gate owns none of these. Callers inject implementations through
//! [`Collaborators`]; there is no ambient client.

use crate::error::CollaboratorError;
use crate::prompt::RecoveryPrompt;
use crate::types::{ForkName, UserIdentity};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Answers "is there a currently authenticated user?"
#[async_trait]
pub trait SessionOracle: Send + Sync {
    /// Current user, `None` when signed out
    async fn current_user(&self) -> Result<Option<UserIdentity>, CollaboratorError>;
}

/// Answers "does this fork carry this branch?"
#[async_trait]
pub trait ForkOracle: Send + Sync {
    /// `fork` is empty when no fork is registered
    async fn branch_exists(&self, fork: &str, branch: &str) -> Result<bool, CollaboratorError>;
}

/// Remembers which fork the user edits, across restarts
pub trait ForkRegistry: Send + Sync {
    /// Stored fork name, if any
    fn fork_name(&self) -> Option<ForkName>;

    /// Replace the stored fork name
    fn set_fork_name(&self, name: &ForkName) -> Result<(), CollaboratorError>;
}

/// Runs the external sign-in flow
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Resolves when the flow completes
    async fn authenticate(&self) -> Result<(), CollaboratorError>;
}

/// Forks the source repository under the user's account
#[async_trait]
pub trait ForkCreator: Send + Sync {
    /// Full name of the new fork
    async fn create_fork(&self) -> Result<ForkName, CollaboratorError>;
}

/// Presentational surface for recovery prompts.
///
/// When the user confirms an action the UI calls
/// [`AuthorizationGate::run_action`](crate::AuthorizationGate::run_action).
pub trait RecoveryUi: Send + Sync {
    /// Show (or replace) the prompt
    fn render(&self, prompt: &RecoveryPrompt);

    /// Close the prompt
    fn dismiss(&self);
}

/// Caller-supplied edit mode callbacks
pub trait EditModeHandler: Send + Sync {
    /// Switch the view into edit mode
    fn enter_edit_mode(&self);

    /// Leave edit mode
    fn exit_edit_mode(&self);
}

/// Everything the gate talks to
#[derive(Clone)]
pub struct Collaborators {
    /// Session oracle
    pub session: Arc<dyn SessionOracle>,
    /// Fork oracle
    pub forks: Arc<dyn ForkOracle>,
    /// Fork registry
    pub registry: Arc<dyn ForkRegistry>,
    /// Authenticate action
    pub authenticator: Arc<dyn Authenticator>,
    /// Create-fork action
    pub fork_creator: Arc<dyn ForkCreator>,
    /// Recovery UI
    pub ui: Arc<dyn RecoveryUi>,
    /// Edit mode callbacks
    pub edit_mode: Arc<dyn EditModeHandler>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
