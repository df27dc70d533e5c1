//! Open Authoring Gate
//!
//! Decides whether a user may enter edit mode in an open-authoring
//! workflow, where edits are committed to the user's fork of the source
//! repository. Two preconditions are verified asynchronously:
//! - the user is authenticated
//! - the registered fork carries the head branch
//!
//! When either is missing, the gate drives a recovery prompt that resolves
//! them one at a time (authentication first) and enters edit mode on its
//! own once both hold.
//!
//! # Example
//!
//! ```rust,ignore
//! use oa_gate::{AuthorizationGate, Collaborators, EditModeDecision, GateConfig};
//!
//! # async fn example(collaborators: Collaborators) {
//! let gate = AuthorizationGate::new(collaborators, GateConfig::new());
//! gate.activate().await.ok();
//!
//! if let EditModeDecision::Recovering(action) = gate.request_edit_mode() {
//!     // the UI calls this when the user confirms the prompt
//!     gate.run_action(action).await;
//! }
//! # }
//! ```

#![warn(unreachable_pub)]

// Core modules
pub mod collaborators;
pub mod config;
pub mod error;
pub mod gate;
pub mod prompt;
pub mod registry;
pub mod state_machine;
pub mod types;

// Re-exports for convenience
pub use collaborators::{
    Authenticator, Collaborators, EditModeHandler, ForkCreator, ForkOracle, ForkRegistry,
    RecoveryUi, SessionOracle,
};
pub use config::GateConfig;
pub use error::{CollaboratorError, ConfigError, GateError};
pub use gate::AuthorizationGate;
pub use prompt::{PromptAction, PromptContent, PromptContext, RecoveryPrompt};
pub use registry::{FileForkRegistry, MemoryForkRegistry};
pub use state_machine::{next_state, RecoveryAction, Transition};
pub use types::{
    ActionOutcome, AuthorizationStatus, EditModeDecision, ForkName, GatePhase, GateStats,
    HeadBranch, InvalidForkName, UserIdentity, DEFAULT_HEAD_BRANCH,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for wiring a gate
    pub use crate::{
        ActionOutcome, AuthorizationGate, AuthorizationStatus, Collaborators, EditModeDecision,
        ForkName, GateConfig, RecoveryAction, RecoveryPrompt,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
