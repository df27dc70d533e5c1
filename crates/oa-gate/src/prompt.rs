//! Recovery prompt content
//!
//! One prompt per unresolved precondition. The gate builds the prompt; the
//! UI only renders it and reports which action the user confirmed.

use crate::error::GateError;
use crate::state_machine::RecoveryAction;
use crate::types::{ForkName, HeadBranch};

/// Action offered by a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptAction {
    /// Button label
    pub name: String,
    /// What confirming it does
    pub action: RecoveryAction,
}

/// Title, message and actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContent {
    /// Short heading
    pub title: String,
    /// Explanation shown to the user
    pub message: String,
    /// Offered actions
    pub actions: Vec<PromptAction>,
}

/// Prompt for the first unresolved precondition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryPrompt {
    /// User must sign in
    Authenticate(PromptContent),
    /// User must create (or re-create) a fork
    CreateFork(PromptContent),
}

/// Inputs for wording a prompt
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    /// Fork currently registered, if any
    pub fork: Option<&'a ForkName>,
    /// Required head branch
    pub head_branch: &'a HeadBranch,
    /// Failure of the previous attempt, if it targeted this prompt
    pub last_failure: Option<&'a GateError>,
}

impl RecoveryPrompt {
    /// Build the prompt for `action`
    #[must_use]
    pub fn for_action(action: RecoveryAction, ctx: &PromptContext<'_>) -> Self {
        let retry = ctx
            .last_failure
            .filter(|failure| failure.precondition() == Some(action));

        match action {
            RecoveryAction::Authenticate => {
                let mut message =
                    "Sign in with GitHub to edit this site. Your changes are saved to your own fork."
                        .to_string();
                append_retry(&mut message, retry);
                Self::Authenticate(PromptContent {
                    title: "Sign in required".to_string(),
                    message,
                    actions: vec![PromptAction {
                        name: "Sign in".to_string(),
                        action,
                    }],
                })
            }
            RecoveryAction::CreateFork => {
                let mut message = match ctx.fork {
                    Some(fork) => format!(
                        "The fork {fork} does not have a {} branch yet. New forks can take a moment to appear; try again, or create a new fork.",
                        ctx.head_branch
                    ),
                    None => "Edits are committed to a fork of this repository under your account. Create one to continue.".to_string(),
                };
                append_retry(&mut message, retry);
                Self::CreateFork(PromptContent {
                    title: "Fork required".to_string(),
                    message,
                    actions: vec![PromptAction {
                        name: "Create fork".to_string(),
                        action,
                    }],
                })
            }
        }
    }

    /// Precondition this prompt resolves
    #[inline]
    #[must_use]
    pub fn action(&self) -> RecoveryAction {
        match self {
            Self::Authenticate(_) => RecoveryAction::Authenticate,
            Self::CreateFork(_) => RecoveryAction::CreateFork,
        }
    }

    /// Prompt content
    #[inline]
    #[must_use]
    pub fn content(&self) -> &PromptContent {
        match self {
            Self::Authenticate(content) | Self::CreateFork(content) => content,
        }
    }

    /// Heading
    #[inline]
    #[must_use]
    pub fn title(&self) -> &str {
        &self.content().title
    }

    /// Explanation
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.content().message
    }

    /// Offered actions
    #[inline]
    #[must_use]
    pub fn actions(&self) -> &[PromptAction] {
        &self.content().actions
    }
}

fn append_retry(message: &mut String, failure: Option<&GateError>) {
    if let Some(failure) = failure {
        message.push_str(" The last attempt failed (");
        message.push_str(&failure.to_string());
        message.push_str("); please try again.");
    }
}
