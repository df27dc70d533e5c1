//! Authorization Gate
//!
//! Owns the `AuthorizationStatus` record and is its only writer. Every
//! mutation happens under one lock and ends with `next_state`, which
//! decides whether a pending request unlocks or which recovery prompt is
//! shown. Collaborator side effects run after the lock is released.

use crate::collaborators::Collaborators;
use crate::config::GateConfig;
use crate::error::{CollaboratorError, GateError};
use crate::prompt::{PromptContext, RecoveryPrompt};
use crate::state_machine::{self, RecoveryAction};
use crate::types::{
    ActionOutcome, AuthorizationStatus, EditModeDecision, ForkName, GatePhase, GateStats,
    HeadBranch, UserIdentity,
};
use parking_lot::{Mutex, ReentrantMutex};
use std::cell::Cell;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Gates edit mode behind authentication and a valid fork.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct AuthorizationGate {
    inner: Arc<Inner>,
}

struct Inner {
    collaborators: Collaborators,
    config: GateConfig,
    head_branch: HeadBranch,
    state: Mutex<GateState>,
    /// Epoch of the last UI effect applied; older effects are skipped.
    /// Reentrant so a UI callback may call back into the gate.
    ui_epoch: ReentrantMutex<Cell<u64>>,
    status_tx: watch::Sender<AuthorizationStatus>,
}

#[derive(Debug, Default)]
struct GateState {
    status: AuthorizationStatus,
    next_ticket: u64,
    committed_ticket: u64,
    effect_epoch: u64,
    prompt: Option<RecoveryPrompt>,
    last_failure: Option<GateError>,
    stats: GateStats,
}

/// Side effect decided under the state lock, applied after it
#[derive(Debug)]
enum Effect {
    None,
    Enter,
    Render { epoch: u64, prompt: RecoveryPrompt },
    Unlock { epoch: u64 },
}

impl AuthorizationGate {
    /// Create a gate in the Locked state. Performs no I/O.
    #[must_use]
    pub fn new(collaborators: Collaborators, config: GateConfig) -> Self {
        let (status_tx, _) = watch::channel(AuthorizationStatus::default());
        Self {
            inner: Arc::new(Inner {
                head_branch: config.head_branch(),
                collaborators,
                config,
                state: Mutex::new(GateState::default()),
                ui_epoch: ReentrantMutex::new(Cell::new(0)),
                status_tx,
            }),
        }
    }

    /// Run the initial auth check in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn activate(&self) -> JoinHandle<AuthorizationStatus> {
        let gate = self.clone();
        tokio::spawn(async move { gate.update_auth_checks().await })
    }

    /// Query the session and fork oracles concurrently and commit both
    /// flags together.
    ///
    /// Oracle errors and timeouts count as "not satisfied". If a newer
    /// check already committed, this result is discarded.
    pub async fn update_auth_checks(&self) -> AuthorizationStatus {
        let ticket = {
            let mut state = self.inner.state.lock();
            state.next_ticket += 1;
            state.stats.checks_issued += 1;
            state.next_ticket
        };

        let fork = self.inner.collaborators.registry.fork_name();
        tracing::debug!(ticket, fork = ?fork, "running auth checks");

        let (session, fork_check) =
            tokio::join!(self.check_session(), self.check_fork(fork.as_ref()));

        self.commit_checks(ticket, &session, &fork_check)
    }

    /// Enter edit mode now if both preconditions hold, otherwise open the
    /// recovery prompt. Never blocks.
    pub fn request_edit_mode(&self) -> EditModeDecision {
        let fork = self.inner.collaborators.registry.fork_name();

        let (decision, effect) = {
            let mut state = self.inner.state.lock();
            match state_machine::pending_precondition(&state.status) {
                None => {
                    state.stats.edit_mode_entries += 1;
                    (EditModeDecision::Entered, Effect::Enter)
                }
                Some(action) => {
                    let before = state.status;
                    state.status.authorizing = true;
                    let effect = self.settle(&mut state, before, fork.as_ref());
                    (EditModeDecision::Recovering(action), effect)
                }
            }
        };

        tracing::debug!(?decision, "edit mode requested");
        self.apply(effect);
        decision
    }

    /// Leave edit mode. Not gated.
    pub fn exit_edit_mode(&self) {
        tracing::debug!("exiting edit mode");
        self.inner.collaborators.edit_mode.exit_edit_mode();
    }

    /// Run a recovery action confirmed in the prompt.
    ///
    /// Ignored unless the gate is recovering and `action` is the pending
    /// precondition. On failure the status is left unchanged and the same
    /// prompt is rendered again.
    pub async fn run_action(&self, action: RecoveryAction) -> ActionOutcome {
        let pending = {
            let state = self.inner.state.lock();
            if state.status.authorizing {
                state_machine::pending_precondition(&state.status)
            } else {
                None
            }
        };

        if pending != Some(action) {
            tracing::debug!(%action, ?pending, "ignoring stale recovery action");
            return ActionOutcome::Ignored;
        }

        self.perform(action).await
    }

    /// Run the authentication flow and re-check, whatever the gate state.
    ///
    /// Reports `Unlocked` only if this re-check performed the unlock.
    pub async fn authenticate(&self) -> ActionOutcome {
        self.perform(RecoveryAction::Authenticate).await
    }

    /// Status snapshot
    #[must_use]
    pub fn status(&self) -> AuthorizationStatus {
        self.inner.state.lock().status
    }

    /// Derived phase
    #[must_use]
    pub fn phase(&self) -> GatePhase {
        state_machine::phase(&self.status())
    }

    /// Last committed authentication flag
    #[must_use]
    pub fn authenticated(&self) -> bool {
        self.status().authenticated
    }

    /// Last committed fork flag
    #[must_use]
    pub fn fork_valid(&self) -> bool {
        self.status().fork_valid
    }

    /// Prompt currently shown, if recovering
    #[must_use]
    pub fn current_prompt(&self) -> Option<RecoveryPrompt> {
        self.inner.state.lock().prompt.clone()
    }

    /// Most recent failed recovery action, cleared by the next success
    #[must_use]
    pub fn last_failure(&self) -> Option<GateError> {
        self.inner.state.lock().last_failure.clone()
    }

    /// Counters
    #[must_use]
    pub fn stats(&self) -> GateStats {
        self.inner.state.lock().stats
    }

    /// Receiver that observes every committed status change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthorizationStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Configuration
    #[must_use]
    pub fn config(&self) -> &GateConfig {
        &self.inner.config
    }

    async fn perform(&self, action: RecoveryAction) -> ActionOutcome {
        tracing::info!(%action, "running recovery action");

        let result = match action {
            RecoveryAction::Authenticate => self.run_authenticate().await,
            RecoveryAction::CreateFork => self.run_create_fork().await,
        };

        if let Err(err) = result {
            tracing::warn!(%action, error = %err, "recovery action failed");
            self.record_failure(err.clone());
            return ActionOutcome::Failed(err);
        }

        let entries_before = {
            let mut state = self.inner.state.lock();
            state.last_failure = None;
            state.stats.edit_mode_entries
        };

        let status = self.update_auth_checks().await;
        let unlocked = self.inner.state.lock().stats.edit_mode_entries > entries_before;
        if unlocked {
            ActionOutcome::Unlocked
        } else {
            ActionOutcome::Pending(state_machine::pending_precondition(&status))
        }
    }

    async fn run_authenticate(&self) -> Result<(), GateError> {
        self.bounded_action(
            RecoveryAction::Authenticate,
            self.inner.collaborators.authenticator.authenticate(),
        )
        .await
    }

    async fn run_create_fork(&self) -> Result<(), GateError> {
        let fork = self
            .bounded_action(
                RecoveryAction::CreateFork,
                self.inner.collaborators.fork_creator.create_fork(),
            )
            .await?;

        self.inner
            .collaborators
            .registry
            .set_fork_name(&fork)
            .map_err(|source| GateError::ActionFailed {
                action: RecoveryAction::CreateFork,
                source,
            })?;

        tracing::info!(%fork, "fork created and registered");
        Ok(())
    }

    /// Run an action under the action budget. Running out of time is a
    /// failure of that action, same as a rejection.
    async fn bounded_action<T>(
        &self,
        action: RecoveryAction,
        fut: impl Future<Output = Result<T, CollaboratorError>>,
    ) -> Result<T, GateError> {
        let budget = self.inner.config.action_timeout();
        tokio::time::timeout(budget, fut)
            .await
            .unwrap_or_else(|_| Err(CollaboratorError::TimedOut(millis(budget))))
            .map_err(|source| GateError::ActionFailed { action, source })
    }

    async fn check_session(&self) -> Result<UserIdentity, GateError> {
        let outcome = bounded(
            "current_user",
            self.inner.config.oracle_timeout(),
            self.inner.collaborators.session.current_user(),
        )
        .await;

        match outcome {
            Ok(Ok(Some(user))) => Ok(user),
            Ok(Ok(None)) => Err(GateError::AuthUnresolved),
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "session oracle failed");
                Err(GateError::AuthUnresolved)
            }
            Err(err) => {
                tracing::warn!(error = %err, "session oracle failed");
                Err(err)
            }
        }
    }

    async fn check_fork(&self, fork: Option<&ForkName>) -> Result<(), GateError> {
        let branch = self.inner.head_branch.as_str();
        let invalid = || GateError::ForkInvalid {
            fork: fork.map(ToString::to_string),
            branch: branch.to_string(),
        };

        let outcome = bounded(
            "branch_exists",
            self.inner.config.oracle_timeout(),
            self.inner
                .collaborators
                .forks
                .branch_exists(fork.map_or("", ForkName::as_str), branch),
        )
        .await;

        match outcome {
            // no registered fork is invalid whatever the oracle says
            Ok(Ok(true)) if fork.is_some() => Ok(()),
            Ok(Ok(_)) => Err(invalid()),
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "fork oracle failed");
                Err(invalid())
            }
            Err(err) => {
                tracing::warn!(error = %err, "fork oracle failed");
                Err(err)
            }
        }
    }

    fn commit_checks(
        &self,
        ticket: u64,
        session: &Result<UserIdentity, GateError>,
        fork_check: &Result<(), GateError>,
    ) -> AuthorizationStatus {
        let fork = self.inner.collaborators.registry.fork_name();

        let (status, effect) = {
            let mut state = self.inner.state.lock();
            if ticket < state.committed_ticket {
                state.stats.stale_checks_discarded += 1;
                tracing::debug!(
                    ticket,
                    committed = state.committed_ticket,
                    "discarding stale auth check"
                );
                return state.status;
            }

            state.committed_ticket = ticket;
            state.stats.checks_committed += 1;

            let before = state.status;
            state.status.authenticated = session.is_ok();
            state.status.fork_valid = fork_check.is_ok();

            let effect = self.settle(&mut state, before, fork.as_ref());
            (state.status, effect)
        };

        if let Ok(user) = session {
            tracing::debug!(user = %user.login, "session resolved");
        }
        self.apply(effect);
        status
    }

    fn record_failure(&self, err: GateError) {
        let fork = self.inner.collaborators.registry.fork_name();

        let effect = {
            let mut state = self.inner.state.lock();
            state.stats.action_failures += 1;
            state.last_failure = Some(err);
            let before = state.status;
            self.settle(&mut state, before, fork.as_ref())
        };

        self.apply(effect);
    }

    /// Re-evaluate after a mutation. Called with the state lock held.
    fn settle(
        &self,
        state: &mut GateState,
        before: AuthorizationStatus,
        fork: Option<&ForkName>,
    ) -> Effect {
        let transition = state_machine::next_state(&state.status);

        let effect = if transition.should_unlock {
            state.status.authorizing = false;
            state.prompt = None;
            state.stats.edit_mode_entries += 1;
            state.effect_epoch += 1;
            Effect::Unlock {
                epoch: state.effect_epoch,
            }
        } else if let Some(action) = transition.next_recovery_action {
            let prompt = RecoveryPrompt::for_action(
                action,
                &PromptContext {
                    fork,
                    head_branch: &self.inner.head_branch,
                    last_failure: state.last_failure.as_ref(),
                },
            );
            state.prompt = Some(prompt.clone());
            state.effect_epoch += 1;
            Effect::Render {
                epoch: state.effect_epoch,
                prompt,
            }
        } else {
            Effect::None
        };

        let (from, to) = (
            state_machine::phase(&before),
            state_machine::phase(&state.status),
        );
        if from != to {
            match state_machine::validate_transition(from, to) {
                Ok(()) => tracing::info!(%from, %to, "gate phase changed"),
                Err(err) => tracing::error!(error = %err, "unexpected gate transition"),
            }
        }

        let status = state.status;
        self.inner.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });

        effect
    }

    fn apply(&self, effect: Effect) {
        let collaborators = &self.inner.collaborators;
        match effect {
            Effect::None => {}
            Effect::Enter => {
                tracing::info!("entering edit mode");
                collaborators.edit_mode.enter_edit_mode();
            }
            Effect::Render { epoch, prompt } => {
                let applied = self.inner.ui_epoch.lock();
                if epoch > applied.get() {
                    applied.set(epoch);
                    collaborators.ui.render(&prompt);
                }
            }
            Effect::Unlock { epoch } => {
                {
                    let applied = self.inner.ui_epoch.lock();
                    if epoch > applied.get() {
                        applied.set(epoch);
                        collaborators.ui.dismiss();
                    }
                }
                tracing::info!("preconditions satisfied, entering edit mode");
                collaborators.edit_mode.enter_edit_mode();
            }
        }
    }
}

impl fmt::Debug for AuthorizationGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationGate")
            .field("config", &self.inner.config)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// Bound an oracle call by `budget`
async fn bounded<T>(
    operation: &'static str,
    budget: Duration,
    fut: impl Future<Output = T>,
) -> Result<T, GateError> {
    tokio::time::timeout(budget, fut)
        .await
        .map_err(|_| GateError::Timeout {
            operation,
            duration_ms: millis(budget),
        })
}

fn millis(budget: Duration) -> u64 {
    u64::try_from(budget.as_millis()).unwrap_or(u64::MAX)
}
