//! Testing utilities for the Open Authoring workspace
//!
//! Fakes for every gate collaborator plus a harness that wires them to a
//! gate. The fakes share state the way the real services do: a successful
//! authenticate signs the fake session in, a created fork appears on the
//! fake fork host.

#![allow(missing_docs)]

use async_trait::async_trait;
use oa_gate::{
    AuthorizationGate, Authenticator, CollaboratorError, Collaborators, EditModeHandler,
    ForkCreator, ForkName, ForkOracle, ForkRegistry, GateConfig, MemoryForkRegistry, RecoveryPrompt,
    RecoveryUi, SessionOracle, UserIdentity,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Session oracle backed by a settable user
#[derive(Debug, Default)]
pub struct FakeSession {
    user: Mutex<Option<UserIdentity>>,
    failure: Mutex<Option<CollaboratorError>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl FakeSession {
    pub fn sign_in(&self, login: &str) {
        *self.user.lock() = Some(UserIdentity::new(login));
    }

    pub fn sign_out(&self) {
        *self.user.lock() = None;
    }

    pub fn fail_with(&self, err: CollaboratorError) {
        *self.failure.lock() = Some(err);
    }

    pub fn recover(&self) {
        *self.failure.lock() = None;
    }

    /// Delay before answering; the answer is captured when the call starts
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionOracle for FakeSession {
    async fn current_user(&self) -> Result<Option<UserIdentity>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failure = self.failure.lock().clone();
        let answer = match failure {
            Some(err) => Err(err),
            None => Ok(self.user.lock().clone()),
        };
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        answer
    }
}

/// Fork oracle backed by a map of fork name to branches
#[derive(Debug, Default)]
pub struct FakeForkHost {
    forks: Mutex<HashMap<String, HashSet<String>>>,
    failure: Mutex<Option<CollaboratorError>>,
    delay: Mutex<Option<Duration>>,
    queries: Mutex<Vec<(String, String)>>,
}

impl FakeForkHost {
    pub fn add_fork(&self, fork: &str, branch: &str) {
        self.forks
            .lock()
            .entry(fork.to_string())
            .or_default()
            .insert(branch.to_string());
    }

    pub fn delete_fork(&self, fork: &str) {
        self.forks.lock().remove(fork);
    }

    pub fn fail_with(&self, err: CollaboratorError) {
        *self.failure.lock() = Some(err);
    }

    pub fn recover(&self) {
        *self.failure.lock() = None;
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    /// Every `(fork, branch)` pair queried, in order
    pub fn queries(&self) -> Vec<(String, String)> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl ForkOracle for FakeForkHost {
    async fn branch_exists(&self, fork: &str, branch: &str) -> Result<bool, CollaboratorError> {
        self.queries
            .lock()
            .push((fork.to_string(), branch.to_string()));
        let failure = self.failure.lock().clone();
        let answer = match failure {
            Some(err) => Err(err),
            None => Ok(self
                .forks
                .lock()
                .get(fork)
                .is_some_and(|branches| branches.contains(branch))),
        };
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        answer
    }
}

/// Authenticator that signs a `FakeSession` in
#[derive(Debug)]
pub struct FakeAuthenticator {
    session: Arc<FakeSession>,
    login: String,
    failures_remaining: AtomicUsize,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl FakeAuthenticator {
    pub fn new(session: Arc<FakeSession>, login: &str) -> Self {
        Self {
            session,
            login: login.to_string(),
            failures_remaining: AtomicUsize::new(0),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Reject the next `n` attempts
    pub fn fail_next(&self, n: usize) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Sign-in flow that takes this long before completing
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authenticator for FakeAuthenticator {
    async fn authenticate(&self) -> Result<(), CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(CollaboratorError::Rejected("sign-in window closed".into()));
        }
        self.session.sign_in(&self.login);
        Ok(())
    }
}

/// Fork creator that adds a fork to a `FakeForkHost`
#[derive(Debug)]
pub struct FakeForkCreator {
    host: Arc<FakeForkHost>,
    full_name: String,
    branch: String,
    failures_remaining: AtomicUsize,
    hidden: AtomicBool,
    calls: AtomicUsize,
}

impl FakeForkCreator {
    pub fn new(host: Arc<FakeForkHost>, full_name: &str, branch: &str) -> Self {
        Self {
            host,
            full_name: full_name.to_string(),
            branch: branch.to_string(),
            failures_remaining: AtomicUsize::new(0),
            hidden: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Reject the next `n` attempts
    pub fn fail_next(&self, n: usize) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// New forks do not show up on the host (propagation delay)
    pub fn hide_new_forks(&self, hidden: bool) {
        self.hidden.store(hidden, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ForkCreator for FakeForkCreator {
    async fn create_fork(&self) -> Result<ForkName, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(CollaboratorError::Network("connection reset".into()));
        }
        if !self.hidden.load(Ordering::SeqCst) {
            self.host.add_fork(&self.full_name, &self.branch);
        }
        ForkName::new(&self.full_name).map_err(|err| CollaboratorError::Other(err.to_string()))
    }
}

/// In-memory fork registry whose writes can be made to fail
#[derive(Debug, Default)]
pub struct FakeForkRegistry {
    inner: MemoryForkRegistry,
    write_failure: Mutex<Option<CollaboratorError>>,
    writes: AtomicUsize,
}

impl FakeForkRegistry {
    /// Fail every write with `err` until cleared with `None`
    pub fn fail_writes_with(&self, err: Option<CollaboratorError>) {
        *self.write_failure.lock() = err;
    }

    /// Successful writes
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl ForkRegistry for FakeForkRegistry {
    fn fork_name(&self) -> Option<ForkName> {
        self.inner.fork_name()
    }

    fn set_fork_name(&self, fork: &ForkName) -> Result<(), CollaboratorError> {
        let failure = self.write_failure.lock().clone();
        if let Some(err) = failure {
            return Err(err);
        }
        self.inner.set_fork_name(fork)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// What the UI was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Render(RecoveryPrompt),
    Dismiss,
}

/// Recovery UI that records calls
#[derive(Debug, Default)]
pub struct RecordingUi {
    events: Mutex<Vec<UiEvent>>,
}

impl RecordingUi {
    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().clone()
    }

    /// Prompt on screen: the last render not followed by a dismiss
    pub fn visible_prompt(&self) -> Option<RecoveryPrompt> {
        match self.events.lock().last() {
            Some(UiEvent::Render(prompt)) => Some(prompt.clone()),
            _ => None,
        }
    }

    pub fn render_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, UiEvent::Render(_)))
            .count()
    }

    pub fn dismiss_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, UiEvent::Dismiss))
            .count()
    }
}

impl RecoveryUi for RecordingUi {
    fn render(&self, prompt: &RecoveryPrompt) {
        self.events.lock().push(UiEvent::Render(prompt.clone()));
    }

    fn dismiss(&self) {
        self.events.lock().push(UiEvent::Dismiss);
    }
}

/// Edit mode callbacks that count invocations
#[derive(Debug, Default)]
pub struct CountingEditMode {
    entered: AtomicUsize,
    exited: AtomicUsize,
}

impl CountingEditMode {
    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    pub fn exited(&self) -> usize {
        self.exited.load(Ordering::SeqCst)
    }
}

impl EditModeHandler for CountingEditMode {
    fn enter_edit_mode(&self) {
        self.entered.fetch_add(1, Ordering::SeqCst);
    }

    fn exit_edit_mode(&self) {
        self.exited.fetch_add(1, Ordering::SeqCst);
    }
}

pub const TEST_LOGIN: &str = "alice";
pub const TEST_FORK: &str = "alice/site-fork";

/// Gate wired to fakes
#[derive(Debug)]
pub struct TestHarness {
    pub session: Arc<FakeSession>,
    pub host: Arc<FakeForkHost>,
    pub authenticator: Arc<FakeAuthenticator>,
    pub fork_creator: Arc<FakeForkCreator>,
    pub registry: Arc<FakeForkRegistry>,
    pub ui: Arc<RecordingUi>,
    pub edit_mode: Arc<CountingEditMode>,
    pub gate: AuthorizationGate,
}

impl TestHarness {
    /// Signed out, no fork registered, default config
    pub fn new() -> Self {
        Self::with_config(GateConfig::new())
    }

    pub fn with_config(config: GateConfig) -> Self {
        let session = Arc::new(FakeSession::default());
        let host = Arc::new(FakeForkHost::default());
        let authenticator = Arc::new(FakeAuthenticator::new(Arc::clone(&session), TEST_LOGIN));
        let fork_creator = Arc::new(FakeForkCreator::new(
            Arc::clone(&host),
            TEST_FORK,
            &config.head_branch,
        ));
        let registry = Arc::new(FakeForkRegistry::default());
        let ui = Arc::new(RecordingUi::default());
        let edit_mode = Arc::new(CountingEditMode::default());

        let collaborators = Collaborators {
            session: session.clone(),
            forks: host.clone(),
            registry: registry.clone(),
            authenticator: authenticator.clone(),
            fork_creator: fork_creator.clone(),
            ui: ui.clone(),
            edit_mode: edit_mode.clone(),
        };

        Self {
            gate: AuthorizationGate::new(collaborators, config),
            session,
            host,
            authenticator,
            fork_creator,
            registry,
            ui,
            edit_mode,
        }
    }

    /// Sign in and register a fork that carries the head branch
    pub fn signed_in_with_fork(self) -> Self {
        self.session.sign_in(TEST_LOGIN);
        self.with_registered_fork(true)
    }

    /// Register `TEST_FORK`; `with_branch` controls whether the host has the
    /// head branch on it
    pub fn with_registered_fork(self, with_branch: bool) -> Self {
        let fork = ForkName::new(TEST_FORK).expect("valid fork name");
        self.registry
            .set_fork_name(&fork)
            .expect("registry accepts writes until told to fail");
        if with_branch {
            self.host
                .add_fork(TEST_FORK, &self.gate.config().head_branch);
        }
        self
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
