//! Oracle call contract tests
//!
//! Mocked session and fork oracles check exactly what the gate asks.

use async_trait::async_trait;
use mockall::mock;
use oa_gate::prelude::*;
use oa_gate::{
    CollaboratorError, ForkOracle, ForkRegistry, MemoryForkRegistry, SessionOracle, UserIdentity,
};
use oa_test_utils::{
    CountingEditMode, FakeAuthenticator, FakeForkCreator, FakeForkHost, FakeSession, RecordingUi,
};
use std::sync::Arc;

mock! {
    pub Session {}

    #[async_trait]
    impl SessionOracle for Session {
        async fn current_user(&self) -> Result<Option<UserIdentity>, CollaboratorError>;
    }
}

mock! {
    pub Forks {}

    #[async_trait]
    impl ForkOracle for Forks {
        async fn branch_exists(&self, fork: &str, branch: &str) -> Result<bool, CollaboratorError>;
    }
}

fn gate_with(
    session: MockSession,
    forks: MockForks,
    registry: Arc<MemoryForkRegistry>,
    config: GateConfig,
) -> AuthorizationGate {
    let fake_session = Arc::new(FakeSession::default());
    let fake_host = Arc::new(FakeForkHost::default());

    let collaborators = Collaborators {
        session: Arc::new(session),
        forks: Arc::new(forks),
        registry,
        authenticator: Arc::new(FakeAuthenticator::new(fake_session, "alice")),
        fork_creator: Arc::new(FakeForkCreator::new(fake_host, "alice/site-fork", "content")),
        ui: Arc::new(RecordingUi::default()),
        edit_mode: Arc::new(CountingEditMode::default()),
    };

    AuthorizationGate::new(collaborators, config)
}

#[tokio::test]
async fn test_fork_oracle_gets_registered_fork_and_head_branch() {
    let mut session = MockSession::new();
    session
        .expect_current_user()
        .times(1)
        .returning(|| Ok(Some(UserIdentity::new("alice"))));

    let mut forks = MockForks::new();
    forks
        .expect_branch_exists()
        .times(1)
        .returning(|fork, branch| Ok(fork == "alice/site-fork" && branch == "content"));

    let registry = Arc::new(MemoryForkRegistry::new());
    registry
        .set_fork_name(&ForkName::new("alice/site-fork").unwrap())
        .unwrap();

    let gate = gate_with(
        session,
        forks,
        registry,
        GateConfig::new().with_head_branch("content"),
    );

    let status = gate.update_auth_checks().await;

    assert!(status.authenticated);
    assert!(status.fork_valid);
}

#[tokio::test]
async fn test_failing_session_oracle_absorbed() {
    let mut session = MockSession::new();
    session
        .expect_current_user()
        .times(1)
        .returning(|| Err(CollaboratorError::Unauthorized));

    let mut forks = MockForks::new();
    forks.expect_branch_exists().times(1).returning(|_, _| Ok(false));

    let gate = gate_with(
        session,
        forks,
        Arc::new(MemoryForkRegistry::new()),
        GateConfig::new(),
    );

    let status = gate.update_auth_checks().await;

    assert_eq!(status, AuthorizationStatus::default());
    assert_eq!(
        gate.request_edit_mode(),
        EditModeDecision::Recovering(RecoveryAction::Authenticate)
    );
}
