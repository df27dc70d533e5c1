//! Simulated GitHub and terminal collaborators

use async_trait::async_trait;
use oa_gate::{
    Authenticator, CollaboratorError, EditModeHandler, ForkCreator, ForkName, ForkOracle,
    RecoveryPrompt, RecoveryUi, SessionOracle, UserIdentity,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// Starting state of the simulated account
#[derive(Debug, Clone)]
pub(crate) struct SimSettings {
    pub(crate) login: String,
    pub(crate) signed_in: bool,
    pub(crate) existing_fork: Option<String>,
    pub(crate) fork_has_branch: bool,
    pub(crate) head_branch: String,
    pub(crate) failing_auth_attempts: u32,
    /// Branch checks a new fork stays invisible for
    pub(crate) fork_visible_after: u32,
}

#[derive(Debug, Default)]
struct World {
    user: Option<UserIdentity>,
    forks: HashMap<String, HashSet<String>>,
    /// Fork waiting to appear, with remaining invisible checks
    pending_fork: Option<(String, u32)>,
    auth_failures_left: u32,
}

/// One object playing session oracle, fork oracle, authenticator and fork
/// creator over shared account state
#[derive(Debug)]
pub(crate) struct SimulatedGithub {
    settings: SimSettings,
    world: Mutex<World>,
}

impl SimulatedGithub {
    pub(crate) fn new(settings: SimSettings) -> Self {
        let mut world = World {
            auth_failures_left: settings.failing_auth_attempts,
            ..World::default()
        };
        if settings.signed_in {
            world.user = Some(UserIdentity::new(&settings.login));
        }
        if let Some(fork) = &settings.existing_fork {
            let branches = world.forks.entry(fork.clone()).or_default();
            if settings.fork_has_branch {
                branches.insert(settings.head_branch.clone());
            }
        }

        Self {
            settings,
            world: Mutex::new(world),
        }
    }

    fn fork_full_name(&self) -> String {
        format!("{}/site", self.settings.login)
    }
}

#[async_trait]
impl SessionOracle for SimulatedGithub {
    async fn current_user(&self) -> Result<Option<UserIdentity>, CollaboratorError> {
        Ok(self.world.lock().user.clone())
    }
}

#[async_trait]
impl ForkOracle for SimulatedGithub {
    async fn branch_exists(&self, fork: &str, branch: &str) -> Result<bool, CollaboratorError> {
        let mut world = self.world.lock();

        if let Some((name, remaining)) = world.pending_fork.take() {
            if remaining == 0 {
                tracing::debug!(fork = %name, "simulated fork became visible");
                world
                    .forks
                    .entry(name)
                    .or_default()
                    .insert(self.settings.head_branch.clone());
            } else {
                world.pending_fork = Some((name, remaining - 1));
            }
        }

        Ok(world
            .forks
            .get(fork)
            .is_some_and(|branches| branches.contains(branch)))
    }
}

#[async_trait]
impl Authenticator for SimulatedGithub {
    async fn authenticate(&self) -> Result<(), CollaboratorError> {
        let mut world = self.world.lock();
        if world.auth_failures_left > 0 {
            world.auth_failures_left -= 1;
            return Err(CollaboratorError::Rejected(
                "sign-in window closed before completing".into(),
            ));
        }
        world.user = Some(UserIdentity::new(&self.settings.login));
        Ok(())
    }
}

#[async_trait]
impl ForkCreator for SimulatedGithub {
    async fn create_fork(&self) -> Result<ForkName, CollaboratorError> {
        let full_name = self.fork_full_name();
        let mut world = self.world.lock();
        if world.user.is_none() {
            return Err(CollaboratorError::Unauthorized);
        }
        // forking an existing or still-propagating fork is a no-op on GitHub
        let pending = world
            .pending_fork
            .as_ref()
            .is_some_and(|(name, _)| *name == full_name);
        let ready = world
            .forks
            .get(&full_name)
            .is_some_and(|branches| branches.contains(&self.settings.head_branch));
        if !pending && !ready {
            world.pending_fork = Some((full_name.clone(), self.settings.fork_visible_after));
        }
        drop(world);

        ForkName::new(full_name).map_err(|err| CollaboratorError::Other(err.to_string()))
    }
}

/// Prints prompts to stdout
#[derive(Debug, Default)]
pub(crate) struct TerminalUi;

impl RecoveryUi for TerminalUi {
    fn render(&self, prompt: &RecoveryPrompt) {
        println!();
        println!("== {} ==", prompt.title());
        println!("{}", prompt.message());
        for action in prompt.actions() {
            println!("  [{}]", action.name);
        }
    }

    fn dismiss(&self) {
        println!("(prompt closed)");
    }
}

/// Prints edit mode changes
#[derive(Debug, Default)]
pub(crate) struct PrintEditMode;

impl EditModeHandler for PrintEditMode {
    fn enter_edit_mode(&self) {
        println!(">> edit mode on");
    }

    fn exit_edit_mode(&self) {
        println!(">> edit mode off");
    }
}
