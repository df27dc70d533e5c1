//! `oa-gate` - drive the Open Authoring Gate from a terminal
//!
//! Wires the gate to a simulated GitHub account so the recovery flow can be
//! exercised without a browser. Logging goes to stderr; set `RUST_LOG` to
//! see gate transitions (`RUST_LOG=oa_gate=debug`).

mod sim;

use anyhow::{bail, Context};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use oa_gate::prelude::*;
use oa_gate::{FileForkRegistry, ForkRegistry, MemoryForkRegistry};
use sim::{PrintEditMode, SimSettings, SimulatedGithub, TerminalUi};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

fn sim_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("config")
            .long("config")
            .value_parser(value_parser!(PathBuf))
            .help("Gate configuration (TOML)"),
    )
    .arg(
        Arg::new("user")
            .long("user")
            .default_value("octocat")
            .help("Login of the simulated account"),
    )
    .arg(
        Arg::new("signed-in")
            .long("signed-in")
            .action(ArgAction::SetTrue)
            .help("Start with an authenticated session"),
    )
    .arg(
        Arg::new("fork")
            .long("fork")
            .help("Fork already registered for this user (owner/repo)"),
    )
    .arg(
        Arg::new("fork-has-branch")
            .long("fork-has-branch")
            .action(ArgAction::SetTrue)
            .help("The registered fork carries the head branch"),
    )
    .arg(
        Arg::new("head-branch")
            .long("head-branch")
            .help("Override the configured head branch"),
    )
    .arg(
        Arg::new("registry")
            .long("registry")
            .value_parser(value_parser!(PathBuf))
            .help("Persist the fork name in this JSON file"),
    )
    .arg(
        Arg::new("fail-auth")
            .long("fail-auth")
            .default_value("0")
            .value_parser(value_parser!(u32))
            .help("Number of sign-in attempts that fail"),
    )
    .arg(
        Arg::new("fork-visible-after")
            .long("fork-visible-after")
            .default_value("0")
            .value_parser(value_parser!(u32))
            .help("Branch checks a new fork stays invisible for"),
    )
}

fn cli() -> Command {
    Command::new("oa-gate")
        .version(oa_gate::VERSION)
        .about("Open Authoring Gate driver")
        .subcommand_required(true)
        .subcommand(sim_args(
            Command::new("status").about("Run one authorization check and print the status as JSON"),
        ))
        .subcommand(sim_args(
            Command::new("simulate")
                .about("Request edit mode and walk the recovery prompts")
                .arg(
                    Arg::new("yes")
                        .long("yes")
                        .short('y')
                        .action(ArgAction::SetTrue)
                        .help("Confirm every prompt without asking"),
                )
                .arg(
                    Arg::new("max-attempts")
                        .long("max-attempts")
                        .default_value("10")
                        .value_parser(value_parser!(u32))
                        .help("Give up after this many confirmed actions"),
                ),
        ))
}

fn load_config(args: &ArgMatches) -> anyhow::Result<GateConfig> {
    let mut config = match args.get_one::<PathBuf>("config") {
        Some(path) => GateConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => GateConfig::new(),
    };
    if let Some(branch) = args.get_one::<String>("head-branch") {
        config = config.with_head_branch(branch.clone());
    }
    if let Some(path) = args.get_one::<PathBuf>("registry") {
        config = config.with_fork_registry(path.clone());
    }
    config.validate()?;
    Ok(config)
}

fn open_registry(
    config: &GateConfig,
    fork: Option<&String>,
) -> anyhow::Result<Arc<dyn ForkRegistry>> {
    let registry: Arc<dyn ForkRegistry> = match &config.fork_registry {
        Some(path) => Arc::new(FileForkRegistry::open(path)?),
        None => Arc::new(MemoryForkRegistry::new()),
    };
    if let Some(name) = fork {
        registry.set_fork_name(&ForkName::new(name)?)?;
    }
    Ok(registry)
}

fn build_gate(args: &ArgMatches) -> anyhow::Result<AuthorizationGate> {
    let config = load_config(args)?;
    let fork = args.get_one::<String>("fork");
    let registry = open_registry(&config, fork)?;

    let github = Arc::new(SimulatedGithub::new(SimSettings {
        login: args
            .get_one::<String>("user")
            .cloned()
            .unwrap_or_else(|| "octocat".to_string()),
        signed_in: args.get_flag("signed-in"),
        existing_fork: registry.fork_name().map(String::from),
        fork_has_branch: args.get_flag("fork-has-branch"),
        head_branch: config.head_branch.clone(),
        failing_auth_attempts: args.get_one::<u32>("fail-auth").copied().unwrap_or(0),
        fork_visible_after: args
            .get_one::<u32>("fork-visible-after")
            .copied()
            .unwrap_or(0),
    }));

    let collaborators = Collaborators {
        session: github.clone(),
        forks: github.clone(),
        registry,
        authenticator: github.clone(),
        fork_creator: github,
        ui: Arc::new(TerminalUi),
        edit_mode: Arc::new(PrintEditMode),
    };

    Ok(AuthorizationGate::new(collaborators, config))
}

async fn run_status(args: &ArgMatches) -> anyhow::Result<()> {
    let gate = build_gate(args)?;
    let status = gate.activate().await?;

    let report = serde_json::json!({
        "status": status,
        "phase": gate.phase(),
        "head_branch": gate.config().head_branch,
        "stats": gate.stats(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_simulate(args: &ArgMatches) -> anyhow::Result<()> {
    let gate = build_gate(args)?;
    let auto_confirm = args.get_flag("yes");
    let max_attempts = args.get_one::<u32>("max-attempts").copied().unwrap_or(10);

    let status = gate.activate().await?;
    println!(
        "authenticated: {}, fork valid: {}",
        status.authenticated, status.fork_valid
    );

    if gate.request_edit_mode() == EditModeDecision::Entered {
        return Ok(());
    }

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut attempts = 0;

    while let Some(prompt) = gate.current_prompt() {
        if attempts >= max_attempts {
            bail!("still locked after {attempts} attempts");
        }

        let action = prompt.action();
        if !auto_confirm {
            println!("Confirm {action}? [Y/n]");
            let answer = stdin.next_line().await?.unwrap_or_default();
            if answer.trim().eq_ignore_ascii_case("n") {
                bail!("recovery cancelled; edit mode stays locked");
            }
        }

        attempts += 1;
        match gate.run_action(action).await {
            ActionOutcome::Unlocked => println!("{action}: done"),
            ActionOutcome::Pending(next) => {
                println!("{action}: done, still waiting on {next:?}");
            }
            ActionOutcome::Failed(err) => println!("{action}: failed ({err})"),
            ActionOutcome::Ignored => println!("{action}: no longer needed"),
        }
    }

    let stats = gate.stats();
    println!(
        "checks: {} issued, {} committed; failed actions: {}",
        stats.checks_issued, stats.checks_committed, stats.action_failures
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("status", args)) => run_status(args).await,
        Some(("simulate", args)) => run_simulate(args).await,
        _ => unreachable!("subcommand_required"),
    }
}
