//! # Codegate CLI
//!
//! - `codegate check <FILE> --kind <KIND>` - run one pipeline pass and print
//!   the verdict as JSON (exit status 0 on pass)
//! - `codegate policy show` - print the loaded policy table
//! - `codegate policy check <FILE>` - validate a policy table

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codegate_artifact::{ArtifactKind, Candidate, CandidateDraft, ProfileName};
use codegate_core::{GatekeeperConfig, ValidationPipeline};
use codegate_policy::PolicyStore;
use codegate_sandbox::SandboxRuntime;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Codegate - validate and sandbox generated code
#[derive(Parser)]
#[command(name = "codegate")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "CODEGATE_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate one candidate file (single pass, no retries)
    Check {
        /// Candidate source file
        file: PathBuf,

        /// Artifact kind: library, script, test_suite, entrypoint:NAME(p1,p2)
        #[arg(short, long)]
        kind: ArtifactKind,

        /// Policy profile (defaults to the configured profile)
        #[arg(short, long)]
        profile: Option<String>,

        /// Test harness executed instead of the candidate
        #[arg(long, value_name = "FILE")]
        harness: Option<PathBuf>,

        /// Override the wall-clock timeout
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Policy table operations
    Policy {
        #[command(subcommand)]
        command: PolicyCommand,
    },
}

#[derive(Subcommand)]
enum PolicyCommand {
    /// Print profiles of the configured (or given) policy table
    Show {
        /// Policy table file (defaults to the configured table)
        #[arg(long, value_name = "FILE")]
        file: Option<PathBuf>,
    },
    /// Validate a policy table file
    Check {
        /// Policy table file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_json)?;

    let config = match &cli.config {
        Some(path) => GatekeeperConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => GatekeeperConfig::default(),
    };

    match cli.command {
        Commands::Check {
            file,
            kind,
            profile,
            harness,
            timeout_secs,
        } => check(&config, &file, kind, profile, harness.as_deref(), timeout_secs).await,
        Commands::Policy { command } => match command {
            PolicyCommand::Show { file } => policy_show(&config, file.as_deref()),
            PolicyCommand::Check { file } => policy_check(&file),
        },
    }
}

/// Initialize tracing subscriber; logs go to stderr so stdout stays JSON
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
    Ok(())
}

async fn check(
    config: &GatekeeperConfig,
    file: &Path,
    kind: ArtifactKind,
    profile: Option<String>,
    harness: Option<&Path>,
    timeout_secs: Option<u64>,
) -> Result<ExitCode> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read candidate {}", file.display()))?;
    let harness = harness
        .map(|path| {
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read harness {}", path.display()))
        })
        .transpose()?;

    let profile = profile.map_or_else(|| config.policy.default_profile.clone(), ProfileName::new);
    let mut budget = config.sandbox.budget;
    if let Some(secs) = timeout_secs {
        budget = budget.with_timeout_secs(secs);
    }

    let store = Arc::new(config.policy_store().context("Failed to load policy table")?);
    let sandbox: Arc<dyn SandboxRuntime> = Arc::new(config.process_sandbox());
    let pipeline = ValidationPipeline::new(store, sandbox).with_budget(budget);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    let candidate = Candidate::new(CandidateDraft::new(text, kind, profile), 1);
    info!(file = %file.display(), hash = %candidate.hash().short(), "Checking candidate");
    let verdict = pipeline
        .run(&candidate, harness.as_deref(), &cancel)
        .await
        .context("Validation failed")?;

    println!("{}", serde_json::to_string_pretty(&verdict)?);
    Ok(if verdict.is_pass() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn policy_show(config: &GatekeeperConfig, file: Option<&Path>) -> Result<ExitCode> {
    let store = match file {
        Some(path) => PolicyStore::load(path),
        None => config.policy_store(),
    }
    .context("Failed to load policy table")?;

    let profiles: Vec<_> = store
        .profiles()
        .map(|profile| {
            json!({
                "name": profile.name(),
                "extends": store.parent_of(profile.name()),
                "permitted": profile.permitted(),
            })
        })
        .collect();
    let table = json!({
        "version": store.version(),
        "deny": store.denied(),
        "profiles": profiles,
    });
    println!("{}", serde_json::to_string_pretty(&table)?);
    Ok(ExitCode::SUCCESS)
}

fn policy_check(file: &Path) -> Result<ExitCode> {
    let store = PolicyStore::load(file)
        .with_context(|| format!("Invalid policy table {}", file.display()))?;

    let edges = store.non_monotonic_edges();
    if edges.is_empty() {
        println!(
            "ok: version {}, {} profiles, {} denied capabilities",
            store.version(),
            store.profiles().count(),
            store.denied().len()
        );
        return Ok(ExitCode::SUCCESS);
    }
    for (child, parent) in edges {
        println!("not monotonic: '{child}' does not include everything '{parent}' permits");
    }
    Ok(ExitCode::FAILURE)
}
