//! CLI command definitions and dispatch.

pub mod create;
pub mod delete;
pub mod get;
pub mod list;
pub mod reconcile;
pub mod toggle;
pub mod update;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use corral_common::config::CorralConfig;
use corral_core::{Coordinator, CoordinatorOptions};
use corral_runtime::RuntimeAdapter;
use corral_runtime::backend::detect_runtime;
use corral_store::{FileLock, JsonFileStore, MetadataStore};

/// Corral — container-backed instance manager.
#[derive(Parser, Debug)]
#[command(name = "corral", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Path to a JSON configuration file.
    #[arg(long, global = true, env = "CORRAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the instance index, overriding the configuration.
    #[arg(long, global = true, env = "CORRAL_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// Per-call runtime timeout in seconds, overriding the configuration.
    #[arg(long, global = true, env = "CORRAL_RUNTIME_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an instance and its container.
    Create(create::CreateArgs),
    /// List instances.
    List(list::ListArgs),
    /// Show one instance.
    Get(get::GetArgs),
    /// Rename an instance or change its limits or activity.
    Update(update::UpdateArgs),
    /// Start a stopped instance or stop a running one.
    Toggle(toggle::ToggleArgs),
    /// Delete an instance and its container.
    Delete(delete::DeleteArgs),
    /// Compare records with live containers and repair drift.
    Reconcile(reconcile::ReconcileArgs),
}

impl Command {
    /// Whether the command may change containers or records.
    const fn mutates(&self) -> bool {
        match self {
            Self::Create(_) | Self::Update(_) | Self::Toggle(_) | Self::Delete(_) => true,
            Self::Reconcile(args) => !args.dry_run,
            Self::List(_) | Self::Get(_) => false,
        }
    }
}

/// Shared state handed to every command.
#[derive(Debug)]
pub struct Context {
    /// The coordinator wired to the configured runtime and store.
    pub coordinator: Coordinator,
    /// Whether to print JSON.
    pub json: bool,
    store: Arc<JsonFileStore>,
}

impl Context {
    /// Builds the coordinator from configuration and global flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration, the runtime, or the store
    /// cannot be loaded.
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = match &cli.config {
            Some(path) => CorralConfig::load(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => CorralConfig::default(),
        };
        if let Some(state_file) = &cli.state_file {
            config.state_file = Some(state_file.clone());
        }
        if let Some(timeout) = cli.timeout {
            config.runtime.timeout_secs = timeout.max(1);
        }
        tracing::debug!(?config, "effective configuration");

        let runtime: Arc<dyn RuntimeAdapter> = Arc::from(detect_runtime(&config.runtime)?);
        let store = Arc::new(JsonFileStore::open(config.state_file())?);
        let shared: Arc<dyn MetadataStore> = Arc::<JsonFileStore>::clone(&store);
        Ok(Self {
            coordinator: Coordinator::new(runtime, shared, CoordinatorOptions::from(&config)),
            json: cli.json,
            store,
        })
    }

    /// Waits until no other `corral` process is mutating the same index.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be locked.
    pub fn lock_operations(&self) -> anyhow::Result<FileLock> {
        Ok(self.store.lock_operations()?)
    }
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let ctx = Context::from_cli(&cli)?;
    let lease = if cli.command.mutates() {
        Some(ctx.lock_operations()?)
    } else {
        None
    };
    let result = match cli.command {
        Command::Create(args) => create::execute(args, &ctx),
        Command::List(args) => list::execute(&args, &ctx),
        Command::Get(args) => get::execute(&args, &ctx),
        Command::Update(args) => update::execute(args, &ctx),
        Command::Toggle(args) => toggle::execute(&args, &ctx),
        Command::Delete(args) => delete::execute(&args, &ctx),
        Command::Reconcile(args) => reconcile::execute(&args, &ctx),
    };
    drop(lease);
    finish(result, ctx.coordinator.shutdown())
}

/// Combines a command's outcome with the runtime shutdown. The command's
/// own error wins; a shutdown failure after it is only logged.
fn finish(result: anyhow::Result<()>, shutdown: corral_common::error::Result<()>) -> anyhow::Result<()> {
    match (result, shutdown) {
        (Ok(()), shutdown) => Ok(shutdown?),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close)) => {
            tracing::warn!(error = %close, "runtime shutdown failed");
            Err(e)
        }
    }
}
