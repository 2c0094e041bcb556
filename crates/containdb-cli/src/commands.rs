//! CLI flag definitions and session wiring.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use containdb_common::config::ContainDbConfig;
use containdb_common::constants::{DEFAULT_EXPORT_FILE, DEFAULT_RUNTIME, MANAGED_NETWORK};
use containdb_common::error::{ContainDbError, Result};
use containdb_runtime::backend::ContainerRuntime;
use containdb_runtime::backend::dry_run::DryRunRuntime;
use containdb_runtime::backend::process::ProcessRuntime;
use containdb_runtime::cancel::CancellationToken;
use containdb_runtime::command::CommandBuilder;
use containdb_runtime::engine::{Engine, Operator, UserAction};
use containdb_runtime::rollback::{RollbackCoordinator, notify, signal_channel, spawn_watcher};

use crate::console::ConsoleOperator;
use crate::{menu, output, preflight};

/// Runtime shared by the foreground flow and the rollback watcher.
pub type SharedRuntime = Arc<dyn ContainerRuntime>;

/// ContainDB: containerized databases without the boilerplate.
#[derive(Parser, Debug)]
#[command(name = "containdb", version, about, long_about = None)]
pub struct Cli {
    /// Write the running managed services to a compose file and exit.
    #[arg(
        long,
        value_name = "PATH",
        num_args = 0..=1,
        default_missing_value = DEFAULT_EXPORT_FILE,
        conflicts_with = "import"
    )]
    pub export: Option<PathBuf>,

    /// Apply a compose file through the runtime and exit.
    #[arg(long, value_name = "PATH")]
    pub import: Option<PathBuf>,

    /// Print mutating runtime commands instead of running them.
    #[arg(long)]
    pub dry_run: bool,

    /// Container runtime binary.
    #[arg(long, value_name = "BIN", env = "CONTAINDB_RUNTIME", default_value = DEFAULT_RUNTIME)]
    pub runtime: String,

    /// Managed network every container attaches to.
    #[arg(long, value_name = "NAME", env = "CONTAINDB_NETWORK", default_value = MANAGED_NETWORK)]
    pub network: String,
}

impl Cli {
    /// Session configuration with the flag overrides applied.
    pub fn config(&self) -> ContainDbConfig {
        let mut config = ContainDbConfig {
            runtime: self.runtime.clone(),
            network: self.network.clone(),
            dry_run: self.dry_run,
            ..ContainDbConfig::default()
        };
        if let Some(path) = &self.export {
            config.export_file.clone_from(path);
        }
        config
    }

    /// The one-shot action requested by flags, if any.
    pub fn one_shot(&self) -> Option<UserAction> {
        if let Some(path) = &self.import {
            return Some(UserAction::Import(path.clone()));
        }
        self.export.clone().map(UserAction::Export)
    }
}

/// Builds the foreground and cleanup runtimes for `config`.
fn runtimes(config: &ContainDbConfig, token: &CancellationToken) -> (SharedRuntime, SharedRuntime) {
    let foreground = ProcessRuntime::new().with_cancellation(token.clone());
    let cleanup = ProcessRuntime::new().with_deadline(config.cleanup_timeout());
    if config.dry_run {
        (
            Arc::new(DryRunRuntime::new(foreground)),
            Arc::new(DryRunRuntime::new(cleanup)),
        )
    } else {
        (Arc::new(foreground), Arc::new(cleanup))
    }
}

/// Runs one session: preflight, rollback watcher, then either the one-shot
/// action or the interactive menu.
///
/// # Errors
///
/// Returns an error on a failed precondition, on cancellation (after the
/// rollback ran), or if a one-shot action fails.
pub fn execute(cli: &Cli) -> anyhow::Result<()> {
    let config = cli.config();
    preflight::check(&config)?;
    tracing::debug!(?config, "session configuration");

    let token = CancellationToken::new();
    let (foreground, cleanup) = runtimes(&config, &token);
    let coordinator = RollbackCoordinator::new(
        cleanup,
        CommandBuilder::new(config.runtime.clone()),
        config.temp_artifacts(),
    );

    let (signals, receiver) = signal_channel();
    ctrlc::set_handler(move || notify(&signals)).context("failed to set Ctrl+C handler")?;
    let watcher = spawn_watcher(coordinator.clone(), receiver, token.clone(), |code| {
        std::process::exit(code)
    });

    let engine = Engine::new(foreground, config).with_cancellation(token.clone());
    let mut operator = ConsoleOperator::stdio();

    match session(&engine, cli.one_shot(), &mut operator) {
        Ok(()) => Ok(()),
        Err(ContainDbError::Cancelled) => {
            if token.is_cancelled() {
                // The watcher owns the rollback and exits the process.
                let _ = watcher.join();
            } else {
                token.cancel();
                let _ = coordinator.rollback();
            }
            anyhow::bail!("cancelled, leftover resources were cleaned up")
        }
        Err(e) => Err(e.into()),
    }
}

fn session(
    engine: &Engine<SharedRuntime>,
    one_shot: Option<UserAction>,
    operator: &mut dyn Operator,
) -> Result<()> {
    let _ = engine.ensure_network()?;
    match one_shot {
        Some(action) => {
            let outcome = engine.perform(action, operator)?;
            println!("{}", output::render(&outcome));
            Ok(())
        }
        None => menu::run(engine, operator),
    }
}
