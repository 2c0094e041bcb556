//! Best-effort cleanup after a cancelled session.
//!
//! The watcher thread blocks on a capacity-one channel fed by the interrupt
//! handler. On the first signal it cancels the session token, removes every
//! container left in a non-running state, prunes dangling images, deletes
//! known temporary artifacts, and terminates the process with status 1.
//! Cleanup scope is system-wide: leftovers that predate the session are
//! removed too. Each sub-step failure is logged and skipped.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError};
use std::thread::JoinHandle;

use containdb_common::types::ROLLBACK_STATUSES;

use crate::backend::ContainerRuntime;
use crate::cancel::CancellationToken;
use crate::command::CommandBuilder;
use crate::registry::Registry;

/// Exit status reported after a rollback.
pub const ROLLBACK_EXIT_CODE: i32 = 1;

/// What a rollback pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackReport {
    /// IDs of removed containers.
    pub removed: Vec<String>,
    /// Whether the image prune succeeded.
    pub pruned: bool,
    /// Temporary artifacts deleted.
    pub artifacts_deleted: Vec<PathBuf>,
    /// Sub-steps that failed and were skipped.
    pub failures: usize,
}

/// Removes leftovers once the session is cancelled.
///
/// Clones share the "already ran" flag, so the interrupt watcher and the
/// foreground flow never clean up twice.
#[derive(Debug, Clone)]
pub struct RollbackCoordinator<R> {
    runtime: R,
    builder: CommandBuilder,
    artifacts: Vec<PathBuf>,
    started: Arc<AtomicBool>,
}

impl<R: ContainerRuntime> RollbackCoordinator<R> {
    /// Creates a coordinator. `runtime` should carry a per-command deadline
    /// and must not share the session's cancellation token.
    pub fn new(runtime: R, builder: CommandBuilder, artifacts: Vec<PathBuf>) -> Self {
        Self {
            runtime,
            builder,
            artifacts,
            started: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Runs the cleanup once. Returns `None` if a rollback already started.
    pub fn rollback(&self) -> Option<RollbackReport> {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::debug!("rollback already in progress");
            return None;
        }
        tracing::warn!("rolling back");
        let mut report = RollbackReport::default();
        self.remove_leftovers(&mut report);

        match self.runtime.execute(&self.builder.prune_images()) {
            Ok(()) => report.pruned = true,
            Err(e) => {
                tracing::warn!(error = %e, "image prune failed");
                report.failures += 1;
            }
        }

        for artifact in &self.artifacts {
            if !artifact.exists() {
                continue;
            }
            match std::fs::remove_file(artifact) {
                Ok(()) => report.artifacts_deleted.push(artifact.clone()),
                Err(e) => {
                    tracing::warn!(path = %artifact.display(), error = %e, "artifact not deleted");
                    report.failures += 1;
                }
            }
        }
        tracing::info!(
            removed = report.removed.len(),
            pruned = report.pruned,
            failures = report.failures,
            "rollback finished"
        );
        Some(report)
    }

    fn remove_leftovers(&self, report: &mut RollbackReport) {
        let registry = Registry::new(&self.runtime, &self.builder);
        for status in ROLLBACK_STATUSES {
            let ids = match registry.containers_with_status(status) {
                Ok(ids) => ids,
                Err(e) => {
                    tracing::warn!(status, error = %e, "could not list containers");
                    report.failures += 1;
                    continue;
                }
            };
            for id in ids {
                match self.runtime.execute(&self.builder.force_remove_container(&id)) {
                    Ok(()) => report.removed.push(id),
                    Err(e) => {
                        tracing::warn!(container = %id, error = %e, "container not removed");
                        report.failures += 1;
                    }
                }
            }
        }
    }
}

/// Creates the capacity-one interrupt channel.
pub fn signal_channel() -> (SyncSender<()>, Receiver<()>) {
    std::sync::mpsc::sync_channel(1)
}

/// Delivers an interrupt. A signal arriving while one is pending is dropped.
pub fn notify(sender: &SyncSender<()>) {
    match sender.try_send(()) {
        Ok(()) | Err(TrySendError::Full(())) => {}
        Err(TrySendError::Disconnected(())) => tracing::debug!("rollback watcher gone"),
    }
}

/// Spawns the watcher thread.
///
/// The first message on `signals` cancels `token`, runs the rollback, and
/// calls `exit` with [`ROLLBACK_EXIT_CODE`]. If every sender is dropped
/// the thread ends without doing anything.
pub fn spawn_watcher<R, F>(
    coordinator: RollbackCoordinator<R>,
    signals: Receiver<()>,
    token: CancellationToken,
    exit: F,
) -> JoinHandle<()>
where
    R: ContainerRuntime + 'static,
    F: FnOnce(i32) + Send + 'static,
{
    std::thread::spawn(move || {
        if signals.recv().is_err() {
            return;
        }
        tracing::warn!("interrupt received");
        token.cancel();
        if coordinator.rollback().is_some() {
            exit(ROLLBACK_EXIT_CODE);
        }
    })
}
