//! Container runtime control boundary.
//!
//! Every registry query and every built invocation crosses this seam.
//! Implementations:
//! - [`process::ProcessRuntime`]: spawns the runtime CLI.
//! - [`dry_run::DryRunRuntime`]: answers queries live, echoes mutations.
//! - `memory::InMemoryRuntime` (feature `testing`): deterministic in-process
//!   model of the runtime that understands the same invocation vocabulary.

pub mod dry_run;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod process;

use std::sync::Arc;

use containdb_common::error::Result;

use crate::command::Invocation;

/// Executes invocations against a container runtime.
pub trait ContainerRuntime: Send + Sync {
    /// Runs a read-only invocation and returns its captured standard output.
    ///
    /// # Errors
    ///
    /// Returns [`ContainDbError::CommandFailed`](containdb_common::error::ContainDbError::CommandFailed)
    /// with the captured standard error on a non-zero exit, or an I/O error
    /// if the runtime cannot be spawned.
    fn query(&self, invocation: &Invocation) -> Result<String>;

    /// Runs an invocation with its output passed through to the user.
    ///
    /// # Errors
    ///
    /// Returns an error on a non-zero exit or if the runtime cannot be spawned.
    fn execute(&self, invocation: &Invocation) -> Result<()>;
}

impl<R: ContainerRuntime + ?Sized> ContainerRuntime for Arc<R> {
    fn query(&self, invocation: &Invocation) -> Result<String> {
        (**self).query(invocation)
    }

    fn execute(&self, invocation: &Invocation) -> Result<()> {
        (**self).execute(invocation)
    }
}

impl<R: ContainerRuntime + ?Sized> ContainerRuntime for Box<R> {
    fn query(&self, invocation: &Invocation) -> Result<String> {
        (**self).query(invocation)
    }

    fn execute(&self, invocation: &Invocation) -> Result<()> {
        (**self).execute(invocation)
    }
}
