//! Runtime wrapper that echoes mutating invocations instead of running them.

use std::sync::{Mutex, PoisonError};

use containdb_common::error::Result;

use super::ContainerRuntime;
use crate::command::Invocation;

/// Answers read-only queries through the wrapped runtime and only prints
/// mutating invocations, secrets redacted.
///
/// Registry lookups stay live, so the echoed plan reflects the real state
/// of the runtime at the time of the dry run.
#[derive(Debug)]
pub struct DryRunRuntime<R> {
    inner: R,
    echoed: Mutex<Vec<String>>,
}

impl<R: ContainerRuntime> DryRunRuntime<R> {
    /// Wraps `inner`.
    pub const fn new(inner: R) -> Self {
        Self {
            inner,
            echoed: Mutex::new(Vec::new()),
        }
    }

    /// Command lines echoed so far, in order.
    pub fn echoed(&self) -> Vec<String> {
        self.echoed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[allow(clippy::print_stderr)]
    fn echo(&self, invocation: &Invocation) {
        let line = invocation.redacted();
        tracing::info!(command = %line, "dry run, not executed");
        eprintln!("[dry-run] {line}");
        self.echoed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
    }
}

impl<R: ContainerRuntime> ContainerRuntime for DryRunRuntime<R> {
    fn query(&self, invocation: &Invocation) -> Result<String> {
        if invocation.action().is_mutating() {
            self.echo(invocation);
            return Ok(String::new());
        }
        self.inner.query(invocation)
    }

    fn execute(&self, invocation: &Invocation) -> Result<()> {
        if invocation.action().is_mutating() {
            self.echo(invocation);
            return Ok(());
        }
        self.inner.execute(invocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::InMemoryRuntime;
    use crate::command::{Action, CommandBuilder, OptionFragment};

    #[test]
    fn mutations_are_echoed_not_run() {
        let memory = InMemoryRuntime::new();
        let runtime = DryRunRuntime::new(memory.clone());
        let docker = CommandBuilder::new("docker");

        runtime.execute(&docker.create_volume("redis-data")).expect("echo");
        runtime
            .execute(&docker.build(
                Action::RunContainer,
                [
                    OptionFragment::secret_env("MYSQL_ROOT_PASSWORD", "hunter2"),
                    OptionFragment::Name("mysql-container".into()),
                    OptionFragment::Arg("mysql".into()),
                ],
            ))
            .expect("echo");

        assert!(memory.volumes().is_empty());
        assert!(memory.invocations().is_empty());
        let echoed = runtime.echoed();
        assert_eq!(echoed.len(), 2);
        assert_eq!(echoed[0], "docker volume create redis-data");
        assert!(echoed[1].contains("MYSQL_ROOT_PASSWORD=****"));
        assert!(!echoed[1].contains("hunter2"));
    }

    #[test]
    fn queries_reach_the_wrapped_runtime() {
        let memory = InMemoryRuntime::new().with_volume("redis-data");
        let runtime = DryRunRuntime::new(memory.clone());
        let docker = CommandBuilder::new("docker");
        let inspect = docker.build(
            Action::InspectVolume,
            [OptionFragment::Arg("redis-data".into())],
        );
        assert!(runtime.query(&inspect).is_ok());
        assert_eq!(memory.invocations().len(), 1);
        assert!(runtime.echoed().is_empty());
    }
}
