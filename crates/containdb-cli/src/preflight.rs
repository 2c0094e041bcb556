//! Checks run once before the session touches the runtime.

use std::path::PathBuf;

use containdb_common::config::ContainDbConfig;
use containdb_common::error::{ContainDbError, Result};

/// What the host looks like to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Host {
    runtime: Option<PathBuf>,
    root: bool,
}

impl Host {
    fn probe(config: &ContainDbConfig) -> Self {
        Self {
            runtime: which::which(&config.runtime).ok(),
            root: nix::unistd::geteuid().is_root(),
        }
    }
}

/// Verifies the runtime binary is on `PATH` and the process runs as root.
///
/// A dry run skips the privilege check since it never mutates anything.
///
/// # Errors
///
/// Returns [`ContainDbError::Precondition`] naming the first failed check.
pub fn check(config: &ContainDbConfig) -> Result<()> {
    evaluate(&Host::probe(config), config)
}

fn evaluate(host: &Host, config: &ContainDbConfig) -> Result<()> {
    let Some(path) = &host.runtime else {
        return Err(ContainDbError::Precondition {
            message: format!("`{}` was not found on PATH, install it first", config.runtime),
        });
    };
    tracing::debug!(runtime = %path.display(), "container runtime found");

    if !host.root && !config.dry_run {
        return Err(ContainDbError::Precondition {
            message: "containdb must run as root (try sudo), or pass --dry-run".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(runtime: bool, root: bool) -> Host {
        Host {
            runtime: runtime.then(|| PathBuf::from("/usr/bin/docker")),
            root,
        }
    }

    #[test]
    fn missing_runtime_is_reported_first() {
        let err = evaluate(&host(false, false), &ContainDbConfig::default()).expect_err("missing");
        assert!(err.is_fatal());
        assert!(err.to_string().contains("`docker` was not found"));
    }

    #[test]
    fn non_root_is_refused() {
        let err = evaluate(&host(true, false), &ContainDbConfig::default()).expect_err("root");
        assert!(err.to_string().contains("root"));
    }

    #[test]
    fn dry_run_skips_privilege_check() {
        let config = ContainDbConfig {
            dry_run: true,
            ..ContainDbConfig::default()
        };
        assert!(evaluate(&host(true, false), &config).is_ok());
        assert!(evaluate(&host(false, true), &config).is_err());
    }

    #[test]
    fn root_with_runtime_passes() {
        assert!(evaluate(&host(true, true), &ContainDbConfig::default()).is_ok());
    }

    #[test]
    fn probe_finds_a_shell() {
        let config = ContainDbConfig {
            runtime: "sh".into(),
            ..ContainDbConfig::default()
        };
        assert!(Host::probe(&config).runtime.is_some());
    }
}
