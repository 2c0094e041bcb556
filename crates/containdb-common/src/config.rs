//! Global configuration model for a ContainDB session.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;

/// Root configuration for a ContainDB session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainDbConfig {
    /// Container runtime binary invoked for every command.
    pub runtime: String,
    /// Managed network all orchestrated containers attach to.
    pub network: String,
    /// Default path for exported topology snapshots.
    pub export_file: PathBuf,
    /// Directory holding temporary download artifacts.
    pub temp_dir: PathBuf,
    /// Per-command deadline for rollback cleanup, in seconds.
    pub cleanup_timeout_secs: u64,
    /// Echo mutating invocations instead of executing them.
    pub dry_run: bool,
}

impl ContainDbConfig {
    /// Returns the per-command cleanup deadline.
    #[must_use]
    pub const fn cleanup_timeout(&self) -> Duration {
        Duration::from_secs(self.cleanup_timeout_secs)
    }

    /// Returns the temporary artifacts rollback must delete.
    #[must_use]
    pub fn temp_artifacts(&self) -> Vec<PathBuf> {
        vec![self.temp_dir.join(constants::COMPASS_ARTIFACT)]
    }
}

impl Default for ContainDbConfig {
    fn default() -> Self {
        Self {
            runtime: constants::DEFAULT_RUNTIME.to_string(),
            network: constants::MANAGED_NETWORK.to_string(),
            export_file: PathBuf::from(constants::DEFAULT_EXPORT_FILE),
            temp_dir: constants::default_temp_dir(),
            cleanup_timeout_secs: constants::DEFAULT_CLEANUP_TIMEOUT_SECS,
            dry_run: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_targets_docker_and_managed_network() {
        let config = ContainDbConfig::default();
        assert_eq!(config.runtime, "docker");
        assert_eq!(config.network, "ContainDB-Network");
        assert!(!config.dry_run);
    }

    #[test]
    fn temp_artifacts_live_in_temp_dir() {
        let config = ContainDbConfig {
            temp_dir: PathBuf::from("/tmp/containdb"),
            ..ContainDbConfig::default()
        };
        assert_eq!(
            config.temp_artifacts(),
            vec![PathBuf::from("/tmp/containdb/mongodb-compass.deb")]
        );
    }
}
