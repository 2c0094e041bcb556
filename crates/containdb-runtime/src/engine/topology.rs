//! Topology export and import.
//!
//! Export reads live state only. Import hands structural validation and
//! application to the runtime's compose support and surfaces its error
//! output unchanged.

use std::path::Path;

use containdb_common::error::{ContainDbError, Result};
use containdb_compose::paths::{ForeignPath, foreign_volume_paths};
use containdb_compose::snapshot::TopologySnapshot;

use super::{Engine, Outcome};
use crate::backend::ContainerRuntime;

/// Missing host volume paths declared in the descriptor at `path`.
fn foreign_paths(path: &Path) -> Vec<ForeignPath> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    serde_yaml::from_str::<serde_yaml::Value>(&content)
        .map(|doc| foreign_volume_paths(&doc))
        .unwrap_or_default()
}

impl<R: ContainerRuntime> Engine<R> {
    pub(super) fn export(&self, path: &Path) -> Result<Outcome> {
        let registry = self.registry();
        let network = &self.config.network;
        let members = registry.network_members(network)?;
        if members.is_empty() {
            return Ok(Outcome::Nothing {
                what: "running services on the managed network",
            });
        }

        let mut inspected = Vec::with_capacity(members.len());
        for name in &members {
            let details = registry.inspect_container(name)?;
            let defaults = registry.image_default_env(&details.image)?;
            inspected.push((details, defaults));
        }
        let snapshot = TopologySnapshot::capture(network.clone(), inspected);
        snapshot.to_compose().write(path)?;

        Ok(Outcome::Exported {
            path: path.to_path_buf(),
            services: snapshot.entries.iter().map(|(d, _)| d.name.clone()).collect(),
        })
    }

    pub(super) fn import(&self, path: &Path) -> Result<Outcome> {
        if !path.is_file() {
            return Err(ContainDbError::NotFound {
                kind: "descriptor",
                id: path.display().to_string(),
            });
        }

        match self.runtime.query(&self.builder.validate_compose(path)) {
            Ok(_) => {}
            Err(ContainDbError::CommandFailed { stderr, .. }) => {
                return Err(ContainDbError::ImportRejected {
                    path: path.to_path_buf(),
                    stderr,
                });
            }
            Err(e) => return Err(e),
        }

        let warnings = foreign_paths(path);
        for warning in &warnings {
            tracing::warn!(
                service = %warning.service,
                path = %warning.path.display(),
                "volume path does not exist on this host"
            );
        }

        let _ = self.ensure_network()?;
        self.run(&self.builder.apply_compose(path))?;
        tracing::info!(path = %path.display(), "descriptor applied");

        Ok(Outcome::Imported {
            path: path.to_path_buf(),
            warnings,
        })
    }
}
