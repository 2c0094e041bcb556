//! Topology snapshots reconstructed from live container state.
//!
//! A snapshot is built purely from `inspect` output at export time; no
//! launch history is consulted.

use std::collections::{BTreeMap, BTreeSet};

use containdb_common::types::{ContainerDetails, PortMapping};

use crate::descriptor::{ComposeFile, NetworkEntry, ServiceEntry};

/// Image-independent description of one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// Service and container name.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Environment set at launch (image defaults removed).
    pub environment: BTreeMap<String, String>,
    /// Restart policy, if any.
    pub restart: Option<String>,
}

/// Host-specific bindings of one service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostBindings {
    /// Published ports.
    pub ports: Vec<PortMapping>,
    /// Volume bindings as (host source, container target).
    pub volumes: Vec<(String, String)>,
}

/// Ordered (descriptor, bindings) pairs for the managed network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologySnapshot {
    /// Network every service attaches to.
    pub network: String,
    /// Entries sorted by service name.
    pub entries: Vec<(ServiceDescriptor, HostBindings)>,
}

impl TopologySnapshot {
    /// Builds a snapshot from inspected containers.
    ///
    /// Each item pairs a container with its image's default environment;
    /// entries identical to an image default are dropped so the descriptor
    /// only carries what was set at launch.
    pub fn capture(
        network: impl Into<String>,
        containers: impl IntoIterator<Item = (ContainerDetails, Vec<String>)>,
    ) -> Self {
        let mut entries: Vec<_> = containers
            .into_iter()
            .map(|(details, image_env)| {
                let defaults: BTreeSet<String> = image_env.into_iter().collect();
                let environment = details
                    .env
                    .iter()
                    .filter(|entry| !defaults.contains(*entry))
                    .filter_map(|entry| entry.split_once('='))
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect();
                let descriptor = ServiceDescriptor {
                    name: details.name,
                    image: details.image,
                    environment,
                    restart: details.restart,
                };
                let bindings = HostBindings {
                    ports: details.ports,
                    volumes: details.mounts,
                };
                (descriptor, bindings)
            })
            .collect();
        entries.sort_by(|a, b| a.0.name.cmp(&b.0.name));
        tracing::debug!(services = entries.len(), "topology captured");
        Self {
            network: network.into(),
            entries,
        }
    }

    /// Renders the snapshot as a compose document.
    #[must_use]
    pub fn to_compose(&self) -> ComposeFile {
        let services = self
            .entries
            .iter()
            .map(|(descriptor, bindings)| {
                let entry = ServiceEntry {
                    image: descriptor.image.clone(),
                    container_name: Some(descriptor.name.clone()),
                    ports: bindings.ports.iter().map(ToString::to_string).collect(),
                    volumes: bindings
                        .volumes
                        .iter()
                        .map(|(source, target)| format!("{source}:{target}"))
                        .collect(),
                    environment: descriptor.environment.clone(),
                    networks: vec![self.network.clone()],
                    restart: descriptor.restart.clone(),
                };
                (descriptor.name.clone(), entry)
            })
            .collect();

        let mut networks = BTreeMap::new();
        if !self.entries.is_empty() {
            let _ = networks.insert(self.network.clone(), NetworkEntry { external: true });
        }
        ComposeFile { services, networks }
    }

    /// Returns the `(name, image, ports)` identity of every service, the
    /// part of a snapshot that survives export and re-import.
    #[must_use]
    pub fn identity(&self) -> BTreeSet<(String, String, Vec<String>)> {
        self.entries
            .iter()
            .map(|(d, b)| {
                (
                    d.name.clone(),
                    d.image.clone(),
                    b.ports.iter().map(ToString::to_string).collect(),
                )
            })
            .collect()
    }
}
