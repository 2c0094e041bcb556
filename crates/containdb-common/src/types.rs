//! Domain primitive types used across the ContainDB workspace.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Class of an external runtime resource. Names are unique per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceClass {
    /// A container.
    Container,
    /// A named volume.
    Volume,
    /// A virtual network.
    Network,
    /// An image reference.
    Image,
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Container => write!(f, "container"),
            Self::Volume => write!(f, "volume"),
            Self::Network => write!(f, "network"),
            Self::Image => write!(f, "image"),
        }
    }
}

/// Observed status of a named resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceStatus {
    /// No resource with this name exists.
    Absent,
    /// The resource exists but is not running (or cannot run).
    ExistingStopped,
    /// The resource exists and is running.
    ExistingRunning,
    /// A create command was issued but its outcome is not yet observed.
    CreatedPending,
}

/// Identifies a named external resource together with its last observed status.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceHandle {
    /// Resource class.
    pub class: ResourceClass,
    /// Resource name (container name, volume name, image reference, ...).
    pub name: String,
    /// Status observed by the most recent registry query.
    pub status: ResourceStatus,
}

impl ResourceHandle {
    /// Creates a handle with the given status.
    #[must_use]
    pub fn new(class: ResourceClass, name: impl Into<String>, status: ResourceStatus) -> Self {
        Self {
            class,
            name: name.into(),
            status,
        }
    }

    /// Returns whether the resource was observed to exist.
    #[must_use]
    pub const fn exists(&self) -> bool {
        matches!(
            self.status,
            ResourceStatus::ExistingStopped | ResourceStatus::ExistingRunning
        )
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.class, self.name)
    }
}

/// How a container identifier is matched against live containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchBy {
    /// Exact container name.
    Name,
    /// Containers created from the given image (or a descendant of it).
    ImageAncestor,
}

/// Container runtime statuses that rollback treats as leftovers.
pub const ROLLBACK_STATUSES: [&str; 3] = ["exited", "dead", "created"];

/// A running container as reported by the runtime's process listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningContainer {
    /// Container name.
    pub name: String,
    /// Image reference the container was started from.
    pub image: String,
}

/// Result of an "in use" check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Usage {
    /// Whether at least one container references the resource.
    pub in_use: bool,
    /// Name of the first referencing container, if any.
    pub owner: Option<String>,
}

impl Usage {
    /// No container references the resource.
    #[must_use]
    pub const fn unused() -> Self {
        Self {
            in_use: false,
            owner: None,
        }
    }

    /// The resource is held by `owner`.
    #[must_use]
    pub fn held_by(owner: impl Into<String>) -> Self {
        Self {
            in_use: true,
            owner: Some(owner.into()),
        }
    }
}

/// Returns the repository part of an image reference (`redis:7` → `redis`).
///
/// Registry hosts with ports (`host:5000/app:1`) keep their port.
#[must_use]
pub fn image_repository(reference: &str) -> &str {
    let reference = reference.split('@').next().unwrap_or(reference);
    match reference.rfind(':') {
        Some(idx) if !reference[idx..].contains('/') => &reference[..idx],
        _ => reference,
    }
}

/// Host side of a published container port, as reported by `inspect`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostBinding {
    /// Host interface address (empty for all interfaces).
    #[serde(rename = "HostIp", default)]
    pub host_ip: String,
    /// Host port.
    #[serde(rename = "HostPort", default)]
    pub host_port: String,
}

/// A mount attached to a container, as reported by `inspect`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountRecord {
    /// Mount type (`volume`, `bind`, `tmpfs`).
    #[serde(rename = "Type", default)]
    pub kind: String,
    /// Volume name for named volumes.
    #[serde(rename = "Name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Host-local source path.
    #[serde(rename = "Source", default)]
    pub source: String,
    /// Path inside the container.
    #[serde(rename = "Destination", default)]
    pub destination: String,
}

/// State block of an `inspect` record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    /// Runtime status (`running`, `exited`, ...).
    #[serde(rename = "Status", default)]
    pub status: String,
}

/// Config block of an `inspect` record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRecord {
    /// Image reference the container was created from.
    #[serde(rename = "Image", default)]
    pub image: String,
    /// Environment as `KEY=VALUE` entries.
    #[serde(rename = "Env", default)]
    pub env: Option<Vec<String>>,
}

/// Restart policy block of an `inspect` record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartPolicyRecord {
    /// Policy name (`no`, `always`, `unless-stopped`, `on-failure`).
    #[serde(rename = "Name", default)]
    pub name: String,
}

/// Host config block of an `inspect` record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfigRecord {
    /// Published ports keyed by `port/proto`.
    #[serde(rename = "PortBindings", default)]
    pub port_bindings: Option<BTreeMap<String, Option<Vec<HostBinding>>>>,
    /// Restart policy.
    #[serde(rename = "RestartPolicy", default)]
    pub restart_policy: Option<RestartPolicyRecord>,
}

/// Network settings block of an `inspect` record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSettingsRecord {
    /// Attached networks keyed by name.
    #[serde(rename = "Networks", default)]
    pub networks: Option<BTreeMap<String, serde_json::Value>>,
}

/// Subset of the runtime's container `inspect` document that the
/// exporter needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectRecord {
    /// Container ID.
    #[serde(rename = "Id", default)]
    pub id: String,
    /// Container name, prefixed with `/` by the runtime.
    #[serde(rename = "Name", default)]
    pub name: String,
    /// Lifecycle state.
    #[serde(rename = "State", default)]
    pub state: StateRecord,
    /// Container configuration.
    #[serde(rename = "Config", default)]
    pub config: ConfigRecord,
    /// Host configuration.
    #[serde(rename = "HostConfig", default)]
    pub host_config: HostConfigRecord,
    /// Mounts.
    #[serde(rename = "Mounts", default)]
    pub mounts: Option<Vec<MountRecord>>,
    /// Network attachments.
    #[serde(rename = "NetworkSettings", default)]
    pub network_settings: NetworkSettingsRecord,
}

/// A published port in `host:container[/proto]` form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PortMapping {
    /// Host port.
    pub host: String,
    /// Container port.
    pub container: String,
    /// Protocol, omitted for `tcp`.
    pub protocol: Option<String>,
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.protocol {
            Some(proto) => write!(f, "{}:{}/{proto}", self.host, self.container),
            None => write!(f, "{}:{}", self.host, self.container),
        }
    }
}

/// Live configuration of a container, reconstructed from `inspect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDetails {
    /// Container name without the leading `/`.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Runtime status.
    pub status: String,
    /// Published ports, sorted.
    pub ports: Vec<PortMapping>,
    /// Mounts as (host source, container destination) pairs.
    pub mounts: Vec<(String, String)>,
    /// Environment as `KEY=VALUE` entries, in runtime order.
    pub env: Vec<String>,
    /// Restart policy, `None` for `no`.
    pub restart: Option<String>,
    /// Attached network names, sorted.
    pub networks: Vec<String>,
}

impl From<InspectRecord> for ContainerDetails {
    fn from(record: InspectRecord) -> Self {
        let mut ports: Vec<PortMapping> = record
            .host_config
            .port_bindings
            .unwrap_or_default()
            .into_iter()
            .flat_map(|(key, bindings)| {
                let (container, proto) = key
                    .split_once('/')
                    .map_or((key.clone(), None), |(p, proto)| {
                        (p.to_string(), (proto != "tcp").then(|| proto.to_string()))
                    });
                bindings
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|b| !b.host_port.is_empty())
                    .map(move |b| PortMapping {
                        host: b.host_port,
                        container: container.clone(),
                        protocol: proto.clone(),
                    })
            })
            .collect();
        ports.sort();
        ports.dedup();

        let restart = record
            .host_config
            .restart_policy
            .map(|p| p.name)
            .filter(|name| !name.is_empty() && name != "no");

        Self {
            name: record.name.trim_start_matches('/').to_string(),
            image: record.config.image,
            status: record.state.status,
            ports,
            mounts: record
                .mounts
                .unwrap_or_default()
                .into_iter()
                .map(|m| (m.source, m.destination))
                .collect(),
            env: record.config.env.unwrap_or_default(),
            restart,
            networks: record
                .network_settings
                .networks
                .unwrap_or_default()
                .into_keys()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INSPECT: &str = r#"{
        "Id": "4f2c",
        "Name": "/postgresql-container",
        "State": {"Status": "running", "Running": true},
        "Config": {"Image": "postgres", "Env": ["POSTGRES_USER=root", "PATH=/usr/bin"]},
        "HostConfig": {
            "PortBindings": {
                "5432/tcp": [{"HostIp": "", "HostPort": "15432"}],
                "53/udp": [{"HostIp": "", "HostPort": "53"}]
            },
            "RestartPolicy": {"Name": "unless-stopped", "MaximumRetryCount": 0}
        },
        "Mounts": [{"Type": "volume", "Name": "postgresql-data",
                    "Source": "/var/lib/docker/volumes/postgresql-data/_data",
                    "Destination": "/var/lib/postgresql/data"}],
        "NetworkSettings": {"Networks": {"ContainDB-Network": {"IPAddress": "172.18.0.2"}}}
    }"#;

    #[test]
    fn inspect_record_converts_to_details() {
        let record: InspectRecord = serde_json::from_str(INSPECT).expect("parse");
        let details = ContainerDetails::from(record);
        assert_eq!(details.name, "postgresql-container");
        assert_eq!(details.image, "postgres");
        assert_eq!(details.restart.as_deref(), Some("unless-stopped"));
        assert_eq!(details.networks, vec!["ContainDB-Network"]);
        let ports: Vec<String> = details.ports.iter().map(ToString::to_string).collect();
        assert_eq!(ports, vec!["15432:5432", "53:53/udp"]);
        assert_eq!(
            details.mounts,
            vec![(
                "/var/lib/docker/volumes/postgresql-data/_data".to_string(),
                "/var/lib/postgresql/data".to_string()
            )]
        );
    }

    #[test]
    fn null_sections_are_tolerated() {
        let record: InspectRecord = serde_json::from_str(
            r#"{"Name": "/redis-container", "Config": {"Image": "redis", "Env": null},
                "HostConfig": {"PortBindings": null, "RestartPolicy": {"Name": "no"}},
                "Mounts": null}"#,
        )
        .expect("parse");
        let details = ContainerDetails::from(record);
        assert!(details.ports.is_empty());
        assert!(details.env.is_empty());
        assert!(details.restart.is_none());
    }

    #[test]
    fn image_repository_strips_tag_only() {
        assert_eq!(image_repository("redis"), "redis");
        assert_eq!(image_repository("redis:7.2"), "redis");
        assert_eq!(image_repository("redis/redisinsight:latest"), "redis/redisinsight");
        assert_eq!(image_repository("localhost:5000/app"), "localhost:5000/app");
        assert_eq!(image_repository("mongo@sha256:abc"), "mongo");
    }

    #[test]
    fn handle_exists_only_for_observed_states() {
        let absent = ResourceHandle::new(ResourceClass::Volume, "redis-data", ResourceStatus::Absent);
        let pending =
            ResourceHandle::new(ResourceClass::Volume, "redis-data", ResourceStatus::CreatedPending);
        let running =
            ResourceHandle::new(ResourceClass::Container, "redis-container", ResourceStatus::ExistingRunning);
        assert!(!absent.exists());
        assert!(!pending.exists());
        assert!(running.exists());
        assert_eq!(running.to_string(), "container 'redis-container'");
    }
}
