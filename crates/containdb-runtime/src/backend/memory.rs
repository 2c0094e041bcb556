//! Deterministic in-process model of the container runtime.
//!
//! [`InMemoryRuntime`] interprets the same invocation vocabulary the
//! process backend sends to the runtime CLI and answers with the same
//! output shapes (`ps` templates, `inspect` JSON, error text on stderr).
//! Clones share one state, so a test can hand a clone to the code under
//! test and inspect the recorded invocations afterwards.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use containdb_common::error::{ContainDbError, Result};
use containdb_common::types::{
    ConfigRecord, HostBinding, HostConfigRecord, InspectRecord, MountRecord,
    NetworkSettingsRecord, PortMapping, RestartPolicyRecord, StateRecord, image_repository,
};
use containdb_compose::descriptor::ComposeFile;

use super::ContainerRuntime;
use crate::cancel::CancellationToken;
use crate::command::{Action, Invocation, OptionFragment};

/// Environment every modelled image carries by default.
pub const DEFAULT_IMAGE_ENV: &str =
    "PATH=/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

const VOLUME_ROOT: &str = "/var/lib/docker/volumes";

/// A mount of a modelled container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMount {
    /// Named volume backing the mount, `None` for bind mounts.
    pub volume: Option<String>,
    /// Host source path.
    pub source: String,
    /// Path inside the container.
    pub target: String,
}

/// A container tracked by the in-memory runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelContainer {
    /// Container ID, assigned when the container enters the model.
    pub id: String,
    /// Container name.
    pub name: String,
    /// Image reference as given at creation.
    pub image: String,
    /// Runtime status (`running`, `exited`, `created`, `dead`).
    pub status: String,
    /// Published ports.
    pub ports: Vec<PortMapping>,
    /// Mounts.
    pub mounts: Vec<ModelMount>,
    /// Environment as `KEY=VALUE`, image defaults first.
    pub env: Vec<String>,
    /// Restart policy.
    pub restart: Option<String>,
    /// Attached networks.
    pub networks: Vec<String>,
}

impl ModelContainer {
    /// A container with no ports, mounts, or networks.
    #[must_use]
    pub fn new(name: &str, image: &str, status: &str) -> Self {
        Self {
            id: String::new(),
            name: name.to_string(),
            image: image.to_string(),
            status: status.to_string(),
            ports: Vec::new(),
            mounts: Vec::new(),
            env: vec![DEFAULT_IMAGE_ENV.to_string()],
            restart: None,
            networks: Vec::new(),
        }
    }

    /// Attaches the container to `network`.
    #[must_use]
    pub fn on_network(mut self, network: &str) -> Self {
        self.networks.push(network.to_string());
        self
    }

    /// Mounts the named `volume` at `target`.
    #[must_use]
    pub fn with_volume(mut self, volume: &str, target: &str) -> Self {
        self.mounts.push(ModelMount {
            volume: Some(volume.to_string()),
            source: volume_source(volume),
            target: target.to_string(),
        });
        self
    }

    /// Publishes `container` on host port `host`.
    #[must_use]
    pub fn publish(mut self, host: &str, container: &str) -> Self {
        self.ports.push(PortMapping {
            host: host.to_string(),
            container: container.to_string(),
            protocol: None,
        });
        self
    }

    fn matches(&self, ident: &str) -> bool {
        self.name == ident || self.id == ident || (ident.len() >= 4 && self.id.starts_with(ident))
    }

    fn is_running(&self) -> bool {
        self.status == "running"
    }

    fn uses_volume(&self, volume: &str) -> bool {
        self.mounts
            .iter()
            .any(|m| m.volume.as_deref() == Some(volume) || m.source == volume)
    }

    fn matches_filter(&self, key: &str, value: &str) -> bool {
        match key {
            "name" => self.name.contains(value),
            "ancestor" => normalize(&self.image) == normalize(value),
            "status" => self.status == value,
            "volume" => self.uses_volume(value),
            "network" => self.networks.iter().any(|n| n == value),
            "id" => self.id.starts_with(value),
            _ => false,
        }
    }

    fn render(&self, template: &str) -> String {
        template
            .replace("{{.Names}}", &self.name)
            .replace("{{.Image}}", &self.image)
            .replace("{{.ID}}", &self.id)
            .replace("{{.Status}}", &self.status)
    }

    fn record(&self) -> InspectRecord {
        let mut bindings: BTreeMap<String, Option<Vec<HostBinding>>> = BTreeMap::new();
        for port in &self.ports {
            let key = format!(
                "{}/{}",
                port.container,
                port.protocol.as_deref().unwrap_or("tcp")
            );
            bindings
                .entry(key)
                .or_default()
                .get_or_insert_with(Vec::new)
                .push(HostBinding {
                    host_ip: String::new(),
                    host_port: port.host.clone(),
                });
        }
        InspectRecord {
            id: self.id.clone(),
            name: format!("/{}", self.name),
            state: StateRecord {
                status: self.status.clone(),
            },
            config: ConfigRecord {
                image: self.image.clone(),
                env: Some(self.env.clone()),
            },
            host_config: HostConfigRecord {
                port_bindings: Some(bindings),
                restart_policy: Some(RestartPolicyRecord {
                    name: self.restart.clone().unwrap_or_else(|| "no".to_string()),
                }),
            },
            mounts: Some(
                self.mounts
                    .iter()
                    .map(|m| MountRecord {
                        kind: (if m.volume.is_some() { "volume" } else { "bind" }).to_string(),
                        name: m.volume.clone(),
                        source: m.source.clone(),
                        destination: m.target.clone(),
                    })
                    .collect(),
            ),
            network_settings: NetworkSettingsRecord {
                networks: Some(
                    self.networks
                        .iter()
                        .map(|n| (n.clone(), serde_json::Value::Object(serde_json::Map::new())))
                        .collect(),
                ),
            },
        }
    }
}

fn volume_source(volume: &str) -> String {
    format!("{VOLUME_ROOT}/{volume}/_data")
}

/// Adds the implicit `latest` tag to untagged references.
fn normalize(image: &str) -> String {
    if image_repository(image) == image {
        format!("{image}:latest")
    } else {
        image.to_string()
    }
}

fn parse_port(spec: &str) -> Option<PortMapping> {
    let (host, container) = spec.split_once(':')?;
    let (container, protocol) = container
        .split_once('/')
        .map_or((container, None), |(p, proto)| {
            (p, (proto != "tcp").then(|| proto.to_string()))
        });
    Some(PortMapping {
        host: host.to_string(),
        container: container.to_string(),
        protocol,
    })
}

/// Applies `KEY=VALUE` overrides on top of `base`, replacing same-key entries.
fn merge_env(base: &[String], overrides: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut env = base.to_vec();
    for entry in overrides {
        let key = entry.split_once('=').map_or(entry.as_str(), |(k, _)| k).to_string();
        env.retain(|e| e.split_once('=').map_or(e.as_str(), |(k, _)| k) != key);
        env.push(entry);
    }
    env
}

fn lines(items: impl IntoIterator<Item = String>) -> String {
    items.into_iter().map(|line| line + "\n").collect()
}

/// Invocation fragments grouped by kind.
#[derive(Default)]
struct Parsed<'a> {
    flags: Vec<&'static str>,
    filters: Vec<(&'static str, &'a str)>,
    format: Option<&'a str>,
    file: Option<&'a Path>,
    network: Option<&'a str>,
    publish: Vec<String>,
    restart: Option<&'a str>,
    mounts: Vec<(&'a str, &'a str)>,
    env: Vec<String>,
    name: Option<&'a str>,
    args: Vec<&'a str>,
}

impl<'a> Parsed<'a> {
    fn of(invocation: &'a Invocation) -> Self {
        let mut parsed = Self::default();
        for fragment in invocation.fragments() {
            match fragment {
                OptionFragment::Flag(flag) => parsed.flags.push(*flag),
                OptionFragment::Filter { key, value } => parsed.filters.push((*key, value.as_str())),
                OptionFragment::Format(template) => parsed.format = Some(template.as_str()),
                OptionFragment::File(path) => parsed.file = Some(path.as_path()),
                OptionFragment::Network(name) => parsed.network = Some(name.as_str()),
                OptionFragment::Publish { host, container } => {
                    parsed.publish.push(format!("{host}:{container}"));
                }
                OptionFragment::Restart(policy) => parsed.restart = Some(policy.as_str()),
                OptionFragment::Mount { source, target } => {
                    parsed.mounts.push((source.as_str(), target.as_str()));
                }
                OptionFragment::Env { key, value, .. } => parsed.env.push(format!("{key}={value}")),
                OptionFragment::Name(name) => parsed.name = Some(name.as_str()),
                OptionFragment::Arg(arg) => parsed.args.push(arg.as_str()),
            }
        }
        parsed
    }

    fn has(&self, flag: &str) -> bool {
        self.flags.contains(&flag)
    }

    fn first_arg(&self, command: &str) -> std::result::Result<&'a str, String> {
        self.args
            .first()
            .copied()
            .ok_or_else(|| format!("\"{command}\" requires at least 1 argument"))
    }
}

#[derive(Debug, Default)]
struct State {
    containers: Vec<ModelContainer>,
    volumes: BTreeSet<String>,
    networks: BTreeSet<String>,
    images: BTreeMap<String, Vec<String>>,
    dangling: usize,
    next_id: u64,
    failures: HashMap<Action, String>,
    cancel_on: Option<(Action, CancellationToken)>,
    log: Vec<Invocation>,
}

type Reply = std::result::Result<String, String>;

impl State {
    fn assign_id(&mut self) -> String {
        self.next_id += 1;
        format!("{:012x}", 0x5eed_0000_0000_u64 + self.next_id)
    }

    fn find(&self, ident: &str) -> Option<usize> {
        self.containers.iter().position(|c| c.matches(ident))
    }

    fn apply(&mut self, invocation: &Invocation) -> Reply {
        let p = Parsed::of(invocation);
        match invocation.action() {
            Action::RunContainer => self.run(&p),
            Action::RemoveContainer => self.remove_container(&p),
            Action::ListContainers => Ok(self.ps(&p)),
            Action::InspectContainer => self.inspect_containers(&p),
            Action::CreateVolume => {
                let name = p.first_arg("volume create")?;
                let _ = self.volumes.insert(name.to_string());
                Ok(lines([name.to_string()]))
            }
            Action::RemoveVolume => self.remove_volume(&p),
            Action::InspectVolume => {
                let name = p.first_arg("volume inspect")?;
                if !self.volumes.contains(name) {
                    return Err(format!("Error response from daemon: get {name}: no such volume"));
                }
                Ok(serde_json::json!([{
                    "Name": name,
                    "Driver": "local",
                    "Mountpoint": volume_source(name),
                }])
                .to_string())
            }
            Action::ListVolumes => {
                let template = p.format.unwrap_or("{{.Name}}");
                Ok(lines(
                    self.volumes
                        .iter()
                        .filter(|v| {
                            p.filters
                                .iter()
                                .all(|(k, value)| *k != "name" || v.contains(value))
                        })
                        .map(|v| template.replace("{{.Name}}", v)),
                ))
            }
            Action::CreateNetwork => {
                let name = p.first_arg("network create")?;
                if !self.networks.insert(name.to_string()) {
                    return Err(format!(
                        "Error response from daemon: network with name {name} already exists"
                    ));
                }
                Ok(lines([self.assign_id()]))
            }
            Action::InspectNetwork => {
                let name = p.first_arg("network inspect")?;
                if !self.networks.contains(name) {
                    return Err(format!("Error response from daemon: network {name} not found"));
                }
                Ok(serde_json::json!([{ "Name": name, "Driver": "bridge" }]).to_string())
            }
            Action::PullImage => {
                let image = p.first_arg("pull")?;
                let _ = self
                    .images
                    .entry(normalize(image))
                    .or_insert_with(|| vec![DEFAULT_IMAGE_ENV.to_string()]);
                Ok(format!("Status: Downloaded newer image for {}\n", normalize(image)))
            }
            Action::RemoveImage => self.remove_image(&p),
            Action::ListImages => {
                let template = p.format.unwrap_or("{{.Repository}}:{{.Tag}}");
                Ok(lines(self.images.keys().map(|key| {
                    let repository = image_repository(key);
                    let tag = key.get(repository.len() + 1..).unwrap_or("latest");
                    template
                        .replace("{{.Repository}}", repository)
                        .replace("{{.Tag}}", tag)
                })))
            }
            Action::InspectImage => {
                let image = p.first_arg("image inspect")?;
                let key = normalize(image);
                let env = self
                    .images
                    .get(&key)
                    .ok_or_else(|| format!("Error: No such image: {image}"))?;
                Ok(serde_json::json!([{ "RepoTags": [key], "Config": { "Env": env } }]).to_string())
            }
            Action::PruneImages => {
                let pruned = std::mem::take(&mut self.dangling);
                Ok(format!("Deleted Images: {pruned}\n"))
            }
            Action::ValidateCompose => self.load_compose(&p).map(|_| String::new()),
            Action::ApplyCompose => self.compose_up(&p),
            Action::InstallPackage => {
                let package = p.first_arg("-i")?;
                if !Path::new(package).exists() {
                    return Err(format!("dpkg: error: cannot access archive '{package}'"));
                }
                Ok(String::new())
            }
        }
    }

    /// Filters with the same key are alternatives; distinct keys must all match.
    fn ps(&self, p: &Parsed<'_>) -> String {
        let template = p.format.unwrap_or("{{.Names}}");
        let all = p.has("-a");
        let keys: BTreeSet<&str> = p.filters.iter().map(|(k, _)| *k).collect();
        lines(
            self.containers
                .iter()
                .filter(|c| all || c.is_running())
                .filter(|c| {
                    keys.iter().all(|key| {
                        p.filters
                            .iter()
                            .filter(|(k, _)| k == key)
                            .any(|(k, v)| c.matches_filter(k, v))
                    })
                })
                .map(|c| c.render(template)),
        )
    }

    fn inspect_containers(&self, p: &Parsed<'_>) -> Reply {
        let _ = p.first_arg("container inspect")?;
        let mut records = Vec::with_capacity(p.args.len());
        for ident in &p.args {
            let idx = self
                .find(ident)
                .ok_or_else(|| format!("Error: No such container: {ident}"))?;
            records.push(self.containers[idx].record());
        }
        serde_json::to_string(&records).map_err(|e| e.to_string())
    }

    fn ensure_image(&mut self, image: &str) -> std::result::Result<Vec<String>, String> {
        let key = normalize(image);
        if let Some(env) = self.images.get(&key) {
            return Ok(env.clone());
        }
        if self.failures.contains_key(&Action::PullImage) {
            return Err(format!("Unable to find image '{image}' locally"));
        }
        let env = vec![DEFAULT_IMAGE_ENV.to_string()];
        let _ = self.images.insert(key, env.clone());
        Ok(env)
    }

    fn port_clash(&self, ports: &[PortMapping]) -> Option<String> {
        ports
            .iter()
            .find(|port| {
                self.containers
                    .iter()
                    .filter(|c| c.is_running())
                    .any(|c| c.ports.iter().any(|q| q.host == port.host))
            })
            .map(|port| port.host.clone())
    }

    fn mount(&mut self, source: &str, target: &str) -> ModelMount {
        if source.starts_with('/') {
            return ModelMount {
                volume: None,
                source: source.to_string(),
                target: target.to_string(),
            };
        }
        let _ = self.volumes.insert(source.to_string());
        ModelMount {
            volume: Some(source.to_string()),
            source: volume_source(source),
            target: target.to_string(),
        }
    }

    /// Admits a new container. Mirrors the runtime's behaviour of leaving
    /// a `created` container behind when the port bind fails.
    fn admit(&mut self, mut container: ModelContainer) -> Reply {
        if self.find(&container.name).is_some() {
            return Err(format!(
                "Conflict. The container name \"/{}\" is already in use",
                container.name
            ));
        }
        if let Some(missing) = container
            .networks
            .iter()
            .find(|n| !self.networks.contains(*n))
        {
            return Err(format!("Error response from daemon: network {missing} not found"));
        }
        container.id = self.assign_id();
        let id = container.id.clone();
        if let Some(host) = self.port_clash(&container.ports) {
            container.status = "created".to_string();
            self.containers.push(container);
            return Err(format!(
                "Error response from daemon: driver failed programming external connectivity: \
                 Bind for 0.0.0.0:{host} failed: port is already allocated"
            ));
        }
        container.status = "running".to_string();
        self.containers.push(container);
        Ok(lines([id]))
    }

    fn run(&mut self, p: &Parsed<'_>) -> Reply {
        let image = p.first_arg("docker run")?;
        let defaults = self.ensure_image(image)?;
        let id_hint = self.next_id + 1;
        let name = p
            .name
            .map_or_else(|| format!("container_{id_hint}"), str::to_string);
        let mounts = p
            .mounts
            .iter()
            .map(|(source, target)| self.mount(source, target))
            .collect();
        let container = ModelContainer {
            id: String::new(),
            name,
            image: image.to_string(),
            status: String::new(),
            ports: p.publish.iter().filter_map(|s| parse_port(s)).collect(),
            mounts,
            env: merge_env(&defaults, p.env.iter().cloned()),
            restart: p.restart.map(str::to_string),
            networks: p.network.map(str::to_string).into_iter().collect(),
        };
        self.admit(container)
    }

    fn remove_container(&mut self, p: &Parsed<'_>) -> Reply {
        let ident = p.first_arg("rm")?;
        let idx = self
            .find(ident)
            .ok_or_else(|| format!("Error response from daemon: No such container: {ident}"))?;
        if self.containers[idx].is_running() && !p.has("-f") {
            return Err(format!(
                "Error response from daemon: cannot remove container \"/{}\": container is running: \
                 stop the container before removing or force remove",
                self.containers[idx].name
            ));
        }
        let removed = self.containers.remove(idx);
        Ok(lines([removed.name]))
    }

    fn remove_volume(&mut self, p: &Parsed<'_>) -> Reply {
        let name = p.first_arg("volume rm")?;
        if !self.volumes.contains(name) {
            return Err(format!("Error response from daemon: get {name}: no such volume"));
        }
        if let Some(owner) = self.containers.iter().find(|c| c.uses_volume(name)) {
            return Err(format!(
                "Error response from daemon: remove {name}: volume is in use - [{}]",
                owner.id
            ));
        }
        let _ = self.volumes.remove(name);
        Ok(lines([name.to_string()]))
    }

    fn remove_image(&mut self, p: &Parsed<'_>) -> Reply {
        let image = p.first_arg("image rm")?;
        let key = normalize(image);
        if !self.images.contains_key(&key) {
            return Err(format!("Error response from daemon: No such image: {image}"));
        }
        if let Some(owner) = self
            .containers
            .iter()
            .find(|c| normalize(&c.image) == key)
        {
            return Err(format!(
                "Error response from daemon: conflict: unable to remove repository reference \
                 \"{image}\" (must force) - container {} is using its referenced image",
                owner.id
            ));
        }
        let _ = self.images.remove(&key);
        Ok(format!("Untagged: {key}\n"))
    }

    fn load_compose(&self, p: &Parsed<'_>) -> std::result::Result<ComposeFile, String> {
        let path = p.file.ok_or_else(|| "no configuration file provided".to_string())?;
        let content = std::fs::read_to_string(path)
            .map_err(|_| format!("open {}: no such file or directory", path.display()))?;
        let compose = ComposeFile::from_yaml(&content).map_err(|e| e.to_string())?;
        if let Some((name, _)) = compose.services.iter().find(|(_, s)| s.image.is_empty()) {
            return Err(format!(
                "service \"{name}\" has neither an image nor a build context specified"
            ));
        }
        Ok(compose)
    }

    fn compose_up(&mut self, p: &Parsed<'_>) -> Reply {
        let compose = self.load_compose(p)?;
        for (service, entry) in &compose.services {
            for network in &entry.networks {
                if self.networks.contains(network) {
                    continue;
                }
                if compose.networks.get(network).is_some_and(|n| n.external) {
                    return Err(format!(
                        "network {network} declared as external, but could not be found"
                    ));
                }
                let _ = self.networks.insert(network.clone());
            }
            let defaults = self.ensure_image(&entry.image)?;
            let mounts = entry
                .volumes
                .iter()
                .filter_map(|v| v.split_once(':'))
                .map(|(source, target)| self.mount(source, target))
                .collect();
            let container = ModelContainer {
                id: String::new(),
                name: entry.container_name.clone().unwrap_or_else(|| service.clone()),
                image: entry.image.clone(),
                status: String::new(),
                ports: entry.ports.iter().filter_map(|s| parse_port(s)).collect(),
                mounts,
                env: merge_env(
                    &defaults,
                    entry.environment.iter().map(|(k, v)| format!("{k}={v}")),
                ),
                restart: entry.restart.clone(),
                networks: entry.networks.clone(),
            };
            let _ = self.admit(container)?;
        }
        Ok(String::new())
    }
}

/// Deterministic test double for [`ContainerRuntime`].
///
/// Records every invocation it receives, including failed ones.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRuntime {
    state: Arc<Mutex<State>>,
    token: Option<CancellationToken>,
}

impl InMemoryRuntime {
    /// An empty runtime: no containers, volumes, networks, or images.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a handle on the same state that refuses invocations once
    /// `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            state: Arc::clone(&self.state),
            token: Some(token),
        }
    }

    /// Seeds a local image with the default environment.
    #[must_use]
    pub fn with_image(self, reference: &str) -> Self {
        self.with_image_env(reference, &[DEFAULT_IMAGE_ENV])
    }

    /// Seeds a local image with the given default environment.
    #[must_use]
    pub fn with_image_env(self, reference: &str, env: &[&str]) -> Self {
        let _ = self.lock().images.insert(
            normalize(reference),
            env.iter().map(ToString::to_string).collect(),
        );
        self
    }

    /// Seeds a named volume.
    #[must_use]
    pub fn with_volume(self, name: &str) -> Self {
        let _ = self.lock().volumes.insert(name.to_string());
        self
    }

    /// Seeds a network.
    #[must_use]
    pub fn with_network(self, name: &str) -> Self {
        let _ = self.lock().networks.insert(name.to_string());
        self
    }

    /// Seeds untagged images that an image prune removes.
    #[must_use]
    pub fn with_dangling_images(self, count: usize) -> Self {
        self.lock().dangling = count;
        self
    }

    /// Seeds a container; its image, volumes, and networks are created too.
    #[must_use]
    pub fn with_container(self, mut container: ModelContainer) -> Self {
        {
            let mut state = self.lock();
            container.id = state.assign_id();
            let _ = state
                .images
                .entry(normalize(&container.image))
                .or_insert_with(|| vec![DEFAULT_IMAGE_ENV.to_string()]);
            for mount in &container.mounts {
                if let Some(volume) = &mount.volume {
                    let _ = state.volumes.insert(volume.clone());
                }
            }
            for network in &container.networks {
                let _ = state.networks.insert(network.clone());
            }
            state.containers.push(container);
        }
        self
    }

    /// Makes every invocation of `action` fail with `stderr`.
    #[must_use]
    pub fn fail_on(self, action: Action, stderr: &str) -> Self {
        let _ = self.lock().failures.insert(action, stderr.to_string());
        self
    }

    /// Cancels `token` right after the first invocation of `action`
    /// completes, and reports that invocation as cancelled.
    #[must_use]
    pub fn cancel_on(self, action: Action, token: CancellationToken) -> Self {
        self.lock().cancel_on = Some((action, token));
        self
    }

    /// Every invocation received so far.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.lock().log.clone()
    }

    /// Invocations whose action changes runtime state.
    pub fn mutating_calls(&self) -> Vec<Invocation> {
        self.lock()
            .log
            .iter()
            .filter(|i| i.action().is_mutating())
            .cloned()
            .collect()
    }

    /// Invocations of `action`.
    pub fn calls(&self, action: Action) -> Vec<Invocation> {
        self.lock()
            .log
            .iter()
            .filter(|i| i.action() == action)
            .cloned()
            .collect()
    }

    /// Forgets recorded invocations, keeping resources.
    pub fn clear_log(&self) {
        self.lock().log.clear();
    }

    /// Snapshot of all containers.
    pub fn containers(&self) -> Vec<ModelContainer> {
        self.lock().containers.clone()
    }

    /// Looks a container up by name or ID.
    pub fn container(&self, ident: &str) -> Option<ModelContainer> {
        let state = self.lock();
        state.find(ident).map(|idx| state.containers[idx].clone())
    }

    /// Names of all volumes.
    pub fn volumes(&self) -> Vec<String> {
        self.lock().volumes.iter().cloned().collect()
    }

    /// Names of all networks.
    pub fn networks(&self) -> Vec<String> {
        self.lock().networks.iter().cloned().collect()
    }

    /// Tagged local images.
    pub fn images(&self) -> Vec<String> {
        self.lock().images.keys().cloned().collect()
    }

    /// Remaining dangling images.
    pub fn dangling_images(&self) -> usize {
        self.lock().dangling
    }

    fn handle(&self, invocation: &Invocation) -> Result<String> {
        if let Some(token) = &self.token {
            token.check()?;
        }
        let mut state = self.lock();
        state.log.push(invocation.clone());
        tracing::debug!(command = %invocation, "in-memory runtime");

        let failed = |stderr: String| ContainDbError::CommandFailed {
            command: invocation.redacted(),
            code: Some(1),
            stderr,
        };
        if let Some(stderr) = state.failures.get(&invocation.action()).cloned() {
            return Err(failed(stderr));
        }
        let output = state.apply(invocation).map_err(failed)?;

        let trips = state
            .cancel_on
            .as_ref()
            .is_some_and(|(action, _)| *action == invocation.action());
        if trips {
            if let Some((_, token)) = state.cancel_on.take() {
                token.cancel();
                return Err(ContainDbError::Cancelled);
            }
        }
        Ok(output)
    }
}

impl ContainerRuntime for InMemoryRuntime {
    fn query(&self, invocation: &Invocation) -> Result<String> {
        self.handle(invocation)
    }

    fn execute(&self, invocation: &Invocation) -> Result<()> {
        self.handle(invocation).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandBuilder;

    fn docker() -> CommandBuilder {
        CommandBuilder::new("docker")
    }

    fn ps(runtime: &InMemoryRuntime, fragments: Vec<OptionFragment>) -> String {
        runtime
            .query(&docker().build(Action::ListContainers, fragments))
            .expect("ps")
    }

    #[test]
    fn run_creates_running_container_with_named_volume() {
        let runtime = InMemoryRuntime::new().with_network("ContainDB-Network");
        runtime
            .execute(&docker().build(
                Action::RunContainer,
                [
                    OptionFragment::Network("ContainDB-Network".into()),
                    OptionFragment::Mount {
                        source: "redis-data".into(),
                        target: "/data".into(),
                    },
                    OptionFragment::Name("redis-container".into()),
                    OptionFragment::Arg("redis".into()),
                ],
            ))
            .expect("run");

        let container = runtime.container("redis-container").expect("container");
        assert_eq!(container.status, "running");
        assert_eq!(runtime.volumes(), vec!["redis-data"]);
        assert_eq!(runtime.images(), vec!["redis:latest"]);
    }

    #[test]
    fn run_on_missing_network_fails_without_container() {
        let runtime = InMemoryRuntime::new();
        let err = runtime
            .execute(&docker().build(
                Action::RunContainer,
                [
                    OptionFragment::Network("ContainDB-Network".into()),
                    OptionFragment::Arg("redis".into()),
                ],
            ))
            .expect_err("missing network");
        assert!(err.to_string().contains("not found"));
        assert!(runtime.containers().is_empty());
    }

    #[test]
    fn port_clash_leaves_created_container() {
        let runtime = InMemoryRuntime::new()
            .with_container(ModelContainer::new("other", "nginx", "running").publish("6379", "80"));
        let err = runtime
            .execute(&docker().build(
                Action::RunContainer,
                [
                    OptionFragment::Publish {
                        host: "6379".into(),
                        container: "6379".into(),
                    },
                    OptionFragment::Name("redis-container".into()),
                    OptionFragment::Arg("redis".into()),
                ],
            ))
            .expect_err("port clash");
        assert!(err.to_string().contains("port is already allocated"));
        assert_eq!(
            runtime.container("redis-container").map(|c| c.status),
            Some("created".to_string())
        );
    }

    #[test]
    fn ps_honours_all_flag_filters_and_template() {
        let runtime = InMemoryRuntime::new()
            .with_container(ModelContainer::new("redis-container", "redis", "running"))
            .with_container(ModelContainer::new("old-mysql", "mysql:8", "exited"));

        assert_eq!(ps(&runtime, vec![]), "redis-container\n");
        assert_eq!(
            ps(&runtime, vec![OptionFragment::Flag("-a")]),
            "redis-container\nold-mysql\n"
        );
        assert_eq!(
            ps(
                &runtime,
                vec![
                    OptionFragment::Flag("-a"),
                    OptionFragment::filter("ancestor", "mysql:8"),
                    OptionFragment::Format("{{.Names}} {{.Image}}".into()),
                ]
            ),
            "old-mysql mysql:8\n"
        );
        assert_eq!(
            ps(&runtime, vec![OptionFragment::filter("ancestor", "redis:latest")]),
            "redis-container\n"
        );
    }

    #[test]
    fn same_key_filters_are_alternatives() {
        let runtime = InMemoryRuntime::new()
            .with_container(ModelContainer::new("a", "redis", "exited"))
            .with_container(ModelContainer::new("b", "redis", "dead"))
            .with_container(ModelContainer::new("c", "redis", "running"));
        let out = ps(
            &runtime,
            vec![
                OptionFragment::Flag("-a"),
                OptionFragment::filter("status", "exited"),
                OptionFragment::filter("status", "dead"),
            ],
        );
        assert_eq!(out, "a\nb\n");
    }

    #[test]
    fn volume_in_use_cannot_be_removed() {
        let runtime = InMemoryRuntime::new().with_container(
            ModelContainer::new("mysql-container", "mysql", "exited").with_volume("mysql-data", "/var/lib/mysql"),
        );
        let err = runtime
            .execute(&docker().remove_volume("mysql-data"))
            .expect_err("in use");
        assert!(err.to_string().contains("volume is in use"));
        assert_eq!(runtime.volumes(), vec!["mysql-data"]);
    }

    #[test]
    fn inspect_reports_bindings_and_mounts() {
        let runtime = InMemoryRuntime::new().with_container(
            ModelContainer::new("postgresql-container", "postgres", "running")
                .on_network("ContainDB-Network")
                .publish("15432", "5432")
                .with_volume("postgresql-data", "/var/lib/postgresql/data"),
        );
        let out = runtime
            .query(&docker().build(
                Action::InspectContainer,
                [OptionFragment::Arg("postgresql-container".into())],
            ))
            .expect("inspect");
        let records: Vec<InspectRecord> = serde_json::from_str(&out).expect("json");
        assert_eq!(records[0].name, "/postgresql-container");
        let bindings = records[0]
            .host_config
            .port_bindings
            .as_ref()
            .expect("bindings");
        assert!(bindings.contains_key("5432/tcp"));
    }

    #[test]
    fn injected_failure_is_recorded_and_reported() {
        let runtime = InMemoryRuntime::new().fail_on(Action::PullImage, "network unreachable");
        let err = runtime.execute(&docker().pull("redis")).expect_err("fail");
        assert!(matches!(err, ContainDbError::CommandFailed { ref stderr, .. } if stderr == "network unreachable"));
        assert_eq!(runtime.invocations().len(), 1);
        assert!(runtime.images().is_empty());
    }

    #[test]
    fn cancelled_handle_refuses_but_sibling_does_not() {
        let runtime = InMemoryRuntime::new();
        let token = CancellationToken::new();
        let foreground = runtime.with_cancellation(token.clone());
        token.cancel();
        assert!(matches!(
            foreground.execute(&docker().pull("redis")),
            Err(ContainDbError::Cancelled)
        ));
        assert!(runtime.execute(&docker().pull("redis")).is_ok());
        assert_eq!(runtime.invocations().len(), 1);
    }

    #[test]
    fn prune_clears_dangling_images() {
        let runtime = InMemoryRuntime::new().with_dangling_images(3);
        let out = runtime.query(&docker().prune_images()).expect("prune");
        assert_eq!(out, "Deleted Images: 3\n");
        assert_eq!(runtime.dangling_images(), 0);
    }
}
