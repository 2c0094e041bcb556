//! Read-only queries against live runtime state.
//!
//! Nothing is cached: state can change between two calls from outside
//! this process. Boolean existence checks fold query failures into
//! `false`; listings and in-use checks propagate them, since an empty
//! answer there would hide a real problem.

use std::collections::BTreeSet;

use containdb_common::error::{ContainDbError, Result};
use containdb_common::types::{
    ConfigRecord, ContainerDetails, InspectRecord, MatchBy, RunningContainer, Usage,
    image_repository,
};
use serde::Deserialize;

use crate::backend::ContainerRuntime;
use crate::command::{Action, CommandBuilder, Invocation, OptionFragment};

const NAMES: &str = "{{.Names}}";
const NAME_AND_IMAGE: &str = "{{.Names}} {{.Image}}";
const IMAGE_REF: &str = "{{.Repository}}:{{.Tag}}";

#[derive(Debug, Deserialize)]
struct ImageRecord {
    #[serde(rename = "Config", default)]
    config: ConfigRecord,
}

fn non_empty_lines(output: &str) -> impl Iterator<Item = &str> {
    output.lines().map(str::trim).filter(|l| !l.is_empty())
}

/// Live view of the runtime's namespace.
#[derive(Debug)]
pub struct Registry<'a, R> {
    runtime: &'a R,
    builder: &'a CommandBuilder,
}

impl<'a, R: ContainerRuntime> Registry<'a, R> {
    /// Creates a registry issuing queries through `runtime`.
    pub const fn new(runtime: &'a R, builder: &'a CommandBuilder) -> Self {
        Self { runtime, builder }
    }

    fn query(&self, action: Action, fragments: Vec<OptionFragment>) -> Result<String> {
        self.runtime.query(&self.builder.build(action, fragments))
    }

    fn succeeds(&self, invocation: &Invocation) -> bool {
        match self.runtime.query(invocation) {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(command = %invocation, error = %e, "existence check negative");
                false
            }
        }
    }

    fn container_names(&self, identifier: &str, match_by: MatchBy, all: bool) -> Result<Vec<String>> {
        let filter = match match_by {
            MatchBy::Name => OptionFragment::filter("name", identifier),
            MatchBy::ImageAncestor => OptionFragment::filter("ancestor", identifier),
        };
        let mut fragments = vec![filter, OptionFragment::Format(NAMES.into())];
        if all {
            fragments.push(OptionFragment::Flag("-a"));
        }
        let output = self.query(Action::ListContainers, fragments)?;
        // The runtime's name filter matches substrings.
        Ok(non_empty_lines(&output)
            .filter(|name| match_by == MatchBy::ImageAncestor || *name == identifier)
            .map(str::to_string)
            .collect())
    }

    /// Whether a container matching `identifier` exists in any state.
    pub fn container_exists(&self, identifier: &str, match_by: MatchBy) -> bool {
        self.container_names(identifier, match_by, true)
            .is_ok_and(|names| !names.is_empty())
    }

    /// Whether a container matching `identifier` is running.
    pub fn container_running(&self, identifier: &str, match_by: MatchBy) -> bool {
        self.container_names(identifier, match_by, false)
            .is_ok_and(|names| !names.is_empty())
    }

    /// Running containers whose image repository is exactly one of `images`.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing query fails.
    pub fn list_running(&self, images: &[&str]) -> Result<Vec<RunningContainer>> {
        let wanted: BTreeSet<&str> = images.iter().map(|i| image_repository(i)).collect();
        let output = self.query(
            Action::ListContainers,
            vec![OptionFragment::Format(NAME_AND_IMAGE.into())],
        )?;
        Ok(non_empty_lines(&output)
            .filter_map(|line| line.split_once(' '))
            .filter(|(_, image)| wanted.contains(image_repository(image)))
            .map(|(name, image)| RunningContainer {
                name: name.to_string(),
                image: image.to_string(),
            })
            .collect())
    }

    /// Whether volume `name` exists.
    pub fn volume_exists(&self, name: &str) -> bool {
        self.succeeds(
            &self
                .builder
                .build(Action::InspectVolume, [OptionFragment::Arg(name.into())]),
        )
    }

    /// Whether network `name` exists.
    pub fn network_exists(&self, name: &str) -> bool {
        self.succeeds(
            &self
                .builder
                .build(Action::InspectNetwork, [OptionFragment::Arg(name.into())]),
        )
    }

    fn holders(&self, key: &'static str, value: &str) -> Result<Vec<String>> {
        let output = self.query(
            Action::ListContainers,
            vec![
                OptionFragment::Flag("-a"),
                OptionFragment::filter(key, value),
                OptionFragment::Format(NAMES.into()),
            ],
        )?;
        Ok(non_empty_lines(&output).map(str::to_string).collect())
    }

    fn first_holder(&self, key: &'static str, value: &str) -> Result<Usage> {
        Ok(self
            .holders(key, value)?
            .into_iter()
            .next()
            .map_or_else(Usage::unused, Usage::held_by))
    }

    /// Every container, running or stopped, that mounts volume `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing query fails.
    pub fn volume_holders(&self, name: &str) -> Result<Vec<String>> {
        self.holders("volume", name)
    }

    /// Whether any container, running or stopped, mounts volume `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing query fails.
    pub fn is_volume_in_use(&self, name: &str) -> Result<Usage> {
        self.first_holder("volume", name)
    }

    /// Whether any container, running or stopped, was created from `reference`.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing query fails.
    pub fn is_image_in_use(&self, reference: &str) -> Result<Usage> {
        self.first_holder("ancestor", reference)
    }

    /// Local image references whose repository is one of `repositories`;
    /// an empty slice keeps every tagged image.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing query fails.
    pub fn list_images(&self, repositories: &[&str]) -> Result<Vec<String>> {
        let output = self.query(
            Action::ListImages,
            vec![OptionFragment::Format(IMAGE_REF.into())],
        )?;
        Ok(non_empty_lines(&output)
            .filter(|reference| !reference.contains("<none>"))
            .filter(|reference| {
                repositories.is_empty() || repositories.contains(&image_repository(reference))
            })
            .map(str::to_string)
            .collect())
    }

    /// Volume names contained in `names`; an empty slice keeps every volume.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing query fails.
    pub fn list_volumes(&self, names: &[String]) -> Result<Vec<String>> {
        let output = self.query(
            Action::ListVolumes,
            vec![OptionFragment::Format("{{.Name}}".into())],
        )?;
        Ok(non_empty_lines(&output)
            .filter(|volume| names.is_empty() || names.iter().any(|n| n == volume))
            .map(str::to_string)
            .collect())
    }

    /// Names of running containers attached to `network`.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing query fails.
    pub fn network_members(&self, network: &str) -> Result<Vec<String>> {
        let output = self.query(
            Action::ListContainers,
            vec![
                OptionFragment::filter("network", network),
                OptionFragment::Format(NAMES.into()),
            ],
        )?;
        Ok(non_empty_lines(&output).map(str::to_string).collect())
    }

    /// Live configuration of container `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails, the output is not inspect
    /// JSON, or the container does not exist.
    pub fn inspect_container(&self, name: &str) -> Result<ContainerDetails> {
        let output = self.query(
            Action::InspectContainer,
            vec![OptionFragment::Arg(name.into())],
        )?;
        let records: Vec<InspectRecord> =
            serde_json::from_str(&output).map_err(|e| ContainDbError::Parse {
                message: format!("container inspect {name}: {e}"),
            })?;
        records
            .into_iter()
            .next()
            .map(ContainerDetails::from)
            .ok_or_else(|| ContainDbError::NotFound {
                kind: "container",
                id: name.to_string(),
            })
    }

    /// Environment baked into image `reference`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the output is not inspect JSON.
    pub fn image_default_env(&self, reference: &str) -> Result<Vec<String>> {
        let output = self.query(
            Action::InspectImage,
            vec![OptionFragment::Arg(reference.into())],
        )?;
        let records: Vec<ImageRecord> =
            serde_json::from_str(&output).map_err(|e| ContainDbError::Parse {
                message: format!("image inspect {reference}: {e}"),
            })?;
        Ok(records
            .into_iter()
            .next()
            .and_then(|r| r.config.env)
            .unwrap_or_default())
    }

    /// IDs of all containers in runtime status `status`.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing query fails.
    pub fn containers_with_status(&self, status: &str) -> Result<Vec<String>> {
        let output = self.query(
            Action::ListContainers,
            vec![
                OptionFragment::Flag("-a"),
                OptionFragment::filter("status", status),
                OptionFragment::Format("{{.ID}}".into()),
            ],
        )?;
        Ok(non_empty_lines(&output).map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{InMemoryRuntime, ModelContainer};

    fn docker() -> CommandBuilder {
        CommandBuilder::new("docker")
    }

    #[test]
    fn name_match_is_exact() {
        let runtime = InMemoryRuntime::new()
            .with_container(ModelContainer::new("redis-container-old", "redis", "running"));
        let builder = docker();
        let registry = Registry::new(&runtime, &builder);
        assert!(!registry.container_exists("redis-container", MatchBy::Name));
        assert!(registry.container_exists("redis-container-old", MatchBy::Name));
    }

    #[test]
    fn running_check_ignores_stopped_containers() {
        let runtime = InMemoryRuntime::new()
            .with_container(ModelContainer::new("mongodb-container", "mongo", "exited"));
        let builder = docker();
        let registry = Registry::new(&runtime, &builder);
        assert!(registry.container_exists("mongo", MatchBy::ImageAncestor));
        assert!(!registry.container_running("mongo", MatchBy::ImageAncestor));
    }

    #[test]
    fn existence_checks_fold_failures_to_false() {
        let runtime = InMemoryRuntime::new()
            .with_volume("redis-data")
            .fail_on(Action::InspectVolume, "daemon not running");
        let builder = docker();
        assert!(!Registry::new(&runtime, &builder).volume_exists("redis-data"));
    }

    #[test]
    fn listings_propagate_failures() {
        let runtime = InMemoryRuntime::new().fail_on(Action::ListContainers, "daemon not running");
        let builder = docker();
        let registry = Registry::new(&runtime, &builder);
        assert!(registry.list_running(&["redis"]).is_err());
        assert!(registry.is_volume_in_use("redis-data").is_err());
    }

    #[test]
    fn list_running_matches_repository_exactly() {
        let runtime = InMemoryRuntime::new()
            .with_container(ModelContainer::new("redis-container", "redis", "running"))
            .with_container(ModelContainer::new("redisinsight", "redis/redisinsight:latest", "running"))
            .with_container(ModelContainer::new("cache", "redis:7", "running"));
        let builder = docker();
        let names: Vec<_> = Registry::new(&runtime, &builder)
            .list_running(&["redis"])
            .expect("list")
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["redis-container", "cache"]);
    }

    #[test]
    fn in_use_reports_stopped_owner() {
        let runtime = InMemoryRuntime::new().with_container(
            ModelContainer::new("mysql-container", "mysql", "exited").with_volume("mysql-data", "/var/lib/mysql"),
        );
        let builder = docker();
        let registry = Registry::new(&runtime, &builder);
        assert_eq!(
            registry.is_volume_in_use("mysql-data").expect("query"),
            Usage::held_by("mysql-container")
        );
        assert_eq!(
            registry.is_image_in_use("mysql:latest").expect("query"),
            Usage::held_by("mysql-container")
        );
        assert_eq!(
            registry.is_volume_in_use("redis-data").expect("query"),
            Usage::unused()
        );
    }

    #[test]
    fn volume_holders_lists_every_container() {
        let runtime = InMemoryRuntime::new()
            .with_container(
                ModelContainer::new("redis-container", "redis", "exited").with_volume("redis-data", "/data"),
            )
            .with_container(
                ModelContainer::new("redis-backup", "redis", "running").with_volume("redis-data", "/data"),
            )
            .with_container(ModelContainer::new("web", "nginx", "running"));
        let builder = docker();
        let registry = Registry::new(&runtime, &builder);
        let mut holders = registry.volume_holders("redis-data").expect("query");
        holders.sort();
        assert_eq!(holders, ["redis-backup", "redis-container"]);
        assert!(registry.volume_holders("mongodb-data").expect("query").is_empty());
    }

    #[test]
    fn image_and_volume_listings_filter() {
        let runtime = InMemoryRuntime::new()
            .with_image("redis")
            .with_image("nginx:1.27")
            .with_volume("redis-data")
            .with_volume("scratch");
        let builder = docker();
        let registry = Registry::new(&runtime, &builder);
        assert_eq!(registry.list_images(&["redis", "mongo"]).expect("images"), vec!["redis:latest"]);
        assert_eq!(registry.list_images(&[]).expect("images").len(), 2);
        assert_eq!(
            registry.list_volumes(&["redis-data".to_string()]).expect("volumes"),
            vec!["redis-data"]
        );
    }

    #[test]
    fn inspect_and_image_env() {
        let runtime = InMemoryRuntime::new()
            .with_image_env("postgres", &["PATH=/usr/bin", "PGDATA=/var/lib/postgresql/data"])
            .with_container(
                ModelContainer::new("postgresql-container", "postgres", "running")
                    .on_network("ContainDB-Network")
                    .publish("5432", "5432"),
            );
        let builder = docker();
        let registry = Registry::new(&runtime, &builder);
        let details = registry.inspect_container("postgresql-container").expect("inspect");
        assert_eq!(details.image, "postgres");
        assert_eq!(details.ports[0].to_string(), "5432:5432");
        assert_eq!(
            registry.image_default_env("postgres").expect("env"),
            vec!["PATH=/usr/bin", "PGDATA=/var/lib/postgresql/data"]
        );
        assert_eq!(
            registry.network_members("ContainDB-Network").expect("members"),
            vec!["postgresql-container"]
        );
    }

    #[test]
    fn status_listing_returns_ids() {
        let runtime = InMemoryRuntime::new()
            .with_container(ModelContainer::new("a", "redis", "exited"))
            .with_container(ModelContainer::new("b", "redis", "running"));
        let builder = docker();
        let ids = Registry::new(&runtime, &builder)
            .containers_with_status("exited")
            .expect("ids");
        assert_eq!(ids.len(), 1);
        assert_eq!(runtime.container(&ids[0]).map(|c| c.name), Some("a".into()));
    }
}
