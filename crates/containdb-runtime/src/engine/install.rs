//! Database install flow.
//!
//! `CheckRunning → Pull → ConfigureOptions → ResolveVolumeConflict →
//! BuildInvocation → Execute`. Every question is asked before the first
//! container or volume is touched, so an abort leaves nothing behind.

use std::collections::HashMap;

use containdb_common::catalog::{CredentialField, ServiceKind, ServiceSpec};
use containdb_common::constants::DEFAULT_DB_USER;
use containdb_common::error::{ContainDbError, Result};
use containdb_common::types::MatchBy;

use super::options::{Credential, RuntimeOptions};
use super::{AbortReason, Engine, Field, Operator, Outcome, Question, VolumeResolution, parse_host_port};
use crate::backend::ContainerRuntime;

/// What to do with the canonical volume.
#[derive(Debug, Clone, PartialEq, Eq)]
enum VolumePlan {
    Create(String),
    Reuse(String),
    Recreate(String),
}

impl VolumePlan {
    fn name(&self) -> &str {
        match self {
            Self::Create(name) | Self::Reuse(name) | Self::Recreate(name) => name,
        }
    }
}

fn ask_credentials(spec: &ServiceSpec, operator: &mut dyn Operator) -> Result<Vec<Credential>> {
    let mut answers = HashMap::new();
    for field in [CredentialField::Username, CredentialField::Password] {
        if !spec.credentials.iter().any(|b| b.field == field) {
            continue;
        }
        let answer = operator.input(&Field::from(field))?;
        let value = match field {
            CredentialField::Username if answer.trim().is_empty() => DEFAULT_DB_USER.to_string(),
            CredentialField::Username => answer.trim().to_string(),
            CredentialField::Password if answer.trim().is_empty() => {
                return Err(ContainDbError::MissingCredential { field: "password" });
            }
            CredentialField::Password => answer,
        };
        let _ = answers.insert(field, value);
    }
    Ok(spec
        .credentials
        .iter()
        .filter_map(|binding| {
            answers.remove(&binding.field).map(|value| Credential {
                env: binding.env,
                value,
                secret: binding.field == CredentialField::Password,
            })
        })
        .collect())
}

impl<R: ContainerRuntime> Engine<R> {
    pub(super) fn install(&self, kind: ServiceKind, operator: &mut dyn Operator) -> Result<Outcome> {
        let spec = kind.spec();
        let container = kind.container_name();
        let registry = self.registry();

        if registry.container_running(spec.image, MatchBy::ImageAncestor) {
            tracing::info!(%kind, "already running, nothing to do");
            return Ok(Outcome::AlreadyRunning {
                kind,
                port: spec.port,
            });
        }

        self.pull(spec.image)?;

        let host_port = Self::ask_host_port(kind, operator)?;
        let restart = operator.confirm(&Question::AutoRestart)?;
        let credentials = ask_credentials(spec, operator)?;

        let replace = registry.container_exists(&container, MatchBy::Name);
        if replace
            && !operator.confirm(&Question::ReplaceContainer {
                name: container.clone(),
            })?
        {
            return Ok(Outcome::Aborted(AbortReason::KeptExisting { name: container }));
        }

        let plan = if operator.confirm(&Question::PersistData)? {
            let replacing = replace.then_some(container.as_str());
            match self.plan_volume(kind, replacing, operator)? {
                Some(plan) => Some(plan),
                None => return Ok(Outcome::Aborted(AbortReason::VolumeConflict)),
            }
        } else {
            None
        };

        if replace {
            tracing::info!(%container, "removing existing container");
            self.run(&self.builder.force_remove_container(&container))?;
        }
        let volume = match &plan {
            Some(plan) => Some(self.apply_volume(plan)?),
            None => None,
        };

        let options = RuntimeOptions {
            host_port,
            restart,
            volume: volume.clone(),
            credentials,
        };
        let invocation =
            options.into_invocation(&self.builder, spec, &container, &self.config.network);
        self.run(&invocation)?;
        tracing::info!(%kind, %container, "database started");

        Ok(Outcome::Installed {
            kind,
            container,
            image: spec.image.to_string(),
            host_port,
            volume,
        })
    }

    fn ask_host_port(kind: ServiceKind, operator: &mut dyn Operator) -> Result<Option<u16>> {
        let default = kind.spec().port;
        if !operator.confirm(&Question::PublishPort { kind })? {
            return Ok(None);
        }
        if !operator.confirm(&Question::CustomHostPort)? {
            return Ok(Some(default));
        }
        let answer = operator.input(&Field::HostPort { default })?;
        parse_host_port(&answer, default).map(Some)
    }

    /// Decides the volume step; `None` aborts the install.
    ///
    /// A recreate is refused here, before anything is mutated, when a
    /// container other than the one being replaced holds the volume.
    fn plan_volume(
        &self,
        kind: ServiceKind,
        replacing: Option<&str>,
        operator: &mut dyn Operator,
    ) -> Result<Option<VolumePlan>> {
        let volume = kind.volume_name();
        if !self.registry().volume_exists(&volume) {
            return Ok(Some(VolumePlan::Create(volume)));
        }
        let plan = match operator.resolve_volume_conflict(&volume)? {
            VolumeResolution::Reuse => Some(VolumePlan::Reuse(volume)),
            VolumeResolution::Recreate => {
                let confirmed = operator.confirm(&Question::DiscardVolumeData {
                    volume: volume.clone(),
                })?;
                if !confirmed {
                    return Ok(None);
                }
                let holder = self
                    .registry()
                    .volume_holders(&volume)?
                    .into_iter()
                    .find(|name| Some(name.as_str()) != replacing);
                if let Some(owner) = holder {
                    return Err(ContainDbError::InUse {
                        kind: "volume",
                        name: volume,
                        owner,
                    });
                }
                Some(VolumePlan::Recreate(volume))
            }
            VolumeResolution::Abort => None,
        };
        Ok(plan)
    }

    fn apply_volume(&self, plan: &VolumePlan) -> Result<String> {
        let name = plan.name();
        match plan {
            VolumePlan::Reuse(_) => tracing::info!(volume = %name, "reusing volume"),
            VolumePlan::Create(_) => self.run(&self.builder.create_volume(name))?,
            VolumePlan::Recreate(_) => {
                tracing::warn!(volume = %name, "recreating volume, previous data is discarded");
                self.run(&self.builder.remove_volume(name))?;
                self.run(&self.builder.create_volume(name))?;
            }
        }
        Ok(name.to_string())
    }
}
