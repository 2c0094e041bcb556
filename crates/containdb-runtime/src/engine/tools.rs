//! Companion tools: web admin containers and the Compass desktop package.

use containdb_common::catalog::ToolKind;
use containdb_common::constants::{COMPASS_ARTIFACT, COMPASS_DOWNLOAD_URL, RESTART_UNLESS_STOPPED};
use containdb_common::error::{ContainDbError, Result};
use containdb_common::types::MatchBy;

use super::{AbortReason, Engine, Field, Operator, Outcome, Question, parse_host_port};
use crate::backend::ContainerRuntime;
use crate::command::{Action, OptionFragment};

impl<R: ContainerRuntime> Engine<R> {
    pub(super) fn install_tool(&self, tool: ToolKind, operator: &mut dyn Operator) -> Result<Outcome> {
        let spec = tool.spec();
        let registry = self.registry();

        let replace = registry.container_exists(spec.container, MatchBy::Name);
        if replace
            && !operator.confirm(&Question::ReplaceContainer {
                name: spec.container.to_string(),
            })?
        {
            return Ok(Outcome::Aborted(AbortReason::KeptExisting {
                name: spec.container.to_string(),
            }));
        }

        let images: Vec<&str> = spec.targets.iter().map(|k| k.spec().image).collect();
        let candidates: Vec<String> = registry
            .list_running(&images)?
            .into_iter()
            .map(|c| c.name)
            .collect();
        if candidates.is_empty() {
            return Ok(Outcome::Aborted(AbortReason::NoCompatibleDatabase { tool }));
        }
        let prompt = format!("Select a database to link with {tool}");
        let Some(linked) = Self::pick(operator, &prompt, &candidates)? else {
            return Ok(Outcome::Aborted(AbortReason::UserExit));
        };

        let mut fragments = vec![
            OptionFragment::Network(self.config.network.clone()),
            OptionFragment::Restart(RESTART_UNLESS_STOPPED.to_string()),
            OptionFragment::Name(spec.container.to_string()),
            OptionFragment::Arg(spec.image.to_string()),
        ];
        if let Some(env) = spec.link_env {
            fragments.push(OptionFragment::env(env, linked.clone()));
        }
        for &(env, label) in spec.login {
            let field = Field::ToolLogin { env, label };
            let answer = operator.input(&field)?;
            if answer.trim().is_empty() {
                return Err(ContainDbError::MissingCredential { field: label });
            }
            fragments.push(if field.is_secret() {
                OptionFragment::secret_env(env, answer)
            } else {
                OptionFragment::env(env, answer.trim())
            });
        }
        let default = spec.default_host_port;
        let port = parse_host_port(&operator.input(&Field::HostPort { default })?, default)?;
        fragments.push(OptionFragment::Publish {
            host: port.to_string(),
            container: spec.container_port.to_string(),
        });

        if replace {
            tracing::info!(container = spec.container, "removing existing tool container");
            self.run(&self.builder.force_remove_container(spec.container))?;
        }
        self.pull(spec.image)?;
        self.run(&self.builder.build(Action::RunContainer, fragments))?;
        tracing::info!(%tool, %linked, port, "tool started");

        Ok(Outcome::ToolInstalled {
            tool,
            linked,
            url: format!("http://localhost:{port}"),
        })
    }

    /// Downloads the Compass package into the temp directory and hands it
    /// to the package manager. The package is deleted afterwards unless
    /// the session was cancelled, in which case rollback owns it.
    pub(super) fn install_compass(&self) -> Result<Outcome> {
        if !cfg!(target_os = "linux") {
            return Ok(Outcome::Aborted(AbortReason::UnsupportedPlatform));
        }
        self.token.check()?;
        let package = self.config.temp_dir.join(COMPASS_ARTIFACT);
        tracing::info!(url = COMPASS_DOWNLOAD_URL, path = %package.display(), "downloading package");
        let bytes = self.fetcher.fetch(COMPASS_DOWNLOAD_URL, &package)?;

        let installed = self.run(&self.packages.install_package(&package));
        if !matches!(installed, Err(ContainDbError::Cancelled)) {
            if let Err(e) = std::fs::remove_file(&package) {
                tracing::warn!(path = %package.display(), error = %e, "could not delete package");
            }
        }
        installed?;
        Ok(Outcome::CompassInstalled { bytes })
    }
}
