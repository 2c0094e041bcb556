//! Lifecycle orchestrator sequencing one user action at a time.
//!
//! Every action is a [`UserAction`] variant. [`Engine::perform`] consults
//! the [`Registry`] before each mutating step, derives invocations through
//! the [`CommandBuilder`], and returns an [`Outcome`]. Decisions come from
//! an [`Operator`]; the engine itself never touches the console.

mod install;
pub mod options;
mod remove;
mod tools;
mod topology;

use std::fmt;
use std::path::PathBuf;

use containdb_common::catalog::{CredentialField, ServiceKind, ToolKind};
use containdb_common::config::ContainDbConfig;
use containdb_common::constants::{DEFAULT_DB_USER, DEFAULT_EXPORT_FILE, PACKAGE_MANAGER};
use containdb_common::error::{ContainDbError, Result};
use containdb_common::types::{ResourceClass, ResourceHandle, ResourceStatus, RunningContainer};
use containdb_compose::paths::ForeignPath;

use crate::backend::ContainerRuntime;
use crate::cancel::CancellationToken;
use crate::command::{CommandBuilder, Invocation};
use crate::download::{Fetch, HttpFetcher};
use crate::registry::Registry;

/// Closed set of actions a session can request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    /// Install a database of the given kind.
    Install(ServiceKind),
    /// Install a companion administration tool.
    InstallTool(ToolKind),
    /// Download and install the `MongoDB` Compass desktop package.
    InstallCompass,
    /// List running databases.
    List,
    /// Force-remove a running database or tool container.
    RemoveContainer,
    /// Remove a database image that no container references.
    RemoveImage,
    /// Remove a canonical volume that no container references.
    RemoveVolume,
    /// Write the running managed topology to a compose file.
    Export(PathBuf),
    /// Apply a compose file through the runtime.
    Import(PathBuf),
}

/// Yes/no questions asked during a flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Question {
    /// Publish the database port on the host.
    PublishPort {
        /// Kind being installed.
        kind: ServiceKind,
    },
    /// Use a host port other than the catalog default.
    CustomHostPort,
    /// Restart the container automatically.
    AutoRestart,
    /// Keep data in the canonical volume.
    PersistData,
    /// Confirm deleting every byte stored in `volume`.
    DiscardVolumeData {
        /// Volume about to be recreated.
        volume: String,
    },
    /// Replace an existing container of the same name.
    ReplaceContainer {
        /// Container name.
        name: String,
    },
    /// Confirm removing an image.
    RemoveImage {
        /// Image reference.
        reference: String,
    },
    /// Confirm removing a volume.
    RemoveVolume {
        /// Volume name.
        name: String,
    },
    /// Offer the companion tool after a successful install.
    InstallCompanion {
        /// Tool label.
        label: &'static str,
    },
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PublishPort { kind } => {
                write!(f, "Do you want to map the {kind} container port to the host?")
            }
            Self::CustomHostPort => f.write_str("Do you want to use a custom host port?"),
            Self::AutoRestart => {
                f.write_str("Do you want the container to auto-restart on system startup?")
            }
            Self::PersistData => f.write_str("Do you want to persist data?"),
            Self::DiscardVolumeData { volume } => write!(
                f,
                "Recreating volume '{volume}' permanently deletes ALL data stored in it. Continue?"
            ),
            Self::ReplaceContainer { name } => write!(
                f,
                "Container '{name}' already exists. Remove it and create a new one?"
            ),
            Self::RemoveImage { reference } => {
                write!(f, "Are you sure you want to remove image '{reference}'?")
            }
            Self::RemoveVolume { name } => write!(
                f,
                "Are you sure you want to remove volume '{name}'? This will delete ALL DATA in this volume!"
            ),
            Self::InstallCompanion { label } => write!(f, "Do you want to install {label}?"),
        }
    }
}

/// Free-text fields read from the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Host port to publish on.
    HostPort {
        /// Value used when the answer is blank.
        default: u16,
    },
    /// Database administrator name.
    Username,
    /// Database administrator password.
    Password,
    /// Login a companion tool requires.
    ToolLogin {
        /// Environment variable receiving the value.
        env: &'static str,
        /// Human-readable label.
        label: &'static str,
    },
    /// Compose descriptor to read or write.
    DescriptorPath,
}

impl Field {
    /// Value shown as the default answer, if any.
    #[must_use]
    pub fn default_value(&self) -> Option<String> {
        match self {
            Self::HostPort { default } => Some(default.to_string()),
            Self::Username => Some(DEFAULT_DB_USER.to_string()),
            Self::DescriptorPath => Some(DEFAULT_EXPORT_FILE.to_string()),
            Self::Password | Self::ToolLogin { .. } => None,
        }
    }

    /// Whether the answer must not be echoed.
    #[must_use]
    pub fn is_secret(&self) -> bool {
        match self {
            Self::Password => true,
            Self::ToolLogin { env, .. } => env.contains("PASSWORD"),
            Self::HostPort { .. } | Self::Username | Self::DescriptorPath => false,
        }
    }
}

impl From<CredentialField> for Field {
    fn from(field: CredentialField) -> Self {
        match field {
            CredentialField::Username => Self::Username,
            CredentialField::Password => Self::Password,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HostPort { .. } => f.write_str("Enter host port"),
            Self::Username => f.write_str("Enter username"),
            Self::Password => f.write_str("Enter password"),
            Self::ToolLogin { label, .. } => write!(f, "Enter {label}"),
            Self::DescriptorPath => f.write_str("Enter compose file path"),
        }
    }
}

/// Answer to an existing canonical volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeResolution {
    /// Mount the existing volume as is.
    Reuse,
    /// Delete and recreate the volume.
    Recreate,
    /// Stop the install.
    Abort,
}

impl VolumeResolution {
    /// Menu order.
    pub const ALL: [Self; 3] = [Self::Reuse, Self::Recreate, Self::Abort];
}

impl fmt::Display for VolumeResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Reuse => "Use existing",
            Self::Recreate => "Create fresh",
            Self::Abort => "Exit",
        })
    }
}

/// Source of every decision the engine cannot take on its own.
///
/// The console implementation lives in the CLI; tests script the answers.
/// Returning [`ContainDbError::Cancelled`] from any method means the
/// operator is gone (end of input) and the session must roll back.
pub trait Operator {
    /// Asks a yes/no question.
    ///
    /// # Errors
    ///
    /// Returns [`ContainDbError::Cancelled`] if input was interrupted.
    fn confirm(&mut self, question: &Question) -> Result<bool>;

    /// Reads a free-text answer; blank means "use the default".
    ///
    /// # Errors
    ///
    /// Returns [`ContainDbError::Cancelled`] if input was interrupted.
    fn input(&mut self, field: &Field) -> Result<String>;

    /// Picks one of `choices`; `None` means the operator chose to exit.
    ///
    /// # Errors
    ///
    /// Returns [`ContainDbError::Cancelled`] if input was interrupted.
    fn select(&mut self, prompt: &str, choices: &[String]) -> Result<Option<usize>>;

    /// Decides what to do with an existing canonical volume.
    ///
    /// # Errors
    ///
    /// Returns [`ContainDbError::Cancelled`] if input was interrupted.
    fn resolve_volume_conflict(&mut self, volume: &str) -> Result<VolumeResolution>;
}

/// Why a flow ended without doing what was asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// The operator picked "Exit".
    UserExit,
    /// A confirmation was declined.
    Declined,
    /// The operator chose to leave an existing volume alone.
    VolumeConflict,
    /// The operator kept an existing container.
    KeptExisting {
        /// Container name.
        name: String,
    },
    /// No running database the tool can link to.
    NoCompatibleDatabase {
        /// Tool being installed.
        tool: ToolKind,
    },
    /// The host platform cannot install the package.
    UnsupportedPlatform,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserExit => f.write_str("cancelled"),
            Self::Declined => f.write_str("confirmation declined"),
            Self::VolumeConflict => f.write_str("existing volume left untouched, setup aborted"),
            Self::KeptExisting { name } => write!(f, "keeping existing container '{name}'"),
            Self::NoCompatibleDatabase { tool } => {
                write!(f, "no running database {tool} can link to")
            }
            Self::UnsupportedPlatform => f.write_str("only supported on Linux"),
        }
    }
}

/// Structured result of one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A container of this kind already runs; nothing was done.
    AlreadyRunning {
        /// Requested kind.
        kind: ServiceKind,
        /// Catalog port of the kind.
        port: u16,
    },
    /// A database container was started.
    Installed {
        /// Installed kind.
        kind: ServiceKind,
        /// Container name.
        container: String,
        /// Image reference.
        image: String,
        /// Published host port, if any.
        host_port: Option<u16>,
        /// Mounted volume, if any.
        volume: Option<String>,
    },
    /// A companion tool container was started.
    ToolInstalled {
        /// Tool kind.
        tool: ToolKind,
        /// Database the tool was linked to.
        linked: String,
        /// Address of the tool's web interface.
        url: String,
    },
    /// The desktop package was installed.
    CompassInstalled {
        /// Size of the downloaded package.
        bytes: u64,
    },
    /// Running databases.
    Listed(Vec<RunningContainer>),
    /// A resource was removed.
    Removed(ResourceHandle),
    /// The topology was written to `path`.
    Exported {
        /// Descriptor path.
        path: PathBuf,
        /// Exported service names.
        services: Vec<String>,
    },
    /// A descriptor was applied.
    Imported {
        /// Descriptor path.
        path: PathBuf,
        /// Volume sources that do not exist on this host.
        warnings: Vec<ForeignPath>,
    },
    /// There was nothing to act on.
    Nothing {
        /// What was looked for.
        what: &'static str,
    },
    /// The flow stopped before its goal.
    Aborted(AbortReason),
}

/// Companion action suggested after installing `kind`.
#[must_use]
pub const fn companion_for(kind: ServiceKind) -> Option<UserAction> {
    match kind {
        ServiceKind::MySql | ServiceKind::MariaDb => {
            Some(UserAction::InstallTool(ToolKind::PhpMyAdmin))
        }
        ServiceKind::PostgreSql => Some(UserAction::InstallTool(ToolKind::PgAdmin)),
        ServiceKind::Redis => Some(UserAction::InstallTool(ToolKind::RedisInsight)),
        ServiceKind::MongoDb => Some(UserAction::InstallCompass),
        ServiceKind::AxioDb => None,
    }
}

/// Orchestrates user actions against a container runtime.
pub struct Engine<R> {
    runtime: R,
    builder: CommandBuilder,
    packages: CommandBuilder,
    config: ContainDbConfig,
    token: CancellationToken,
    fetcher: Box<dyn Fetch>,
}

impl<R: ContainerRuntime> Engine<R> {
    /// Creates an engine issuing commands through `runtime`.
    pub fn new(runtime: R, config: ContainDbConfig) -> Self {
        Self {
            builder: CommandBuilder::new(config.runtime.clone()),
            packages: CommandBuilder::new(PACKAGE_MANAGER),
            runtime,
            config,
            token: CancellationToken::new(),
            fetcher: Box::new(HttpFetcher),
        }
    }

    /// Stops starting new steps once `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Replaces the asset downloader.
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Box<dyn Fetch>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Session configuration.
    pub const fn config(&self) -> &ContainDbConfig {
        &self.config
    }

    /// Builder for runtime invocations.
    pub const fn builder(&self) -> &CommandBuilder {
        &self.builder
    }

    /// Live registry over this engine's runtime.
    pub const fn registry(&self) -> Registry<'_, R> {
        Registry::new(&self.runtime, &self.builder)
    }

    /// Creates the managed network unless it already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the network is absent and cannot be created.
    pub fn ensure_network(&self) -> Result<ResourceHandle> {
        let network = &self.config.network;
        if self.registry().network_exists(network) {
            tracing::debug!(%network, "managed network present");
            return Ok(ResourceHandle::new(
                ResourceClass::Network,
                network,
                ResourceStatus::ExistingRunning,
            ));
        }
        tracing::info!(%network, "creating managed network");
        self.run(&self.builder.create_network(network))?;
        Ok(ResourceHandle::new(
            ResourceClass::Network,
            network,
            ResourceStatus::CreatedPending,
        ))
    }

    /// Runs one action to completion.
    ///
    /// # Errors
    ///
    /// Returns [`ContainDbError::Cancelled`] once the session is cancelled;
    /// any other error aborts only this action.
    pub fn perform(&self, action: UserAction, operator: &mut dyn Operator) -> Result<Outcome> {
        self.token.check()?;
        tracing::info!(?action, "performing action");
        let outcome = match action {
            UserAction::Install(kind) => self.install(kind, operator),
            UserAction::InstallTool(tool) => self.install_tool(tool, operator),
            UserAction::InstallCompass => self.install_compass(),
            UserAction::List => self.list(),
            UserAction::RemoveContainer => self.remove_container(operator),
            UserAction::RemoveImage => self.remove_image(operator),
            UserAction::RemoveVolume => self.remove_volume(operator),
            UserAction::Export(path) => self.export(&path),
            UserAction::Import(path) => self.import(&path),
        }?;
        tracing::debug!(?outcome, "action finished");
        Ok(outcome)
    }

    /// Executes one mutating invocation.
    fn run(&self, invocation: &Invocation) -> Result<()> {
        self.token.check()?;
        tracing::info!(command = %invocation, "running");
        self.runtime.execute(invocation)
    }

    /// Pulls `image`. A failed pull is not fatal: the image may be local,
    /// and the run step reports the real failure.
    fn pull(&self, image: &str) -> Result<()> {
        match self.run(&self.builder.pull(image)) {
            Err(ContainDbError::Cancelled) => Err(ContainDbError::Cancelled),
            Err(e) => {
                tracing::warn!(%image, error = %e, "pull failed, continuing with local image");
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    /// Picks one of `choices` through the operator, `None` on exit.
    fn pick(
        operator: &mut dyn Operator,
        prompt: &str,
        choices: &[String],
    ) -> Result<Option<String>> {
        let Some(idx) = operator.select(prompt, choices)? else {
            return Ok(None);
        };
        choices
            .get(idx)
            .cloned()
            .map(Some)
            .ok_or_else(|| ContainDbError::InvalidInput {
                field: "selection",
                value: idx.to_string(),
            })
    }
}

/// Parses a host port answer; blank selects `default`.
fn parse_host_port(answer: &str, default: u16) -> Result<u16> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Ok(default);
    }
    match answer.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(ContainDbError::InvalidInput {
            field: "host port",
            value: answer.to_string(),
        }),
    }
}
