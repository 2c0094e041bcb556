//! Deterministic construction of runtime invocations.
//!
//! An [`Invocation`] is an ordered argument vector for one runtime command.
//! Every option value is its own argument; nothing is ever joined into a
//! shell string, so ports, passwords, and paths supplied by the user cannot
//! be interpreted as shell syntax. Building an invocation has no side effect.

use std::fmt;
use std::path::{Path, PathBuf};

/// Base command of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// `run -d` a new container.
    RunContainer,
    /// `rm` a container.
    RemoveContainer,
    /// `ps` container listing.
    ListContainers,
    /// `container inspect`.
    InspectContainer,
    /// `volume create`.
    CreateVolume,
    /// `volume rm`.
    RemoveVolume,
    /// `volume inspect`.
    InspectVolume,
    /// `volume ls`.
    ListVolumes,
    /// `network create`.
    CreateNetwork,
    /// `network inspect`.
    InspectNetwork,
    /// `pull` an image.
    PullImage,
    /// `image rm`.
    RemoveImage,
    /// `image ls`.
    ListImages,
    /// `image inspect`.
    InspectImage,
    /// `image prune`.
    PruneImages,
    /// `compose -f FILE config --quiet`.
    ValidateCompose,
    /// `compose -f FILE up -d`.
    ApplyCompose,
    /// `-i PACKAGE` against the host package manager.
    InstallPackage,
}

impl Action {
    /// Arguments preceding the option fragments.
    #[must_use]
    pub const fn prefix(self) -> &'static [&'static str] {
        match self {
            Self::RunContainer => &["run", "-d"],
            Self::RemoveContainer => &["rm"],
            Self::ListContainers => &["ps"],
            Self::InspectContainer => &["container", "inspect"],
            Self::CreateVolume => &["volume", "create"],
            Self::RemoveVolume => &["volume", "rm"],
            Self::InspectVolume => &["volume", "inspect"],
            Self::ListVolumes => &["volume", "ls"],
            Self::CreateNetwork => &["network", "create"],
            Self::InspectNetwork => &["network", "inspect"],
            Self::PullImage => &["pull"],
            Self::RemoveImage => &["image", "rm"],
            Self::ListImages => &["image", "ls"],
            Self::InspectImage => &["image", "inspect"],
            Self::PruneImages => &["image", "prune"],
            Self::ValidateCompose | Self::ApplyCompose => &["compose"],
            Self::InstallPackage => &["-i"],
        }
    }

    /// Arguments following the option fragments.
    #[must_use]
    pub const fn suffix(self) -> &'static [&'static str] {
        match self {
            Self::ValidateCompose => &["config", "--quiet"],
            Self::ApplyCompose => &["up", "-d"],
            _ => &[],
        }
    }

    /// Whether executing this action changes runtime state.
    #[must_use]
    pub const fn is_mutating(self) -> bool {
        matches!(
            self,
            Self::RunContainer
                | Self::RemoveContainer
                | Self::CreateVolume
                | Self::RemoveVolume
                | Self::CreateNetwork
                | Self::PullImage
                | Self::RemoveImage
                | Self::PruneImages
                | Self::ApplyCompose
                | Self::InstallPackage
        )
    }
}

/// One structured option of an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionFragment {
    /// A bare flag such as `-f` or `-a`.
    Flag(&'static str),
    /// `--filter key=value`.
    Filter {
        /// Filter key.
        key: &'static str,
        /// Filter value.
        value: String,
    },
    /// `--format template`.
    Format(String),
    /// `-f path` naming a descriptor file.
    File(PathBuf),
    /// `--network name`.
    Network(String),
    /// `-p host:container`.
    Publish {
        /// Host port.
        host: String,
        /// Container port.
        container: String,
    },
    /// `--restart policy`.
    Restart(String),
    /// `-v source:target`.
    Mount {
        /// Volume name or host path.
        source: String,
        /// Path inside the container.
        target: String,
    },
    /// `-e key=value`.
    Env {
        /// Variable name.
        key: String,
        /// Variable value.
        value: String,
        /// Redact the value when the invocation is displayed.
        secret: bool,
    },
    /// `--name name`.
    Name(String),
    /// A positional argument (image reference, resource name, ID).
    Arg(String),
}

impl OptionFragment {
    /// Plain environment assignment.
    #[must_use]
    pub fn env(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Env {
            key: key.into(),
            value: value.into(),
            secret: false,
        }
    }

    /// Environment assignment whose value is redacted on display.
    #[must_use]
    pub fn secret_env(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Env {
            key: key.into(),
            value: value.into(),
            secret: true,
        }
    }

    /// Filter fragment.
    #[must_use]
    pub fn filter(key: &'static str, value: impl Into<String>) -> Self {
        Self::Filter {
            key,
            value: value.into(),
        }
    }

    /// Position in the canonical emission order.
    const fn rank(&self) -> u8 {
        match self {
            Self::Flag(_) => 0,
            Self::Filter { .. } => 1,
            Self::Format(_) => 2,
            Self::File(_) => 3,
            Self::Network(_) => 4,
            Self::Publish { .. } => 5,
            Self::Restart(_) => 6,
            Self::Mount { .. } => 7,
            Self::Env { .. } => 8,
            Self::Name(_) => 9,
            Self::Arg(_) => 10,
        }
    }

    /// Whether any value of the fragment is empty.
    fn is_empty(&self) -> bool {
        match self {
            Self::Flag(flag) => flag.is_empty(),
            Self::Filter { value, .. } => value.is_empty(),
            Self::Format(v) | Self::Network(v) | Self::Restart(v) | Self::Name(v) | Self::Arg(v) => {
                v.is_empty()
            }
            Self::File(path) => path.as_os_str().is_empty(),
            Self::Publish { host, container } => host.is_empty() || container.is_empty(),
            Self::Mount { source, target } => source.is_empty() || target.is_empty(),
            Self::Env { key, value, .. } => key.is_empty() || value.is_empty(),
        }
    }

    fn emit(&self, args: &mut Vec<String>) {
        match self {
            Self::Flag(flag) => args.push((*flag).to_string()),
            Self::Filter { key, value } => {
                args.push("--filter".into());
                args.push(format!("{key}={value}"));
            }
            Self::Format(template) => {
                args.push("--format".into());
                args.push(template.clone());
            }
            Self::File(path) => {
                args.push("-f".into());
                args.push(path.display().to_string());
            }
            Self::Network(name) => {
                args.push("--network".into());
                args.push(name.clone());
            }
            Self::Publish { host, container } => {
                args.push("-p".into());
                args.push(format!("{host}:{container}"));
            }
            Self::Restart(policy) => {
                args.push("--restart".into());
                args.push(policy.clone());
            }
            Self::Mount { source, target } => {
                args.push("-v".into());
                args.push(format!("{source}:{target}"));
            }
            Self::Env { key, value, .. } => {
                args.push("-e".into());
                args.push(format!("{key}={value}"));
            }
            Self::Name(name) => {
                args.push("--name".into());
                args.push(name.clone());
            }
            Self::Arg(value) => args.push(value.clone()),
        }
    }
}

/// A fully built runtime command. Pure value; executing it is the
/// runtime's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    action: Action,
    fragments: Vec<OptionFragment>,
    args: Vec<String>,
}

impl Invocation {
    /// Runtime binary.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Base action.
    #[must_use]
    pub const fn action(&self) -> Action {
        self.action
    }

    /// Non-empty fragments in canonical order.
    #[must_use]
    pub fn fragments(&self) -> &[OptionFragment] {
        &self.fragments
    }

    /// Argument vector passed to the runtime binary.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns the first positional argument, if any.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.fragments.iter().find_map(|f| match f {
            OptionFragment::Arg(v) => Some(v.as_str()),
            _ => None,
        })
    }

    /// Returns whether the invocation carries `flag`.
    #[must_use]
    pub fn has_flag(&self, flag: &str) -> bool {
        self.fragments
            .iter()
            .any(|f| matches!(f, OptionFragment::Flag(x) if *x == flag))
    }

    /// Command line for display, with secret values redacted and
    /// arguments quoted where a shell would split them.
    #[must_use]
    pub fn redacted(&self) -> String {
        let mut args = Vec::with_capacity(self.args.len());
        self.action
            .prefix()
            .iter()
            .for_each(|a| args.push((*a).to_string()));
        for fragment in &self.fragments {
            match fragment {
                OptionFragment::Env {
                    key, secret: true, ..
                } => {
                    args.push("-e".into());
                    args.push(format!("{key}=****"));
                }
                other => other.emit(&mut args),
            }
        }
        self.action
            .suffix()
            .iter()
            .for_each(|a| args.push((*a).to_string()));

        std::iter::once(self.program.clone())
            .chain(args.iter().map(|a| quote(a)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

fn quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@,+%{}".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Builds invocations for a given runtime binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBuilder {
    program: String,
}

impl CommandBuilder {
    /// Creates a builder targeting `program`.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Runtime binary.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Builds an invocation from an action and option fragments.
    ///
    /// Empty fragments are dropped; the rest are emitted in canonical
    /// order (flags and filters first, positionals last), keeping the
    /// relative order of fragments of the same kind.
    #[must_use]
    pub fn build(
        &self,
        action: Action,
        fragments: impl IntoIterator<Item = OptionFragment>,
    ) -> Invocation {
        let mut fragments: Vec<_> = fragments.into_iter().filter(|f| !f.is_empty()).collect();
        fragments.sort_by_key(OptionFragment::rank);

        let mut args: Vec<String> = action.prefix().iter().map(|a| (*a).to_string()).collect();
        for fragment in &fragments {
            fragment.emit(&mut args);
        }
        args.extend(action.suffix().iter().map(|a| (*a).to_string()));

        Invocation {
            program: self.program.clone(),
            action,
            fragments,
            args,
        }
    }

    /// `pull IMAGE`.
    #[must_use]
    pub fn pull(&self, image: &str) -> Invocation {
        self.build(Action::PullImage, [OptionFragment::Arg(image.into())])
    }

    /// `rm -f NAME`.
    #[must_use]
    pub fn force_remove_container(&self, name: &str) -> Invocation {
        self.build(
            Action::RemoveContainer,
            [OptionFragment::Flag("-f"), OptionFragment::Arg(name.into())],
        )
    }

    /// `volume create NAME`; the runtime treats an existing name as success.
    #[must_use]
    pub fn create_volume(&self, name: &str) -> Invocation {
        self.build(Action::CreateVolume, [OptionFragment::Arg(name.into())])
    }

    /// `volume rm NAME`.
    #[must_use]
    pub fn remove_volume(&self, name: &str) -> Invocation {
        self.build(Action::RemoveVolume, [OptionFragment::Arg(name.into())])
    }

    /// `image rm REF`.
    #[must_use]
    pub fn remove_image(&self, reference: &str) -> Invocation {
        self.build(Action::RemoveImage, [OptionFragment::Arg(reference.into())])
    }

    /// `image prune -f`.
    #[must_use]
    pub fn prune_images(&self) -> Invocation {
        self.build(Action::PruneImages, [OptionFragment::Flag("-f")])
    }

    /// `network create NAME`.
    #[must_use]
    pub fn create_network(&self, name: &str) -> Invocation {
        self.build(Action::CreateNetwork, [OptionFragment::Arg(name.into())])
    }

    /// `compose -f FILE config --quiet`.
    #[must_use]
    pub fn validate_compose(&self, file: &Path) -> Invocation {
        self.build(
            Action::ValidateCompose,
            [OptionFragment::File(file.to_path_buf())],
        )
    }

    /// `compose -f FILE up -d`.
    #[must_use]
    pub fn apply_compose(&self, file: &Path) -> Invocation {
        self.build(Action::ApplyCompose, [OptionFragment::File(file.to_path_buf())])
    }

    /// `-i PACKAGE`; build with the package manager as program.
    #[must_use]
    pub fn install_package(&self, package: &Path) -> Invocation {
        self.build(
            Action::InstallPackage,
            [OptionFragment::Arg(package.display().to_string())],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docker() -> CommandBuilder {
        CommandBuilder::new("docker")
    }

    #[test]
    fn run_arguments_follow_canonical_order() {
        let inv = docker().build(
            Action::RunContainer,
            [
                OptionFragment::Arg("postgres".into()),
                OptionFragment::Name("postgresql-container".into()),
                OptionFragment::secret_env("POSTGRES_PASSWORD", "pw"),
                OptionFragment::env("POSTGRES_USER", "root"),
                OptionFragment::Mount {
                    source: "postgresql-data".into(),
                    target: "/var/lib/postgresql/data".into(),
                },
                OptionFragment::Restart("unless-stopped".into()),
                OptionFragment::Publish {
                    host: "5432".into(),
                    container: "5432".into(),
                },
                OptionFragment::Network("ContainDB-Network".into()),
            ],
        );
        assert_eq!(
            inv.args(),
            [
                "run",
                "-d",
                "--network",
                "ContainDB-Network",
                "-p",
                "5432:5432",
                "--restart",
                "unless-stopped",
                "-v",
                "postgresql-data:/var/lib/postgresql/data",
                "-e",
                "POSTGRES_PASSWORD=pw",
                "-e",
                "POSTGRES_USER=root",
                "--name",
                "postgresql-container",
                "postgres",
            ]
        );
    }

    #[test]
    fn identical_input_yields_identical_output() {
        let make = || {
            docker().build(
                Action::ListContainers,
                [
                    OptionFragment::Flag("-a"),
                    OptionFragment::filter("status", "exited"),
                    OptionFragment::Format("{{.ID}}".into()),
                ],
            )
        };
        assert_eq!(make(), make());
        assert_eq!(make().args(), make().args());
    }

    #[test]
    fn empty_fragments_are_omitted() {
        let inv = docker().build(
            Action::RunContainer,
            [
                OptionFragment::Network("ContainDB-Network".into()),
                OptionFragment::Publish {
                    host: String::new(),
                    container: "6379".into(),
                },
                OptionFragment::Restart(String::new()),
                OptionFragment::env("EMPTY", ""),
                OptionFragment::Name("redis-container".into()),
                OptionFragment::Arg("redis".into()),
            ],
        );
        assert_eq!(
            inv.args(),
            ["run", "-d", "--network", "ContainDB-Network", "--name", "redis-container", "redis"]
        );
        assert!(inv.args().iter().all(|a| !a.is_empty()));
    }

    #[test]
    fn shell_metacharacters_stay_inside_one_argument() {
        let inv = docker().build(
            Action::RunContainer,
            [
                OptionFragment::secret_env("MYSQL_ROOT_PASSWORD", "p@ss; rm -rf / $(id)"),
                OptionFragment::Arg("mysql".into()),
            ],
        );
        assert!(inv.args().contains(&"MYSQL_ROOT_PASSWORD=p@ss; rm -rf / $(id)".to_string()));
    }

    #[test]
    fn display_redacts_secrets_and_quotes() {
        let inv = docker().build(
            Action::RunContainer,
            [
                OptionFragment::secret_env("MYSQL_ROOT_PASSWORD", "hunter2"),
                OptionFragment::env("GREETING", "hello world"),
                OptionFragment::Arg("mysql".into()),
            ],
        );
        let shown = inv.to_string();
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("MYSQL_ROOT_PASSWORD=****"));
        assert!(shown.contains("'GREETING=hello world'"));
        assert!(shown.starts_with("docker run -d"));
    }

    #[test]
    fn compose_file_precedes_subcommand() {
        let inv = docker().apply_compose(Path::new("stack.yml"));
        assert_eq!(inv.args(), ["compose", "-f", "stack.yml", "up", "-d"]);
        let check = docker().validate_compose(Path::new("stack.yml"));
        assert_eq!(check.args(), ["compose", "-f", "stack.yml", "config", "--quiet"]);
    }

    #[test]
    fn mutating_classification() {
        assert!(Action::RunContainer.is_mutating());
        assert!(Action::PruneImages.is_mutating());
        assert!(!Action::ListContainers.is_mutating());
        assert!(!Action::ValidateCompose.is_mutating());
        assert!(!Action::InspectVolume.is_mutating());
    }

    #[test]
    fn package_install_targets_package_manager() {
        let inv = CommandBuilder::new("dpkg").install_package(Path::new("/tmp/mongodb-compass.deb"));
        assert_eq!(inv.program(), "dpkg");
        assert_eq!(inv.args(), ["-i", "/tmp/mongodb-compass.deb"]);
        assert!(inv.action().is_mutating());
    }

    #[test]
    fn force_remove_is_flag_then_name() {
        let inv = docker().force_remove_container("redis-container");
        assert_eq!(inv.args(), ["rm", "-f", "redis-container"]);
        assert!(inv.has_flag("-f"));
        assert_eq!(inv.target(), Some("redis-container"));
    }
}
