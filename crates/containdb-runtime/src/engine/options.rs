//! Per-install runtime options and their derivation into a run invocation.

use std::fmt;

use containdb_common::catalog::ServiceSpec;
use containdb_common::constants::RESTART_UNLESS_STOPPED;

use crate::command::{Action, CommandBuilder, Invocation, OptionFragment};

/// A credential bound to the environment variable the image reads.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Environment variable.
    pub env: &'static str,
    /// Value typed by the operator.
    pub value: String,
    /// Redact the value whenever it is displayed.
    pub secret: bool,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = if self.secret { "****" } else { self.value.as_str() };
        f.debug_struct("Credential")
            .field("env", &self.env)
            .field("value", &value)
            .finish()
    }
}

/// Options gathered for one database install.
///
/// Deriving the invocation consumes the options, so they cannot change
/// once the command exists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeOptions {
    /// Host port the catalog port is published on.
    pub host_port: Option<u16>,
    /// Apply the `unless-stopped` restart policy.
    pub restart: bool,
    /// Volume mounted at the catalog data path.
    pub volume: Option<String>,
    /// Credentials, in catalog order.
    pub credentials: Vec<Credential>,
}

impl RuntimeOptions {
    /// Builds the `run` invocation for `spec` attached to `network`.
    #[must_use]
    pub fn into_invocation(
        self,
        builder: &CommandBuilder,
        spec: &ServiceSpec,
        container: &str,
        network: &str,
    ) -> Invocation {
        let mut fragments = vec![
            OptionFragment::Network(network.to_string()),
            OptionFragment::Name(container.to_string()),
            OptionFragment::Arg(spec.image.to_string()),
        ];
        if let Some(host) = self.host_port {
            fragments.push(OptionFragment::Publish {
                host: host.to_string(),
                container: spec.port.to_string(),
            });
        }
        if self.restart {
            fragments.push(OptionFragment::Restart(RESTART_UNLESS_STOPPED.to_string()));
        }
        if let Some(volume) = self.volume {
            fragments.push(OptionFragment::Mount {
                source: volume,
                target: spec.data_path.to_string(),
            });
        }
        fragments.extend(self.credentials.into_iter().map(|c| {
            if c.secret {
                OptionFragment::secret_env(c.env, c.value)
            } else {
                OptionFragment::env(c.env, c.value)
            }
        }));
        builder.build(Action::RunContainer, fragments)
    }
}
