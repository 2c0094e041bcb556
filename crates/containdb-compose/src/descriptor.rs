//! Compose descriptor exchanged with the runtime's multi-service apply.
//!
//! Only the fields the exporter produces are modelled; unknown fields in
//! foreign documents are ignored rather than rejected.

use std::collections::BTreeMap;
use std::path::Path;

use containdb_common::error::{ContainDbError, Result};
use serde::{Deserialize, Serialize};

/// A multi-service compose document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeFile {
    /// Services keyed by service name.
    #[serde(default)]
    pub services: BTreeMap<String, ServiceEntry>,
    /// Networks referenced by the services.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub networks: BTreeMap<String, NetworkEntry>,
}

/// One service of a compose document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEntry {
    /// Image reference.
    pub image: String,
    /// Fixed container name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    /// Published ports as `host:container[/proto]`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    /// Volume bindings as `source:target`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    /// Environment variables.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    /// Attached networks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<String>,
    /// Restart policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart: Option<String>,
}

/// A network declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEntry {
    /// Whether the network is managed outside the compose project.
    #[serde(default)]
    pub external: bool,
}

impl ComposeFile {
    /// Parses a compose document.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not valid YAML for this shape.
    pub fn from_yaml(input: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(input)?)
    }

    /// Serializes the document to YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Reads and parses a compose document from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ContainDbError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_yaml(&content)
    }

    /// Writes the document to disk behind a generated-at header comment.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write(&self, path: &Path) -> Result<()> {
        let header = format!(
            "# Generated by {} on {}\n# Volume paths are local to the exporting host.\n",
            containdb_common::constants::APP_NAME,
            chrono::Utc::now().to_rfc3339()
        );
        let body = self.to_yaml()?;
        std::fs::write(path, header + &body).map_err(|e| ContainDbError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        tracing::info!(path = %path.display(), services = self.services.len(), "descriptor written");
        Ok(())
    }
}
