//! Detection of host-local volume paths in imported descriptors.
//!
//! Exported descriptors reference volume data by absolute host path, which
//! only exists on the exporting machine. The importer warns about such paths
//! but never rejects a descriptor because of them.

use std::path::{Path, PathBuf};

use serde_yaml::Value;

/// A bind source in a descriptor that does not exist on this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignPath {
    /// Service declaring the binding.
    pub service: String,
    /// Missing host path.
    pub path: PathBuf,
}

/// Returns every absolute bind source that is missing on this host.
///
/// Accepts both the short (`source:target`) and long (`source:` key)
/// volume syntaxes. Named volumes are ignored. Documents that are not
/// mappings yield no findings; rejecting them is the runtime's job.
#[must_use]
pub fn foreign_volume_paths(document: &Value) -> Vec<ForeignPath> {
    foreign_volume_paths_with(document, Path::exists)
}

fn foreign_volume_paths_with(document: &Value, exists: impl Fn(&Path) -> bool) -> Vec<ForeignPath> {
    let Some(services) = document.get("services").and_then(Value::as_mapping) else {
        return Vec::new();
    };

    let mut found = Vec::new();
    for (name, service) in services {
        let service_name = name.as_str().unwrap_or_default().to_string();
        let Some(volumes) = service.get("volumes").and_then(Value::as_sequence) else {
            continue;
        };
        for volume in volumes {
            let source = match volume {
                Value::String(short) => short.split(':').next().map(str::to_string),
                Value::Mapping(_) => volume.get("source").and_then(Value::as_str).map(str::to_string),
                _ => None,
            };
            let Some(source) = source else { continue };
            let path = PathBuf::from(&source);
            if path.is_absolute() && !exists(&path) {
                found.push(ForeignPath {
                    service: service_name.clone(),
                    path,
                });
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).expect("yaml")
    }

    #[test]
    fn missing_absolute_sources_are_reported() {
        let doc = parse(
            r"
services:
  redis-container:
    image: redis
    volumes:
      - /var/lib/docker/volumes/redis-data/_data:/data
      - redis-cache:/cache
",
        );
        let found = foreign_volume_paths_with(&doc, |_| false);
        assert_eq!(
            found,
            vec![ForeignPath {
                service: "redis-container".into(),
                path: PathBuf::from("/var/lib/docker/volumes/redis-data/_data"),
            }]
        );
    }

    #[test]
    fn existing_paths_are_not_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let yaml = format!(
            "services:\n  db:\n    image: mongo\n    volumes:\n      - {}:/data/db\n",
            dir.path().display()
        );
        assert!(foreign_volume_paths(&parse(&yaml)).is_empty());
    }

    #[test]
    fn long_syntax_is_understood() {
        let doc = parse(
            r"
services:
  db:
    image: mongo
    volumes:
      - type: bind
        source: /nowhere/data
        target: /data/db
",
        );
        let found = foreign_volume_paths_with(&doc, |_| false);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, PathBuf::from("/nowhere/data"));
    }

    #[test]
    fn non_mapping_documents_yield_nothing() {
        assert!(foreign_volume_paths(&parse("- just\n- a list\n")).is_empty());
    }
}
