//! Snapshot → descriptor → disk pipeline.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use containdb_common::types::{ContainerDetails, PortMapping};
use containdb_compose::descriptor::ComposeFile;
use containdb_compose::paths::foreign_volume_paths;
use containdb_compose::snapshot::TopologySnapshot;

fn container(name: &str, image: &str, source: &str) -> ContainerDetails {
    ContainerDetails {
        name: name.into(),
        image: image.into(),
        status: "running".into(),
        ports: vec![PortMapping {
            host: "16379".into(),
            container: "6379".into(),
            protocol: None,
        }],
        mounts: vec![(source.into(), "/data".into())],
        env: vec!["PATH=/usr/bin".into(), "REDIS_ARGS=--appendonly yes".into()],
        restart: Some("unless-stopped".into()),
        networks: vec!["ContainDB-Network".into()],
    }
}

#[test]
fn written_descriptor_reads_back_identically() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("docker-compose.yml");
    let source = dir.path().join("redis-data");
    std::fs::create_dir(&source).expect("mkdir");

    let snapshot = TopologySnapshot::capture(
        "ContainDB-Network",
        vec![(
            container("redis-container", "redis", &source.display().to_string()),
            vec!["PATH=/usr/bin".into()],
        )],
    );
    let compose = snapshot.to_compose();
    compose.write(&path).expect("write");

    let read = ComposeFile::read(&path).expect("read");
    assert_eq!(read, compose);
    assert_eq!(
        read.services["redis-container"].environment["REDIS_ARGS"],
        "--appendonly yes"
    );

    let identity = snapshot.identity();
    assert_eq!(identity.len(), 1);
    assert!(identity.contains(&(
        "redis-container".to_string(),
        "redis".to_string(),
        vec!["16379:6379".to_string()]
    )));
}

#[test]
fn descriptor_from_another_host_reports_missing_sources() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("docker-compose.yml");
    let present = dir.path().join("present");
    std::fs::create_dir(&present).expect("mkdir");

    let snapshot = TopologySnapshot::capture(
        "ContainDB-Network",
        vec![
            (
                container("redis-container", "redis", "/nonexistent/exporting-host/redis"),
                vec![],
            ),
            (
                container("mongodb-container", "mongo", &present.display().to_string()),
                vec![],
            ),
        ],
    );
    snapshot.to_compose().write(&path).expect("write");

    let raw = std::fs::read_to_string(&path).expect("read");
    let document: serde_yaml::Value = serde_yaml::from_str(&raw).expect("yaml");
    let foreign = foreign_volume_paths(&document);

    assert_eq!(foreign.len(), 1);
    assert_eq!(foreign[0].service, "redis-container");
    assert!(foreign[0].path.ends_with("redis"));
}
