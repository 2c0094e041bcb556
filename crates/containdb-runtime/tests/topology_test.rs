//! Export and import of the managed topology.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod support;

use containdb_common::catalog::ServiceKind;
use containdb_common::error::ContainDbError;
use containdb_compose::descriptor::ComposeFile;
use containdb_runtime::backend::memory::{InMemoryRuntime, ModelContainer};
use containdb_runtime::command::Action;
use containdb_runtime::engine::{Outcome, UserAction};
use support::{Answer, ScriptedOperator, engine, managed_runtime, text};

fn install(runtime: &InMemoryRuntime, kind: ServiceKind, answers: Vec<Answer>) {
    let mut operator = ScriptedOperator::new(answers);
    let outcome = engine(runtime)
        .perform(UserAction::Install(kind), &mut operator)
        .expect("install");
    assert!(matches!(outcome, Outcome::Installed { .. }), "{outcome:?}");
}

/// Redis published with restart and a volume, postgres with credentials.
fn populated_runtime() -> InMemoryRuntime {
    let runtime = managed_runtime();
    install(
        &runtime,
        ServiceKind::Redis,
        vec![Answer::Yes, Answer::No, Answer::Yes, Answer::Yes],
    );
    install(
        &runtime,
        ServiceKind::PostgreSql,
        vec![Answer::No, Answer::No, text("app"), text("pw"), Answer::No],
    );
    runtime
}

#[test]
fn export_describes_running_managed_services() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("docker-compose.yml");
    let runtime = populated_runtime()
        .with_container(ModelContainer::new("web", "nginx", "running").on_network("bridge"));

    let outcome = engine(&runtime)
        .perform(UserAction::Export(path.clone()), &mut ScriptedOperator::silent())
        .expect("export");

    assert_eq!(
        outcome,
        Outcome::Exported {
            path: path.clone(),
            services: vec!["postgresql-container".into(), "redis-container".into()],
        }
    );
    let raw = std::fs::read_to_string(&path).expect("descriptor");
    assert!(raw.starts_with("# Generated by ContainDB"));

    let compose = ComposeFile::read(&path).expect("parse");
    let redis = &compose.services["redis-container"];
    assert_eq!(redis.image, "redis");
    assert_eq!(redis.ports, vec!["6379:6379"]);
    assert_eq!(redis.restart.as_deref(), Some("unless-stopped"));
    assert_eq!(redis.volumes, vec!["/var/lib/docker/volumes/redis-data/_data:/data"]);
    assert!(redis.environment.is_empty());

    let postgres = &compose.services["postgresql-container"];
    assert_eq!(postgres.environment["POSTGRES_USER"], "app");
    assert_eq!(postgres.environment["POSTGRES_PASSWORD"], "pw");
    assert!(!postgres.environment.contains_key("PATH"));
    assert!(compose.networks["ContainDB-Network"].external);
}

#[test]
fn export_without_services_writes_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("docker-compose.yml");
    let runtime = managed_runtime()
        .with_container(ModelContainer::new("redis-container", "redis", "exited").on_network("ContainDB-Network"));

    let outcome = engine(&runtime)
        .perform(UserAction::Export(path.clone()), &mut ScriptedOperator::silent())
        .expect("export");

    assert!(matches!(outcome, Outcome::Nothing { .. }));
    assert!(!path.exists());
}

#[test]
fn export_then_import_reproduces_topology() {
    let dir = tempfile::tempdir().expect("tempdir");
    let exported = dir.path().join("source.yml");
    let reexported = dir.path().join("target.yml");
    let source = populated_runtime();
    let _ = engine(&source)
        .perform(UserAction::Export(exported.clone()), &mut ScriptedOperator::silent())
        .expect("export");

    let target = InMemoryRuntime::new();
    let outcome = engine(&target)
        .perform(UserAction::Import(exported.clone()), &mut ScriptedOperator::silent())
        .expect("import");
    let Outcome::Imported { warnings, .. } = outcome else {
        unreachable!("import returns Imported on success");
    };
    assert!(warnings.iter().all(|w| w.service == "redis-container"));
    assert_eq!(target.networks(), vec!["ContainDB-Network"]);

    let _ = engine(&target)
        .perform(UserAction::Export(reexported.clone()), &mut ScriptedOperator::silent())
        .expect("re-export");

    let before = ComposeFile::read(&exported).expect("source descriptor");
    let after = ComposeFile::read(&reexported).expect("target descriptor");
    assert_eq!(before, after);
}

#[test]
fn rejected_descriptor_changes_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broken.yml");
    std::fs::write(&path, "services:\n  broken:\n    container_name: broken\n").expect("write");
    let runtime = InMemoryRuntime::new();

    let err = engine(&runtime)
        .perform(UserAction::Import(path.clone()), &mut ScriptedOperator::silent())
        .expect_err("invalid descriptor");

    assert!(matches!(err, ContainDbError::ImportRejected { ref path, .. } if path.ends_with("broken.yml")));
    assert!(runtime.networks().is_empty());
    assert!(runtime.calls(Action::ApplyCompose).is_empty());
}

#[test]
fn missing_descriptor_is_not_found() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runtime = InMemoryRuntime::new();
    let err = engine(&runtime)
        .perform(
            UserAction::Import(dir.path().join("absent.yml")),
            &mut ScriptedOperator::silent(),
        )
        .expect_err("no file");
    assert!(matches!(err, ContainDbError::NotFound { kind: "descriptor", .. }));
    assert!(runtime.invocations().is_empty());
}

#[test]
fn import_warns_about_foreign_bind_paths() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("foreign.yml");
    std::fs::write(
        &path,
        "services:\n  cache:\n    image: redis\n    volumes:\n      - /nonexistent/containdb/cache:/data\n",
    )
    .expect("write");
    let runtime = managed_runtime();

    let outcome = engine(&runtime)
        .perform(UserAction::Import(path), &mut ScriptedOperator::silent())
        .expect("import");

    let Outcome::Imported { warnings, .. } = outcome else {
        unreachable!("import returns Imported on success");
    };
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].service, "cache");
    assert!(runtime.container("cache").is_some());
}
