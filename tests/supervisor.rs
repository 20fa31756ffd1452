//! Supervisor bookkeeping against real scripts in a temp directory.
//!
//! No bus is involved: like the original daemon's tests, the manager runs
//! with no client attached, which exercises discovery, grouping, removal,
//! and restart bookkeeping without serving anything.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use shellvisor::config::Config;
use shellvisor::events::EventBus;
use shellvisor::subject::SubjectRewriter;
use shellvisor::supervisor::{ScriptEvent, ServiceManager};

fn write_script(dir: &Path, name: &str, service: &str, endpoints: &[(&str, &str)]) -> PathBuf {
    let endpoint_json: Vec<String> = endpoints
        .iter()
        .map(|(ep_name, subject)| format!(r#"{{"name":"{ep_name}","subject":"{subject}"}}"#))
        .collect();
    let body = format!(
        "#!/bin/sh\nif [ \"$1\" = \"info\" ]; then\n  printf '%s' '{{\"name\":\"{service}\",\"version\":\"1.0.0\",\"endpoints\":[{eps}]}}'\n  exit 0\nfi\ncat\n",
        eps = endpoint_json.join(",")
    );
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn config_for(dir: &Path) -> Config {
    Config::from_toml(&format!(
        "bus_url = \"nats://127.0.0.1:4222\"\nscripts_dir = \"{}\"\nhost = \"web01\"\n",
        dir.display()
    ))
    .unwrap()
}

fn manager(dir: &Path, root: CancellationToken) -> Arc<ServiceManager> {
    Arc::new(ServiceManager::new(
        &config_for(dir),
        None,
        EventBus::default(),
        SubjectRewriter::new("web01"),
        root,
    ))
}

#[tokio::test]
async fn discovery_groups_scripts_by_service_name() {
    let dir = tempfile::tempdir().unwrap();
    let facts = write_script(dir.path(), "facts.sh", "Sys", &[("Facts", "sys.facts")]);
    let hw = write_script(dir.path(), "hw.sh", "Sys", &[("Hw", "sys.hw")]);
    let greet = write_script(dir.path(), "greet.sh", "G", &[("Hi", "g.hi")]);

    let mgr = manager(dir.path(), CancellationToken::new());
    mgr.discover().await.unwrap();

    assert_eq!(mgr.service_count().await, 2);
    assert_eq!(mgr.service_of(&facts).await.as_deref(), Some("Sys"));
    assert_eq!(mgr.service_of(&hw).await.as_deref(), Some("Sys"));
    assert_eq!(mgr.service_of(&greet).await.as_deref(), Some("G"));

    let sys = mgr.service("Sys").await.unwrap();
    assert_eq!(sys.script_count().await, 2);
    let owners = sys.endpoint_owners().await;
    assert_eq!(owners["web01.sys.facts"], facts);
    assert_eq!(owners["web01.sys.hw"], hw);
}

#[tokio::test]
async fn discovery_skips_invalid_candidates() {
    let dir = tempfile::tempdir().unwrap();
    write_script(dir.path(), "good.sh", "G", &[("Hi", "g.hi")]);

    // Not a .sh file.
    std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
    // Executable but emits garbage.
    let garbage = dir.path().join("garbage.sh");
    std::fs::write(&garbage, "#!/bin/sh\necho not-json\n").unwrap();
    let mut perms = std::fs::metadata(&garbage).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&garbage, perms).unwrap();
    // Valid descriptor but not executable.
    let locked = dir.path().join("locked.sh");
    std::fs::write(&locked, "#!/bin/sh\necho '{}'\n").unwrap();
    let mut perms = std::fs::metadata(&locked).unwrap().permissions();
    perms.set_mode(0o644);
    std::fs::set_permissions(&locked, perms).unwrap();

    let mgr = manager(dir.path(), CancellationToken::new());
    mgr.discover().await.unwrap();

    assert_eq!(mgr.service_count().await, 1);
    assert!(mgr.service("G").await.is_some());
    assert!(mgr.service_of(&garbage).await.is_none());
    assert!(mgr.service_of(&locked).await.is_none());
}

#[tokio::test]
async fn discovery_tolerates_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("not-there");
    let mgr = manager(&missing, CancellationToken::new());
    mgr.discover().await.unwrap();
    assert_eq!(mgr.service_count().await, 0);
}

#[tokio::test]
async fn duplicate_admission_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let greet = write_script(dir.path(), "greet.sh", "G", &[("Hi", "g.hi")]);

    let mgr = manager(dir.path(), CancellationToken::new());
    mgr.handle_candidate(greet.clone()).await;
    mgr.handle_candidate(greet.clone()).await;

    assert_eq!(mgr.service_count().await, 1);
    assert_eq!(mgr.service("G").await.unwrap().script_count().await, 1);
}

#[tokio::test]
async fn removing_last_script_tears_service_down() {
    let dir = tempfile::tempdir().unwrap();
    let greet = write_script(dir.path(), "greet.sh", "G", &[("Hi", "g.hi")]);

    let mgr = manager(dir.path(), CancellationToken::new());
    mgr.handle_candidate(greet.clone()).await;
    assert_eq!(mgr.service_count().await, 1);

    mgr.remove_script(&greet).await;
    assert_eq!(mgr.service_count().await, 0);
    assert!(mgr.service("G").await.is_none());
    assert!(mgr.service_of(&greet).await.is_none());
}

#[tokio::test]
async fn removing_one_of_two_scripts_keeps_the_group() {
    let dir = tempfile::tempdir().unwrap();
    let facts = write_script(dir.path(), "facts.sh", "Sys", &[("Facts", "sys.facts")]);
    let hw = write_script(dir.path(), "hw.sh", "Sys", &[("Hw", "sys.hw")]);

    let mgr = manager(dir.path(), CancellationToken::new());
    mgr.handle_candidate(facts.clone()).await;
    mgr.handle_candidate(hw.clone()).await;

    mgr.remove_script(&facts).await;
    assert_eq!(mgr.service_count().await, 1);

    let sys = mgr.service("Sys").await.unwrap();
    assert_eq!(sys.script_count().await, 1);
    let owners = sys.endpoint_owners().await;
    assert!(!owners.contains_key("web01.sys.facts"));
    assert_eq!(owners["web01.sys.hw"], hw);
}

#[tokio::test]
async fn duplicate_subject_routes_to_first_writer_until_removal() {
    let dir = tempfile::tempdir().unwrap();
    let facts = write_script(dir.path(), "facts.sh", "Sys", &[("Facts", "sys.facts")]);
    let dup = write_script(dir.path(), "dup.sh", "Sys", &[("Dup", "sys.facts")]);

    let mgr = manager(dir.path(), CancellationToken::new());
    mgr.handle_candidate(facts.clone()).await;
    mgr.handle_candidate(dup.clone()).await;

    // The later claimant is a member, but the subject routes to the first.
    let sys = mgr.service("Sys").await.unwrap();
    assert_eq!(sys.script_count().await, 2);
    assert_eq!(sys.endpoint_owners().await["web01.sys.facts"], facts);

    // After the first writer leaves, the re-merge promotes the survivor.
    mgr.remove_script(&facts).await;
    let sys = mgr.service("Sys").await.unwrap();
    assert_eq!(sys.endpoint_owners().await["web01.sys.facts"], dup);
}

#[tokio::test]
async fn modification_with_same_name_restarts_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let greet = write_script(dir.path(), "greet.sh", "G", &[("Hi", "g.hi")]);

    let mgr = manager(dir.path(), CancellationToken::new());
    mgr.handle_candidate(greet.clone()).await;

    // Same service name, different endpoint set.
    write_script(dir.path(), "greet.sh", "G", &[("Hi", "g.hi"), ("Bye", "g.bye")]);
    mgr.handle_modified(greet.clone()).await;

    let g = mgr.service("G").await.unwrap();
    let owners = g.endpoint_owners().await;
    assert_eq!(owners.len(), 2);
    assert!(owners.contains_key("web01.g.bye"));
}

#[tokio::test]
async fn modification_changing_name_regroups_the_script() {
    let dir = tempfile::tempdir().unwrap();
    let greet = write_script(dir.path(), "greet.sh", "G", &[("Hi", "g.hi")]);

    let mgr = manager(dir.path(), CancellationToken::new());
    mgr.handle_candidate(greet.clone()).await;
    assert!(mgr.service("G").await.is_some());

    write_script(dir.path(), "greet.sh", "G2", &[("Hi", "g.hi")]);
    mgr.handle_modified(greet.clone()).await;

    assert!(mgr.service("G").await.is_none());
    assert!(mgr.service("G2").await.is_some());
    assert_eq!(mgr.service_of(&greet).await.as_deref(), Some("G2"));
}

#[tokio::test]
async fn modification_that_invalidates_removes_the_script() {
    let dir = tempfile::tempdir().unwrap();
    let greet = write_script(dir.path(), "greet.sh", "G", &[("Hi", "g.hi")]);

    let mgr = manager(dir.path(), CancellationToken::new());
    mgr.handle_candidate(greet.clone()).await;

    std::fs::write(&greet, "#!/bin/sh\necho broken\n").unwrap();
    let mut perms = std::fs::metadata(&greet).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&greet, perms).unwrap();
    mgr.handle_modified(greet.clone()).await;

    assert_eq!(mgr.service_count().await, 0);
    assert!(mgr.service_of(&greet).await.is_none());
}

#[tokio::test]
async fn event_loop_applies_events_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let greet = write_script(dir.path(), "greet.sh", "G", &[("Hi", "g.hi")]);

    let root = CancellationToken::new();
    let mgr = manager(dir.path(), root.clone());
    let sender = mgr.sender();
    let loop_task = tokio::spawn(Arc::clone(&mgr).run());

    // Wait out discovery (which already admits greet.sh), then remove and
    // re-create through the event channel.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(mgr.service_count().await, 1);

    sender.send(ScriptEvent::Removed(greet.clone())).unwrap();
    sender.send(ScriptEvent::Created(greet.clone())).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(mgr.service_count().await, 1);
    assert_eq!(mgr.service_of(&greet).await.as_deref(), Some("G"));

    root.cancel();
    loop_task.await.unwrap().unwrap();
}
