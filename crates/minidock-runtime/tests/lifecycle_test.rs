//! Integration tests for the container lifecycle that need no privileges.
//!
//! Containers are planted directly in a temporary registry, the way a
//! previous `run` would have left them, and driven through the engine.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::io::Read;
use std::path::Path;

use minidock_common::config::RuntimeContext;
use minidock_common::error::MinidockError;
use minidock_common::types::{ContainerId, ContainerStatus};
use minidock_runtime::Engine;
use minidock_runtime::state::ContainerInfo;

fn setup() -> (tempfile::TempDir, Engine) {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = Engine::new(RuntimeContext::rooted_at(dir.path()));
    (dir, engine)
}

fn plant(engine: &Engine, name: &str, status: ContainerStatus) -> ContainerInfo {
    let mut info = ContainerInfo::running(
        ContainerId::generate(),
        name,
        1,
        &["/bin/top".into(), "-b".into()],
        "",
    );
    if status != ContainerStatus::Running {
        info.status = status;
        info.pid = String::new();
    }
    engine.registry().save(&info).expect("save record");
    info
}

/// Snapshot of every path under `root`, for no-mutation checks.
fn tree(root: &Path) -> Vec<String> {
    let mut paths = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            paths.push(path.strip_prefix(root).unwrap().display().to_string());
            if path.is_dir() {
                stack.push(path);
            }
        }
    }
    paths.sort();
    paths
}

// ── Registry ─────────────────────────────────────────────────────────

#[test]
fn record_round_trips_through_ps() {
    let (_dir, engine) = setup();
    let planted = plant(&engine, "web", ContainerStatus::Running);

    let listed = engine.list().unwrap();
    assert_eq!(listed, [planted]);
}

#[test]
fn ps_skips_unparsable_records() {
    let (dir, engine) = setup();
    let _ = plant(&engine, "good", ContainerStatus::Stopped);
    let broken = dir.path().join("registry/broken");
    std::fs::create_dir_all(&broken).unwrap();
    std::fs::write(broken.join("config.json"), "{").unwrap();

    let names: Vec<_> = engine.list().unwrap().into_iter().map(|c| c.name).collect();
    assert_eq!(names, ["good"]);
}

// ── stop ─────────────────────────────────────────────────────────────

#[test]
fn stop_unknown_container_fails_without_mutation() {
    let (dir, engine) = setup();
    let _ = plant(&engine, "web", ContainerStatus::Running);
    let before = tree(dir.path());

    let err = engine.stop("ghost").unwrap_err();
    assert!(matches!(err, MinidockError::NotFound { .. }));
    assert_eq!(tree(dir.path()), before);
}

#[test]
fn stop_with_corrupt_pid_leaves_record_running() {
    let (_dir, engine) = setup();
    let mut info = plant(&engine, "web", ContainerStatus::Running);
    info.pid = "not-a-pid".into();
    engine.registry().save(&info).unwrap();

    assert!(matches!(engine.stop("web"), Err(MinidockError::Config { .. })));
    assert_eq!(
        engine.registry().load("web").unwrap().status,
        ContainerStatus::Running
    );
}

// ── rm ───────────────────────────────────────────────────────────────

#[test]
fn rm_running_container_is_rejected() {
    let (dir, engine) = setup();
    let _ = plant(&engine, "web", ContainerStatus::Running);
    let before = tree(dir.path());

    let err = engine.remove("web").unwrap_err();
    assert!(matches!(
        err,
        MinidockError::StateConflict {
            operation: "remove",
            ..
        }
    ));
    assert_eq!(tree(dir.path()), before);
}

#[test]
fn rm_stopped_container_removes_record_and_workspace() {
    let (dir, engine) = setup();
    let _ = plant(&engine, "web", ContainerStatus::Stopped);
    let workspace = dir.path().join("containers/web");
    for layer in ["lower", "upper", "work", "merged"] {
        std::fs::create_dir_all(workspace.join(layer)).unwrap();
    }
    std::fs::write(workspace.join("upper/written"), b"x").unwrap();

    engine.remove("web").unwrap();

    assert!(!dir.path().join("registry/web").exists());
    assert!(!workspace.exists());
    assert!(engine.list().unwrap().is_empty());
}

#[test]
fn rm_unknown_container_is_not_found() {
    let (_dir, engine) = setup();
    assert!(matches!(
        engine.remove("ghost"),
        Err(MinidockError::NotFound { .. })
    ));
}

// ── logs ─────────────────────────────────────────────────────────────

#[test]
fn logs_of_detached_container_are_returned() {
    let (dir, engine) = setup();
    let _ = plant(&engine, "web", ContainerStatus::Running);
    std::fs::write(dir.path().join("registry/web/container.log"), "hi\n").unwrap();

    assert_eq!(engine.logs("web").unwrap(), "hi\n");
    assert!(matches!(
        engine.logs("ghost"),
        Err(MinidockError::NotFound { .. })
    ));
}

// ── commit ───────────────────────────────────────────────────────────

#[test]
fn commit_archives_the_merged_tree() {
    let (dir, engine) = setup();
    let _ = plant(&engine, "web", ContainerStatus::Running);
    let merged = dir.path().join("containers/web/merged");
    std::fs::create_dir_all(merged.join("etc")).unwrap();
    std::fs::write(merged.join("etc/motd"), "committed\n").unwrap();
    std::os::unix::fs::symlink("/etc/motd", merged.join("motd")).unwrap();

    let archive = engine.commit("web", "snap").unwrap();
    assert_eq!(archive, dir.path().join("images/snap.tar"));

    let decoder = flate2::read::GzDecoder::new(std::fs::File::open(&archive).unwrap());
    let mut tar = tar::Archive::new(decoder);
    let mut motd = String::new();
    let mut link_target = None;
    for entry in tar.entries().unwrap() {
        let mut entry = entry.unwrap();
        let path = entry.path().unwrap().into_owned();
        if path.ends_with("etc/motd") {
            let _ = entry.read_to_string(&mut motd).unwrap();
        } else if path.ends_with("motd") && entry.header().entry_type().is_symlink() {
            link_target = entry.link_name().unwrap().map(|p| p.into_owned());
        }
    }
    assert_eq!(motd, "committed\n");
    assert_eq!(link_target.as_deref(), Some(Path::new("/etc/motd")));
}

#[test]
fn committed_image_can_seed_a_new_lower_layer() {
    let (dir, engine) = setup();
    let _ = plant(&engine, "web", ContainerStatus::Stopped);
    let merged = dir.path().join("containers/web/merged");
    std::fs::create_dir_all(merged.join("bin")).unwrap();
    std::fs::write(merged.join("bin/app"), "#!/bin/sh\n").unwrap();

    let archive = engine.commit("web", "app").unwrap();
    let lower = dir.path().join("containers/next/lower");
    let _ = minidock_image::layer::extract_layer(&archive, &lower).unwrap();

    assert_eq!(
        std::fs::read_to_string(lower.join("bin/app")).unwrap(),
        "#!/bin/sh\n"
    );
}
