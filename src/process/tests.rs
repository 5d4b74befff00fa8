//! Tests for the process handle
//!
//! These spawn real short-lived Unix processes.

use super::*;
use crate::core::error::SpawnError;
use std::time::Instant;
use tempfile::TempDir;

fn sh(name: &str, script: &str) -> ProcessSpec {
    ProcessSpec::new(
        name,
        vec!["sh".to_string(), "-c".to_string(), script.to_string()],
    )
}

#[test]
fn test_process_spec_builder() {
    let spec = ProcessSpec::new("backend", vec!["python".into(), "run.py".into()])
        .with_working_dir("/srv/app");
    assert_eq!(spec.name, "backend");
    assert_eq!(spec.working_dir, PathBuf::from("/srv/app"));
    assert_eq!(spec.display_command(), "python run.py");
}

#[test]
fn test_snapshot_for_empty_slot() {
    let snapshot = ProcessSnapshot::not_started("backend");
    assert_eq!(snapshot.state, ProcessState::NotStarted);
    assert!(snapshot.pid.is_none());
    assert!(!snapshot.is_running());
}

#[tokio::test]
async fn test_start_empty_command_fails() {
    let result = ProcessHandle::start(ProcessSpec::new("frontend", vec![]));
    assert!(matches!(result, Err(SpawnError::EmptyCommand { .. })));
}

#[tokio::test]
async fn test_start_missing_executable_fails() {
    let spec = ProcessSpec::new(
        "backend",
        vec!["/nonexistent/solaria-dev-missing-binary".to_string()],
    );
    match ProcessHandle::start(spec) {
        Err(SpawnError::NotFound { name, program }) => {
            assert_eq!(name, "backend");
            assert!(program.ends_with("solaria-dev-missing-binary"));
        }
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_start_and_terminate() {
    let mut handle = ProcessHandle::start(sh("backend", "sleep 30")).unwrap();
    assert_eq!(handle.state(), ProcessState::Running);
    assert!(handle.pid().is_some());
    assert!(!handle.has_exited());

    handle.terminate(Duration::from_secs(5)).await;
    assert_eq!(handle.state(), ProcessState::Exited);
    assert!(handle.has_exited());

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.state, ProcessState::Exited);
    assert_eq!(snapshot.pid, handle.pid());
}

#[cfg(unix)]
#[tokio::test]
async fn test_terminate_is_idempotent() {
    let mut handle = ProcessHandle::start(sh("frontend", "sleep 30")).unwrap();
    handle.terminate(Duration::from_secs(5)).await;
    let first = handle.snapshot();

    handle.terminate(Duration::from_secs(5)).await;
    assert_eq!(handle.snapshot(), first);
}

#[cfg(unix)]
#[tokio::test]
async fn test_terminate_escalates_to_kill() {
    // Both the shell and its sleep inherit the ignored SIGTERM
    let mut handle = ProcessHandle::start(sh("backend", "trap '' TERM; sleep 30")).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    handle.terminate(Duration::from_millis(200)).await;

    assert_eq!(handle.state(), ProcessState::Exited);
    assert_eq!(handle.exit_code(), None);
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[cfg(unix)]
#[tokio::test]
async fn test_wait_returns_exit_code() {
    let mut handle = ProcessHandle::start(sh("backend", "exit 3")).unwrap();
    assert_eq!(handle.wait().await, Some(3));
    assert_eq!(handle.state(), ProcessState::Exited);

    // Already exited: returns immediately with the recorded code
    assert_eq!(handle.wait().await, Some(3));
    assert!(handle.wait_timeout(Duration::from_millis(10)).await);
}

#[cfg(unix)]
#[tokio::test]
async fn test_wait_timeout_on_live_process() {
    let mut handle = ProcessHandle::start(sh("backend", "sleep 30")).unwrap();
    assert!(!handle.wait_timeout(Duration::from_millis(100)).await);
    assert_eq!(handle.state(), ProcessState::Running);
    handle.terminate(Duration::from_secs(5)).await;
}

#[cfg(unix)]
#[tokio::test]
async fn test_terminate_after_natural_exit_is_noop() {
    let mut handle = ProcessHandle::start(sh("backend", "exit 0")).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    handle.terminate(Duration::from_secs(5)).await;
    assert_eq!(handle.state(), ProcessState::Exited);
    assert_eq!(handle.exit_code(), Some(0));
}

#[cfg(unix)]
#[tokio::test]
async fn test_working_directory_is_honored() {
    let dir = TempDir::new().unwrap();
    let spec = sh("backend", "pwd > cwd.txt").with_working_dir(dir.path());
    let mut handle = ProcessHandle::start(spec).unwrap();
    assert_eq!(handle.wait().await, Some(0));

    let written = std::fs::read_to_string(dir.path().join("cwd.txt")).unwrap();
    let expected = dir.path().canonicalize().unwrap();
    assert_eq!(
        PathBuf::from(written.trim()).canonicalize().unwrap(),
        expected
    );
}
