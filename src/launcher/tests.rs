//! Tests for the Launcher module

use super::*;
use crate::core::config::DevConfig;
use crate::process::ProcessState;
use crate::supervisor::SupervisorState;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Check with a scripted outcome that counts its invocations
struct ScriptedCheck {
    calls: Arc<AtomicU32>,
    outcome: Option<&'static str>,
    hang: bool,
}

impl ScriptedCheck {
    fn passing(calls: Arc<AtomicU32>) -> Self {
        Self {
            calls,
            outcome: None,
            hang: false,
        }
    }

    fn failing(calls: Arc<AtomicU32>, reason: &'static str) -> Self {
        Self {
            calls,
            outcome: Some(reason),
            hang: false,
        }
    }

    fn hanging(calls: Arc<AtomicU32>) -> Self {
        Self {
            calls,
            outcome: None,
            hang: true,
        }
    }
}

#[async_trait]
impl DependencyCheck for ScriptedCheck {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn ensure(&self) -> Result<(), StartupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        match self.outcome {
            Some(reason) => Err(StartupError::Install {
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Session config running `sleep` for both servers and watching `dir`
fn session_config(dir: &TempDir) -> DevConfig {
    let mut config = DevConfig::default();
    config.frontend.command = vec!["sleep".to_string(), "30".to_string()];
    config.backend.command = vec![
        "sh".to_string(),
        "-c".to_string(),
        "exec sleep 30".to_string(),
    ];
    config.watch.paths = vec![dir.path().to_path_buf()];
    config.watch.debounce_ms = 100;
    config.supervisor.startup_delay_ms = 50;
    config.supervisor.grace_period_ms = 2000;
    config.browser.open = false;
    config
}

fn options(dir: &TempDir) -> LaunchOptions {
    let mut options = LaunchOptions::new(dir.path().join("app.yaml"));
    options.handle_signals = false;
    options.open_browser = false;
    options
}

#[test]
fn test_launch_options_defaults() {
    let options = LaunchOptions::new("app.yaml");
    assert!(options.open_browser);
    assert!(!options.skip_install);
    assert!(options.handle_signals);
}

#[test]
fn test_relative_config_file_made_absolute() {
    let resolved = absolute(Path::new("app.yaml"));
    assert!(resolved.is_absolute());
    assert!(resolved.ends_with("app.yaml"));

    let fixed = Path::new("/etc/solaria/app.yaml");
    assert_eq!(absolute(fixed), fixed.to_path_buf());
}

// ============================================================================
// InstallCheck
// ============================================================================

#[cfg(unix)]
#[tokio::test]
async fn test_install_skipped_when_marker_present() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("node_modules")).unwrap();
    let check = InstallCheck::new("node_modules", vec!["false".to_string()], dir.path());

    assert!(check.is_satisfied());
    check.ensure().await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn test_install_runs_when_marker_missing() {
    let dir = TempDir::new().unwrap();
    let check = InstallCheck::new(
        "node_modules",
        vec![
            "sh".to_string(),
            "-c".to_string(),
            "mkdir node_modules".to_string(),
        ],
        dir.path(),
    );

    assert!(!check.is_satisfied());
    check.ensure().await.unwrap();
    assert!(check.is_satisfied());
    assert_eq!(check.marker_path(), dir.path().join("node_modules"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_install_failure_is_startup_error() {
    let dir = TempDir::new().unwrap();
    let check = InstallCheck::new("node_modules", vec!["false".to_string()], dir.path());

    let err = check.ensure().await.unwrap_err();
    assert!(matches!(err, StartupError::Install { .. }));
    assert_eq!(SupervisorExit::from(&err), SupervisorExit::StartupFailed);
}

#[tokio::test]
async fn test_install_missing_program() {
    let dir = TempDir::new().unwrap();
    let check = InstallCheck::new(
        "node_modules",
        vec!["solaria-missing-installer".to_string()],
        dir.path(),
    );

    match check.ensure().await {
        Err(StartupError::Install { reason }) => {
            assert!(reason.contains("solaria-missing-installer"))
        }
        other => panic!("expected Install error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_install_empty_command() {
    let dir = TempDir::new().unwrap();
    let check = InstallCheck::new("node_modules", vec![], dir.path());
    assert!(matches!(
        check.ensure().await,
        Err(StartupError::Install { .. })
    ));
}

// ============================================================================
// Session sequencing
// ============================================================================

#[cfg(unix)]
#[tokio::test]
async fn test_full_session_clean_exit() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicU32::new(0));
    let launcher = Launcher::new(session_config(&dir), options(&dir))
        .with_dependency_check(ScriptedCheck::passing(calls.clone()));
    let handle = launcher.handle();

    let driver = async {
        let status =
            tokio::time::timeout(Duration::from_secs(10), handle.wait_for(|s| s.is_serving()))
                .await
                .unwrap()
                .unwrap();
        assert_eq!(status.backend_starts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // A watched write reloads the backend
        std::fs::write(dir.path().join("api.py"), "VERSION = 2\n").unwrap();
        tokio::time::timeout(
            Duration::from_secs(10),
            handle.wait_for(|s| s.reloads == 1 && s.is_serving()),
        )
        .await
        .unwrap()
        .unwrap();

        handle.request_shutdown();
    };

    let (exit, ()) = tokio::join!(launcher.run(), driver);
    assert_eq!(exit, SupervisorExit::Clean);
    assert_eq!(handle.status().state, SupervisorState::Stopped);
}

#[cfg(unix)]
#[tokio::test]
async fn test_relative_watch_path_uses_backend_dir() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("kbunified")).unwrap();
    let mut config = session_config(&dir);
    config.backend.working_dir = dir.path().to_path_buf();
    config.watch.paths = vec![PathBuf::from("kbunified")];
    config.install.enabled = false;

    let launcher = Launcher::new(config, options(&dir));
    let handle = launcher.handle();

    let driver = async {
        tokio::time::timeout(Duration::from_secs(10), handle.wait_for(|s| s.is_serving()))
            .await
            .unwrap()
            .unwrap();

        std::fs::write(dir.path().join("kbunified").join("api.py"), "VERSION = 2\n").unwrap();
        tokio::time::timeout(
            Duration::from_secs(10),
            handle.wait_for(|s| s.reloads == 1 && s.is_serving()),
        )
        .await
        .unwrap()
        .unwrap();

        handle.request_shutdown();
    };

    let (exit, ()) = tokio::join!(launcher.run(), driver);
    assert_eq!(exit, SupervisorExit::Clean);
}

#[cfg(unix)]
#[tokio::test]
async fn test_os_signals_drive_restart_and_shutdown() {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let dir = TempDir::new().unwrap();
    let mut config = session_config(&dir);
    config.install.enabled = false;
    let mut opts = options(&dir);
    opts.handle_signals = true;

    let launcher = Launcher::new(config, opts);
    let handle = launcher.handle();

    let driver = async {
        tokio::time::timeout(Duration::from_secs(10), handle.wait_for(|s| s.is_serving()))
            .await
            .unwrap()
            .unwrap();
        // Let the bridge install its handlers
        tokio::time::sleep(Duration::from_millis(200)).await;

        kill(Pid::this(), Signal::SIGHUP).unwrap();
        let status = tokio::time::timeout(
            Duration::from_secs(10),
            handle.wait_for(|s| s.reloads == 1 && s.is_serving()),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(status.backend_starts, 2);

        kill(Pid::this(), Signal::SIGTERM).unwrap();
        kill(Pid::this(), Signal::SIGTERM).unwrap();
    };

    let (exit, ()) = tokio::join!(launcher.run(), driver);
    assert_eq!(exit, SupervisorExit::Clean);
    assert!(handle.is_shutdown_requested());
    assert_eq!(handle.status().state, SupervisorState::Stopped);
}

#[tokio::test]
async fn test_failed_check_starts_nothing() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicU32::new(0));
    let launcher = Launcher::new(session_config(&dir), options(&dir))
        .with_dependency_check(ScriptedCheck::failing(calls.clone(), "npm install failed"));
    let handle = launcher.handle();

    assert_eq!(launcher.run().await, SupervisorExit::StartupFailed);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(handle.status().frontend.state, ProcessState::NotStarted);
}

#[tokio::test]
async fn test_skip_install_bypasses_check() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicU32::new(0));
    let mut config = session_config(&dir);
    config.watch.paths = vec![dir.path().join("missing")];
    let mut opts = options(&dir);
    opts.skip_install = true;

    let launcher = Launcher::new(config, opts)
        .with_dependency_check(ScriptedCheck::failing(calls.clone(), "unreachable"));

    // Fails on the watch instead of the check
    assert_eq!(launcher.run().await, SupervisorExit::StartupFailed);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_watch_path_starts_nothing() {
    let dir = TempDir::new().unwrap();
    let mut config = session_config(&dir);
    config.watch.paths = vec![dir.path().join("kbunified")];
    config.install.enabled = false;

    let launcher = Launcher::new(config, options(&dir));
    let handle = launcher.handle();

    assert_eq!(launcher.run().await, SupervisorExit::StartupFailed);
    let status = handle.status();
    assert_eq!(status.frontend.state, ProcessState::NotStarted);
    assert_eq!(status.backend.state, ProcessState::NotStarted);
}

#[tokio::test]
async fn test_interrupt_during_check() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicU32::new(0));
    let launcher = Launcher::new(session_config(&dir), options(&dir))
        .with_dependency_check(ScriptedCheck::hanging(calls.clone()));
    let handle = launcher.handle();

    let driver = async {
        while calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.request_shutdown();
    };

    let (exit, ()) = tokio::join!(launcher.run(), driver);
    assert_eq!(exit, SupervisorExit::Interrupted);
    assert_eq!(exit.code(), 130);
}
