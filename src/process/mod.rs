//! Process Handle Module
//!
//! Thin ownership wrapper around one child process. A handle is created by
//! [`ProcessHandle::start`] and must be paired with exactly one
//! [`ProcessHandle::terminate`] or a [`ProcessHandle::wait`] to completion.
//!
//! On Unix every child gets its own process group so that graceful and
//! forced stops reach the whole tree (`npm` spawns the actual dev server
//! as a grandchild). Children inherit stdout/stderr; stdin is detached
//! because a background process group may not read the terminal.

#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};

use crate::core::error::SpawnError;

/// Upper bound on reaping a child after SIGKILL
const KILL_WAIT: Duration = Duration::from_secs(2);

/// What to run and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Label used in status lines ("frontend", "backend")
    pub name: String,
    /// Program followed by its arguments
    pub command: Vec<String>,
    /// Directory the child is started in
    pub working_dir: PathBuf,
}

impl ProcessSpec {
    pub fn new(name: impl Into<String>, command: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command,
            working_dir: PathBuf::from("."),
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Command line as a single string, for status lines
    pub fn display_command(&self) -> String {
        self.command.join(" ")
    }
}

/// Lifecycle of a child process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// No process has been created for this slot
    NotStarted,
    /// The OS process is alive
    Running,
    /// A stop request was sent and the process has not been reaped yet
    Terminating,
    /// The process exited (on its own or forced)
    Exited,
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessState::NotStarted => write!(f, "not started"),
            ProcessState::Running => write!(f, "running"),
            ProcessState::Terminating => write!(f, "terminating"),
            ProcessState::Exited => write!(f, "exited"),
        }
    }
}

/// Point-in-time view of a handle, published in supervisor status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSnapshot {
    pub name: String,
    pub pid: Option<u32>,
    pub state: ProcessState,
    pub exit_code: Option<i32>,
}

impl ProcessSnapshot {
    /// Snapshot for an empty slot
    pub fn not_started(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pid: None,
            state: ProcessState::NotStarted,
            exit_code: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == ProcessState::Running
    }
}

/// Exclusive owner of one child process
#[derive(Debug)]
pub struct ProcessHandle {
    spec: ProcessSpec,
    child: Option<Child>,
    pid: Option<u32>,
    state: ProcessState,
    exit_code: Option<i32>,
}

impl ProcessHandle {
    /// Launch `spec.command` in `spec.working_dir`
    pub fn start(spec: ProcessSpec) -> Result<Self, SpawnError> {
        let (program, args) = spec
            .command
            .split_first()
            .ok_or_else(|| SpawnError::EmptyCommand {
                name: spec.name.clone(),
            })?;

        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        #[cfg(unix)]
        command.process_group(0);

        let child = command
            .spawn()
            .map_err(|e| SpawnError::from_io(&spec.name, program, e))?;
        let pid = child.id();

        tracing::info!(
            "[{}] started `{}` (pid {})",
            spec.name,
            spec.display_command(),
            display_pid(pid)
        );

        Ok(Self {
            spec,
            child: Some(child),
            pid,
            state: ProcessState::Running,
            exit_code: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &ProcessSpec {
        &self.spec
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Exit code once Exited; `None` while alive or when killed by a signal
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn is_running(&self) -> bool {
        self.state == ProcessState::Running
    }

    pub fn snapshot(&self) -> ProcessSnapshot {
        ProcessSnapshot {
            name: self.spec.name.clone(),
            pid: self.pid,
            state: self.state,
            exit_code: self.exit_code,
        }
    }

    /// Non-blocking liveness check; marks the handle Exited if the child is gone
    pub fn has_exited(&mut self) -> bool {
        if let Some(child) = self.child.as_mut() {
            match child.try_wait() {
                Ok(Some(status)) => self.record_exit(Some(status)),
                Ok(None) => return false,
                Err(e) => {
                    tracing::warn!("[{}] failed to poll process: {}", self.spec.name, e);
                    return false;
                }
            }
        }
        self.state == ProcessState::Exited
    }

    /// Stop the process: SIGTERM, wait up to `grace_period`, then SIGKILL.
    ///
    /// No-op unless Running. Never fails; problems are logged.
    pub async fn terminate(&mut self, grace_period: Duration) {
        if self.state != ProcessState::Running || self.has_exited() {
            return;
        }
        let Some(mut child) = self.child.take() else {
            self.state = ProcessState::Exited;
            return;
        };

        self.state = ProcessState::Terminating;
        tracing::info!("[{}] stopping (pid {})", self.spec.name, display_pid(self.pid));

        if let Err(e) = request_stop(&mut child) {
            tracing::warn!("[{}] graceful stop request failed: {}", self.spec.name, e);
        }

        let status = match tokio::time::timeout(grace_period, child.wait()).await {
            Ok(Ok(status)) => Some(status),
            Ok(Err(e)) => {
                tracing::warn!("[{}] wait failed: {}; killing", self.spec.name, e);
                force_kill(&self.spec.name, &mut child).await
            }
            Err(_) => {
                tracing::warn!(
                    "[{}] did not exit within {:?}; killing",
                    self.spec.name,
                    grace_period
                );
                force_kill(&self.spec.name, &mut child).await
            }
        };

        self.record_exit(status);
    }

    /// Block until the process exits. Returns immediately once Exited.
    pub async fn wait(&mut self) -> Option<i32> {
        if let Some(child) = self.child.as_mut() {
            let result = child.wait().await;
            match result {
                Ok(status) => self.record_exit(Some(status)),
                Err(e) => {
                    tracing::warn!("[{}] wait failed: {}", self.spec.name, e);
                    self.record_exit(None);
                }
            }
        }
        self.exit_code
    }

    /// Bounded [`wait`](Self::wait); returns whether the process exited in time
    pub async fn wait_timeout(&mut self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait()).await.is_ok()
    }

    fn record_exit(&mut self, status: Option<ExitStatus>) {
        self.child = None;
        self.state = ProcessState::Exited;
        self.exit_code = status.and_then(|s| s.code());

        match status {
            Some(status) if status.success() => {
                tracing::info!("[{}] exited cleanly", self.spec.name)
            }
            Some(status) => tracing::info!("[{}] exited ({})", self.spec.name, status),
            None => tracing::warn!("[{}] exit status unknown", self.spec.name),
        }
    }
}

fn display_pid(pid: Option<u32>) -> String {
    pid.map(|p| p.to_string()).unwrap_or_else(|| "?".to_string())
}

/// Graceful stop: SIGTERM to the child's process group
#[cfg(unix)]
fn request_stop(child: &mut Child) -> std::io::Result<()> {
    use nix::sys::signal::{kill, killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return Ok(());
    };
    let pid = Pid::from_raw(pid as i32);
    killpg(pid, Signal::SIGTERM)
        .or_else(|_| kill(pid, Signal::SIGTERM))
        .map_err(std::io::Error::from)
}

#[cfg(not(unix))]
fn request_stop(child: &mut Child) -> std::io::Result<()> {
    child.start_kill()
}

/// Forced stop: SIGKILL to the process group, then reap with a bound
async fn force_kill(name: &str, child: &mut Child) -> Option<ExitStatus> {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{killpg, Signal};
        let _ = killpg(nix::unistd::Pid::from_raw(pid as i32), Signal::SIGKILL);
    }

    if let Err(e) = child.start_kill() {
        tracing::debug!("[{}] kill: {}", name, e);
    }

    match tokio::time::timeout(KILL_WAIT, child.wait()).await {
        Ok(Ok(status)) => Some(status),
        Ok(Err(e)) => {
            tracing::error!("[{}] failed to reap killed process: {}", name, e);
            None
        }
        Err(_) => {
            tracing::error!("[{}] still alive {:?} after SIGKILL", name, KILL_WAIT);
            None
        }
    }
}
