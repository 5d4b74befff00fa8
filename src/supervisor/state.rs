//! Supervisor state and published status

use crate::core::error::StartupError;
use crate::process::ProcessSnapshot;

/// Lifecycle of a development session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Frontend and backend are being launched
    Starting,
    /// Both started; waiting for changes or a shutdown request
    Running,
    /// Backend restart in progress
    Reloading,
    /// Watch cancelled, processes being stopped
    ShuttingDown,
    /// Terminal; every started process has exited
    Stopped,
}

impl std::fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupervisorState::Starting => write!(f, "starting"),
            SupervisorState::Running => write!(f, "running"),
            SupervisorState::Reloading => write!(f, "reloading"),
            SupervisorState::ShuttingDown => write!(f, "shutting down"),
            SupervisorState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Snapshot published on every transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorStatus {
    pub state: SupervisorState,
    pub frontend: ProcessSnapshot,
    pub backend: ProcessSnapshot,
    /// Successful backend launches, the initial one included
    pub backend_starts: u32,
    /// Completed reload cycles, failed restarts included
    pub reloads: u32,
    /// Most recent startup or restart failure
    pub last_error: Option<String>,
}

impl SupervisorStatus {
    pub(crate) fn initial(frontend: &str, backend: &str) -> Self {
        Self {
            state: SupervisorState::Starting,
            frontend: ProcessSnapshot::not_started(frontend),
            backend: ProcessSnapshot::not_started(backend),
            backend_starts: 0,
            reloads: 0,
            last_error: None,
        }
    }

    /// Running with both processes alive
    pub fn is_serving(&self) -> bool {
        self.state == SupervisorState::Running
            && self.frontend.is_running()
            && self.backend.is_running()
    }
}

/// Outcome of a session, mapped to the process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorExit {
    /// Shutdown requested after a successful start
    Clean,
    /// A process or the watch could not be set up
    StartupFailed,
    /// Shutdown requested before startup completed
    Interrupted,
}

impl SupervisorExit {
    pub fn code(self) -> i32 {
        match self {
            SupervisorExit::Clean => 0,
            SupervisorExit::StartupFailed => 1,
            SupervisorExit::Interrupted => 130,
        }
    }
}

impl From<&StartupError> for SupervisorExit {
    fn from(err: &StartupError) -> Self {
        match err {
            StartupError::Interrupted { .. } => SupervisorExit::Interrupted,
            _ => SupervisorExit::StartupFailed,
        }
    }
}
