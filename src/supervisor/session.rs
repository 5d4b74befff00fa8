//! The supervisor loop: startup sequencing, reloads and shutdown.

use std::path::Path;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::readiness::{Readiness, ReadinessPolicy};
use super::state::{SupervisorExit, SupervisorState, SupervisorStatus};
use crate::core::config::DevConfig;
use crate::core::error::{SpawnError, StartupError};
use crate::process::{ProcessHandle, ProcessSnapshot, ProcessSpec};
use crate::watcher::ChangeEvent;

/// What the supervisor runs
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub frontend: ProcessSpec,
    pub backend: ProcessSpec,
    /// Wait between frontend and backend start
    pub readiness: ReadinessPolicy,
    /// Time each child gets to exit after a stop request
    pub grace_period: Duration,
}

impl SupervisorConfig {
    /// Build process specs from the loaded settings. The backend gets
    /// `config_file` as its sole extra argument.
    pub fn from_dev_config(config: &DevConfig, config_file: &Path) -> Self {
        Self {
            frontend: ProcessSpec::new("frontend", config.frontend.command.clone())
                .with_working_dir(&config.frontend.working_dir),
            backend: ProcessSpec::new("backend", config.backend.command_for(config_file))
                .with_working_dir(&config.backend.working_dir),
            readiness: ReadinessPolicy::from_settings(&config.supervisor, config.frontend.port),
            grace_period: config.supervisor.grace_period(),
        }
    }
}

/// Requests delivered into the supervisor loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Restart,
}

/// What woke the loop
enum Wake {
    Shutdown,
    Control(Control),
    Change(ChangeEvent),
    ChangesClosed,
    BackendExited(Option<i32>),
}

/// Cloneable remote for a running [`Supervisor`]
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    shutdown: CancellationToken,
    control: mpsc::UnboundedSender<Control>,
    status: watch::Receiver<SupervisorStatus>,
}

impl SupervisorHandle {
    /// Ask the supervisor to shut down. Repeated requests have no effect.
    pub fn request_shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            tracing::info!("[supervisor] shutdown requested");
        }
        self.shutdown.cancel();
    }

    /// Restart the backend as if a source change had been observed.
    /// Returns false once the supervisor is gone.
    pub fn request_restart(&self) -> bool {
        self.control.send(Control::Restart).is_ok()
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Token cancelled when shutdown is requested
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Latest published status
    pub fn status(&self) -> SupervisorStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SupervisorStatus> {
        self.status.clone()
    }

    /// Wait for a status matching `predicate`; `None` if the supervisor
    /// was dropped first
    pub async fn wait_for<F>(&self, predicate: F) -> Option<SupervisorStatus>
    where
        F: FnMut(&SupervisorStatus) -> bool,
    {
        let mut status = self.status.clone();
        let matched = status.wait_for(predicate).await.ok()?.clone();
        Some(matched)
    }
}

/// Exclusive owner of the session's two process slots
pub struct Supervisor {
    config: SupervisorConfig,
    state: SupervisorState,
    frontend: Option<ProcessHandle>,
    backend: Option<ProcessHandle>,
    shutdown: CancellationToken,
    control_tx: mpsc::UnboundedSender<Control>,
    control_rx: mpsc::UnboundedReceiver<Control>,
    status: watch::Sender<SupervisorStatus>,
    backend_starts: u32,
    reloads: u32,
    last_error: Option<String>,
    exit: Option<SupervisorExit>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self::with_shutdown_token(config, CancellationToken::new())
    }

    /// Supervisor that also stops when `shutdown` is cancelled externally
    pub fn with_shutdown_token(config: SupervisorConfig, shutdown: CancellationToken) -> Self {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (status, _) = watch::channel(SupervisorStatus::initial(
            &config.frontend.name,
            &config.backend.name,
        ));
        Self {
            config,
            state: SupervisorState::Starting,
            frontend: None,
            backend: None,
            shutdown,
            control_tx,
            control_rx,
            status,
            backend_starts: 0,
            reloads: 0,
            last_error: None,
            exit: None,
        }
    }

    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle {
            shutdown: self.shutdown.clone(),
            control: self.control_tx.clone(),
            status: self.status.subscribe(),
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Exit status once Stopped
    pub fn exit_status(&self) -> Option<SupervisorExit> {
        self.exit
    }

    /// Launch the frontend, wait for readiness, then launch the backend.
    ///
    /// On failure every process that did start is terminated, the
    /// supervisor ends Stopped, and the cause is returned.
    pub async fn start(&mut self) -> Result<(), StartupError> {
        if self.state != SupervisorState::Starting {
            return Ok(());
        }
        if self.shutdown.is_cancelled() {
            return Err(self
                .abort_startup(StartupError::Interrupted {
                    phase: "starting the frontend".to_string(),
                })
                .await);
        }

        match ProcessHandle::start(self.config.frontend.clone()) {
            Ok(handle) => {
                self.frontend = Some(handle);
                self.publish();
            }
            Err(e) => return Err(self.abort_startup(StartupError::Frontend(e)).await),
        }

        match self.config.readiness.wait(&self.shutdown).await {
            Readiness::Ready => {}
            Readiness::TimedOut => {
                self.last_error = Some("frontend readiness probe timed out".to_string());
            }
            Readiness::Cancelled => {
                return Err(self
                    .abort_startup(StartupError::Interrupted {
                        phase: "waiting for the frontend".to_string(),
                    })
                    .await);
            }
        }

        if let Err(e) = self.spawn_backend() {
            return Err(self.abort_startup(StartupError::Backend(e)).await);
        }

        self.set_state(SupervisorState::Running);
        Ok(())
    }

    /// Drive the session until shutdown is requested.
    ///
    /// Each change event, and each manual restart request, runs one
    /// reload cycle; events are handled strictly in arrival order.
    /// Returns the recorded exit status once Stopped.
    pub async fn run<S>(&mut self, changes: S) -> SupervisorExit
    where
        S: Stream<Item = ChangeEvent> + Unpin,
    {
        let mut changes = Some(changes);

        while self.state == SupervisorState::Running {
            let wake = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => Wake::Shutdown,
                Some(control) = self.control_rx.recv() => Wake::Control(control),
                change = next_change(&mut changes) => match change {
                    Some(event) => Wake::Change(event),
                    None => Wake::ChangesClosed,
                },
                code = backend_exit(&mut self.backend) => Wake::BackendExited(code),
            };

            match wake {
                Wake::Shutdown => {
                    // Stop watching before touching the processes
                    drop(changes.take());
                    self.shut_down().await;
                }
                Wake::Control(Control::Restart) => self.reload("manual restart").await,
                Wake::Change(event) => {
                    let reason = format!("change in {}", event.summary());
                    self.reload(&reason).await;
                }
                Wake::ChangesClosed => {
                    tracing::warn!(
                        "[supervisor] change stream ended; backend restarts only on request"
                    );
                    changes = None;
                }
                Wake::BackendExited(code) => {
                    let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                    tracing::warn!(
                        "[backend] exited unexpectedly ({}); waiting for a change to restart",
                        code
                    );
                    self.last_error = Some(format!("backend exited ({})", code));
                    self.publish();
                }
            }
        }

        if self.state != SupervisorState::Stopped {
            self.shut_down().await;
        }
        self.exit.unwrap_or(SupervisorExit::Clean)
    }

    /// One reload cycle: stop the current backend, then start a fresh one.
    /// A failed start leaves the session Running without a backend.
    async fn reload(&mut self, reason: &str) {
        tracing::info!("[supervisor] reloading backend: {}", reason);
        self.set_state(SupervisorState::Reloading);

        if let Some(mut backend) = self.backend.take() {
            backend.terminate(self.config.grace_period).await;
        }
        self.publish();

        match self.spawn_backend() {
            Ok(()) => self.last_error = None,
            Err(e) => {
                tracing::error!("[supervisor] backend restart failed: {}", e);
                self.last_error = Some(e.to_string());
            }
        }

        self.reloads += 1;
        self.set_state(SupervisorState::Running);
    }

    fn spawn_backend(&mut self) -> Result<(), SpawnError> {
        let handle = ProcessHandle::start(self.config.backend.clone())?;
        self.backend = Some(handle);
        self.backend_starts += 1;
        self.publish();
        Ok(())
    }

    async fn abort_startup(&mut self, err: StartupError) -> StartupError {
        match &err {
            StartupError::Interrupted { .. } => tracing::info!("[supervisor] {}", err),
            _ => tracing::error!("[supervisor] startup failed: {}", err),
        }
        self.last_error = Some(err.to_string());
        self.exit = Some(SupervisorExit::from(&err));
        self.shut_down().await;
        err
    }

    /// Terminate the backend, then the frontend. Safe to call repeatedly.
    async fn shut_down(&mut self) {
        if matches!(
            self.state,
            SupervisorState::ShuttingDown | SupervisorState::Stopped
        ) {
            return;
        }
        self.set_state(SupervisorState::ShuttingDown);
        self.shutdown.cancel();

        let grace = self.config.grace_period;
        if let Some(backend) = self.backend.as_mut() {
            backend.terminate(grace).await;
            self.publish();
        }
        if let Some(frontend) = self.frontend.as_mut() {
            frontend.terminate(grace).await;
            self.publish();
        }

        self.exit.get_or_insert(SupervisorExit::Clean);
        self.set_state(SupervisorState::Stopped);
    }

    fn set_state(&mut self, state: SupervisorState) {
        if self.state != state {
            tracing::info!("[supervisor] {} -> {}", self.state, state);
            self.state = state;
        }
        self.publish();
    }

    fn publish(&self) {
        let status = SupervisorStatus {
            state: self.state,
            frontend: snapshot(&self.frontend, &self.config.frontend.name),
            backend: snapshot(&self.backend, &self.config.backend.name),
            backend_starts: self.backend_starts,
            reloads: self.reloads,
            last_error: self.last_error.clone(),
        };
        self.status.send_replace(status);
    }
}

fn snapshot(slot: &Option<ProcessHandle>, name: &str) -> ProcessSnapshot {
    slot.as_ref()
        .map(ProcessHandle::snapshot)
        .unwrap_or_else(|| ProcessSnapshot::not_started(name))
}

async fn next_change<S>(changes: &mut Option<S>) -> Option<ChangeEvent>
where
    S: Stream<Item = ChangeEvent> + Unpin,
{
    match changes {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

/// Resolves when a live backend exits on its own
async fn backend_exit(backend: &mut Option<ProcessHandle>) -> Option<i32> {
    match backend {
        Some(handle) if handle.is_running() => handle.wait().await,
        _ => std::future::pending().await,
    }
}
