//! Launcher Module
//!
//! Sequences one development session:
//! install check, watch setup, frontend, readiness, backend, browser tab,
//! then the supervisor loop until shutdown.

mod browser;
mod install;
mod signals;
#[cfg(test)]
mod tests;

pub use browser::open_browser;
pub use install::{DependencyCheck, InstallCheck};
pub use signals::spawn_signal_bridge;

use std::path::{Path, PathBuf};

use crate::core::config::DevConfig;
use crate::core::error::StartupError;
use crate::supervisor::{Supervisor, SupervisorConfig, SupervisorExit, SupervisorHandle};
use crate::watcher::{ChangeStream, FileWatcher, PathFilter, PathFilterConfig, WatchSet};

/// Per-invocation switches, mostly from the command line
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Configuration file handed to the backend
    pub config_file: PathBuf,
    /// Open a browser tab after startup
    pub open_browser: bool,
    /// Skip the dependency install check
    pub skip_install: bool,
    /// Translate OS signals into supervisor requests
    pub handle_signals: bool,
}

impl LaunchOptions {
    pub fn new(config_file: impl Into<PathBuf>) -> Self {
        Self {
            config_file: config_file.into(),
            open_browser: true,
            skip_install: false,
            handle_signals: true,
        }
    }
}

pub struct Launcher {
    config: DevConfig,
    options: LaunchOptions,
    check: Box<dyn DependencyCheck>,
    supervisor: Supervisor,
}

impl Launcher {
    pub fn new(config: DevConfig, options: LaunchOptions) -> Self {
        let config_file = absolute(&options.config_file);
        let supervisor = Supervisor::new(SupervisorConfig::from_dev_config(&config, &config_file));
        let check = Box::new(InstallCheck::from_config(
            &config.install,
            &config.frontend.working_dir,
        ));
        Self {
            config,
            options,
            check,
            supervisor,
        }
    }

    /// Replace the default install check
    pub fn with_dependency_check(mut self, check: impl DependencyCheck + 'static) -> Self {
        self.check = Box::new(check);
        self
    }

    /// Handle for requesting shutdown or restarts and observing status
    pub fn handle(&self) -> SupervisorHandle {
        self.supervisor.handle()
    }

    /// Run the session to completion and return its exit status
    pub async fn run(mut self) -> SupervisorExit {
        for warning in self.config.warnings() {
            tracing::warn!("[launcher] {}", warning);
        }

        let handle = self.supervisor.handle();
        let bridge = self
            .options
            .handle_signals
            .then(|| spawn_signal_bridge(handle.clone()));

        let exit = match self.prepare(&handle).await {
            Ok(changes) => self.serve(changes).await,
            Err(e) => {
                match &e {
                    StartupError::Interrupted { .. } => tracing::info!("[launcher] {}", e),
                    _ => tracing::error!("[launcher] {}", e),
                }
                SupervisorExit::from(&e)
            }
        };

        if let Some(bridge) = bridge {
            bridge.abort();
        }
        tracing::info!("[launcher] exiting with status {}", exit.code());
        exit
    }

    /// Everything that must succeed before a process is started
    async fn prepare(&self, handle: &SupervisorHandle) -> Result<ChangeStream, StartupError> {
        if self.options.skip_install || !self.config.install.enabled {
            tracing::debug!("dependency check skipped");
        } else {
            let shutdown = handle.shutdown_token();
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    return Err(StartupError::Interrupted {
                        phase: format!("running the {} check", self.check.name()),
                    });
                }
                result = self.check.ensure() => result?,
            }
        }

        tracing::info!(
            "[launcher] starting dev mode (config: {})",
            self.options.config_file.display()
        );

        let watch = &self.config.watch;
        let filter = PathFilter::new(PathFilterConfig {
            ignore_patterns: watch.ignore.clone(),
            include_patterns: watch.include.clone(),
        })?;
        let watcher = FileWatcher::with_filter(
            WatchSet::new(self.config.watch_paths(), watch.debounce()),
            filter,
        );
        Ok(watcher.watch(handle.shutdown_token().child_token())?)
    }

    async fn serve(&mut self, changes: ChangeStream) -> SupervisorExit {
        if let Err(e) = self.supervisor.start().await {
            drop(changes);
            return SupervisorExit::from(&e);
        }

        tracing::info!(
            "[launcher] frontend on port {}, backend on port {}",
            self.config.frontend.port,
            self.config.backend.port
        );
        if self.options.open_browser && self.config.browser.open {
            open_browser(self.config.browser_url());
        }

        self.supervisor.run(changes).await
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
