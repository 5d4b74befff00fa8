//! Dependency install check run before anything is started

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::core::config::InstallConfig;
use crate::core::error::StartupError;

/// A precondition that must hold before the frontend can start
#[async_trait]
pub trait DependencyCheck: Send + Sync {
    /// Short label for status lines
    fn name(&self) -> &str;

    /// Make sure the dependencies are present, installing them if needed
    async fn ensure(&self) -> Result<(), StartupError>;
}

/// Runs the install command when the marker path is missing
#[derive(Debug, Clone)]
pub struct InstallCheck {
    marker: PathBuf,
    command: Vec<String>,
    working_dir: PathBuf,
}

impl InstallCheck {
    pub fn new(marker: impl Into<PathBuf>, command: Vec<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            marker: marker.into(),
            command,
            working_dir: working_dir.into(),
        }
    }

    /// Check for the frontend in `working_dir`; the marker is resolved
    /// relative to it
    pub fn from_config(install: &InstallConfig, working_dir: &Path) -> Self {
        Self::new(&install.marker, install.command.clone(), working_dir)
    }

    pub fn marker_path(&self) -> PathBuf {
        self.working_dir.join(&self.marker)
    }

    pub fn is_satisfied(&self) -> bool {
        self.marker_path().exists()
    }
}

#[async_trait]
impl DependencyCheck for InstallCheck {
    fn name(&self) -> &str {
        "install"
    }

    async fn ensure(&self) -> Result<(), StartupError> {
        if self.is_satisfied() {
            tracing::debug!("{} present, skipping install", self.marker_path().display());
            return Ok(());
        }

        let command_line = self.command.join(" ");
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| StartupError::Install {
                reason: "install command is empty".to_string(),
            })?;

        tracing::info!("[frontend] installing dependencies: `{}`", command_line);
        let status = Command::new(program)
            .args(args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| StartupError::Install {
                reason: format!("failed to run `{}`: {}", command_line, e),
            })?;

        if !status.success() {
            return Err(StartupError::Install {
                reason: format!("`{}` {}", command_line, status),
            });
        }
        Ok(())
    }
}
