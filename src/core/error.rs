//! Error types for solaria-dev
//!
//! The taxonomy follows the supervisor lifecycle: process creation,
//! watch setup, startup sequencing, and configuration loading.
//! Termination problems are never represented here; they are logged
//! and shutdown continues.

use std::path::PathBuf;
use thiserror::Error;

/// A child process could not be created
#[derive(Error, Debug)]
pub enum SpawnError {
    #[error("{name}: command is empty")]
    EmptyCommand { name: String },

    #[error("{name}: executable not found: {program}")]
    NotFound { name: String, program: String },

    #[error("{name}: failed to start {program}: {source}")]
    Failed {
        name: String,
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl SpawnError {
    /// Classify an OS spawn failure
    pub fn from_io(name: &str, program: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            SpawnError::NotFound {
                name: name.to_string(),
                program: program.to_string(),
            }
        } else {
            SpawnError::Failed {
                name: name.to_string(),
                program: program.to_string(),
                source: err,
            }
        }
    }
}

/// The file watcher could not be set up
#[derive(Error, Debug)]
pub enum WatchSetupError {
    #[error("Watch path not found: {path}")]
    PathNotFound { path: PathBuf },

    #[error("Watch set is empty")]
    EmptyWatchSet,

    #[error("Failed to watch {path}: {source}")]
    Notify {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("Invalid watch pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Startup was aborted; the session exits nonzero
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Dependency installation failed: {reason}")]
    Install { reason: String },

    #[error("Frontend failed to start: {0}")]
    Frontend(#[source] SpawnError),

    #[error("Backend failed to start: {0}")]
    Backend(#[source] SpawnError),

    #[error("File watcher failed to start: {0}")]
    Watch(#[from] WatchSetupError),

    #[error("Interrupted while {phase}")]
    Interrupted { phase: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {reason}")]
    Invalid { reason: String },
}
