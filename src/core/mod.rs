//! solaria-dev Core Module
//!
//! Configuration and error types shared by the process, watcher,
//! supervisor and launcher modules.

pub mod config;
pub mod error;

// Re-export commonly used items
pub use config::*;
pub use error::{ConfigError, SpawnError, StartupError, WatchSetupError};
