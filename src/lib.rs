//! solaria-dev - development-mode supervisor
//!
//! Runs a frontend asset server and a backend API server side by side:
//! - Ordered startup with a readiness wait between the two
//! - Debounced watching of backend sources
//! - Backend-only restarts on change, frontend left untouched
//! - Ordered teardown on interrupt

pub mod core;
pub mod launcher;
pub mod logging;
pub mod process;
pub mod supervisor;
pub mod watcher;

// Re-export commonly used items
pub use core::config::DevConfig;
pub use core::error::StartupError;
pub use launcher::{LaunchOptions, Launcher};
pub use process::{ProcessHandle, ProcessSpec, ProcessState};
pub use supervisor::{Supervisor, SupervisorExit, SupervisorHandle, SupervisorState};
pub use watcher::{ChangeEvent, ChangeStream, FileWatcher, WatchSet};
