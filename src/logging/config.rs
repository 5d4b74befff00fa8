//! Logging configuration types
//!
//! Deserialized from the `[logging]` section of the supervisor settings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing_appender::rolling::Rotation;

/// Log verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive spelling understood by `EnvFilter`
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How status lines are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per line, for editor and CI integrations
    Json,
}

/// Where status lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Terminal only, interleaved with the children's output
    #[default]
    Console,
    File,
    Both,
}

impl LogOutput {
    pub fn to_console(self) -> bool {
        matches!(self, LogOutput::Console | LogOutput::Both)
    }

    pub fn to_file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

/// How often the log file rolls over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Daily,
    Hourly,
    Never,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level for every module
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Log file directory; a per-user data directory when unset
    pub directory: Option<PathBuf>,
    /// Log file name prefix
    pub file_name: String,
    pub rotation: LogRotation,
    /// Per-module overrides, e.g. `notify = "warn"`
    pub modules: BTreeMap<String, LogLevel>,
    /// Prefix lines with the emitting module
    pub show_target: bool,
    /// Colored console output
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Text,
            output: LogOutput::Console,
            directory: None,
            file_name: "solaria-dev.log".to_string(),
            rotation: LogRotation::Daily,
            modules: BTreeMap::new(),
            show_target: false,
            ansi: true,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_log_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.directory = Some(dir.into());
        self
    }

    pub fn with_module_level(mut self, module: impl Into<String>, level: LogLevel) -> Self {
        self.modules.insert(module.into(), level);
        self
    }

    pub fn with_target(mut self, show: bool) -> Self {
        self.show_target = show;
        self
    }

    /// Debug output for the supervisor itself; the notify backend stays
    /// at info because it reports every raw filesystem event at debug
    pub fn development() -> Self {
        Self::default()
            .with_level(LogLevel::Debug)
            .with_module_level("notify", LogLevel::Info)
            .with_target(true)
    }

    /// Filter directives: the default level first, then module overrides
    pub fn directives(&self) -> Vec<String> {
        std::iter::once(self.level.to_string())
            .chain(
                self.modules
                    .iter()
                    .map(|(module, level)| format!("{}={}", module, level)),
            )
            .collect()
    }

    pub fn log_directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .map(|dir| dir.join("solaria-dev").join("logs"))
                .unwrap_or_else(|| PathBuf::from("logs"))
        })
    }
}
