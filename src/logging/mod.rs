//! Logging System for solaria-dev
//!
//! Every supervisor state transition and failure is reported as a
//! human-readable status line through `tracing`. This module wires the
//! subscriber: an env filter, a console layer, and an optional rolling
//! file layer.

mod config;


pub use config::{LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig};

use thiserror::Error;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Logging system errors
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to initialize logging: {0}")]
    InitializationError(String),

    #[error("Failed to create log directory {path}: {source}")]
    DirectoryCreationError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

/// Installed global subscriber. Hold it for the whole session: dropping
/// it flushes and closes the log file.
pub struct LoggingSystem {
    config: LoggingConfig,
    _file_guard: Option<WorkerGuard>,
}

impl LoggingSystem {
    /// Install the global subscriber described by `config`
    pub fn init(config: LoggingConfig) -> Result<Self, LoggingError> {
        let (file, file_guard) = if config.output.to_file() {
            let (layer, guard) = file_layer(&config)?;
            (Some(layer), Some(guard))
        } else {
            (None, None)
        };
        let console = config.output.to_console().then(|| console_layer(&config));

        tracing_subscriber::registry()
            .with(env_filter(&config))
            .with(console)
            .with(file)
            .try_init()
            .map_err(|e| LoggingError::InitializationError(e.to_string()))?;

        Ok(Self {
            config,
            _file_guard: file_guard,
        })
    }

    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }

    pub fn log_level(&self) -> LogLevel {
        self.config.level
    }
}

/// `RUST_LOG` wins over the configured directives
pub(crate) fn env_filter(config: &LoggingConfig) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    config
        .directives()
        .iter()
        .fold(EnvFilter::default(), |filter, directive| {
            match directive.parse() {
                Ok(directive) => filter.add_directive(directive),
                Err(e) => {
                    eprintln!("ignoring log directive `{}`: {}", directive, e);
                    filter
                }
            }
        })
}

fn console_layer<S>(config: &LoggingConfig) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = fmt::layer()
        .with_target(config.show_target)
        .with_ansi(config.ansi);

    match config.format {
        LogFormat::Text => layer.boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

fn file_layer<S>(config: &LoggingConfig) -> Result<(BoxedLayer<S>, WorkerGuard), LoggingError>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let dir = config.log_directory();
    std::fs::create_dir_all(&dir).map_err(|source| LoggingError::DirectoryCreationError {
        path: dir.clone(),
        source,
    })?;

    let appender = RollingFileAppender::new(config.rotation.into(), &dir, &config.file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_ansi(false);

    let layer = match config.format {
        LogFormat::Text => layer.boxed(),
        LogFormat::Json => layer.json().boxed(),
    };
    Ok((layer, guard))
}
