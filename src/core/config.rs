//! Configuration module for solaria-dev
//!
//! Handles supervisor configuration including:
//! - Frontend and backend commands, working directories and ports
//! - Watched backend sources and debounce window
//! - Startup readiness and termination grace period
//! - Dependency install check and browser launch
//!
//! Values are layered with the `config` crate: serde defaults, then an
//! optional `solaria-dev.toml`, then `SOLARIA_DEV__SECTION__KEY`
//! environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::ConfigError;
use crate::logging::LoggingConfig;

/// Supervisor settings file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "solaria-dev.toml";

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "SOLARIA_DEV";

/// Well-known dev-session port of the frontend asset server
pub const DEFAULT_FRONTEND_PORT: u16 = 5173;

/// Well-known dev-session port of the backend API
pub const DEFAULT_BACKEND_PORT: u16 = 4722;

/// Backend flag that switches it into static-serving mode
const STATIC_DIR_FLAG: &str = "--static-dir";

/// Main supervisor configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DevConfig {
    /// Frontend asset server
    pub frontend: FrontendConfig,

    /// Backend API server
    pub backend: BackendConfig,

    /// Backend source watching
    pub watch: WatchConfig,

    /// Startup and shutdown timing
    pub supervisor: SupervisorSettings,

    /// Frontend dependency install check
    pub install: InstallConfig,

    /// Browser launch after startup
    pub browser: BrowserConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Frontend asset server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontendConfig {
    /// Program and arguments
    pub command: Vec<String>,
    /// Directory the server is started in
    pub working_dir: PathBuf,
    /// Port the server binds
    pub port: u16,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            command: vec!["npm".to_string(), "run".to_string(), "dev".to_string()],
            working_dir: PathBuf::from("."),
            port: DEFAULT_FRONTEND_PORT,
        }
    }
}

/// Backend API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Program and fixed arguments; the config file path is appended
    pub command: Vec<String>,
    /// Directory the server is started in
    pub working_dir: PathBuf,
    /// Port the server binds
    pub port: u16,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            command: vec!["python".to_string(), "run.py".to_string()],
            working_dir: PathBuf::from("."),
            port: DEFAULT_BACKEND_PORT,
        }
    }
}

impl BackendConfig {
    /// Full backend command line: the configured command with the
    /// configuration file path as the sole extra argument
    pub fn command_for(&self, config_file: &Path) -> Vec<String> {
        let mut command = self.command.clone();
        command.push(config_file.to_string_lossy().into_owned());
        command
    }
}

/// File watch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Directories and files whose changes reload the backend; relative
    /// paths are taken from `backend.working_dir`
    pub paths: Vec<PathBuf>,
    /// Debounce window in milliseconds
    pub debounce_ms: u64,
    /// Glob patterns whose changes are ignored
    pub ignore: Vec<String>,
    /// Glob patterns that are always reported (higher priority than ignore)
    pub include: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            paths: vec![PathBuf::from("kbunified"), PathBuf::from("run.py")],
            debounce_ms: 500,
            ignore: default_ignore_patterns(),
            include: vec![],
        }
    }
}

impl WatchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Editor, VCS and interpreter noise that must not trigger reloads
pub fn default_ignore_patterns() -> Vec<String> {
    [
        "**/.git/**",
        "**/node_modules/**",
        "**/__pycache__/**",
        "**/.venv/**",
        "**/.mypy_cache/**",
        "**/.pytest_cache/**",
        "**/*.pyc",
        "**/*.pyo",
        "**/*.swp",
        "**/*.swx",
        "**/*~",
        "**/.#*",
        "**/4913",
        "**/.DS_Store",
        "**/*.log",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

/// How the supervisor decides the frontend is ready for the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessMode {
    /// Fixed sleep after the frontend starts
    #[default]
    Delay,
    /// Poll the frontend port until it accepts a TCP connection
    Tcp,
}

/// Startup and shutdown timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorSettings {
    /// Time a child gets to exit after SIGTERM before it is killed
    pub grace_period_ms: u64,
    /// Fixed delay between frontend and backend start (delay mode)
    pub startup_delay_ms: u64,
    /// Readiness strategy
    pub readiness: ReadinessMode,
    /// Upper bound on the TCP probe (tcp mode)
    pub readiness_timeout_ms: u64,
    /// Interval between TCP probe attempts (tcp mode)
    pub probe_interval_ms: u64,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            grace_period_ms: 5000,
            startup_delay_ms: 1000,
            readiness: ReadinessMode::Delay,
            readiness_timeout_ms: 15000,
            probe_interval_ms: 100,
        }
    }
}

impl SupervisorSettings {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_millis(self.readiness_timeout_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }
}

/// Frontend dependency install check
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    /// Whether to run the check at all
    pub enabled: bool,
    /// Path whose absence means dependencies are missing
    pub marker: PathBuf,
    /// Command that installs the dependencies
    pub command: Vec<String>,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            marker: PathBuf::from("node_modules"),
            command: vec!["npm".to_string(), "install".to_string()],
        }
    }
}

/// Browser launch after startup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Open a tab once both servers are up
    pub open: bool,
    /// Address to open; defaults to the frontend port on localhost
    pub url: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            open: true,
            url: None,
        }
    }
}

impl DevConfig {
    /// Load configuration from defaults, a settings file and the environment.
    ///
    /// With `path` set the file is required; otherwise `solaria-dev.toml`
    /// in the working directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => ::config::File::from(path).required(true),
            None => ::config::File::from(Path::new(DEFAULT_CONFIG_FILE)).required(false),
        };

        let config: DevConfig = ::config::Config::builder()
            .add_source(file)
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the supervisor cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frontend.command.is_empty() {
            return Err(invalid("frontend.command must not be empty"));
        }
        if self.backend.command.is_empty() {
            return Err(invalid("backend.command must not be empty"));
        }
        if self.frontend.port == 0 || self.backend.port == 0 {
            return Err(invalid("ports must be non-zero"));
        }
        if self.frontend.port == self.backend.port {
            return Err(invalid("frontend and backend ports must differ"));
        }
        if self.watch.paths.is_empty() {
            return Err(invalid("watch.paths must name at least one path"));
        }
        if self.watch.debounce_ms == 0 {
            return Err(invalid("watch.debounce_ms must be greater than zero"));
        }
        if self.install.enabled && self.install.command.is_empty() {
            return Err(invalid("install.command must not be empty when install is enabled"));
        }
        Ok(())
    }

    /// Settings that are accepted but probably wrong for a dev session
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.backend.command.iter().any(|arg| arg.starts_with(STATIC_DIR_FLAG)) {
            warnings.push(format!(
                "backend.command contains {}; development mode expects an API-only backend",
                STATIC_DIR_FLAG
            ));
        }
        warnings
    }

    /// Watch paths with relative entries resolved against the backend's
    /// working directory, where the watched sources live
    pub fn watch_paths(&self) -> Vec<PathBuf> {
        self.watch
            .paths
            .iter()
            .map(|path| {
                if path.is_absolute() {
                    path.clone()
                } else {
                    self.backend.working_dir.join(path)
                }
            })
            .collect()
    }

    /// Address the browser is pointed at
    pub fn browser_url(&self) -> String {
        self.browser
            .url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.frontend.port))
    }
}

fn invalid(reason: &str) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    
    #[test]
    fn test_default_config_is_valid() {
        let config = DevConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.frontend.port, 5173);
        assert_eq!(config.backend.port, 4722);
        assert_eq!(config.supervisor.startup_delay(), Duration::from_secs(1));
        assert_eq!(config.supervisor.readiness, ReadinessMode::Delay);
    }

    #[test]
    fn test_backend_command_appends_config_file() {
        let backend = BackendConfig::default();
        let command = backend.command_for(Path::new("configs/dev.toml"));
        assert_eq!(command, vec!["python", "run.py", "configs/dev.toml"]);
        assert!(!command.iter().any(|arg| arg == "--static-dir"));
    }

    #[test]
    fn test_browser_url_defaults_to_frontend_port() {
        let mut config = DevConfig::default();
        assert_eq!(config.browser_url(), "http://localhost:5173");

        config.browser.url = Some("http://127.0.0.1:3000/app".to_string());
        assert_eq!(config.browser_url(), "http://127.0.0.1:3000/app");
    }

    #[test]
    fn test_watch_paths_follow_backend_working_dir() {
        let mut config = DevConfig::default();
        assert_eq!(
            config.watch_paths(),
            vec![PathBuf::from("./kbunified"), PathBuf::from("./run.py")]
        );

        config.backend.working_dir = PathBuf::from("/srv/app");
        config.watch.paths = vec![PathBuf::from("kbunified"), PathBuf::from("/etc/app.toml")];
        assert_eq!(
            config.watch_paths(),
            vec![PathBuf::from("/srv/app/kbunified"), PathBuf::from("/etc/app.toml")]
        );
    }

    #[test]
    fn test_static_dir_flag_warns_but_validates() {
        let mut config = DevConfig::default();
        assert!(config.warnings().is_empty());

        config.backend.command.push("--static-dir=dist".to_string());
        assert!(config.validate().is_ok());
        assert_eq!(config.warnings().len(), 1);
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut config = DevConfig::default();
        config.backend.command.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));

        let mut config = DevConfig::default();
        config.watch.paths.clear();
        assert!(config.validate().is_err());

        let mut config = DevConfig::default();
        config.watch.debounce_ms = 0;
        assert!(config.validate().is_err());

        let mut config = DevConfig::default();
        config.backend.port = config.frontend.port;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file_merges_with_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[backend]
command = ["python3", "-m", "kbunified"]

[watch]
paths = ["src"]
debounce_ms = 250

[supervisor]
readiness = "tcp"
"#
        )
        .unwrap();

        let config = DevConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.backend.command, vec!["python3", "-m", "kbunified"]);
        assert_eq!(config.backend.port, DEFAULT_BACKEND_PORT);
        assert_eq!(config.watch.paths, vec![PathBuf::from("src")]);
        assert_eq!(config.watch.debounce(), Duration::from_millis(250));
        assert_eq!(config.watch.ignore, default_ignore_patterns());
        assert_eq!(config.supervisor.readiness, ReadinessMode::Tcp);
        assert_eq!(config.frontend.command, vec!["npm", "run", "dev"]);
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let result = DevConfig::load(Some(Path::new("/definitely/not/here/solaria-dev.toml")));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }
}
