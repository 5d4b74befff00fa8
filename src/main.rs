//! solaria-dev command line entry point
//!
//! Usage:
//!   solaria-dev [OPTIONS] <CONFIG_FILE>
//!
//! Starts the frontend dev server, then the backend with CONFIG_FILE as its
//! only argument, and restarts the backend whenever its sources change.
//! Flags it does not know are ignored so wrapper tooling can pass its own.

use std::path::PathBuf;

use anyhow::Context;

use solaria_dev::logging::{LogLevel, LoggingSystem};
use solaria_dev::{DevConfig, LaunchOptions, Launcher};

/// Command line arguments
struct Args {
    /// Configuration file passed through to the backend
    config_file: PathBuf,
    /// Supervisor settings file (defaults to ./solaria-dev.toml)
    dev_config: Option<PathBuf>,
    /// Enable debug logging
    verbose: bool,
    /// Do not open a browser tab
    no_browser: bool,
    /// Do not run the dependency install check
    skip_install: bool,
    /// Unrecognized flags and extra positionals
    ignored: Vec<String>,
}

impl Args {
    fn parse() -> Result<Self, String> {
        let mut args = std::env::args().skip(1);
        let mut config_file = None;
        let mut dev_config = None;
        let mut verbose = false;
        let mut no_browser = false;
        let mut skip_install = false;
        let mut ignored = Vec::new();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--verbose" | "-v" => verbose = true,
                "--no-browser" => no_browser = true,
                "--skip-install" => skip_install = true,
                "--dev-config" => {
                    let path = args.next().ok_or("--dev-config requires a path")?;
                    dev_config = Some(PathBuf::from(path));
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                flag if flag.starts_with('-') => ignored.push(arg),
                _ if config_file.is_none() => config_file = Some(PathBuf::from(arg)),
                _ => ignored.push(arg),
            }
        }

        let config_file = config_file.ok_or("missing <CONFIG_FILE>")?;

        Ok(Self {
            config_file,
            dev_config,
            verbose,
            no_browser,
            skip_install,
            ignored,
        })
    }
}

fn print_help() {
    println!(
        r#"solaria-dev - Development Mode Supervisor

USAGE:
    solaria-dev [OPTIONS] <CONFIG_FILE>

ARGS:
    <CONFIG_FILE>           Configuration file handed to the backend

OPTIONS:
    -v, --verbose           Enable debug logging
        --no-browser        Do not open a browser tab after startup
        --skip-install      Skip the frontend dependency install check
        --dev-config <PATH> Supervisor settings (default: ./solaria-dev.toml)
    -h, --help              Print this help message

DESCRIPTION:
    Starts the frontend dev server, waits for it, then starts the backend
    API server with CONFIG_FILE as its only argument. Changes under the
    watched backend paths restart the backend; the frontend keeps running.
    Ctrl-C stops the backend, then the frontend. SIGHUP restarts the backend.

    Settings can be overridden with SOLARIA_DEV__<SECTION>__<KEY>
    environment variables, e.g. SOLARIA_DEV__WATCH__DEBOUNCE_MS=250.

EXIT CODES:
    0    clean shutdown
    1    startup or configuration failure
    130  interrupted during startup
"#
    );
}

fn run(args: Args) -> anyhow::Result<i32> {
    let config = DevConfig::load(args.dev_config.as_deref())
        .context("failed to load supervisor settings")?;

    let mut logging = config.logging.clone();
    if args.verbose {
        logging = logging.with_level(LogLevel::Debug);
    }
    let _logging_system = LoggingSystem::init(logging).context("failed to initialize logging")?;

    for arg in &args.ignored {
        tracing::debug!("ignoring argument {}", arg);
    }

    let mut options = LaunchOptions::new(args.config_file);
    options.open_browser = !args.no_browser;
    options.skip_install = args.skip_install;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;

    let exit = runtime.block_on(Launcher::new(config, options).run());
    Ok(exit.code())
}

fn main() {
    let args = match Args::parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    match run(args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
