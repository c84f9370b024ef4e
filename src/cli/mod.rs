//! cli
//!
//! Command-line interface layer for hostgit.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Install the tracing subscriber
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and dispatches to the
//! [`crate::engine`], [`crate::policy`] and [`crate::hook`] layers. Handlers
//! own no repository logic; they translate arguments into engine requests
//! and print results.
//!
//! Logging goes to stderr. `HOSTGIT_LOG` takes an `EnvFilter` directive;
//! without it the level is `info`, or `debug` under `--debug`.

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::core::config::Config;
use crate::engine::HostContext;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "HOSTGIT_LOG";

/// Invocation-wide settings handed to every command.
#[derive(Debug, Clone, Default)]
pub struct CliContext {
    /// Explicit `--config` path
    pub config_path: Option<PathBuf>,
    pub debug: bool,
}

impl CliContext {
    /// Load configuration and build the orchestration context.
    ///
    /// Configuration warnings are logged, not fatal.
    pub fn host(&self) -> Result<HostContext> {
        let loaded = Config::load(self.config_path.as_deref())?;
        for warning in &loaded.warnings {
            warn!(path = %warning.path.display(), "{}", warning.message);
        }
        Ok(HostContext::new(loaded.config))
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

/// Run the CLI application and return the process exit code.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<i32> {
    let cli = Cli::parse_args();
    init_tracing(cli.debug);

    let ctx = CliContext {
        config_path: cli.config.clone(),
        debug: cli.debug,
    };

    commands::dispatch(cli.command, &ctx)
}

/// Install the stderr subscriber. A second call is a no-op.
pub fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
