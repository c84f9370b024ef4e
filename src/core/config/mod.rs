//! core::config
//!
//! Configuration schema and loading.
//!
//! # Locations
//!
//! Searched in order, first hit wins:
//! 1. An explicit path (the `--config` flag)
//! 2. `$HOSTGIT_CONFIG` if set
//! 3. `$XDG_CONFIG_HOME/hostgit/config.toml`
//! 4. `~/.hostgit/config.toml`
//!
//! When no file is found, every accessor falls back to its default.
//!
//! # Example
//!
//! ```no_run
//! use hostgit::core::config::Config;
//!
//! let result = Config::load(None).unwrap();
//! let config = result.config;
//!
//! let paths = config.paths();
//! println!("repositories under {}", paths.root.display());
//! println!("diff timeout: {:?}", config.diff_timeout());
//! ```

pub mod schema;

pub use schema::{GitConfig, HookConfig, HostConfig, IdentityConfig, RepositoryConfig, TimeoutConfig};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::core::paths::HostPaths;
use crate::core::types::{BranchName, Signature};
use crate::git::DiffLimits;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// The warning message.
    pub message: String,
    /// The path that triggered the warning.
    pub path: PathBuf,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Any warnings generated during loading.
    pub warnings: Vec<ConfigWarning>,
}

/// Loaded configuration with defaults applied by the accessors.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed file contents
    pub file: HostConfig,
    /// Path the file was loaded from, if any
    loaded_from: Option<PathBuf>,
}

impl Config {
    pub const DEFAULT_BRANCH: &'static str = "main";
    pub const DEFAULT_MAX_DIFF_FILES: usize = 100;
    pub const DEFAULT_MAX_DIFF_LINES: usize = 1000;
    pub const DEFAULT_MAX_DIFF_LINE_CHARS: usize = 2000;
    pub const DEFAULT_CLONE_TIMEOUT_SECS: u64 = 300;
    pub const DEFAULT_MERGE_TIMEOUT_SECS: u64 = 300;
    pub const DEFAULT_DIFF_TIMEOUT_SECS: u64 = 60;
    pub const DEFAULT_SCRIPT_TYPE: &'static str = "sh";

    /// Build a config from already-parsed contents.
    pub fn from_file(file: HostConfig) -> Result<Self, ConfigError> {
        file.validate()?;
        Ok(Self {
            file,
            loaded_from: None,
        })
    }

    /// Load configuration from the explicit path or the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit path does not exist, or if a config
    /// file exists but cannot be parsed or fails validation. Missing default
    /// locations are not an error.
    pub fn load(explicit: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        let mut warnings = Vec::new();

        let found = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                Some(path.to_path_buf())
            }
            None => Self::discover(&mut warnings),
        };

        let file = match &found {
            Some(path) => Self::read_config(path)?,
            None => HostConfig::default(),
        };
        file.validate()?;

        Ok(ConfigLoadResult {
            config: Config {
                file,
                loaded_from: found,
            },
            warnings,
        })
    }

    fn discover(warnings: &mut Vec<ConfigWarning>) -> Option<PathBuf> {
        // 1. Check $HOSTGIT_CONFIG
        if let Ok(path) = std::env::var("HOSTGIT_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            warnings.push(ConfigWarning {
                message: "HOSTGIT_CONFIG points at a missing file; falling back".to_string(),
                path,
            });
        }

        // 2. Check $XDG_CONFIG_HOME/hostgit/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("hostgit/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        // 3. Check ~/.hostgit/config.toml
        if let Some(home) = dirs::home_dir() {
            let path = home.join(".hostgit/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    fn read_config(path: &Path) -> Result<HostConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Write a config file atomically.
    ///
    /// Creates parent directories if needed, writes to a temp file in the
    /// same directory, then renames over the target.
    pub fn write(path: &Path, config: &HostConfig) -> Result<(), ConfigError> {
        config.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let contents =
            toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let temp_path = path.with_extension("toml.tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        file.write_all(contents.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| ConfigError::WriteError {
                path: temp_path.clone(),
                source: e,
            })?;

        fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    fn repository(&self) -> Option<&RepositoryConfig> {
        self.file.repository.as_ref()
    }

    fn git(&self) -> Option<&GitConfig> {
        self.file.git.as_ref()
    }

    fn timeout(&self) -> Option<&TimeoutConfig> {
        self.git().and_then(|g| g.timeout.as_ref())
    }

    /// Storage locations.
    ///
    /// Defaults to `<data dir>/hostgit/repositories` and
    /// `<data dir>/hostgit/data`.
    pub fn paths(&self) -> HostPaths {
        let base = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hostgit");
        let root = self
            .repository()
            .and_then(|r| r.root.clone())
            .unwrap_or_else(|| base.join("repositories"));
        let local_path = self
            .repository()
            .and_then(|r| r.local_path.clone())
            .unwrap_or_else(|| base.join("data"));
        HostPaths::new(root, local_path)
    }

    /// Branch created by repository initialisation. Defaults to `main`.
    pub fn default_branch(&self) -> Result<BranchName, ConfigError> {
        let name = self
            .repository()
            .and_then(|r| r.default_branch.as_deref())
            .unwrap_or(Self::DEFAULT_BRANCH);
        BranchName::new(name).map_err(|e| ConfigError::InvalidValue(e.to_string()))
    }

    /// Bounds applied to rendered diffs.
    pub fn diff_limits(&self) -> DiffLimits {
        let git = self.git();
        DiffLimits {
            max_files: git
                .and_then(|g| g.max_diff_files)
                .unwrap_or(Self::DEFAULT_MAX_DIFF_FILES),
            max_lines: git
                .and_then(|g| g.max_diff_lines)
                .unwrap_or(Self::DEFAULT_MAX_DIFF_LINES),
            max_line_chars: git
                .and_then(|g| g.max_diff_line_chars)
                .unwrap_or(Self::DEFAULT_MAX_DIFF_LINE_CHARS),
        }
    }

    pub fn clone_timeout(&self) -> Duration {
        Duration::from_secs(
            self.timeout()
                .and_then(|t| t.clone)
                .unwrap_or(Self::DEFAULT_CLONE_TIMEOUT_SECS),
        )
    }

    pub fn merge_timeout(&self) -> Duration {
        Duration::from_secs(
            self.timeout()
                .and_then(|t| t.merge)
                .unwrap_or(Self::DEFAULT_MERGE_TIMEOUT_SECS),
        )
    }

    pub fn diff_timeout(&self) -> Duration {
        Duration::from_secs(
            self.timeout()
                .and_then(|t| t.diff)
                .unwrap_or(Self::DEFAULT_DIFF_TIMEOUT_SECS),
        )
    }

    /// Executable re-invoked by generated hook scripts.
    ///
    /// Defaults to the running executable, or `hostgit` on `PATH` if that
    /// cannot be determined.
    pub fn hook_app_path(&self) -> PathBuf {
        self.file
            .hook
            .as_ref()
            .and_then(|h| h.app_path.clone())
            .or_else(|| std::env::current_exe().ok())
            .unwrap_or_else(|| PathBuf::from("hostgit"))
    }

    /// Interpreter named in generated hook shebangs. Defaults to `sh`.
    pub fn hook_script_type(&self) -> &str {
        self.file
            .hook
            .as_ref()
            .and_then(|h| h.script_type.as_deref())
            .unwrap_or(Self::DEFAULT_SCRIPT_TYPE)
    }

    /// Identity used for commits this layer authors on its own behalf.
    pub fn service_identity(&self) -> Signature {
        let identity = self.file.identity.as_ref();
        Signature::new(
            identity
                .and_then(|i| i.name.clone())
                .unwrap_or_else(|| "hostgit".to_string()),
            identity
                .and_then(|i| i.email.clone())
                .unwrap_or_else(|| "hostgit@localhost".to_string()),
        )
    }

    /// Get the path the config was loaded from.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.loaded_from.as_deref()
    }
}
