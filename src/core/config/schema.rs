//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Validation
//!
//! Config values are validated after parsing to ensure they conform to
//! expected formats (e.g., the default branch must be a valid branch name,
//! diff limits must be positive).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::BranchName;

/// Top-level configuration file.
///
/// # Example
///
/// ```toml
/// [repository]
/// root = "/var/lib/hostgit/repositories"
/// local_path = "/var/lib/hostgit/data"
/// default_branch = "main"
///
/// [git]
/// max_diff_files = 100
///
/// [git.timeout]
/// clone = 300
///
/// [hook]
/// app_path = "/usr/local/bin/hostgit"
///
/// [identity]
/// name = "hostgit"
/// email = "hostgit@localhost"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// Repository storage locations
    pub repository: Option<RepositoryConfig>,

    /// Toolchain limits and timeouts
    pub git: Option<GitConfig>,

    /// Delegate hook generation
    pub hook: Option<HookConfig>,

    /// Service identity for commits this layer authors
    pub identity: Option<IdentityConfig>,
}

impl HostConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(repository) = &self.repository {
            repository.validate()?;
        }
        if let Some(git) = &self.git {
            git.validate()?;
        }
        if let Some(hook) = &self.hook {
            hook.validate()?;
        }
        if let Some(identity) = &self.identity {
            identity.validate()?;
        }
        Ok(())
    }
}

/// `[repository]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Directory holding bare repositories
    pub root: Option<PathBuf>,

    /// Directory holding local copies, uploads and merge temp clones
    pub local_path: Option<PathBuf>,

    /// Branch used when a repository is initialised
    pub default_branch: Option<String>,
}

impl RepositoryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, path) in [("root", &self.root), ("local_path", &self.local_path)] {
            if let Some(path) = path {
                if path.as_os_str().is_empty() {
                    return Err(ConfigError::InvalidValue(format!(
                        "repository.{key} cannot be empty"
                    )));
                }
            }
        }

        if let Some(branch) = &self.default_branch {
            BranchName::new(branch).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid default branch name: {}", e))
            })?;
        }

        Ok(())
    }
}

/// `[git]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GitConfig {
    /// Maximum number of files in a rendered diff
    pub max_diff_files: Option<usize>,

    /// Maximum number of lines in a rendered diff
    pub max_diff_lines: Option<usize>,

    /// Maximum characters in a single diff line
    pub max_diff_line_chars: Option<usize>,

    /// Toolchain timeouts in seconds
    pub timeout: Option<TimeoutConfig>,
}

impl GitConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("max_diff_files", self.max_diff_files),
            ("max_diff_lines", self.max_diff_lines),
            ("max_diff_line_chars", self.max_diff_line_chars),
        ] {
            if value == Some(0) {
                return Err(ConfigError::InvalidValue(format!(
                    "git.{key} must be greater than zero"
                )));
            }
        }
        if let Some(timeout) = &self.timeout {
            timeout.validate()?;
        }
        Ok(())
    }
}

/// `[git.timeout]` section, all values in seconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutConfig {
    /// Local-copy clone and branch checkout
    pub clone: Option<u64>,

    /// Merge temp clone
    pub merge: Option<u64>,

    /// Bounded diff computation
    pub diff: Option<u64>,
}

impl TimeoutConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("clone", self.clone),
            ("merge", self.merge),
            ("diff", self.diff),
        ] {
            if value == Some(0) {
                return Err(ConfigError::InvalidValue(format!(
                    "git.timeout.{key} must be greater than zero"
                )));
            }
        }
        Ok(())
    }
}

/// `[hook]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HookConfig {
    /// Executable re-invoked by generated hook scripts
    pub app_path: Option<PathBuf>,

    /// Interpreter named in the hook shebang (`#!/usr/bin/env <script_type>`)
    pub script_type: Option<String>,
}

impl HookConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(script_type) = &self.script_type {
            if script_type.is_empty() || script_type.chars().any(char::is_whitespace) {
                return Err(ConfigError::InvalidValue(format!(
                    "hook.script_type must be a single interpreter name, got '{}'",
                    script_type
                )));
            }
        }
        Ok(())
    }
}

/// `[identity]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct IdentityConfig {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl IdentityConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if matches!(&self.name, Some(name) if name.trim().is_empty()) {
            return Err(ConfigError::InvalidValue(
                "identity.name cannot be empty".to_string(),
            ));
        }
        if matches!(&self.email, Some(email) if !email.contains('@')) {
            return Err(ConfigError::InvalidValue(
                "identity.email must contain '@'".to_string(),
            ));
        }
        Ok(())
    }
}
