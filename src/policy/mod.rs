//! policy
//!
//! Protected-Branch Policy Store and the delegate hook scripts that enforce it.
//!
//! # Architecture
//!
//! Policy data and enforcement code are kept apart:
//!
//! - [`store`]: the protected-branch list of one repository, kept in a JSON
//!   sidecar `<repo>.git/protected_branches.json`
//! - [`hooks`]: the generated `pre-receive` script, which only re-invokes
//!   `hostgit hook --policy=<sidecar> pre-receive`
//!
//! Repositories created before the sidecar existed carry their list inside
//! the hook text as `--branch='a,b'`. The store still reads that token when
//! no sidecar is present, and the first write migrates it.
//!
//! # Example
//!
//! ```ignore
//! use hostgit::policy::{HookScript, PolicyStore};
//!
//! let store = PolicyStore::new(&repo_path);
//! store.write(&release, true, &HookScript::from_config(&config))?;
//! assert!(store.read(&git)?.contains(&release));
//! ```

pub mod hooks;
pub mod store;

pub use hooks::{install_hooks, HookScript};
pub use store::{load_policy_file, PolicyStore};

use std::path::PathBuf;

use thiserror::Error;

use crate::core::types::TypeError;

/// Errors from policy storage.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The stored policy (sidecar or legacy hook) cannot be interpreted.
    #[error("malformed policy at {}: {message}", path.display())]
    Format { path: PathBuf, message: String },

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid policy file {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid protected branch: {0}")]
    InvalidBranch(#[from] TypeError),
}

impl PolicyError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PolicyError::Io {
            path: path.into(),
            source,
        }
    }
}
