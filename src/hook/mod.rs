//! hook
//!
//! Push-Time Hook Process.
//!
//! # Architecture
//!
//! The toolchain runs the generated `pre-receive` script on every push; the
//! script re-invokes `hostgit hook --policy=<sidecar> pre-receive`, which
//! lands in [`pre_receive::run`]. The process is short-lived and stateless:
//! it reads the protected-branch list from disk, the ref updates from
//! standard input, decides, and optionally hands over to the repository's
//! custom hook.
//!
//! # Invariants
//!
//! - Only `refs/heads/*` updates are subject to branch protection
//! - Wiki repositories are never subject to branch protection
//! - A rejection happens before any custom hook runs
//! - Nothing is written to standard output except by the custom hook

pub mod pre_receive;

pub use pre_receive::{evaluate, parse_updates, run, HookOutcome, PreReceiveOptions, RefUpdate};

use std::path::PathBuf;

use thiserror::Error;

use crate::git::ToolchainError;
use crate::policy::PolicyError;

/// Errors from the hook process.
#[derive(Debug, Error)]
pub enum HookError {
    /// A line of standard input is not `<old> <new> <ref>`.
    #[error("malformed ref update on line {line}: {message}")]
    Input { line: usize, message: String },

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Toolchain(#[from] ToolchainError),

    #[error("failed to run {}: {source}", path.display())]
    CustomHook {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
