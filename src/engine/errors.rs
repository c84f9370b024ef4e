//! engine::errors
//!
//! The single terminal error of every orchestration operation.
//!
//! # Propagation
//!
//! Lower layers own their own error enums ([`ToolchainError`], [`GitError`],
//! [`TypeError`], [`PolicyError`], [`LockError`]); each converts into exactly one
//! [`HostError`] member. Nothing in the engine retries. A caller that wants
//! retry semantics re-invokes the whole operation, which is safe because
//! every mutating operation starts by discarding and re-syncing its local
//! copy.
//!
//! # Exposure
//!
//! [`HostError::public_message`] is what an untrusted caller may see.
//! Subprocess diagnostics stay in the `Display` form and in the logs.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::core::ops::LockError;
use crate::core::types::TypeError;
use crate::git::{GitError, Stage, ToolchainError};
use crate::policy::PolicyError;

/// Errors from orchestration operations.
#[derive(Debug, Error)]
pub enum HostError {
    /// An external toolchain invocation exited non-zero.
    #[error("git {stage} failed: {stderr}")]
    Toolchain { stage: Stage, stderr: String },

    /// A bounded toolchain step ran out of time.
    #[error("git {stage} timed out after {}s", timeout.as_secs())]
    Timeout { stage: Stage, timeout: Duration },

    /// A mutation would land inside repository metadata.
    #[error("path '{path}' is inside repository metadata")]
    PathSecurity { path: String },

    /// The change does not apply to the target branch.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A branch, commit, path or patch does not exist.
    #[error("{what} not found: {name}")]
    NotFound { what: &'static str, name: String },

    /// A new file or branch collides with an existing one.
    #[error("{what} already exists: {name}")]
    AlreadyExists { what: &'static str, name: String },

    /// A local filesystem operation failed.
    #[error("i/o error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored protected-branch policy could not be interpreted.
    #[error("malformed branch policy at {}: {message}", path.display())]
    PolicyFormat { path: PathBuf, message: String },

    /// An intermediate path segment is a file, not a directory.
    #[error("'{path}' is a file, not a directory")]
    DirectoryIsFile { path: String },

    /// The target path names a directory.
    #[error("'{path}' is a directory")]
    FilenameIsDirectory { path: String },

    /// The target path is a symbolic link.
    #[error("'{path}' is a symbolic link")]
    FileIsSymlink { path: String },

    /// Base and head share no history.
    #[error("no common ancestor between {base} and {head}")]
    NoMergeBase { base: String, head: String },

    /// The request itself is malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HostError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HostError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn not_found(what: &'static str, name: impl Into<String>) -> Self {
        HostError::NotFound {
            what,
            name: name.into(),
        }
    }

    pub(crate) fn already_exists(what: &'static str, name: impl Into<String>) -> Self {
        HostError::AlreadyExists {
            what,
            name: name.into(),
        }
    }

    /// Stable HTTP status for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            HostError::InvalidInput(_) | HostError::NoMergeBase { .. } => 400,
            HostError::PathSecurity { .. } => 403,
            HostError::NotFound { .. } => 404,
            HostError::AlreadyExists { .. } | HostError::Conflict(_) => 409,
            HostError::DirectoryIsFile { .. }
            | HostError::FilenameIsDirectory { .. }
            | HostError::FileIsSymlink { .. } => 422,
            HostError::Timeout { .. } => 504,
            HostError::Toolchain { .. }
            | HostError::Io { .. }
            | HostError::PolicyFormat { .. }
            | HostError::Internal(_) => 500,
        }
    }

    /// Message safe to return to an untrusted caller.
    pub fn public_message(&self) -> String {
        match self {
            HostError::Toolchain { stage, .. } => format!("git {} failed", stage),
            HostError::Io { .. } => "internal i/o error".to_string(),
            HostError::PolicyFormat { .. } => "branch protection policy is unreadable".to_string(),
            HostError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<ToolchainError> for HostError {
    fn from(err: ToolchainError) -> Self {
        match err {
            ToolchainError::Failed { stage, stderr } => HostError::Toolchain { stage, stderr },
            ToolchainError::Timeout { stage, timeout } => HostError::Timeout { stage, timeout },
            ToolchainError::Spawn { stage, source } => HostError::Toolchain {
                stage,
                stderr: source.to_string(),
            },
            ToolchainError::Output { stage, output } => HostError::Toolchain {
                stage,
                stderr: format!("unexpected output: {}", output),
            },
        }
    }
}

impl From<GitError> for HostError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::NotARepo { path } => {
                HostError::not_found("repository", path.display().to_string())
            }
            GitError::AlreadyExists { path } => {
                HostError::already_exists("repository", path.display().to_string())
            }
            GitError::RefNotFound { refname } => HostError::not_found("ref", refname),
            GitError::ObjectNotFound { oid } => HostError::not_found("object", oid),
            GitError::InvalidOid { oid } => HostError::InvalidInput(format!("invalid object id: {}", oid)),
            GitError::InvalidRefName { message } => HostError::InvalidInput(message),
            GitError::AccessError { message } | GitError::Internal { message } => {
                HostError::Internal(message)
            }
        }
    }
}

impl From<LockError> for HostError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Create { path, source } | LockError::Acquire { path, source } => {
                HostError::Io { path, source }
            }
            other @ LockError::Interrupted { .. } => HostError::Internal(other.to_string()),
        }
    }
}

impl From<TypeError> for HostError {
    fn from(err: TypeError) -> Self {
        HostError::InvalidInput(err.to_string())
    }
}

impl From<PolicyError> for HostError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::Format { path, message } => HostError::PolicyFormat { path, message },
            PolicyError::Io { path, source } => HostError::Io { path, source },
            PolicyError::Json { path, source } => HostError::PolicyFormat {
                path,
                message: source.to_string(),
            },
            PolicyError::InvalidBranch(err) => HostError::InvalidInput(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod status {
        use super::*;

        #[test]
        fn taxonomy_maps_to_stable_codes() {
            assert_eq!(HostError::PathSecurity { path: ".git/config".into() }.status_code(), 403);
            assert_eq!(HostError::not_found("branch", "main").status_code(), 404);
            assert_eq!(HostError::already_exists("file", "a.txt").status_code(), 409);
            assert_eq!(HostError::Conflict("x".into()).status_code(), 409);
            assert_eq!(HostError::DirectoryIsFile { path: "a".into() }.status_code(), 422);
            assert_eq!(
                HostError::Timeout {
                    stage: Stage::Clone,
                    timeout: Duration::from_secs(1)
                }
                .status_code(),
                504
            );
        }
    }

    mod exposure {
        use super::*;

        #[test]
        fn public_message_hides_stderr() {
            let err = HostError::Toolchain {
                stage: Stage::Push,
                stderr: "fatal: /secret/path/repo.git rejected".into(),
            };
            assert_eq!(err.public_message(), "git push failed");
            assert!(err.to_string().contains("/secret/path"));
        }

        #[test]
        fn public_message_keeps_user_errors() {
            let err = HostError::not_found("branch", "feature");
            assert_eq!(err.public_message(), "branch not found: feature");
        }
    }

    mod conversions {
        use super::*;

        #[test]
        fn toolchain_failure_keeps_stage() {
            let err: HostError = ToolchainError::Failed {
                stage: Stage::Rebase,
                stderr: "could not apply".into(),
            }
            .into();
            assert!(matches!(err, HostError::Toolchain { stage: Stage::Rebase, .. }));
        }

        #[test]
        fn lock_file_failure_is_io() {
            let err: HostError = LockError::Create {
                path: PathBuf::from("/srv/data/locks/alice/notes.lock"),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            }
            .into();
            assert!(matches!(err, HostError::Io { .. }));
            assert_eq!(err.public_message(), "internal i/o error");
        }

        #[test]
        fn missing_ref_is_not_found() {
            let err: HostError = GitError::RefNotFound {
                refname: "refs/heads/x".into(),
            }
            .into();
            assert_eq!(err.status_code(), 404);
        }
    }
}
