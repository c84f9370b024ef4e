//! git::interface
//!
//! Read-side Git interface implementation using git2.
//!
//! This module is the **single doorway** for reading repository state:
//! branches, commits, trees and ancestry. Mutations never go through git2;
//! they are driven through the toolchain capability in [`super::toolchain`].
//!
//! # Architecture
//!
//! The `Git` struct is the only type that touches `git2`. No other module
//! should import `git2` directly. This ensures:
//!
//! - Consistent error handling across all reads
//! - Strong type guarantees at the boundary
//! - Read queries never mutate the repository on disk
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: Path does not hold a repository
//! - [`GitError::RefNotFound`]: Requested ref does not exist
//! - [`GitError::ObjectNotFound`]: Requested object does not exist
//!
//! # Example
//!
//! ```ignore
//! use hostgit::git::Git;
//! use hostgit::core::types::BranchName;
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("/srv/repos/alice/notes.git"))?;
//! let main = BranchName::new("main")?;
//! let tip = git.branch_commit(&main)?;
//! println!("main is at {}", tip.short(7));
//! ```

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::core::types::{BranchName, Oid, RefName, TypeError};

/// Errors from Git read operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was opened
        path: PathBuf,
    },

    /// Repository already exists where one was to be created.
    #[error("repository already exists: {path}")]
    AlreadyExists {
        /// The existing path
        path: PathBuf,
    },

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Object not found in repository.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// Invalid ref name format.
    #[error("invalid ref name: {message}")]
    InvalidRefName {
        /// Description of the problem
        message: String,
    },

    /// Permission or filesystem error.
    #[error("repository access error: {message}")]
    AccessError {
        /// Description of the error
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => {
                if context.starts_with("refs/") || context.contains("ref") {
                    GitError::RefNotFound {
                        refname: context.to_string(),
                    }
                } else {
                    GitError::ObjectNotFound {
                        oid: context.to_string(),
                    }
                }
            }
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: context.to_string(),
            },
            git2::ErrorCode::Locked => GitError::AccessError {
                message: format!("repository is locked: {}", err.message()),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }

    fn internal(err: git2::Error) -> Self {
        GitError::Internal {
            message: err.message().to_string(),
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => GitError::InvalidOid { oid: msg },
            TypeError::InvalidRefName(msg)
            | TypeError::InvalidBranchName(msg)
            | TypeError::InvalidRepoId(msg) => GitError::InvalidRefName { message: msg },
        }
    }
}

/// Kind of an entry in a commit tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Blob,
    Executable,
    Symlink,
    Tree,
    Submodule,
}

impl EntryKind {
    fn from_filemode(mode: i32) -> Self {
        match mode {
            0o040000 => EntryKind::Tree,
            0o120000 => EntryKind::Symlink,
            0o160000 => EntryKind::Submodule,
            0o100755 => EntryKind::Executable,
            _ => EntryKind::Blob,
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, EntryKind::Tree)
    }
}

/// Information about a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitInfo {
    /// The commit OID
    pub oid: Oid,
    /// First line of the commit message
    pub summary: String,
    /// Full commit message
    pub message: String,
    /// Author name
    pub author_name: String,
    /// Author email
    pub author_email: String,
    /// Author timestamp
    pub author_time: chrono::DateTime<chrono::Utc>,
}

/// The read-side Git interface.
///
/// # Example
///
/// ```ignore
/// use hostgit::git::Git;
///
/// let git = Git::open(Path::new("/srv/repos/alice/notes.git"))?;
/// for branch in git.list_branches()? {
///     println!("{branch}");
/// }
/// ```
pub struct Git {
    /// The underlying git2 repository
    repo: git2::Repository,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Repository Opening and Creation
    // =========================================================================

    /// Open the repository at exactly `path` (bare or not).
    ///
    /// Unlike discovery, parent directories are never searched, so a
    /// missing bare repository is reported rather than silently resolved
    /// to an enclosing one.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found at `path`
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::open(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;
        Ok(Self { repo })
    }

    /// Create an empty bare repository whose `HEAD` names `initial_branch`.
    ///
    /// # Errors
    ///
    /// - [`GitError::AlreadyExists`] if `path` already exists
    pub fn init_bare(path: &Path, initial_branch: &BranchName) -> Result<Self, GitError> {
        if path.exists() {
            return Err(GitError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }

        let mut options = git2::RepositoryInitOptions::new();
        options
            .bare(true)
            .mkdir(true)
            .mkpath(true)
            .initial_head(initial_branch.as_str());

        let repo = git2::Repository::init_opts(path, &options).map_err(GitError::internal)?;
        Ok(Self { repo })
    }

    /// Get the repository's git directory.
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    pub fn is_bare(&self) -> bool {
        self.repo.is_bare()
    }

    /// Make another repository's objects readable from this handle.
    ///
    /// The alternate lives only in this in-memory handle; nothing is written
    /// to the repository's `objects/info/alternates`.
    pub fn add_object_alternate(&self, other_git_dir: &Path) -> Result<(), GitError> {
        let objects = other_git_dir.join("objects");
        let objects = objects.to_str().ok_or_else(|| GitError::AccessError {
            message: format!("non UTF-8 path: {}", objects.display()),
        })?;
        self.repo
            .odb()
            .and_then(|odb| odb.add_disk_alternate(objects))
            .map_err(GitError::internal)
    }

    // =========================================================================
    // Ref Queries
    // =========================================================================

    /// Resolve a ref to the commit it points at.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let oid = git.resolve_ref("refs/heads/main")?;
    /// println!("main is at {}", oid.short(7));
    /// ```
    pub fn resolve_ref(&self, refname: &str) -> Result<Oid, GitError> {
        let reference = self
            .repo
            .find_reference(refname)
            .map_err(|e| GitError::from_git2(e, refname))?;

        let oid = reference
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, refname))?
            .id();

        Oid::new(oid.to_string()).map_err(|e| e.into())
    }

    /// Resolve a ref, returning None if it doesn't exist.
    pub fn try_resolve_ref(&self, refname: &str) -> Result<Option<Oid>, GitError> {
        match self.resolve_ref(refname) {
            Ok(oid) => Ok(Some(oid)),
            Err(GitError::RefNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Check if a branch exists.
    pub fn has_branch(&self, branch: &BranchName) -> bool {
        self.repo
            .find_reference(RefName::for_branch(branch).as_str())
            .is_ok()
    }

    /// Get the commit a branch points at.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefNotFound`] if the branch does not exist
    pub fn branch_commit(&self, branch: &BranchName) -> Result<Oid, GitError> {
        self.resolve_ref(RefName::for_branch(branch).as_str())
    }

    /// List all local branches.
    ///
    /// Returns validated `BranchName` instances, skipping names this crate
    /// cannot represent.
    pub fn list_branches(&self) -> Result<Vec<BranchName>, GitError> {
        let branches = self
            .repo
            .branches(Some(git2::BranchType::Local))
            .map_err(GitError::internal)?;

        let mut names = Vec::new();
        for branch in branches {
            let (branch, _) = branch.map_err(GitError::internal)?;
            if let Some(name) = branch.name().ok().flatten() {
                if let Ok(branch_name) = BranchName::new(name) {
                    names.push(branch_name);
                }
            }
        }

        names.sort();
        Ok(names)
    }

    // =========================================================================
    // Commit and Tree Queries
    // =========================================================================

    fn find_commit(&self, oid: &Oid) -> Result<git2::Commit<'_>, GitError> {
        let git_oid =
            git2::Oid::from_str(oid.as_str()).map_err(|e| GitError::from_git2(e, oid.as_str()))?;
        self.repo
            .find_commit(git_oid)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))
    }

    /// Whether `oid` names a commit present in this repository.
    pub fn commit_exists(&self, oid: &Oid) -> bool {
        self.find_commit(oid).is_ok()
    }

    fn to_commit_info(commit: &git2::Commit<'_>) -> Result<CommitInfo, GitError> {
        let author = commit.author();
        let author_time = chrono::DateTime::from_timestamp(author.when().seconds(), 0)
            .unwrap_or(chrono::DateTime::UNIX_EPOCH)
            .with_timezone(&chrono::Utc);

        Ok(CommitInfo {
            oid: Oid::new(commit.id().to_string())?,
            summary: commit.summary().unwrap_or("").to_string(),
            message: commit.message().unwrap_or("").to_string(),
            author_name: author.name().unwrap_or("").to_string(),
            author_email: author.email().unwrap_or("").to_string(),
            author_time,
        })
    }

    /// Look up the kind of the entry at `path` in a commit's tree.
    ///
    /// Returns `None` when nothing exists at that path. An empty path names
    /// the root tree.
    pub fn tree_entry_kind(&self, commit: &Oid, path: &str) -> Result<Option<EntryKind>, GitError> {
        if path.is_empty() {
            return Ok(Some(EntryKind::Tree));
        }

        let tree = self
            .find_commit(commit)?
            .tree()
            .map_err(|e| GitError::from_git2(e, commit.as_str()))?;

        match tree.get_path(Path::new(path)) {
            Ok(entry) => Ok(Some(EntryKind::from_filemode(entry.filemode()))),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::from_git2(e, path)),
        }
    }

    // =========================================================================
    // Ancestry Queries
    // =========================================================================

    /// Find the merge base of two commits.
    ///
    /// Returns `None` if the commits share no history.
    pub fn merge_base(&self, oid1: &Oid, oid2: &Oid) -> Result<Option<Oid>, GitError> {
        let git_oid1 = git2::Oid::from_str(oid1.as_str())
            .map_err(|e| GitError::from_git2(e, oid1.as_str()))?;
        let git_oid2 = git2::Oid::from_str(oid2.as_str())
            .map_err(|e| GitError::from_git2(e, oid2.as_str()))?;

        match self.repo.merge_base(git_oid1, git_oid2) {
            Ok(oid) => Ok(Some(Oid::new(oid.to_string())?)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::internal(e)),
        }
    }

    /// Commits reachable from `head` but not from `base`, oldest first.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let commits = git.commits_between(&merge_base, &head)?;
    /// for commit in &commits {
    ///     println!("{} {}", commit.oid.short(7), commit.summary);
    /// }
    /// ```
    pub fn commits_between(&self, base: &Oid, head: &Oid) -> Result<Vec<CommitInfo>, GitError> {
        let base_oid = git2::Oid::from_str(base.as_str())
            .map_err(|e| GitError::from_git2(e, base.as_str()))?;
        let head_oid = git2::Oid::from_str(head.as_str())
            .map_err(|e| GitError::from_git2(e, head.as_str()))?;

        let mut revwalk = self.repo.revwalk().map_err(GitError::internal)?;
        revwalk
            .set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::REVERSE)
            .map_err(GitError::internal)?;
        revwalk.push(head_oid).map_err(GitError::internal)?;
        revwalk.hide(base_oid).map_err(GitError::internal)?;

        let mut commits = Vec::new();
        for oid in revwalk {
            let oid = oid.map_err(GitError::internal)?;
            let commit = self
                .repo
                .find_commit(oid)
                .map_err(|e| GitError::from_git2(e, &oid.to_string()))?;
            commits.push(Self::to_commit_info(&commit)?);
        }
        Ok(commits)
    }

    /// Number of files that differ between two commits' trees.
    pub fn changed_file_count(&self, base: &Oid, head: &Oid) -> Result<usize, GitError> {
        let base_tree = self
            .find_commit(base)?
            .tree()
            .map_err(|e| GitError::from_git2(e, base.as_str()))?;
        let head_tree = self
            .find_commit(head)?
            .tree()
            .map_err(|e| GitError::from_git2(e, head.as_str()))?;

        let diff = self
            .repo
            .diff_tree_to_tree(Some(&base_tree), Some(&head_tree), None)
            .map_err(GitError::internal)?;
        Ok(diff.deltas().len())
    }
}
