//! core::paths
//!
//! Centralized path routing for hostgit storage locations.
//!
//! # Architecture
//!
//! Every on-disk location this layer touches is computed here. The layout is
//! shared with the version-control toolchain and with the hook process, so
//! it must stay bit-for-bit stable.
//!
//! **Hard rule:** no other module joins `localRepo`, `uploads`, `pulls` or
//! hook file names onto a path. All paths go through `HostPaths`.
//!
//! # Storage Layout
//!
//! Under the repository root:
//! - `<owner>/<name>.git` - bare repository
//! - `<owner>/<name>.git/pulls/<index>.patch` - persisted pull-request patches
//! - `<owner>/<name>.git/protected_branches.json` - protected-branch sidecar
//! - `<owner>/<name>.git/hooks/pre-receive` - generated delegate hook
//! - `<owner>/<name>.git/custom_hooks/pre-receive` - optional user hook
//!
//! Under the local path:
//! - `localRepo/<owner>/<name>` - local working copy
//! - `locks/<owner>/<name>.lock` - cross-process repository lock file
//! - `uploads/<u0>/<u1>/<uuid>` - pending upload blobs
//! - `data/` - parent of merge temp clones
//!
//! # Example
//!
//! ```
//! use hostgit::core::paths::HostPaths;
//! use hostgit::core::types::RepoId;
//! use std::path::PathBuf;
//!
//! let paths = HostPaths::new("/srv/repos", "/srv/data");
//! let repo = RepoId::new("alice", "notes").unwrap();
//!
//! assert_eq!(paths.repo_path(&repo), PathBuf::from("/srv/repos/alice/notes.git"));
//! assert_eq!(
//!     paths.local_copy_path(&repo),
//!     PathBuf::from("/srv/data/localRepo/alice/notes")
//! );
//! ```

use std::path::{Path, PathBuf};

use crate::core::types::RepoId;

/// File name of the protected-branch sidecar inside a bare repository.
pub const POLICY_FILE_NAME: &str = "protected_branches.json";

/// Centralized path routing for hostgit storage.
///
/// # Invariants
///
/// - Repository paths are derived from the lower-cased [`RepoId`] only
/// - Upload paths are derived from the upload UUID only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPaths {
    /// Directory holding `<owner>/<name>.git` bare repositories.
    pub root: PathBuf,

    /// Directory holding local copies, uploads and merge temp clones.
    pub local_path: PathBuf,
}

impl HostPaths {
    pub fn new(root: impl Into<PathBuf>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            local_path: local_path.into(),
        }
    }

    // =========================================================================
    // Bare repository paths
    // =========================================================================

    /// Directory of all repositories belonging to one owner.
    pub fn owner_dir(&self, owner: &str) -> PathBuf {
        self.root.join(owner.to_lowercase())
    }

    /// Path to the bare repository (`<root>/<owner>/<name>.git`).
    pub fn repo_path(&self, repo: &RepoId) -> PathBuf {
        self.owner_dir(repo.owner())
            .join(format!("{}.git", repo.name()))
    }

    /// Directory of persisted pull-request patches.
    pub fn pulls_dir(&self, repo: &RepoId) -> PathBuf {
        self.repo_path(repo).join("pulls")
    }

    /// Path to the patch with the given index.
    pub fn patch_path(&self, repo: &RepoId, index: u64) -> PathBuf {
        self.pulls_dir(repo).join(format!("{index}.patch"))
    }

    /// Path to the generated delegate `pre-receive` script.
    pub fn pre_receive_hook_path(&self, repo: &RepoId) -> PathBuf {
        Self::pre_receive_hook_at(&self.repo_path(repo))
    }

    /// Path to the protected-branch sidecar.
    pub fn policy_path(&self, repo: &RepoId) -> PathBuf {
        Self::policy_at(&self.repo_path(repo))
    }

    // =========================================================================
    // Paths relative to an already-resolved bare repository
    // =========================================================================

    /// `hooks/pre-receive` inside a bare repository directory.
    pub fn pre_receive_hook_at(repo_path: &Path) -> PathBuf {
        repo_path.join("hooks").join("pre-receive")
    }

    /// `custom_hooks/pre-receive` inside a bare repository directory.
    pub fn custom_hook_at(repo_path: &Path) -> PathBuf {
        repo_path.join("custom_hooks").join("pre-receive")
    }

    /// The protected-branch sidecar inside a bare repository directory.
    pub fn policy_at(repo_path: &Path) -> PathBuf {
        repo_path.join(POLICY_FILE_NAME)
    }

    // =========================================================================
    // Local working state
    // =========================================================================

    /// Path to the local working copy (`<local>/localRepo/<owner>/<name>`).
    pub fn local_copy_path(&self, repo: &RepoId) -> PathBuf {
        self.local_path
            .join("localRepo")
            .join(repo.owner())
            .join(repo.name())
    }

    /// Path to the repository lock file (`<local>/locks/<owner>/<name>.lock`).
    ///
    /// Kept outside `localRepo` so that no repository name can collide with
    /// another repository's lock file.
    pub fn lock_path(&self, repo: &RepoId) -> PathBuf {
        self.local_path
            .join("locks")
            .join(repo.owner())
            .join(format!("{}.lock", repo.name()))
    }

    /// Root of pending uploads.
    pub fn uploads_dir(&self) -> PathBuf {
        self.local_path.join("uploads")
    }

    /// Path of a pending upload blob (`<local>/uploads/<u0>/<u1>/<uuid>`).
    ///
    /// Returns `None` when the UUID is too short or contains anything other
    /// than hex digits and dashes.
    pub fn upload_path(&self, uuid: &str) -> Option<PathBuf> {
        let mut chars = uuid.chars();
        let (first, second) = (chars.next()?, chars.next()?);
        if !uuid.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
            return None;
        }
        Some(
            self.uploads_dir()
                .join(first.to_string())
                .join(second.to_string())
                .join(uuid),
        )
    }

    /// Parent directory of merge temp clones.
    pub fn merge_temp_root(&self) -> PathBuf {
        self.local_path.join("data")
    }

    /// Ensure the local working directories exist.
    ///
    /// # Errors
    ///
    /// Returns an IO error if directory creation fails.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.local_path.join("localRepo"))?;
        std::fs::create_dir_all(self.uploads_dir())?;
        std::fs::create_dir_all(self.merge_temp_root())?;
        Ok(())
    }
}
