//! engine
//!
//! The Git mutation and merge orchestration layer.
//!
//! # Architecture
//!
//! Every operation receives a [`HostContext`] which owns the configuration,
//! the storage layout, the per-repository [`LockRegistry`] and the
//! [`GitOps`] toolchain capability. Nothing in this layer is a process-wide
//! global; tests build independent contexts with their own registries and
//! fakes.
//!
//! Components, leaves first:
//!
//! - [`sync`]: disposable local working copy per repository
//! - [`editor`]: edit, delete and upload files, then commit and push
//! - [`branch`]: branch creation through the local copy
//! - [`merge`]: regular and rebase merges in a throwaway clone
//! - [`compare`]: pull-request merge-base, commit list and bounded diff
//! - [`mergeable`]: persisted patch plus dry-run apply
//! - [`repo`]: bare repository creation, deletion and default branch
//!
//! # Invariants
//!
//! - Every mutating operation holds the repository lock from its first
//!   local-copy step to its push, and releases it on every exit path
//! - Branch content in the bare repository is only ever changed by a push
//! - Failures surface as a single [`HostError`]; nothing is retried
//!
//! # Example
//!
//! ```ignore
//! use hostgit::engine::{editor, HostContext};
//!
//! let ctx = HostContext::new(config);
//! let oid = editor::edit_file(&ctx, &repo, request).await?;
//! ```

pub mod branch;
pub mod compare;
pub mod editor;
mod errors;
pub mod merge;
pub mod mergeable;
pub mod repo;
pub mod sync;
pub mod upload;

pub use errors::HostError;

use std::sync::Arc;

use crate::core::config::Config;
use crate::core::ops::LockRegistry;
use crate::core::paths::HostPaths;
use crate::core::types::RepoId;
use crate::git::{Git, GitCli, GitOps};

/// Shared state for orchestration operations.
///
/// Cloning is cheap; clones share the lock registry and toolchain.
#[derive(Debug, Clone)]
pub struct HostContext {
    config: Arc<Config>,
    paths: HostPaths,
    locks: LockRegistry,
    git: Arc<dyn GitOps>,
}

impl HostContext {
    /// Build a context that drives the installed `git` binary.
    pub fn new(config: Config) -> Self {
        let git = GitCli::new(config.service_identity());
        let paths = config.paths();
        Self {
            config: Arc::new(config),
            locks: LockRegistry::with_lock_files(paths.clone()),
            paths,
            git: Arc::new(git),
        }
    }

    /// Replace the toolchain capability.
    pub fn with_git(mut self, git: Arc<dyn GitOps>) -> Self {
        self.git = git;
        self
    }

    /// Share an existing lock registry.
    pub fn with_locks(mut self, locks: LockRegistry) -> Self {
        self.locks = locks;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn paths(&self) -> &HostPaths {
        &self.paths
    }

    pub fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    pub fn git(&self) -> &dyn GitOps {
        self.git.as_ref()
    }

    /// Open a repository's bare store for reading.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no repository exists at the derived path.
    pub fn open_repo(&self, repo: &RepoId) -> Result<Git, HostError> {
        let path = self.paths.repo_path(repo);
        if !path.is_dir() {
            return Err(HostError::not_found("repository", repo.key()));
        }
        Ok(Git::open(&path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{HostConfig, RepositoryConfig};
    use crate::git::mock::MockGit;
    use tempfile::TempDir;

    fn context(temp: &TempDir) -> HostContext {
        let file = HostConfig {
            repository: Some(RepositoryConfig {
                root: Some(temp.path().join("repos")),
                local_path: Some(temp.path().join("data")),
                default_branch: None,
            }),
            ..Default::default()
        };
        HostContext::new(Config::from_file(file).unwrap())
    }

    #[test]
    fn paths_follow_config() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);
        assert_eq!(ctx.paths().root, temp.path().join("repos"));
        assert_eq!(ctx.paths().local_path, temp.path().join("data"));
    }

    #[test]
    fn open_missing_repo_is_not_found() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);
        let repo = RepoId::new("alice", "missing").unwrap();
        let err = ctx.open_repo(&repo).unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn clones_share_locks() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp).with_git(Arc::new(MockGit::new()));
        let other = ctx.clone();
        let repo = RepoId::new("alice", "notes").unwrap();

        let _guard = ctx.locks().acquire(&repo).await.unwrap();
        assert!(other.locks().is_locked(&repo));
    }
}
