//! engine::sync
//!
//! Local Copy Synchronizer.
//!
//! # Architecture
//!
//! Each repository has one disposable non-bare clone at
//! `<local>/localRepo/<owner>/<name>`. It is created lazily, kept across
//! operations, and re-pointed at whatever branch the current operation needs.
//! [`LocalCopy`] can only be built from a [`RepoGuard`], so every use happens
//! with the repository lock held.
//!
//! # Invariants
//!
//! - After a successful [`LocalCopy::update`], the local branch tip equals
//!   the bare repository's branch tip exactly (hard reset, never merge)
//! - [`LocalCopy::discard_changes`] is a no-op when there is nothing to
//!   discard
//! - A directory without `.git` is never treated as a clone; it is removed
//!   and cloned afresh, and a failed clone leaves nothing behind
//! - No step is retried; the first failure aborts with its stage

use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};

use super::{HostContext, HostError};
use crate::core::ops::RepoGuard;
use crate::core::types::{BranchName, RepoId};

/// Handle on a repository's local working copy.
#[derive(Debug)]
pub struct LocalCopy<'a> {
    ctx: &'a HostContext,
    repo: &'a RepoId,
    path: PathBuf,
}

impl<'a> LocalCopy<'a> {
    /// Borrow the local copy of `repo`. The guard proves the lock is held.
    pub fn new(ctx: &'a HostContext, repo: &'a RepoId, guard: &'a RepoGuard) -> Self {
        debug_assert_eq!(guard.key(), repo.key());
        Self {
            ctx,
            repo,
            path: ctx.paths().local_copy_path(repo),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a usable clone is present. A directory without `.git` is the
    /// leftover of an interrupted clone and does not count.
    pub fn exists(&self) -> bool {
        self.path.join(".git").exists()
    }

    /// Remove whatever is at the local copy path.
    /// Delete the working copy; a missing one is not an error.
    pub(crate) async fn remove(&self) -> Result<(), HostError> {
        match tokio::fs::remove_dir_all(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HostError::io(&self.path, e)),
        }
    }

    /// Hard-reset the local branch to `origin/<branch>`.
    ///
    /// No-op when the local copy or the local branch does not exist.
    #[instrument(skip(self), fields(repo = %self.repo))]
    pub async fn discard_changes(&self, branch: &BranchName) -> Result<(), HostError> {
        if !self.exists() {
            debug!("no local copy, nothing to discard");
            return Ok(());
        }
        let git = self.ctx.git();
        if !git.has_local_branch(&self.path, branch).await? {
            debug!("branch not in local copy, nothing to discard");
            return Ok(());
        }
        git.reset_hard(&self.path, &branch.origin_rev()).await?;
        Ok(())
    }

    /// Bring `branch` in the local copy to the bare repository's tip.
    ///
    /// Clones on first use. Otherwise fetches with pruning, checks out the
    /// branch and hard-resets it, which also rewinds a branch that was
    /// force-pushed upstream since the last sync.
    #[instrument(skip(self), fields(repo = %self.repo))]
    pub async fn update(&self, branch: &BranchName) -> Result<(), HostError> {
        let git = self.ctx.git();
        if !self.exists() {
            if self.path.exists() {
                warn!(path = %self.path.display(), "removing incomplete local copy");
                self.remove().await?;
            }
            let source = self.ctx.paths().repo_path(self.repo);
            debug!(path = %self.path.display(), "cloning local copy");
            let cloned = git
                .clone_branch(&source, &self.path, branch, self.ctx.config().clone_timeout())
                .await;
            if let Err(e) = cloned {
                if let Err(cleanup) = self.remove().await {
                    warn!(error = %cleanup, "failed to remove partial clone");
                }
                return Err(e.into());
            }
            return Ok(());
        }

        git.fetch(&self.path, None, true).await?;
        git.checkout(&self.path, branch).await?;
        git.reset_hard(&self.path, &branch.origin_rev()).await?;
        Ok(())
    }

    /// [`discard_changes`](Self::discard_changes) then [`update`](Self::update).
    pub async fn prepare(&self, branch: &BranchName) -> Result<(), HostError> {
        self.discard_changes(branch).await?;
        self.update(branch).await
    }
}
