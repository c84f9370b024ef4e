//! git::mock
//!
//! Recording fake of the toolchain for deterministic orchestration tests.
//!
//! # Design
//!
//! `MockGit` implements [`GitOps`] without spawning anything. Every call is
//! recorded with its stage, directory and arguments, so tests can assert on
//! the exact choreography an engine operation performs. A single stage can
//! be configured to fail, which exercises the error path and cleanup logic
//! of the caller.
//!
//! `clone_branch` creates the destination directory so callers that check
//! for an existing working copy behave as they would against real git.
//!
//! # Example
//!
//! ```
//! use hostgit::git::mock::MockGit;
//! use hostgit::git::{GitOps, Stage};
//! use std::path::Path;
//!
//! # tokio_test::block_on(async {
//! let git = MockGit::new().fail_on(Stage::Push, "remote rejected");
//!
//! git.add_all(Path::new("/work")).await.unwrap();
//! let err = git
//!     .push(Path::new("/work"), "origin".as_ref(), "main")
//!     .await
//!     .unwrap_err();
//!
//! assert_eq!(err.stage(), Stage::Push);
//! assert_eq!(git.stages(), vec![Stage::Add, Stage::Push]);
//! # });
//! ```

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::diff::{Diff, DiffLimits};
use super::toolchain::{GitOps, MergeMode, Stage, ToolchainError};
use crate::core::types::{BranchName, Oid, Signature};

/// One recorded toolchain call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub stage: Stage,
    pub dir: PathBuf,
    pub args: Vec<String>,
}

/// Recording fake of [`GitOps`].
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockGit {
    inner: Arc<Mutex<MockGitInner>>,
}

#[derive(Debug)]
struct MockGitInner {
    /// Stage to fail, with the stderr to report.
    fail_on: Option<(Stage, String)>,
    /// Recorded calls for verification.
    calls: Vec<MockCall>,
    /// Branches reported by `has_local_branch`.
    local_branches: HashSet<String>,
    /// Result of `apply_check`.
    applies: bool,
    /// Result of `has_commits_not_in`.
    unreachable_commits: bool,
    /// Result of `rev_parse`.
    rev: Oid,
    /// Result of `diff_binary`.
    patch: Vec<u8>,
    /// Result of `diff`.
    diff: Diff,
}

impl Default for MockGitInner {
    fn default() -> Self {
        Self {
            fail_on: None,
            calls: Vec::new(),
            local_branches: HashSet::new(),
            applies: true,
            unreachable_commits: false,
            rev: Oid::zero(),
            patch: Vec::new(),
            diff: Diff::default(),
        }
    }
}

impl MockGit {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockGitInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configure the mock to fail the given stage with `stderr`.
    pub fn fail_on(self, stage: Stage, stderr: impl Into<String>) -> Self {
        self.state().fail_on = Some((stage, stderr.into()));
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        self.state().fail_on = None;
    }

    /// Report `branch` as present in every working copy.
    pub fn with_local_branch(self, branch: &str) -> Self {
        self.state().local_branches.insert(branch.to_string());
        self
    }

    /// Set the outcome of `apply_check`.
    pub fn with_apply_result(self, applies: bool) -> Self {
        self.state().applies = applies;
        self
    }

    /// Set the outcome of `has_commits_not_in`.
    pub fn with_unreachable_commits(self, unreachable: bool) -> Self {
        self.state().unreachable_commits = unreachable;
        self
    }

    /// Set the commit `rev_parse` reports.
    pub fn with_rev(self, rev: Oid) -> Self {
        self.state().rev = rev;
        self
    }

    /// Set the bytes `diff_binary` returns.
    pub fn with_patch(self, patch: impl Into<Vec<u8>>) -> Self {
        self.state().patch = patch.into();
        self
    }

    /// Set the parsed diff `diff` returns.
    pub fn with_diff(self, diff: Diff) -> Self {
        self.state().diff = diff;
        self
    }

    /// Get all recorded calls.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state().calls.clone()
    }

    /// Get the stages of all recorded calls, in order.
    pub fn stages(&self) -> Vec<Stage> {
        self.state().calls.iter().map(|c| c.stage).collect()
    }

    /// Clear recorded calls.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Record a call and fail it if configured to.
    fn record<I, S>(&self, stage: Stage, dir: &Path, args: I) -> Result<(), ToolchainError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut state = self.state();
        state.calls.push(MockCall {
            stage,
            dir: dir.to_path_buf(),
            args: args
                .into_iter()
                .map(|a| a.as_ref().to_string_lossy().into_owned())
                .collect(),
        });
        match &state.fail_on {
            Some((failing, stderr)) if *failing == stage => Err(ToolchainError::Failed {
                stage,
                stderr: stderr.clone(),
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl GitOps for MockGit {
    async fn clone_branch(
        &self,
        source: &Path,
        dest: &Path,
        branch: &BranchName,
        _timeout: Duration,
    ) -> Result<(), ToolchainError> {
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        self.record(
            Stage::Clone,
            parent,
            [
                OsStr::new(branch.as_str()),
                source.as_os_str(),
                dest.as_os_str(),
            ],
        )?;
        std::fs::create_dir_all(dest.join(".git")).map_err(|source| ToolchainError::Spawn {
            stage: Stage::Clone,
            source,
        })?;
        self.state().local_branches.insert(branch.to_string());
        Ok(())
    }

    async fn fetch(
        &self,
        workdir: &Path,
        remote: Option<&str>,
        prune: bool,
    ) -> Result<(), ToolchainError> {
        let mut args: Vec<&str> = Vec::new();
        if prune {
            args.push("--prune");
        }
        args.extend(remote);
        self.record(Stage::Fetch, workdir, args)
    }

    async fn checkout(&self, workdir: &Path, branch: &BranchName) -> Result<(), ToolchainError> {
        self.record(Stage::Checkout, workdir, [branch.as_str()])?;
        self.state().local_branches.insert(branch.to_string());
        Ok(())
    }

    async fn checkout_new_branch(
        &self,
        workdir: &Path,
        branch: &BranchName,
        start: &str,
        _timeout: Duration,
    ) -> Result<(), ToolchainError> {
        self.record(Stage::CheckoutNewBranch, workdir, [branch.as_str(), start])?;
        self.state().local_branches.insert(branch.to_string());
        Ok(())
    }

    async fn delete_local_branch(
        &self,
        workdir: &Path,
        branch: &BranchName,
    ) -> Result<(), ToolchainError> {
        self.record(Stage::DeleteBranch, workdir, [branch.as_str()])?;
        self.state().local_branches.remove(branch.as_str());
        Ok(())
    }

    async fn has_local_branch(
        &self,
        workdir: &Path,
        branch: &BranchName,
    ) -> Result<bool, ToolchainError> {
        self.record(Stage::ShowRef, workdir, [branch.as_str()])?;
        Ok(self.state().local_branches.contains(branch.as_str()))
    }

    async fn reset_hard(&self, workdir: &Path, rev: &str) -> Result<(), ToolchainError> {
        self.record(Stage::Reset, workdir, [rev])
    }

    async fn move_path(&self, workdir: &Path, from: &str, to: &str) -> Result<(), ToolchainError> {
        self.record(Stage::Move, workdir, [from, to])
    }

    async fn add_all(&self, workdir: &Path) -> Result<(), ToolchainError> {
        self.record(Stage::Add, workdir, ["--all"])
    }

    async fn commit(
        &self,
        workdir: &Path,
        author: &Signature,
        message: &str,
    ) -> Result<(), ToolchainError> {
        self.record(
            Stage::Commit,
            workdir,
            [author.author_arg().as_str(), message],
        )
    }

    async fn push(
        &self,
        workdir: &Path,
        remote: &OsStr,
        refspec: &str,
    ) -> Result<(), ToolchainError> {
        self.record(Stage::Push, workdir, [remote, OsStr::new(refspec)])
    }

    async fn remote_add(
        &self,
        workdir: &Path,
        name: &str,
        url: &Path,
    ) -> Result<(), ToolchainError> {
        self.record(Stage::RemoteAdd, workdir, [OsStr::new(name), url.as_os_str()])
    }

    async fn merge(
        &self,
        workdir: &Path,
        rev: &str,
        mode: MergeMode,
    ) -> Result<(), ToolchainError> {
        let args = match mode {
            MergeMode::NoFastForwardNoCommit => vec!["--no-ff", "--no-commit", rev],
            MergeMode::FastForward => vec![rev],
        };
        self.record(Stage::Merge, workdir, args)
    }

    async fn rebase(
        &self,
        workdir: &Path,
        upstream: &str,
        branch: &str,
    ) -> Result<(), ToolchainError> {
        self.record(Stage::Rebase, workdir, [upstream, branch])
    }

    async fn rev_parse(&self, repo: &Path, rev: &str) -> Result<Oid, ToolchainError> {
        self.record(Stage::RevParse, repo, [rev])?;
        Ok(self.state().rev.clone())
    }

    async fn set_head(&self, repo: &Path, branch: &BranchName) -> Result<(), ToolchainError> {
        self.record(Stage::SymbolicRef, repo, [branch.as_str()])
    }

    async fn diff_binary(
        &self,
        repo: &Path,
        base: &Oid,
        head: &Oid,
    ) -> Result<Vec<u8>, ToolchainError> {
        self.record(Stage::DiffBinary, repo, [base.as_str(), head.as_str()])?;
        Ok(self.state().patch.clone())
    }

    async fn diff(
        &self,
        repo: &Path,
        base: &Oid,
        head: &Oid,
        _limits: DiffLimits,
        _timeout: Duration,
    ) -> Result<Diff, ToolchainError> {
        self.record(Stage::Diff, repo, [base.as_str(), head.as_str()])?;
        Ok(self.state().diff.clone())
    }

    async fn apply_check(&self, workdir: &Path, patch: &Path) -> Result<bool, ToolchainError> {
        self.record(Stage::ApplyCheck, workdir, [patch.as_os_str()])?;
        Ok(self.state().applies)
    }

    async fn has_commits_not_in(
        &self,
        repo: &Path,
        include: &Oid,
        exclude: &Oid,
    ) -> Result<bool, ToolchainError> {
        self.record(Stage::RevList, repo, [include.as_str(), exclude.as_str()])?;
        Ok(self.state().unreachable_commits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_calls_in_order() {
        let git = MockGit::new();
        let dir = Path::new("/work");
        git.fetch(dir, None, true).await.unwrap();
        git.reset_hard(dir, "origin/main").await.unwrap();

        let calls = git.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].stage, Stage::Fetch);
        assert_eq!(calls[0].args, vec!["--prune"]);
        assert_eq!(calls[1].args, vec!["origin/main"]);
    }

    #[tokio::test]
    async fn fail_on_only_affects_configured_stage() {
        let git = MockGit::new().fail_on(Stage::Commit, "nothing to commit");
        let dir = Path::new("/work");
        let sig = Signature::new("a", "a@example.com");

        assert!(git.add_all(dir).await.is_ok());
        let err = git.commit(dir, &sig, "msg").await.unwrap_err();
        assert!(matches!(
            err,
            ToolchainError::Failed { stage: Stage::Commit, ref stderr } if stderr == "nothing to commit"
        ));

        git.clear_fail_on();
        assert!(git.commit(dir, &sig, "msg").await.is_ok());
    }

    #[tokio::test]
    async fn clone_creates_destination_and_branch() {
        let temp = tempfile::TempDir::new().unwrap();
        let dest = temp.path().join("local/copy");
        let git = MockGit::new();
        let main = BranchName::new("main").unwrap();

        git.clone_branch(Path::new("/bare"), &dest, &main, Duration::from_secs(1))
            .await
            .unwrap();

        assert!(dest.is_dir());
        assert!(git.has_local_branch(&dest, &main).await.unwrap());
    }

    #[tokio::test]
    async fn configured_results_are_returned() {
        let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
        let git = MockGit::new()
            .with_apply_result(false)
            .with_unreachable_commits(true)
            .with_rev(oid.clone())
            .with_patch(b"patch".to_vec());
        let dir = Path::new("/work");

        assert!(!git.apply_check(dir, Path::new("1.patch")).await.unwrap());
        assert!(git.has_commits_not_in(dir, &oid, &oid).await.unwrap());
        assert_eq!(git.rev_parse(dir, "HEAD").await.unwrap(), oid);
        assert_eq!(git.diff_binary(dir, &oid, &oid).await.unwrap(), b"patch");
    }
}
