//! git::toolchain
//!
//! The version-control toolchain as a capability.
//!
//! # Architecture
//!
//! Every mutating step (clone, fetch, checkout, reset, commit, merge,
//! rebase, push, apply) runs the installed `git` binary as a subprocess.
//! The steps are exposed through the [`GitOps`] trait so the orchestration
//! layer can be exercised against [`super::mock::MockGit`] without spawning
//! anything.
//!
//! # Error Handling
//!
//! A non-zero exit becomes [`ToolchainError::Failed`], which always carries
//! the [`Stage`] that failed and the captured stderr. Bounded steps that
//! overrun become [`ToolchainError::Timeout`]; the child is killed when its
//! future is dropped.
//!
//! # Example
//!
//! ```ignore
//! use hostgit::git::{GitCli, GitOps};
//!
//! let git = GitCli::new(service_identity);
//! git.clone_branch(&bare, &local, &main, Duration::from_secs(300)).await?;
//! git.reset_hard(&local, "origin/main").await?;
//! ```

use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use super::diff::{Diff, DiffLimits, DiffParser};
use crate::core::types::{BranchName, Oid, Signature};

/// A labelled step of a multi-step toolchain choreography.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Clone,
    Fetch,
    Checkout,
    CheckoutNewBranch,
    DeleteBranch,
    ShowRef,
    Reset,
    Move,
    Add,
    Commit,
    Push,
    RemoteAdd,
    Merge,
    Rebase,
    RevParse,
    Diff,
    DiffBinary,
    ApplyCheck,
    RevList,
    SymbolicRef,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Clone => "clone",
            Stage::Fetch => "fetch",
            Stage::Checkout => "checkout",
            Stage::CheckoutNewBranch => "checkout -b",
            Stage::DeleteBranch => "branch -D",
            Stage::ShowRef => "show-ref",
            Stage::Reset => "reset",
            Stage::Move => "mv",
            Stage::Add => "add",
            Stage::Commit => "commit",
            Stage::Push => "push",
            Stage::RemoteAdd => "remote add",
            Stage::Merge => "merge",
            Stage::Rebase => "rebase",
            Stage::RevParse => "rev-parse",
            Stage::Diff => "diff",
            Stage::DiffBinary => "diff --binary",
            Stage::ApplyCheck => "apply --check",
            Stage::RevList => "rev-list",
            Stage::SymbolicRef => "symbolic-ref",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from toolchain invocations.
#[derive(Debug, Error)]
pub enum ToolchainError {
    /// The subprocess exited non-zero.
    #[error("git {stage} failed: {stderr}")]
    Failed { stage: Stage, stderr: String },

    /// A bounded step ran out of time and was killed.
    #[error("git {stage} timed out after {}s", timeout.as_secs())]
    Timeout { stage: Stage, timeout: Duration },

    /// The subprocess could not be started.
    #[error("failed to run git {stage}: {source}")]
    Spawn {
        stage: Stage,
        source: std::io::Error,
    },

    /// The subprocess produced output this crate cannot interpret.
    #[error("unexpected output from git {stage}: {output}")]
    Output { stage: Stage, output: String },
}

impl ToolchainError {
    pub fn stage(&self) -> Stage {
        match self {
            ToolchainError::Failed { stage, .. }
            | ToolchainError::Timeout { stage, .. }
            | ToolchainError::Spawn { stage, .. }
            | ToolchainError::Output { stage, .. } => *stage,
        }
    }
}

/// How `merge` joins the fetched branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// `--no-ff --no-commit`: stage a merge, leave committing to the caller.
    NoFastForwardNoCommit,
    /// Plain merge; fast-forwards when possible.
    FastForward,
}

/// Version-control toolchain capability.
///
/// Paths named `workdir` are non-bare working copies; `repo` parameters
/// may be bare repositories.
#[async_trait]
pub trait GitOps: Send + Sync + std::fmt::Debug {
    /// `git clone -b <branch> <source> <dest>`.
    async fn clone_branch(
        &self,
        source: &Path,
        dest: &Path,
        branch: &BranchName,
        timeout: Duration,
    ) -> Result<(), ToolchainError>;

    /// `git fetch [--prune] [<remote>]`.
    async fn fetch(&self, workdir: &Path, remote: Option<&str>, prune: bool)
        -> Result<(), ToolchainError>;

    /// `git checkout <branch>`.
    async fn checkout(&self, workdir: &Path, branch: &BranchName) -> Result<(), ToolchainError>;

    /// `git checkout -b <branch> <start>`.
    async fn checkout_new_branch(
        &self,
        workdir: &Path,
        branch: &BranchName,
        start: &str,
        timeout: Duration,
    ) -> Result<(), ToolchainError>;

    /// `git branch -D <branch>`.
    async fn delete_local_branch(&self, workdir: &Path, branch: &BranchName)
        -> Result<(), ToolchainError>;

    /// Whether `refs/heads/<branch>` exists in the working copy.
    async fn has_local_branch(&self, workdir: &Path, branch: &BranchName)
        -> Result<bool, ToolchainError>;

    /// `git reset --hard <rev>`.
    async fn reset_hard(&self, workdir: &Path, rev: &str) -> Result<(), ToolchainError>;

    /// `git mv <from> <to>`.
    async fn move_path(&self, workdir: &Path, from: &str, to: &str) -> Result<(), ToolchainError>;

    /// `git add --all`.
    async fn add_all(&self, workdir: &Path) -> Result<(), ToolchainError>;

    /// `git commit --author=<author> -m <message>`.
    async fn commit(
        &self,
        workdir: &Path,
        author: &Signature,
        message: &str,
    ) -> Result<(), ToolchainError>;

    /// `git push <remote> <refspec>`.
    async fn push(&self, workdir: &Path, remote: &OsStr, refspec: &str)
        -> Result<(), ToolchainError>;

    /// `git remote add <name> <url>`.
    async fn remote_add(&self, workdir: &Path, name: &str, url: &Path)
        -> Result<(), ToolchainError>;

    /// `git merge [--no-ff --no-commit] <rev>`.
    async fn merge(&self, workdir: &Path, rev: &str, mode: MergeMode)
        -> Result<(), ToolchainError>;

    /// `git rebase --quiet <upstream> <branch>`.
    async fn rebase(&self, workdir: &Path, upstream: &str, branch: &str)
        -> Result<(), ToolchainError>;

    /// `git rev-parse --verify <rev>^{commit}`.
    async fn rev_parse(&self, repo: &Path, rev: &str) -> Result<Oid, ToolchainError>;

    /// `git symbolic-ref HEAD refs/heads/<branch>`.
    async fn set_head(&self, repo: &Path, branch: &BranchName) -> Result<(), ToolchainError>;

    /// `git diff --binary <base> <head>`.
    async fn diff_binary(&self, repo: &Path, base: &Oid, head: &Oid)
        -> Result<Vec<u8>, ToolchainError>;

    /// `git diff -M <base> <head>`, parsed under `limits` within `timeout`.
    async fn diff(
        &self,
        repo: &Path,
        base: &Oid,
        head: &Oid,
        limits: DiffLimits,
        timeout: Duration,
    ) -> Result<Diff, ToolchainError>;

    /// `git apply --check <patch>`; `false` when the patch does not apply.
    async fn apply_check(&self, workdir: &Path, patch: &Path) -> Result<bool, ToolchainError>;

    /// Whether any commit is reachable from `include` but not from `exclude`
    /// (`git rev-list --max-count=1 <include> ^<exclude>`).
    async fn has_commits_not_in(
        &self,
        repo: &Path,
        include: &Oid,
        exclude: &Oid,
    ) -> Result<bool, ToolchainError>;
}

/// Subprocess implementation of [`GitOps`].
///
/// Every invocation runs with terminal prompts disabled and with the
/// committer set to the configured service identity.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: OsString,
    committer: Signature,
}

struct Captured {
    success: bool,
    stdout: Vec<u8>,
    stderr: String,
}

impl GitCli {
    pub fn new(committer: Signature) -> Self {
        Self {
            program: OsString::from("git"),
            committer,
        }
    }

    /// Use a specific `git` executable.
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, dir: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.current_dir(dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_COMMITTER_NAME", &self.committer.name)
            .env("GIT_COMMITTER_EMAIL", &self.committer.email)
            .env("GIT_AUTHOR_NAME", &self.committer.name)
            .env("GIT_AUTHOR_EMAIL", &self.committer.email)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn capture<I, S>(
        &self,
        stage: Stage,
        dir: &Path,
        args: I,
        timeout: Option<Duration>,
    ) -> Result<Captured, ToolchainError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = self.command(dir);
        cmd.args(args);

        debug!(%stage, dir = %dir.display(), "spawning git");
        let output = cmd.output();
        let output = match timeout {
            Some(limit) => tokio::time::timeout(limit, output)
                .await
                .map_err(|_| ToolchainError::Timeout {
                    stage,
                    timeout: limit,
                })?,
            None => output.await,
        }
        .map_err(|source| ToolchainError::Spawn { stage, source })?;

        Ok(Captured {
            success: output.status.success(),
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    async fn run<I, S>(
        &self,
        stage: Stage,
        dir: &Path,
        args: I,
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>, ToolchainError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let captured = self.capture(stage, dir, args, timeout).await?;
        if !captured.success {
            warn!(%stage, stderr = %captured.stderr, "git step failed");
            return Err(ToolchainError::Failed {
                stage,
                stderr: captured.stderr,
            });
        }
        debug!(%stage, "git step succeeded");
        Ok(captured.stdout)
    }
}

#[async_trait]
impl GitOps for GitCli {
    #[instrument(skip(self), fields(source = %source.display(), dest = %dest.display()))]
    async fn clone_branch(
        &self,
        source: &Path,
        dest: &Path,
        branch: &BranchName,
        timeout: Duration,
    ) -> Result<(), ToolchainError> {
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| ToolchainError::Spawn {
                stage: Stage::Clone,
                source,
            })?;

        let args: [&OsStr; 5] = [
            OsStr::new("clone"),
            OsStr::new("-b"),
            OsStr::new(branch.as_str()),
            source.as_os_str(),
            dest.as_os_str(),
        ];
        self.run(Stage::Clone, parent, args, Some(timeout)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(workdir = %workdir.display()))]
    async fn fetch(
        &self,
        workdir: &Path,
        remote: Option<&str>,
        prune: bool,
    ) -> Result<(), ToolchainError> {
        let mut args = vec!["fetch"];
        if prune {
            args.push("--prune");
        }
        args.extend(remote);
        self.run(Stage::Fetch, workdir, args, None).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(workdir = %workdir.display()))]
    async fn checkout(&self, workdir: &Path, branch: &BranchName) -> Result<(), ToolchainError> {
        self.run(Stage::Checkout, workdir, ["checkout", branch.as_str()], None)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(workdir = %workdir.display()))]
    async fn checkout_new_branch(
        &self,
        workdir: &Path,
        branch: &BranchName,
        start: &str,
        timeout: Duration,
    ) -> Result<(), ToolchainError> {
        self.run(
            Stage::CheckoutNewBranch,
            workdir,
            ["checkout", "-b", branch.as_str(), start],
            Some(timeout),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(workdir = %workdir.display()))]
    async fn delete_local_branch(
        &self,
        workdir: &Path,
        branch: &BranchName,
    ) -> Result<(), ToolchainError> {
        self.run(Stage::DeleteBranch, workdir, ["branch", "-D", branch.as_str()], None)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(workdir = %workdir.display()))]
    async fn has_local_branch(
        &self,
        workdir: &Path,
        branch: &BranchName,
    ) -> Result<bool, ToolchainError> {
        let refname = format!("refs/heads/{}", branch);
        let captured = self
            .capture(
                Stage::ShowRef,
                workdir,
                ["show-ref", "--verify", "--quiet", refname.as_str()],
                None,
            )
            .await?;
        Ok(captured.success)
    }

    #[instrument(skip(self), fields(workdir = %workdir.display()))]
    async fn reset_hard(&self, workdir: &Path, rev: &str) -> Result<(), ToolchainError> {
        self.run(Stage::Reset, workdir, ["reset", "--hard", rev], None)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(workdir = %workdir.display()))]
    async fn move_path(&self, workdir: &Path, from: &str, to: &str) -> Result<(), ToolchainError> {
        self.run(Stage::Move, workdir, ["mv", "-f", "--", from, to], None)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(workdir = %workdir.display()))]
    async fn add_all(&self, workdir: &Path) -> Result<(), ToolchainError> {
        self.run(Stage::Add, workdir, ["add", "--all"], None).await?;
        Ok(())
    }

    #[instrument(skip(self, message), fields(workdir = %workdir.display(), %author))]
    async fn commit(
        &self,
        workdir: &Path,
        author: &Signature,
        message: &str,
    ) -> Result<(), ToolchainError> {
        let author = format!("--author={}", author.author_arg());
        self.run(
            Stage::Commit,
            workdir,
            ["commit", author.as_str(), "-m", message],
            None,
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(workdir = %workdir.display()))]
    async fn push(
        &self,
        workdir: &Path,
        remote: &OsStr,
        refspec: &str,
    ) -> Result<(), ToolchainError> {
        let args: [&OsStr; 3] = [OsStr::new("push"), remote, OsStr::new(refspec)];
        self.run(Stage::Push, workdir, args, None).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(workdir = %workdir.display(), url = %url.display()))]
    async fn remote_add(&self, workdir: &Path, name: &str, url: &Path)
        -> Result<(), ToolchainError> {
        let args: [&OsStr; 4] = [
            OsStr::new("remote"),
            OsStr::new("add"),
            OsStr::new(name),
            url.as_os_str(),
        ];
        self.run(Stage::RemoteAdd, workdir, args, None).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(workdir = %workdir.display()))]
    async fn merge(&self, workdir: &Path, rev: &str, mode: MergeMode)
        -> Result<(), ToolchainError> {
        let args = match mode {
            MergeMode::NoFastForwardNoCommit => vec!["merge", "--no-ff", "--no-commit", rev],
            MergeMode::FastForward => vec!["merge", rev],
        };
        self.run(Stage::Merge, workdir, args, None).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(workdir = %workdir.display()))]
    async fn rebase(&self, workdir: &Path, upstream: &str, branch: &str)
        -> Result<(), ToolchainError> {
        self.run(
            Stage::Rebase,
            workdir,
            ["rebase", "--quiet", upstream, branch],
            None,
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(repo = %repo.display()))]
    async fn rev_parse(&self, repo: &Path, rev: &str) -> Result<Oid, ToolchainError> {
        let spec = format!("{}^{{commit}}", rev);
        let stdout = self
            .run(Stage::RevParse, repo, ["rev-parse", "--verify", spec.as_str()], None)
            .await?;
        let text = String::from_utf8_lossy(&stdout).trim().to_string();
        Oid::new(text.clone()).map_err(|_| ToolchainError::Output {
            stage: Stage::RevParse,
            output: text,
        })
    }

    #[instrument(skip(self), fields(repo = %repo.display(), %branch))]
    async fn set_head(&self, repo: &Path, branch: &BranchName) -> Result<(), ToolchainError> {
        let target = format!("refs/heads/{}", branch);
        self.run(
            Stage::SymbolicRef,
            repo,
            ["symbolic-ref", "HEAD", target.as_str()],
            None,
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(repo = %repo.display(), %base, %head))]
    async fn diff_binary(
        &self,
        repo: &Path,
        base: &Oid,
        head: &Oid,
    ) -> Result<Vec<u8>, ToolchainError> {
        self.run(
            Stage::DiffBinary,
            repo,
            ["diff", "--binary", "--full-index", base.as_str(), head.as_str()],
            None,
        )
        .await
    }

    #[instrument(skip(self), fields(repo = %repo.display(), %base, %head))]
    async fn diff(
        &self,
        repo: &Path,
        base: &Oid,
        head: &Oid,
        limits: DiffLimits,
        timeout: Duration,
    ) -> Result<Diff, ToolchainError> {
        let stage = Stage::Diff;
        let mut cmd = self.command(repo);
        cmd.args(["diff", "-M", "--no-color", base.as_str(), head.as_str()]);

        let mut child = cmd
            .spawn()
            .map_err(|source| ToolchainError::Spawn { stage, source })?;
        let stdout = child.stdout.take().ok_or_else(|| ToolchainError::Output {
            stage,
            output: "stdout not captured".to_string(),
        })?;

        let mut parser = DiffParser::new(limits);
        // Content lines may be in any encoding; only the structure is UTF-8.
        let mut segments = BufReader::new(stdout).split(b'\n');
        let read = async {
            while let Some(mut raw) = segments.next_segment().await? {
                if raw.last() == Some(&b'\r') {
                    raw.pop();
                }
                if !parser.feed(&String::from_utf8_lossy(&raw)) {
                    break;
                }
            }
            Ok::<_, std::io::Error>(())
        };

        let outcome = tokio::time::timeout(timeout, read).await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(source)) => return Err(ToolchainError::Spawn { stage, source }),
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "diff cut off by timeout");
                parser.truncate();
            }
        }

        let diff = parser.finish();
        if diff.is_incomplete {
            // Output past the bound is not needed.
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Ok(diff);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| ToolchainError::Spawn { stage, source })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(%stage, stderr = %stderr, "git step failed");
            return Err(ToolchainError::Failed { stage, stderr });
        }
        Ok(diff)
    }

    #[instrument(skip(self), fields(workdir = %workdir.display(), patch = %patch.display()))]
    async fn apply_check(&self, workdir: &Path, patch: &Path) -> Result<bool, ToolchainError> {
        let args: [&OsStr; 3] = [OsStr::new("apply"), OsStr::new("--check"), patch.as_os_str()];
        let captured = self.capture(Stage::ApplyCheck, workdir, args, None).await?;
        if !captured.success {
            debug!(stderr = %captured.stderr, "patch does not apply");
        }
        Ok(captured.success)
    }

    #[instrument(skip(self), fields(repo = %repo.display(), %include, %exclude))]
    async fn has_commits_not_in(
        &self,
        repo: &Path,
        include: &Oid,
        exclude: &Oid,
    ) -> Result<bool, ToolchainError> {
        let exclude = format!("^{}", exclude);
        let stdout = self
            .run(
                Stage::RevList,
                repo,
                ["rev-list", "--max-count=1", include.as_str(), exclude.as_str()],
                None,
            )
            .await?;
        Ok(!String::from_utf8_lossy(&stdout).trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names() {
        assert_eq!(Stage::Clone.to_string(), "clone");
        assert_eq!(Stage::ApplyCheck.to_string(), "apply --check");
        assert_eq!(Stage::RemoteAdd.to_string(), "remote add");
        assert_eq!(Stage::SymbolicRef.to_string(), "symbolic-ref");
    }

    #[test]
    fn error_carries_stage_and_stderr() {
        let err = ToolchainError::Failed {
            stage: Stage::Push,
            stderr: "rejected".into(),
        };
        assert_eq!(err.stage(), Stage::Push);
        assert_eq!(err.to_string(), "git push failed: rejected");
    }

    #[test]
    fn timeout_display() {
        let err = ToolchainError::Timeout {
            stage: Stage::Clone,
            timeout: Duration::from_secs(300),
        };
        assert!(err.to_string().contains("300s"));
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let git = GitCli::new(Signature::new("svc", "svc@example.com"))
            .with_program("/nonexistent/hostgit-git");
        let temp = tempfile::TempDir::new().unwrap();
        let result = git.add_all(temp.path()).await;
        assert!(matches!(
            result,
            Err(ToolchainError::Spawn {
                stage: Stage::Add,
                ..
            })
        ));
    }
}
