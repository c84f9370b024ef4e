//! engine::merge
//!
//! Merge Engine: regular and rebase merges in a throwaway clone.
//!
//! # Architecture
//!
//! All work happens in a uniquely named temporary clone of the base
//! repository under `<local>/data`. The temp directory is a
//! [`tempfile::TempDir`], so it is removed on every exit path: success,
//! error, or unwinding. The real base repository is touched exactly once,
//! by the final push; any failure before that leaves it unchanged.
//!
//! ```text
//! clone base@base_branch -> remote add head_repo -> fetch head_repo
//!   regular: merge --no-ff --no-commit head_repo/<head> -> commit
//!   rebase:  rebase <base> head_repo/<head> -> checkout -b tmp-<id> HEAD
//!            -> checkout <base> -> merge tmp-<id>
//! -> push <base path> <base_branch>
//! ```
//!
//! Only the base repository's lock is held. The head repository is only
//! read.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::editor::CommitMessage;
use super::{HostContext, HostError};
use crate::core::types::{BranchName, Oid, RepoId, Signature};
use crate::git::{MergeMode, ToolchainError};

/// Remote name of the head repository inside the temp clone.
const HEAD_REMOTE: &str = "head_repo";

/// How a pull request is merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStyle {
    /// A merge commit joining head into base.
    #[default]
    Regular,
    /// Head's commits replayed on top of base, then fast-forwarded.
    Rebase,
}

impl MergeStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStyle::Regular => "regular",
            MergeStyle::Rebase => "rebase",
        }
    }
}

impl fmt::Display for MergeStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeStyle {
    type Err = HostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regular" | "merge" => Ok(MergeStyle::Regular),
            "rebase" => Ok(MergeStyle::Rebase),
            other => Err(HostError::InvalidInput(format!(
                "unknown merge style '{}'",
                other
            ))),
        }
    }
}

/// A pull-request merge.
#[derive(Debug, Clone)]
pub struct MergeRequest {
    pub base_repo: RepoId,
    pub base_branch: BranchName,
    pub head_repo: RepoId,
    pub head_branch: BranchName,
    pub style: MergeStyle,
    /// Author of the merge commit.
    pub doer: Signature,
    /// Extended message of a regular merge commit.
    pub description: String,
}

impl MergeRequest {
    /// Summary line of a regular merge commit.
    pub fn summary(&self) -> String {
        format!(
            "Merge branch '{}' of {} into {}",
            self.head_branch, self.head_repo, self.base_branch
        )
    }
}

/// Merge head into base and push. Returns the new tip of the base branch.
///
/// # Errors
///
/// - `NotFound` when either repository or branch does not exist
/// - `Conflict` when the head does not merge (or rebase) cleanly onto base
/// - `Toolchain` naming the failing stage for any other step
#[instrument(skip(ctx, request), fields(base = %request.base_repo, style = %request.style))]
pub async fn merge(ctx: &HostContext, request: &MergeRequest) -> Result<Oid, HostError> {
    let base = ctx.open_repo(&request.base_repo)?;
    if !base.has_branch(&request.base_branch) {
        return Err(HostError::not_found("branch", request.base_branch.as_str()));
    }
    let head = ctx.open_repo(&request.head_repo)?;
    if !head.has_branch(&request.head_branch) {
        return Err(HostError::not_found("branch", request.head_branch.as_str()));
    }
    drop((base, head));

    let _guard = ctx.locks().acquire(&request.base_repo).await?;
    let tip = merge_in_temp_clone(ctx, request).await?;
    info!(%tip, branch = %request.base_branch, "pull request merged");
    Ok(tip)
}

/// Allocate the temp clone, run the merge in it, and remove it.
pub(crate) async fn merge_in_temp_clone(
    ctx: &HostContext,
    request: &MergeRequest,
) -> Result<Oid, HostError> {
    let root = ctx.paths().merge_temp_root();
    tokio::fs::create_dir_all(&root)
        .await
        .map_err(|e| HostError::io(&root, e))?;
    let temp = tempfile::Builder::new()
        .prefix("merge-")
        .tempdir_in(&root)
        .map_err(|e| HostError::io(&root, e))?;

    let result = run_merge(ctx, request, temp.path()).await;

    let temp_path = temp.path().to_path_buf();
    if let Err(e) = temp.close() {
        warn!(path = %temp_path.display(), error = %e, "failed to remove merge clone");
    }
    result
}

async fn run_merge(
    ctx: &HostContext,
    request: &MergeRequest,
    workdir: &Path,
) -> Result<Oid, HostError> {
    let git = ctx.git();
    let base_path = ctx.paths().repo_path(&request.base_repo);
    let head_path = ctx.paths().repo_path(&request.head_repo);
    let head_rev = format!("{}/{}", HEAD_REMOTE, request.head_branch);

    git.clone_branch(
        &base_path,
        workdir,
        &request.base_branch,
        ctx.config().merge_timeout(),
    )
    .await?;
    git.remote_add(workdir, HEAD_REMOTE, &head_path).await?;
    git.fetch(workdir, Some(HEAD_REMOTE), false).await?;

    match request.style {
        MergeStyle::Regular => {
            git.merge(workdir, &head_rev, MergeMode::NoFastForwardNoCommit)
                .await
                .map_err(|e| conflict(request, e))?;
            let message =
                CommitMessage::new(request.summary(), request.description.as_str())
                    .compose("");
            git.commit(workdir, &request.doer, &message).await?;
        }
        MergeStyle::Rebase => {
            git.rebase(workdir, request.base_branch.as_str(), &head_rev)
                .await
                .map_err(|e| conflict(request, e))?;
            // Rebase leaves HEAD detached; name it before switching away.
            let rebased = BranchName::new(format!("tmp-{}", Uuid::new_v4().simple()))?;
            git.checkout_new_branch(workdir, &rebased, "HEAD", ctx.config().merge_timeout())
                .await?;
            git.checkout(workdir, &request.base_branch).await?;
            git.merge(workdir, rebased.as_str(), MergeMode::FastForward)
                .await?;
        }
    }

    let tip = git.rev_parse(workdir, "HEAD").await?;
    git.push(workdir, base_path.as_os_str(), request.base_branch.as_str())
        .await?;
    Ok(tip)
}

/// A failed merge or rebase step means the branches do not join cleanly.
fn conflict(request: &MergeRequest, err: ToolchainError) -> HostError {
    match err {
        ToolchainError::Failed { stage, stderr } => {
            warn!(%stage, %stderr, "head does not apply cleanly");
            HostError::Conflict(format!(
                "branch '{}' of {} cannot be {} into {}",
                request.head_branch,
                request.head_repo,
                match request.style {
                    MergeStyle::Regular => "merged",
                    MergeStyle::Rebase => "rebased",
                },
                request.base_branch
            ))
        }
        other => other.into(),
    }
}
