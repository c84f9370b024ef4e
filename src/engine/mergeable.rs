//! engine::mergeable
//!
//! Mergeability Tester.
//!
//! # Architecture
//!
//! A pull request's binary patch (merge-base to head) is persisted as
//! `<repo>.git/pulls/<index>.patch`, then dry-run applied to a freshly
//! synced local copy of the base branch. Nothing is committed; the base
//! branch and the local copy's content are unchanged afterwards.
//!
//! # Invariants
//!
//! - Index assignment (count of patch files + 1) and the write happen under
//!   the repository lock, so concurrent callers get distinct indices
//! - Each [`Patch`] carries the SHA-256 of its bytes; a missing or altered
//!   file tests as [`MergeStatus::Conflict`], never as an error

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use super::compare::CompareInfo;
use super::sync::LocalCopy;
use super::{HostContext, HostError};
use crate::core::ops::RepoGuard;
use crate::core::types::{BranchName, RepoId};

/// Mergeability of a pull request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeStatus {
    /// Not tested yet.
    #[default]
    Checking,
    Conflict,
    Mergeable,
}

impl std::fmt::Display for MergeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            MergeStatus::Checking => "checking",
            MergeStatus::Conflict => "conflict",
            MergeStatus::Mergeable => "mergeable",
        })
    }
}

/// A persisted pull-request patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    pub index: u64,
    pub path: PathBuf,
    /// Hex SHA-256 of the patch bytes.
    pub sha256: String,
}

/// Persist the comparison's patch and test it against the base branch.
#[instrument(skip(ctx, info), fields(base = %info.base_repo, branch = %info.base_branch))]
pub async fn test_mergeability(
    ctx: &HostContext,
    info: &CompareInfo,
) -> Result<(Patch, MergeStatus), HostError> {
    let bytes = ctx
        .git()
        .diff_binary(
            &ctx.paths().repo_path(&info.head_repo),
            &info.meta.merge_base,
            &info.head_commit,
        )
        .await?;

    let guard = ctx.locks().acquire(&info.base_repo).await?;
    let patch = write_patch(ctx, &info.base_repo, &bytes, &guard).await?;
    let status = check_patch(ctx, &info.base_repo, &info.base_branch, &patch, &guard).await?;
    info!(index = patch.index, %status, "mergeability tested");
    Ok((patch, status))
}

/// Test the comparison and fail unless it applies cleanly.
///
/// Run right before a merge so a stale status recorded earlier is never
/// trusted.
///
/// # Errors
///
/// `Conflict` when the patch does not apply to the current base branch.
pub async fn ensure_mergeable(ctx: &HostContext, info: &CompareInfo) -> Result<Patch, HostError> {
    let (patch, status) = test_mergeability(ctx, info).await?;
    if status != MergeStatus::Mergeable {
        return Err(HostError::Conflict(format!(
            "branch '{}' of {} does not apply cleanly onto {}",
            info.head_branch, info.head_repo, info.base_branch
        )));
    }
    Ok(patch)
}

/// Re-test an already persisted patch, e.g. after the base branch moved.
#[instrument(skip(ctx, patch), fields(repo = %repo, index = patch.index))]
pub async fn test_patch(
    ctx: &HostContext,
    repo: &RepoId,
    base_branch: &BranchName,
    patch: &Patch,
) -> Result<MergeStatus, HostError> {
    let guard = ctx.locks().acquire(repo).await?;
    check_patch(ctx, repo, base_branch, patch, &guard).await
}

/// Write `bytes` as the next patch of `repo`.
pub async fn write_patch(
    ctx: &HostContext,
    repo: &RepoId,
    bytes: &[u8],
    _guard: &RepoGuard,
) -> Result<Patch, HostError> {
    let dir = ctx.paths().pulls_dir(repo);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| HostError::io(&dir, e))?;

    let mut index = count_patches(&dir)? + 1;
    // Deleted patches leave gaps; never overwrite a survivor.
    while ctx.paths().patch_path(repo, index).exists() {
        index += 1;
    }
    let path = ctx.paths().patch_path(repo, index);

    let mut temp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| HostError::io(&dir, e))?;
    temp.write_all(bytes).map_err(|e| HostError::io(temp.path(), e))?;
    temp.persist(&path)
        .map_err(|e| HostError::io(&path, e.error))?;

    debug!(index, path = %path.display(), bytes = bytes.len(), "patch saved");
    Ok(Patch {
        index,
        path,
        sha256: digest(bytes),
    })
}

fn count_patches(dir: &Path) -> Result<u64, HostError> {
    let entries = std::fs::read_dir(dir).map_err(|e| HostError::io(dir, e))?;
    let mut count = 0;
    for entry in entries {
        let entry = entry.map_err(|e| HostError::io(dir, e))?;
        if entry.path().extension().is_some_and(|ext| ext == "patch") {
            count += 1;
        }
    }
    Ok(count)
}

fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

async fn check_patch(
    ctx: &HostContext,
    repo: &RepoId,
    base_branch: &BranchName,
    patch: &Patch,
    guard: &RepoGuard,
) -> Result<MergeStatus, HostError> {
    let bytes = match tokio::fs::read(&patch.path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %patch.path.display(), error = %e, "patch unreadable");
            return Ok(MergeStatus::Conflict);
        }
    };
    if digest(&bytes) != patch.sha256 {
        warn!(path = %patch.path.display(), "patch digest mismatch");
        return Ok(MergeStatus::Conflict);
    }

    let copy = LocalCopy::new(ctx, repo, guard);
    copy.prepare(base_branch).await?;
    let applies = ctx.git().apply_check(copy.path(), &patch.path).await?;
    Ok(if applies {
        MergeStatus::Mergeable
    } else {
        MergeStatus::Conflict
    })
}
