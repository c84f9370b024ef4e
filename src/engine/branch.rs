//! engine::branch
//!
//! Branch creation through the local copy.

use std::ffi::OsStr;

use tracing::{info, instrument};

use super::editor::{open_source, switch_branch};
use super::sync::LocalCopy;
use super::{HostContext, HostError};
use crate::core::types::{BranchName, Oid, RepoId};

/// Create `new_branch` at the tip of `old_branch` and push it.
///
/// Returns the tip the new branch points at.
///
/// # Errors
///
/// - `NotFound` if `old_branch` does not exist
/// - `AlreadyExists` if `new_branch` already exists upstream
#[instrument(skip(ctx), fields(repo = %repo))]
pub async fn create_branch(
    ctx: &HostContext,
    repo: &RepoId,
    old_branch: &BranchName,
    new_branch: &BranchName,
) -> Result<Oid, HostError> {
    if old_branch == new_branch {
        return Err(HostError::already_exists("branch", new_branch.as_str()));
    }
    let (_, source) = open_source(ctx, repo, old_branch, new_branch)?;

    let guard = ctx.locks().acquire(repo).await?;
    let copy = LocalCopy::new(ctx, repo, &guard);
    copy.prepare(old_branch).await?;
    switch_branch(ctx, &copy, old_branch, new_branch).await?;
    ctx.git()
        .push(copy.path(), OsStr::new("origin"), new_branch.as_str())
        .await?;

    info!(branch = %new_branch, %source, "branch created");
    Ok(source)
}
