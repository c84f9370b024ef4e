//! engine::repo
//!
//! Repository administration: creation, deletion, default branch, hook
//! installation and branch protection.
//!
//! Changing the default branch and deleting a repository hold the
//! repository lock, so neither interleaves with an edit or a merge.

use std::path::PathBuf;

use tracing::{info, instrument};

use super::sync::LocalCopy;
use super::{HostContext, HostError};
use crate::core::types::{BranchName, RepoId};
use crate::git::Git;
use crate::policy::{install_hooks, HookScript, PolicyStore};

/// Create an empty bare repository and install its hooks.
///
/// Returns the repository path.
///
/// # Errors
///
/// `AlreadyExists` when the repository path is taken.
#[instrument(skip(ctx), fields(repo = %repo))]
pub fn init_repository(ctx: &HostContext, repo: &RepoId) -> Result<PathBuf, HostError> {
    let path = ctx.paths().repo_path(repo);
    let branch = ctx
        .config()
        .default_branch()
        .map_err(|e| HostError::InvalidInput(e.to_string()))?;

    ctx.paths()
        .ensure_dirs()
        .map_err(|e| HostError::io(&ctx.paths().root, e))?;
    Git::init_bare(&path, &branch)?;
    install_hooks(&path, &HookScript::from_config(ctx.config()))?;

    info!(path = %path.display(), %branch, "repository created");
    Ok(path)
}

/// Point `HEAD` of the bare repository at `branch`.
///
/// # Errors
///
/// `NotFound` when the repository or the branch does not exist.
#[instrument(skip(ctx), fields(repo = %repo, %branch))]
pub async fn set_default_branch(
    ctx: &HostContext,
    repo: &RepoId,
    branch: &BranchName,
) -> Result<(), HostError> {
    let _guard = ctx.locks().acquire(repo).await?;
    if !ctx.open_repo(repo)?.has_branch(branch) {
        return Err(HostError::not_found("branch", branch.as_str()));
    }
    ctx.git().set_head(&ctx.paths().repo_path(repo), branch).await?;
    info!("default branch changed");
    Ok(())
}

/// Remove the bare repository, its patches and its local working copy.
///
/// The lock file is left in place so a waiter never races a re-created
/// repository of the same name.
///
/// # Errors
///
/// `NotFound` when the repository does not exist.
#[instrument(skip(ctx), fields(repo = %repo))]
pub async fn delete_repository(ctx: &HostContext, repo: &RepoId) -> Result<(), HostError> {
    let guard = ctx.locks().acquire(repo).await?;
    let path = ctx.paths().repo_path(repo);
    if !path.is_dir() {
        return Err(HostError::not_found("repository", repo.key()));
    }
    tokio::fs::remove_dir_all(&path)
        .await
        .map_err(|e| HostError::io(&path, e))?;
    LocalCopy::new(ctx, repo, &guard).remove().await?;
    info!(path = %path.display(), "repository deleted");
    Ok(())
}

/// (Re)generate the delegate hooks of an existing repository.
pub fn install_repo_hooks(ctx: &HostContext, repo: &RepoId) -> Result<Vec<PathBuf>, HostError> {
    let git = ctx.open_repo(repo)?;
    Ok(install_hooks(
        git.git_dir(),
        &HookScript::from_config(ctx.config()),
    )?)
}

/// Protected branches of `repo` that currently exist.
pub fn protected_branches(ctx: &HostContext, repo: &RepoId) -> Result<Vec<BranchName>, HostError> {
    let git = ctx.open_repo(repo)?;
    Ok(PolicyStore::new(git.git_dir()).read(&git)?)
}

/// Protect or unprotect `branch`. Returns the stored list afterwards.
#[instrument(skip(ctx), fields(repo = %repo))]
pub fn set_branch_protection(
    ctx: &HostContext,
    repo: &RepoId,
    branch: &BranchName,
    protect: bool,
) -> Result<Vec<BranchName>, HostError> {
    let git = ctx.open_repo(repo)?;
    let store = PolicyStore::new(git.git_dir());
    Ok(store.write(branch, protect, &HookScript::from_config(ctx.config()))?)
}
