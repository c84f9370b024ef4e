//! Repository administration commands: init, delete, default-branch,
//! install-hooks, protect, unprotect, protected.

use anyhow::Result;

use super::{block_on, parse_branch, parse_repo};
use crate::cli::CliContext;
use crate::engine::repo as engine_repo;

/// Create a bare repository.
pub fn init(ctx: &CliContext, repo: &str) -> Result<i32> {
    let repo = parse_repo(repo)?;
    let host = ctx.host()?;
    let path = engine_repo::init_repository(&host, &repo)?;
    println!("Initialized {} at {}", repo, path.display());
    Ok(0)
}

/// Delete a repository.
pub fn delete(ctx: &CliContext, repo: &str) -> Result<i32> {
    let repo = parse_repo(repo)?;
    let host = ctx.host()?;
    block_on(engine_repo::delete_repository(&host, &repo))??;
    println!("Deleted {}", repo);
    Ok(0)
}

/// Change the default branch.
pub fn default_branch(ctx: &CliContext, repo: &str, branch: &str) -> Result<i32> {
    let repo = parse_repo(repo)?;
    let branch = parse_branch(branch)?;
    let host = ctx.host()?;
    block_on(engine_repo::set_default_branch(&host, &repo, &branch))??;
    println!("Default branch of {} is now '{}'", repo, branch);
    Ok(0)
}

/// Regenerate hook scripts.
pub fn install_hooks(ctx: &CliContext, repo: &str) -> Result<i32> {
    let repo = parse_repo(repo)?;
    let host = ctx.host()?;
    for path in engine_repo::install_repo_hooks(&host, &repo)? {
        println!("{}", path.display());
    }
    Ok(0)
}

/// Protect (`protect = true`) or unprotect a branch.
pub fn protect(ctx: &CliContext, repo: &str, branch: &str, protect: bool) -> Result<i32> {
    let repo = parse_repo(repo)?;
    let branch = parse_branch(branch)?;
    let host = ctx.host()?;
    let stored = engine_repo::set_branch_protection(&host, &repo, &branch, protect)?;

    let verb = if protect { "Protected" } else { "Unprotected" };
    println!("{} '{}' in {} ({} protected)", verb, branch, repo, stored.len());
    Ok(0)
}

/// List protected branches that exist, one per line.
pub fn protected(ctx: &CliContext, repo: &str) -> Result<i32> {
    let repo = parse_repo(repo)?;
    let host = ctx.host()?;
    for branch in engine_repo::protected_branches(&host, &repo)? {
        println!("{}", branch);
    }
    Ok(0)
}
