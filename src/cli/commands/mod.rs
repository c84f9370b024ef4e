//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Parses names (`owner/name`, branches, `base...head`) into domain types
//! 2. Calls the engine to execute the command
//! 3. Prints the result
//!
//! Handlers return the process exit code. Everything but the hook exits 0
//! on success; the hook propagates its own decision.
//!
//! # Async Commands
//!
//! Engine operations that drive the toolchain are async. Handlers run them
//! on a fresh `tokio::runtime::Runtime` with `block_on`.

mod completion;
mod content;
mod hook;
mod pulls;
mod repo;

// Re-export command functions for testing and direct invocation
pub use completion::completion;
pub use content::{create_branch, delete_file, edit, upload};
pub use hook::hook;
pub use pulls::{check_mergeable, compare, merge};
pub use repo::{default_branch, delete, init, install_hooks, protect, protected};

use std::str::FromStr;

use anyhow::{Context as _, Result};

use super::args::Command;
use super::CliContext;
use crate::core::types::{BranchName, RepoId};

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &CliContext) -> Result<i32> {
    match command {
        Command::Hook {
            policy,
            branch,
            kind,
        } => hook::hook(kind, policy.as_deref(), branch.as_deref()),

        // Repository administration
        Command::Init { repo } => repo::init(ctx, &repo),
        Command::Delete { repo } => repo::delete(ctx, &repo),
        Command::DefaultBranch { repo, branch } => repo::default_branch(ctx, &repo, &branch),
        Command::InstallHooks { repo } => repo::install_hooks(ctx, &repo),
        Command::Protect { repo, branch } => repo::protect(ctx, &repo, &branch, true),
        Command::Unprotect { repo, branch } => repo::protect(ctx, &repo, &branch, false),
        Command::Protected { repo } => repo::protected(ctx, &repo),

        // Content mutation
        Command::Branch { repo, from, name } => content::create_branch(ctx, &repo, &from, &name),
        Command::Edit {
            repo,
            branch,
            new_branch,
            path,
            from_path,
            content,
            create,
            message,
            body,
        } => content::edit(
            ctx,
            content::EditArgs {
                repo,
                branch,
                new_branch,
                path,
                from_path,
                content,
                create,
                message,
                body,
            },
        ),
        Command::Rm {
            repo,
            branch,
            new_branch,
            path,
            message,
            body,
        } => content::delete_file(
            ctx,
            &repo,
            &branch,
            new_branch.as_deref(),
            &path,
            &message,
            &body,
        ),
        Command::Upload {
            repo,
            branch,
            new_branch,
            dir,
            message,
            body,
            files,
        } => content::upload(
            ctx,
            &repo,
            &branch,
            new_branch.as_deref(),
            &dir,
            &message,
            &body,
            &files,
        ),

        // Pull requests
        Command::Compare {
            repo,
            range,
            diff,
            json,
        } => pulls::compare(ctx, &repo, &range, diff, json),
        Command::CheckMergeable { repo, range } => pulls::check_mergeable(ctx, &repo, &range),
        Command::Merge {
            repo,
            range,
            style,
            author_name,
            author_email,
            description,
        } => pulls::merge(
            ctx,
            &repo,
            &range,
            style.into(),
            &author_name,
            &author_email,
            &description,
        ),

        Command::Completion { shell } => completion::completion(shell).map(|()| 0),
    }
}

/// Parse an `owner/name` argument.
pub(crate) fn parse_repo(arg: &str) -> Result<RepoId> {
    RepoId::from_str(arg).with_context(|| format!("invalid repository '{}'", arg))
}

/// Parse a branch argument.
pub(crate) fn parse_branch(arg: &str) -> Result<BranchName> {
    BranchName::new(arg).with_context(|| format!("invalid branch name '{}'", arg))
}

/// Run a future to completion on a fresh runtime.
pub(crate) fn block_on<F: std::future::Future>(future: F) -> Result<F::Output> {
    let rt = tokio::runtime::Runtime::new()?;
    Ok(rt.block_on(future))
}
