//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to Git. Reads go through [`Git`]
//! (git2, opened on a bare repository). Mutations go through the
//! [`GitOps`] capability, implemented by [`GitCli`] which runs the installed
//! toolchain, and by [`mock::MockGit`] for tests. No other module imports
//! `git2` or spawns `git`.
//!
//! # Responsibilities
//!
//! - Opening and creating bare repositories
//! - Branch, commit and tree queries
//! - Ancestry queries (merge-base, commit ranges)
//! - Toolchain steps with stage-labelled errors and timeouts
//! - Size-bounded diff parsing
//!
//! # Invariants
//!
//! - git2 never mutates refs or objects
//! - Every toolchain failure names its stage
//! - All operations return strong types (Oid, BranchName, RefName)
//!
//! # Example
//!
//! ```ignore
//! use hostgit::git::{Git, GitCli, GitOps};
//!
//! let git = Git::open(&bare_path)?;
//! let tip = git.branch_commit(&main)?;
//!
//! let cli = GitCli::new(identity);
//! cli.clone_branch(&bare_path, &local, &main, timeout).await?;
//! ```

pub mod diff;
mod interface;
pub mod mock;
mod toolchain;

pub use diff::{Diff, DiffFile, DiffLimits, FileStatus};
pub use interface::{CommitInfo, EntryKind, Git, GitError};
pub use toolchain::{GitCli, GitOps, MergeMode, Stage, ToolchainError};
