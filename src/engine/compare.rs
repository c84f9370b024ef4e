//! engine::compare
//!
//! Pull-Request Comparator.
//!
//! # Architecture
//!
//! Comparison metadata (merge-base, ahead commits, changed file count) is
//! computed with git2 on the base repository. When the head lives in another
//! repository, that repository's object store is attached to the base handle
//! as an in-memory alternate, so a single handle can walk both histories
//! without writing anything to either repository.
//!
//! The rendered diff runs in the head repository, which holds both the
//! merge-base and the head commit.
//!
//! # Head references
//!
//! A head is either `branch` (same repository) or `owner:repo:branch`.
//!
//! ```
//! use hostgit::engine::compare::HeadRef;
//!
//! let head: HeadRef = "bob:notes:feature".parse().unwrap();
//! assert_eq!(head.branch().as_str(), "feature");
//! assert_eq!(head.repo().unwrap().key(), "bob/notes");
//!
//! let local: HeadRef = "feature".parse().unwrap();
//! assert!(local.repo().is_none());
//! ```

use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, instrument};

use super::{HostContext, HostError};
use crate::core::types::{BranchName, Oid, RepoId};
use crate::git::{CommitInfo, Diff, Git};

/// The head side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadRef {
    /// A branch of the base repository.
    Local(BranchName),
    /// A branch of another repository.
    Remote { repo: RepoId, branch: BranchName },
}

impl HeadRef {
    pub fn branch(&self) -> &BranchName {
        match self {
            HeadRef::Local(branch) | HeadRef::Remote { branch, .. } => branch,
        }
    }

    pub fn repo(&self) -> Option<&RepoId> {
        match self {
            HeadRef::Local(_) => None,
            HeadRef::Remote { repo, .. } => Some(repo),
        }
    }
}

impl FromStr for HeadRef {
    type Err = HostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            [branch] => Ok(HeadRef::Local(BranchName::new(*branch)?)),
            [owner, name, branch] => Ok(HeadRef::Remote {
                repo: RepoId::new(owner, name)?,
                branch: BranchName::new(*branch)?,
            }),
            _ => Err(HostError::InvalidInput(format!(
                "head must be 'branch' or 'owner:repo:branch', got '{}'",
                s
            ))),
        }
    }
}

/// Split a `base...head` range.
pub fn split_range(range: &str) -> Result<(&str, &str), HostError> {
    match range.split_once("...") {
        Some((base, head)) if !base.is_empty() && !head.is_empty() => Ok((base, head)),
        _ => Err(HostError::InvalidInput(format!(
            "expected '<base>...<head>', got '{}'",
            range
        ))),
    }
}

/// Comparison metadata of a pull request. Computed per request, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestMeta {
    pub merge_base: Oid,
    /// Commits on head but not on base, oldest first.
    pub commits: Vec<CommitInfo>,
    pub num_files: usize,
}

/// Result of [`parse_compare`].
#[derive(Debug, Clone, Serialize)]
pub struct CompareInfo {
    pub base_repo: RepoId,
    pub base_branch: BranchName,
    pub base_commit: Oid,
    pub head_repo: RepoId,
    pub head_branch: BranchName,
    pub head_commit: Oid,
    pub meta: PullRequestMeta,
}

impl CompareInfo {
    pub fn is_same_repo(&self) -> bool {
        self.base_repo == self.head_repo
    }
}

/// Result of [`prepare_diff`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompareDiff {
    /// Head is the merge-base; no diff was computed.
    NothingToCompare,
    Diff(Diff),
}

/// Resolve both sides of a comparison and compute its metadata.
///
/// # Errors
///
/// - `NotFound` when a repository or branch does not exist
/// - `NoMergeBase` when the two sides share no history
#[instrument(skip(ctx), fields(base = %base_repo))]
pub fn parse_compare(
    ctx: &HostContext,
    base_repo: &RepoId,
    base_branch: &BranchName,
    head: &HeadRef,
) -> Result<CompareInfo, HostError> {
    let base = ctx.open_repo(base_repo)?;
    if !base.has_branch(base_branch) {
        return Err(HostError::not_found("branch", base_branch.as_str()));
    }
    let base_commit = base.branch_commit(base_branch)?;

    let head_repo = head.repo().unwrap_or(base_repo).clone();
    let head_branch = head.branch().clone();
    let head_commit = if head_repo == *base_repo {
        resolve_head(&base, &head_branch)?
    } else {
        let other = ctx.open_repo(&head_repo)?;
        let commit = resolve_head(&other, &head_branch)?;
        base.add_object_alternate(other.git_dir())?;
        commit
    };

    let meta = compute_meta(&base, &base_commit, &head_commit)?.ok_or_else(|| {
        HostError::NoMergeBase {
            base: base_branch.to_string(),
            head: head_branch.to_string(),
        }
    })?;
    debug!(merge_base = %meta.merge_base, commits = meta.commits.len(), "compared");

    Ok(CompareInfo {
        base_repo: base_repo.clone(),
        base_branch: base_branch.clone(),
        base_commit,
        head_repo,
        head_branch,
        head_commit,
        meta,
    })
}

/// Compute the bounded diff from merge-base to head.
///
/// Reports [`CompareDiff::NothingToCompare`] without running anything when
/// the head commit is the merge-base.
#[instrument(skip(ctx, info), fields(head = %info.head_repo, branch = %info.head_branch))]
pub async fn prepare_diff(ctx: &HostContext, info: &CompareInfo) -> Result<CompareDiff, HostError> {
    if info.head_commit == info.meta.merge_base {
        debug!("head equals merge-base, nothing to compare");
        return Ok(CompareDiff::NothingToCompare);
    }
    let config = ctx.config();
    let diff = ctx
        .git()
        .diff(
            &ctx.paths().repo_path(&info.head_repo),
            &info.meta.merge_base,
            &info.head_commit,
            config.diff_limits(),
            config.diff_timeout(),
        )
        .await?;
    Ok(CompareDiff::Diff(diff))
}

/// Metadata of an open pull request.
///
/// Returns `None` when the head branch no longer resolves, so the caller can
/// render the pull request as broken rather than failing.
pub fn pull_info(
    ctx: &HostContext,
    base_repo: &RepoId,
    base_branch: &BranchName,
    head_repo: &RepoId,
    head_branch: &BranchName,
) -> Result<Option<PullRequestMeta>, HostError> {
    let base = ctx.open_repo(base_repo)?;
    let base_commit = base.branch_commit(base_branch)?;

    let head_commit = if head_repo == base_repo {
        base.try_resolve_ref(&format!("refs/heads/{}", head_branch))?
    } else {
        let Ok(other) = ctx.open_repo(head_repo) else {
            return Ok(None);
        };
        let commit = other.try_resolve_ref(&format!("refs/heads/{}", head_branch))?;
        base.add_object_alternate(other.git_dir())?;
        commit
    };
    let Some(head_commit) = head_commit.filter(|c| base.commit_exists(c)) else {
        debug!(branch = %head_branch, "pull request head is gone");
        return Ok(None);
    };

    compute_meta(&base, &base_commit, &head_commit)
}

/// Metadata of a merged pull request, from its merge-base to the commit
/// the merge produced.
pub fn merged_pull_info(
    ctx: &HostContext,
    repo: &RepoId,
    merge_base: &Oid,
    merge_commit: &Oid,
) -> Result<PullRequestMeta, HostError> {
    let git = ctx.open_repo(repo)?;
    for oid in [merge_base, merge_commit] {
        if !git.commit_exists(oid) {
            return Err(HostError::not_found("commit", oid.as_str()));
        }
    }
    Ok(PullRequestMeta {
        merge_base: merge_base.clone(),
        commits: git.commits_between(merge_base, merge_commit)?,
        num_files: git.changed_file_count(merge_base, merge_commit)?,
    })
}

fn resolve_head(git: &Git, branch: &BranchName) -> Result<Oid, HostError> {
    if !git.has_branch(branch) {
        return Err(HostError::not_found("branch", branch.as_str()));
    }
    Ok(git.branch_commit(branch)?)
}

/// `None` when the two commits share no history.
fn compute_meta(git: &Git, base: &Oid, head: &Oid) -> Result<Option<PullRequestMeta>, HostError> {
    let Some(merge_base) = git.merge_base(base, head)? else {
        return Ok(None);
    };
    let commits = git.commits_between(&merge_base, head)?;
    let num_files = git.changed_file_count(&merge_base, head)?;
    Ok(Some(PullRequestMeta {
        merge_base,
        commits,
        num_files,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    mod head_ref {
        use super::*;

        #[test]
        fn plain_branch_is_local() {
            let head: HeadRef = "feature/x".parse().unwrap();
            assert_eq!(head, HeadRef::Local(BranchName::new("feature/x").unwrap()));
        }

        #[test]
        fn qualified_head_names_repository() {
            let head: HeadRef = "Bob:Notes.git:fix".parse().unwrap();
            assert_eq!(head.repo().unwrap().key(), "bob/notes");
            assert_eq!(head.branch().as_str(), "fix");
        }

        #[test]
        fn two_part_head_is_rejected() {
            assert!("bob:fix".parse::<HeadRef>().is_err());
            assert!("a:b:c:d".parse::<HeadRef>().is_err());
        }
    }

    mod range {
        use super::*;

        #[test]
        fn splits_on_three_dots() {
            assert_eq!(split_range("main...bob:notes:fix").unwrap(), ("main", "bob:notes:fix"));
        }

        #[test]
        fn rejects_two_dots_and_empty_sides() {
            assert!(split_range("main..fix").is_err());
            assert!(split_range("...fix").is_err());
            assert!(split_range("main...").is_err());
        }
    }
}
