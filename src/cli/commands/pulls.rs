//! Pull-request commands: compare, check-mergeable, merge.

use anyhow::Result;

use super::{block_on, parse_branch, parse_repo};
use crate::cli::CliContext;
use crate::core::types::{RepoId, Signature};
use crate::engine::compare::{self, CompareDiff, CompareInfo, HeadRef};
use crate::engine::merge::{self as engine_merge, MergeRequest, MergeStyle};
use crate::engine::mergeable;
use crate::engine::HostContext;

/// Resolve `base...head` against `repo`.
fn resolve(host: &HostContext, repo: &RepoId, range: &str) -> Result<CompareInfo> {
    let (base, head) = compare::split_range(range)?;
    let base = parse_branch(base)?;
    let head: HeadRef = head.parse()?;
    Ok(compare::parse_compare(host, repo, &base, &head)?)
}

/// Print the comparison, optionally with its bounded diff.
pub fn compare(ctx: &CliContext, repo: &str, range: &str, diff: bool, json: bool) -> Result<i32> {
    let repo = parse_repo(repo)?;
    let host = ctx.host()?;
    let info = resolve(&host, &repo, range)?;
    let diff = if diff {
        Some(block_on(compare::prepare_diff(&host, &info))??)
    } else {
        None
    };

    if json {
        let out = serde_json::json!({ "compare": &info, "diff": &diff });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(0);
    }

    println!("merge-base {}", info.meta.merge_base);
    println!(
        "{} commit(s), {} file(s) changed",
        info.meta.commits.len(),
        info.meta.num_files
    );
    for commit in &info.meta.commits {
        println!("  {} {}", commit.oid.short(7), commit.summary);
    }
    match diff {
        Some(CompareDiff::NothingToCompare) => println!("nothing to compare"),
        Some(CompareDiff::Diff(diff)) => {
            for file in &diff.files {
                println!(
                    "  {:?} {} (+{} -{})",
                    file.status, file.name, file.additions, file.deletions
                );
            }
            if diff.is_incomplete {
                println!("  (diff truncated)");
            }
        }
        None => {}
    }
    Ok(0)
}

/// Persist the patch and report mergeability.
pub fn check_mergeable(ctx: &CliContext, repo: &str, range: &str) -> Result<i32> {
    let repo = parse_repo(repo)?;
    let host = ctx.host()?;
    let info = resolve(&host, &repo, range)?;

    let (patch, status) = block_on(mergeable::test_mergeability(&host, &info))??;
    println!("{} (patch {} at {})", status, patch.index, patch.path.display());
    Ok(0)
}

/// Re-test mergeability, then merge `head` into `base`.
pub fn merge(
    ctx: &CliContext,
    repo: &str,
    range: &str,
    style: MergeStyle,
    author_name: &str,
    author_email: &str,
    description: &str,
) -> Result<i32> {
    let repo = parse_repo(repo)?;
    let host = ctx.host()?;
    let info = resolve(&host, &repo, range)?;

    let request = MergeRequest {
        base_repo: info.base_repo.clone(),
        base_branch: info.base_branch.clone(),
        head_repo: info.head_repo.clone(),
        head_branch: info.head_branch.clone(),
        style,
        doer: Signature::new(author_name, author_email),
        description: description.to_string(),
    };
    let oid = block_on(async {
        mergeable::ensure_mergeable(&host, &info).await?;
        engine_merge::merge(&host, &request).await
    })??;
    println!("{} {}", request.base_branch, oid);
    Ok(0)
}
