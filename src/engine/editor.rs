//! engine::editor
//!
//! File Mutation Engine: edit, delete and upload.
//!
//! # Pipeline
//!
//! Every operation runs the same steps:
//!
//! 1. Validate the tree path and refuse anything inside repository metadata
//! 2. Check the branches and walk the source commit's tree (read-only)
//! 3. Take the repository lock; discard and sync the source branch
//! 4. Check out the target branch when it differs from the source
//! 5. Mutate the local copy's files
//! 6. Stage everything, commit as the service identity, push the target
//!
//! Steps 1 and 2 touch nothing on disk, so a rejected request leaves the
//! local copy exactly as it was.
//!
//! # Example
//!
//! ```ignore
//! use hostgit::engine::editor::{edit_file, CommitMessage, EditFileRequest};
//!
//! let oid = edit_file(&ctx, &repo, EditFileRequest {
//!     old_branch: main.clone(),
//!     new_branch: main,
//!     old_path: "README.md".into(),
//!     new_path: "README.md".into(),
//!     content: "# Hello\n".into(),
//!     message: CommitMessage::default(),
//!     is_new_file: false,
//! }).await?;
//! ```

use std::ffi::OsStr;
use std::path::Path;

use tracing::{debug, info, instrument};

use super::sync::LocalCopy;
use super::upload::{delete_uploads, Upload};
use super::{HostContext, HostError};
use crate::core::treepath::{is_safe_upload_name, TreePath};
use crate::core::types::{BranchName, Oid, RepoId};
use crate::git::{EntryKind, Git};

/// Caller-supplied commit message parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitMessage {
    pub summary: String,
    pub body: String,
}

impl CommitMessage {
    pub fn new(summary: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            body: body.into(),
        }
    }

    /// Trimmed summary (or `default_summary` when empty), then a blank line
    /// and the trimmed body when there is one.
    pub fn compose(&self, default_summary: &str) -> String {
        let summary = match self.summary.trim() {
            "" => default_summary,
            s => s,
        };
        match self.body.trim() {
            "" => summary.to_string(),
            body => format!("{}\n\n{}", summary, body),
        }
    }
}

/// Create, overwrite or rename a single file.
#[derive(Debug, Clone)]
pub struct EditFileRequest {
    pub old_branch: BranchName,
    pub new_branch: BranchName,
    /// Path before the edit. Ignored when creating.
    pub old_path: String,
    pub new_path: String,
    pub content: String,
    pub message: CommitMessage,
    pub is_new_file: bool,
}

/// Remove a single file.
#[derive(Debug, Clone)]
pub struct DeleteFileRequest {
    pub old_branch: BranchName,
    pub new_branch: BranchName,
    pub path: String,
    pub message: CommitMessage,
}

/// Commit pending uploads into a directory.
#[derive(Debug, Clone)]
pub struct UploadFilesRequest {
    pub old_branch: BranchName,
    pub new_branch: BranchName,
    /// Target directory; empty for the tree root.
    pub tree_path: String,
    pub uploads: Vec<Upload>,
    pub message: CommitMessage,
}

/// Edit a file and push the result. Returns the new tip of `new_branch`.
///
/// # Errors
///
/// - `PathSecurity` when either path points into repository metadata
/// - `NotFound` for a missing source branch, or a missing source file when
///   not creating
/// - `AlreadyExists` when `new_branch` already exists, or when creating or
///   renaming onto an existing entry
/// - `DirectoryIsFile`, `FilenameIsDirectory`, `FileIsSymlink` from the
///   tree walk
#[instrument(skip(ctx, request), fields(repo = %repo, path = %request.new_path))]
pub async fn edit_file(
    ctx: &HostContext,
    repo: &RepoId,
    request: EditFileRequest,
) -> Result<Oid, HostError> {
    let old_path = TreePath::new(&request.old_path);
    let new_path = TreePath::new(&request.new_path);
    if new_path.is_root() {
        return Err(HostError::InvalidInput("empty tree path".to_string()));
    }
    reject_git_path(&new_path)?;
    if !request.is_new_file {
        reject_git_path(&old_path)?;
    }

    let (git, source) = open_source(ctx, repo, &request.old_branch, &request.new_branch)?;
    let renaming = !request.is_new_file && old_path != new_path;
    let segments: Vec<&str> = new_path.segments().collect();
    ensure_parents_are_trees(&git, &source, &segments[..segments.len() - 1])?;
    match git.tree_entry_kind(&source, new_path.as_str())? {
        Some(EntryKind::Tree) => {
            return Err(HostError::FilenameIsDirectory {
                path: new_path.to_string(),
            })
        }
        Some(EntryKind::Symlink) => {
            return Err(HostError::FileIsSymlink {
                path: new_path.to_string(),
            })
        }
        Some(_) if request.is_new_file || renaming => {
            return Err(HostError::already_exists("file", new_path.as_str()));
        }
        _ => {}
    }
    if !request.is_new_file && git.tree_entry_kind(&source, old_path.as_str())?.is_none() {
        return Err(HostError::not_found("file", old_path.as_str()));
    }

    let guard = ctx.locks().acquire(repo).await?;
    let copy = LocalCopy::new(ctx, repo, &guard);
    copy.prepare(&request.old_branch).await?;
    switch_branch(ctx, &copy, &request.old_branch, &request.new_branch).await?;

    let workdir = copy.path();
    let old_file = workdir.join(old_path.as_str());
    let new_file = workdir.join(new_path.as_str());
    if request.is_new_file && new_file.exists() {
        return Err(HostError::already_exists("file", new_path.as_str()));
    }
    if let Some(parent) = new_file.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| HostError::io(parent, e))?;
    }
    if renaming && old_file.exists() {
        ctx.git()
            .move_path(workdir, old_path.as_str(), new_path.as_str())
            .await?;
    }
    tokio::fs::write(&new_file, request.content.replace('\r', ""))
        .await
        .map_err(|e| HostError::io(&new_file, e))?;

    let default_summary = if request.is_new_file {
        format!("Add '{}'", new_path)
    } else {
        format!("Update '{}'", new_path)
    };
    let message = request.message.compose(&default_summary);
    let oid = commit_and_push(ctx, workdir, &request.new_branch, &message).await?;
    info!(%oid, branch = %request.new_branch, "file edited");
    Ok(oid)
}

/// Delete a file and push the result. Returns the new tip of `new_branch`.
#[instrument(skip(ctx, request), fields(repo = %repo, path = %request.path))]
pub async fn delete_file(
    ctx: &HostContext,
    repo: &RepoId,
    request: DeleteFileRequest,
) -> Result<Oid, HostError> {
    let path = TreePath::new(&request.path);
    if path.is_root() {
        return Err(HostError::InvalidInput("empty tree path".to_string()));
    }
    reject_git_path(&path)?;

    let (git, source) = open_source(ctx, repo, &request.old_branch, &request.new_branch)?;
    match git.tree_entry_kind(&source, path.as_str())? {
        None => return Err(HostError::not_found("file", path.as_str())),
        Some(EntryKind::Tree) => {
            return Err(HostError::FilenameIsDirectory {
                path: path.to_string(),
            })
        }
        Some(_) => {}
    }

    let guard = ctx.locks().acquire(repo).await?;
    let copy = LocalCopy::new(ctx, repo, &guard);
    copy.prepare(&request.old_branch).await?;
    switch_branch(ctx, &copy, &request.old_branch, &request.new_branch).await?;

    let file = copy.path().join(path.as_str());
    tokio::fs::remove_file(&file)
        .await
        .map_err(|e| HostError::io(&file, e))?;

    let message = request.message.compose(&format!("Delete '{}'", path));
    let oid = commit_and_push(ctx, copy.path(), &request.new_branch, &message).await?;
    info!(%oid, branch = %request.new_branch, "file deleted");
    Ok(oid)
}

/// Commit pending uploads into a directory and push. Returns the new tip.
///
/// Uploads whose name is unsafe or whose blob is missing are skipped. The
/// consumed blobs are deleted once the push succeeds.
///
/// # Errors
///
/// `InvalidInput` when no upload survives the filtering.
#[instrument(skip(ctx, request), fields(repo = %repo, dir = %request.tree_path))]
pub async fn upload_files(
    ctx: &HostContext,
    repo: &RepoId,
    request: UploadFilesRequest,
) -> Result<Oid, HostError> {
    let dir = TreePath::new(&request.tree_path);
    if !dir.is_root() {
        reject_git_path(&dir)?;
    }

    let (git, source) = open_source(ctx, repo, &request.old_branch, &request.new_branch)?;
    let segments: Vec<&str> = dir.segments().collect();
    ensure_parents_are_trees(&git, &source, &segments)?;

    let guard = ctx.locks().acquire(repo).await?;
    let copy = LocalCopy::new(ctx, repo, &guard);
    copy.prepare(&request.old_branch).await?;
    switch_branch(ctx, &copy, &request.old_branch, &request.new_branch).await?;

    let target = copy.path().join(dir.as_str());
    tokio::fs::create_dir_all(&target)
        .await
        .map_err(|e| HostError::io(&target, e))?;

    let mut copied = 0usize;
    for upload in &request.uploads {
        if !is_safe_upload_name(&upload.name) {
            debug!(name = %upload.name, "skipping unsafe upload name");
            continue;
        }
        let Some(blob) = upload.local_path(ctx.paths()).filter(|p| p.is_file()) else {
            debug!(uuid = %upload.uuid, "skipping missing upload");
            continue;
        };
        let dest = target.join(&upload.name);
        tokio::fs::copy(&blob, &dest)
            .await
            .map_err(|e| HostError::io(&dest, e))?;
        copied += 1;
    }
    if copied == 0 {
        return Err(HostError::InvalidInput("no files to upload".to_string()));
    }

    let message = request
        .message
        .compose(&format!("Upload files to '{}'", dir));
    let oid = commit_and_push(ctx, copy.path(), &request.new_branch, &message).await?;
    drop(guard);

    delete_uploads(ctx.paths(), &request.uploads).await?;
    info!(%oid, files = copied, branch = %request.new_branch, "files uploaded");
    Ok(oid)
}

// =============================================================================
// Shared steps
// =============================================================================

fn reject_git_path(path: &TreePath) -> Result<(), HostError> {
    if path.is_git_path() {
        return Err(HostError::PathSecurity {
            path: path.to_string(),
        });
    }
    Ok(())
}

/// Open the repository and resolve the source branch.
///
/// A differing target branch must not exist yet.
pub(crate) fn open_source(
    ctx: &HostContext,
    repo: &RepoId,
    old_branch: &BranchName,
    new_branch: &BranchName,
) -> Result<(Git, Oid), HostError> {
    let git = ctx.open_repo(repo)?;
    if !git.has_branch(old_branch) {
        return Err(HostError::not_found("branch", old_branch.as_str()));
    }
    if old_branch != new_branch && git.has_branch(new_branch) {
        return Err(HostError::already_exists("branch", new_branch.as_str()));
    }
    let source = git.branch_commit(old_branch)?;
    Ok((git, source))
}

/// Every existing prefix of `segments` must be a tree in `commit`.
///
/// Stops at the first prefix that does not exist; everything below it will
/// be created.
fn ensure_parents_are_trees(git: &Git, commit: &Oid, segments: &[&str]) -> Result<(), HostError> {
    let mut prefix = String::new();
    for segment in segments {
        if !prefix.is_empty() {
            prefix.push('/');
        }
        prefix.push_str(segment);
        match git.tree_entry_kind(commit, &prefix)? {
            None => break,
            Some(EntryKind::Tree) => {}
            Some(_) => return Err(HostError::DirectoryIsFile { path: prefix }),
        }
    }
    Ok(())
}

/// Move the local copy onto `new_branch`, rooted at `old_branch`.
///
/// A stale local branch of the same name is deleted first.
pub(crate) async fn switch_branch(
    ctx: &HostContext,
    copy: &LocalCopy<'_>,
    old_branch: &BranchName,
    new_branch: &BranchName,
) -> Result<(), HostError> {
    if old_branch == new_branch {
        return Ok(());
    }
    let git = ctx.git();
    if git.has_local_branch(copy.path(), new_branch).await? {
        git.delete_local_branch(copy.path(), new_branch).await?;
    }
    git.checkout_new_branch(
        copy.path(),
        new_branch,
        old_branch.as_str(),
        ctx.config().clone_timeout(),
    )
    .await?;
    Ok(())
}

async fn commit_and_push(
    ctx: &HostContext,
    workdir: &Path,
    branch: &BranchName,
    message: &str,
) -> Result<Oid, HostError> {
    let git = ctx.git();
    git.add_all(workdir).await?;
    git.commit(workdir, &ctx.config().service_identity(), message)
        .await?;
    git.push(workdir, OsStr::new("origin"), branch.as_str())
        .await?;
    Ok(git.rev_parse(workdir, "HEAD").await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    mod message {
        use super::*;

        #[test]
        fn default_summary_when_empty() {
            let msg = CommitMessage::new("   ", "");
            assert_eq!(msg.compose("Update 'a.txt'"), "Update 'a.txt'");
        }

        #[test]
        fn trims_and_joins_body() {
            let msg = CommitMessage::new("  Fix typo \n", "\n Longer text.  \n");
            assert_eq!(msg.compose("unused"), "Fix typo\n\nLonger text.");
        }

        #[test]
        fn body_without_summary_uses_default() {
            let msg = CommitMessage::new("", "details");
            assert_eq!(msg.compose("Delete 'x'"), "Delete 'x'\n\ndetails");
        }
    }

    mod security {
        use super::*;
        use crate::core::config::{Config, HostConfig, RepositoryConfig};
        use crate::git::mock::MockGit;
        use std::sync::Arc;
        use tempfile::TempDir;

        fn setup(temp: &TempDir, git: MockGit) -> HostContext {
            let file = HostConfig {
                repository: Some(RepositoryConfig {
                    root: Some(temp.path().join("repos")),
                    local_path: Some(temp.path().join("data")),
                    default_branch: None,
                }),
                ..Default::default()
            };
            HostContext::new(Config::from_file(file).unwrap()).with_git(Arc::new(git))
        }

        fn main() -> BranchName {
            BranchName::new("main").unwrap()
        }

        #[tokio::test]
        async fn edit_into_git_dir_is_rejected_before_any_step() {
            let temp = TempDir::new().unwrap();
            let git = MockGit::new();
            let ctx = setup(&temp, git.clone());
            let repo = RepoId::new("alice", "notes").unwrap();

            let err = edit_file(
                &ctx,
                &repo,
                EditFileRequest {
                    old_branch: main(),
                    new_branch: main(),
                    old_path: String::new(),
                    new_path: "docs/../.git/hooks/pre-receive".into(),
                    content: "evil".into(),
                    message: CommitMessage::default(),
                    is_new_file: true,
                },
            )
            .await
            .unwrap_err();

            assert!(matches!(err, HostError::PathSecurity { .. }));
            assert!(git.calls().is_empty());
            assert!(!ctx.paths().local_copy_path(&repo).exists());
        }

        #[tokio::test]
        async fn delete_of_git_dir_is_rejected() {
            let temp = TempDir::new().unwrap();
            let git = MockGit::new();
            let ctx = setup(&temp, git.clone());
            let repo = RepoId::new("alice", "notes").unwrap();

            let err = delete_file(
                &ctx,
                &repo,
                DeleteFileRequest {
                    old_branch: main(),
                    new_branch: main(),
                    path: "sub/.GIT/config".into(),
                    message: CommitMessage::default(),
                },
            )
            .await
            .unwrap_err();

            assert!(matches!(err, HostError::PathSecurity { .. }));
            assert!(git.calls().is_empty());
        }

        #[tokio::test]
        async fn empty_path_is_invalid() {
            let temp = TempDir::new().unwrap();
            let ctx = setup(&temp, MockGit::new());
            let repo = RepoId::new("alice", "notes").unwrap();

            let err = edit_file(
                &ctx,
                &repo,
                EditFileRequest {
                    old_branch: main(),
                    new_branch: main(),
                    old_path: String::new(),
                    new_path: "/./".into(),
                    content: String::new(),
                    message: CommitMessage::default(),
                    is_new_file: true,
                },
            )
            .await
            .unwrap_err();
            assert!(matches!(err, HostError::InvalidInput(_)));
        }
    }
}
