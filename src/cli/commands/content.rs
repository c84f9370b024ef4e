//! Content mutation commands: branch, edit, rm, upload.
//!
//! Each prints the new tip of the branch it pushed.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context as _, Result};

use super::{block_on, parse_branch, parse_repo};
use crate::cli::CliContext;
use crate::core::types::BranchName;
use crate::engine::editor::{
    self, CommitMessage, DeleteFileRequest, EditFileRequest, UploadFilesRequest,
};
use crate::engine::{branch, upload};

/// Arguments of `hostgit edit`.
#[derive(Debug, Clone)]
pub struct EditArgs {
    pub repo: String,
    pub branch: String,
    pub new_branch: Option<String>,
    pub path: String,
    pub from_path: Option<String>,
    pub content: Option<PathBuf>,
    pub create: bool,
    pub message: String,
    pub body: String,
}

/// Create `name` from `from`.
pub fn create_branch(ctx: &CliContext, repo: &str, from: &str, name: &str) -> Result<i32> {
    let repo = parse_repo(repo)?;
    let from = parse_branch(from)?;
    let name = parse_branch(name)?;
    let host = ctx.host()?;

    let oid = block_on(branch::create_branch(&host, &repo, &from, &name))??;
    println!("{} {}", name, oid);
    Ok(0)
}

/// Create, update or rename a file.
pub fn edit(ctx: &CliContext, args: EditArgs) -> Result<i32> {
    let repo = parse_repo(&args.repo)?;
    let (old_branch, new_branch) = branches(&args.branch, args.new_branch.as_deref())?;
    let content = read_content(args.content.as_deref())?;
    let host = ctx.host()?;

    let request = EditFileRequest {
        old_branch,
        new_branch: new_branch.clone(),
        old_path: args.from_path.unwrap_or_else(|| args.path.clone()),
        new_path: args.path,
        content,
        message: CommitMessage::new(args.message, args.body),
        is_new_file: args.create,
    };
    let oid = block_on(editor::edit_file(&host, &repo, request))??;
    println!("{} {}", new_branch, oid);
    Ok(0)
}

/// Delete a file.
pub fn delete_file(
    ctx: &CliContext,
    repo: &str,
    branch: &str,
    new_branch: Option<&str>,
    path: &str,
    message: &str,
    body: &str,
) -> Result<i32> {
    let repo = parse_repo(repo)?;
    let (old_branch, new_branch) = branches(branch, new_branch)?;
    let host = ctx.host()?;

    let request = DeleteFileRequest {
        old_branch,
        new_branch: new_branch.clone(),
        path: path.to_string(),
        message: CommitMessage::new(message, body),
    };
    let oid = block_on(editor::delete_file(&host, &repo, request))??;
    println!("{} {}", new_branch, oid);
    Ok(0)
}

/// Stage local files as pending uploads, then commit them into `dir`.
#[allow(clippy::too_many_arguments)]
pub fn upload(
    ctx: &CliContext,
    repo: &str,
    branch: &str,
    new_branch: Option<&str>,
    dir: &str,
    message: &str,
    body: &str,
    files: &[PathBuf],
) -> Result<i32> {
    let repo = parse_repo(repo)?;
    let (old_branch, new_branch) = branches(branch, new_branch)?;
    let host = ctx.host()?;

    let oid = block_on(async {
        let mut uploads = Vec::with_capacity(files.len());
        for file in files {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .with_context(|| format!("'{}' has no file name", file.display()))?;
            let bytes = tokio::fs::read(file)
                .await
                .with_context(|| format!("failed to read '{}'", file.display()))?;
            uploads.push(upload::new_upload(host.paths(), &name, &bytes).await?);
        }

        let request = UploadFilesRequest {
            old_branch,
            new_branch: new_branch.clone(),
            tree_path: dir.to_string(),
            uploads,
            message: CommitMessage::new(message, body),
        };
        anyhow::Ok(editor::upload_files(&host, &repo, request).await?)
    })??;
    println!("{} {}", new_branch, oid);
    Ok(0)
}

fn branches(branch: &str, new_branch: Option<&str>) -> Result<(BranchName, BranchName)> {
    let old = parse_branch(branch)?;
    let new = match new_branch {
        Some(name) => parse_branch(name)?,
        None => old.clone(),
    };
    Ok((old, new))
}

fn read_content(path: Option<&std::path::Path>) -> Result<String> {
    match path {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read '{}'", path.display())),
        _ => {
            let mut content = String::new();
            std::io::stdin()
                .read_to_string(&mut content)
                .context("failed to read content from stdin")?;
            Ok(content)
        }
    }
}
