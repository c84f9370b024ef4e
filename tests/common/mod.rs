//! Shared fixture for integration tests.
//!
//! [`TestHost`] lays out a repository root and a local data directory in a
//! temp dir and points generated hooks at the built `hostgit` binary, so
//! pushes made by the engine run the real hook process.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use hostgit::core::config::{Config, HookConfig, HostConfig, IdentityConfig, RepositoryConfig};
use hostgit::core::types::RepoId;
use hostgit::engine::repo::init_repository;
use hostgit::engine::HostContext;

// =============================================================================
// Test Fixtures
// =============================================================================

pub struct TestHost {
    dir: TempDir,
    pub ctx: HostContext,
}

impl TestHost {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let ctx = HostContext::new(Config::from_file(Self::host_config(dir.path())).unwrap());
        Self { dir, ctx }
    }

    /// The configuration used by [`TestHost::new`], for writing to disk.
    pub fn host_config(root: &Path) -> HostConfig {
        HostConfig {
            repository: Some(RepositoryConfig {
                root: Some(root.join("repos")),
                local_path: Some(root.join("data")),
                default_branch: Some("main".into()),
            }),
            hook: Some(HookConfig {
                app_path: Some(assert_cmd::cargo::cargo_bin("hostgit")),
                script_type: Some("sh".into()),
            }),
            identity: Some(IdentityConfig {
                name: Some("Host Service".into()),
                email: Some("service@host.test".into()),
            }),
            ..Default::default()
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn repo_path(&self, repo: &RepoId) -> PathBuf {
        self.ctx.paths().repo_path(repo)
    }

    /// Developer work tree of `repo`.
    pub fn work_path(&self, repo: &RepoId) -> PathBuf {
        self.dir.path().join("work").join(repo.owner()).join(repo.name())
    }

    /// Create `key` through the engine and push a first commit to `main`
    /// containing `README.md`.
    pub fn create_repo(&self, key: &str) -> RepoId {
        let repo: RepoId = key.parse().unwrap();
        init_repository(&self.ctx, &repo).unwrap();

        let work = self.work_path(&repo);
        std::fs::create_dir_all(&work).unwrap();
        run_git(&work, &["init", "-b", "main"]);
        run_git(&work, &["config", "user.email", "dev@example.com"]);
        run_git(&work, &["config", "user.name", "Dev"]);
        std::fs::write(work.join("README.md"), "# Notes\n").unwrap();
        run_git(&work, &["add", "README.md"]);
        run_git(&work, &["commit", "-m", "Initial commit"]);
        self.push(&repo, "main");
        repo
    }

    /// Bare-clone `source` as `key` (a fork, without hooks of ours).
    pub fn fork(&self, source: &RepoId, key: &str) -> RepoId {
        let fork: RepoId = key.parse().unwrap();
        let dest = self.repo_path(&fork);
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        run_git(
            self.path(),
            &[
                "clone",
                "--bare",
                self.repo_path(source).to_str().unwrap(),
                dest.to_str().unwrap(),
            ],
        );
        fork
    }

    /// Commit `files` on `branch` in the developer work tree of `repo`,
    /// branching from `from` first when given.
    pub fn commit(&self, repo: &RepoId, from: Option<&str>, branch: &str, files: &[(&str, &str)]) {
        let files: Vec<(&str, &[u8])> = files.iter().map(|(p, c)| (*p, c.as_bytes())).collect();
        self.commit_raw(repo, from, branch, &files);
    }

    /// [`TestHost::commit`] with arbitrary file bytes.
    pub fn commit_raw(&self, repo: &RepoId, from: Option<&str>, branch: &str, files: &[(&str, &[u8])]) {
        let work = self.work_path(repo);
        match from {
            Some(from) => run_git(&work, &["checkout", "-B", branch, from]),
            None => run_git(&work, &["checkout", branch]),
        };
        for (path, content) in files {
            let file = work.join(path);
            std::fs::create_dir_all(file.parent().unwrap()).unwrap();
            std::fs::write(file, content).unwrap();
        }
        run_git(&work, &["add", "--all"]);
        run_git(&work, &["commit", "-m", &format!("Change on {branch}")]);
    }

    /// Push `branch` from the developer work tree of `repo` to its bare
    /// repository.
    pub fn push(&self, repo: &RepoId, branch: &str) {
        self.push_to(repo, repo, branch);
    }

    /// Push `branch` from the work tree of `source` to `target`.
    pub fn push_to(&self, source: &RepoId, target: &RepoId, branch: &str) {
        let dest = self.repo_path(target);
        run_git(
            &self.work_path(source),
            &["push", dest.to_str().unwrap(), branch],
        );
    }

    /// Raw push from the developer work tree; returns the command output.
    pub fn try_push(&self, repo: &RepoId, refspec: &str) -> std::process::Output {
        let dest = self.repo_path(repo);
        git_output(&self.work_path(repo), &["push", dest.to_str().unwrap(), refspec])
    }

    /// Run git in the developer work tree of `repo`.
    pub fn work_git(&self, repo: &RepoId, args: &[&str]) -> String {
        run_git(&self.work_path(repo), args)
    }

    /// Tip of `branch` in the bare repository.
    pub fn rev(&self, repo: &RepoId, branch: &str) -> String {
        run_git(&self.repo_path(repo), &["rev-parse", &format!("refs/heads/{branch}")])
    }

    pub fn has_branch(&self, repo: &RepoId, branch: &str) -> bool {
        git_output(
            &self.repo_path(repo),
            &["show-ref", "--verify", "--quiet", &format!("refs/heads/{branch}")],
        )
        .status
        .success()
    }

    /// Content of `path` at `branch`, or `None` if absent.
    pub fn read_file(&self, repo: &RepoId, branch: &str, path: &str) -> Option<String> {
        let out = git_output(&self.repo_path(repo), &["show", &format!("{branch}:{path}")]);
        out.status
            .success()
            .then(|| String::from_utf8_lossy(&out.stdout).into_owned())
    }

    /// Subject line of the tip commit of `branch`.
    pub fn subject(&self, repo: &RepoId, branch: &str) -> String {
        run_git(&self.repo_path(repo), &["log", "-1", "--format=%s", branch])
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn git_output(dir: &Path, args: &[&str]) -> std::process::Output {
    Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .expect("failed to run git")
}

/// Run git and return trimmed stdout, panicking on failure.
pub fn run_git(dir: &Path, args: &[&str]) -> String {
    let out = git_output(dir, args);
    assert!(
        out.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}
