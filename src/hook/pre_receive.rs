//! hook::pre_receive
//!
//! Protected-branch enforcement for one push.
//!
//! # Rules
//!
//! For each updated `refs/heads/<b>` with `<b>` protected:
//!
//! - new id all zeros: rejected, "protected from deletion"
//! - old id not all zeros and some commit reachable from old is not
//!   reachable from new: rejected, "protected from force push"
//!
//! Creating a protected branch and fast-forwarding it are allowed. When no
//! rule rejects, `custom_hooks/pre-receive` runs (if present) with the
//! original input replayed; its exit code is the outcome.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::HookError;
use crate::core::paths::HostPaths;
use crate::core::types::{is_wiki_name, BranchName, Oid, RefName};
use crate::git::GitOps;
use crate::policy::load_policy_file;
use crate::policy::store::parse_branch_list;

/// One `<old> <new> <ref>` line of pre-receive input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefUpdate {
    pub old: Oid,
    pub new: Oid,
    pub refname: RefName,
}

impl RefUpdate {
    pub fn is_delete(&self) -> bool {
        self.new.is_zero()
    }

    pub fn is_create(&self) -> bool {
        self.old.is_zero()
    }

    /// Branch name for `refs/heads/*` updates.
    pub fn branch(&self) -> Option<BranchName> {
        self.refname
            .strip_prefix("refs/heads/")
            .and_then(|name| BranchName::new(name).ok())
    }
}

/// Parse pre-receive input. Blank lines are ignored.
pub fn parse_updates(input: &str) -> Result<Vec<RefUpdate>, HookError> {
    let mut updates = Vec::new();
    for (idx, line) in input.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [old, new, refname] = fields.as_slice() else {
            return Err(HookError::Input {
                line: line_no,
                message: format!("expected 3 fields, got {}", fields.len()),
            });
        };
        let invalid = |e: crate::core::types::TypeError| HookError::Input {
            line: line_no,
            message: e.to_string(),
        };
        updates.push(RefUpdate {
            old: Oid::new(*old).map_err(invalid)?,
            new: Oid::new(*new).map_err(invalid)?,
            refname: RefName::new(*refname).map_err(invalid)?,
        });
    }
    Ok(updates)
}

/// Startup parameters of the hook process.
#[derive(Debug, Clone)]
pub struct PreReceiveOptions {
    /// The bare repository being pushed to.
    pub repo_path: PathBuf,
    pub protected: Vec<BranchName>,
}

impl PreReceiveOptions {
    /// Combine the sidecar named by `--policy` with an explicit `--branch`
    /// list.
    pub fn from_args(
        repo_path: impl Into<PathBuf>,
        policy: Option<&Path>,
        branches: Option<&str>,
    ) -> Result<Self, HookError> {
        let mut protected = match policy {
            Some(path) => load_policy_file(path)?,
            None => Vec::new(),
        };
        if let Some(list) = branches {
            for branch in parse_branch_list(list)? {
                if !protected.contains(&branch) {
                    protected.push(branch);
                }
            }
        }
        Ok(Self {
            repo_path: repo_path.into(),
            protected,
        })
    }

    fn is_wiki(&self) -> bool {
        self.repo_path
            .file_name()
            .map(|name| {
                let name = name.to_string_lossy().to_lowercase();
                is_wiki_name(name.strip_suffix(".git").unwrap_or(&name))
            })
            .unwrap_or(false)
    }
}

/// Final result of the hook process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// No rule rejected and there is no custom hook.
    Accepted,
    /// A protection rule rejected the push.
    Rejected(String),
    /// The custom hook ran and exited with this code.
    Delegated(i32),
}

impl HookOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            HookOutcome::Accepted => 0,
            HookOutcome::Rejected(_) => 1,
            HookOutcome::Delegated(code) => *code,
        }
    }
}

/// Apply the protection rules. Returns the rejection message, if any.
pub async fn evaluate(
    git: &dyn GitOps,
    repo_path: &Path,
    protected: &[BranchName],
    updates: &[RefUpdate],
) -> Result<Option<String>, HookError> {
    for update in updates {
        let Some(branch) = update.branch() else {
            continue;
        };
        if !protected.contains(&branch) {
            continue;
        }
        if update.is_delete() {
            return Ok(Some(format!("branch '{}' is protected from deletion", branch)));
        }
        if !update.is_create()
            && git
                .has_commits_not_in(repo_path, &update.old, &update.new)
                .await?
        {
            return Ok(Some(format!("branch '{}' is protected from force push", branch)));
        }
        debug!(%branch, "protected branch update allowed");
    }
    Ok(None)
}

/// Run the hook for one push.
#[instrument(skip(git, options, input), fields(repo = %options.repo_path.display()))]
pub async fn run(
    git: &dyn GitOps,
    options: &PreReceiveOptions,
    input: &[u8],
) -> Result<HookOutcome, HookError> {
    let updates = parse_updates(&String::from_utf8_lossy(input))?;

    if options.is_wiki() {
        debug!("wiki repository, skipping branch protection");
    } else if let Some(message) =
        evaluate(git, &options.repo_path, &options.protected, &updates).await?
    {
        debug!(%message, "push rejected");
        return Ok(HookOutcome::Rejected(message));
    }

    match run_custom_hook(&options.repo_path, input).await? {
        Some(code) => Ok(HookOutcome::Delegated(code)),
        None => Ok(HookOutcome::Accepted),
    }
}

/// Run `custom_hooks/pre-receive` if it exists, replaying `input`.
async fn run_custom_hook(repo_path: &Path, input: &[u8]) -> Result<Option<i32>, HookError> {
    let path = HostPaths::custom_hook_at(repo_path);
    if !path.is_file() {
        return Ok(None);
    }
    let spawn_error = |source| HookError::CustomHook {
        path: path.clone(),
        source,
    };

    debug!(hook = %path.display(), "delegating to custom hook");
    let mut child = Command::new(&path)
        .current_dir(repo_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(spawn_error)?;

    if let Some(mut stdin) = child.stdin.take() {
        match stdin.write_all(input).await {
            // The hook may exit without reading its input.
            Err(e) if e.kind() != ErrorKind::BrokenPipe => return Err(spawn_error(e)),
            _ => {}
        }
    }
    let status = child.wait().await.map_err(spawn_error)?;
    Ok(Some(status.code().unwrap_or(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::mock::MockGit;
    use crate::git::Stage;

    const OLD: &str = "1111111111111111111111111111111111111111";
    const NEW: &str = "2222222222222222222222222222222222222222";
    const ZERO: &str = "0000000000000000000000000000000000000000";

    fn update(old: &str, new: &str, refname: &str) -> RefUpdate {
        RefUpdate {
            old: Oid::new(old).unwrap(),
            new: Oid::new(new).unwrap(),
            refname: RefName::new(refname).unwrap(),
        }
    }

    fn protected() -> Vec<BranchName> {
        vec![BranchName::new("main").unwrap()]
    }

    mod parsing {
        use super::*;

        #[test]
        fn parses_lines_and_skips_blanks() {
            let input = format!("{OLD} {NEW} refs/heads/main\n\n{ZERO} {NEW} refs/tags/v1\n");
            let updates = parse_updates(&input).unwrap();
            assert_eq!(updates.len(), 2);
            assert_eq!(updates[0].branch().unwrap().as_str(), "main");
            assert!(updates[1].branch().is_none());
            assert!(updates[1].is_create());
        }

        #[test]
        fn reports_bad_line_number() {
            let input = format!("{OLD} {NEW} refs/heads/main\n{OLD} refs/heads/dev\n");
            let err = parse_updates(&input).unwrap_err();
            assert!(matches!(err, HookError::Input { line: 2, .. }));
        }
    }

    mod rules {
        use super::*;
        use std::path::Path;

        #[tokio::test]
        async fn deletion_of_protected_branch_is_rejected() {
            let git = MockGit::new();
            let msg = evaluate(&git, Path::new("/r.git"), &protected(), &[update(OLD, ZERO, "refs/heads/main")])
                .await
                .unwrap();
            assert_eq!(msg.as_deref(), Some("branch 'main' is protected from deletion"));
            assert!(git.calls().is_empty());
        }

        #[tokio::test]
        async fn force_push_is_rejected() {
            let git = MockGit::new().with_unreachable_commits(true);
            let msg = evaluate(&git, Path::new("/r.git"), &protected(), &[update(OLD, NEW, "refs/heads/main")])
                .await
                .unwrap();
            assert_eq!(msg.as_deref(), Some("branch 'main' is protected from force push"));
            let calls = git.calls();
            assert_eq!(calls[0].stage, Stage::RevList);
            assert_eq!(calls[0].args, vec![OLD, NEW]);
        }

        #[tokio::test]
        async fn fast_forward_is_allowed() {
            let git = MockGit::new().with_unreachable_commits(false);
            let msg = evaluate(&git, Path::new("/r.git"), &protected(), &[update(OLD, NEW, "refs/heads/main")])
                .await
                .unwrap();
            assert!(msg.is_none());
        }

        #[tokio::test]
        async fn unprotected_refs_and_creation_skip_the_toolchain() {
            let git = MockGit::new().with_unreachable_commits(true);
            let updates = [
                update(OLD, ZERO, "refs/heads/dev"),
                update(OLD, NEW, "refs/tags/main"),
                update(ZERO, NEW, "refs/heads/main"),
            ];
            let msg = evaluate(&git, Path::new("/r.git"), &protected(), &updates)
                .await
                .unwrap();
            assert!(msg.is_none());
            assert!(git.calls().is_empty());
        }
    }

    mod process {
        use super::*;
        use tempfile::TempDir;

        #[tokio::test]
        async fn wiki_repositories_are_exempt() {
            let temp = TempDir::new().unwrap();
            let repo = temp.path().join("notes.wiki.git");
            std::fs::create_dir_all(&repo).unwrap();
            let options = PreReceiveOptions {
                repo_path: repo,
                protected: protected(),
            };
            let input = format!("{OLD} {ZERO} refs/heads/main\n");

            let outcome = run(&MockGit::new(), &options, input.as_bytes()).await.unwrap();
            assert_eq!(outcome, HookOutcome::Accepted);
        }

        #[test]
        fn wiki_check_matches_repository_names() {
            let options = |path: &str| PreReceiveOptions {
                repo_path: PathBuf::from(path),
                protected: protected(),
            };
            assert!(options("/srv/repos/alice/notes.wiki.git").is_wiki());
            assert!(options("/srv/repos/alice/Notes.Wiki.GIT").is_wiki());
            assert!(!options("/srv/repos/alice/notes.git").is_wiki());
            assert!(!options("/srv/repos/alice/wiki.git").is_wiki());
        }

        #[tokio::test]
        async fn rejection_exit_code() {
            let temp = TempDir::new().unwrap();
            let options = PreReceiveOptions {
                repo_path: temp.path().join("notes.git"),
                protected: protected(),
            };
            let input = format!("{OLD} {ZERO} refs/heads/main\n");

            let outcome = run(&MockGit::new(), &options, input.as_bytes()).await.unwrap();
            assert_eq!(outcome.exit_code(), 1);
        }

        #[cfg(unix)]
        #[tokio::test]
        async fn custom_hook_sees_input_and_decides() {
            use std::os::unix::fs::PermissionsExt;

            let temp = TempDir::new().unwrap();
            let repo = temp.path().join("notes.git");
            let hook = HostPaths::custom_hook_at(&repo);
            std::fs::create_dir_all(hook.parent().unwrap()).unwrap();
            let seen = temp.path().join("seen");
            std::fs::write(
                &hook,
                format!("#!/bin/sh\ncat > '{}'\nexit 3\n", seen.display()),
            )
            .unwrap();
            std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755)).unwrap();

            let options = PreReceiveOptions {
                repo_path: repo,
                protected: Vec::new(),
            };
            let input = format!("{OLD} {NEW} refs/heads/main\n");

            let outcome = run(&MockGit::new(), &options, input.as_bytes()).await.unwrap();
            assert_eq!(outcome, HookOutcome::Delegated(3));
            assert_eq!(std::fs::read_to_string(&seen).unwrap(), input);
        }

        #[test]
        fn options_merge_policy_file_and_explicit_list() {
            let temp = TempDir::new().unwrap();
            let policy = temp.path().join("protected_branches.json");
            std::fs::write(&policy, r#"{"version":1,"branches":["main"]}"#).unwrap();

            let options =
                PreReceiveOptions::from_args(temp.path(), Some(&policy), Some("release,main")).unwrap();
            let names: Vec<_> = options.protected.iter().map(|b| b.as_str()).collect();
            assert_eq!(names, vec!["main", "release"]);
        }
    }
}
