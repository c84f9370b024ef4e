//! policy::store
//!
//! Protected-Branch Policy Store.
//!
//! # Storage
//!
//! `<repo>.git/protected_branches.json`:
//!
//! ```json
//! {"version": 1, "branches": ["main", "release"]}
//! ```
//!
//! Writes take an exclusive `fs2` lock on `<repo>.git/protected_branches.lock`,
//! re-read the current list under it, and replace the sidecar atomically
//! (temp file + rename), so concurrent writers never lose an update and the
//! hook process never reads a half-written file.
//!
//! # Invariants
//!
//! - The stored list has no duplicates and no empty entries
//! - Protecting a protected branch, or unprotecting an unprotected one,
//!   leaves the stored set unchanged
//! - Stale names (branches deleted since) stay stored until unprotected,
//!   but [`PolicyStore::read`] only reports branches that exist

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use fs2::FileExt;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::hooks::HookScript;
use super::PolicyError;
use crate::core::paths::HostPaths;
use crate::core::types::BranchName;
use crate::git::Git;

/// Current sidecar format version.
pub const POLICY_VERSION: u32 = 1;

static LEGACY_BRANCH_ARG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"--branch='([^']*)'").expect("static pattern"));

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyFile {
    version: u32,
    branches: Vec<BranchName>,
}

/// Policy of one bare repository.
#[derive(Debug, Clone)]
pub struct PolicyStore {
    repo_path: PathBuf,
}

impl PolicyStore {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    pub fn sidecar_path(&self) -> PathBuf {
        HostPaths::policy_at(&self.repo_path)
    }

    fn lock_path(&self) -> PathBuf {
        self.repo_path.join("protected_branches.lock")
    }

    /// Every stored branch name, including ones that no longer exist.
    ///
    /// Falls back to the legacy `--branch='…'` hook token when there is no
    /// sidecar, and to an empty list when there is neither.
    pub fn stored(&self) -> Result<Vec<BranchName>, PolicyError> {
        let sidecar = self.sidecar_path();
        if sidecar.exists() {
            return load_policy_file(&sidecar);
        }
        self.read_legacy()
    }

    /// Protected branches that currently exist in `git`.
    pub fn read(&self, git: &Git) -> Result<Vec<BranchName>, PolicyError> {
        Ok(self
            .stored()?
            .into_iter()
            .filter(|b| git.has_branch(b))
            .collect())
    }

    /// Protect or unprotect `branch`, then regenerate the hook script.
    ///
    /// Returns the stored list after the change.
    pub fn write(
        &self,
        branch: &BranchName,
        protect: bool,
        script: &HookScript,
    ) -> Result<Vec<BranchName>, PolicyError> {
        let lock_path = self.lock_path();
        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| PolicyError::io(&lock_path, e))?;
        lock.lock_exclusive()
            .map_err(|e| PolicyError::io(&lock_path, e))?;

        let mut branches = self.stored()?;
        let before = branches.len();
        if protect {
            if !branches.contains(branch) {
                branches.push(branch.clone());
            }
        } else {
            branches.retain(|b| b != branch);
        }
        debug!(%branch, protect, changed = before != branches.len(), "updating policy");

        self.save(&branches)?;
        script.install(&self.repo_path)?;

        // Dropping the handle would release it too; unlocking surfaces errors.
        lock.unlock().map_err(|e| PolicyError::io(&lock_path, e))?;
        info!(%branch, protect, "branch policy written");
        Ok(branches)
    }

    fn save(&self, branches: &[BranchName]) -> Result<(), PolicyError> {
        let path = self.sidecar_path();
        let file = PolicyFile {
            version: POLICY_VERSION,
            branches: branches.to_vec(),
        };
        let json = serde_json::to_vec_pretty(&file).map_err(|source| PolicyError::Json {
            path: path.clone(),
            source,
        })?;

        let mut temp = tempfile::NamedTempFile::new_in(&self.repo_path)
            .map_err(|e| PolicyError::io(&self.repo_path, e))?;
        temp.write_all(&json).map_err(|e| PolicyError::io(&path, e))?;
        temp.persist(&path)
            .map_err(|e| PolicyError::io(&path, e.error))?;
        Ok(())
    }

    fn read_legacy(&self) -> Result<Vec<BranchName>, PolicyError> {
        let hook = HostPaths::pre_receive_hook_at(&self.repo_path);
        let text = match fs::read_to_string(&hook) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PolicyError::io(&hook, e)),
        };
        // A generated delegate script with no sidecar yet protects nothing.
        if text.contains("--policy=") {
            return Ok(Vec::new());
        }
        let list = parse_legacy_hook(&text).ok_or_else(|| PolicyError::Format {
            path: hook.clone(),
            message: "no --branch='…' argument".to_string(),
        })?;
        Ok(parse_branch_list(list)?)
    }
}

/// Load a sidecar file. A missing file is an empty policy.
pub fn load_policy_file(path: &Path) -> Result<Vec<BranchName>, PolicyError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(PolicyError::io(path, e)),
    };
    let file: PolicyFile = serde_json::from_slice(&bytes).map_err(|source| PolicyError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    if file.version != POLICY_VERSION {
        return Err(PolicyError::Format {
            path: path.to_path_buf(),
            message: format!("unsupported version {}", file.version),
        });
    }
    Ok(dedup(file.branches))
}

/// Extract the raw list from a legacy `--branch='a,b'` token.
pub fn parse_legacy_hook(text: &str) -> Option<&str> {
    LEGACY_BRANCH_ARG
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Split a comma-joined list, dropping empty segments and duplicates.
pub fn parse_branch_list(list: &str) -> Result<Vec<BranchName>, PolicyError> {
    let branches = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(BranchName::new)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(dedup(branches))
}

fn dedup(branches: Vec<BranchName>) -> Vec<BranchName> {
    let mut seen = Vec::with_capacity(branches.len());
    for branch in branches {
        if !seen.contains(&branch) {
            seen.push(branch);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn branch(name: &str) -> BranchName {
        BranchName::new(name).unwrap()
    }

    fn script() -> HookScript {
        HookScript::new("/usr/bin/hostgit", "sh")
    }

    mod list {
        use super::*;

        #[test]
        fn empty_segments_and_duplicates_are_dropped() {
            let list = parse_branch_list(",main,,release, main ,").unwrap();
            assert_eq!(list, vec![branch("main"), branch("release")]);
        }

        #[test]
        fn legacy_token_is_extracted() {
            let text = "#!/usr/bin/env sh\n\"/bin/app\" serv hook --branch='main,dev' pre-receive\n";
            assert_eq!(parse_legacy_hook(text), Some("main,dev"));
            assert_eq!(parse_legacy_hook("#!/bin/sh\nexit 0\n"), None);
        }

        #[test]
        fn empty_legacy_token() {
            let text = "app hook --branch='' pre-receive";
            assert_eq!(parse_legacy_hook(text), Some(""));
            assert!(parse_branch_list("").unwrap().is_empty());
        }
    }

    mod store {
        use super::*;

        #[test]
        fn no_files_means_no_protection() {
            let temp = TempDir::new().unwrap();
            let store = PolicyStore::new(temp.path());
            assert!(store.stored().unwrap().is_empty());
        }

        #[test]
        fn protect_then_unprotect() {
            let temp = TempDir::new().unwrap();
            let store = PolicyStore::new(temp.path());

            store.write(&branch("release"), true, &script()).unwrap();
            assert_eq!(store.stored().unwrap(), vec![branch("release")]);

            store.write(&branch("release"), false, &script()).unwrap();
            assert!(store.stored().unwrap().is_empty());
        }

        #[test]
        fn writes_are_idempotent() {
            let temp = TempDir::new().unwrap();
            let store = PolicyStore::new(temp.path());

            store.write(&branch("main"), true, &script()).unwrap();
            let again = store.write(&branch("main"), true, &script()).unwrap();
            assert_eq!(again, vec![branch("main")]);

            let removed = store.write(&branch("dev"), false, &script()).unwrap();
            assert_eq!(removed, vec![branch("main")]);
        }

        #[test]
        fn write_regenerates_hook() {
            let temp = TempDir::new().unwrap();
            let store = PolicyStore::new(temp.path());

            store.write(&branch("main"), true, &script()).unwrap();

            let hook = fs::read_to_string(HostPaths::pre_receive_hook_at(temp.path())).unwrap();
            assert!(hook.contains("--policy="));
            // The regenerated hook alone must not hide the sidecar's list.
            assert_eq!(store.stored().unwrap(), vec![branch("main")]);
        }

        #[test]
        fn legacy_hook_is_read_and_migrated() {
            let temp = TempDir::new().unwrap();
            let hooks = temp.path().join("hooks");
            fs::create_dir_all(&hooks).unwrap();
            fs::write(
                hooks.join("pre-receive"),
                "#!/usr/bin/env sh\n\"/bin/app\" serv --config='x' hook --branch='main,,release' pre-receive\n",
            )
            .unwrap();
            let store = PolicyStore::new(temp.path());

            assert_eq!(store.stored().unwrap(), vec![branch("main"), branch("release")]);

            store.write(&branch("main"), false, &script()).unwrap();
            assert!(store.sidecar_path().exists());
            assert_eq!(store.stored().unwrap(), vec![branch("release")]);
        }

        #[test]
        fn foreign_hook_without_token_is_format_error() {
            let temp = TempDir::new().unwrap();
            let hooks = temp.path().join("hooks");
            fs::create_dir_all(&hooks).unwrap();
            fs::write(hooks.join("pre-receive"), "#!/bin/sh\nexit 0\n").unwrap();

            let err = PolicyStore::new(temp.path()).stored().unwrap_err();
            assert!(matches!(err, PolicyError::Format { .. }));
        }

        #[test]
        fn unknown_version_is_rejected() {
            let temp = TempDir::new().unwrap();
            let path = temp.path().join("p.json");
            fs::write(&path, r#"{"version":2,"branches":[]}"#).unwrap();
            assert!(matches!(
                load_policy_file(&path),
                Err(PolicyError::Format { .. })
            ));
        }
    }
}
