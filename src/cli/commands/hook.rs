//! hook command - Push-time hook entry point
//!
//! Invoked by the generated `pre-receive` script inside the bare repository.
//! Loads no configuration: everything it needs is on the command line or in
//! the repository.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};

use super::block_on;
use crate::cli::args::HookKind;
use crate::core::config::Config;
use crate::git::GitCli;
use crate::hook::{self, HookOutcome, PreReceiveOptions};

/// Run a hook and return its exit code.
pub fn hook(kind: HookKind, policy: Option<&Path>, branches: Option<&str>) -> Result<i32> {
    match kind {
        HookKind::PreReceive => pre_receive(policy, branches),
    }
}

fn pre_receive(policy: Option<&Path>, branches: Option<&str>) -> Result<i32> {
    let repo_path = repo_path()?;
    let options = PreReceiveOptions::from_args(&repo_path, policy, branches)?;

    let mut input = Vec::new();
    std::io::stdin()
        .read_to_end(&mut input)
        .context("failed to read ref updates from stdin")?;

    let git = GitCli::new(Config::default().service_identity());
    let outcome = block_on(hook::run(&git, &options, &input))??;
    if let HookOutcome::Rejected(message) = &outcome {
        eprintln!("{}", message);
    }
    Ok(outcome.exit_code())
}

/// The repository the toolchain runs the hook in.
fn repo_path() -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    let path = match std::env::var_os("GIT_DIR") {
        Some(dir) => cwd.join(dir),
        None => cwd,
    };
    std::fs::canonicalize(&path)
        .with_context(|| format!("repository path '{}' is not accessible", path.display()))
}
