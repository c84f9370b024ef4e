//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--config <path>`: Use this configuration file
//! - `--debug`: Enable debug logging

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::engine::merge::MergeStyle;

/// hostgit - Git mutation and merge orchestration for a repository host
#[derive(Parser, Debug)]
#[command(name = "hostgit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (overrides $HOSTGIT_CONFIG and default locations)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Push-time hook entry point (invoked by generated hook scripts)
    #[command(
        name = "hook",
        long_about = "Push-time hook entry point.\n\n\
            Generated hook scripts re-invoke this command. It reads ref updates \
            from standard input, rejects deletions of and force pushes to \
            protected branches, and otherwise runs the repository's \
            custom_hooks/pre-receive if present.\n\n\
            The repository is taken from $GIT_DIR, or the current directory.",
        after_help = "\
EXAMPLES:
    # What a generated pre-receive script runs
    hostgit hook --policy='/srv/repos/alice/notes.git/protected_branches.json' pre-receive

    # Explicit list, as written by older hook scripts
    hostgit hook --branch='main,release' pre-receive"
    )]
    Hook {
        /// Protected-branch sidecar file
        #[arg(long, value_name = "PATH")]
        policy: Option<PathBuf>,

        /// Comma-separated protected branches
        #[arg(long, value_name = "LIST")]
        branch: Option<String>,

        #[command(subcommand)]
        kind: HookKind,
    },

    /// Create a bare repository and install its hooks
    #[command(
        name = "init",
        after_help = "\
EXAMPLES:
    hostgit init alice/notes"
    )]
    Init {
        /// Repository as <owner>/<name>
        repo: String,
    },

    /// Delete a repository and its local working copy
    #[command(name = "delete")]
    Delete {
        /// Repository as <owner>/<name>
        repo: String,
    },

    /// Point HEAD of a repository at an existing branch
    #[command(
        name = "default-branch",
        after_help = "\
EXAMPLES:
    hostgit default-branch alice/notes trunk"
    )]
    DefaultBranch {
        /// Repository as <owner>/<name>
        repo: String,
        /// Branch to make the default
        branch: String,
    },

    /// Regenerate the hook scripts of a repository
    #[command(name = "install-hooks")]
    InstallHooks {
        /// Repository as <owner>/<name>
        repo: String,
    },

    /// Protect a branch from deletion and force pushes
    #[command(
        name = "protect",
        after_help = "\
EXAMPLES:
    hostgit protect alice/notes main
    hostgit unprotect alice/notes main
    hostgit protected alice/notes"
    )]
    Protect {
        /// Repository as <owner>/<name>
        repo: String,
        /// Branch to protect
        branch: String,
    },

    /// Remove a branch's protection
    #[command(name = "unprotect")]
    Unprotect {
        /// Repository as <owner>/<name>
        repo: String,
        /// Branch to unprotect
        branch: String,
    },

    /// List protected branches that exist
    #[command(name = "protected")]
    Protected {
        /// Repository as <owner>/<name>
        repo: String,
    },

    /// Create a branch from another branch
    #[command(name = "branch")]
    Branch {
        /// Repository as <owner>/<name>
        repo: String,
        /// Existing branch
        from: String,
        /// Branch to create
        name: String,
    },

    /// Create, update or rename a file and commit it
    #[command(
        name = "edit",
        after_help = "\
EXAMPLES:
    # Update README.md on main from a local file
    hostgit edit alice/notes --branch main --path README.md --content README.md

    # Create a file on a new branch, content from stdin
    echo hi | hostgit edit alice/notes --branch main --new-branch draft --path docs/hi.txt --create

    # Rename while editing
    hostgit edit alice/notes --branch main --from-path a.txt --path b.txt --content b.txt"
    )]
    Edit {
        /// Repository as <owner>/<name>
        repo: String,
        /// Source branch
        #[arg(long)]
        branch: String,
        /// Commit to a new branch instead
        #[arg(long)]
        new_branch: Option<String>,
        /// Path in the tree after the edit
        #[arg(long)]
        path: String,
        /// Path before the edit (defaults to --path)
        #[arg(long)]
        from_path: Option<String>,
        /// Local file with the new content ('-' or absent reads stdin)
        #[arg(long, value_name = "FILE")]
        content: Option<PathBuf>,
        /// Create the file; fails if it exists
        #[arg(long)]
        create: bool,
        /// Commit summary
        #[arg(short, long, default_value = "")]
        message: String,
        /// Commit body
        #[arg(long, default_value = "")]
        body: String,
    },

    /// Delete a file and commit
    #[command(name = "rm")]
    Rm {
        /// Repository as <owner>/<name>
        repo: String,
        #[arg(long)]
        branch: String,
        #[arg(long)]
        new_branch: Option<String>,
        /// Path in the tree
        #[arg(long)]
        path: String,
        #[arg(short, long, default_value = "")]
        message: String,
        #[arg(long, default_value = "")]
        body: String,
    },

    /// Upload local files into a tree directory and commit
    #[command(name = "upload")]
    Upload {
        /// Repository as <owner>/<name>
        repo: String,
        #[arg(long)]
        branch: String,
        #[arg(long)]
        new_branch: Option<String>,
        /// Target directory in the tree (root if omitted)
        #[arg(long, default_value = "")]
        dir: String,
        #[arg(short, long, default_value = "")]
        message: String,
        #[arg(long, default_value = "")]
        body: String,
        /// Local files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Compare two branches (merge-base, commits, diff)
    #[command(
        name = "compare",
        after_help = "\
EXAMPLES:
    # Same repository
    hostgit compare alice/notes main...feature

    # Head in a fork, with the bounded diff, as JSON
    hostgit compare alice/notes main...bob:notes:feature --diff --json"
    )]
    Compare {
        /// Base repository as <owner>/<name>
        repo: String,
        /// <base>...<head>, head being <branch> or <owner>:<repo>:<branch>
        range: String,
        /// Also compute the bounded diff
        #[arg(long)]
        diff: bool,
        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Persist a pull request's patch and test whether it applies
    #[command(name = "check-mergeable")]
    CheckMergeable {
        /// Base repository as <owner>/<name>
        repo: String,
        /// <base>...<head>
        range: String,
    },

    /// Merge a pull request
    #[command(
        name = "merge",
        after_help = "\
EXAMPLES:
    hostgit merge alice/notes main...feature --author-name Bob --author-email bob@example.com
    hostgit merge alice/notes main...bob:notes:fix --style rebase --author-name Bob --author-email bob@example.com"
    )]
    Merge {
        /// Base repository as <owner>/<name>
        repo: String,
        /// <base>...<head>
        range: String,
        /// Merge style
        #[arg(long, value_enum, default_value_t = StyleArg::Regular)]
        style: StyleArg,
        /// Merge commit author name
        #[arg(long)]
        author_name: String,
        /// Merge commit author email
        #[arg(long)]
        author_email: String,
        /// Extended message of a regular merge commit
        #[arg(long, default_value = "")]
        description: String,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        after_help = "\
EXAMPLES:
    hostgit completion bash > /etc/bash_completion.d/hostgit
    hostgit completion zsh > \"${fpath[1]}/_hostgit\""
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Hook kinds handled by `hostgit hook`.
#[derive(Subcommand, Debug, Clone, Copy)]
pub enum HookKind {
    /// Runs before refs are updated
    #[command(name = "pre-receive")]
    PreReceive,
}

/// Merge style argument.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleArg {
    Regular,
    Rebase,
}

impl From<StyleArg> for MergeStyle {
    fn from(style: StyleArg) -> Self {
        match style {
            StyleArg::Regular => MergeStyle::Regular,
            StyleArg::Rebase => MergeStyle::Rebase,
        }
    }
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
