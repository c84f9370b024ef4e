//! core::treepath
//!
//! Tree path hygiene for content mutations.
//!
//! Every path a caller supplies for an edit, delete or upload is cleaned
//! lexically before it touches the filesystem. Cleaning is anchored at the
//! tree root, so `..` can never climb out of the working copy.
//!
//! # Invariants
//!
//! - A [`TreePath`] never starts or ends with `/` and never contains
//!   empty, `.` or `..` segments.
//! - [`is_repository_git_path`] is checked against the *cleaned* path, so
//!   `docs/../.git/config` is caught the same way as `.git/config`.
//!
//! # Example
//!
//! ```
//! use hostgit::core::treepath::{is_repository_git_path, TreePath};
//!
//! let path = TreePath::new("/docs/./guide/../intro.md");
//! assert_eq!(path.as_str(), "docs/intro.md");
//! assert_eq!(path.parent(), Some("docs"));
//! assert_eq!(path.file_name(), "intro.md");
//!
//! assert!(is_repository_git_path(".git/hooks/pre-receive"));
//! assert!(is_repository_git_path("sub/.GIT"));
//! assert!(!is_repository_git_path("src/.gitignore"));
//! ```

use serde::{Deserialize, Serialize};

/// Report whether a path resolves into a repository's metadata directory.
///
/// The comparison is case-insensitive and covers both path separators as
/// well as the trailing-dot spelling that some filesystems normalise away.
pub fn is_repository_git_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    lower.ends_with(".git")
        || lower.contains(".git/")
        || lower.contains(".git\\")
        || lower.ends_with(".git.")
        || lower.contains(".git./")
        || lower.contains(".git.\\")
}

/// Lexically clean a slash-separated path, anchored at the root.
///
/// Empty and `.` segments are dropped and `..` pops the previous segment
/// (or is dropped at the root). The result has no leading or trailing `/`.
pub fn clean(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Whether an uploaded file's name is safe to place inside a tree directory.
///
/// Names that are empty, absolute, contain a `..` segment or a separator,
/// or resolve into repository metadata are rejected.
pub fn is_safe_upload_name(name: &str) -> bool {
    if name.is_empty() || name == "." || name == ".." {
        return false;
    }
    if name.starts_with('/') || name.starts_with('\\') {
        return false;
    }
    if name.split(['/', '\\']).any(|segment| segment == "..") {
        return false;
    }
    if name.contains('/') || name.contains('\\') {
        return false;
    }
    !is_repository_git_path(name)
}

/// A cleaned, root-relative path inside a repository tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TreePath(String);

impl TreePath {
    pub fn new(raw: &str) -> Self {
        Self(clean(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The tree root is represented by the empty path.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_git_path(&self) -> bool {
        is_repository_git_path(&self.0)
    }

    /// Path segments from the root downwards.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Parent directory, or `None` for a top-level entry or the root.
    pub fn parent(&self) -> Option<&str> {
        self.0.rsplit_once('/').map(|(parent, _)| parent)
    }

    /// Final segment.
    pub fn file_name(&self) -> &str {
        self.0.rsplit_once('/').map_or(self.0.as_str(), |(_, name)| name)
    }

    /// Append a single child name.
    pub fn join(&self, name: &str) -> Self {
        if self.is_root() {
            Self::new(name)
        } else {
            Self::new(&format!("{}/{}", self.0, name))
        }
    }
}

impl From<String> for TreePath {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<TreePath> for String {
    fn from(path: TreePath) -> Self {
        path.0
    }
}

impl AsRef<str> for TreePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TreePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
