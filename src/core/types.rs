//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`BranchName`] - Validated Git branch name
//! - [`Oid`] - Git object identifier (SHA)
//! - [`RefName`] - Validated Git reference name
//! - [`RepoId`] - Owner/name identity of a hosted repository
//! - [`Signature`] - Name and email attributed to a commit
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use hostgit::core::types::{BranchName, Oid, RefName, RepoId};
//!
//! let branch = BranchName::new("feature/my-branch").unwrap();
//! let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
//! let refname = RefName::for_branch(&branch);
//! let repo = RepoId::new("alice", "notes").unwrap();
//!
//! assert_eq!(refname.short_name(), "feature/my-branch");
//! assert_eq!(repo.key(), "alice/notes");
//! assert!(BranchName::new("invalid..name").is_err());
//! assert!(Oid::new("not-a-sha").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid ref name: {0}")]
    InvalidRefName(String),

    #[error("invalid repository identity: {0}")]
    InvalidRepoId(String),
}

/// A validated Git branch name.
///
/// Branch names must conform to Git's refname rules (see `git check-ref-format`):
/// - Cannot be empty
/// - Cannot start with `.` or `-`
/// - Cannot end with `.lock` or `/`
/// - Cannot contain `..`, `@{`, `//`, or ASCII control characters
/// - Cannot contain spaces, `~`, `^`, `:`, `\`, `?`, `*`, `[`
/// - Cannot be exactly `@`
///
/// Commas are also rejected: protected-branch lists are comma-joined on the
/// hook command line, so a branch containing one could never be protected.
///
/// # Example
///
/// ```
/// use hostgit::core::types::BranchName;
///
/// let name = BranchName::new("feature/my-branch").unwrap();
/// assert_eq!(name.as_str(), "feature/my-branch");
///
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new(".hidden").is_err());
/// assert!(BranchName::new("a,b").is_err());
/// assert!(BranchName::new("@").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        if name.is_empty() {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot be empty".into(),
            ));
        }

        if name == "@" {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot be '@' (reserved)".into(),
            ));
        }

        if name.starts_with('.') {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot start with '.'".into(),
            ));
        }
        if name.starts_with('-') {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot start with '-'".into(),
            ));
        }

        if name.ends_with(".lock") {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot end with '.lock'".into(),
            ));
        }
        if name.ends_with('/') {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot end with '/'".into(),
            ));
        }

        if name.contains("..") {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot contain '..'".into(),
            ));
        }
        if name.contains("@{") {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot contain '@{'".into(),
            ));
        }
        if name.contains("//") {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot contain '//'".into(),
            ));
        }

        const INVALID_CHARS: [char; 10] = [' ', '~', '^', ':', '\\', '?', '*', '[', ',', '\''];
        for c in INVALID_CHARS {
            if name.contains(c) {
                return Err(TypeError::InvalidBranchName(format!(
                    "branch name cannot contain '{c}'"
                )));
            }
        }

        if name.chars().any(|c| c.is_ascii_control()) {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot contain control characters".into(),
            ));
        }

        for component in name.split('/') {
            if component.starts_with('.') {
                return Err(TypeError::InvalidBranchName(
                    "path component cannot start with '.'".into(),
                ));
            }
            if component.ends_with(".lock") {
                return Err(TypeError::InvalidBranchName(
                    "path component cannot end with '.lock'".into(),
                ));
            }
        }

        Ok(())
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The remote-tracking revision for this branch in a clone (`origin/<branch>`).
    pub fn origin_rev(&self) -> String {
        format!("origin/{}", self.0)
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A Git object identifier (SHA-1 or SHA-256).
///
/// OIDs are normalized to lowercase for consistency.
///
/// # Example
///
/// ```
/// use hostgit::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(oid.short(7), "abc123d");
///
/// let zero = Oid::zero();
/// assert!(zero.is_zero());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// The zero OID (40 zeros for SHA-1).
    const ZERO_SHA1: &'static str = "0000000000000000000000000000000000000000";

    /// Create a new validated object id.
    ///
    /// The OID is normalized to lowercase.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` if the string is not a valid hex OID.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        Self::validate(&oid)?;
        Ok(Self(oid))
    }

    /// Create the zero/null OID (40 zeros).
    ///
    /// In a pushed ref update, a zero new id means the ref is being deleted
    /// and a zero old id means it is being created.
    pub fn zero() -> Self {
        Self(Self::ZERO_SHA1.to_string())
    }

    /// Check if this is the zero/null OID.
    pub fn is_zero(&self) -> bool {
        self.0.chars().all(|c| c == '0')
    }

    /// Get an abbreviated form of the OID.
    ///
    /// Returns the first `len` characters. If `len` exceeds the OID length,
    /// returns the full OID.
    pub fn short(&self, len: usize) -> &str {
        let end = len.min(self.0.len());
        &self.0[..end]
    }

    fn validate(oid: &str) -> Result<(), TypeError> {
        // SHA-1 is 40 hex chars, SHA-256 is 64
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(
                "object id must be hexadecimal".into(),
            ));
        }
        Ok(())
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated Git reference name.
///
/// # Example
///
/// ```
/// use hostgit::core::types::{BranchName, RefName};
///
/// let branch = BranchName::new("feature/foo").unwrap();
/// let refname = RefName::for_branch(&branch);
/// assert_eq!(refname.as_str(), "refs/heads/feature/foo");
/// assert_eq!(refname.short_name(), "feature/foo");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefName(String);

impl RefName {
    /// Create a new validated ref name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRefName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Create a ref name for a branch (`refs/heads/<branch>`).
    pub fn for_branch(branch: &BranchName) -> Self {
        Self(format!("refs/heads/{}", branch.as_str()))
    }

    /// Strip a prefix from the ref name and return the remainder.
    pub fn strip_prefix(&self, prefix: &str) -> Option<&str> {
        self.0.strip_prefix(prefix)
    }

    /// Check if this ref is a branch ref.
    pub fn is_branch_ref(&self) -> bool {
        self.0.starts_with("refs/heads/")
    }

    /// The short name of the ref.
    ///
    /// Strips `refs/heads/`, `refs/tags/` or `refs/remotes/`; any other ref
    /// is returned whole.
    pub fn short_name(&self) -> &str {
        const PREFIXES: [&str; 3] = ["refs/heads/", "refs/tags/", "refs/remotes/"];
        PREFIXES
            .iter()
            .find_map(|prefix| self.0.strip_prefix(prefix))
            .unwrap_or(&self.0)
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        if name.is_empty() {
            return Err(TypeError::InvalidRefName("ref name cannot be empty".into()));
        }

        if name.starts_with('/') {
            return Err(TypeError::InvalidRefName(
                "ref name cannot start with '/'".into(),
            ));
        }

        if name.ends_with('/') {
            return Err(TypeError::InvalidRefName(
                "ref name cannot end with '/'".into(),
            ));
        }
        if name.ends_with(".lock") {
            return Err(TypeError::InvalidRefName(
                "ref name cannot end with '.lock'".into(),
            ));
        }

        if name.contains("..") {
            return Err(TypeError::InvalidRefName(
                "ref name cannot contain '..'".into(),
            ));
        }
        if name.contains("@{") {
            return Err(TypeError::InvalidRefName(
                "ref name cannot contain '@{'".into(),
            ));
        }
        if name.contains("//") {
            return Err(TypeError::InvalidRefName(
                "ref name cannot contain '//'".into(),
            ));
        }

        const INVALID_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];
        for c in INVALID_CHARS {
            if name.contains(c) {
                return Err(TypeError::InvalidRefName(format!(
                    "ref name cannot contain '{c}'"
                )));
            }
        }

        if name.chars().any(|c| c.is_ascii_control()) {
            return Err(TypeError::InvalidRefName(
                "ref name cannot contain control characters".into(),
            ));
        }

        Ok(())
    }

    /// Get the ref name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RefName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RefName> for String {
    fn from(name: RefName) -> Self {
        name.0
    }
}

impl AsRef<str> for RefName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RefName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The owner/name identity of a hosted repository.
///
/// Both components are stored lower-cased, so `Alice/Notes` and
/// `alice/notes` address the same bare repository and the same lock.
///
/// # Example
///
/// ```
/// use hostgit::core::types::RepoId;
///
/// let repo: RepoId = "Alice/Notes".parse().unwrap();
/// assert_eq!(repo.owner(), "alice");
/// assert_eq!(repo.name(), "notes");
/// assert_eq!(repo.key(), "alice/notes");
/// assert!(!repo.is_wiki());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoId {
    owner: String,
    name: String,
}

impl RepoId {
    /// Create a validated repository identity.
    pub fn new(owner: impl AsRef<str>, name: impl AsRef<str>) -> Result<Self, TypeError> {
        let owner = owner.as_ref().to_lowercase();
        let name = name.as_ref().to_lowercase();
        let name = name.strip_suffix(".git").unwrap_or(&name).to_string();
        Self::validate_component(&owner)?;
        Self::validate_component(&name)?;
        Ok(Self { owner, name })
    }

    fn validate_component(component: &str) -> Result<(), TypeError> {
        if component.is_empty() {
            return Err(TypeError::InvalidRepoId(
                "owner and name cannot be empty".into(),
            ));
        }
        if component.starts_with('.') || component.contains("..") {
            return Err(TypeError::InvalidRepoId(format!(
                "'{component}' cannot start with '.' or contain '..'"
            )));
        }
        if component
            .chars()
            .any(|c| c == '/' || c == '\\' || c == ':' || c.is_ascii_control() || c.is_whitespace())
        {
            return Err(TypeError::InvalidRepoId(format!(
                "'{component}' contains a forbidden character"
            )));
        }
        Ok(())
    }

    /// The owning user or organisation.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The repository name, without the `.git` suffix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The coordination key used by the repository lock (`owner/name`).
    pub fn key(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Whether this is the wiki companion of another repository.
    pub fn is_wiki(&self) -> bool {
        is_wiki_name(&self.name)
    }
}

/// Whether a repository name (without `.git`) names a wiki companion.
pub(crate) fn is_wiki_name(name: &str) -> bool {
    name.to_lowercase().ends_with(".wiki")
}

impl std::str::FromStr for RepoId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (owner, name) = s.split_once('/').ok_or_else(|| {
            TypeError::InvalidRepoId(format!("expected '<owner>/<name>', got '{s}'"))
        })?;
        Self::new(owner, name)
    }
}

impl std::fmt::Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// The identity attributed to a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
}

impl Signature {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Format as a `--author` value (`Name <email>`).
    pub fn author_arg(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.author_arg())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod branch_name {
        use super::*;

        #[test]
        fn valid_branch_names() {
            assert!(BranchName::new("main").is_ok());
            assert!(BranchName::new("feature/foo").is_ok());
            assert!(BranchName::new("fix-123").is_ok());
            assert!(BranchName::new("user@feature").is_ok());
            assert!(BranchName::new("with.dot").is_ok());
            assert!(BranchName::new("a/b/c/d").is_ok());
        }

        #[test]
        fn empty_name_rejected() {
            assert!(BranchName::new("").is_err());
        }

        #[test]
        fn starts_with_dot_or_dash_rejected() {
            assert!(BranchName::new(".hidden").is_err());
            assert!(BranchName::new("foo/.hidden").is_err());
            assert!(BranchName::new("-flag").is_err());
        }

        #[test]
        fn lock_suffix_rejected() {
            assert!(BranchName::new("branch.lock").is_err());
            assert!(BranchName::new("foo/bar.lock").is_err());
        }

        #[test]
        fn separators_rejected() {
            assert!(BranchName::new("bad..path").is_err());
            assert!(BranchName::new("foo//bar").is_err());
            assert!(BranchName::new("branch/").is_err());
        }

        #[test]
        fn policy_list_characters_rejected() {
            assert!(BranchName::new("a,b").is_err());
            assert!(BranchName::new("it's").is_err());
        }

        #[test]
        fn special_chars_rejected() {
            for name in ["has space", "has~tilde", "has^caret", "has:colon", "has?q", "has*s", "has[b"] {
                assert!(BranchName::new(name).is_err(), "{name} should be rejected");
            }
            assert!(BranchName::new("has\ttab").is_err());
        }

        #[test]
        fn origin_rev() {
            let name = BranchName::new("main").unwrap();
            assert_eq!(name.origin_rev(), "origin/main");
        }

        #[test]
        fn serde_roundtrip() {
            let name = BranchName::new("feature/test").unwrap();
            let json = serde_json::to_string(&name).unwrap();
            let parsed: BranchName = serde_json::from_str(&json).unwrap();
            assert_eq!(name, parsed);
        }
    }

    mod oid {
        use super::*;

        #[test]
        fn valid_sha1_and_sha256() {
            assert!(Oid::new("abc123def4567890abc123def4567890abc12345").is_ok());
            let sha256 = "abc123def4567890abc123def4567890abc123def4567890abc123def456789a";
            assert!(Oid::new(sha256).is_ok());
        }

        #[test]
        fn normalizes_to_lowercase() {
            let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
            assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
        }

        #[test]
        fn invalid_rejected() {
            assert!(Oid::new("abc").is_err());
            assert!(Oid::new("g".repeat(40)).is_err());
        }

        #[test]
        fn zero() {
            assert!(Oid::zero().is_zero());
            assert!(!Oid::new("abc123def4567890abc123def4567890abc12345")
                .unwrap()
                .is_zero());
        }
    }

    mod ref_name {
        use super::*;

        #[test]
        fn short_names() {
            assert_eq!(RefName::new("refs/heads/main").unwrap().short_name(), "main");
            assert_eq!(RefName::new("refs/tags/v1.0").unwrap().short_name(), "v1.0");
            assert_eq!(
                RefName::new("refs/remotes/origin/main").unwrap().short_name(),
                "origin/main"
            );
            assert_eq!(RefName::new("refs/notes/x").unwrap().short_name(), "refs/notes/x");
        }

        #[test]
        fn branch_ref_detection() {
            assert!(RefName::new("refs/heads/main").unwrap().is_branch_ref());
            assert!(!RefName::new("refs/tags/v1").unwrap().is_branch_ref());
        }

        #[test]
        fn invalid_rejected() {
            assert!(RefName::new("").is_err());
            assert!(RefName::new("/refs/heads/x").is_err());
            assert!(RefName::new("refs/heads/a..b").is_err());
        }
    }

    mod repo_id {
        use super::*;

        #[test]
        fn lowercases_and_strips_git_suffix() {
            let repo = RepoId::new("Alice", "Notes.git").unwrap();
            assert_eq!(repo.key(), "alice/notes");
        }

        #[test]
        fn parse_from_str() {
            let repo: RepoId = "bob/tools".parse().unwrap();
            assert_eq!(repo.owner(), "bob");
            assert_eq!(repo.name(), "tools");
            assert!("no-slash".parse::<RepoId>().is_err());
        }

        #[test]
        fn traversal_rejected() {
            assert!(RepoId::new("..", "x").is_err());
            assert!(RepoId::new("alice", "../etc").is_err());
            assert!(RepoId::new("alice", ".hidden").is_err());
            assert!(RepoId::new("", "x").is_err());
        }

        #[test]
        fn wiki_detection() {
            assert!(RepoId::new("alice", "notes.wiki").unwrap().is_wiki());
            assert!(RepoId::new("alice", "Notes.WIKI").unwrap().is_wiki());
            assert!(!RepoId::new("alice", "wiki").unwrap().is_wiki());
        }
    }

    #[test]
    fn signature_author_arg() {
        let sig = Signature::new("Alice", "alice@example.com");
        assert_eq!(sig.author_arg(), "Alice <alice@example.com>");
    }
}
