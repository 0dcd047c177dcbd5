//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`BranchName`] - Validated Git branch name
//! - [`Oid`] - Git object identifier (SHA)
//! - [`RefName`] - Validated Git reference name
//! - [`VaultPath`] - Repository-relative path to a vault file
//! - [`SessionId`] - Unique identifier for one sync cycle
//! - [`UtcTimestamp`] - RFC3339 timestamp
//! - [`Fingerprint`] - Stable hash over vault content for change detection
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use collabvault::core::types::{BranchName, Oid, RefName};
//!
//! // Valid constructions
//! let branch = BranchName::new("collab/review").unwrap();
//! let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
//! let refname = RefName::for_branch(&branch);
//!
//! // Invalid constructions fail at creation time
//! assert!(BranchName::new("invalid..name").is_err());
//! assert!(Oid::new("not-a-sha").is_err());
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
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

    #[error("invalid vault path: {0}")]
    InvalidVaultPath(String),
}

/// A validated Git branch name.
///
/// Enforces Git's branch naming rules at construction time:
///
/// - Cannot be empty
/// - Cannot start with `-` or `.`
/// - Cannot end with `/` or `.lock`
/// - Cannot contain `..`, `@{`, `//`, or control characters
/// - Cannot contain space, `~`, `^`, `:`, `\`, `?`, `*`, `[`
/// - Cannot be the single character `@`
///
/// # Example
///
/// ```
/// use collabvault::core::types::BranchName;
///
/// let name = BranchName::new("main").unwrap();
/// assert_eq!(name.as_str(), "main");
///
/// assert!(BranchName::new("bad..name").is_err());
/// assert!(BranchName::new("-leading-dash").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new branch name, validating against Git's rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Validate a branch name against Git's refname rules.
    fn validate(name: &str) -> Result<(), TypeError> {
        if name.is_empty() {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot be empty".into(),
            ));
        }

        if name == "@" {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot be '@'".into(),
            ));
        }

        if name.starts_with('-') {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot start with '-'".into(),
            ));
        }

        if name.ends_with('/') {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot end with '/'".into(),
            ));
        }

        if name.ends_with(".lock") {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot end with '.lock'".into(),
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

        const INVALID_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];
        for c in INVALID_CHARS {
            if name.contains(c) {
                return Err(TypeError::InvalidBranchName(format!(
                    "branch name cannot contain '{c}'"
                )));
            }
        }

        for c in name.chars() {
            if c.is_ascii_control() {
                return Err(TypeError::InvalidBranchName(
                    "branch name cannot contain control characters".into(),
                ));
            }
        }

        for component in name.split('/') {
            if component.is_empty() {
                continue;
            }
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

const ZERO_SHA1: &str = "0000000000000000000000000000000000000000";

/// A Git object identifier.
///
/// Accepts both SHA-1 (40 hex chars) and SHA-256 (64 hex chars) object
/// ids. Normalized to lowercase on construction.
///
/// # Example
///
/// ```
/// use collabvault::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(oid.short(7), "abc123d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new object id, validating format.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_lowercase();
        Self::validate(&oid)?;
        Ok(Self(oid))
    }

    /// The all-zeros object id, used to represent an absent object.
    pub fn zero() -> Self {
        Self(ZERO_SHA1.to_string())
    }

    /// Check if this is the all-zeros object id.
    pub fn is_zero(&self) -> bool {
        self.0.chars().all(|c| c == '0')
    }

    /// Get a shortened form of the object id.
    ///
    /// Returns the full id if `len` exceeds its length.
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }

    fn validate(oid: &str) -> Result<(), TypeError> {
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "object id must be 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }

        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(
                "object id must contain only hex characters".into(),
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
/// use collabvault::core::types::{BranchName, RefName};
///
/// let branch = BranchName::new("main").unwrap();
/// let refname = RefName::for_branch(&branch);
/// assert_eq!(refname.as_str(), "refs/heads/main");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefName(String);

impl RefName {
    /// Create a new ref name, validating against Git's rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Construct the full ref name for a branch.
    ///
    /// # Example
    ///
    /// ```
    /// use collabvault::core::types::{BranchName, RefName};
    ///
    /// let branch = BranchName::new("collab/review").unwrap();
    /// let refname = RefName::for_branch(&branch);
    /// assert_eq!(refname.as_str(), "refs/heads/collab/review");
    /// ```
    pub fn for_branch(branch: &BranchName) -> Self {
        // Safe because branch names are validated
        Self(format!("refs/heads/{}", branch.as_str()))
    }

    /// Construct the remote-tracking ref name for a branch.
    ///
    /// # Example
    ///
    /// ```
    /// use collabvault::core::types::{BranchName, RefName};
    ///
    /// let branch = BranchName::new("main").unwrap();
    /// let refname = RefName::for_remote("origin", &branch);
    /// assert_eq!(refname.as_str(), "refs/remotes/origin/main");
    /// ```
    pub fn for_remote(remote: &str, branch: &BranchName) -> Self {
        Self(format!("refs/remotes/{}/{}", remote, branch.as_str()))
    }

    /// The ref marking the last known-good synchronized state.
    ///
    /// Updated only after a sync cycle completes successfully, so it
    /// always points at a commit that was fully pulled, resolved, and
    /// pushed. Interrupted cycles leave it untouched.
    ///
    /// # Example
    ///
    /// ```
    /// use collabvault::core::types::RefName;
    ///
    /// assert_eq!(RefName::last_sync().as_str(), "refs/collab/last-sync");
    /// ```
    pub fn last_sync() -> Self {
        Self("refs/collab/last-sync".to_string())
    }

    /// The ref marking the last review-branch tip this clone pushed.
    ///
    /// Lets a later cycle tell a stale local review branch (fully
    /// pushed, then promoted and deleted remotely) apart from one
    /// holding deferred content that never reached the remote.
    pub fn last_review_push() -> Self {
        Self("refs/collab/last-review-push".to_string())
    }

    /// Strip a prefix from the ref name and return the remainder.
    ///
    /// Returns `None` if the ref doesn't start with the given prefix.
    pub fn strip_prefix(&self, prefix: &str) -> Option<&str> {
        self.0.strip_prefix(prefix)
    }

    /// Check if this ref is a branch ref.
    pub fn is_branch_ref(&self) -> bool {
        self.0.starts_with("refs/heads/")
    }

    /// Check if this ref is under the collab namespace.
    pub fn is_collab_ref(&self) -> bool {
        self.0.starts_with("refs/collab/")
    }

    /// Validate a ref name against Git's refname rules.
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

        for c in name.chars() {
            if c.is_ascii_control() {
                return Err(TypeError::InvalidRefName(
                    "ref name cannot contain control characters".into(),
                ));
            }
        }

        for component in name.split('/') {
            if component.is_empty() {
                continue;
            }
            if component.starts_with('.') {
                return Err(TypeError::InvalidRefName(
                    "path component cannot start with '.'".into(),
                ));
            }
            if component.ends_with(".lock") {
                return Err(TypeError::InvalidRefName(
                    "path component cannot end with '.lock'".into(),
                ));
            }
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

/// A repository-relative path to a file inside the vault.
///
/// Always uses forward slashes, never escapes the repository root, and
/// never points into `.git`. Classification and conflict resolution
/// operate on these paths.
///
/// # Example
///
/// ```
/// use collabvault::core::types::VaultPath;
///
/// let path = VaultPath::new("learnings/retries.md").unwrap();
/// assert_eq!(path.as_str(), "learnings/retries.md");
/// assert_eq!(path.top_level(), Some("learnings"));
///
/// assert!(VaultPath::new("../escape").is_err());
/// assert!(VaultPath::new("/absolute").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VaultPath(String);

impl VaultPath {
    /// Create a new vault path, validating shape.
    pub fn new(path: impl Into<String>) -> Result<Self, TypeError> {
        let path = path.into();
        Self::validate(&path)?;
        Ok(Self(path))
    }

    fn validate(path: &str) -> Result<(), TypeError> {
        if path.is_empty() {
            return Err(TypeError::InvalidVaultPath("path cannot be empty".into()));
        }

        if path.starts_with('/') {
            return Err(TypeError::InvalidVaultPath(
                "path must be repository-relative".into(),
            ));
        }

        if path.ends_with('/') {
            return Err(TypeError::InvalidVaultPath(
                "path cannot end with '/'".into(),
            ));
        }

        if path.contains('\\') {
            return Err(TypeError::InvalidVaultPath(
                "path must use forward slashes".into(),
            ));
        }

        if path.contains("//") {
            return Err(TypeError::InvalidVaultPath(
                "path cannot contain '//'".into(),
            ));
        }

        for c in path.chars() {
            if c.is_ascii_control() {
                return Err(TypeError::InvalidVaultPath(
                    "path cannot contain control characters".into(),
                ));
            }
        }

        for component in path.split('/') {
            if component == "." || component == ".." {
                return Err(TypeError::InvalidVaultPath(
                    "path cannot contain '.' or '..' components".into(),
                ));
            }
        }

        if path == ".git" || path.starts_with(".git/") {
            return Err(TypeError::InvalidVaultPath(
                "path cannot point into .git".into(),
            ));
        }

        Ok(())
    }

    /// The first path component, or `None` for a bare filename.
    pub fn top_level(&self) -> Option<&str> {
        let (first, _) = self.0.split_once('/')?;
        Some(first)
    }

    /// The final path component.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Get the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for VaultPath {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<VaultPath> for String {
    fn from(path: VaultPath) -> Self {
        path.0
    }
}

impl AsRef<str> for VaultPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VaultPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for one sync cycle.
///
/// Every sync cycle gets a fresh id at creation. The id names the cycle
/// in session records, log lines, and recovery directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    /// Generate a fresh session id.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Get the short prefix used in log lines and recovery paths.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A UTC timestamp in RFC3339 format.
///
/// # Example
///
/// ```
/// use collabvault::core::types::UtcTimestamp;
///
/// let now = UtcTimestamp::now();
/// println!("Current time: {}", now);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UtcTimestamp(chrono::DateTime<chrono::Utc>);

impl UtcTimestamp {
    /// Create a timestamp for the current moment.
    pub fn now() -> Self {
        Self(chrono::Utc::now())
    }

    /// Create a timestamp from a chrono DateTime.
    pub fn from_datetime(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Self(dt)
    }

    /// Parse an RFC3339 string.
    pub fn parse(s: &str) -> Result<Self, chrono::ParseError> {
        Ok(Self(
            chrono::DateTime::parse_from_rfc3339(s)?.with_timezone(&chrono::Utc),
        ))
    }

    /// Get the underlying datetime.
    pub fn as_datetime(&self) -> &chrono::DateTime<chrono::Utc> {
        &self.0
    }

    /// Elapsed time since this timestamp.
    pub fn elapsed(&self) -> chrono::Duration {
        chrono::Utc::now() - self.0
    }
}

impl std::fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

/// A stable hash over vault content for change detection.
///
/// Computed over a sorted set of (path, blob oid) pairs so the same
/// tree always produces the same fingerprint regardless of enumeration
/// order. Used to decide whether a sync cycle actually changed
/// anything.
///
/// # Example
///
/// ```
/// use collabvault::core::types::{Fingerprint, Oid, VaultPath};
///
/// let entries = vec![
///     (VaultPath::new("notes/a.md").unwrap(),
///      Oid::new("abc123def4567890abc123def4567890abc12345").unwrap()),
///     (VaultPath::new("notes/b.md").unwrap(),
///      Oid::new("def456abc7890123def456abc7890123def45678").unwrap()),
/// ];
///
/// let fp = Fingerprint::compute(&entries);
///
/// // Same entries produce the same fingerprint
/// let fp2 = Fingerprint::compute(&entries);
/// assert_eq!(fp, fp2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute a fingerprint from a set of (path, blob oid) pairs.
    ///
    /// The entries are sorted by path before hashing to ensure
    /// determinism regardless of input order.
    pub fn compute(entries: &[(VaultPath, Oid)]) -> Self {
        let mut sorted: Vec<_> = entries.iter().collect();
        sorted.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));

        let mut hasher = Sha256::new();
        for (path, oid) in sorted {
            hasher.update(path.as_str().as_bytes());
            hasher.update(b"\0");
            hasher.update(oid.as_str().as_bytes());
            hasher.update(b"\n");
        }

        let result = hasher.finalize();
        Self(hex::encode(result))
    }

    /// Get the fingerprint as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
