//! manifest::schema
//!
//! Vault manifest schema types.
//!
//! The manifest is shared vault content: it travels through the same
//! sync machinery as every other file, so edits to it are ordinary
//! commits that teammates receive on their next cycle.
//!
//! # Validation
//!
//! Manifest values are validated after parsing and before every save:
//! membership must be non-empty with at least one master, identities
//! must be unique, and sync patterns must be valid globs.

use serde::{Deserialize, Serialize};

use super::ManifestError;
use crate::core::types::{BranchName, UtcTimestamp};

/// The manifest schema version this build reads and writes.
pub const MANIFEST_VERSION: u32 = 1;

/// Default sync interval seeded by `collab init`.
pub const DEFAULT_INTERVAL_MINUTES: u32 = 60;

/// A member's role in the vault.
///
/// Masters administer membership and approve review requests;
/// collaborators contribute content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Can administer membership and merge review requests.
    Master,
    /// Can contribute content and trigger syncs.
    Collaborator,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Master => write!(f, "master"),
            Role::Collaborator => write!(f, "collaborator"),
        }
    }
}

/// One vault member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Member {
    /// Stable identity, usually an email address.
    pub identity: String,
    /// The member's role.
    pub role: Role,
    /// When the member joined.
    pub joined_at: UtcTimestamp,
}

impl Member {
    /// Validate the member record.
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::InvalidValue` if the identity is empty
    /// or contains whitespace or control characters.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.identity.is_empty() {
            return Err(ManifestError::InvalidValue(
                "member identity cannot be empty".to_string(),
            ));
        }

        if self
            .identity
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(ManifestError::InvalidValue(format!(
                "member identity '{}' contains whitespace or control characters",
                self.identity
            )));
        }

        Ok(())
    }
}

/// Sync policy for the vault.
///
/// # Example
///
/// ```yaml
/// interval_minutes: 15
/// remote: origin
/// base_branch: main
/// auto_merge_patterns:
///   - "drafts/**"
/// review_required_patterns:
///   - "schema/**"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncPolicy {
    /// Minutes between background sync cycles. Zero disables
    /// background syncing; manual `collab sync` still works.
    pub interval_minutes: u32,

    /// Remote name (usually "origin").
    pub remote: String,

    /// The branch sync cycles pull from and push to.
    pub base_branch: BranchName,

    /// Globs for files whose conflicts merge without review.
    #[serde(default)]
    pub auto_merge_patterns: Vec<String>,

    /// Globs for files whose conflicts always go to review.
    #[serde(default)]
    pub review_required_patterns: Vec<String>,
}

impl SyncPolicy {
    /// Validate the policy values.
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::InvalidValue` if the remote is empty
    /// or a pattern is not a valid glob.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.remote.is_empty() {
            return Err(ManifestError::InvalidValue(
                "remote cannot be empty".to_string(),
            ));
        }

        for pattern in self
            .auto_merge_patterns
            .iter()
            .chain(self.review_required_patterns.iter())
        {
            glob::Pattern::new(pattern).map_err(|e| {
                ManifestError::InvalidValue(format!("invalid glob pattern '{}': {}", pattern, e))
            })?;
        }

        Ok(())
    }
}

/// The vault manifest.
///
/// # Example
///
/// ```yaml
/// version: 1
/// vault: team-docs
/// members:
///   - identity: ada@example.com
///     role: master
///     joined_at: 2026-01-15T10:00:00Z
/// sync:
///   interval_minutes: 15
///   remote: origin
///   base_branch: main
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Schema version.
    pub version: u32,
    /// Vault identifier, chosen at init. Names the vault in review
    /// requests and log lines; never interpreted.
    pub vault: String,
    /// Vault membership. Never empty; always holds at least one master.
    pub members: Vec<Member>,
    /// Sync policy.
    pub sync: SyncPolicy,
}

impl Manifest {
    /// Create a fresh manifest with a single master member.
    ///
    /// Used by `collab init`. The base branch comes from the branch
    /// the repository is on at init time.
    pub fn bootstrap(vault: &str, identity: &str, remote: &str, base_branch: BranchName) -> Self {
        Self {
            version: MANIFEST_VERSION,
            vault: vault.to_string(),
            members: vec![Member {
                identity: identity.to_string(),
                role: Role::Master,
                joined_at: UtcTimestamp::now(),
            }],
            sync: SyncPolicy {
                interval_minutes: DEFAULT_INTERVAL_MINUTES,
                remote: remote.to_string(),
                base_branch,
                auto_merge_patterns: vec![],
                review_required_patterns: vec![],
            },
        }
    }

    /// Validate the whole manifest.
    ///
    /// # Errors
    ///
    /// - `ManifestError::UnsupportedVersion` for versions this build
    ///   doesn't understand
    /// - `ManifestError::InvalidValue` for empty membership, duplicate
    ///   identities, missing master, or invalid policy values
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.version != MANIFEST_VERSION {
            return Err(ManifestError::UnsupportedVersion {
                found: self.version,
                supported: MANIFEST_VERSION,
            });
        }

        if self.vault.is_empty() {
            return Err(ManifestError::InvalidValue(
                "vault identifier cannot be empty".to_string(),
            ));
        }

        if self.members.is_empty() {
            return Err(ManifestError::InvalidValue(
                "manifest must have at least one member".to_string(),
            ));
        }

        for member in &self.members {
            member.validate()?;
        }

        let mut identities: Vec<&str> = self.members.iter().map(|m| m.identity.as_str()).collect();
        identities.sort_unstable();
        for pair in identities.windows(2) {
            if pair[0] == pair[1] {
                return Err(ManifestError::InvalidValue(format!(
                    "duplicate member identity '{}'",
                    pair[0]
                )));
            }
        }

        if self.master_count() == 0 {
            return Err(ManifestError::InvalidValue(
                "manifest must have at least one master".to_string(),
            ));
        }

        self.sync.validate()
    }

    /// Look up a member by identity.
    pub fn member(&self, identity: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.identity == identity)
    }

    /// Check whether an identity is a member.
    pub fn is_member(&self, identity: &str) -> bool {
        self.member(identity).is_some()
    }

    /// Count members with the master role.
    pub fn master_count(&self) -> usize {
        self.members
            .iter()
            .filter(|m| m.role == Role::Master)
            .count()
    }

    /// Add a member.
    ///
    /// # Errors
    ///
    /// - `ManifestError::DuplicateMember` if the identity is already a member
    /// - `ManifestError::InvalidValue` if the member record is invalid
    pub fn add_member(&mut self, member: Member) -> Result<(), ManifestError> {
        member.validate()?;

        if self.is_member(&member.identity) {
            return Err(ManifestError::DuplicateMember {
                identity: member.identity,
            });
        }

        self.members.push(member);
        Ok(())
    }

    /// Remove a member by identity.
    ///
    /// Refuses to remove the last remaining master; the membership
    /// invariant (at least one master) must survive every mutation.
    ///
    /// # Errors
    ///
    /// - `ManifestError::UnknownMember` if the identity is not a member
    /// - `ManifestError::LastMaster` if removal would leave no master
    pub fn remove_member(&mut self, identity: &str) -> Result<Member, ManifestError> {
        let index = self
            .members
            .iter()
            .position(|m| m.identity == identity)
            .ok_or_else(|| ManifestError::UnknownMember {
                identity: identity.to_string(),
            })?;

        if self.members[index].role == Role::Master && self.master_count() == 1 {
            return Err(ManifestError::LastMaster {
                identity: identity.to_string(),
            });
        }

        Ok(self.members.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_manifest() -> Manifest {
        Manifest::bootstrap(
            "team-docs",
            "ada@example.com",
            "origin",
            BranchName::new("main").unwrap(),
        )
    }

    mod role {
        use super::*;

        #[test]
        fn serializes_lowercase() {
            assert_eq!(serde_yaml::to_string(&Role::Master).unwrap().trim(), "master");
            assert_eq!(
                serde_yaml::to_string(&Role::Collaborator).unwrap().trim(),
                "collaborator"
            );
        }

        #[test]
        fn display() {
            assert_eq!(Role::Master.to_string(), "master");
            assert_eq!(Role::Collaborator.to_string(), "collaborator");
        }
    }

    mod validation {
        use super::*;

        #[test]
        fn bootstrap_is_valid() {
            assert!(sample_manifest().validate().is_ok());
        }

        #[test]
        fn rejects_unsupported_version() {
            let mut manifest = sample_manifest();
            manifest.version = 99;
            assert!(matches!(
                manifest.validate(),
                Err(ManifestError::UnsupportedVersion { found: 99, .. })
            ));
        }

        #[test]
        fn rejects_empty_vault_identifier() {
            let mut manifest = sample_manifest();
            manifest.vault = String::new();
            assert!(matches!(
                manifest.validate(),
                Err(ManifestError::InvalidValue(_))
            ));
        }

        #[test]
        fn rejects_empty_membership() {
            let mut manifest = sample_manifest();
            manifest.members.clear();
            assert!(matches!(
                manifest.validate(),
                Err(ManifestError::InvalidValue(_))
            ));
        }

        #[test]
        fn rejects_manifest_without_master() {
            let mut manifest = sample_manifest();
            manifest.members[0].role = Role::Collaborator;
            assert!(matches!(
                manifest.validate(),
                Err(ManifestError::InvalidValue(_))
            ));
        }

        #[test]
        fn rejects_duplicate_identities() {
            let mut manifest = sample_manifest();
            let dup = manifest.members[0].clone();
            manifest.members.push(dup);
            let err = manifest.validate().unwrap_err();
            assert!(err.to_string().contains("duplicate"));
        }

        #[test]
        fn rejects_empty_identity() {
            let member = Member {
                identity: String::new(),
                role: Role::Collaborator,
                joined_at: UtcTimestamp::now(),
            };
            assert!(member.validate().is_err());
        }

        #[test]
        fn rejects_whitespace_in_identity() {
            let member = Member {
                identity: "ada lovelace".to_string(),
                role: Role::Collaborator,
                joined_at: UtcTimestamp::now(),
            };
            assert!(member.validate().is_err());
        }

        #[test]
        fn zero_interval_is_valid_and_means_disabled() {
            let mut manifest = sample_manifest();
            manifest.sync.interval_minutes = 0;
            assert!(manifest.validate().is_ok());
        }

        #[test]
        fn rejects_empty_remote() {
            let mut manifest = sample_manifest();
            manifest.sync.remote = String::new();
            assert!(manifest.validate().is_err());
        }

        #[test]
        fn rejects_invalid_glob() {
            let mut manifest = sample_manifest();
            manifest
                .sync
                .auto_merge_patterns
                .push("[unclosed".to_string());
            let err = manifest.validate().unwrap_err();
            assert!(err.to_string().contains("glob"));
        }

        #[test]
        fn accepts_valid_globs() {
            let mut manifest = sample_manifest();
            manifest.sync.auto_merge_patterns.push("drafts/**".to_string());
            manifest
                .sync
                .review_required_patterns
                .push("schema/*.yaml".to_string());
            assert!(manifest.validate().is_ok());
        }
    }

    mod membership {
        use super::*;

        fn collaborator(identity: &str) -> Member {
            Member {
                identity: identity.to_string(),
                role: Role::Collaborator,
                joined_at: UtcTimestamp::now(),
            }
        }

        #[test]
        fn add_member_appends() {
            let mut manifest = sample_manifest();
            manifest.add_member(collaborator("grace@example.com")).unwrap();
            assert_eq!(manifest.members.len(), 2);
            assert!(manifest.is_member("grace@example.com"));
        }

        #[test]
        fn add_duplicate_fails() {
            let mut manifest = sample_manifest();
            let err = manifest
                .add_member(collaborator("ada@example.com"))
                .unwrap_err();
            assert!(matches!(err, ManifestError::DuplicateMember { .. }));
            assert_eq!(manifest.members.len(), 1);
        }

        #[test]
        fn remove_member_returns_record() {
            let mut manifest = sample_manifest();
            manifest.add_member(collaborator("grace@example.com")).unwrap();

            let removed = manifest.remove_member("grace@example.com").unwrap();
            assert_eq!(removed.identity, "grace@example.com");
            assert!(!manifest.is_member("grace@example.com"));
        }

        #[test]
        fn remove_unknown_fails() {
            let mut manifest = sample_manifest();
            let err = manifest.remove_member("nobody@example.com").unwrap_err();
            assert!(matches!(err, ManifestError::UnknownMember { .. }));
        }

        #[test]
        fn remove_last_master_fails() {
            let mut manifest = sample_manifest();
            manifest.add_member(collaborator("grace@example.com")).unwrap();

            let err = manifest.remove_member("ada@example.com").unwrap_err();
            assert!(matches!(err, ManifestError::LastMaster { .. }));
            // The manifest is untouched on failure
            assert!(manifest.is_member("ada@example.com"));
            assert_eq!(manifest.members.len(), 2);
        }

        #[test]
        fn remove_master_with_another_present_succeeds() {
            let mut manifest = sample_manifest();
            manifest
                .add_member(Member {
                    identity: "grace@example.com".to_string(),
                    role: Role::Master,
                    joined_at: UtcTimestamp::now(),
                })
                .unwrap();

            manifest.remove_member("ada@example.com").unwrap();
            assert_eq!(manifest.master_count(), 1);
            assert!(manifest.validate().is_ok());
        }
    }
}
