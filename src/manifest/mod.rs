//! manifest
//!
//! The vault manifest: membership, roles, and sync policy.
//!
//! # Location
//!
//! The manifest lives at the vault root as `.collab.yaml` and is
//! ordinary tracked content. Every member sees the same manifest at
//! the same commit, and manifest edits flow through sync like any
//! other file.
//!
//! # Format
//!
//! ```yaml
//! version: 1
//! vault: team-docs
//! members:
//!   - identity: ada@example.com
//!     role: master
//!     joined_at: 2026-01-15T10:00:00Z
//!   - identity: grace@example.com
//!     role: collaborator
//!     joined_at: 2026-02-03T09:30:00Z
//! sync:
//!   interval_minutes: 60
//!   remote: origin
//!   base_branch: main
//!   auto_merge_patterns:
//!     - "drafts/**"
//!   review_required_patterns:
//!     - "schema/**"
//! ```
//!
//! # Atomicity
//!
//! Saves go through a temp file and rename so a crash mid-write never
//! leaves a truncated manifest. Mutations validate before touching the
//! in-memory state, so a failed operation leaves both memory and disk
//! unchanged.

pub mod schema;

pub use schema::{Manifest, Member, Role, SyncPolicy, DEFAULT_INTERVAL_MINUTES, MANIFEST_VERSION};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// File name of the manifest at the vault root.
pub const MANIFEST_FILE_NAME: &str = ".collab.yaml";

/// Errors from manifest operations.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("no vault manifest at '{path}' (run `collab init` to create one)")]
    NotFound { path: PathBuf },

    #[error("failed to read manifest '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse manifest '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write manifest '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("manifest version {found} is not supported (this build supports {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("invalid manifest value: {0}")]
    InvalidValue(String),

    #[error("'{identity}' is already a member")]
    DuplicateMember { identity: String },

    #[error("'{identity}' is not a member")]
    UnknownMember { identity: String },

    #[error("cannot remove '{identity}': a vault must keep at least one master")]
    LastMaster { identity: String },
}

/// Just enough of the manifest to read the version before committing
/// to the full schema.
#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

/// Path to the manifest inside a vault.
pub fn manifest_path(vault_root: &Path) -> PathBuf {
    vault_root.join(MANIFEST_FILE_NAME)
}

/// Check whether a vault has a manifest.
pub fn manifest_exists(vault_root: &Path) -> bool {
    manifest_path(vault_root).is_file()
}

impl Manifest {
    /// Load and validate the manifest from a vault root.
    ///
    /// # Errors
    ///
    /// - [`ManifestError::NotFound`] if there is no manifest
    /// - [`ManifestError::UnsupportedVersion`] before attempting a
    ///   full parse of a newer schema
    /// - [`ManifestError::ParseError`] for malformed YAML or unknown
    ///   fields
    /// - [`ManifestError::InvalidValue`] for values that parse but
    ///   violate manifest invariants
    pub fn load(vault_root: &Path) -> Result<Self, ManifestError> {
        let path = manifest_path(vault_root);

        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ManifestError::NotFound { path });
            }
            Err(source) => return Err(ManifestError::ReadError { path, source }),
        };

        // Version-gate before the strict parse so a newer schema fails
        // with a version message, not an unknown-field message.
        let probe: VersionProbe =
            serde_yaml::from_str(&contents).map_err(|e| ManifestError::ParseError {
                path: path.clone(),
                message: e.to_string(),
            })?;
        if probe.version != MANIFEST_VERSION {
            return Err(ManifestError::UnsupportedVersion {
                found: probe.version,
                supported: MANIFEST_VERSION,
            });
        }

        let manifest: Manifest =
            serde_yaml::from_str(&contents).map_err(|e| ManifestError::ParseError {
                path: path.clone(),
                message: e.to_string(),
            })?;

        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate and atomically save the manifest to a vault root.
    ///
    /// Writes to a temp file, syncs, then renames over the manifest so
    /// readers never observe a partial write.
    pub fn save(&self, vault_root: &Path) -> Result<(), ManifestError> {
        self.validate()?;

        let path = manifest_path(vault_root);
        let yaml = serde_yaml::to_string(self).map_err(|e| ManifestError::InvalidValue(
            format!("failed to serialize manifest: {}", e),
        ))?;

        let tmp_path = path.with_extension("yaml.tmp");
        let write = |p: &Path| -> std::io::Result<()> {
            let mut file = fs::File::create(p)?;
            file.write_all(yaml.as_bytes())?;
            file.sync_all()?;
            Ok(())
        };

        write(&tmp_path).map_err(|source| ManifestError::WriteError {
            path: tmp_path.clone(),
            source,
        })?;

        fs::rename(&tmp_path, &path).map_err(|source| {
            let _ = fs::remove_file(&tmp_path);
            ManifestError::WriteError { path, source }
        })
    }
}
