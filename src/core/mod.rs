//! core
//!
//! Core domain types and per-vault state for collab.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, Oid, VaultPath, etc.
//! - [`paths`] - Centralized path routing for collab storage
//! - [`lock`] - Exclusive per-vault sync lock
//! - [`session`] - Sync session records and the rolling outcome log
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Durable records use plain serializable fields
//! - All validation is deterministic

pub mod lock;
pub mod paths;
pub mod session;
pub mod types;
