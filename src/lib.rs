//! Collab - shared knowledge vaults on top of git
//!
//! Collab keeps a team's knowledge vault (schema notes, business
//! rules, metric definitions, learnings) synchronized through an
//! ordinary git remote. Many people edit concurrently; a background
//! cycle pulls, classifies every change as additive or shared-state,
//! auto-merges the safe ones, and routes the rest through a review
//! request that a master approves.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - The sync cycle and review promotion
//! - [`sched`] - Background scheduler driving the cycle unattended
//! - [`manifest`] - The `.collab.yaml` membership and policy document
//! - [`classify`] - Additive vs shared-state decision for each path
//! - [`resolve`] - Per-path conflict policy
//! - [`review`] - Review-host gateway (GitHub v1)
//! - [`core`] - Domain types, sessions, locking, and paths
//! - [`git`] - Single interface for all Git operations
//! - [`ui`] - Output formatting and review-request bodies
//!
//! # Correctness Invariants
//!
//! Collab maintains the following invariants:
//!
//! 1. A collaborator's edit is never silently discarded; losing sides
//!    of a conflict are saved to recovery files
//! 2. At most one sync session runs per vault at a time
//! 3. At most one review request is open per review branch
//! 4. Any failed cycle restores the working tree to its pre-cycle shape

pub mod classify;
pub mod cli;
pub mod core;
pub mod engine;
pub mod git;
pub mod manifest;
pub mod resolve;
pub mod review;
pub mod sched;
pub mod ui;
