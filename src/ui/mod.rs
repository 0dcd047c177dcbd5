//! ui
//!
//! User-facing output utilities.
//!
//! # Modules
//!
//! - [`output`] - Output formatting and display
//! - [`review_body`] - Review request body generation and parsing
//!
//! # Design
//!
//! All command output goes through this module so formatting stays
//! consistent and quiet mode is honored everywhere. The review body
//! codec lives here because it is pure text shaping; the review
//! gateway decides *when* to write, this module decides *what* the
//! text looks like.

pub mod output;
pub mod review_body;
