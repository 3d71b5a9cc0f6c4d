//! Moderator Core
//!
//! Types and the moderation decision shared by the Moderator crates.
//!
//! This crate provides:
//! - Request and response types for the moderation API
//! - The threshold decision applied to classifier label scores
//! - Error types and result handling

pub mod decision;
pub mod error;
pub mod types;

pub use decision::{is_toxic, Threshold};
pub use error::{Error, Result};
pub use types::{LabelScores, ModerationRequest, ModerationResult};
