//! Error types for the reasoning crate

use std::time::Duration;
use thiserror::Error;

/// Failures of the reasoning collaborator. None of these reach the caller of
/// the coordinator; they degrade into rule-only ranking.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReasoningError {
    /// Collaborator did not answer in time
    #[error("Reasoning call timed out after {0:?}")]
    Timeout(Duration),

    /// Transport or provider failure
    #[error("Reasoning provider error: {0}")]
    Provider(String),

    /// Output could not be used
    #[error("Malformed reasoning output: {0}")]
    MalformedOutput(String),
}

pub type Result<T> = std::result::Result<T, ReasoningError>;
