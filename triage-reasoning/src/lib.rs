//! Triage Reasoning
//!
//! Turns accumulated findings into ranked root-cause hypotheses:
//! - Rule hypotheses grouped per component, scored from the evidence
//! - Optional reasoning collaborator, treated as an unreliable oracle

pub mod client;
pub mod errors;
pub mod hypothesis;

pub use client::{complete_with_timeout, ChatMessage, ReasoningClient};
pub use errors::{ReasoningError, Result};
pub use hypothesis::{HypothesisEngine, RankingOutcome, RootCause};

/// Version of the reasoning crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
