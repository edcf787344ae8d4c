//! Hypothesis ranking
//!
//! Provides:
//! - Root-cause catalog used to name and explain rule hypotheses
//! - Evidence scoring built on Bayesian confidence updates
//! - Validation of reasoning-collaborator output
//! - The engine combining all three into a ranked list

pub mod catalog;
pub mod engine;
pub mod oracle;
pub mod scoring;

pub use catalog::RootCause;
pub use engine::{sort_ranking, HypothesisEngine, RankingOutcome, MAX_HYPOTHESES};
pub use oracle::{parse_candidates, OracleCandidate};
