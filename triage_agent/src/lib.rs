//! Triage agent layer - diagnostic agents and the investigation coordinator.
//!
//! This crate drives an investigation round by round:
//!
//! - Agents: metrics, logs, topology, events and traces analysis
//! - Coordinator: dispatches agents, merges results, ranks hypotheses
//! - Planner: derives prioritised next actions
//! - Intent: maps free-text user messages to actions
//!
//! Agent and collaborator failures never escape the coordinator; they are
//! recorded as evidence on the investigation.

use std::time::Duration;
use triage_core::ClusterError;

pub mod agents;
pub mod capture;
pub mod cli;
pub mod coordinator;
pub mod intent;
pub mod planner;
pub mod timeout;

/// Error types for agent analysis.
///
/// These never reach coordinator callers; they are folded into a failed
/// [`triage_core::AgentResult`].
#[derive(thiserror::Error, Debug)]
pub enum AgentError {
    /// A required field is missing from an upstream record
    #[error("'{0}'")]
    MissingField(String),

    /// Upstream record has the wrong shape
    #[error("Unexpected payload shape: {0}")]
    UnexpectedShape(String),

    /// Cluster collaborator failed
    #[error("Upstream error: {0}")]
    Upstream(#[from] ClusterError),

    /// A single fetch exceeded its time bound
    #[error("Fetching {what} timed out after {timeout:?}")]
    Timeout { what: String, timeout: Duration },
}

/// Result type for agent analysis.
pub type Result<T> = std::result::Result<T, AgentError>;

pub use agents::{AgentContext, AgentRegistry, DiagnosticAgent};
pub use coordinator::{ActionOutcome, Coordinator, CoordinatorBuilder, MessageResponse};
pub use intent::{Intent, IntentMapper};
pub use planner::NextActionPlanner;
pub use timeout::{AgentTimeout, TimeoutConfig, TimeoutError};

/// Version of the agent crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_display() {
        assert_eq!(AgentError::MissingField("type".into()).to_string(), "'type'");
    }

    #[test]
    fn test_upstream_conversion() {
        let err: AgentError = ClusterError::Unreachable("refused".into()).into();
        assert!(err.to_string().contains("refused"));
    }
}
