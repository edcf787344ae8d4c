//! Error types for the investigation toolkit.

use crate::types::{AgentKind, InvestigationId, InvestigationStatus};

/// Main error type for investigation operations.
///
/// All core operations return `Result<T> = std::result::Result<T, TriageError>`.
#[derive(thiserror::Error, Debug)]
pub enum TriageError {
    /// A diagnostic agent failed while analysing.
    #[error("Agent failure ({agent}): {reason}")]
    AgentFailure {
        /// Agent that failed
        agent: AgentKind,
        /// Failure description
        reason: String,
    },

    /// An external collaborator returned data that could not be used.
    #[error("Upstream data error: {0}")]
    UpstreamData(String),

    /// Investigation, hypothesis or action could not be found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Mutation attempted on a resolved or abandoned investigation.
    #[error("Investigation {id} is closed ({status})")]
    InvestigationClosed {
        /// Investigation that rejected the mutation
        id: InvestigationId,
        /// Terminal status it is in
        status: InvestigationStatus,
    },

    /// Investigation could not be started.
    #[error("Initialization failed: {0}")]
    Initialization(String),

    /// Status transition not permitted by the state machine.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status
        from: InvestigationStatus,
        /// Requested status
        to: InvestigationStatus,
    },

    /// Persistence layer failure.
    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TriageError {
    /// True for errors that callers should treat as a bad request rather than
    /// an internal failure.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            TriageError::NotFound(_)
                | TriageError::InvestigationClosed { .. }
                | TriageError::InvalidTransition { .. }
        )
    }
}

/// Type alias for Result with TriageError.
pub type Result<T> = std::result::Result<T, TriageError>;
