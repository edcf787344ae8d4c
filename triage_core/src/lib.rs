//! Triage - Cluster root-cause investigation toolkit
//!
//! This crate provides the data model and persistence shared by the
//! diagnostic agents, the hypothesis engine and the coordinator.
//!
//! # Modules
//!
//! - [`types`]: Findings, agent results, hypotheses, next actions
//! - [`confidence`]: Bounded confidence values with Bayesian updates
//! - [`evidence`]: Append-only evidence store
//! - [`investigation`]: Investigation entity, record and view
//! - [`cluster`]: Cluster data-access contract and a fixture-backed client
//! - [`storage`]: Investigation repository, journal and component snapshots
//! - [`error`]: Error types for all operations

pub mod cluster;
pub mod confidence;
pub mod error;
pub mod evidence;
pub mod investigation;
pub mod storage;
pub mod types;

pub use cluster::{ClusterClient, ClusterError, StaticCluster};
pub use confidence::{Confidence, ConfidenceError};
pub use error::{Result, TriageError};
pub use evidence::{AgentRun, EvidenceEntry, EvidenceKind, EvidenceStore};
pub use investigation::{Investigation, InvestigationRecord, InvestigationSummary, InvestigationView};
pub use storage::{
    FileRepository, InMemoryRepository, InvestigationRepository, JournalEvent, SnapshotWriter, StorageError,
};
pub use types::{
    ActionPayload, AgentKind, AgentResult, ComponentId, ConversationTurn, ExecutedAction, Finding, FindingId,
    Hypothesis, HypothesisId, HypothesisOrigin, InvestigationId, InvestigationStatus, NextAction, Priority,
    ReasoningStep, Role, Severity,
};

/// Version of the core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
