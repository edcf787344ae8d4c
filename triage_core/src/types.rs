//! Core investigation types
//!
//! Defines the data model shared by agents, the hypothesis engine and the
//! coordinator:
//! - InvestigationId / FindingId / HypothesisId: identifiers
//! - AgentKind: the closed set of diagnostic agents
//! - Finding / ReasoningStep / AgentResult: agent output
//! - Hypothesis: ranked root-cause candidate
//! - NextAction: prioritised suggestion for the user
//! - InvestigationStatus: lifecycle state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::confidence::Confidence;

/// Unique identifier for an investigation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvestigationId(pub Uuid);

impl InvestigationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InvestigationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InvestigationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InvestigationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Unique identifier for a finding
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FindingId(pub Uuid);

impl FindingId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FindingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a ranked hypothesis.
///
/// Derived from the hypothesis content so that ranking the same evidence
/// twice yields the same ids.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HypothesisId(pub String);

impl HypothesisId {
    /// Derive an id from a description and its related components.
    pub fn derive(description: &str, components: &[ComponentId]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(description.trim().to_lowercase().as_bytes());
        for component in components {
            hasher.update(b"\0");
            hasher.update(component.as_str().as_bytes());
        }
        let digest = format!("{:x}", hasher.finalize());
        Self(format!("hyp-{}", &digest[..12]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HypothesisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HypothesisId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// The five diagnostic domains.
///
/// Declaration order is the fixed merge order used by sweeps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Metrics,
    Logs,
    Topology,
    Events,
    Traces,
}

impl AgentKind {
    /// All agents in merge order.
    pub const ALL: [AgentKind; 5] = [
        AgentKind::Metrics,
        AgentKind::Logs,
        AgentKind::Topology,
        AgentKind::Events,
        AgentKind::Traces,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Metrics => "metrics",
            AgentKind::Logs => "logs",
            AgentKind::Topology => "topology",
            AgentKind::Events => "events",
            AgentKind::Traces => "traces",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "metrics" => Ok(AgentKind::Metrics),
            "logs" => Ok(AgentKind::Logs),
            "topology" => Ok(AgentKind::Topology),
            "events" => Ok(AgentKind::Events),
            "traces" => Ok(AgentKind::Traces),
            other => Err(format!("unknown agent type: {}", other)),
        }
    }
}

/// Finding severity, ordered `Info < Warning < Critical`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    /// Map a rule-table label onto the three-level scale.
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "critical" | "high" => Severity::Critical,
            "warning" | "medium" => Severity::Warning,
            _ => Severity::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `Kind/name` reference to a cluster object.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(String);

impl ComponentId {
    pub fn new(kind: &str, name: &str) -> Self {
        Self(format!("{}/{}", kind, name))
    }

    pub fn pod(name: &str) -> Self {
        Self::new("Pod", name)
    }

    pub fn service(name: &str) -> Self {
        Self::new("Service", name)
    }

    pub fn node(name: &str) -> Self {
        Self::new("Node", name)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Object kind, e.g. `Pod`.
    pub fn kind(&self) -> &str {
        self.0.split_once('/').map(|(k, _)| k).unwrap_or("")
    }

    /// Object name, e.g. `web-1`.
    pub fn name(&self) -> &str {
        self.0.split_once('/').map(|(_, n)| n).unwrap_or(&self.0)
    }

    /// Filesystem-safe rendering used in snapshot file names.
    pub fn file_safe(&self) -> String {
        self.0
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
            .collect()
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ComponentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// An atomic observation produced by an agent. Immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: FindingId,
    pub component: ComponentId,
    pub issue: String,
    pub severity: Severity,
    /// Supporting excerpt from the raw data
    pub evidence: String,
    pub recommendation: Option<String>,
    pub agent: AgentKind,
    pub timestamp: DateTime<Utc>,
}

impl Finding {
    pub fn new(
        agent: AgentKind,
        component: ComponentId,
        issue: impl Into<String>,
        severity: Severity,
        evidence: impl Into<String>,
    ) -> Self {
        Self {
            id: FindingId::new(),
            component,
            issue: issue.into(),
            severity,
            evidence: evidence.into(),
            recommendation: None,
            agent,
            timestamp: Utc::now(),
        }
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }
}

/// One observation→conclusion pair recorded while an agent works.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub agent: AgentKind,
    pub observation: String,
    pub conclusion: String,
    pub timestamp: DateTime<Utc>,
}

impl ReasoningStep {
    pub fn new(agent: AgentKind, observation: impl Into<String>, conclusion: impl Into<String>) -> Self {
        Self {
            agent,
            observation: observation.into(),
            conclusion: conclusion.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Output of one agent invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent: AgentKind,
    pub findings: Vec<Finding>,
    pub reasoning_steps: Vec<ReasoningStep>,
    pub error: Option<String>,
    pub summary: String,
    pub elapsed_ms: u64,
}

impl AgentResult {
    /// A Finding-less result describing a failure.
    pub fn failed(agent: AgentKind, error: impl Into<String>) -> Self {
        let error = error.into();
        let step = ReasoningStep::new(
            agent,
            format!("Error occurred during {} analysis: {}", agent, error),
            format!("Unable to complete {} analysis due to an error", agent),
        );
        Self {
            agent,
            findings: Vec::new(),
            reasoning_steps: vec![step],
            summary: format!("{} analysis failed: {}", agent, error),
            error: Some(error),
            elapsed_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Highest severity among the findings, if any.
    pub fn max_severity(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }
}

/// Speaker of a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Lifecycle status of an investigation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestigationStatus {
    New,
    InProgress,
    Resolved,
    Abandoned,
}

impl InvestigationStatus {
    /// Valid status transitions; the machine only moves forward.
    pub fn can_transition_to(&self, next: &InvestigationStatus) -> bool {
        use InvestigationStatus::*;
        matches!(
            (self, next),
            (New, InProgress)
                | (New, Abandoned)
                | (InProgress, InProgress)
                | (InProgress, Resolved)
                | (InProgress, Abandoned)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, InvestigationStatus::Resolved | InvestigationStatus::Abandoned)
    }
}

impl fmt::Display for InvestigationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InvestigationStatus::New => "new",
            InvestigationStatus::InProgress => "in_progress",
            InvestigationStatus::Resolved => "resolved",
            InvestigationStatus::Abandoned => "abandoned",
        };
        f.write_str(s)
    }
}

/// Where a hypothesis came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HypothesisOrigin {
    Rules,
    Reasoner,
}

/// A ranked candidate root cause.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub id: HypothesisId,
    pub description: String,
    pub confidence: Confidence,
    pub investigation_steps: Vec<String>,
    pub related_components: Vec<ComponentId>,
    /// Sequence numbers of supporting findings
    pub supporting_findings: Vec<usize>,
    pub top_severity: Severity,
    pub newest_support: usize,
    pub origin: HypothesisOrigin,
}

/// Action payload, tagged by `type` on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionPayload {
    RunAgent { agent_type: AgentKind },
    Query { text: String },
    AcceptHypothesis { id: HypothesisId },
}

impl ActionPayload {
    pub fn action_type(&self) -> &'static str {
        match self {
            ActionPayload::RunAgent { .. } => "run_agent",
            ActionPayload::Query { .. } => "query",
            ActionPayload::AcceptHypothesis { .. } => "accept_hypothesis",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// A suggested next step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NextAction {
    pub text: String,
    pub action: ActionPayload,
    pub priority: Priority,
    pub reasoning: String,
}

/// An action the coordinator has already carried out.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutedAction {
    pub action: ActionPayload,
    /// Number of accumulated findings when the action ran
    pub finding_watermark: usize,
    pub executed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_investigation_id_parse_roundtrip() {
        let id = InvestigationId::new();
        let parsed: InvestigationId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_hypothesis_id_is_deterministic() {
        let components = vec![ComponentId::pod("web-1")];
        let a = HypothesisId::derive("Memory exhaustion", &components);
        let b = HypothesisId::derive("memory exhaustion ", &components);
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("hyp-"));
        let c = HypothesisId::derive("Memory exhaustion", &[ComponentId::pod("web-2")]);
        assert_ne!(a, c);
    }

    #[test]
    fn test_agent_kind_parse() {
        assert_eq!("Logs".parse::<AgentKind>().unwrap(), AgentKind::Logs);
        assert!("database".parse::<AgentKind>().is_err());
        assert_eq!(AgentKind::ALL[0], AgentKind::Metrics);
        assert_eq!(AgentKind::ALL[4], AgentKind::Traces);
    }

    #[test]
    fn test_severity_order_and_labels() {
        assert!(Severity::Critical > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
        assert_eq!(Severity::from_label("high"), Severity::Critical);
        assert_eq!(Severity::from_label("medium"), Severity::Warning);
        assert_eq!(Severity::from_label("low"), Severity::Info);
    }

    #[test]
    fn test_component_parts() {
        let c = ComponentId::pod("web-1");
        assert_eq!(c.kind(), "Pod");
        assert_eq!(c.name(), "web-1");
        assert_eq!(c.file_safe(), "Pod_web-1");
    }

    #[test]
    fn test_status_valid_transitions() {
        use InvestigationStatus::*;
        assert!(New.can_transition_to(&InProgress));
        assert!(InProgress.can_transition_to(&Resolved));
        assert!(InProgress.can_transition_to(&Abandoned));
        assert!(New.can_transition_to(&Abandoned));
    }

    #[test]
    fn test_status_invalid_transitions() {
        use InvestigationStatus::*;
        assert!(!Resolved.can_transition_to(&InProgress));
        assert!(!Abandoned.can_transition_to(&New));
        assert!(!InProgress.can_transition_to(&New));
        assert!(!New.can_transition_to(&Resolved));
    }

    #[test]
    fn test_action_payload_wire_shape() {
        let payload = ActionPayload::RunAgent { agent_type: AgentKind::Events };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "run_agent");
        assert_eq!(json["agent_type"], "events");
        assert_eq!(serde_json::to_value(Priority::Critical).unwrap(), "CRITICAL");
    }

    #[test]
    fn test_failed_result_shape() {
        let result = AgentResult::failed(AgentKind::Events, "'type'");
        assert!(result.findings.is_empty());
        assert_eq!(result.error.as_deref(), Some("'type'"));
        assert_eq!(result.reasoning_steps.len(), 1);
    }
}
