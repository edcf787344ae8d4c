//! Investigation entity, its persisted record and read-only view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Result, TriageError};
use crate::evidence::{AgentRun, EvidenceEntry, EvidenceKind, EvidenceStore};
use crate::types::{
    ActionPayload, AgentKind, AgentResult, ConversationTurn, ExecutedAction, Finding, Hypothesis,
    HypothesisId, InvestigationId, InvestigationStatus, NextAction, Role, Severity,
};

/// One diagnostic session.
#[derive(Clone, Debug)]
pub struct Investigation {
    pub id: InvestigationId,
    pub title: String,
    pub namespace: String,
    pub context: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    status: InvestigationStatus,
    conversation: Vec<ConversationTurn>,
    evidence: EvidenceStore,
    hypotheses: Vec<Hypothesis>,
    next_actions: Vec<NextAction>,
    executed_actions: Vec<ExecutedAction>,
    accepted_hypothesis: Option<HypothesisId>,
    summary: String,
}

impl Investigation {
    pub fn new(namespace: impl Into<String>, context: Option<String>) -> Self {
        let namespace = namespace.into();
        let context = context.filter(|c| !c.trim().is_empty());
        let title = match &context {
            Some(ctx) => format!("{}: {}", namespace, truncate(ctx.trim(), 60)),
            None => format!("Investigation in {}", namespace),
        };
        let now = Utc::now();
        Self {
            id: InvestigationId::new(),
            title,
            namespace,
            context,
            created_at: now,
            updated_at: now,
            status: InvestigationStatus::New,
            conversation: Vec::new(),
            evidence: EvidenceStore::new(),
            hypotheses: Vec::new(),
            next_actions: Vec::new(),
            executed_actions: Vec::new(),
            accepted_hypothesis: None,
            summary: "No findings yet".to_string(),
        }
    }

    pub fn status(&self) -> InvestigationStatus {
        self.status
    }

    pub fn conversation(&self) -> &[ConversationTurn] {
        &self.conversation
    }

    pub fn evidence(&self) -> &EvidenceStore {
        &self.evidence
    }

    pub fn findings(&self) -> &[Finding] {
        self.evidence.findings()
    }

    pub fn hypotheses(&self) -> &[Hypothesis] {
        &self.hypotheses
    }

    pub fn next_actions(&self) -> &[NextAction] {
        &self.next_actions
    }

    pub fn executed_actions(&self) -> &[ExecutedAction] {
        &self.executed_actions
    }

    pub fn accepted_hypothesis(&self) -> Option<&HypothesisId> {
        self.accepted_hypothesis.as_ref()
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn hypothesis(&self, id: &HypothesisId) -> Option<&Hypothesis> {
        self.hypotheses.iter().find(|h| &h.id == id)
    }

    /// Reject mutation when the investigation is resolved or abandoned.
    pub fn ensure_open(&self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(TriageError::InvestigationClosed {
                id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }

    /// Move the state machine forward.
    pub fn transition(&mut self, next: InvestigationStatus) -> Result<()> {
        self.ensure_open()?;
        if !self.status.can_transition_to(&next) {
            return Err(TriageError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    /// Mark work as started; a no-op once already in progress.
    pub fn mark_in_progress(&mut self) -> Result<()> {
        if self.status == InvestigationStatus::InProgress {
            self.ensure_open()?;
            return Ok(());
        }
        self.transition(InvestigationStatus::InProgress)
    }

    pub fn add_turn(&mut self, role: Role, content: impl Into<String>) -> Result<()> {
        self.ensure_open()?;
        self.conversation.push(ConversationTurn::new(role, content));
        self.touch();
        Ok(())
    }

    /// Merge one agent result into the evidence store.
    pub fn merge_agent_result(&mut self, result: &AgentResult, prior_findings: usize) -> Result<AgentRun> {
        self.ensure_open()?;
        let run = self.evidence.record_agent_result(result, prior_findings);
        self.touch();
        Ok(run)
    }

    pub fn record_evidence(&mut self, kind: EvidenceKind, payload: Value) -> Result<u64> {
        self.ensure_open()?;
        let seq = self.evidence.record(kind, payload);
        self.touch();
        Ok(seq)
    }

    pub fn record_executed(&mut self, action: ActionPayload, finding_watermark: usize) -> Result<()> {
        self.ensure_open()?;
        self.executed_actions.push(ExecutedAction {
            action,
            finding_watermark,
            executed_at: Utc::now(),
        });
        Ok(())
    }

    /// Replace the derived ranking and suggestions.
    pub fn set_ranking(&mut self, hypotheses: Vec<Hypothesis>, next_actions: Vec<NextAction>) -> Result<()> {
        self.ensure_open()?;
        self.hypotheses = hypotheses;
        self.next_actions = next_actions;
        self.summary = self.compute_summary();
        self.touch();
        Ok(())
    }

    /// Accept a ranked hypothesis and close the investigation.
    pub fn resolve(&mut self, id: &HypothesisId) -> Result<&Hypothesis> {
        self.ensure_open()?;
        let position = self
            .hypotheses
            .iter()
            .position(|h| &h.id == id)
            .ok_or_else(|| TriageError::NotFound(format!("hypothesis {}", id)))?;
        self.transition(InvestigationStatus::Resolved)?;
        self.accepted_hypothesis = Some(id.clone());
        self.next_actions.clear();
        self.summary = format!(
            "Resolved: {} (confidence {})",
            self.hypotheses[position].description, self.hypotheses[position].confidence
        );
        Ok(&self.hypotheses[position])
    }

    pub fn abandon(&mut self) -> Result<()> {
        self.transition(InvestigationStatus::Abandoned)?;
        self.next_actions.clear();
        self.summary = format!("Abandoned: {}", self.summary);
        Ok(())
    }

    fn compute_summary(&self) -> String {
        let findings = self.evidence.findings();
        if findings.is_empty() {
            return "No findings yet".to_string();
        }
        let critical = findings.iter().filter(|f| f.severity == Severity::Critical).count();
        let mut components: Vec<_> = findings.iter().map(|f| f.component.as_str()).collect();
        components.sort_unstable();
        components.dedup();
        let mut summary = format!(
            "{} findings ({} critical) across {} components",
            findings.len(),
            critical,
            components.len()
        );
        if let Some(top) = self.hypotheses.first() {
            summary.push_str(&format!("; leading hypothesis: {} ({})", top.description, top.confidence));
        }
        summary
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn view(&self) -> InvestigationView {
        InvestigationView {
            id: self.id,
            title: self.title.clone(),
            namespace: self.namespace.clone(),
            context: self.context.clone(),
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            conversation: self.conversation.clone(),
            findings: self.evidence.findings().to_vec(),
            active_findings: self.evidence.active_findings().len(),
            agent_runs: self.evidence.runs().to_vec(),
            hypotheses: self.hypotheses.clone(),
            next_actions: self.next_actions.clone(),
            accepted_hypothesis: self.accepted_hypothesis.clone(),
            summary: self.summary.clone(),
        }
    }

    pub fn summary_entry(&self) -> InvestigationSummary {
        InvestigationSummary {
            id: self.id,
            title: self.title.clone(),
            namespace: self.namespace.clone(),
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            finding_count: self.evidence.len(),
            summary: self.summary.clone(),
        }
    }

    pub fn to_record(&self) -> InvestigationRecord {
        InvestigationRecord {
            id: self.id,
            title: self.title.clone(),
            namespace: self.namespace.clone(),
            context: self.context.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            status: self.status,
            summary: self.summary.clone(),
            conversation: self.conversation.clone(),
            evidence: self.evidence.entries_by_kind(),
            agent_findings: self.evidence.findings_by_agent(),
            next_actions: self.next_actions.clone(),
            accumulated_findings: self.evidence.findings().to_vec(),
            hypotheses: self.hypotheses.clone(),
            executed_actions: self.executed_actions.clone(),
            agent_runs: self.evidence.runs().to_vec(),
            accepted_hypothesis: self.accepted_hypothesis.clone(),
        }
    }

    pub fn from_record(record: InvestigationRecord) -> Self {
        let entries: Vec<EvidenceEntry> = record.evidence.into_values().flatten().collect();
        Self {
            id: record.id,
            title: record.title,
            namespace: record.namespace,
            context: record.context,
            created_at: record.created_at,
            updated_at: record.updated_at,
            status: record.status,
            conversation: record.conversation,
            evidence: EvidenceStore::from_parts(record.accumulated_findings, entries, record.agent_runs),
            hypotheses: record.hypotheses,
            next_actions: record.next_actions,
            executed_actions: record.executed_actions,
            accepted_hypothesis: record.accepted_hypothesis,
            summary: record.summary,
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push_str("...");
    out
}

/// Durable shape of an investigation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvestigationRecord {
    pub id: InvestigationId,
    pub title: String,
    pub namespace: String,
    pub context: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: InvestigationStatus,
    pub summary: String,
    pub conversation: Vec<ConversationTurn>,
    /// Raw evidence keyed by action type
    pub evidence: BTreeMap<String, Vec<EvidenceEntry>>,
    pub agent_findings: BTreeMap<AgentKind, Vec<Finding>>,
    pub next_actions: Vec<NextAction>,
    pub accumulated_findings: Vec<Finding>,
    #[serde(default)]
    pub hypotheses: Vec<Hypothesis>,
    #[serde(default)]
    pub executed_actions: Vec<ExecutedAction>,
    #[serde(default)]
    pub agent_runs: Vec<AgentRun>,
    #[serde(default)]
    pub accepted_hypothesis: Option<HypothesisId>,
}

/// Read-only projection returned to callers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvestigationView {
    pub id: InvestigationId,
    pub title: String,
    pub namespace: String,
    pub context: Option<String>,
    pub status: InvestigationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub conversation: Vec<ConversationTurn>,
    pub findings: Vec<Finding>,
    pub active_findings: usize,
    pub agent_runs: Vec<AgentRun>,
    pub hypotheses: Vec<Hypothesis>,
    pub next_actions: Vec<NextAction>,
    pub accepted_hypothesis: Option<HypothesisId>,
    pub summary: String,
}

/// Listing entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvestigationSummary {
    pub id: InvestigationId,
    pub title: String,
    pub namespace: String,
    pub status: InvestigationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finding_count: usize,
    pub summary: String,
}

impl From<&InvestigationRecord> for InvestigationSummary {
    fn from(record: &InvestigationRecord) -> Self {
        Self {
            id: record.id,
            title: record.title.clone(),
            namespace: record.namespace.clone(),
            status: record.status,
            created_at: record.created_at,
            updated_at: record.updated_at,
            finding_count: record.accumulated_findings.len(),
            summary: record.summary.clone(),
        }
    }
}
