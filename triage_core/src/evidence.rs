//! Append-only evidence store
//!
//! Holds every finding, raw evidence entry and agent run recorded for one
//! investigation. Nothing is ever removed or edited: a finding is only ever
//! superseded by a newer finding from the same agent about the same component,
//! or cleared by a later clean run of that agent that no longer reports it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::types::{AgentKind, AgentResult, Finding};

/// Raw evidence category, used as the key of the persisted evidence map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    AgentRun,
    Query,
    ReasoningFailure,
    Snapshot,
}

impl EvidenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceKind::AgentRun => "agent_run",
            EvidenceKind::Query => "query",
            EvidenceKind::ReasoningFailure => "reasoning_failure",
            EvidenceKind::Snapshot => "snapshot",
        }
    }
}

/// One raw evidence record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvidenceEntry {
    pub seq: u64,
    pub kind: EvidenceKind,
    pub payload: Value,
    pub recorded_at: DateTime<Utc>,
}

/// Ledger entry for one agent invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentRun {
    pub agent: AgentKind,
    /// Findings the agent was given as prior context
    pub prior_findings: usize,
    /// Sequence of the first finding merged from this run
    pub first_finding: usize,
    pub findings_merged: usize,
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl AgentRun {
    pub fn finding_range(&self) -> std::ops::Range<usize> {
        self.first_finding..self.first_finding + self.findings_merged
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceStore {
    findings: Vec<Finding>,
    entries: Vec<EvidenceEntry>,
    runs: Vec<AgentRun>,
}

impl EvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from persisted parts.
    ///
    /// Runs that point past the end of the finding list are dropped, which is
    /// what a torn write leaves behind.
    pub fn from_parts(findings: Vec<Finding>, mut entries: Vec<EvidenceEntry>, runs: Vec<AgentRun>) -> Self {
        entries.sort_by_key(|e| e.seq);
        let runs = runs
            .into_iter()
            .filter(|r| r.finding_range().end <= findings.len())
            .collect();
        Self { findings, entries, runs }
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn entries(&self) -> &[EvidenceEntry] {
        &self.entries
    }

    pub fn runs(&self) -> &[AgentRun] {
        &self.runs
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    /// Append an agent result: its findings, a run ledger entry and a raw
    /// evidence entry describing the run.
    pub fn record_agent_result(&mut self, result: &AgentResult, prior_findings: usize) -> AgentRun {
        let run = AgentRun {
            agent: result.agent,
            prior_findings,
            first_finding: self.findings.len(),
            findings_merged: result.findings.len(),
            error: result.error.clone(),
            recorded_at: Utc::now(),
        };
        self.findings.extend(result.findings.iter().cloned());
        self.runs.push(run.clone());
        self.record(
            EvidenceKind::AgentRun,
            serde_json::json!({
                "agent": result.agent,
                "summary": result.summary,
                "error": result.error,
                "finding_count": result.findings.len(),
                "elapsed_ms": result.elapsed_ms,
                "reasoning_steps": result.reasoning_steps,
            }),
        );
        run
    }

    /// Append a raw evidence entry and return its sequence number.
    pub fn record(&mut self, kind: EvidenceKind, payload: Value) -> u64 {
        let seq = self.entries.last().map(|e| e.seq + 1).unwrap_or(0);
        self.entries.push(EvidenceEntry {
            seq,
            kind,
            payload,
            recorded_at: Utc::now(),
        });
        seq
    }

    pub fn findings_by_agent(&self) -> BTreeMap<AgentKind, Vec<Finding>> {
        let mut map: BTreeMap<AgentKind, Vec<Finding>> = BTreeMap::new();
        for finding in &self.findings {
            map.entry(finding.agent).or_default().push(finding.clone());
        }
        map
    }

    pub fn entries_by_kind(&self) -> BTreeMap<String, Vec<EvidenceEntry>> {
        let mut map: BTreeMap<String, Vec<EvidenceEntry>> = BTreeMap::new();
        for entry in &self.entries {
            map.entry(entry.kind.as_str().to_string())
                .or_default()
                .push(entry.clone());
        }
        map
    }

    /// A later run of the same agent reported the same component again.
    /// Findings merged by one run never supersede each other.
    pub fn is_superseded(&self, seq: usize) -> bool {
        let Some(finding) = self.findings.get(seq) else {
            return false;
        };
        self.runs.iter().any(|run| {
            run.agent == finding.agent
                && run.first_finding > seq
                && self.findings[run.finding_range()]
                    .iter()
                    .any(|f| f.component == finding.component)
        })
    }

    /// A later successful run of the same agent saw this finding and did not
    /// report its component again.
    pub fn is_cleared(&self, seq: usize) -> bool {
        let Some(finding) = self.findings.get(seq) else {
            return false;
        };
        self.runs.iter().any(|run| {
            run.agent == finding.agent
                && run.error.is_none()
                && run.prior_findings > seq
                && !self.findings[run.finding_range()]
                    .iter()
                    .any(|f| f.component == finding.component)
        })
    }

    /// Findings that are neither superseded nor cleared, with their sequence.
    pub fn active_findings(&self) -> Vec<(usize, &Finding)> {
        self.findings
            .iter()
            .enumerate()
            .filter(|(seq, _)| !self.is_superseded(*seq) && !self.is_cleared(*seq))
            .collect()
    }

    /// Findings withdrawn by a later clean run.
    pub fn cleared_findings(&self) -> Vec<(usize, &Finding)> {
        self.findings
            .iter()
            .enumerate()
            .filter(|(seq, _)| self.is_cleared(*seq))
            .collect()
    }

    /// True when `agent` completed a clean run that saw finding `seq`.
    pub fn agent_examined(&self, agent: AgentKind, seq: usize) -> bool {
        self.runs
            .iter()
            .any(|r| r.agent == agent && r.error.is_none() && r.prior_findings > seq)
    }

    /// Sequence of the earliest finding in which the agent of `seq` reported
    /// the same issue on the same component. Re-reports carry no new
    /// information for planning.
    pub fn first_report(&self, seq: usize) -> usize {
        let Some(finding) = self.findings.get(seq) else {
            return seq;
        };
        self.findings
            .iter()
            .position(|f| f.agent == finding.agent && f.component == finding.component && f.issue == finding.issue)
            .unwrap_or(seq)
    }

    pub fn agent_has_run(&self, agent: AgentKind) -> bool {
        self.runs.iter().any(|r| r.agent == agent)
    }

    /// Stable digest of the finding list, used to key cached reasoning output.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (seq, finding) in self.findings.iter().enumerate() {
            hasher.update(seq.to_le_bytes());
            hasher.update(finding.id.0.as_bytes());
        }
        for run in &self.runs {
            hasher.update(run.agent.as_str().as_bytes());
            hasher.update(run.prior_findings.to_le_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}
