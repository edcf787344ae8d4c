//! Diagnostic agents.
//!
//! Each agent is a stateless struct holding its rule thresholds and a handle
//! to the cluster collaborator. Everything an agent needs about the
//! investigation arrives in an [`AgentContext`].

pub mod events;
pub mod logs;
pub mod metrics;
mod resources;
pub mod topology;
pub mod traces;

pub use events::EventsAgent;
pub use logs::LogsAgent;
pub use metrics::MetricsAgent;
pub use topology::TopologyAgent;
pub use traces::TracesAgent;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use triage_core::{
    AgentKind, AgentResult, ClusterClient, ClusterError, ComponentId, Finding, InvestigationId, ReasoningStep,
    Severity,
};
use triage_runtime::RuntimeConfig;

use crate::{AgentError, Result};

/// Common capability of the five agents.
#[async_trait]
pub trait DiagnosticAgent: Send + Sync {
    fn kind(&self) -> AgentKind;

    /// Analyse the agent's data domain.
    ///
    /// Missing or empty upstream data is a successful result without
    /// findings. A fetch timeout yields a partial result with `error` set.
    async fn analyze(&self, ctx: &AgentContext) -> Result<AgentResult>;
}

/// Everything an agent is told about the investigation.
#[derive(Clone, Debug)]
pub struct AgentContext {
    pub investigation: InvestigationId,
    pub namespace: String,
    /// Free-text problem description
    pub problem: Option<String>,
    /// All findings accumulated so far, in merge order
    pub prior_findings: Vec<Finding>,
    pub fetch_timeout: Duration,
}

impl AgentContext {
    pub fn new(
        investigation: InvestigationId,
        namespace: impl Into<String>,
        problem: Option<String>,
        prior_findings: Vec<Finding>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            investigation,
            namespace: namespace.into(),
            problem,
            prior_findings,
            fetch_timeout,
        }
    }

    /// Await one collaborator call under the fetch timeout.
    pub async fn fetch<T, F>(&self, what: &str, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, ClusterError>>,
    {
        match tokio::time::timeout(self.fetch_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(AgentError::Timeout {
                what: what.to_string(),
                timeout: self.fetch_timeout,
            }),
        }
    }

    /// Components with warning or critical prior findings, first-seen order.
    pub fn flagged_components(&self) -> Vec<&ComponentId> {
        let mut seen = Vec::new();
        for finding in &self.prior_findings {
            if finding.severity >= Severity::Warning && !seen.contains(&&finding.component) {
                seen.push(&finding.component);
            }
        }
        seen
    }

    /// Prior findings about `component` from other agents.
    pub fn prior_for<'a>(&'a self, component: &'a ComponentId, agent: AgentKind) -> impl Iterator<Item = &'a Finding> {
        self.prior_findings
            .iter()
            .filter(move |f| &f.component == component && f.agent != agent)
    }
}

/// Collects findings and reasoning steps for one analysis.
pub struct AnalysisRecorder {
    agent: AgentKind,
    findings: Vec<Finding>,
    steps: Vec<ReasoningStep>,
}

impl AnalysisRecorder {
    pub fn new(agent: AgentKind) -> Self {
        Self {
            agent,
            findings: Vec::new(),
            steps: Vec::new(),
        }
    }

    /// Record a finding. A repeat of the same component and issue is ignored.
    pub fn finding(
        &mut self,
        component: ComponentId,
        issue: impl Into<String>,
        severity: Severity,
        evidence: impl Into<String>,
        recommendation: impl Into<String>,
    ) {
        let issue = issue.into();
        if self
            .findings
            .iter()
            .any(|f| f.component == component && f.issue == issue)
        {
            return;
        }
        self.findings
            .push(Finding::new(self.agent, component, issue, severity, evidence).with_recommendation(recommendation));
    }

    pub fn step(&mut self, observation: impl Into<String>, conclusion: impl Into<String>) {
        self.steps.push(ReasoningStep::new(self.agent, observation, conclusion));
    }

    pub fn has_any(&self) -> bool {
        !self.findings.is_empty()
    }

    pub fn has_findings_for(&self, component: &ComponentId) -> bool {
        self.findings.iter().any(|f| &f.component == component)
    }

    pub fn finish(self) -> AgentResult {
        let critical = self.findings.iter().filter(|f| f.severity == Severity::Critical).count();
        let warning = self.findings.iter().filter(|f| f.severity == Severity::Warning).count();
        let summary = format!(
            "{} analysis: {} findings ({} critical, {} warning)",
            self.agent,
            self.findings.len(),
            critical,
            warning
        );
        AgentResult {
            agent: self.agent,
            findings: self.findings,
            reasoning_steps: self.steps,
            error: None,
            summary,
            elapsed_ms: 0,
        }
    }

    /// Keep what was gathered before a fetch timed out; any other error
    /// discards the analysis.
    pub fn partial(mut self, err: AgentError) -> Result<AgentResult> {
        if !matches!(err, AgentError::Timeout { .. }) {
            return Err(err);
        }
        let message = err.to_string();
        self.step(
            format!("Data fetch did not complete: {}", message),
            "Returning partial results gathered before the timeout",
        );
        let mut result = self.finish();
        result.error = Some(message);
        Ok(result)
    }

    pub fn conclude(self, outcome: Result<()>) -> Result<AgentResult> {
        match outcome {
            Ok(()) => Ok(self.finish()),
            Err(err) => self.partial(err),
        }
    }
}

/// Map from agent kind to implementation, resolved at construction.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: BTreeMap<AgentKind, Arc<dyn DiagnosticAgent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The five standard agents over `cluster`.
    pub fn standard(cluster: Arc<dyn ClusterClient>, config: &RuntimeConfig) -> Self {
        Self::new()
            .with_agent(Arc::new(MetricsAgent::new(cluster.clone())))
            .with_agent(Arc::new(LogsAgent::new(
                cluster.clone(),
                config.max_log_pods,
                config.log_tail_lines,
            )))
            .with_agent(Arc::new(TopologyAgent::new(cluster.clone())))
            .with_agent(Arc::new(EventsAgent::new(cluster.clone())))
            .with_agent(Arc::new(TracesAgent::new(cluster)))
    }

    /// Register `agent`, replacing any agent of the same kind.
    pub fn with_agent(mut self, agent: Arc<dyn DiagnosticAgent>) -> Self {
        self.agents.insert(agent.kind(), agent);
        self
    }

    pub fn get(&self, kind: AgentKind) -> Option<Arc<dyn DiagnosticAgent>> {
        self.agents.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<AgentKind> {
        self.agents.keys().copied().collect()
    }
}

/// Read a string field at a JSON pointer, failing with the dotted field name.
pub(crate) fn require_str<'a>(value: &'a serde_json::Value, pointer: &str) -> Result<&'a str> {
    value
        .pointer(pointer)
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| AgentError::MissingField(pointer.trim_start_matches('/').replace('/', ".")))
}
