//! Investigation coordinator.
//!
//! The coordinator owns every open investigation and sequences one round of
//! work on it:
//!
//! Dispatch -> Merge -> Rank -> Plan -> Persist
//!
//! Each investigation sits behind its own `tokio::sync::Mutex`, so rounds on
//! one investigation are serialised while different investigations proceed
//! independently. Agent and reasoner failures are folded into the evidence
//! store; only unknown ids and mutations of closed investigations reach the
//! caller.

use futures_util::future::join_all;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use triage_core::storage::{ComponentSnapshot, JournalEntry};
use triage_core::{
    ActionPayload, AgentKind, AgentResult, ClusterClient, EvidenceKind, FileRepository, HypothesisId,
    InMemoryRepository, Investigation, InvestigationId, InvestigationRepository, InvestigationStatus,
    InvestigationSummary, InvestigationView, JournalEvent, Result, Role, Severity, SnapshotWriter, TriageError,
};
use triage_reasoning::{HypothesisEngine, ReasoningClient};
use triage_runtime::RuntimeConfig;

use crate::agents::{AgentContext, AgentRegistry};
use crate::capture::capture_snapshots;
use crate::intent::{Intent, IntentMapper};
use crate::planner::NextActionPlanner;
use crate::timeout::{run_bounded, TimeoutConfig};

/// Reply to one user message.
#[derive(Clone, Debug)]
pub struct MessageResponse {
    pub reply: String,
    pub intent: Intent,
    pub agent_results: Vec<AgentResult>,
    pub view: InvestigationView,
}

/// What executing a suggested action produced.
#[derive(Clone, Debug)]
pub enum ActionOutcome {
    AgentRun(AgentResult),
    Answer(String),
    Accepted(InvestigationView),
}

/// Builder for [`Coordinator`].
pub struct CoordinatorBuilder {
    cluster: Arc<dyn ClusterClient>,
    config: RuntimeConfig,
    registry: Option<AgentRegistry>,
    reasoner: Option<Arc<dyn ReasoningClient>>,
    planner: NextActionPlanner,
    repository: Option<Arc<dyn InvestigationRepository>>,
    snapshots: Option<SnapshotWriter>,
    timeouts: Option<TimeoutConfig>,
}

impl CoordinatorBuilder {
    pub fn new(cluster: Arc<dyn ClusterClient>) -> Self {
        Self {
            cluster,
            config: RuntimeConfig::default(),
            registry: None,
            reasoner: None,
            planner: NextActionPlanner::default(),
            repository: None,
            snapshots: None,
            timeouts: None,
        }
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the standard five-agent registry.
    pub fn registry(mut self, registry: AgentRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn reasoner(mut self, client: Arc<dyn ReasoningClient>) -> Self {
        self.reasoner = Some(client);
        self
    }

    pub fn planner(mut self, planner: NextActionPlanner) -> Self {
        self.planner = planner;
        self
    }

    pub fn repository(mut self, repository: Arc<dyn InvestigationRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn snapshots(mut self, writer: SnapshotWriter) -> Self {
        self.snapshots = Some(writer);
        self
    }

    /// Override the timeouts derived from the runtime config.
    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    pub fn build(self) -> Coordinator {
        let timeouts = self
            .timeouts
            .unwrap_or_else(|| TimeoutConfig::from_runtime(&self.config));
        let registry = self
            .registry
            .unwrap_or_else(|| AgentRegistry::standard(self.cluster.clone(), &self.config));
        let (engine, intents) = match self.reasoner {
            Some(client) => (
                HypothesisEngine::with_reasoner(client.clone(), timeouts.reasoning),
                IntentMapper::with_reasoner(client, timeouts.reasoning),
            ),
            None => (HypothesisEngine::new(), IntentMapper::new()),
        };
        Coordinator {
            cluster: self.cluster,
            registry,
            engine,
            planner: self.planner,
            intents,
            repository: self
                .repository
                .unwrap_or_else(|| Arc::new(InMemoryRepository::new())),
            snapshots: self.snapshots,
            timeouts,
            tail_lines: self.config.log_tail_lines,
            investigations: RwLock::new(HashMap::new()),
        }
    }
}

/// Investigation orchestrator.
pub struct Coordinator {
    cluster: Arc<dyn ClusterClient>,
    registry: AgentRegistry,
    engine: HypothesisEngine,
    planner: NextActionPlanner,
    intents: IntentMapper,
    repository: Arc<dyn InvestigationRepository>,
    snapshots: Option<SnapshotWriter>,
    timeouts: TimeoutConfig,
    /// Log lines captured per pod snapshot
    tail_lines: usize,
    investigations: RwLock<HashMap<InvestigationId, Arc<Mutex<Investigation>>>>,
}

impl Coordinator {
    pub fn builder(cluster: Arc<dyn ClusterClient>) -> CoordinatorBuilder {
        CoordinatorBuilder::new(cluster)
    }

    /// File-backed coordinator rooted at `config.data_dir`.
    pub async fn from_config(config: &RuntimeConfig, cluster: Arc<dyn ClusterClient>) -> Result<Self> {
        let repository = FileRepository::open(&config.data_dir).await?;
        Ok(CoordinatorBuilder::new(cluster)
            .config(config.clone())
            .repository(Arc::new(repository))
            .snapshots(SnapshotWriter::new(&config.data_dir))
            .build())
    }

    pub fn timeouts(&self) -> &TimeoutConfig {
        &self.timeouts
    }

    /// Open a new investigation after checking the namespace is reachable.
    pub async fn start_investigation(
        &self,
        namespace: &str,
        context: Option<String>,
    ) -> Result<InvestigationView> {
        let namespace = namespace.trim();
        if namespace.is_empty() {
            return Err(TriageError::Initialization("namespace must not be empty".into()));
        }
        match self.cluster.namespace_exists(namespace).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(TriageError::Initialization(format!("namespace '{}' not found", namespace)));
            }
            Err(e) => return Err(TriageError::Initialization(e.to_string())),
        }

        let mut inv = Investigation::new(namespace, context);
        let opening = match &inv.context {
            Some(ctx) => format!("Investigation started in namespace {}: {}", namespace, ctx),
            None => format!("Investigation started in namespace {}", namespace),
        };
        inv.add_turn(Role::System, opening.clone())?;
        let mut journal = vec![
            JournalEvent::Created {
                namespace: inv.namespace.clone(),
                context: inv.context.clone(),
            },
            JournalEvent::Turn {
                role: Role::System,
                content: opening,
            },
        ];
        self.recompute(&mut inv, &mut journal).await?;
        self.persist(&inv, journal).await?;
        info!(investigation = %inv.id, namespace = %inv.namespace, "Investigation started");

        let view = inv.view();
        self.investigations
            .write()
            .await
            .insert(inv.id, Arc::new(Mutex::new(inv)));
        Ok(view)
    }

    /// Run one agent and fold its result into the investigation.
    pub async fn run_agent(&self, id: InvestigationId, agent: AgentKind) -> Result<AgentResult> {
        let handle = self.handle(id).await?;
        let mut live = handle.lock().await;
        live.ensure_open()?;
        let mut inv = live.clone();

        let mut journal = Vec::new();
        let mut results = self.dispatch(&mut inv, &[agent], &mut journal).await?;
        self.recompute(&mut inv, &mut journal).await?;
        self.commit(&mut live, inv, journal).await?;
        results
            .pop()
            .ok_or_else(|| TriageError::AgentFailure {
                agent,
                reason: "no result produced".into(),
            })
    }

    /// Run all five agents concurrently, merging in the fixed agent order.
    pub async fn run_sweep(&self, id: InvestigationId) -> Result<Vec<AgentResult>> {
        let handle = self.handle(id).await?;
        let mut live = handle.lock().await;
        live.ensure_open()?;
        let mut inv = live.clone();

        let mut journal = Vec::new();
        let results = self.dispatch(&mut inv, &AgentKind::ALL, &mut journal).await?;
        self.recompute(&mut inv, &mut journal).await?;
        self.commit(&mut live, inv, journal).await?;
        Ok(results)
    }

    /// Interpret a free-text message, act on it and reply.
    pub async fn handle_user_message(&self, id: InvestigationId, text: &str) -> Result<MessageResponse> {
        let handle = self.handle(id).await?;
        let mut live = handle.lock().await;
        live.ensure_open()?;
        let mut inv = live.clone();

        let from = inv.status();
        inv.add_turn(Role::User, text)?;
        let mut journal = vec![JournalEvent::Turn {
            role: Role::User,
            content: text.to_string(),
        }];
        inv.mark_in_progress()?;
        if inv.status() != from {
            journal.push(JournalEvent::StatusChanged { from, to: inv.status() });
        }

        let intent = self.intents.classify(text).await;
        debug!(investigation = %id, %intent, "User message classified");
        let (agent_results, answer) = match &intent {
            Intent::RunAgent(agent) => (self.dispatch(&mut inv, &[*agent], &mut journal).await?, None),
            Intent::Sweep => (self.dispatch(&mut inv, &AgentKind::ALL, &mut journal).await?, None),
            Intent::Query(query) => (Vec::new(), Some(self.answer(&mut inv, query)?)),
        };
        self.recompute(&mut inv, &mut journal).await?;

        let reply = match answer {
            Some(answer) => answer,
            None => describe_results(&inv, &agent_results),
        };
        inv.add_turn(Role::Assistant, reply.clone())?;
        journal.push(JournalEvent::Turn {
            role: Role::Assistant,
            content: reply.clone(),
        });
        self.commit(&mut live, inv, journal).await?;

        Ok(MessageResponse {
            reply,
            intent,
            agent_results,
            view: live.view(),
        })
    }

    /// Answer a question from the evidence already collected.
    pub async fn query(&self, id: InvestigationId, text: &str) -> Result<String> {
        let handle = self.handle(id).await?;
        let mut live = handle.lock().await;
        live.ensure_open()?;
        let mut inv = live.clone();

        let answer = self.answer(&mut inv, text)?;
        let mut journal = Vec::new();
        self.recompute(&mut inv, &mut journal).await?;
        self.commit(&mut live, inv, journal).await?;
        Ok(answer)
    }

    /// Accept a ranked hypothesis as the root cause and close the
    /// investigation. Snapshots of the implicated components are written
    /// first.
    pub async fn accept_hypothesis(&self, id: InvestigationId, hypothesis: &HypothesisId) -> Result<InvestigationView> {
        let handle = self.handle(id).await?;
        let mut live = handle.lock().await;
        live.ensure_open()?;
        let mut inv = live.clone();

        let accepted = inv
            .hypothesis(hypothesis)
            .cloned()
            .ok_or_else(|| TriageError::NotFound(format!("hypothesis {}", hypothesis)))?;
        let from = inv.status();
        if !from.can_transition_to(&InvestigationStatus::Resolved) {
            return Err(TriageError::InvalidTransition {
                from,
                to: InvestigationStatus::Resolved,
            });
        }

        if let Some(writer) = &self.snapshots {
            let snapshots = capture_snapshots(
                self.cluster.as_ref(),
                &inv,
                &accepted,
                self.tail_lines,
                self.timeouts.fetch,
            )
            .await;
            for snapshot in snapshots {
                let payload = match writer.write(&snapshot).await {
                    Ok(path) => json!({
                        "component": snapshot.component,
                        "finding": snapshot.finding.id,
                        "path": path.display().to_string(),
                    }),
                    Err(e) => {
                        warn!(investigation = %id, component = %snapshot.component, "Snapshot not written: {}", e);
                        json!({
                            "component": snapshot.component,
                            "finding": snapshot.finding.id,
                            "error": e.to_string(),
                        })
                    }
                };
                inv.record_evidence(EvidenceKind::Snapshot, payload)?;
            }
        }

        let closing = format!("Accepted root cause: {} ({})", accepted.description, accepted.confidence);
        inv.add_turn(Role::Assistant, closing.clone())?;
        let watermark = inv.findings().len();
        inv.record_executed(
            ActionPayload::AcceptHypothesis {
                id: hypothesis.clone(),
            },
            watermark,
        )?;
        inv.resolve(hypothesis)?;

        let journal = vec![
            JournalEvent::Turn {
                role: Role::Assistant,
                content: closing,
            },
            JournalEvent::StatusChanged {
                from,
                to: InvestigationStatus::Resolved,
            },
            JournalEvent::Accepted {
                hypothesis: hypothesis.clone(),
            },
        ];
        self.commit(&mut live, inv, journal).await?;
        info!(investigation = %id, hypothesis = %hypothesis, "Root cause accepted");
        Ok(live.view())
    }

    pub async fn abandon_investigation(&self, id: InvestigationId) -> Result<InvestigationView> {
        let handle = self.handle(id).await?;
        let mut live = handle.lock().await;
        let mut inv = live.clone();
        let from = inv.status();
        inv.abandon()?;
        let journal = vec![
            JournalEvent::StatusChanged {
                from,
                to: InvestigationStatus::Abandoned,
            },
            JournalEvent::Abandoned,
        ];
        self.commit(&mut live, inv, journal).await?;
        info!(investigation = %id, "Investigation abandoned");
        Ok(live.view())
    }

    /// Execute the `index`-th currently suggested action.
    pub async fn execute_next_action(&self, id: InvestigationId, index: usize) -> Result<ActionOutcome> {
        let action = {
            let handle = self.handle(id).await?;
            let inv = handle.lock().await;
            inv.ensure_open()?;
            let action = inv.next_actions().get(index).cloned();
            action.ok_or_else(|| TriageError::NotFound(format!("next action {} of investigation {}", index, id)))?
        };
        debug!(investigation = %id, action = action.action.action_type(), "Executing suggested action");

        match action.action {
            ActionPayload::RunAgent { agent_type } => Ok(ActionOutcome::AgentRun(self.run_agent(id, agent_type).await?)),
            ActionPayload::Query { text } => Ok(ActionOutcome::Answer(self.query(id, &text).await?)),
            ActionPayload::AcceptHypothesis { id: hypothesis } => {
                Ok(ActionOutcome::Accepted(self.accept_hypothesis(id, &hypothesis).await?))
            }
        }
    }

    pub async fn get_view(&self, id: InvestigationId) -> Result<InvestigationView> {
        let handle = self.handle(id).await?;
        let inv = handle.lock().await;
        Ok(inv.view())
    }

    /// Resume a persisted investigation.
    pub async fn load_investigation(&self, id: InvestigationId) -> Result<InvestigationView> {
        self.get_view(id).await
    }

    pub async fn list_investigations(&self) -> Result<Vec<InvestigationSummary>> {
        Ok(self.repository.list().await?)
    }

    pub async fn journal(&self, id: InvestigationId) -> Result<Vec<JournalEntry>> {
        self.handle(id).await?;
        Ok(self.repository.journal(id).await?)
    }

    /// Snapshots written when the investigation was resolved.
    pub async fn snapshots(&self, id: InvestigationId) -> Result<Vec<ComponentSnapshot>> {
        match &self.snapshots {
            Some(writer) => Ok(writer.read_all(id).await?),
            None => Ok(Vec::new()),
        }
    }

    /// In-memory handle, loading from the repository when needed.
    async fn handle(&self, id: InvestigationId) -> Result<Arc<Mutex<Investigation>>> {
        if let Some(handle) = self.investigations.read().await.get(&id) {
            return Ok(handle.clone());
        }
        let record = self
            .repository
            .load(id)
            .await?
            .ok_or_else(|| TriageError::NotFound(format!("investigation {}", id)))?;
        debug!(investigation = %id, "Investigation loaded from repository");

        let mut map = self.investigations.write().await;
        let handle = map
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(Investigation::from_record(record))));
        Ok(handle.clone())
    }

    /// Run `agents` concurrently against the current findings and merge the
    /// results in the given order.
    async fn dispatch(
        &self,
        inv: &mut Investigation,
        agents: &[AgentKind],
        journal: &mut Vec<JournalEvent>,
    ) -> Result<Vec<AgentResult>> {
        let prior = inv.findings().to_vec();
        let prior_count = prior.len();
        let ctx = AgentContext::new(inv.id, inv.namespace.clone(), inv.context.clone(), prior, self.timeouts.fetch);

        let runs = agents.iter().map(|kind| {
            let ctx = ctx.clone();
            let agent = self.registry.get(*kind);
            let timeout = self.timeouts.agent;
            async move {
                match agent {
                    Some(agent) => run_bounded(agent, ctx, timeout).await,
                    None => AgentResult::failed(*kind, "no agent registered"),
                }
            }
        });
        let results = join_all(runs).await;

        let from = inv.status();
        for result in &results {
            inv.merge_agent_result(result, prior_count)?;
            match &result.error {
                Some(e) => warn!(investigation = %inv.id, agent = %result.agent, "Agent run degraded: {}", e),
                None => info!(
                    investigation = %inv.id,
                    agent = %result.agent,
                    findings = result.findings.len(),
                    elapsed_ms = result.elapsed_ms,
                    "Agent result merged"
                ),
            }
            journal.push(JournalEvent::AgentRun {
                agent: result.agent,
                findings: result.findings.len(),
                error: result.error.clone(),
                elapsed_ms: result.elapsed_ms,
            });
        }

        inv.mark_in_progress()?;
        if inv.status() != from {
            journal.push(JournalEvent::StatusChanged { from, to: inv.status() });
        }
        let watermark = inv.findings().len();
        for kind in agents {
            inv.record_executed(ActionPayload::RunAgent { agent_type: *kind }, watermark)?;
        }
        Ok(results)
    }

    /// Rerank hypotheses and replan next actions.
    async fn recompute(&self, inv: &mut Investigation, journal: &mut Vec<JournalEvent>) -> Result<()> {
        let outcome = self.engine.rank(inv).await;
        if let Some(reason) = outcome.reasoner_error {
            warn!(investigation = %inv.id, "Ranking fell back to rules: {}", reason);
            inv.record_evidence(EvidenceKind::ReasoningFailure, json!({ "reason": reason }))?;
            journal.push(JournalEvent::ReasonerFailed { reason });
        }
        let actions = self.planner.plan(inv, &outcome.hypotheses);
        journal.push(JournalEvent::Ranked {
            hypotheses: outcome.hypotheses.len(),
            top: outcome.hypotheses.first().map(|h| h.id.clone()),
            next_actions: actions.len(),
        });
        debug!(
            investigation = %inv.id,
            hypotheses = outcome.hypotheses.len(),
            next_actions = actions.len(),
            "Ranking recomputed"
        );
        inv.set_ranking(outcome.hypotheses, actions)
    }

    /// Answer `text` from the active findings and record the query.
    fn answer(&self, inv: &mut Investigation, text: &str) -> Result<String> {
        let needle = text.to_lowercase();
        let agents: Vec<AgentKind> = AgentKind::ALL
            .into_iter()
            .filter(|a| needle.contains(a.as_str()))
            .collect();

        let active = inv.evidence().active_findings();
        let by_component: Vec<_> = active
            .iter()
            .filter(|(_, f)| {
                needle.contains(&f.component.as_str().to_lowercase())
                    || needle
                        .split(|c: char| c.is_whitespace() || c == ',' || c == '?')
                        .any(|w| w == f.component.name().to_lowercase())
            })
            .collect();
        let matched: Vec<_> = if !by_component.is_empty() {
            by_component
        } else if !agents.is_empty() {
            active.iter().filter(|(_, f)| agents.contains(&f.agent)).collect()
        } else {
            active.iter().collect()
        };

        let mut reply = if matched.is_empty() {
            format!("No active findings match '{}'. {}", text.trim(), inv.summary())
        } else {
            let mut lines = vec![format!("{} matching findings:", matched.len())];
            let mut sorted = matched.clone();
            sorted.sort_by(|a, b| b.1.severity.cmp(&a.1.severity).then(a.0.cmp(&b.0)));
            for (_, finding) in sorted.iter().take(10) {
                lines.push(format!(
                    "- [{}] {}: {} ({})",
                    finding.severity.as_str(),
                    finding.component,
                    finding.issue,
                    finding.agent
                ));
            }
            lines.join("\n")
        };
        if let Some(top) = inv.hypotheses().first() {
            reply.push_str(&format!("\nLeading hypothesis: {} ({})", top.description, top.confidence));
        }

        let matched_count = matched.len();
        inv.record_evidence(EvidenceKind::Query, json!({ "text": text, "matched": matched_count }))?;
        let watermark = inv.findings().len();
        inv.record_executed(
            ActionPayload::Query {
                text: text.to_string(),
            },
            watermark,
        )?;
        Ok(reply)
    }

    /// Save `draft` and make it the live state. Until the record is written
    /// the live investigation is untouched, so a failed save leaves memory
    /// matching disk.
    async fn commit(&self, live: &mut Investigation, draft: Investigation, journal: Vec<JournalEvent>) -> Result<()> {
        self.repository.save(&draft.to_record()).await?;
        let id = draft.id;
        *live = draft;
        if !journal.is_empty() {
            self.repository.append_journal(id, journal).await?;
        }
        Ok(())
    }

    async fn persist(&self, inv: &Investigation, journal: Vec<JournalEvent>) -> Result<()> {
        self.repository.save(&inv.to_record()).await?;
        if !journal.is_empty() {
            self.repository.append_journal(inv.id, journal).await?;
        }
        Ok(())
    }
}

/// Assistant reply after agent runs.
fn describe_results(inv: &Investigation, results: &[AgentResult]) -> String {
    let mut lines: Vec<String> = results
        .iter()
        .map(|r| match &r.error {
            Some(e) => format!("{} analysis failed: {}", r.agent, e),
            None => r.summary.clone(),
        })
        .collect();
    let critical = results
        .iter()
        .flat_map(|r| &r.findings)
        .filter(|f| f.severity == Severity::Critical)
        .count();
    if critical > 0 {
        lines.push(format!("{} critical findings in this round", critical));
    }
    match inv.hypotheses().first() {
        Some(top) => lines.push(format!("Leading hypothesis: {} ({})", top.description, top.confidence)),
        None => lines.push("No hypotheses yet".to_string()),
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use triage_core::cluster::NamespaceFixture;
    use triage_core::StaticCluster;

    fn coordinator() -> Coordinator {
        let ns = NamespaceFixture {
            pods: vec![json!({
                "metadata": {"name": "api-0"},
                "status": {
                    "phase": "Running",
                    "containerStatuses": [{
                        "name": "api",
                        "restartCount": 12,
                        "state": {"waiting": {"reason": "CrashLoopBackOff"}}
                    }]
                }
            })],
            ..Default::default()
        };
        Coordinator::builder(Arc::new(StaticCluster::default().with_namespace("shop", ns))).build()
    }

    #[tokio::test]
    async fn test_start_rejects_unknown_namespace() {
        let err = coordinator().start_investigation("nope", None).await.unwrap_err();
        assert!(matches!(err, TriageError::Initialization(_)));
    }

    #[tokio::test]
    async fn test_start_rejects_unreachable_cluster() {
        let coordinator = Coordinator::builder(Arc::new(StaticCluster::unreachable())).build();
        let err = coordinator.start_investigation("shop", None).await.unwrap_err();
        assert!(matches!(err, TriageError::Initialization(_)));
    }

    #[tokio::test]
    async fn test_start_suggests_first_agents() {
        let view = coordinator()
            .start_investigation("shop", Some("checkout failing".into()))
            .await
            .unwrap();
        assert_eq!(view.status, InvestigationStatus::New);
        assert_eq!(view.title, "shop: checkout failing");
        assert_eq!(view.conversation.len(), 1);
        assert_eq!(
            view.next_actions[0].action,
            ActionPayload::RunAgent {
                agent_type: AgentKind::Logs
            }
        );
    }

    #[tokio::test]
    async fn test_query_answers_from_findings() {
        let coordinator = coordinator();
        let id = coordinator.start_investigation("shop", None).await.unwrap().id;
        coordinator.run_agent(id, AgentKind::Logs).await.unwrap();

        let answer = coordinator.query(id, "Show findings for Pod/api-0").await.unwrap();
        assert!(answer.contains("CrashLoopBackOff"));
        let answer = coordinator.query(id, "anything about traces").await.unwrap();
        assert!(answer.starts_with("No active findings"));
    }

    #[tokio::test]
    async fn test_user_message_runs_agent() {
        let coordinator = coordinator();
        let id = coordinator.start_investigation("shop", None).await.unwrap().id;
        let response = coordinator.handle_user_message(id, "check the logs").await.unwrap();
        assert_eq!(response.intent, Intent::RunAgent(AgentKind::Logs));
        assert_eq!(response.agent_results.len(), 1);
        assert!(response.reply.contains("Leading hypothesis"));
        // system, user, assistant
        assert_eq!(response.view.conversation.len(), 3);
        assert_eq!(response.view.status, InvestigationStatus::InProgress);
    }

    #[tokio::test]
    async fn test_accept_records_action_at_current_watermark() {
        let coordinator = coordinator();
        let id = coordinator.start_investigation("shop", None).await.unwrap().id;
        coordinator.run_agent(id, AgentKind::Logs).await.unwrap();
        let view = coordinator.get_view(id).await.unwrap();
        let top = view.hypotheses[0].id.clone();

        let resolved = coordinator.accept_hypothesis(id, &top).await.unwrap();
        assert_eq!(resolved.status, InvestigationStatus::Resolved);
        assert_eq!(resolved.accepted_hypothesis.as_ref(), Some(&top));

        let handle = coordinator.handle(id).await.unwrap();
        let inv = handle.lock().await;
        let last = inv.executed_actions().last().unwrap();
        assert_eq!(last.action, ActionPayload::AcceptHypothesis { id: top });
        assert_eq!(last.finding_watermark, view.findings.len());
    }

    #[tokio::test]
    async fn test_query_message_on_new_investigation() {
        let coordinator = coordinator();
        let id = coordinator.start_investigation("shop", None).await.unwrap().id;
        let response = coordinator
            .handle_user_message(id, "what is wrong with api-0?")
            .await
            .unwrap();
        assert!(matches!(response.intent, Intent::Query(_)));
        assert_eq!(response.view.status, InvestigationStatus::InProgress);
    }

    #[tokio::test]
    async fn test_bad_action_index() {
        let coordinator = coordinator();
        let id = coordinator.start_investigation("shop", None).await.unwrap().id;
        let err = coordinator.execute_next_action(id, 99).await.unwrap_err();
        assert!(matches!(err, TriageError::NotFound(_)));
    }
}
