//! Hypothesis engine
//!
//! Turns the active findings of an investigation into a ranked list of
//! hypotheses. Rule candidates are grouped per component; collaborator
//! candidates are admitted only after validation and normalisation against
//! the same evidence. The collaborator's answer for an investigation's
//! latest finding set is cached, so ranking is idempotent even though the
//! collaborator is not. The cache holds one entry per investigation and at
//! most [`ORACLE_CACHE_CAPACITY`] investigations, dropping the least
//! recently stored.

use indexmap::IndexMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};
use triage_core::{
    ComponentId, Confidence, Finding, Hypothesis, HypothesisId, HypothesisOrigin, Investigation, InvestigationId,
    Severity,
};

use super::catalog::RootCause;
use super::oracle::{build_messages, parse_candidates, OracleCandidate};
use super::scoring;
use crate::client::{complete_with_timeout, ReasoningClient};

/// Upper bound on hypotheses kept per ranking.
pub const MAX_HYPOTHESES: usize = 10;

/// Investigations whose last collaborator answer is kept.
pub const ORACLE_CACHE_CAPACITY: usize = 64;

/// Result of one ranking pass.
#[derive(Clone, Debug, Default)]
pub struct RankingOutcome {
    pub hypotheses: Vec<Hypothesis>,
    /// Set when the collaborator failed or answered with unusable output
    pub reasoner_error: Option<String>,
}

type OracleResult = Result<Vec<OracleCandidate>, String>;

struct CachedOracle {
    fingerprint: String,
    result: OracleResult,
}

pub struct HypothesisEngine {
    client: Option<Arc<dyn ReasoningClient>>,
    timeout: Duration,
    /// Insertion order is recency of storage
    cache: Mutex<IndexMap<InvestigationId, CachedOracle>>,
}

impl HypothesisEngine {
    /// Rule-only engine.
    pub fn new() -> Self {
        Self {
            client: None,
            timeout: Duration::from_secs(20),
            cache: Mutex::new(IndexMap::new()),
        }
    }

    pub fn with_reasoner(client: Arc<dyn ReasoningClient>, timeout: Duration) -> Self {
        Self {
            client: Some(client),
            timeout,
            cache: Mutex::new(IndexMap::new()),
        }
    }

    pub fn has_reasoner(&self) -> bool {
        self.client.is_some()
    }

    /// Rank hypotheses for the current evidence of `investigation`.
    pub async fn rank(&self, investigation: &Investigation) -> RankingOutcome {
        let evidence = investigation.evidence();
        let active = evidence.active_findings();
        let cleared = evidence.cleared_findings();

        let mut hypotheses = rule_hypotheses(&active, &cleared);
        let mut reasoner_error = None;

        if let Some(client) = &self.client {
            if !active.is_empty() {
                let fingerprint = evidence.fingerprint();
                let cached = self.cached(investigation.id, &fingerprint);
                let oracle = match cached {
                    Some(result) => result,
                    None => {
                        let messages = build_messages(
                            &investigation.namespace,
                            investigation.context.as_deref(),
                            &active,
                            investigation.conversation(),
                        );
                        let result = complete_with_timeout(client.as_ref(), &messages, self.timeout)
                            .await
                            .and_then(|text| parse_candidates(&text))
                            .map_err(|e| e.to_string());
                        if let Err(e) = &result {
                            warn!("Reasoner unavailable for investigation {}: {}", investigation.id, e);
                            reasoner_error = Some(e.clone());
                        }
                        self.store(investigation.id, fingerprint, result.clone());
                        result
                    }
                };
                if let Ok(candidates) = oracle {
                    admit_oracle(&mut hypotheses, candidates, &active);
                }
            }
        }

        sort_ranking(&mut hypotheses);
        hypotheses.truncate(MAX_HYPOTHESES);
        debug!("Ranked {} hypotheses for investigation {}", hypotheses.len(), investigation.id);
        RankingOutcome {
            hypotheses,
            reasoner_error,
        }
    }

    fn cached(&self, id: InvestigationId, fingerprint: &str) -> Option<OracleResult> {
        let cache = self.cache.lock().ok()?;
        cache
            .get(&id)
            .filter(|entry| entry.fingerprint == fingerprint)
            .map(|entry| entry.result.clone())
    }

    fn store(&self, id: InvestigationId, fingerprint: String, result: OracleResult) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.shift_remove(&id);
            cache.insert(id, CachedOracle { fingerprint, result });
            while cache.len() > ORACLE_CACHE_CAPACITY {
                cache.shift_remove_index(0);
            }
        }
    }

    /// Number of investigations with a cached collaborator answer.
    pub fn cached_investigations(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl Default for HypothesisEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// One hypothesis per component that has at least one warning or critical
/// active finding.
fn rule_hypotheses(active: &[(usize, &Finding)], cleared: &[(usize, &Finding)]) -> Vec<Hypothesis> {
    let mut groups: IndexMap<&ComponentId, Vec<(usize, &Finding)>> = IndexMap::new();
    for &(seq, finding) in active {
        groups.entry(&finding.component).or_default().push((seq, finding));
    }

    groups
        .into_iter()
        .filter_map(|(component, members)| {
            let top_severity = members.iter().map(|(_, f)| f.severity).max()?;
            if top_severity == Severity::Info {
                return None;
            }
            // The most specific cause among the strongest findings names the hypothesis.
            let (cause, lead) = members
                .iter()
                .filter(|(_, f)| f.severity == top_severity)
                .map(|&(_, f)| (RootCause::classify(f), f))
                .min_by_key(|(cause, _)| cause.specificity())?;
            let description = cause.describe(component, lead);
            let contradicting = cleared
                .iter()
                .filter(|(_, f)| &f.component == component)
                .map(|(_, f)| *f);
            let confidence = scoring::score(members.iter().map(|(_, f)| *f), contradicting);
            let related_components = vec![component.clone()];
            Some(Hypothesis {
                id: HypothesisId::derive(&description, &related_components),
                investigation_steps: cause.investigation_steps(component),
                description,
                confidence,
                related_components,
                supporting_findings: members.iter().map(|(seq, _)| *seq).collect(),
                top_severity,
                newest_support: members.iter().map(|(seq, _)| *seq).max().unwrap_or(0),
                origin: HypothesisOrigin::Rules,
            })
        })
        .collect()
}

/// Normalise collaborator candidates against the evidence and merge them.
///
/// A candidate's confidence is averaged with the best evidence score of the
/// rule hypotheses for its components, so a candidate with no supporting
/// findings can never exceed 0.5.
fn admit_oracle(hypotheses: &mut Vec<Hypothesis>, candidates: Vec<OracleCandidate>, active: &[(usize, &Finding)]) {
    for candidate in candidates {
        let id = HypothesisId::derive(&candidate.description, &candidate.related_components);
        if hypotheses.iter().any(|h| h.id == id) {
            continue;
        }
        let evidence_score = hypotheses
            .iter()
            .filter(|h| h.origin == HypothesisOrigin::Rules)
            .filter(|h| h.related_components.iter().any(|c| candidate.related_components.contains(c)))
            .map(|h| h.confidence.get())
            .fold(0.0_f64, f64::max);
        let support: Vec<(usize, &Finding)> = active
            .iter()
            .filter(|(_, f)| candidate.related_components.contains(&f.component))
            .copied()
            .collect();
        let confidence = Confidence::saturating((candidate.confidence + evidence_score) / 2.0).capped(scoring::CEILING);
        hypotheses.push(Hypothesis {
            id,
            description: candidate.description,
            confidence,
            investigation_steps: candidate.investigation_steps,
            related_components: candidate.related_components,
            supporting_findings: support.iter().map(|(seq, _)| *seq).collect(),
            top_severity: support.iter().map(|(_, f)| f.severity).max().unwrap_or(Severity::Info),
            newest_support: support.iter().map(|(seq, _)| *seq).max().unwrap_or(0),
            origin: HypothesisOrigin::Reasoner,
        });
    }
}

/// Confidence first, then severity, then recency of support, then id.
pub fn sort_ranking(hypotheses: &mut [Hypothesis]) {
    hypotheses.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then(b.top_severity.cmp(&a.top_severity))
            .then(b.newest_support.cmp(&a.newest_support))
            .then(a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ChatMessage;
    use crate::errors::ReasoningError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use triage_core::{AgentKind, AgentResult};

    fn result(agent: AgentKind, findings: Vec<Finding>) -> AgentResult {
        AgentResult {
            agent,
            findings,
            reasoning_steps: Vec::new(),
            error: None,
            summary: String::new(),
            elapsed_ms: 0,
        }
    }

    fn critical(agent: AgentKind, pod: &str, issue: &str) -> Finding {
        Finding::new(agent, ComponentId::pod(pod), issue, Severity::Critical, "")
    }

    fn investigation_with(results: Vec<AgentResult>) -> Investigation {
        let mut inv = Investigation::new("shop", None);
        inv.mark_in_progress().unwrap();
        for r in results {
            let prior = inv.findings().len();
            inv.merge_agent_result(&r, prior).unwrap();
        }
        inv
    }

    #[tokio::test]
    async fn test_empty_findings_no_hypotheses() {
        let engine = HypothesisEngine::new();
        let outcome = engine.rank(&Investigation::new("shop", None)).await;
        assert!(outcome.hypotheses.is_empty());
    }

    #[tokio::test]
    async fn test_groups_by_component_and_ranks() {
        let inv = investigation_with(vec![
            result(AgentKind::Logs, vec![critical(AgentKind::Logs, "a", "OOMKilled")]),
            result(AgentKind::Events, vec![critical(AgentKind::Events, "a", "BackOff restarting")]),
            result(
                AgentKind::Metrics,
                vec![Finding::new(AgentKind::Metrics, ComponentId::pod("b"), "High CPU", Severity::Warning, "")],
            ),
        ]);
        let outcome = HypothesisEngine::new().rank(&inv).await;
        assert_eq!(outcome.hypotheses.len(), 2);
        assert_eq!(outcome.hypotheses[0].related_components, vec![ComponentId::pod("a")]);
        assert_eq!(outcome.hypotheses[0].description, "Memory exhaustion in Pod/a");
        assert!(outcome.hypotheses[0].confidence.get() > outcome.hypotheses[1].confidence.get());
    }

    #[tokio::test]
    async fn test_ties_break_on_severity_then_recency() {
        let mut hyps = vec![
            Hypothesis {
                id: HypothesisId::from("hyp-a"),
                description: "a".into(),
                confidence: Confidence::new(0.4).unwrap(),
                investigation_steps: vec![],
                related_components: vec![],
                supporting_findings: vec![0],
                top_severity: Severity::Warning,
                newest_support: 5,
                origin: HypothesisOrigin::Rules,
            },
            Hypothesis {
                id: HypothesisId::from("hyp-b"),
                description: "b".into(),
                confidence: Confidence::new(0.4).unwrap(),
                investigation_steps: vec![],
                related_components: vec![],
                supporting_findings: vec![1],
                top_severity: Severity::Critical,
                newest_support: 1,
                origin: HypothesisOrigin::Rules,
            },
            Hypothesis {
                id: HypothesisId::from("hyp-c"),
                description: "c".into(),
                confidence: Confidence::new(0.4).unwrap(),
                investigation_steps: vec![],
                related_components: vec![],
                supporting_findings: vec![2],
                top_severity: Severity::Critical,
                newest_support: 3,
                origin: HypothesisOrigin::Rules,
            },
        ];
        sort_ranking(&mut hyps);
        let order: Vec<_> = hyps.iter().map(|h| h.description.as_str()).collect();
        assert_eq!(order, vec!["c", "b", "a"]);
    }

    struct CountingReasoner {
        calls: AtomicUsize,
        answer: String,
    }

    #[async_trait]
    impl ReasoningClient for CountingReasoner {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, ReasoningError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            // A different answer every call; caching must hide that.
            Ok(self.answer.replace("0.9", if n == 0 { "0.9" } else { "0.1" }))
        }
    }

    #[tokio::test]
    async fn test_reasoner_output_is_idempotent() {
        let reasoner = Arc::new(CountingReasoner {
            calls: AtomicUsize::new(0),
            answer: r#"[{"description": "Bad deploy of a", "confidence": 0.9,
                         "investigation_steps": ["rollback"], "related_components": ["Pod/a"]}]"#
                .into(),
        });
        let engine = HypothesisEngine::with_reasoner(reasoner.clone(), Duration::from_secs(5));
        let inv = investigation_with(vec![result(AgentKind::Logs, vec![critical(AgentKind::Logs, "a", "OOMKilled")])]);

        let first = engine.rank(&inv).await;
        let second = engine.rank(&inv).await;
        assert_eq!(first.hypotheses, second.hypotheses);
        assert_eq!(reasoner.calls.load(Ordering::SeqCst), 1);
        assert!(first.hypotheses.iter().any(|h| h.origin == HypothesisOrigin::Reasoner));
    }

    #[tokio::test]
    async fn test_unsupported_reasoner_hypothesis_is_capped() {
        let reasoner = Arc::new(CountingReasoner {
            calls: AtomicUsize::new(0),
            answer: r#"[{"description": "Cosmic rays", "confidence": 1.0, "related_components": ["Node/x"]}]"#.into(),
        });
        let engine = HypothesisEngine::with_reasoner(reasoner, Duration::from_secs(5));
        let inv = investigation_with(vec![result(AgentKind::Logs, vec![critical(AgentKind::Logs, "a", "OOMKilled")])]);
        let outcome = engine.rank(&inv).await;
        let cosmic = outcome.hypotheses.iter().find(|h| h.description == "Cosmic rays").unwrap();
        assert!(cosmic.confidence.get() <= 0.5);
        assert!(cosmic.supporting_findings.is_empty());
    }

    #[tokio::test]
    async fn test_oracle_cache_is_bounded() {
        let reasoner = Arc::new(CountingReasoner {
            calls: AtomicUsize::new(0),
            answer: "[]".into(),
        });
        let engine = HypothesisEngine::with_reasoner(reasoner.clone(), Duration::from_secs(5));

        // new evidence replaces the investigation's entry
        let mut inv = investigation_with(vec![result(AgentKind::Logs, vec![critical(AgentKind::Logs, "a", "OOMKilled")])]);
        engine.rank(&inv).await;
        let prior = inv.findings().len();
        inv.merge_agent_result(
            &result(AgentKind::Events, vec![critical(AgentKind::Events, "a", "BackOff")]),
            prior,
        )
        .unwrap();
        engine.rank(&inv).await;
        assert_eq!(engine.cached_investigations(), 1);
        assert_eq!(reasoner.calls.load(Ordering::SeqCst), 2);

        for i in 0..ORACLE_CACHE_CAPACITY + 10 {
            let pod = format!("p{}", i);
            let other = investigation_with(vec![result(AgentKind::Logs, vec![critical(AgentKind::Logs, &pod, "OOMKilled")])]);
            engine.rank(&other).await;
        }
        assert_eq!(engine.cached_investigations(), ORACLE_CACHE_CAPACITY);

        // the oldest entry was evicted, so ranking it again asks again
        let calls = reasoner.calls.load(Ordering::SeqCst);
        engine.rank(&inv).await;
        assert_eq!(reasoner.calls.load(Ordering::SeqCst), calls + 1);
    }

    struct Garbage;

    #[async_trait]
    impl ReasoningClient for Garbage {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, ReasoningError> {
            Ok("I think it is DNS".into())
        }
    }

    #[tokio::test]
    async fn test_malformed_reasoner_output_degrades() {
        let engine = HypothesisEngine::with_reasoner(Arc::new(Garbage), Duration::from_secs(5));
        let inv = investigation_with(vec![result(AgentKind::Logs, vec![critical(AgentKind::Logs, "a", "OOMKilled")])]);
        let outcome = engine.rank(&inv).await;
        assert_eq!(outcome.hypotheses.len(), 1);
        assert!(outcome.reasoner_error.unwrap().contains("Malformed"));
    }
}
