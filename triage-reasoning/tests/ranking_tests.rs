//! Ranking properties over full investigations.

use triage_core::{AgentKind, AgentResult, ComponentId, Finding, Investigation, Severity};
use triage_reasoning::HypothesisEngine;

fn run(agent: AgentKind, findings: Vec<Finding>) -> AgentResult {
    AgentResult {
        agent,
        findings,
        reasoning_steps: Vec::new(),
        error: None,
        summary: String::new(),
        elapsed_ms: 0,
    }
}

fn finding(agent: AgentKind, component: ComponentId, issue: &str, severity: Severity) -> Finding {
    Finding::new(agent, component, issue, severity, "excerpt")
}

fn merge(inv: &mut Investigation, result: AgentResult) {
    let prior = inv.findings().len();
    inv.merge_agent_result(&result, prior).unwrap();
}

fn open_investigation() -> Investigation {
    let mut inv = Investigation::new("shop", Some("checkout failing".into()));
    inv.mark_in_progress().unwrap();
    inv
}

/// Test 1: Every confidence stays within bounds
#[tokio::test]
async fn test_confidence_bounds() {
    let mut inv = open_investigation();
    for agent in AgentKind::ALL {
        let findings = (0..5)
            .map(|i| finding(agent, ComponentId::pod(&format!("p{}", i % 2)), "crash", Severity::Critical))
            .collect();
        merge(&mut inv, run(agent, findings));
    }
    let outcome = HypothesisEngine::new().rank(&inv).await;
    assert!(!outcome.hypotheses.is_empty());
    for h in &outcome.hypotheses {
        assert!((0.0..=1.0).contains(&h.confidence.get()));
    }
}

/// Test 2: Ranking the same evidence twice is identical
#[tokio::test]
async fn test_ranking_idempotent() {
    let mut inv = open_investigation();
    merge(
        &mut inv,
        run(
            AgentKind::Metrics,
            vec![
                finding(AgentKind::Metrics, ComponentId::pod("a"), "High memory usage 95%", Severity::Critical),
                finding(AgentKind::Metrics, ComponentId::pod("b"), "High CPU usage 85%", Severity::Warning),
            ],
        ),
    );
    let engine = HypothesisEngine::new();
    let first = engine.rank(&inv).await.hypotheses;
    let second = engine.rank(&inv).await.hypotheses;
    assert_eq!(first, second);
}

/// Test 3: Independent corroboration raises the leading hypothesis
#[tokio::test]
async fn test_corroboration_raises_confidence() {
    let engine = HypothesisEngine::new();
    let mut inv = open_investigation();
    merge(
        &mut inv,
        run(AgentKind::Logs, vec![finding(AgentKind::Logs, ComponentId::pod("a"), "OOMKilled", Severity::Critical)]),
    );
    let before = engine.rank(&inv).await.hypotheses[0].confidence.get();

    merge(
        &mut inv,
        run(
            AgentKind::Events,
            vec![finding(AgentKind::Events, ComponentId::pod("a"), "OOMKilling event", Severity::Critical)],
        ),
    );
    let after = engine.rank(&inv).await.hypotheses[0].confidence.get();
    assert!(after > before, "{} should exceed {}", after, before);
}

/// Test 4: A clean re-run that withdraws a finding lowers confidence
#[tokio::test]
async fn test_contradiction_lowers_confidence() {
    let engine = HypothesisEngine::new();
    let mut inv = open_investigation();
    merge(
        &mut inv,
        run(AgentKind::Logs, vec![finding(AgentKind::Logs, ComponentId::pod("a"), "OOMKilled", Severity::Critical)]),
    );
    merge(
        &mut inv,
        run(
            AgentKind::Metrics,
            vec![finding(AgentKind::Metrics, ComponentId::pod("a"), "High memory usage", Severity::Warning)],
        ),
    );
    let corroborated = engine.rank(&inv).await.hypotheses[0].confidence.get();

    // Metrics runs again and no longer sees the pod
    merge(&mut inv, run(AgentKind::Metrics, vec![]));
    let contradicted = engine.rank(&inv).await.hypotheses[0].confidence.get();
    assert!(contradicted < corroborated);
}

/// Test 5: Stale hypotheses disappear once all support is withdrawn
#[tokio::test]
async fn test_stale_hypothesis_discarded() {
    let engine = HypothesisEngine::new();
    let mut inv = open_investigation();
    merge(
        &mut inv,
        run(
            AgentKind::Metrics,
            vec![finding(AgentKind::Metrics, ComponentId::pod("a"), "High CPU usage", Severity::Warning)],
        ),
    );
    assert_eq!(engine.rank(&inv).await.hypotheses.len(), 1);
    merge(&mut inv, run(AgentKind::Metrics, vec![]));
    assert!(engine.rank(&inv).await.hypotheses.is_empty());
    assert_eq!(inv.findings().len(), 1);
}

/// Test 6: Supporting findings reference real sequence numbers
#[tokio::test]
async fn test_supporting_findings_are_valid() {
    let mut inv = open_investigation();
    merge(
        &mut inv,
        run(AgentKind::Logs, vec![finding(AgentKind::Logs, ComponentId::pod("a"), "crash", Severity::Critical)]),
    );
    merge(
        &mut inv,
        run(AgentKind::Events, vec![finding(AgentKind::Events, ComponentId::pod("a"), "BackOff", Severity::Warning)]),
    );
    let outcome = HypothesisEngine::new().rank(&inv).await;
    let top = &outcome.hypotheses[0];
    assert_eq!(top.supporting_findings, vec![0, 1]);
    assert_eq!(top.newest_support, 1);
    assert_eq!(top.top_severity, Severity::Critical);
    for seq in &top.supporting_findings {
        assert_eq!(inv.findings()[*seq].component, ComponentId::pod("a"));
    }
}
