//! Durability tests for the file repository.

use serde_json::json;
use tempfile::TempDir;
use triage_core::{
    ActionPayload, AgentKind, AgentResult, ComponentId, Confidence, EvidenceKind, FileRepository, Finding, Hypothesis,
    HypothesisId, HypothesisOrigin, Investigation, InvestigationRepository, InvestigationStatus, JournalEvent, Role,
    Severity,
};

fn populated() -> Investigation {
    let mut inv = Investigation::new("payments", Some("5xx on checkout".into()));
    inv.add_turn(Role::System, "Investigation started").unwrap();
    inv.add_turn(Role::User, "what is failing?").unwrap();
    inv.mark_in_progress().unwrap();
    let result = AgentResult {
        agent: AgentKind::Events,
        findings: vec![
            Finding::new(
                AgentKind::Events,
                ComponentId::pod("api-7d9"),
                "Pod failed scheduling",
                Severity::Critical,
                "0/3 nodes are available: 3 Insufficient memory",
            )
            .with_recommendation("Add capacity or lower requests"),
        ],
        reasoning_steps: Vec::new(),
        error: None,
        summary: "1 finding".into(),
        elapsed_ms: 12,
    };
    inv.merge_agent_result(&result, 0).unwrap();
    inv.record_evidence(EvidenceKind::Query, json!({"text": "show events"})).unwrap();
    inv.record_executed(ActionPayload::RunAgent { agent_type: AgentKind::Events }, 0)
        .unwrap();

    // one supporting and two refuting updates from the prior
    let weighed = Confidence::new(0.15).unwrap().weigh(0.8).weigh(-0.6).weigh(-0.6);
    let description = "Insufficient cluster capacity to schedule Pod/api-7d9";
    let hypothesis = Hypothesis {
        id: HypothesisId::derive(description, &[ComponentId::pod("api-7d9")]),
        description: description.into(),
        confidence: weighed,
        investigation_steps: vec!["Compare pod resource requests with allocatable node capacity".into()],
        related_components: vec![ComponentId::pod("api-7d9")],
        supporting_findings: vec![0],
        top_severity: Severity::Critical,
        newest_support: 0,
        origin: HypothesisOrigin::Rules,
    };
    inv.set_ranking(vec![hypothesis], Vec::new()).unwrap();
    inv
}

/// Test 1: Persist then reload yields an equivalent investigation
#[tokio::test]
async fn test_reload_is_equivalent() {
    let tmp = TempDir::new().unwrap();
    let repo = FileRepository::open(tmp.path()).await.unwrap();
    let inv = populated();
    repo.save(&inv.to_record()).await.unwrap();

    let reopened = FileRepository::open(tmp.path()).await.unwrap();
    let record = reopened.load(inv.id).await.unwrap().unwrap();
    let restored = Investigation::from_record(record);
    assert_eq!(restored.view(), inv.view());
    assert_eq!(restored.evidence(), inv.evidence());
    assert_eq!(restored.executed_actions(), inv.executed_actions());
    assert_eq!(restored.hypotheses(), inv.hypotheses());
}

/// Test 2: An interrupted save leaves the previous version readable
#[tokio::test]
async fn test_interrupted_save_keeps_previous_version() {
    let tmp = TempDir::new().unwrap();
    let repo = FileRepository::open(tmp.path()).await.unwrap();
    let inv = populated();
    repo.save(&inv.to_record()).await.unwrap();

    // A crash between writing the temp file and renaming it
    let tmp_path = tmp.path().join("investigations").join(format!("{}.tmp", inv.id));
    tokio::fs::write(&tmp_path, b"{\"checksum\": \"abc\", \"record\": {\"id\"").await.unwrap();

    let record = repo.load(inv.id).await.unwrap().unwrap();
    assert_eq!(record.accumulated_findings.len(), 1);
    assert_eq!(repo.list().await.unwrap().len(), 1);
}

/// Test 3: Persisted record exposes evidence keyed by action type
#[tokio::test]
async fn test_record_shape() {
    let tmp = TempDir::new().unwrap();
    let repo = FileRepository::open(tmp.path()).await.unwrap();
    let inv = populated();
    repo.save(&inv.to_record()).await.unwrap();

    let raw = tokio::fs::read_to_string(tmp.path().join("investigations").join(format!("{}.json", inv.id)))
        .await
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let record = &value["record"];
    assert!(record["evidence"]["agent_run"].is_array());
    assert!(record["evidence"]["query"].is_array());
    assert_eq!(record["agent_findings"]["events"].as_array().unwrap().len(), 1);
    assert_eq!(record["status"], "in_progress");
    assert_eq!(record["conversation"][1]["role"], "user");
}

/// Test 4: Journal survives reopen and keeps order
#[tokio::test]
async fn test_journal_order() {
    let tmp = TempDir::new().unwrap();
    let repo = FileRepository::open(tmp.path()).await.unwrap();
    let inv = populated();
    repo.append_journal(
        inv.id,
        vec![
            JournalEvent::Created { namespace: "payments".into(), context: None },
            JournalEvent::StatusChanged {
                from: InvestigationStatus::New,
                to: InvestigationStatus::InProgress,
            },
        ],
    )
    .await
    .unwrap();
    repo.append_journal(inv.id, vec![JournalEvent::Abandoned]).await.unwrap();

    let reopened = FileRepository::open(tmp.path()).await.unwrap();
    let entries = reopened.journal(inv.id).await.unwrap();
    assert_eq!(entries.len(), 3);
    assert!(matches!(entries[2].event, JournalEvent::Abandoned));
}

/// Test 5: Ranked hypotheses reload with bit-identical confidences
#[tokio::test]
async fn test_hypothesis_confidence_reloads_exactly() {
    let tmp = TempDir::new().unwrap();
    let repo = FileRepository::open(tmp.path()).await.unwrap();
    let inv = populated();
    repo.save(&inv.to_record()).await.unwrap();

    let record = repo.load(inv.id).await.unwrap().unwrap();
    assert_eq!(record.hypotheses.len(), 1);
    assert_eq!(
        record.hypotheses[0].confidence.get().to_bits(),
        inv.hypotheses()[0].confidence.get().to_bits()
    );
    assert_eq!(repo.list().await.unwrap().len(), 1);
}
