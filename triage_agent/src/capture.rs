//! Raw evidence capture for accepted root causes.

use chrono::Utc;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use triage_core::storage::{ComponentSnapshot, EvidenceBundle};
use triage_core::{ClusterClient, ClusterError, ComponentId, Finding, Hypothesis, Investigation};

async fn bounded<T, F>(what: &str, timeout: Duration, errors: &mut Vec<String>, call: F) -> Option<T>
where
    F: Future<Output = Result<T, ClusterError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            errors.push(format!("{}: {}", what, e));
            None
        }
        Err(_) => {
            errors.push(format!("{}: timed out after {:?}", what, timeout));
            None
        }
    }
}

fn involves(event: &Value, component: &ComponentId) -> bool {
    let object = |field: &str| {
        event
            .pointer(&format!("/involvedObject/{}", field))
            .and_then(Value::as_str)
    };
    object("kind") == Some(component.kind()) && object("name") == Some(component.name())
}

/// Gather the raw state of one component. Fetch failures are recorded in the
/// bundle instead of aborting the capture.
pub async fn gather_bundle(
    cluster: &dyn ClusterClient,
    namespace: &str,
    component: &ComponentId,
    tail_lines: usize,
    fetch_timeout: Duration,
) -> EvidenceBundle {
    let mut bundle = EvidenceBundle::default();
    let errors = &mut bundle.errors;

    bundle.resource = bounded("resource", fetch_timeout, errors, cluster.get_resource(namespace, component))
        .await
        .flatten();

    if component.kind() == "Pod" {
        bundle.logs = bounded(
            "logs",
            fetch_timeout,
            errors,
            cluster.pod_logs(namespace, component.name(), None, tail_lines),
        )
        .await;
    }

    if let Some(events) = bounded("events", fetch_timeout, errors, cluster.list_events(namespace)).await {
        bundle.events = events.into_iter().filter(|e| involves(e, component)).collect();
    }

    let node_name = match component.kind() {
        "Node" => Some(component.name().to_string()),
        _ => bundle
            .resource
            .as_ref()
            .and_then(|r| r.pointer("/spec/nodeName"))
            .and_then(Value::as_str)
            .map(String::from),
    };
    if let Some(node_name) = node_name {
        if let Some(nodes) = bounded("nodes", fetch_timeout, errors, cluster.list_nodes()).await {
            bundle.node_status = nodes.into_iter().filter(|n| n.name == node_name).collect();
        }
    }
    bundle
}

/// For each component the hypothesis implicates, the newest finding that
/// supports it, falling back to the newest finding on that component.
pub fn implicated_findings<'a>(
    investigation: &'a Investigation,
    hypothesis: &Hypothesis,
) -> Vec<(ComponentId, &'a Finding)> {
    let findings = investigation.findings();
    hypothesis
        .related_components
        .iter()
        .filter_map(|component| {
            let supporting = hypothesis
                .supporting_findings
                .iter()
                .filter_map(|seq| findings.get(*seq))
                .filter(|f| &f.component == component)
                .last();
            let finding = supporting.or_else(|| findings.iter().rev().find(|f| &f.component == component))?;
            Some((component.clone(), finding))
        })
        .collect()
}

/// Build one snapshot per implicated component.
pub async fn capture_snapshots(
    cluster: &dyn ClusterClient,
    investigation: &Investigation,
    hypothesis: &Hypothesis,
    tail_lines: usize,
    fetch_timeout: Duration,
) -> Vec<ComponentSnapshot> {
    let mut snapshots = Vec::new();
    for (component, finding) in implicated_findings(investigation, hypothesis) {
        let evidence = gather_bundle(cluster, &investigation.namespace, &component, tail_lines, fetch_timeout).await;
        snapshots.push(ComponentSnapshot {
            timestamp: Utc::now(),
            investigation: investigation.id,
            component,
            finding: finding.clone(),
            hypothesis: Some(hypothesis.clone()),
            evidence,
        });
    }
    snapshots
}
