//! Shared fixtures for coordinator tests.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::Arc;
use triage_agent::Coordinator;
use triage_core::cluster::{DependencyEdge, NamespaceFixture, PodMetrics, ServiceInfo};
use triage_core::StaticCluster;

pub fn crashing_pod(name: &str) -> Value {
    json!({
        "metadata": {"name": name},
        "spec": {"nodeName": "node-a"},
        "status": {
            "phase": "Running",
            "containerStatuses": [{
                "name": "app",
                "restartCount": 12,
                "state": {"waiting": {"reason": "CrashLoopBackOff", "message": "back-off 5m0s restarting"}}
            }]
        }
    })
}

pub fn init_failing_pod(name: &str) -> Value {
    json!({
        "metadata": {"name": name},
        "status": {
            "phase": "Pending",
            "initContainerStatuses": [{
                "name": "migrate",
                "restartCount": 0,
                "state": {"terminated": {"exitCode": 1, "reason": "Error"}}
            }],
            "containerStatuses": [{
                "name": "app",
                "restartCount": 0,
                "state": {"waiting": {"reason": "PodInitializing"}}
            }]
        }
    })
}

pub fn warning_event(kind: &str, name: &str, reason: &str) -> Value {
    json!({
        "type": "Warning",
        "reason": reason,
        "message": format!("{} on {}", reason, name),
        "count": 1,
        "involvedObject": {"kind": kind, "name": name}
    })
}

/// A namespace with a crash-looping api pod behind an unavailable service.
pub fn shop() -> NamespaceFixture {
    NamespaceFixture {
        pods: vec![crashing_pod("api-0"), json!({"metadata": {"name": "web-0"}, "status": {"phase": "Running"}})],
        events: vec![warning_event("Pod", "api-0", "BackOff")],
        logs: [(
            "api-0".to_string(),
            "starting\nERROR connection refused to db:5432\nexiting".to_string(),
        )]
        .into_iter()
        .collect(),
        metrics: vec![PodMetrics {
            pod: "api-0".into(),
            cpu_percent: Some(20.0),
            memory_percent: Some(40.0),
            restart_count: 12,
        }],
        services: vec![
            ServiceInfo {
                name: "api".into(),
                ready_endpoints: 0,
                replicas: 1,
            },
            ServiceInfo {
                name: "web".into(),
                ready_endpoints: 2,
                replicas: 2,
            },
        ],
        edges: vec![DependencyEdge {
            from: "web".into(),
            to: "api".into(),
        }],
        ..Default::default()
    }
}

pub fn cluster(namespace: NamespaceFixture) -> Arc<StaticCluster> {
    Arc::new(StaticCluster::default().with_namespace("shop", namespace))
}

/// In-memory coordinator over the `shop` namespace.
pub fn coordinator(namespace: NamespaceFixture) -> Coordinator {
    Coordinator::builder(cluster(namespace)).build()
}
