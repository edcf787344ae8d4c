//! In-memory cluster backed by a JSON fixture.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use super::{ClusterClient, ClusterError, DependencyEdge, NodeStatus, PodMetrics, ServiceInfo, TraceSpan};
use crate::types::ComponentId;

/// State of one namespace.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceFixture {
    pub pods: Vec<Value>,
    /// Deployments, StatefulSets and DaemonSets
    pub workloads: Vec<Value>,
    pub events: Vec<Value>,
    /// Keyed by `pod` or `pod/container`
    pub logs: BTreeMap<String, String>,
    pub metrics: Vec<PodMetrics>,
    pub services: Vec<ServiceInfo>,
    pub edges: Vec<DependencyEdge>,
    pub spans: Vec<TraceSpan>,
}

/// Whole-cluster fixture document.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterFixture {
    pub namespaces: BTreeMap<String, NamespaceFixture>,
    pub nodes: Vec<NodeStatus>,
}

/// A `ClusterClient` serving a fixed snapshot.
#[derive(Clone, Debug, Default)]
pub struct StaticCluster {
    fixture: ClusterFixture,
    unreachable: bool,
}

impl StaticCluster {
    pub fn new(fixture: ClusterFixture) -> Self {
        Self {
            fixture,
            unreachable: false,
        }
    }

    /// A cluster whose every call fails as unreachable.
    pub fn unreachable() -> Self {
        Self {
            fixture: ClusterFixture::default(),
            unreachable: true,
        }
    }

    pub fn with_namespace(mut self, name: impl Into<String>, namespace: NamespaceFixture) -> Self {
        self.fixture.namespaces.insert(name.into(), namespace);
        self
    }

    pub fn with_nodes(mut self, nodes: Vec<NodeStatus>) -> Self {
        self.fixture.nodes = nodes;
        self
    }

    pub async fn from_json_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        let fixture: ClusterFixture = serde_json::from_slice(&bytes)?;
        Ok(Self::new(fixture))
    }

    fn namespace(&self, name: &str) -> Result<&NamespaceFixture, ClusterError> {
        if self.unreachable {
            return Err(ClusterError::Unreachable("static cluster marked unreachable".into()));
        }
        self.fixture
            .namespaces
            .get(name)
            .ok_or_else(|| ClusterError::NotFound(format!("namespace {}", name)))
    }
}

fn object_name(value: &Value) -> Option<&str> {
    value.pointer("/metadata/name").and_then(Value::as_str)
}

#[async_trait]
impl ClusterClient for StaticCluster {
    async fn namespace_exists(&self, namespace: &str) -> Result<bool, ClusterError> {
        if self.unreachable {
            return Err(ClusterError::Unreachable("static cluster marked unreachable".into()));
        }
        Ok(self.fixture.namespaces.contains_key(namespace))
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Value>, ClusterError> {
        Ok(self.namespace(namespace)?.pods.clone())
    }

    async fn list_workloads(&self, namespace: &str) -> Result<Vec<Value>, ClusterError> {
        Ok(self.namespace(namespace)?.workloads.clone())
    }

    async fn list_events(&self, namespace: &str) -> Result<Vec<Value>, ClusterError> {
        Ok(self.namespace(namespace)?.events.clone())
    }

    async fn pod_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        tail_lines: usize,
    ) -> Result<String, ClusterError> {
        let ns = self.namespace(namespace)?;
        let text = container
            .and_then(|c| ns.logs.get(&format!("{}/{}", pod, c)))
            .or_else(|| ns.logs.get(pod))
            .cloned()
            .unwrap_or_default();
        let lines: Vec<&str> = text.lines().collect();
        let start = lines.len().saturating_sub(tail_lines);
        Ok(lines[start..].join("\n"))
    }

    async fn pod_metrics(&self, namespace: &str) -> Result<Vec<PodMetrics>, ClusterError> {
        Ok(self.namespace(namespace)?.metrics.clone())
    }

    async fn list_nodes(&self) -> Result<Vec<NodeStatus>, ClusterError> {
        if self.unreachable {
            return Err(ClusterError::Unreachable("static cluster marked unreachable".into()));
        }
        Ok(self.fixture.nodes.clone())
    }

    async fn list_services(&self, namespace: &str) -> Result<Vec<ServiceInfo>, ClusterError> {
        Ok(self.namespace(namespace)?.services.clone())
    }

    async fn dependency_edges(&self, namespace: &str) -> Result<Vec<DependencyEdge>, ClusterError> {
        Ok(self.namespace(namespace)?.edges.clone())
    }

    async fn trace_spans(&self, namespace: &str) -> Result<Vec<TraceSpan>, ClusterError> {
        Ok(self.namespace(namespace)?.spans.clone())
    }

    async fn get_resource(
        &self,
        namespace: &str,
        component: &ComponentId,
    ) -> Result<Option<Value>, ClusterError> {
        let ns = self.namespace(namespace)?;
        let found = match component.kind() {
            "Pod" => ns
                .pods
                .iter()
                .find(|p| object_name(p) == Some(component.name()))
                .cloned(),
            "Service" => ns
                .services
                .iter()
                .find(|s| s.name == component.name())
                .map(|s| serde_json::to_value(s).unwrap_or(Value::Null)),
            "Node" => self
                .fixture
                .nodes
                .iter()
                .find(|n| n.name == component.name())
                .map(|n| serde_json::to_value(n).unwrap_or(Value::Null)),
            "Deployment" | "StatefulSet" | "DaemonSet" => ns
                .workloads
                .iter()
                .find(|w| {
                    w.get("kind").and_then(Value::as_str) == Some(component.kind())
                        && object_name(w) == Some(component.name())
                })
                .cloned(),
            _ => None,
        };
        Ok(found)
    }
}
