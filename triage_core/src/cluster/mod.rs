//! Cluster data-access contract.
//!
//! The concrete cluster client lives outside this workspace; agents only see
//! this trait. Pod, workload and event descriptors are passed through as raw JSON so
//! that each agent validates the fields it relies on.

mod fixture;

pub use fixture::{ClusterFixture, NamespaceFixture, StaticCluster};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::ComponentId;

/// Errors reported by the cluster collaborator. Always recoverable at the
/// agent boundary.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ClusterError {
    #[error("cluster unreachable: {0}")]
    Unreachable(String),

    #[error("cluster API error: {0}")]
    Api(String),

    #[error("malformed cluster payload: {0}")]
    Malformed(String),

    #[error("cluster object not found: {0}")]
    NotFound(String),
}

/// Usage snapshot for one pod.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PodMetrics {
    pub pod: String,
    /// CPU usage as a percentage of the limit (or request when unlimited)
    pub cpu_percent: Option<f64>,
    /// Memory usage as a percentage of the limit
    pub memory_percent: Option<f64>,
    pub restart_count: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeCondition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: String,
    pub reason: Option<String>,
    pub message: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeStatus {
    pub name: String,
    pub ready: bool,
    pub conditions: Vec<NodeCondition>,
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceInfo {
    pub name: String,
    pub ready_endpoints: u32,
    /// Replicas of the workload backing the service
    pub replicas: u32,
}

/// `from` calls `to`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceSpan {
    pub trace_id: String,
    pub span_id: String,
    pub parent_id: Option<String>,
    pub service: String,
    pub operation: String,
    pub duration_ms: f64,
    pub error: bool,
}

/// Read-only access to cluster state.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn namespace_exists(&self, namespace: &str) -> Result<bool, ClusterError>;

    /// Pod descriptors in Kubernetes JSON shape.
    async fn list_pods(&self, namespace: &str) -> Result<Vec<Value>, ClusterError>;

    /// Deployment, StatefulSet and DaemonSet descriptors in Kubernetes JSON
    /// shape, each carrying its `kind`.
    async fn list_workloads(&self, namespace: &str) -> Result<Vec<Value>, ClusterError>;

    /// Event records in Kubernetes JSON shape.
    async fn list_events(&self, namespace: &str) -> Result<Vec<Value>, ClusterError>;

    async fn pod_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: Option<&str>,
        tail_lines: usize,
    ) -> Result<String, ClusterError>;

    async fn pod_metrics(&self, namespace: &str) -> Result<Vec<PodMetrics>, ClusterError>;

    async fn list_nodes(&self) -> Result<Vec<NodeStatus>, ClusterError>;

    async fn list_services(&self, namespace: &str) -> Result<Vec<ServiceInfo>, ClusterError>;

    async fn dependency_edges(&self, namespace: &str) -> Result<Vec<DependencyEdge>, ClusterError>;

    async fn trace_spans(&self, namespace: &str) -> Result<Vec<TraceSpan>, ClusterError>;

    /// Raw descriptor of one object, if it exists.
    async fn get_resource(
        &self,
        namespace: &str,
        component: &ComponentId,
    ) -> Result<Option<Value>, ClusterError>;
}
