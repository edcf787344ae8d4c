//! Resource analysis: usage against limits for pods and nodes, replica
//! shortfalls for workloads, and pods stuck outside a healthy state.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use triage_core::{AgentKind, AgentResult, ClusterClient, ClusterError, ComponentId, Severity};

use super::{resources, AgentContext, AnalysisRecorder, DiagnosticAgent};
use crate::{AgentError, Result};

const PRESSURE_CONDITIONS: [&str; 3] = ["MemoryPressure", "DiskPressure", "PIDPressure"];

pub struct MetricsAgent {
    cluster: Arc<dyn ClusterClient>,
    warning_percent: f64,
    critical_percent: f64,
    /// Memory share at which restarts are read as OOM kills
    oom_percent: f64,
}

impl MetricsAgent {
    pub fn new(cluster: Arc<dyn ClusterClient>) -> Self {
        Self {
            cluster,
            warning_percent: 80.0,
            critical_percent: 90.0,
            oom_percent: 95.0,
        }
    }

    fn level(&self, percent: f64) -> Option<Severity> {
        if percent > self.critical_percent {
            Some(Severity::Critical)
        } else if percent > self.warning_percent {
            Some(Severity::Warning)
        } else {
            None
        }
    }

    async fn scan(&self, ctx: &AgentContext, rec: &mut AnalysisRecorder) -> Result<()> {
        let pods = ctx
            .fetch("pod metrics", self.cluster.pod_metrics(&ctx.namespace))
            .await?;
        let nodes = optional(ctx, rec, "node status", self.cluster.list_nodes()).await?;
        let workloads = optional(ctx, rec, "workloads", self.cluster.list_workloads(&ctx.namespace)).await?;
        let pod_states = optional(ctx, rec, "pod status", self.cluster.list_pods(&ctx.namespace)).await?;

        if pods.is_empty() && nodes.is_empty() && workloads.is_empty() && pod_states.is_empty() {
            rec.step(
                format!("No metrics reported for namespace {}", ctx.namespace),
                "Nothing to analyse; metrics server may not be installed",
            );
            return Ok(());
        }

        for pod in &pods {
            let component = ComponentId::pod(&pod.pod);
            if let Some(cpu) = pod.cpu_percent {
                if let Some(severity) = self.level(cpu) {
                    rec.finding(
                        component.clone(),
                        format!("High CPU usage ({:.0}% of limit)", cpu),
                        severity,
                        format!("cpu={:.1}%", cpu),
                        "Check for hot loops or raise the CPU limit",
                    );
                }
            }
            if let Some(memory) = pod.memory_percent {
                if memory >= self.oom_percent && pod.restart_count > 0 {
                    rec.finding(
                        component.clone(),
                        format!(
                            "Memory at {:.0}% of limit with {} restarts (likely OOM kills)",
                            memory, pod.restart_count
                        ),
                        Severity::Critical,
                        format!("memory={:.1}% restarts={}", memory, pod.restart_count),
                        "Raise the memory limit or look for a leak",
                    );
                } else if let Some(severity) = self.level(memory) {
                    rec.finding(
                        component.clone(),
                        format!("High memory usage ({:.0}% of limit)", memory),
                        severity,
                        format!("memory={:.1}%", memory),
                        "Review memory limits and usage trend",
                    );
                }
            }
        }

        for node in &nodes {
            let component = ComponentId::node(&node.name);
            if !node.ready {
                rec.finding(
                    component.clone(),
                    "Node not ready",
                    Severity::Critical,
                    format!("node {} Ready=False", node.name),
                    "Check kubelet and node health",
                );
            }
            for condition in &node.conditions {
                if PRESSURE_CONDITIONS.contains(&condition.condition_type.as_str()) && condition.status == "True" {
                    rec.finding(
                        component.clone(),
                        format!("Node under {}", condition.condition_type),
                        Severity::Critical,
                        condition
                            .message
                            .clone()
                            .or_else(|| condition.reason.clone())
                            .unwrap_or_else(|| format!("{}=True", condition.condition_type)),
                        "Free resources on the node or move workloads elsewhere",
                    );
                }
            }
            for (label, value) in [("CPU", node.cpu_percent), ("memory", node.memory_percent)] {
                if let Some(severity) = value.and_then(|v| self.level(v)) {
                    let value = value.unwrap_or_default();
                    rec.finding(
                        component.clone(),
                        format!("High node {} usage ({:.0}%)", label, value),
                        severity,
                        format!("{}={:.1}%", label.to_lowercase(), value),
                        "Rebalance workloads or add capacity",
                    );
                }
            }
        }

        let short = resources::check_workloads(&workloads, rec)?;
        resources::check_pod_states(&pod_states, rec)?;
        if rec.has_any() {
            let events = optional(ctx, rec, "events", self.cluster.list_events(&ctx.namespace)).await?;
            resources::note_events(&events, rec);
        }

        let conclusion = if rec.has_any() {
            "Resource pressure detected"
        } else {
            "Resource usage within limits"
        };
        rec.step(
            format!(
                "Checked {} pods and {} nodes against usage thresholds, {} workloads ({} short of replicas) and {} pod states",
                pods.len(),
                nodes.len(),
                workloads.len(),
                short,
                pod_states.len()
            ),
            conclusion,
        );
        Ok(())
    }
}

/// Fetch supporting data whose absence narrows the analysis rather than
/// failing it. Timeouts still propagate.
async fn optional<T, F>(ctx: &AgentContext, rec: &mut AnalysisRecorder, what: &str, call: F) -> Result<Vec<T>>
where
    F: Future<Output = std::result::Result<Vec<T>, ClusterError>>,
{
    match ctx.fetch(what, call).await {
        Ok(items) => Ok(items),
        Err(AgentError::Upstream(e)) => {
            rec.step(format!("{} unavailable: {}", capitalize(what), e), format!("Analysing without {}", what));
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[async_trait]
impl DiagnosticAgent for MetricsAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Metrics
    }

    async fn analyze(&self, ctx: &AgentContext) -> Result<AgentResult> {
        let mut rec = AnalysisRecorder::new(self.kind());
        let outcome = self.scan(ctx, &mut rec).await;
        rec.conclude(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use triage_core::cluster::{NamespaceFixture, NodeCondition, NodeStatus, PodMetrics};
    use triage_core::{InvestigationId, StaticCluster};

    fn ctx() -> AgentContext {
        AgentContext::new(InvestigationId::new(), "shop", None, Vec::new(), Duration::from_secs(1))
    }

    fn pod(name: &str, cpu: f64, memory: f64, restarts: u32) -> PodMetrics {
        PodMetrics {
            pod: name.into(),
            cpu_percent: Some(cpu),
            memory_percent: Some(memory),
            restart_count: restarts,
        }
    }

    #[tokio::test]
    async fn test_thresholds() {
        let ns = NamespaceFixture {
            metrics: vec![
                pod("calm", 20.0, 30.0, 0),
                pod("busy", 85.0, 40.0, 0),
                pod("hot", 97.0, 40.0, 0),
                pod("leaky", 10.0, 96.0, 3),
            ],
            ..Default::default()
        };
        let agent = MetricsAgent::new(Arc::new(StaticCluster::default().with_namespace("shop", ns)));
        let result = agent.analyze(&ctx()).await.unwrap();

        assert_eq!(result.findings.len(), 3);
        let severity = |name: &str| {
            result
                .findings
                .iter()
                .find(|f| f.component == ComponentId::pod(name))
                .map(|f| f.severity)
        };
        assert_eq!(severity("calm"), None);
        assert_eq!(severity("busy"), Some(Severity::Warning));
        assert_eq!(severity("hot"), Some(Severity::Critical));
        assert_eq!(severity("leaky"), Some(Severity::Critical));
    }

    #[tokio::test]
    async fn test_node_pressure() {
        let node = NodeStatus {
            name: "worker-1".into(),
            ready: true,
            conditions: vec![NodeCondition {
                condition_type: "DiskPressure".into(),
                status: "True".into(),
                reason: None,
                message: Some("ephemeral storage low".into()),
            }],
            cpu_percent: None,
            memory_percent: None,
        };
        let cluster = StaticCluster::default()
            .with_namespace("shop", NamespaceFixture::default())
            .with_nodes(vec![node]);
        let result = MetricsAgent::new(Arc::new(cluster)).analyze(&ctx()).await.unwrap();
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].component, ComponentId::node("worker-1"));
        assert_eq!(result.findings[0].severity, Severity::Critical);
    }

    #[tokio::test]
    async fn test_empty_metrics_is_not_an_error() {
        let cluster = StaticCluster::default().with_namespace("shop", NamespaceFixture::default());
        let result = MetricsAgent::new(Arc::new(cluster)).analyze(&ctx()).await.unwrap();
        assert!(result.findings.is_empty());
        assert!(result.error.is_none());
        assert_eq!(result.reasoning_steps.len(), 1);
    }

    #[tokio::test]
    async fn test_replica_shortfall_and_pod_state() {
        let ns = NamespaceFixture {
            workloads: vec![json!({
                "kind": "Deployment",
                "metadata": {"name": "api"},
                "spec": {"replicas": 2},
                "status": {"readyReplicas": 0}
            })],
            pods: vec![json!({
                "metadata": {"name": "api-7f9c"},
                "status": {
                    "phase": "Pending",
                    "conditions": [{"type": "PodScheduled", "status": "False", "reason": "Unschedulable"}]
                }
            })],
            events: vec![json!({
                "type": "Warning",
                "reason": "FailedScheduling",
                "involvedObject": {"kind": "Pod", "name": "api-7f9c"}
            })],
            ..Default::default()
        };
        let agent = MetricsAgent::new(Arc::new(StaticCluster::default().with_namespace("shop", ns)));
        let result = agent.analyze(&ctx()).await.unwrap();

        assert_eq!(result.findings.len(), 2);
        assert_eq!(result.findings[0].component, ComponentId::new("Deployment", "api"));
        assert_eq!(result.findings[0].severity, Severity::Critical);
        assert_eq!(result.findings[1].component, ComponentId::pod("api-7f9c"));
        assert_eq!(result.findings[1].issue, "Pod cannot be scheduled");
        assert!(result
            .reasoning_steps
            .iter()
            .any(|s| s.observation == "Pod/api-7f9c has warning events: FailedScheduling"));
        assert!(result.reasoning_steps.last().unwrap().observation.contains("1 short of replicas"));
    }

    #[tokio::test]
    async fn test_unreachable_cluster_is_an_error() {
        let agent = MetricsAgent::new(Arc::new(StaticCluster::unreachable()));
        assert!(matches!(agent.analyze(&ctx()).await, Err(AgentError::Upstream(_))));
    }
}
