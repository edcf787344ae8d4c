//! Kubernetes event analysis.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use triage_core::{AgentKind, AgentResult, ClusterClient, ComponentId, Severity};

use super::{require_str, AgentContext, AnalysisRecorder, DiagnosticAgent};
use crate::Result;

const CRITICAL_REASONS: [&str; 21] = [
    "Failed",
    "FailedCreate",
    "FailedScheduling",
    "FailedMount",
    "FailedAttachVolume",
    "FailedDetachVolume",
    "NodeNotReady",
    "KubeletNotReady",
    "FreeDiskSpaceFailed",
    "OutOfDisk",
    "MemoryPressure",
    "DiskPressure",
    "NetworkUnavailable",
    "Unhealthy",
    "FailedSync",
    "Evicted",
    "BackOff",
    "Error",
    "OOMKilling",
    "FailedCreatePodSandBox",
    "ErrImagePull",
];

/// A validated event record.
struct EventRecord<'a> {
    event_type: &'a str,
    reason: &'a str,
    component: ComponentId,
    message: &'a str,
    count: u64,
}

impl<'a> EventRecord<'a> {
    fn parse(value: &'a Value) -> Result<Self> {
        let event_type = require_str(value, "/type")?;
        let reason = require_str(value, "/reason")?;
        let kind = require_str(value, "/involvedObject/kind")?;
        let name = require_str(value, "/involvedObject/name")?;
        Ok(Self {
            event_type,
            reason,
            component: ComponentId::new(kind, name),
            message: value.get("message").and_then(Value::as_str).unwrap_or(""),
            count: value.get("count").and_then(Value::as_u64).unwrap_or(1),
        })
    }
}

pub struct EventsAgent {
    cluster: Arc<dyn ClusterClient>,
    repeat_threshold: usize,
    flapping_count: u64,
}

impl EventsAgent {
    pub fn new(cluster: Arc<dyn ClusterClient>) -> Self {
        Self {
            cluster,
            repeat_threshold: 3,
            flapping_count: 10,
        }
    }

    async fn scan(&self, ctx: &AgentContext, rec: &mut AnalysisRecorder) -> Result<()> {
        let raw = ctx.fetch("events", self.cluster.list_events(&ctx.namespace)).await?;
        if raw.is_empty() {
            rec.step(
                format!("No events found in namespace {}", ctx.namespace),
                "No event data to analyse",
            );
            return Ok(());
        }

        let events = raw.iter().map(EventRecord::parse).collect::<Result<Vec<_>>>()?;
        let mut warnings: IndexMap<&ComponentId, Vec<&EventRecord>> = IndexMap::new();
        for event in events.iter().filter(|e| e.event_type == "Warning") {
            warnings.entry(&event.component).or_default().push(event);
        }
        rec.step(
            format!("Found {} events, {} objects with warnings", events.len(), warnings.len()),
            "Analysing warning events per object",
        );

        for (component, group) in &warnings {
            let (critical, other): (Vec<&EventRecord>, Vec<&EventRecord>) =
                group.iter().copied().partition(|e| CRITICAL_REASONS.contains(&e.reason));

            for event in &critical {
                rec.finding(
                    (*component).clone(),
                    format!("{} event on {}", event.reason, component),
                    Severity::Critical,
                    event.message,
                    recommendation(event.reason),
                );
            }

            if group.len() >= self.repeat_threshold {
                let reasons: Vec<&str> = group.iter().map(|e| e.reason).collect();
                rec.finding(
                    (*component).clone(),
                    format!("Multiple warning events for {}", component),
                    Severity::Warning,
                    format!("{} warnings: {}", group.len(), reasons.join(", ")),
                    format!("Investigate {} for configuration or operational issues", component),
                );
                rec.step(
                    format!("Detected {} warning events for {}", group.len(), component),
                    format!("{} is experiencing recurring issues", component),
                );
            } else {
                for event in &other {
                    rec.finding(
                        (*component).clone(),
                        format!("{} event on {}", event.reason, component),
                        Severity::Info,
                        event.message,
                        recommendation(event.reason),
                    );
                }
            }

            for event in group.iter().filter(|e| e.count > self.flapping_count) {
                rec.finding(
                    (*component).clone(),
                    format!("Frequent {} events ({} occurrences)", event.reason, event.count),
                    Severity::Warning,
                    event.message,
                    format!("Find what keeps triggering {} on {}", event.reason, component),
                );
            }

            let corroborated = ctx.prior_for(component, AgentKind::Events).count();
            if corroborated > 0 {
                rec.step(
                    format!("Events on {} match {} earlier findings", component, corroborated),
                    "Independent evidence corroborates the earlier observation",
                );
            }
        }
        Ok(())
    }
}

fn recommendation(reason: &str) -> &'static str {
    match reason {
        "FailedScheduling" => "Check resource requests, node capacity, taints and affinity rules",
        "FailedMount" | "FailedAttachVolume" | "FailedDetachVolume" => {
            "Verify the PVC, storage class and volume attachment state"
        }
        "BackOff" | "Failed" | "Error" => "Inspect the container logs for the failure cause",
        "Unhealthy" => "Check the probe configuration and the endpoint it hits",
        "Evicted" | "OOMKilling" | "MemoryPressure" | "DiskPressure" => {
            "Review resource limits and node pressure"
        }
        "NodeNotReady" | "KubeletNotReady" | "NetworkUnavailable" => "Check node and kubelet health",
        "ErrImagePull" => "Check the image reference and registry credentials",
        _ => "Describe the object to see the full event history",
    }
}

#[async_trait]
impl DiagnosticAgent for EventsAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Events
    }

    async fn analyze(&self, ctx: &AgentContext) -> Result<AgentResult> {
        let mut rec = AnalysisRecorder::new(self.kind());
        let outcome = self.scan(ctx, &mut rec).await;
        rec.conclude(outcome)
    }
}
