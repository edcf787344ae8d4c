//! Workload replica and pod state checks.
//!
//! These run inside the metrics agent alongside the usage thresholds: a
//! deployment short of ready replicas or a pod stuck before `Running` is a
//! resource signal even when no usage figure crosses a limit.

use indexmap::IndexMap;
use serde_json::Value;
use triage_core::{ComponentId, Severity};

use super::{require_str, AnalysisRecorder};
use crate::Result;

/// Compare ready replicas with the desired count for each workload.
///
/// Returns how many workloads fall short. Kinds other than Deployment,
/// StatefulSet and DaemonSet are ignored.
pub(crate) fn check_workloads(workloads: &[Value], rec: &mut AnalysisRecorder) -> Result<usize> {
    let mut short = 0;
    for workload in workloads {
        let kind = require_str(workload, "/kind")?;
        let name = require_str(workload, "/metadata/name")?;
        let count = |pointer: &str, default: u64| workload.pointer(pointer).and_then(Value::as_u64).unwrap_or(default);

        let (ready, desired, issue, evidence) = match kind {
            "Deployment" | "StatefulSet" => {
                let desired = count("/spec/replicas", 1);
                let ready = count("/status/readyReplicas", 0);
                (
                    ready,
                    desired,
                    format!("{} of {} replicas ready", ready, desired),
                    format!("spec.replicas={} status.readyReplicas={}", desired, ready),
                )
            }
            "DaemonSet" => {
                let desired = count("/status/desiredNumberScheduled", 0);
                let ready = count("/status/numberReady", 0);
                (
                    ready,
                    desired,
                    format!("{} of {} daemon pods ready", ready, desired),
                    format!("status.desiredNumberScheduled={} status.numberReady={}", desired, ready),
                )
            }
            _ => continue,
        };
        if ready >= desired {
            continue;
        }
        short += 1;
        let severity = if ready == 0 { Severity::Critical } else { Severity::Warning };
        rec.finding(
            ComponentId::new(kind, name),
            issue,
            severity,
            evidence,
            "Inspect the workload's pods for why they do not become ready",
        );
    }
    Ok(short)
}

/// Flag pods that are evicted, unschedulable, stuck creating, failed, or
/// running without passing readiness.
pub(crate) fn check_pod_states(pods: &[Value], rec: &mut AnalysisRecorder) -> Result<()> {
    for pod in pods {
        let name = require_str(pod, "/metadata/name")?;
        let component = ComponentId::pod(name);
        let status = pod.get("status").unwrap_or(&Value::Null);
        let phase = status.get("phase").and_then(Value::as_str).unwrap_or("Unknown");
        let message = status.get("message").and_then(Value::as_str);

        if status.get("reason").and_then(Value::as_str) == Some("Evicted") {
            rec.finding(
                component,
                "Pod evicted",
                Severity::Warning,
                message.unwrap_or("status.reason=Evicted"),
                "Check node resource pressure and the pod's resource requests",
            );
            continue;
        }

        match phase {
            "Pending" => {
                if let Some(scheduled) = condition(status, "PodScheduled").filter(|c| is_false(c)) {
                    rec.finding(
                        component.clone(),
                        "Pod cannot be scheduled",
                        Severity::Critical,
                        text(scheduled, "message")
                            .or_else(|| text(scheduled, "reason"))
                            .unwrap_or("PodScheduled=False"),
                        "Check resource requests, node selectors and taints",
                    );
                }
                if let Some(container) = waiting_in(status, "ContainerCreating") {
                    let claims = claim_names(pod);
                    let (evidence, recommendation) = if claims.is_empty() {
                        (
                            format!("container {} waiting in ContainerCreating", container),
                            "Check volume mounts and the container runtime on the node",
                        )
                    } else {
                        (
                            format!("waiting on PersistentVolumeClaims: {}", claims.join(", ")),
                            "Check the PersistentVolumeClaims are bound",
                        )
                    };
                    rec.finding(
                        component,
                        "Pod stuck in ContainerCreating",
                        Severity::Warning,
                        evidence,
                        recommendation,
                    );
                }
            }
            "Failed" => {
                let mut terminated = false;
                for container in container_statuses(status) {
                    let Some(state) = container.pointer("/state/terminated") else {
                        continue;
                    };
                    terminated = true;
                    let container_name = text(container, "name").unwrap_or("unknown");
                    let code = state.get("exitCode").and_then(Value::as_i64).unwrap_or(-1);
                    rec.finding(
                        component.clone(),
                        format!("Container {} terminated with exit code {}", container_name, code),
                        Severity::Critical,
                        text(state, "message")
                            .or_else(|| text(state, "reason"))
                            .unwrap_or("state=terminated"),
                        "Check the container logs for the failure",
                    );
                }
                if !terminated {
                    rec.finding(
                        component,
                        "Pod failed",
                        Severity::Critical,
                        message.unwrap_or("phase=Failed"),
                        "Check the pod events and logs for the failure",
                    );
                }
            }
            "Running" => {
                let Some(ready) = condition(status, "Ready").filter(|c| is_false(c)) else {
                    continue;
                };
                let evidence = format!("Ready=False: {}", text(ready, "message").unwrap_or("no message"));
                if defines_readiness_check(pod) {
                    rec.finding(
                        component,
                        "Readiness check failing",
                        Severity::Warning,
                        evidence,
                        "Check the readiness endpoint and its timing settings",
                    );
                } else {
                    rec.finding(
                        component,
                        "Pod not ready and defines no readiness check",
                        Severity::Info,
                        evidence,
                        "Add a readinessProbe so traffic waits for the application",
                    );
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Add one reasoning step per flagged object that also has warning events.
///
/// Events are matched on `involvedObject` kind and name; records without
/// them are skipped here and left to the events agent to reject.
pub(crate) fn note_events(events: &[Value], rec: &mut AnalysisRecorder) {
    let mut reasons: IndexMap<ComponentId, Vec<&str>> = IndexMap::new();
    for event in events {
        if event.get("type").and_then(Value::as_str) != Some("Warning") {
            continue;
        }
        let object = event.pointer("/involvedObject/kind").and_then(Value::as_str).zip(
            event.pointer("/involvedObject/name").and_then(Value::as_str),
        );
        let (Some((kind, name)), Some(reason)) = (object, event.get("reason").and_then(Value::as_str)) else {
            continue;
        };
        let entry = reasons.entry(ComponentId::new(kind, name)).or_default();
        if !entry.contains(&reason) {
            entry.push(reason);
        }
    }
    for (component, reasons) in reasons {
        if rec.has_findings_for(&component) {
            rec.step(
                format!("{} has warning events: {}", component, reasons.join(", ")),
                "Events agree with the resource state",
            );
        }
    }
}

fn text<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value.get(field).and_then(Value::as_str)
}

fn condition<'a>(status: &'a Value, condition_type: &str) -> Option<&'a Value> {
    status
        .get("conditions")
        .and_then(Value::as_array)?
        .iter()
        .find(|c| text(c, "type") == Some(condition_type))
}

fn is_false(condition: &Value) -> bool {
    text(condition, "status") == Some("False")
}

fn container_statuses(status: &Value) -> impl Iterator<Item = &Value> {
    status
        .get("containerStatuses")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn waiting_in<'a>(status: &'a Value, reason: &str) -> Option<&'a str> {
    container_statuses(status)
        .find(|c| c.pointer("/state/waiting/reason").and_then(Value::as_str) == Some(reason))
        .map(|c| text(c, "name").unwrap_or("unknown"))
}

fn claim_names(pod: &Value) -> Vec<&str> {
    pod.pointer("/spec/volumes")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|v| v.pointer("/persistentVolumeClaim/claimName").and_then(Value::as_str))
        .collect()
}

fn defines_readiness_check(pod: &Value) -> bool {
    pod.pointer("/spec/containers")
        .and_then(Value::as_array)
        .is_some_and(|containers| containers.iter().any(|c| c.get("readinessProbe").is_some()))
}
