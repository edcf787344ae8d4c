//! Container state and log pattern analysis.

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use triage_core::{AgentKind, AgentResult, ClusterClient, ComponentId, Severity};

use super::{require_str, AgentContext, AnalysisRecorder, DiagnosticAgent};
use crate::{AgentError, Result};

/// Waiting reasons that keep a container from ever running.
const CRITICAL_WAITING: [&str; 6] = [
    "CrashLoopBackOff",
    "ImagePullBackOff",
    "ErrImagePull",
    "CreateContainerConfigError",
    "CreateContainerError",
    "InvalidImageName",
];

/// (name, pattern, severity label, recommendation)
const PATTERNS: [(&str, &str, &str, &str); 13] = [
    (
        "oom_kill",
        r"(?i)(out of memory|oomkilled|\bkilled\b|signal: killed)",
        "high",
        "Increase memory limits for the container or reduce its memory usage",
    ),
    (
        "crash_loop",
        r"(?i)(crashloopbackoff|back-off restarting)",
        "high",
        "Inspect the crash cause in the previous container logs and fix the application",
    ),
    (
        "image_pull",
        r"(?i)(errimagepull|imagepullbackoff)",
        "high",
        "Check the image name, registry credentials and registry reachability",
    ),
    (
        "connection_refused",
        r"(?i)connection refused",
        "medium",
        "Check network policies, service endpoints and that the target is running",
    ),
    (
        "timeout",
        r"(?i)(timeout|timed out|etimedout)",
        "medium",
        "Check for network issues or slow dependencies",
    ),
    (
        "volume_mount",
        r"(?i)(unable to mount volumes|mountvolume\.setup failed)",
        "medium",
        "Verify PVC status, storage class and volume permissions",
    ),
    (
        "dns_resolution",
        r"(?i)(dns resolution failed|could not resolve)",
        "medium",
        "Check CoreDNS health and policies that might block DNS",
    ),
    (
        "internal_server_error",
        r"(?i)(internal server error|internalservererror|statuscode=5\d\d)",
        "medium",
        "Investigate server-side failures in the dependent service",
    ),
    (
        "permission_denied",
        r"(?i)(permission denied|forbidden|access denied)",
        "low",
        "Verify RBAC permissions, service account and security context",
    ),
    (
        "authentication",
        r"(?i)(unauthorized|authentication failed)",
        "low",
        "Verify credentials, tokens and authentication configuration",
    ),
    (
        "config_error",
        r"(?i)(invalid configuration|configmap not found|secret not found)",
        "low",
        "Check that referenced ConfigMaps and Secrets exist",
    ),
    (
        "api_error",
        r"(?i)api server error",
        "low",
        "Check API server health and client configuration",
    ),
    (
        "exception",
        r"(traceback|exception|fatal|panic:)",
        "info",
        "Debug the application exception",
    ),
];

struct LogPattern {
    name: &'static str,
    regex: Regex,
    severity: Severity,
    recommendation: &'static str,
}

fn compile_patterns() -> Vec<LogPattern> {
    PATTERNS
        .iter()
        .filter_map(|&(name, pattern, label, recommendation)| {
            Regex::new(pattern).ok().map(|regex| LogPattern {
                name,
                regex,
                severity: Severity::from_label(label),
                recommendation,
            })
        })
        .collect()
}

fn display_name(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

pub struct LogsAgent {
    cluster: Arc<dyn ClusterClient>,
    patterns: Vec<LogPattern>,
    /// Pods whose logs are read per run
    max_pods: usize,
    tail_lines: usize,
    restart_warning: u64,
    restart_critical: u64,
}

impl LogsAgent {
    pub fn new(cluster: Arc<dyn ClusterClient>, max_pods: usize, tail_lines: usize) -> Self {
        Self {
            cluster,
            patterns: compile_patterns(),
            max_pods,
            tail_lines,
            restart_warning: 5,
            restart_critical: 10,
        }
    }

    async fn scan(&self, ctx: &AgentContext, rec: &mut AnalysisRecorder) -> Result<()> {
        let pods = ctx.fetch("pods", self.cluster.list_pods(&ctx.namespace)).await?;
        if pods.is_empty() {
            rec.step(
                format!("No pods found in namespace {}", ctx.namespace),
                "Nothing to analyse",
            );
            return Ok(());
        }

        let mut names = Vec::with_capacity(pods.len());
        for pod in &pods {
            let name = require_str(pod, "/metadata/name")?;
            self.check_status(name, pod, rec)?;
            names.push(name);
        }

        // Pods other agents already flagged are read first.
        let flagged: Vec<&str> = ctx
            .flagged_components()
            .into_iter()
            .filter(|c| c.kind() == "Pod")
            .map(|c| c.name())
            .collect();
        names.sort_by_key(|name| flagged.iter().position(|f| f == name).unwrap_or(usize::MAX));

        for name in names.iter().take(self.max_pods) {
            let text = match ctx
                .fetch("pod logs", self.cluster.pod_logs(&ctx.namespace, name, None, self.tail_lines))
                .await
            {
                Ok(text) => text,
                Err(AgentError::Upstream(e)) => {
                    rec.step(format!("Logs for {} unavailable: {}", name, e), "Skipping log scan for this pod");
                    continue;
                }
                Err(e) => return Err(e),
            };
            self.scan_text(name, &text, rec);
        }
        if names.len() > self.max_pods {
            rec.step(
                format!("{} pods in namespace, logs read for {}", names.len(), self.max_pods),
                "Remaining pods were covered by status checks only",
            );
        }
        Ok(())
    }

    fn check_status(&self, name: &str, pod: &Value, rec: &mut AnalysisRecorder) -> Result<()> {
        let component = ComponentId::pod(name);

        if pod.pointer("/status/phase").and_then(Value::as_str) == Some("Failed") {
            let reason = pod
                .pointer("/status/reason")
                .and_then(Value::as_str)
                .unwrap_or("unknown reason");
            rec.finding(
                component.clone(),
                format!("Pod in Failed phase: {}", reason),
                Severity::Critical,
                format!("status.phase=Failed reason={}", reason),
                "Describe the pod to find why it terminated",
            );
        }

        for status in statuses(pod, "/status/initContainerStatuses")? {
            let container = require_str(status, "/name")?;
            let waiting = status
                .pointer("/state/waiting/reason")
                .and_then(Value::as_str)
                .filter(|r| *r != "PodInitializing");
            let exit_code = status
                .pointer("/state/terminated/exitCode")
                .and_then(Value::as_i64)
                .filter(|code| *code != 0);
            let reason = match (waiting, exit_code) {
                (Some(reason), _) => reason.to_string(),
                (None, Some(code)) => format!("exit code {}", code),
                (None, None) => continue,
            };
            rec.finding(
                component.clone(),
                format!("Init container '{}' failed: {}", container, reason),
                Severity::Critical,
                status.get("state").map(Value::to_string).unwrap_or_default(),
                "Check the init container logs and the events for this pod",
            );
            rec.step(
                format!("Init container {} of pod {} is stuck: {}", container, name, reason),
                "The main containers cannot start until it succeeds",
            );
        }

        for status in statuses(pod, "/status/containerStatuses")? {
            let container = require_str(status, "/name")?;
            if let Some(reason) = status.pointer("/state/waiting/reason").and_then(Value::as_str) {
                if CRITICAL_WAITING.contains(&reason) {
                    let message = status
                        .pointer("/state/waiting/message")
                        .and_then(Value::as_str)
                        .unwrap_or(reason);
                    rec.finding(
                        component.clone(),
                        format!("Container '{}' waiting: {}", container, reason),
                        Severity::Critical,
                        message,
                        waiting_recommendation(reason),
                    );
                }
            }
            if status.pointer("/lastState/terminated/reason").and_then(Value::as_str) == Some("OOMKilled") {
                rec.finding(
                    component.clone(),
                    format!("Container '{}' was OOMKilled", container),
                    Severity::Critical,
                    "lastState.terminated.reason=OOMKilled",
                    "Increase the memory limit or reduce memory usage",
                );
            }
            let restarts = status.get("restartCount").and_then(Value::as_u64).unwrap_or(0);
            let severity = if restarts > self.restart_critical {
                Some(Severity::Critical)
            } else if restarts > self.restart_warning {
                Some(Severity::Warning)
            } else {
                None
            };
            if let Some(severity) = severity {
                rec.finding(
                    component.clone(),
                    format!("Container '{}' restarted {} times", container, restarts),
                    severity,
                    format!("restartCount={}", restarts),
                    "Look at the previous container logs for the crash cause",
                );
            }
        }
        Ok(())
    }

    fn scan_text(&self, pod: &str, text: &str, rec: &mut AnalysisRecorder) {
        let mut matched_any = false;
        for pattern in &self.patterns {
            let matches: Vec<&str> = text.lines().filter(|line| pattern.regex.is_match(line)).collect();
            let Some(first) = matches.first() else {
                continue;
            };
            matched_any = true;
            rec.finding(
                ComponentId::pod(pod),
                format!("{} in logs ({} lines)", display_name(pattern.name), matches.len()),
                pattern.severity,
                first.trim(),
                pattern.recommendation,
            );
            rec.step(
                format!("Found {} log lines matching {} in {}", matches.len(), pattern.name, pod),
                format!("Recorded as {} finding", pattern.severity),
            );
        }
        if !matched_any {
            rec.step(format!("No error patterns in logs for {}", pod), "Logs look clean");
        }
    }
}

fn statuses<'a>(pod: &'a Value, pointer: &str) -> Result<&'a [Value]> {
    match pod.pointer(pointer) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(AgentError::UnexpectedShape(format!("{} is not a list", pointer))),
    }
}

fn waiting_recommendation(reason: &str) -> &'static str {
    match reason {
        "ImagePullBackOff" | "ErrImagePull" | "InvalidImageName" => {
            "Check the image name, tag and registry credentials"
        }
        "CreateContainerConfigError" | "CreateContainerError" => {
            "Check referenced ConfigMaps, Secrets and the container spec"
        }
        _ => "Inspect the previous container logs for the crash cause",
    }
}

#[async_trait]
impl DiagnosticAgent for LogsAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Logs
    }

    async fn analyze(&self, ctx: &AgentContext) -> Result<AgentResult> {
        let mut rec = AnalysisRecorder::new(self.kind());
        let outcome = self.scan(ctx, &mut rec).await;
        rec.conclude(outcome)
    }
}
