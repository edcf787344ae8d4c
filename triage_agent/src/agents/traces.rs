//! Distributed trace analysis.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use triage_core::cluster::TraceSpan;
use triage_core::{AgentKind, AgentResult, ClusterClient, ComponentId, Severity};

use super::{AgentContext, AnalysisRecorder, DiagnosticAgent};
use crate::Result;

pub struct TracesAgent {
    cluster: Arc<dyn ClusterClient>,
    error_rate_warning: f64,
    error_rate_critical: f64,
    latency_p95_ms: f64,
    /// Spans a service needs before its error rate is judged
    min_spans: usize,
}

#[derive(Default)]
struct ServiceStats {
    spans: usize,
    errors: usize,
    durations: Vec<f64>,
}

fn p95(durations: &mut [f64]) -> f64 {
    if durations.is_empty() {
        return 0.0;
    }
    durations.sort_by(|a, b| a.total_cmp(b));
    let rank = (durations.len() as f64 * 0.95).ceil() as usize;
    durations[rank.saturating_sub(1).min(durations.len() - 1)]
}

/// Services where errors start: erroring spans none of whose children error.
/// Returns, per service, the number of failing traces it originated.
fn error_origins(spans: &[TraceSpan]) -> (usize, BTreeMap<&str, usize>) {
    let mut traces: BTreeMap<&str, Vec<&TraceSpan>> = BTreeMap::new();
    for span in spans {
        traces.entry(span.trace_id.as_str()).or_default().push(span);
    }

    let mut failing = 0;
    let mut origins: BTreeMap<&str, usize> = BTreeMap::new();
    for trace in traces.values() {
        if !trace.iter().any(|s| s.error) {
            continue;
        }
        failing += 1;
        let erroring_parents: HashSet<&str> = trace
            .iter()
            .filter(|s| s.error)
            .filter_map(|s| s.parent_id.as_deref())
            .collect();
        let services: BTreeSet<&str> = trace
            .iter()
            .filter(|s| s.error && !erroring_parents.contains(s.span_id.as_str()))
            .map(|s| s.service.as_str())
            .collect();
        for service in services {
            *origins.entry(service).or_default() += 1;
        }
    }
    (failing, origins)
}

impl TracesAgent {
    pub fn new(cluster: Arc<dyn ClusterClient>) -> Self {
        Self {
            cluster,
            error_rate_warning: 0.05,
            error_rate_critical: 0.25,
            latency_p95_ms: 1000.0,
            min_spans: 5,
        }
    }

    async fn scan(&self, ctx: &AgentContext, rec: &mut AnalysisRecorder) -> Result<()> {
        let spans = ctx.fetch("trace spans", self.cluster.trace_spans(&ctx.namespace)).await?;
        if spans.is_empty() {
            rec.step(
                format!("No trace spans collected for namespace {}", ctx.namespace),
                "Tracing may not be enabled; nothing to analyse",
            );
            return Ok(());
        }

        let mut stats: BTreeMap<&str, ServiceStats> = BTreeMap::new();
        for span in &spans {
            let entry = stats.entry(span.service.as_str()).or_default();
            entry.spans += 1;
            entry.errors += usize::from(span.error);
            entry.durations.push(span.duration_ms);
        }
        rec.step(
            format!("Collected {} spans across {} services", spans.len(), stats.len()),
            "Computing error rates and latency per service",
        );

        for (service, entry) in stats.iter_mut() {
            let component = ComponentId::service(service);
            if entry.spans >= self.min_spans {
                let rate = entry.errors as f64 / entry.spans as f64;
                let severity = if rate > self.error_rate_critical {
                    Some(Severity::Critical)
                } else if rate > self.error_rate_warning {
                    Some(Severity::Warning)
                } else {
                    None
                };
                if let Some(severity) = severity {
                    rec.finding(
                        component.clone(),
                        format!("High error rate ({:.0}% of spans)", rate * 100.0),
                        severity,
                        format!("{}/{} spans failed", entry.errors, entry.spans),
                        "Inspect failing requests and recent deployments of this service",
                    );
                }
            }
            let latency = p95(&mut entry.durations);
            if latency > self.latency_p95_ms {
                rec.finding(
                    component,
                    format!("High p95 latency ({:.0} ms)", latency),
                    Severity::Warning,
                    format!("p95={:.1}ms over {} spans", latency, entry.spans),
                    "Profile the slow operations and their downstream calls",
                );
            }
        }

        let (failing, origins) = error_origins(&spans);
        for (service, count) in &origins {
            let severity = if count * 2 >= failing {
                Severity::Critical
            } else if *count >= 2 {
                Severity::Warning
            } else {
                continue;
            };
            rec.finding(
                ComponentId::service(service),
                "Errors originate in this service",
                severity,
                format!("origin of errors in {}/{} failing traces", count, failing),
                "Start debugging here; upstream failures are likely propagated from it",
            );
            rec.step(
                format!("{} originates errors in {} of {} failing traces", service, count, failing),
                "Treating it as the likely source of propagated errors",
            );
        }
        Ok(())
    }
}

#[async_trait]
impl DiagnosticAgent for TracesAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Traces
    }

    async fn analyze(&self, ctx: &AgentContext) -> Result<AgentResult> {
        let mut rec = AnalysisRecorder::new(self.kind());
        let outcome = self.scan(ctx, &mut rec).await;
        rec.conclude(outcome)
    }
}
