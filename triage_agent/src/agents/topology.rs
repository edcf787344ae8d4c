//! Service dependency analysis.
//!
//! Services and their call edges are loaded into a `petgraph` directed graph
//! (`from` calls `to`) so that availability problems can be traced to the
//! services depending on them.

use async_trait::async_trait;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::BTreeMap;
use std::sync::Arc;
use triage_core::cluster::ServiceInfo;
use triage_core::{AgentKind, AgentResult, ClusterClient, ComponentId, Severity};

use super::{AgentContext, AnalysisRecorder, DiagnosticAgent};
use crate::Result;

pub struct TopologyAgent {
    cluster: Arc<dyn ClusterClient>,
    /// Dependants at which a single replica becomes a single point of failure
    fan_in_threshold: usize,
}

struct ServiceGraph<'a> {
    graph: DiGraph<&'a str, ()>,
    index: BTreeMap<&'a str, NodeIndex>,
    services: BTreeMap<&'a str, &'a ServiceInfo>,
}

impl<'a> ServiceGraph<'a> {
    fn node(&mut self, name: &'a str) -> NodeIndex {
        if let Some(idx) = self.index.get(name) {
            return *idx;
        }
        let idx = self.graph.add_node(name);
        self.index.insert(name, idx);
        idx
    }

    fn dependants(&self, name: &str) -> Vec<&'a str> {
        let Some(idx) = self.index.get(name) else {
            return Vec::new();
        };
        let mut names: Vec<&'a str> = self
            .graph
            .neighbors_directed(*idx, Direction::Incoming)
            .map(|n| self.graph[n])
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

impl TopologyAgent {
    pub fn new(cluster: Arc<dyn ClusterClient>) -> Self {
        Self {
            cluster,
            fan_in_threshold: 3,
        }
    }

    async fn scan(&self, ctx: &AgentContext, rec: &mut AnalysisRecorder) -> Result<()> {
        let services = ctx
            .fetch("services", self.cluster.list_services(&ctx.namespace))
            .await?;
        let edges = ctx
            .fetch("dependency edges", self.cluster.dependency_edges(&ctx.namespace))
            .await?;
        if services.is_empty() && edges.is_empty() {
            rec.step(
                format!("No services or dependencies found in namespace {}", ctx.namespace),
                "No topology to analyse",
            );
            return Ok(());
        }

        let mut topo = ServiceGraph {
            graph: DiGraph::new(),
            index: BTreeMap::new(),
            services: services.iter().map(|s| (s.name.as_str(), s)).collect(),
        };
        for service in &services {
            topo.node(&service.name);
        }
        for edge in &edges {
            if !topo.services.contains_key(edge.to.as_str()) {
                rec.finding(
                    ComponentId::service(&edge.from),
                    format!("Depends on unknown service '{}'", edge.to),
                    Severity::Warning,
                    format!("{} -> {}", edge.from, edge.to),
                    "Check the service name in the client configuration",
                );
            }
            let from = topo.node(&edge.from);
            let to = topo.node(&edge.to);
            topo.graph.update_edge(from, to, ());
        }
        rec.step(
            format!(
                "Built dependency graph with {} services and {} edges",
                topo.graph.node_count(),
                topo.graph.edge_count()
            ),
            "Checking availability, cycles and single points of failure",
        );

        for service in &services {
            let dependants = topo.dependants(&service.name);
            if service.ready_endpoints == 0 {
                rec.finding(
                    ComponentId::service(&service.name),
                    "Service has no ready endpoints",
                    Severity::Critical,
                    format!("readyEndpoints=0 replicas={}", service.replicas),
                    "Check the pods backing the service and its selector",
                );
                for dependant in &dependants {
                    rec.finding(
                        ComponentId::service(dependant),
                        format!("Depends on unavailable service '{}'", service.name),
                        Severity::Warning,
                        format!("{} -> {}", dependant, service.name),
                        format!("Restore {} or add a fallback path", service.name),
                    );
                }
                if !dependants.is_empty() {
                    rec.step(
                        format!("{} is unavailable and has {} dependants", service.name, dependants.len()),
                        "Failures in the dependants are likely to propagate from it",
                    );
                }
            } else if service.replicas == 1 && dependants.len() >= self.fan_in_threshold {
                rec.finding(
                    ComponentId::service(&service.name),
                    format!("Single replica serving {} dependants", dependants.len()),
                    Severity::Info,
                    dependants.join(", "),
                    "Scale to more than one replica",
                );
            }
        }

        for scc in tarjan_scc(&topo.graph) {
            let cyclic = scc.len() > 1 || scc.first().is_some_and(|n| topo.graph.contains_edge(*n, *n));
            if !cyclic {
                continue;
            }
            let mut members: Vec<&str> = scc.iter().map(|n| topo.graph[*n]).collect();
            members.sort_unstable();
            let cycle = members.join(" -> ");
            for member in &members {
                rec.finding(
                    ComponentId::service(member),
                    format!("Part of dependency cycle: {}", cycle),
                    Severity::Warning,
                    cycle.clone(),
                    "Break the cycle so one failure cannot loop back",
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DiagnosticAgent for TopologyAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Topology
    }

    async fn analyze(&self, ctx: &AgentContext) -> Result<AgentResult> {
        let mut rec = AnalysisRecorder::new(self.kind());
        let outcome = self.scan(ctx, &mut rec).await;
        rec.conclude(outcome)
    }
}
