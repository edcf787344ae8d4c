//! Next-action planning.
//!
//! Suggestions are derived fresh from the current findings and ranking on
//! every recompute. Each candidate carries the finding that motivates it, so
//! an action that already ran is only suggested again once a newer finding
//! gives it a reason.

use triage_core::{
    ActionPayload, AgentKind, ComponentId, Hypothesis, Investigation, NextAction, Priority, Severity,
};

/// Agents worth running after a finding from `agent`.
fn follow_ups(agent: AgentKind) -> [AgentKind; 2] {
    match agent {
        AgentKind::Metrics => [AgentKind::Logs, AgentKind::Events],
        AgentKind::Logs => [AgentKind::Events, AgentKind::Metrics],
        AgentKind::Events => [AgentKind::Logs, AgentKind::Topology],
        AgentKind::Topology => [AgentKind::Events, AgentKind::Traces],
        AgentKind::Traces => [AgentKind::Logs, AgentKind::Topology],
    }
}

/// Whether `agent` can say anything about a component of this kind.
fn covers(agent: AgentKind, component: &ComponentId) -> bool {
    match agent {
        AgentKind::Metrics => matches!(
            component.kind(),
            "Pod" | "Node" | "Deployment" | "StatefulSet" | "DaemonSet"
        ),
        AgentKind::Logs => component.kind() == "Pod",
        AgentKind::Events => true,
        AgentKind::Topology | AgentKind::Traces => component.kind() == "Service",
    }
}

struct Candidate {
    action: NextAction,
    /// Sequence of the finding that motivates the action
    trigger: Option<usize>,
}

/// Prioritised next-action planner.
#[derive(Clone, Debug)]
pub struct NextActionPlanner {
    /// Confidence at which accepting the top hypothesis is suggested
    pub accept_threshold: f64,
    pub max_actions: usize,
}

impl Default for NextActionPlanner {
    fn default() -> Self {
        Self {
            accept_threshold: 0.6,
            max_actions: 8,
        }
    }
}

impl NextActionPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suggested actions for `investigation` given a fresh ranking, highest
    /// priority first.
    pub fn plan(&self, investigation: &Investigation, hypotheses: &[Hypothesis]) -> Vec<NextAction> {
        if investigation.status().is_terminal() {
            return Vec::new();
        }
        let evidence = investigation.evidence();
        let mut candidates = Vec::new();

        for (seq, finding) in evidence.active_findings() {
            if finding.severity != Severity::Critical {
                continue;
            }
            let seq = evidence.first_report(seq);
            for agent in follow_ups(finding.agent) {
                if !covers(agent, &finding.component) || evidence.agent_examined(agent, seq) {
                    continue;
                }
                candidates.push(Candidate {
                    action: NextAction {
                        text: format!("Run {} analysis for {}", agent, finding.component),
                        action: ActionPayload::RunAgent { agent_type: agent },
                        priority: Priority::Critical,
                        reasoning: format!(
                            "Critical finding on {} ('{}') has not been checked by the {} agent",
                            finding.component, finding.issue, agent
                        ),
                    },
                    trigger: Some(seq),
                });
            }
        }

        if let Some(top) = hypotheses.first() {
            let supporting: Vec<AgentKind> = top
                .supporting_findings
                .iter()
                .filter_map(|seq| evidence.findings().get(*seq))
                .map(|f| f.agent)
                .collect();
            let novel_support = top
                .supporting_findings
                .iter()
                .map(|seq| evidence.first_report(*seq))
                .max()
                .unwrap_or(top.newest_support);
            for agent in AgentKind::ALL {
                let relevant = top.related_components.iter().any(|c| covers(agent, c));
                if !relevant || supporting.contains(&agent) || evidence.agent_examined(agent, novel_support) {
                    continue;
                }
                candidates.push(Candidate {
                    action: NextAction {
                        text: format!("Run {} analysis to test: {}", agent, top.description),
                        action: ActionPayload::RunAgent { agent_type: agent },
                        priority: Priority::High,
                        reasoning: format!(
                            "The {} agent could corroborate or refute the leading hypothesis ({})",
                            agent, top.confidence
                        ),
                    },
                    trigger: Some(novel_support),
                });
            }

            if top.confidence.get() >= self.accept_threshold {
                candidates.push(Candidate {
                    action: NextAction {
                        text: format!("Accept root cause: {}", top.description),
                        action: ActionPayload::AcceptHypothesis { id: top.id.clone() },
                        priority: Priority::Medium,
                        reasoning: format!(
                            "Confidence {} is above the {:.0}% acceptance threshold",
                            top.confidence,
                            self.accept_threshold * 100.0
                        ),
                    },
                    trigger: Some(top.newest_support),
                });
            }
            if let Some(component) = top.related_components.first() {
                candidates.push(Candidate {
                    action: NextAction {
                        text: format!("Show findings for {}", component),
                        action: ActionPayload::Query {
                            text: format!("Show findings for {}", component),
                        },
                        priority: Priority::Medium,
                        reasoning: format!("Review the evidence behind the leading hypothesis on {}", component),
                    },
                    trigger: Some(top.newest_support),
                });
            }
        }

        if evidence.is_empty() {
            for agent in [AgentKind::Logs, AgentKind::Events] {
                candidates.push(Candidate {
                    action: NextAction {
                        text: format!("Run {} analysis", agent),
                        action: ActionPayload::RunAgent { agent_type: agent },
                        priority: Priority::Medium,
                        reasoning: format!("No findings yet; {} usually surface failures first", agent),
                    },
                    trigger: None,
                });
            }
        }

        for agent in AgentKind::ALL {
            if evidence.agent_has_run(agent) {
                continue;
            }
            candidates.push(Candidate {
                action: NextAction {
                    text: format!("Explore with the {} agent", agent),
                    action: ActionPayload::RunAgent { agent_type: agent },
                    priority: Priority::Low,
                    reasoning: format!("The {} agent has not run in this investigation", agent),
                },
                trigger: None,
            });
        }

        self.select(investigation, candidates)
    }

    /// Drop actions already executed without newer supporting findings,
    /// then keep one action per payload (highest priority wins).
    fn select(&self, investigation: &Investigation, candidates: Vec<Candidate>) -> Vec<NextAction> {
        let executed = investigation.executed_actions();
        let mut chosen: Vec<NextAction> = Vec::new();
        for candidate in candidates {
            let repeat = executed.iter().any(|done| {
                done.action == candidate.action.action
                    && candidate.trigger.map_or(true, |seq| seq < done.finding_watermark)
            });
            if repeat {
                continue;
            }
            let existing = chosen.iter().position(|a| a.action == candidate.action.action);
            match existing {
                Some(i) if candidate.action.priority > chosen[i].priority => chosen[i] = candidate.action,
                Some(_) => {}
                None => chosen.push(candidate.action),
            }
        }
        chosen.sort_by(|a, b| b.priority.cmp(&a.priority));
        chosen.truncate(self.max_actions);
        chosen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::{AgentResult, Finding, Role};

    fn result(agent: AgentKind, findings: Vec<Finding>) -> AgentResult {
        AgentResult {
            agent,
            findings,
            reasoning_steps: Vec::new(),
            error: None,
            summary: String::new(),
            elapsed_ms: 0,
        }
    }

    fn critical(agent: AgentKind, pod: &str) -> Finding {
        Finding::new(agent, ComponentId::pod(pod), "Init container 'migrate' failed", Severity::Critical, "")
    }

    fn open() -> Investigation {
        let mut inv = Investigation::new("shop", None);
        inv.add_turn(Role::System, "started").unwrap();
        inv.mark_in_progress().unwrap();
        inv
    }

    #[test]
    fn test_empty_investigation_suggests_logs_and_events() {
        let inv = open();
        let actions = NextActionPlanner::new().plan(&inv, &[]);
        assert_eq!(actions[0].priority, Priority::Medium);
        assert_eq!(actions[0].action, ActionPayload::RunAgent { agent_type: AgentKind::Logs });
        assert_eq!(actions[1].action, ActionPayload::RunAgent { agent_type: AgentKind::Events });
        // metrics, topology, traces remain as exploratory suggestions
        assert_eq!(actions.iter().filter(|a| a.priority == Priority::Low).count(), 3);
    }

    #[test]
    fn test_critical_finding_gets_critical_follow_up() {
        let mut inv = open();
        inv.merge_agent_result(&result(AgentKind::Logs, vec![critical(AgentKind::Logs, "api-0")]), 0)
            .unwrap();
        let actions = NextActionPlanner::new().plan(&inv, &[]);
        assert_eq!(actions[0].priority, Priority::Critical);
        assert_eq!(actions[0].action, ActionPayload::RunAgent { agent_type: AgentKind::Events });
        assert!(actions[0].text.contains("Pod/api-0"));
    }

    #[test]
    fn test_follow_up_satisfied_after_agent_sees_finding() {
        let mut inv = open();
        inv.merge_agent_result(&result(AgentKind::Logs, vec![critical(AgentKind::Logs, "api-0")]), 0)
            .unwrap();
        inv.merge_agent_result(&result(AgentKind::Events, Vec::new()), 1).unwrap();
        let actions = NextActionPlanner::new().plan(&inv, &[]);
        assert!(!actions
            .iter()
            .any(|a| a.priority == Priority::Critical && a.action == ActionPayload::RunAgent { agent_type: AgentKind::Events }));
    }

    #[test]
    fn test_executed_action_not_repeated_without_new_findings() {
        let mut inv = open();
        inv.merge_agent_result(&result(AgentKind::Logs, vec![critical(AgentKind::Logs, "api-0")]), 0)
            .unwrap();
        // events run failed, so it never examined the finding
        inv.merge_agent_result(&AgentResult::failed(AgentKind::Events, "timeout"), 1)
            .unwrap();
        inv.record_executed(ActionPayload::RunAgent { agent_type: AgentKind::Events }, 1)
            .unwrap();
        let planner = NextActionPlanner::new();
        let run_events = ActionPayload::RunAgent { agent_type: AgentKind::Events };
        assert!(!planner.plan(&inv, &[]).iter().any(|a| a.action == run_events));

        // a newer critical finding is new rationale
        inv.merge_agent_result(&result(AgentKind::Logs, vec![critical(AgentKind::Logs, "api-1")]), 1)
            .unwrap();
        assert!(planner.plan(&inv, &[]).iter().any(|a| a.action == run_events));
    }

    #[test]
    fn test_re_reported_finding_is_not_new_rationale() {
        let mut inv = open();
        inv.merge_agent_result(&result(AgentKind::Logs, vec![critical(AgentKind::Logs, "api-0")]), 0)
            .unwrap();
        inv.merge_agent_result(&result(AgentKind::Events, Vec::new()), 1).unwrap();
        inv.record_executed(ActionPayload::RunAgent { agent_type: AgentKind::Events }, 1)
            .unwrap();
        // logs reports the same issue again
        inv.merge_agent_result(&result(AgentKind::Logs, vec![critical(AgentKind::Logs, "api-0")]), 1)
            .unwrap();
        let run_events = ActionPayload::RunAgent { agent_type: AgentKind::Events };
        assert!(!NextActionPlanner::new()
            .plan(&inv, &[])
            .iter()
            .any(|a| a.action == run_events && a.priority == Priority::Critical));
    }

    #[test]
    fn test_closed_investigation_has_no_actions() {
        let mut inv = open();
        inv.abandon().unwrap();
        assert!(NextActionPlanner::new().plan(&inv, &[]).is_empty());
    }

    #[test]
    fn test_one_action_per_payload() {
        let mut inv = open();
        inv.merge_agent_result(
            &result(
                AgentKind::Logs,
                vec![critical(AgentKind::Logs, "api-0"), critical(AgentKind::Logs, "api-1")],
            ),
            0,
        )
        .unwrap();
        let actions = NextActionPlanner::new().plan(&inv, &[]);
        let mut payloads: Vec<_> = actions.iter().map(|a| format!("{:?}", a.action)).collect();
        let before = payloads.len();
        payloads.sort();
        payloads.dedup();
        assert_eq!(before, payloads.len());
    }
}
