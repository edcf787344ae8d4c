//! Evidence scoring
//!
//! Confidence starts from a low prior and is moved by one Bayesian update per
//! piece of evidence:
//! - the first finding from each agent counts at full strength for its severity
//! - further findings from an agent that already contributed are damped
//! - a clean re-run that withdrew a finding about the component refutes
//!
//! A single uncorroborated critical finding therefore lands in the
//! low-to-moderate range, and independent agents agreeing push it higher.

use std::collections::BTreeSet;
use triage_core::{AgentKind, Confidence, Finding, Severity};

/// Base rate for "this component is the root cause".
pub const PRIOR: f64 = 0.15;

/// Ceiling applied after all updates.
pub const CEILING: f64 = 0.99;

/// Strength multiplier for repeated evidence from the same agent.
pub const REPEAT_DAMPING: f64 = 0.25;

/// Strength of a contradicting clean run.
pub const REFUTE_STRENGTH: f64 = -0.6;

pub fn severity_strength(severity: Severity) -> f64 {
    match severity {
        Severity::Critical => 0.8,
        Severity::Warning => 0.5,
        Severity::Info => 0.2,
    }
}

/// Score one group of supporting findings against the contradictions
/// recorded for the same component.
pub fn score<'a>(
    supporting: impl IntoIterator<Item = &'a Finding>,
    contradicting: impl IntoIterator<Item = &'a Finding>,
) -> Confidence {
    let mut confidence = Confidence::saturating(PRIOR);
    let mut seen: BTreeSet<AgentKind> = BTreeSet::new();

    for finding in supporting {
        let mut strength = severity_strength(finding.severity);
        if !seen.insert(finding.agent) {
            strength *= REPEAT_DAMPING;
        }
        confidence = confidence.weigh(strength);
    }

    let mut refuting: BTreeSet<AgentKind> = BTreeSet::new();
    for finding in contradicting {
        if refuting.insert(finding.agent) {
            confidence = confidence.weigh(REFUTE_STRENGTH);
        }
    }

    confidence.capped(CEILING)
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::ComponentId;

    fn finding(agent: AgentKind, severity: Severity) -> Finding {
        Finding::new(agent, ComponentId::pod("web-1"), "issue", severity, "")
    }

    #[test]
    fn test_single_critical_is_low_to_moderate() {
        let f = finding(AgentKind::Logs, Severity::Critical);
        let c = score([&f], []).get();
        assert!(c > 0.3 && c < 0.6, "got {}", c);
    }

    #[test]
    fn test_corroboration_raises() {
        let a = finding(AgentKind::Logs, Severity::Critical);
        let b = finding(AgentKind::Events, Severity::Critical);
        let single = score([&a], []).get();
        let double = score([&a, &b], []).get();
        assert!(double > single);
    }

    #[test]
    fn test_independent_agent_outweighs_repeat() {
        let a = finding(AgentKind::Logs, Severity::Critical);
        let same = finding(AgentKind::Logs, Severity::Critical);
        let other = finding(AgentKind::Events, Severity::Critical);
        assert!(score([&a, &other], []).get() > score([&a, &same], []).get());
    }

    #[test]
    fn test_contradiction_lowers() {
        let a = finding(AgentKind::Logs, Severity::Critical);
        let cleared = finding(AgentKind::Metrics, Severity::Warning);
        assert!(score([&a], [&cleared]).get() < score([&a], []).get());
    }

    #[test]
    fn test_bounds_hold_under_heavy_evidence() {
        let findings: Vec<Finding> = AgentKind::ALL
            .iter()
            .flat_map(|k| (0..10).map(move |_| finding(*k, Severity::Critical)))
            .collect();
        let c = score(findings.iter(), []).get();
        assert!((0.0..=CEILING).contains(&c));
    }
}
