//! Mapping free-text user messages to investigation actions.
//!
//! Keyword rules are tried first. When none match and a reasoning client is
//! configured, it is asked to classify the message; anything it answers that
//! is not an agent name or `sweep` is ignored. Whatever remains is answered
//! from the evidence already collected.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use triage_core::AgentKind;
use triage_reasoning::{complete_with_timeout, ChatMessage, ReasoningClient};

/// What a user message asks for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Intent {
    /// Run one diagnostic agent
    RunAgent(AgentKind),
    /// Run every agent
    Sweep,
    /// Answer from existing evidence
    Query(String),
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::RunAgent(agent) => write!(f, "run {} agent", agent),
            Intent::Sweep => f.write_str("sweep"),
            Intent::Query(_) => f.write_str("query"),
        }
    }
}

const SWEEP_PHRASES: [&str; 6] = ["sweep", "everything", "all agents", "full scan", "full analysis", "run all"];

/// Leading words that make a message a question about existing evidence.
const QUERY_WORDS: [&str; 8] = ["show", "what", "which", "why", "list", "explain", "summarize", "summarise"];

const AGENT_KEYWORDS: [(AgentKind, &[&str]); 5] = [
    (
        AgentKind::Metrics,
        &[
            "metrics", "metric", "cpu", "memory", "resource", "resources", "usage", "utilization", "replicas",
            "deployment",
        ],
    ),
    (
        AgentKind::Logs,
        &["logs", "log", "crash", "crashing", "crashloop", "restart", "restarts", "exception"],
    ),
    (
        AgentKind::Topology,
        &["topology", "dependency", "dependencies", "endpoints", "graph", "upstream", "downstream"],
    ),
    (
        AgentKind::Events,
        &["events", "event", "scheduling", "evicted", "eviction", "probe", "probes"],
    ),
    (
        AgentKind::Traces,
        &["traces", "trace", "tracing", "latency", "slow", "span", "spans"],
    ),
];

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Apply the keyword rules only.
pub fn classify_by_rules(text: &str) -> Option<Intent> {
    let tokens = words(text);
    if tokens.is_empty() {
        return None;
    }
    let joined = tokens.join(" ");
    if SWEEP_PHRASES.iter().any(|p| contains_phrase(&joined, p)) {
        return Some(Intent::Sweep);
    }
    if QUERY_WORDS.contains(&tokens[0].as_str()) {
        return Some(Intent::Query(text.trim().to_string()));
    }

    // earliest mentioned agent wins
    tokens.iter().find_map(|token| {
        AGENT_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.contains(&token.as_str()))
            .map(|(agent, _)| Intent::RunAgent(*agent))
    })
}

fn contains_phrase(joined: &str, phrase: &str) -> bool {
    joined == phrase
        || joined.starts_with(&format!("{} ", phrase))
        || joined.ends_with(&format!(" {}", phrase))
        || joined.contains(&format!(" {} ", phrase))
}

/// Interpret a reasoner answer. Only agent names and `sweep` are accepted.
fn parse_reasoner_answer(answer: &str) -> Option<Intent> {
    let first = words(answer).into_iter().next()?;
    match first.as_str() {
        "sweep" | "all" => Some(Intent::Sweep),
        other => AgentKind::from_str(other).ok().map(Intent::RunAgent),
    }
}

/// Derives an [`Intent`] for each user message.
#[derive(Clone)]
pub struct IntentMapper {
    client: Option<Arc<dyn ReasoningClient>>,
    timeout: Duration,
}

impl Default for IntentMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentMapper {
    /// Rules only.
    pub fn new() -> Self {
        Self {
            client: None,
            timeout: Duration::from_secs(20),
        }
    }

    pub fn with_reasoner(client: Arc<dyn ReasoningClient>, timeout: Duration) -> Self {
        Self {
            client: Some(client),
            timeout,
        }
    }

    pub async fn classify(&self, text: &str) -> Intent {
        if let Some(intent) = classify_by_rules(text) {
            debug!(%intent, "intent matched by keyword rules");
            return intent;
        }
        let fallback = Intent::Query(text.trim().to_string());
        let Some(client) = &self.client else {
            return fallback;
        };

        let messages = [
            ChatMessage::system(
                "Classify the user's request for a Kubernetes investigation. Answer with exactly one word: \
                 metrics, logs, topology, events, traces, sweep or query.",
            ),
            ChatMessage::user(text),
        ];
        match complete_with_timeout(client.as_ref(), &messages, self.timeout).await {
            Ok(answer) => match parse_reasoner_answer(&answer) {
                Some(intent) => {
                    debug!(%intent, "intent classified by reasoner");
                    intent
                }
                None => {
                    debug!(answer = %answer.trim(), "reasoner answer is not an action; treating as query");
                    fallback
                }
            },
            Err(e) => {
                warn!(error = %e, "intent classification failed; treating as query");
                fallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use triage_reasoning::ReasoningError;

    struct Fixed(&'static str);

    #[async_trait]
    impl ReasoningClient for Fixed {
        async fn complete(&self, _messages: &[ChatMessage]) -> triage_reasoning::Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    #[async_trait]
    impl ReasoningClient for Failing {
        async fn complete(&self, _messages: &[ChatMessage]) -> triage_reasoning::Result<String> {
            Err(ReasoningError::Provider("rate limited".into()))
        }
    }

    struct Hanging;

    #[async_trait]
    impl ReasoningClient for Hanging {
        async fn complete(&self, _messages: &[ChatMessage]) -> triage_reasoning::Result<String> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Ok("logs".into())
        }
    }

    #[test]
    fn test_keyword_rules() {
        assert_eq!(classify_by_rules("check the logs please"), Some(Intent::RunAgent(AgentKind::Logs)));
        assert_eq!(classify_by_rules("is CPU high?"), Some(Intent::RunAgent(AgentKind::Metrics)));
        assert_eq!(
            classify_by_rules("check replicas of the api deployment"),
            Some(Intent::RunAgent(AgentKind::Metrics))
        );
        assert_eq!(classify_by_rules("look at latency"), Some(Intent::RunAgent(AgentKind::Traces)));
        assert_eq!(classify_by_rules("run all agents"), Some(Intent::Sweep));
        assert_eq!(classify_by_rules("check everything"), Some(Intent::Sweep));
        assert_eq!(classify_by_rules("hello there"), None);
        assert_eq!(classify_by_rules("  "), None);
    }

    #[test]
    fn test_earliest_agent_keyword_wins() {
        assert_eq!(
            classify_by_rules("events first, then logs"),
            Some(Intent::RunAgent(AgentKind::Events))
        );
    }

    #[test]
    fn test_questions_are_queries() {
        assert_eq!(
            classify_by_rules("Show findings for Pod/api-0"),
            Some(Intent::Query("Show findings for Pod/api-0".into()))
        );
        assert_eq!(
            classify_by_rules("why are the logs full of errors"),
            Some(Intent::Query("why are the logs full of errors".into()))
        );
    }

    #[test]
    fn test_parse_reasoner_answer() {
        assert_eq!(parse_reasoner_answer(" Topology."), Some(Intent::RunAgent(AgentKind::Topology)));
        assert_eq!(parse_reasoner_answer("sweep"), Some(Intent::Sweep));
        assert_eq!(parse_reasoner_answer("query"), None);
        assert_eq!(parse_reasoner_answer("I think you should restart"), None);
        assert_eq!(parse_reasoner_answer(""), None);
    }

    #[tokio::test]
    async fn test_reasoner_used_when_rules_miss() {
        let mapper = IntentMapper::with_reasoner(Arc::new(Fixed("traces")), Duration::from_secs(1));
        assert_eq!(mapper.classify("the checkout page hangs").await, Intent::RunAgent(AgentKind::Traces));
        // rules still take precedence
        assert_eq!(mapper.classify("check the logs").await, Intent::RunAgent(AgentKind::Logs));
    }

    #[tokio::test]
    async fn test_reasoner_failure_falls_back_to_query() {
        let mapper = IntentMapper::with_reasoner(Arc::new(Failing), Duration::from_secs(1));
        assert_eq!(mapper.classify("hmm").await, Intent::Query("hmm".into()));

        let mapper = IntentMapper::with_reasoner(Arc::new(Fixed("reboot the cluster")), Duration::from_secs(1));
        assert_eq!(mapper.classify("hmm").await, Intent::Query("hmm".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reasoner_timeout_falls_back_to_query() {
        let mapper = IntentMapper::with_reasoner(Arc::new(Hanging), Duration::from_secs(2));
        assert_eq!(mapper.classify("anything odd?").await, Intent::Query("anything odd?".into()));
    }

    #[tokio::test]
    async fn test_without_reasoner() {
        assert_eq!(IntentMapper::new().classify("hmm").await, Intent::Query("hmm".into()));
    }
}
