//! Prompting and validating the reasoning collaborator.

use serde_json::Value;
use triage_core::{ComponentId, ConversationTurn, Finding};

use crate::client::ChatMessage;
use crate::errors::{ReasoningError, Result};

/// A hypothesis proposed by the collaborator that passed validation.
#[derive(Clone, Debug, PartialEq)]
pub struct OracleCandidate {
    pub description: String,
    pub confidence: f64,
    pub investigation_steps: Vec<String>,
    pub related_components: Vec<ComponentId>,
}

const SYSTEM_PROMPT: &str = "You analyse findings from a container cluster and propose root causes. \
Answer with a JSON array only. Each element must be an object with the keys \
\"description\" (string), \"confidence\" (number between 0 and 1), \
\"investigation_steps\" (array of strings) and \"related_components\" (array of \"Kind/name\" strings).";

/// Build the message list sent to the collaborator.
pub fn build_messages(
    namespace: &str,
    context: Option<&str>,
    findings: &[(usize, &Finding)],
    conversation: &[ConversationTurn],
) -> Vec<ChatMessage> {
    let mut prompt = format!("Namespace: {}\n", namespace);
    if let Some(ctx) = context {
        prompt.push_str(&format!("Problem description: {}\n", ctx));
    }
    let recent: Vec<_> = conversation.iter().rev().take(6).collect();
    if !recent.is_empty() {
        prompt.push_str("\nRecent conversation:\n");
        for turn in recent.into_iter().rev() {
            prompt.push_str(&format!("- {:?}: {}\n", turn.role, turn.content));
        }
    }
    prompt.push_str("\nFindings:\n");
    for (seq, f) in findings {
        prompt.push_str(&format!(
            "[{}] {} {} ({}, {}): {}\n",
            seq, f.severity, f.component, f.agent, f.issue, f.evidence
        ));
    }
    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)]
}

/// Locate the outermost JSON array in free-form text.
fn extract_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse and validate collaborator output.
///
/// Entries with an empty description or an invalid confidence are dropped;
/// if nothing usable remains the whole answer is rejected.
pub fn parse_candidates(text: &str) -> Result<Vec<OracleCandidate>> {
    let slice = extract_array(text)
        .ok_or_else(|| ReasoningError::MalformedOutput("no JSON array in response".into()))?;
    let value: Value = serde_json::from_str(slice)
        .map_err(|e| ReasoningError::MalformedOutput(format!("invalid JSON: {}", e)))?;
    let items = value
        .as_array()
        .ok_or_else(|| ReasoningError::MalformedOutput("expected an array".into()))?;

    let mut candidates = Vec::new();
    let mut rejected = Vec::new();
    for (index, item) in items.iter().enumerate() {
        match validate(item) {
            Ok(candidate) => candidates.push(candidate),
            Err(reason) => rejected.push(format!("#{}: {}", index, reason)),
        }
    }

    if candidates.is_empty() && !items.is_empty() {
        return Err(ReasoningError::MalformedOutput(format!(
            "no valid hypotheses ({})",
            rejected.join("; ")
        )));
    }
    if !rejected.is_empty() {
        tracing::warn!("Dropped {} invalid reasoner hypotheses: {}", rejected.len(), rejected.join("; "));
    }
    Ok(candidates)
}

fn validate(item: &Value) -> std::result::Result<OracleCandidate, String> {
    let description = item
        .get("description")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .ok_or("missing description")?
        .to_string();
    let confidence = item
        .get("confidence")
        .and_then(Value::as_f64)
        .ok_or("missing confidence")?;
    if confidence.is_nan() || !(0.0..=1.0).contains(&confidence) {
        return Err(format!("confidence {} out of range", confidence));
    }
    let strings = |key: &str| -> Vec<String> {
        item.get(key)
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    };
    let mut related_components: Vec<ComponentId> = strings("related_components")
        .iter()
        .filter(|c| c.contains('/'))
        .map(|c| ComponentId::from(c.as_str()))
        .collect();
    related_components.sort();
    related_components.dedup();

    Ok(OracleCandidate {
        description,
        confidence,
        investigation_steps: strings("investigation_steps"),
        related_components,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_fenced_output() {
        let text = "Here you go:\n```json\n[{\"description\": \"DB down\", \"confidence\": 0.7, \
                    \"investigation_steps\": [\"check db\"], \"related_components\": [\"Service/db\", \"db\"]}]\n```";
        let parsed = parse_candidates(text).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].related_components, vec![ComponentId::service("db")]);
        assert_eq!(parsed[0].investigation_steps, vec!["check db".to_string()]);
    }

    #[test]
    fn test_rejects_non_array() {
        assert!(matches!(
            parse_candidates("{\"description\": \"x\"}"),
            Err(ReasoningError::MalformedOutput(_))
        ));
        assert!(parse_candidates("no json here").is_err());
    }

    #[test]
    fn test_drops_invalid_entries() {
        let text = r#"[{"description": "", "confidence": 0.5},
                       {"description": "ok", "confidence": 1.5},
                       {"description": "good", "confidence": 0.4}]"#;
        let parsed = parse_candidates(text).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].description, "good");
    }

    #[test]
    fn test_all_invalid_is_error() {
        let text = r#"[{"description": "x", "confidence": "high"}]"#;
        assert!(parse_candidates(text).is_err());
    }

    #[test]
    fn test_empty_array_is_ok() {
        assert!(parse_candidates("[]").unwrap().is_empty());
    }
}
