//! Append-only investigation journal.
//!
//! Every state-changing operation appends one or more events. Each line of
//! the on-disk journal carries a SHA-256 checksum of its payload, so a line
//! torn by a crash is detected and skipped on read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{compute_checksum, StorageError};
use crate::types::{AgentKind, HypothesisId, InvestigationStatus, Role};

/// Journal event for investigation state changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JournalEvent {
    /// Investigation opened
    Created {
        namespace: String,
        context: Option<String>,
    },
    /// Conversation turn appended
    Turn { role: Role, content: String },
    /// Agent result merged
    AgentRun {
        agent: AgentKind,
        findings: usize,
        error: Option<String>,
        elapsed_ms: u64,
    },
    /// Ranking recomputed
    Ranked {
        hypotheses: usize,
        top: Option<HypothesisId>,
        next_actions: usize,
    },
    /// Reasoning collaborator failed or returned unusable output
    ReasonerFailed { reason: String },
    /// Status moved forward
    StatusChanged {
        from: InvestigationStatus,
        to: InvestigationStatus,
    },
    /// Hypothesis accepted as root cause
    Accepted { hypothesis: HypothesisId },
    /// Investigation abandoned
    Abandoned,
}

/// One sealed journal line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: DateTime<Utc>,
    pub event: JournalEvent,
    pub checksum: String,
}

#[derive(Serialize)]
struct EntryDataForHash<'a> {
    timestamp: &'a DateTime<Utc>,
    event: &'a JournalEvent,
}

impl JournalEntry {
    /// Stamp and checksum an event.
    pub fn seal(event: JournalEvent) -> Result<Self, StorageError> {
        let timestamp = Utc::now();
        let checksum = Self::checksum_of(&timestamp, &event)?;
        Ok(Self {
            timestamp,
            event,
            checksum,
        })
    }

    fn checksum_of(timestamp: &DateTime<Utc>, event: &JournalEvent) -> Result<String, StorageError> {
        let data = serde_json::to_vec(&EntryDataForHash { timestamp, event })?;
        Ok(compute_checksum(&data))
    }

    /// True when the stored checksum matches the content.
    pub fn verify(&self) -> bool {
        Self::checksum_of(&self.timestamp, &self.event)
            .map(|c| c == self.checksum)
            .unwrap_or(false)
    }

    /// Parse a JSON-lines journal, dropping lines that do not parse or fail
    /// verification.
    pub fn parse_lines(text: &str) -> Vec<JournalEntry> {
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<JournalEntry>(line) {
                Ok(entry) if entry.verify() => Some(entry),
                Ok(_) => {
                    tracing::warn!("Skipping journal entry with bad checksum");
                    None
                }
                Err(e) => {
                    tracing::warn!("Skipping unreadable journal line: {}", e);
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_and_verify() {
        let entry = JournalEntry::seal(JournalEvent::Turn {
            role: Role::User,
            content: "hello".into(),
        })
        .unwrap();
        assert!(entry.verify());

        let mut tampered = entry.clone();
        tampered.event = JournalEvent::Abandoned;
        assert!(!tampered.verify());
    }

    #[test]
    fn test_parse_skips_torn_line() {
        let a = JournalEntry::seal(JournalEvent::Abandoned).unwrap();
        let line = serde_json::to_string(&a).unwrap();
        let torn = &line[..line.len() / 2];
        let text = format!("{}\n{}\n{}", line, line, torn);
        assert_eq!(JournalEntry::parse_lines(&text).len(), 2);
    }
}
