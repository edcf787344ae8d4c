//! Reasoning collaborator contract.
//!
//! The collaborator is a text-in/text-out oracle. Its output is never trusted
//! as-is: callers validate and normalise whatever comes back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use triage_core::Role;

use crate::errors::{ReasoningError, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Language-model style completion endpoint.
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Call the collaborator with a time bound.
pub async fn complete_with_timeout(
    client: &dyn ReasoningClient,
    messages: &[ChatMessage],
    timeout: Duration,
) -> Result<String> {
    match tokio::time::timeout(timeout, client.complete(messages)).await {
        Ok(result) => result,
        Err(_) => Err(ReasoningError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Slow;

    #[async_trait]
    impl ReasoningClient for Slow {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("late".into())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_reported() {
        let result = complete_with_timeout(&Slow, &[ChatMessage::user("hi")], Duration::from_secs(1)).await;
        assert_eq!(result, Err(ReasoningError::Timeout(Duration::from_secs(1))));
    }
}
