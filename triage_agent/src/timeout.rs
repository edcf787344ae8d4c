//! Timeout configuration for agents and collaborators.
//!
//! Every agent invocation runs in its own task under an [`AgentTimeout`];
//! a timed-out, failed or panicking agent becomes a Finding-less
//! [`AgentResult`] instead of an error.

use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::warn;
use triage_core::{AgentKind, AgentResult};
use triage_runtime::RuntimeConfig;

use crate::agents::{AgentContext, DiagnosticAgent};

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum TimeoutError {
    #[error("{agent} agent exceeded timeout limit of {timeout:?}")]
    AgentTimeout { agent: AgentKind, timeout: Duration },
}

/// Timeout for one agent invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AgentTimeout(Duration);

impl AgentTimeout {
    pub fn new(duration: Duration) -> Self {
        Self(duration)
    }

    pub fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub fn duration(&self) -> Duration {
        self.0
    }
}

impl Default for AgentTimeout {
    fn default() -> Self {
        Self(Duration::from_secs(30))
    }
}

/// Combined timeout configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeoutConfig {
    /// Whole-agent bound
    pub agent: AgentTimeout,
    /// Bound on each cluster fetch inside an agent
    pub fetch: Duration,
    /// Bound on each reasoning collaborator call
    pub reasoning: Duration,
}

impl TimeoutConfig {
    pub fn new() -> Self {
        Self {
            agent: AgentTimeout::default(),
            fetch: Duration::from_secs(10),
            reasoning: Duration::from_secs(20),
        }
    }

    pub fn from_runtime(config: &RuntimeConfig) -> Self {
        Self {
            agent: AgentTimeout::new(config.agent_timeout()),
            fetch: config.fetch_timeout(),
            reasoning: config.reasoning_timeout(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `agent` in its own task under `timeout`.
///
/// Findings attributed to another agent are dropped.
pub async fn run_bounded(agent: Arc<dyn DiagnosticAgent>, ctx: AgentContext, timeout: AgentTimeout) -> AgentResult {
    let kind = agent.kind();
    let limit = timeout.duration();
    let started = Instant::now();
    let handle = tokio::spawn(async move { tokio::time::timeout(limit, agent.analyze(&ctx)).await });

    let mut result = match handle.await {
        Ok(Ok(Ok(result))) => result,
        Ok(Ok(Err(e))) => {
            warn!(agent = %kind, "Agent failed: {}", e);
            AgentResult::failed(kind, e.to_string())
        }
        Ok(Err(_)) => {
            let err = TimeoutError::AgentTimeout { agent: kind, timeout: limit };
            warn!(agent = %kind, "{}", err);
            AgentResult::failed(kind, err.to_string())
        }
        Err(join_error) => {
            warn!(agent = %kind, "Agent task aborted: {}", join_error);
            AgentResult::failed(kind, format!("agent task aborted: {}", join_error))
        }
    };

    let before = result.findings.len();
    result.findings.retain(|f| f.agent == kind);
    if result.findings.len() != before {
        warn!(agent = %kind, "Dropped {} misattributed findings", before - result.findings.len());
    }
    result.agent = kind;
    result.elapsed_ms = started.elapsed().as_millis() as u64;
    result
}
