//! Per-component snapshot records.
//!
//! When a root cause is accepted, the raw state of every component involved
//! is captured next to the finding and hypothesis that implicated it. Each
//! snapshot is written once to
//! `snapshots/{timestamp}_{component}_{finding}.json` and never rewritten.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use super::StorageError;
use crate::cluster::NodeStatus;
use crate::types::{ComponentId, Finding, Hypothesis, InvestigationId};

/// Raw cluster state gathered for one component.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBundle {
    pub resource: Option<Value>,
    pub logs: Option<String>,
    pub events: Vec<Value>,
    pub node_status: Vec<NodeStatus>,
    /// Fetches that failed while the bundle was gathered
    pub errors: Vec<String>,
}

/// Write-once audit record for one implicated component.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentSnapshot {
    pub timestamp: DateTime<Utc>,
    pub investigation: InvestigationId,
    pub component: ComponentId,
    pub finding: Finding,
    pub hypothesis: Option<Hypothesis>,
    pub evidence: EvidenceBundle,
}

/// Writes component snapshots under a data directory.
#[derive(Clone, Debug)]
pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            dir: root.as_ref().join("snapshots"),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a snapshot. Fails rather than overwrite an existing file.
    pub async fn write(&self, snapshot: &ComponentSnapshot) -> Result<PathBuf, StorageError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let name = format!(
            "{}_{}_{}.json",
            snapshot.timestamp.format("%Y%m%dT%H%M%S%.3fZ"),
            snapshot.component.file_safe(),
            &snapshot.finding.id.to_string()[..8],
        );
        let path = self.dir.join(name);
        let json = serde_json::to_vec_pretty(snapshot)?;

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => StorageError::AlreadyExists(path.display().to_string()),
                _ => StorageError::Io(e),
            })?;
        file.write_all(&json).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(path)
    }

    /// Read every snapshot for one investigation.
    pub async fn read_all(&self, investigation: InvestigationId) -> Result<Vec<ComponentSnapshot>, StorageError> {
        let mut snapshots = Vec::new();
        if !tokio::fs::try_exists(&self.dir).await? {
            return Ok(snapshots);
        }
        let mut dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let bytes = tokio::fs::read(entry.path()).await?;
            if let Ok(snapshot) = serde_json::from_slice::<ComponentSnapshot>(&bytes) {
                if snapshot.investigation == investigation {
                    snapshots.push(snapshot);
                }
            }
        }
        snapshots.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.component.cmp(&b.component)));
        Ok(snapshots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AgentKind, Severity};
    use tempfile::TempDir;

    fn snapshot(investigation: InvestigationId) -> ComponentSnapshot {
        let component = ComponentId::pod("web-1");
        ComponentSnapshot {
            timestamp: Utc::now(),
            investigation,
            component: component.clone(),
            finding: Finding::new(AgentKind::Logs, component, "crash", Severity::Critical, "exit 1"),
            hypothesis: None,
            evidence: EvidenceBundle::default(),
        }
    }

    #[tokio::test]
    async fn test_write_once() {
        let tmp = TempDir::new().unwrap();
        let writer = SnapshotWriter::new(tmp.path());
        let snap = snapshot(InvestigationId::new());

        let path = writer.write(&snap).await.unwrap();
        assert!(path.file_name().unwrap().to_str().unwrap().contains("Pod_web-1"));
        assert!(matches!(writer.write(&snap).await, Err(StorageError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_read_all_filters_by_investigation() {
        let tmp = TempDir::new().unwrap();
        let writer = SnapshotWriter::new(tmp.path());
        let id = InvestigationId::new();
        writer.write(&snapshot(id)).await.unwrap();
        writer.write(&snapshot(InvestigationId::new())).await.unwrap();
        assert_eq!(writer.read_all(id).await.unwrap().len(), 1);
    }
}
