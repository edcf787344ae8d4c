//! Storage abstraction for investigations
//!
//! Provides trait-based storage with an in-memory implementation for tests
//! and a file-backed implementation (`FileRepository`) for durable use.

mod file;
mod journal;
mod snapshot;

pub use file::{FileRepository, LogWriter};
pub use journal::{JournalEntry, JournalEvent};
pub use snapshot::{ComponentSnapshot, EvidenceBundle, SnapshotWriter};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::investigation::{InvestigationRecord, InvestigationSummary};
use crate::types::InvestigationId;

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Checksum mismatch for {0}")]
    ChecksumMismatch(String),

    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Compute SHA-256 checksum of serialized data
pub fn compute_checksum(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Storage trait for investigations (allows test mocks)
#[async_trait]
pub trait InvestigationRepository: Send + Sync {
    /// Persist the full record, replacing any previous version atomically
    async fn save(&self, record: &InvestigationRecord) -> Result<(), StorageError>;

    /// Load a record by id
    async fn load(&self, id: InvestigationId) -> Result<Option<InvestigationRecord>, StorageError>;

    /// List summaries of every stored investigation, newest first
    async fn list(&self) -> Result<Vec<InvestigationSummary>, StorageError>;

    /// Append events to the investigation's journal
    async fn append_journal(&self, id: InvestigationId, events: Vec<JournalEvent>) -> Result<(), StorageError>;

    /// Read back the journal, skipping torn or corrupt entries
    async fn journal(&self, id: InvestigationId) -> Result<Vec<JournalEntry>, StorageError>;
}

fn sort_newest_first(summaries: &mut [InvestigationSummary]) {
    summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
}

/// In-memory storage for testing
pub struct InMemoryRepository {
    records: Arc<RwLock<HashMap<InvestigationId, InvestigationRecord>>>,
    journals: Arc<RwLock<HashMap<InvestigationId, Vec<JournalEntry>>>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            journals: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InvestigationRepository for InMemoryRepository {
    async fn save(&self, record: &InvestigationRecord) -> Result<(), StorageError> {
        let mut store = self.records.write().await;
        store.insert(record.id, record.clone());
        Ok(())
    }

    async fn load(&self, id: InvestigationId) -> Result<Option<InvestigationRecord>, StorageError> {
        let store = self.records.read().await;
        Ok(store.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<InvestigationSummary>, StorageError> {
        let store = self.records.read().await;
        let mut summaries: Vec<_> = store.values().map(InvestigationSummary::from).collect();
        sort_newest_first(&mut summaries);
        Ok(summaries)
    }

    async fn append_journal(&self, id: InvestigationId, events: Vec<JournalEvent>) -> Result<(), StorageError> {
        let mut journals = self.journals.write().await;
        let journal = journals.entry(id).or_default();
        for event in events {
            journal.push(JournalEntry::seal(event)?);
        }
        Ok(())
    }

    async fn journal(&self, id: InvestigationId) -> Result<Vec<JournalEntry>, StorageError> {
        let journals = self.journals.read().await;
        Ok(journals.get(&id).cloned().unwrap_or_default())
    }
}
