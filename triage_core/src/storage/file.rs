//! File-backed investigation repository.
//!
//! Layout under the root directory:
//! - `investigations/{id}.json`  checksummed record, replaced atomically
//! - `investigations/{id}.journal` append-only JSON lines
//!
//! Records are written to a temporary file, synced and renamed into place,
//! so a reader only ever sees a complete previous or complete new version.
//! The checksum covers the record bytes exactly as stored; loading verifies
//! those bytes before parsing them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{compute_checksum, sort_newest_first, InvestigationRepository, JournalEntry, JournalEvent, StorageError};
use crate::investigation::{InvestigationRecord, InvestigationSummary};
use crate::types::InvestigationId;

#[derive(Serialize, Deserialize)]
struct StoredRecord {
    checksum: String,
    record: Box<RawValue>,
}

/// Durable repository rooted at a data directory.
#[derive(Clone, Debug)]
pub struct FileRepository {
    dir: PathBuf,
}

impl FileRepository {
    /// Open (creating if needed) a repository under `root`.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = root.as_ref().join("investigations");
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn record_path(&self, id: InvestigationId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn journal_path(&self, id: InvestigationId) -> PathBuf {
        self.dir.join(format!("{}.journal", id))
    }

    async fn read_record(path: &Path) -> Result<InvestigationRecord, StorageError> {
        let bytes = tokio::fs::read(path).await?;
        let stored: StoredRecord = serde_json::from_slice(&bytes)?;
        if compute_checksum(stored.record.get().as_bytes()) != stored.checksum {
            return Err(StorageError::ChecksumMismatch(path.display().to_string()));
        }
        Ok(serde_json::from_str(stored.record.get())?)
    }
}

/// Write `bytes` to `path` through a synced temporary file and a rename.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
    }
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Scoped writer over an append-only journal file.
///
/// Entries are buffered and reach the file only on [`LogWriter::commit`],
/// which writes them in one call, flushes and syncs. Dropping an
/// uncommitted writer discards the buffer and closes the file.
pub struct LogWriter {
    file: tokio::fs::File,
    pending: Vec<u8>,
    count: usize,
}

impl LogWriter {
    /// Open `path` for appending, creating it if missing.
    pub async fn open(path: &Path) -> Result<Self, StorageError> {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self {
            file,
            pending: Vec::new(),
            count: 0,
        })
    }

    /// Buffer one entry as a JSON line.
    pub fn push(&mut self, entry: &JournalEntry) -> Result<(), StorageError> {
        serde_json::to_writer(&mut self.pending, entry)?;
        self.pending.push(b'\n');
        self.count += 1;
        Ok(())
    }

    /// Write buffered entries, flush and sync. Returns the number written.
    pub async fn commit(mut self) -> Result<usize, StorageError> {
        if self.count == 0 {
            return Ok(0);
        }
        self.file.write_all(&self.pending).await?;
        self.file.flush().await?;
        self.file.sync_data().await?;
        Ok(self.count)
    }
}

#[async_trait]
impl InvestigationRepository for FileRepository {
    async fn save(&self, record: &InvestigationRecord) -> Result<(), StorageError> {
        let record_json = RawValue::from_string(serde_json::to_string(record)?)?;
        let stored = StoredRecord {
            checksum: compute_checksum(record_json.get().as_bytes()),
            record: record_json,
        };
        let json = serde_json::to_vec_pretty(&stored)?;
        write_atomic(&self.record_path(record.id), &json).await?;
        debug!("Saved investigation {} ({} bytes)", record.id, json.len());
        Ok(())
    }

    async fn load(&self, id: InvestigationId) -> Result<Option<InvestigationRecord>, StorageError> {
        let path = self.record_path(id);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        Self::read_record(&path).await.map(Some)
    }

    async fn list(&self) -> Result<Vec<InvestigationSummary>, StorageError> {
        let mut summaries = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_record(&path).await {
                Ok(record) => summaries.push(InvestigationSummary::from(&record)),
                Err(e) => warn!("Skipping unreadable record {}: {}", path.display(), e),
            }
        }
        sort_newest_first(&mut summaries);
        Ok(summaries)
    }

    async fn append_journal(&self, id: InvestigationId, events: Vec<JournalEvent>) -> Result<(), StorageError> {
        if events.is_empty() {
            return Ok(());
        }
        let mut writer = LogWriter::open(&self.journal_path(id)).await?;
        for event in events {
            writer.push(&JournalEntry::seal(event)?)?;
        }
        writer.commit().await?;
        Ok(())
    }

    async fn journal(&self, id: InvestigationId) -> Result<Vec<JournalEntry>, StorageError> {
        let path = self.journal_path(id);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(Vec::new());
        }
        let text = tokio::fs::read_to_string(&path).await?;
        Ok(JournalEntry::parse_lines(&text))
    }
}
