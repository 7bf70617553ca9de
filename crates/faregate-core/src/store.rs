//! Durable identity → embedding mapping with full-rewrite persistence.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::types::EmbeddingRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("embedding dimension mismatch: store holds {expected}-d vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("identity {identity:?} is not registered")]
    IdentityNotFound { identity: String },
    #[error("failed to write store file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode store file: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A removed record together with whether the deletion reached disk.
#[derive(Debug)]
pub struct RemovedEntry {
    pub record: EmbeddingRecord,
    pub durable: bool,
}

/// In-memory gallery backed by one JSON document, rewritten atomically in
/// full after every mutation.
///
/// Reads take snapshots; mutation happens under the write lock so
/// concurrent enrollment and recognition never observe a half-applied
/// update. A failed durable write keeps the in-memory mutation: the
/// process stays internally consistent and the caller sees `durable: false`.
pub struct EmbeddingStore {
    path: PathBuf,
    dimension: usize,
    records: RwLock<HashMap<String, EmbeddingRecord>>,
}

impl EmbeddingStore {
    /// Load the store from `path`, expecting `dimension`-d embeddings.
    ///
    /// A missing or unreadable or corrupt file starts the store empty with
    /// a warning. A parseable file holding a different embedding dimension
    /// is a configuration error and fails the open.
    pub fn open(path: &Path, dimension: usize) -> Result<Self, StoreError> {
        let records = match fs::read(path) {
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no store file yet, starting empty");
                HashMap::new()
            }
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "store file unreadable, starting empty"
                );
                HashMap::new()
            }
            Ok(bytes) => match serde_json::from_slice::<HashMap<String, EmbeddingRecord>>(&bytes) {
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "store file corrupt, starting empty"
                    );
                    HashMap::new()
                }
                Ok(mut parsed) => {
                    for (key, record) in parsed.iter_mut() {
                        if record.embedding.dim() != dimension {
                            return Err(StoreError::DimensionMismatch {
                                expected: dimension,
                                actual: record.embedding.dim(),
                            });
                        }
                        // The map key is authoritative for the identity.
                        record.identity = key.clone();
                    }
                    parsed
                }
            },
        };

        tracing::info!(
            path = %path.display(),
            entries = records.len(),
            dimension,
            "embedding store loaded"
        );
        Ok(Self {
            path: path.to_path_buf(),
            dimension,
            records: RwLock::new(records),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.read_guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_guard().is_empty()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.read_guard().contains_key(identity)
    }

    pub fn get(&self, identity: &str) -> Option<EmbeddingRecord> {
        self.read_guard().get(identity).cloned()
    }

    /// Copy of the gallery in no particular order, for matching.
    pub fn snapshot(&self) -> Vec<EmbeddingRecord> {
        self.read_guard().values().cloned().collect()
    }

    /// Copy of the gallery sorted by identity, for listings.
    pub fn list(&self) -> Vec<EmbeddingRecord> {
        let mut records = self.snapshot();
        records.sort_by(|a, b| a.identity.cmp(&b.identity));
        records
    }

    /// Upsert a record, last write wins, and rewrite the backing file.
    ///
    /// Returns whether the rewrite reached disk. On a failed rewrite the
    /// in-memory upsert stays applied and a warning is logged.
    pub fn register(&self, record: EmbeddingRecord) -> Result<bool, StoreError> {
        if record.embedding.dim() != self.dimension {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual: record.embedding.dim(),
            });
        }

        let mut guard = self.write_guard();
        guard.insert(record.identity.clone(), record);
        Ok(self.persist_or_warn(&guard))
    }

    /// Delete a record and its face-image artifact, then rewrite the file.
    ///
    /// An absent identity is its own outcome, distinct from I/O trouble.
    pub fn remove(&self, identity: &str) -> Result<RemovedEntry, StoreError> {
        let mut guard = self.write_guard();
        let record = guard.remove(identity).ok_or_else(|| StoreError::IdentityNotFound {
            identity: identity.to_string(),
        })?;

        if let Some(image_path) = &record.image_path {
            match fs::remove_file(image_path) {
                Ok(()) => {
                    tracing::debug!(path = %image_path.display(), "face artifact deleted")
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(path = %image_path.display(), "face artifact already absent")
                }
                Err(err) => tracing::warn!(
                    path = %image_path.display(),
                    error = %err,
                    "failed to delete face artifact"
                ),
            }
        }

        let durable = self.persist_or_warn(&guard);
        Ok(RemovedEntry { record, durable })
    }

    /// Swap the whole gallery for `records` (rebuild ingestion).
    ///
    /// Later records win on duplicate identities. All embeddings must have
    /// the configured dimension.
    pub fn replace_all(&self, records: Vec<EmbeddingRecord>) -> Result<bool, StoreError> {
        for record in &records {
            if record.embedding.dim() != self.dimension {
                return Err(StoreError::DimensionMismatch {
                    expected: self.dimension,
                    actual: record.embedding.dim(),
                });
            }
        }

        let mut map = HashMap::with_capacity(records.len());
        for record in records {
            map.insert(record.identity.clone(), record);
        }

        let mut guard = self.write_guard();
        *guard = map;
        Ok(self.persist_or_warn(&guard))
    }

    fn persist_or_warn(&self, records: &HashMap<String, EmbeddingRecord>) -> bool {
        match self.persist(records) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "store rewrite failed; in-memory state kept"
                );
                false
            }
        }
    }

    /// Full rewrite through a temp file in the same directory, fsynced and
    /// renamed over the target.
    fn persist(&self, records: &HashMap<String, EmbeddingRecord>) -> Result<(), StoreError> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|source| StoreError::Write {
            path: parent.to_path_buf(),
            source,
        })?;

        // Stable key order keeps rewrites diffable.
        let ordered: BTreeMap<&String, &EmbeddingRecord> = records.iter().collect();

        let mut tmp = NamedTempFile::new_in(parent).map_err(|source| StoreError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, &ordered)?;
            writer.flush().map_err(|source| StoreError::Write {
                path: self.path.clone(),
                source,
            })?;
        }
        tmp.as_file().sync_all().map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })?;
        tmp.persist(&self.path).map_err(|err| StoreError::Write {
            path: self.path.clone(),
            source: err.error,
        })?;
        Ok(())
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, HashMap<String, EmbeddingRecord>> {
        self.records.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, HashMap<String, EmbeddingRecord>> {
        self.records.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
