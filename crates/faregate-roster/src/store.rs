//! Roster store: rider rows plus appended audit history, one JSON document
//! rewritten atomically in full.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use faregate_core::{FeeStatus, FeeStatusSource};

use crate::audit::{AccessLogEntry, CaptureRecord};

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("rider {id:?} is not on the roster")]
    RiderNotFound { id: String },
    #[error("failed to write roster file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode roster file: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One rider row: who they are and whether their fare is settled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiderRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub department: Option<String>,
    pub fee_status: FeeStatus,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RosterDocument {
    #[serde(default)]
    riders: BTreeMap<String, RiderRecord>,
    #[serde(default)]
    access_logs: Vec<AccessLogEntry>,
    #[serde(default)]
    captures: Vec<CaptureRecord>,
}

/// Rider roster and audit trail behind one lock, mirroring the embedding
/// store's durability contract: failed rewrites keep the in-memory change
/// and report `durable: false`.
pub struct RosterStore {
    path: PathBuf,
    doc: RwLock<RosterDocument>,
}

impl RosterStore {
    /// Load the roster from `path`; a missing, unreadable or corrupt file
    /// starts it empty with a warning.
    pub fn open(path: &Path) -> Self {
        let doc = match fs::read(path) {
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no roster file yet, starting empty");
                RosterDocument::default()
            }
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "roster file unreadable, starting empty"
                );
                RosterDocument::default()
            }
            Ok(bytes) => match serde_json::from_slice::<RosterDocument>(&bytes) {
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "roster file corrupt, starting empty"
                    );
                    RosterDocument::default()
                }
                Ok(mut parsed) => {
                    // The map key is authoritative for the rider id.
                    for (key, rider) in parsed.riders.iter_mut() {
                        rider.id = key.clone();
                    }
                    parsed
                }
            },
        };

        tracing::info!(
            path = %path.display(),
            riders = doc.riders.len(),
            log_entries = doc.access_logs.len(),
            "roster loaded"
        );
        Self { path: path.to_path_buf(), doc: RwLock::new(doc) }
    }

    pub fn len(&self) -> usize {
        self.read_guard().riders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_guard().riders.is_empty()
    }

    pub fn get_rider(&self, id: &str) -> Option<RiderRecord> {
        self.read_guard().riders.get(id).cloned()
    }

    /// All riders, sorted by id.
    pub fn list_riders(&self) -> Vec<RiderRecord> {
        self.read_guard().riders.values().cloned().collect()
    }

    /// Insert or replace a rider row, then rewrite the backing file.
    pub fn upsert_rider(&self, rider: RiderRecord) -> Result<bool, RosterError> {
        let mut guard = self.write_guard();
        guard.riders.insert(rider.id.clone(), rider);
        Ok(self.persist_or_warn(&guard))
    }

    /// Flip the fare state of an existing rider.
    pub fn set_fee_status(&self, id: &str, status: FeeStatus) -> Result<bool, RosterError> {
        let mut guard = self.write_guard();
        let rider = guard
            .riders
            .get_mut(id)
            .ok_or_else(|| RosterError::RiderNotFound { id: id.to_string() })?;
        rider.fee_status = status;
        tracing::info!(rider = id, status = ?status, "fee status updated");
        Ok(self.persist_or_warn(&guard))
    }

    pub fn remove_rider(&self, id: &str) -> Result<bool, RosterError> {
        let mut guard = self.write_guard();
        guard
            .riders
            .remove(id)
            .ok_or_else(|| RosterError::RiderNotFound { id: id.to_string() })?;
        Ok(self.persist_or_warn(&guard))
    }

    /// Append a decision to the audit trail.
    pub fn append_access(&self, entry: AccessLogEntry) -> Result<bool, RosterError> {
        let mut guard = self.write_guard();
        guard.access_logs.push(entry);
        Ok(self.persist_or_warn(&guard))
    }

    /// The most recent `limit` audit entries, newest first.
    pub fn recent_access(&self, limit: usize) -> Vec<AccessLogEntry> {
        self.read_guard()
            .access_logs
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn append_capture(&self, record: CaptureRecord) -> Result<bool, RosterError> {
        let mut guard = self.write_guard();
        guard.captures.push(record);
        Ok(self.persist_or_warn(&guard))
    }

    /// The most recent `limit` capture records, newest first.
    pub fn recent_captures(&self, limit: usize) -> Vec<CaptureRecord> {
        self.read_guard()
            .captures
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    fn persist_or_warn(&self, doc: &RosterDocument) -> bool {
        match self.persist(doc) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "roster rewrite failed; in-memory state kept"
                );
                false
            }
        }
    }

    fn persist(&self, doc: &RosterDocument) -> Result<(), RosterError> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|source| RosterError::Write {
            path: parent.to_path_buf(),
            source,
        })?;

        let mut tmp = NamedTempFile::new_in(parent).map_err(|source| RosterError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, doc)?;
            writer.flush().map_err(|source| RosterError::Write {
                path: self.path.clone(),
                source,
            })?;
        }
        tmp.as_file().sync_all().map_err(|source| RosterError::Write {
            path: self.path.clone(),
            source,
        })?;
        tmp.persist(&self.path).map_err(|err| RosterError::Write {
            path: self.path.clone(),
            source: err.error,
        })?;
        Ok(())
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, RosterDocument> {
        self.doc.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, RosterDocument> {
        self.doc.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Riders absent from the roster count as not paid.
impl FeeStatusSource for RosterStore {
    fn fee_status(&self, identity: &str) -> FeeStatus {
        self.read_guard()
            .riders
            .get(identity)
            .map(|rider| rider.fee_status)
            .unwrap_or(FeeStatus::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faregate_core::AccessDecision;

    fn rider(id: &str, status: FeeStatus) -> RiderRecord {
        RiderRecord {
            id: id.to_string(),
            name: format!("Rider {id}"),
            department: None,
            fee_status: status,
        }
    }

    #[test]
    fn test_open_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let roster = RosterStore::open(&dir.path().join("roster.json"));
        assert!(roster.is_empty());
    }

    #[test]
    fn test_open_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.json");
        fs::write(&path, b"[[[").unwrap();

        let roster = RosterStore::open(&path);
        assert!(roster.is_empty());
    }

    #[test]
    fn test_upsert_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.json");

        let roster = RosterStore::open(&path);
        assert!(roster.upsert_rider(rider("r2", FeeStatus::Unpaid)).unwrap());
        assert!(roster.upsert_rider(rider("r1", FeeStatus::Paid)).unwrap());

        let reopened = RosterStore::open(&path);
        let listed = reopened.list_riders();
        assert_eq!(listed.len(), 2);
        // BTreeMap keys come back sorted.
        assert_eq!(listed[0].id, "r1");
        assert_eq!(listed[1].id, "r2");
    }

    #[test]
    fn test_map_key_is_authoritative_for_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.json");
        fs::write(
            &path,
            r#"{"riders":{"r9":{"id":"mismatched","name":"Ada","fee_status":"paid"}}}"#,
        )
        .unwrap();

        let roster = RosterStore::open(&path);
        assert_eq!(roster.get_rider("r9").unwrap().id, "r9");
        assert!(roster.get_rider("mismatched").is_none());
    }

    #[test]
    fn test_set_fee_status_updates_existing() {
        let dir = tempfile::tempdir().unwrap();
        let roster = RosterStore::open(&dir.path().join("roster.json"));
        roster.upsert_rider(rider("r1", FeeStatus::Unpaid)).unwrap();

        roster.set_fee_status("r1", FeeStatus::Paid).unwrap();
        assert_eq!(roster.get_rider("r1").unwrap().fee_status, FeeStatus::Paid);
    }

    #[test]
    fn test_set_fee_status_unknown_rider_fails() {
        let dir = tempfile::tempdir().unwrap();
        let roster = RosterStore::open(&dir.path().join("roster.json"));

        let result = roster.set_fee_status("ghost", FeeStatus::Paid);
        assert!(matches!(
            result,
            Err(RosterError::RiderNotFound { id }) if id == "ghost"
        ));
    }

    #[test]
    fn test_remove_rider() {
        let dir = tempfile::tempdir().unwrap();
        let roster = RosterStore::open(&dir.path().join("roster.json"));
        roster.upsert_rider(rider("r1", FeeStatus::Paid)).unwrap();

        assert!(roster.remove_rider("r1").unwrap());
        assert!(roster.is_empty());
        assert!(matches!(
            roster.remove_rider("r1"),
            Err(RosterError::RiderNotFound { .. })
        ));
    }

    #[test]
    fn test_fee_status_source_contract() {
        let dir = tempfile::tempdir().unwrap();
        let roster = RosterStore::open(&dir.path().join("roster.json"));
        roster.upsert_rider(rider("paid", FeeStatus::Paid)).unwrap();
        roster.upsert_rider(rider("unpaid", FeeStatus::Unpaid)).unwrap();

        assert_eq!(roster.fee_status("paid"), FeeStatus::Paid);
        assert_eq!(roster.fee_status("unpaid"), FeeStatus::Unpaid);
        // Absent identities read as unknown, never as paid.
        assert_eq!(roster.fee_status("ghost"), FeeStatus::Unknown);
    }

    #[test]
    fn test_access_log_append_and_recent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.json");
        let roster = RosterStore::open(&path);

        for i in 0..3 {
            let decision = AccessDecision::Allowed {
                identity: format!("r{i}"),
                confidence: 90.0 + i as f32,
            };
            roster
                .append_access(AccessLogEntry::from_decision(&decision, None))
                .unwrap();
        }

        let recent = roster.recent_access(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].identity.as_deref(), Some("r2"));
        assert_eq!(recent[1].identity.as_deref(), Some("r1"));

        let reopened = RosterStore::open(&path);
        assert_eq!(reopened.recent_access(10).len(), 3);
    }

    #[test]
    fn test_captures_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.json");
        let roster = RosterStore::open(&path);

        roster
            .append_capture(CaptureRecord::new(
                Some("r1"),
                "denied_unpaid",
                dir.path().join("cap.png"),
            ))
            .unwrap();

        let reopened = RosterStore::open(&path);
        let captures = reopened.recent_captures(5);
        assert_eq!(captures.len(), 1);
        assert_eq!(captures[0].identity.as_deref(), Some("r1"));
        assert_eq!(captures[0].status, "denied_unpaid");
    }

    #[test]
    fn test_failed_rewrite_keeps_memory_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("roster-as-dir");
        fs::create_dir(&blocked).unwrap();

        let roster = RosterStore::open(&blocked);
        let durable = roster.upsert_rider(rider("r1", FeeStatus::Paid)).unwrap();

        assert!(!durable);
        assert!(roster.get_rider("r1").is_some());
    }
}
