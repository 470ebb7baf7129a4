use percent_encoding::percent_decode_str;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::models::hint::HintRecord;

struct Snapshot {
    records: HashMap<String, HintRecord>,
    loaded_at: Option<Instant>,
}

/// Whole-file JSON store mapping question id -> hint record. Reads go
/// through an in-memory snapshot refreshed at most once per TTL; a corrupt
/// or missing file degrades to the last good snapshot (or an empty map),
/// never to an error. Writes rewrite the whole file; concurrent writers are
/// last-write-wins, which is acceptable for equivalent generated records in
/// a single-process deployment.
pub struct HintStore {
    path: PathBuf,
    ttl: Duration,
    snapshot: Mutex<Snapshot>,
}

impl HintStore {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
            snapshot: Mutex::new(Snapshot {
                records: HashMap::new(),
                loaded_at: None,
            }),
        }
    }

    /// Question ids arrive URL-encoded from some clients; store keys are
    /// always the decoded form.
    pub fn normalize_id(question_id: &str) -> String {
        percent_decode_str(question_id)
            .decode_utf8_lossy()
            .into_owned()
    }

    pub fn get(&self, question_id: &str) -> Option<HintRecord> {
        let id = Self::normalize_id(question_id);
        let mut snapshot = self.snapshot.lock().unwrap_or_else(|e| e.into_inner());
        self.refresh_locked(&mut snapshot);
        snapshot.records.get(&id).cloned()
    }

    /// Insert a record and rewrite the backing file. Write failures are
    /// logged and leave the in-memory snapshot as the source of truth.
    pub fn insert(&self, record: HintRecord) {
        let mut normalized = record;
        normalized.question_id = Self::normalize_id(&normalized.question_id);

        let mut snapshot = self.snapshot.lock().unwrap_or_else(|e| e.into_inner());
        self.refresh_locked(&mut snapshot);
        snapshot
            .records
            .insert(normalized.question_id.clone(), normalized);

        if let Err(e) = Self::write_file(&self.path, &snapshot.records) {
            tracing::error!("failed to persist hint store {}: {}", self.path.display(), e);
        }
        snapshot.loaded_at = Some(Instant::now());
    }

    pub fn len(&self) -> usize {
        let mut snapshot = self.snapshot.lock().unwrap_or_else(|e| e.into_inner());
        self.refresh_locked(&mut snapshot);
        snapshot.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn refresh_locked(&self, snapshot: &mut Snapshot) {
        if let Some(loaded_at) = snapshot.loaded_at {
            if loaded_at.elapsed() < self.ttl {
                return;
            }
        }

        match std::fs::read_to_string(&self.path) {
            Ok(data) => match serde_json::from_str::<HashMap<String, HintRecord>>(&data) {
                Ok(records) => {
                    snapshot.records = records;
                    snapshot.loaded_at = Some(Instant::now());
                }
                Err(e) => {
                    tracing::error!(
                        "hint store {} holds invalid JSON, keeping previous snapshot: {}",
                        self.path.display(),
                        e
                    );
                    snapshot.loaded_at = Some(Instant::now());
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if let Err(e) = Self::write_file(&self.path, &snapshot.records) {
                    tracing::warn!(
                        "could not initialize hint store {}: {}",
                        self.path.display(),
                        e
                    );
                }
                snapshot.loaded_at = Some(Instant::now());
            }
            Err(e) => {
                tracing::error!(
                    "failed to read hint store {}, keeping previous snapshot: {}",
                    self.path.display(),
                    e
                );
                snapshot.loaded_at = Some(Instant::now());
            }
        }
    }

    fn write_file(path: &Path, records: &HashMap<String, HintRecord>) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let data = serde_json::to_string_pretty(records)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(question_id: &str) -> HintRecord {
        HintRecord {
            question_id: question_id.to_string(),
            subject: "math".to_string(),
            steps: vec!["adım 1".to_string(), "adım 2".to_string()],
            full_explanation: "açıklama".to_string(),
            misconceptions: vec![],
        }
    }

    #[test]
    fn insert_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = HintStore::new(dir.path().join("hints.json"), Duration::from_secs(60));

        store.insert(record("Math-9-cebir-abc123"));

        let found = store.get("Math-9-cebir-abc123").unwrap();
        assert_eq!(found.steps.len(), 2);
    }

    #[test]
    fn get_decodes_url_encoded_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = HintStore::new(dir.path().join("hints.json"), Duration::from_secs(60));

        store.insert(record("Fizik-9-hız ve yol-abc123"));

        assert!(store.get("Fizik-9-h%C4%B1z%20ve%20yol-abc123").is_some());
    }

    #[test]
    fn records_survive_a_new_store_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hints.json");

        HintStore::new(&path, Duration::from_secs(60)).insert(record("Math-9-cebir-abc123"));

        let reopened = HintStore::new(&path, Duration::from_secs(60));
        assert!(reopened.get("Math-9-cebir-abc123").is_some());
    }

    #[test]
    fn corrupt_file_degrades_to_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hints.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = HintStore::new(&path, Duration::from_secs(60));
        assert!(store.get("anything").is_none());
    }

    #[test]
    fn missing_file_is_created_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("hints.json");

        let store = HintStore::new(&path, Duration::from_secs(60));
        assert!(store.is_empty());
        assert!(path.exists());
    }
}
