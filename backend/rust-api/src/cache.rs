use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::models::Question;

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// Process-wide TTL cache with explicit `get`/`put`/`invalidate`. Lookups
/// drop expired entries; no await ever happens while the lock is held.
#[derive(Clone)]
pub struct TtlCache<V> {
    ttl: Duration,
    entries: Arc<Mutex<HashMap<String, Entry<V>>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: impl Into<String>, value: V) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key.into(),
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
    }
}

/// Tracks recently served random questions per subject+grade so consecutive
/// draws avoid repeats. Entries are keyed `{subject}-{grade}-{id}`, consumed
/// at most once, and pruned oldest-first beyond `max_size`.
#[derive(Clone)]
pub struct RecentQuestionCache {
    ttl: Duration,
    max_size: usize,
    entries: Arc<Mutex<HashMap<String, Entry<Question>>>>,
}

impl RecentQuestionCache {
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        Self {
            ttl,
            max_size,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn scope_prefix(subject: &str, grade: &str) -> String {
        format!("{}-{}-", subject, grade)
    }

    pub fn put(&self, subject: &str, grade: &str, question: &Question) {
        let key = format!("{}{}", Self::scope_prefix(subject, grade), question.id());
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key,
            Entry {
                value: question.clone(),
                inserted_at: Instant::now(),
            },
        );
        self.prune_locked(&mut entries);
    }

    /// Ids of unexpired entries for the subject+grade scope.
    pub fn recent_ids(&self, subject: &str, grade: &str) -> HashSet<String> {
        let prefix = Self::scope_prefix(subject, grade);
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .iter()
            .filter(|(key, entry)| {
                key.starts_with(&prefix) && entry.inserted_at.elapsed() < self.ttl
            })
            .map(|(_, entry)| entry.value.id().to_string())
            .collect()
    }

    /// Remove and return the oldest entry for the scope: each recorded
    /// question is released for re-delivery exactly once.
    pub fn take_oldest(&self, subject: &str, grade: &str) -> Option<Question> {
        let prefix = Self::scope_prefix(subject, grade);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let key = entries
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .min_by_key(|(_, entry)| entry.inserted_at)
            .map(|(key, _)| key.clone())?;
        entries.remove(&key).map(|entry| entry.value)
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prune_locked(&self, entries: &mut HashMap<String, Entry<Question>>) {
        while entries.len() > self.max_size {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    entries.remove(&key);
                }
                None => break,
            }
        }
    }
}
