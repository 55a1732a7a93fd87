use super::types::Turn;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

/// Process-wide conversation memory: per-key turn history plus a parallel
/// last-access record used to rank sessions for eviction.
///
/// Operations are total over the key space — referencing an unseen key
/// creates the session, seeded with the configured system turn. Turn 0 is
/// always that system turn and is never evicted individually; only whole
/// sessions go, via [`SessionStore::maybe_evict`]. Nothing persists across
/// process restart.
pub struct SessionStore {
    system_prompt: String,
    watermark: usize,
    evict_fraction: f64,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    histories: HashMap<String, Vec<Turn>>,
    last_access: HashMap<String, DateTime<Utc>>,
}

impl SessionStore {
    /// `watermark`: live-session count below which eviction is a no-op.
    /// `evict_fraction`: share of sessions removed when it does run.
    pub fn new(system_prompt: impl Into<String>, watermark: usize, evict_fraction: f64) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            watermark,
            evict_fraction,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Returns the session's history, initializing an unseen key with the
    /// system turn. Records an access.
    pub fn get_or_create(&self, key: &str) -> Vec<Turn> {
        let mut inner = self.lock();
        inner.last_access.insert(key.to_string(), Utc::now());
        inner
            .histories
            .entry(key.to_string())
            .or_insert_with(|| vec![Turn::system(self.system_prompt.clone())])
            .clone()
    }

    /// Appends a turn to the session's history, creating the session if
    /// needed. Does not trim.
    pub fn append(&self, key: &str, turn: Turn) {
        let mut inner = self.lock();
        inner.last_access.insert(key.to_string(), Utc::now());
        let system_prompt = self.system_prompt.clone();
        inner
            .histories
            .entry(key.to_string())
            .or_insert_with(|| vec![Turn::system(system_prompt)])
            .push(turn);
    }

    /// Keeps the system turn plus only the most recent `ceiling` turns.
    pub fn trim(&self, key: &str, ceiling: usize) {
        let mut inner = self.lock();
        // Touch only sessions that exist; an access record without a
        // history would pollute the eviction ranking.
        if !inner.histories.contains_key(key) {
            return;
        }
        inner.last_access.insert(key.to_string(), Utc::now());
        let Some(history) = inner.histories.get_mut(key) else {
            return;
        };
        if history.len() > ceiling + 1 {
            let tail_start = history.len() - ceiling;
            let mut trimmed = Vec::with_capacity(ceiling + 1);
            trimmed.push(history[0].clone());
            trimmed.extend_from_slice(&history[tail_start..]);
            *history = trimmed;
        }
    }

    /// Opportunistic maintenance, piggybacked on the completion hot path.
    ///
    /// Below the watermark this is a cheap no-op. Above it, sessions are
    /// ranked by last access ascending and the oldest fraction is dropped,
    /// history and access record both. Ties fall wherever the map happens to
    /// enumerate them. Returns the number of sessions removed.
    pub fn maybe_evict(&self) -> usize {
        let mut inner = self.lock();
        let live = inner.histories.len();
        if live < self.watermark {
            return 0;
        }

        let mut ranked: Vec<(String, DateTime<Utc>)> = inner
            .last_access
            .iter()
            .map(|(key, at)| (key.clone(), *at))
            .collect();
        ranked.sort_by_key(|&(_, at)| at);

        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let remove_count = (live as f64 * self.evict_fraction).floor() as usize;

        for (key, _) in ranked.iter().take(remove_count) {
            inner.histories.remove(key);
            inner.last_access.remove(key);
        }

        if remove_count > 0 {
            info!(removed = remove_count, "session memory optimization completed");
        }
        remove_count
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.lock().histories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().histories.is_empty()
    }

    /// Snapshot of a session's history without touching its access time.
    pub fn peek(&self, key: &str) -> Option<Vec<Turn>> {
        self.lock().histories.get(key).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub(crate) fn set_last_access(&self, key: &str, at: DateTime<Utc>) {
        self.lock().last_access.insert(key.to_string(), at);
    }
}
