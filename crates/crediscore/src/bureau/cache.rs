use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::bureau::scoring::ScoreResult;

/// TTL cache boundary for computed scores. Implementations are injectable
/// owned state; the service never assumes a particular backend.
pub trait ScoreCache: Send + Sync + 'static {
    fn get(&self, key: &str) -> Option<ScoreResult>;
    fn put(&self, key: &str, value: ScoreResult, ttl: Duration);
    fn remove(&self, key: &str);
}

struct CacheEntry {
    expires_at: Instant,
    value: ScoreResult,
}

/// Process-local cache. Expired entries are pruned lazily on access.
#[derive(Default)]
pub struct InMemoryScoreCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl InMemoryScoreCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScoreCache for InMemoryScoreCache {
    fn get(&self, key: &str) -> Option<ScoreResult> {
        let mut entries = self.entries.lock().expect("score cache poisoned");
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn put(&self, key: &str, value: ScoreResult, ttl: Duration) {
        let entry = CacheEntry {
            expires_at: Instant::now() + ttl,
            value,
        };
        self.entries
            .lock()
            .expect("score cache poisoned")
            .insert(key.to_string(), entry);
    }

    fn remove(&self, key: &str) {
        self.entries
            .lock()
            .expect("score cache poisoned")
            .remove(key);
    }
}
