use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

/// Short-lived token storage with an atomic compare-and-take.
#[async_trait]
pub trait TokenCache: Send + Sync {
    /// Stores `token` under `key`, replacing any previous entry.
    async fn put(&self, key: &str, token: String, ttl: Duration) -> anyhow::Result<()>;
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    /// Removes the entry if and only if it is live and equals `expected`.
    async fn take_if_eq(&self, key: &str, expected: &str) -> anyhow::Result<bool>;
}

#[derive(Default)]
pub struct MemoryTokenCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenCache for MemoryTokenCache {
    async fn put(&self, key: &str, token: String, ttl: Duration) -> anyhow::Result<()> {
        let deadline = Instant::now() + ttl;
        let mut entries = self.entries.lock().await;
        entries.retain(|_, (_, d)| *d > Instant::now());
        entries.insert(key.to_string(), (token, deadline));
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let entries = self.entries.lock().await;
        Ok(entries
            .get(key)
            .filter(|(_, deadline)| *deadline > Instant::now())
            .map(|(token, _)| token.clone()))
    }

    async fn take_if_eq(&self, key: &str, expected: &str) -> anyhow::Result<bool> {
        let mut entries = self.entries.lock().await;
        let live_match = entries
            .get(key)
            .is_some_and(|(token, deadline)| token == expected && *deadline > Instant::now());
        if live_match {
            entries.remove(key);
        }
        Ok(live_match)
    }
}
