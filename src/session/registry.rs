use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use super::store::SessionStore;

pub type SharedSession = Arc<Mutex<SessionStore>>;

struct Entry {
    session: SharedSession,
    /// When the access token naming this session stops verifying.
    deadline: Instant,
}

/// Live sessions keyed by the `sub` of their access token. Entries outlive
/// nothing but their token: expired ones are invisible and are pruned on
/// the next insert.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Entry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: SessionStore, ttl: Duration) -> (Uuid, SharedSession) {
        let id = Uuid::new_v4();
        let shared = Arc::new(Mutex::new(session));
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, e| e.deadline > now);
        if sessions.len() < before {
            debug!(pruned = before - sessions.len(), "expired sessions pruned");
        }
        sessions.insert(
            id,
            Entry {
                session: shared.clone(),
                deadline: now + ttl,
            },
        );
        (id, shared)
    }

    pub async fn get(&self, id: Uuid) -> Option<SharedSession> {
        self.sessions
            .read()
            .await
            .get(&id)
            .filter(|e| e.deadline > Instant::now())
            .map(|e| e.session.clone())
    }

    pub async fn remove(&self, id: Uuid) -> Option<SharedSession> {
        self.sessions.write().await.remove(&id).map(|e| e.session)
    }

    /// Entries currently held, expired ones included until the next prune.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::MetricService;
    use crate::storage::{KvStore, MemoryStore};
    use crate::users::UserDb;

    async fn blank() -> SessionStore {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let users = Arc::new(UserDb::init(kv.clone()).await.unwrap());
        SessionStore::new(users, Arc::new(MetricService::new(kv)))
    }

    #[tokio::test]
    async fn insert_get_remove() {
        let registry = SessionRegistry::new();
        let (id, _) = registry.insert(blank().await, Duration::from_secs(60)).await;
        assert!(registry.get(id).await.is_some());
        assert_eq!(registry.len().await, 1);
        assert!(registry.remove(id).await.is_some());
        assert!(registry.get(id).await.is_none());
        assert!(registry.get(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn expired_sessions_vanish_and_are_pruned() {
        let registry = SessionRegistry::new();
        let (stale, _) = registry.insert(blank().await, Duration::ZERO).await;
        assert!(registry.get(stale).await.is_none());
        assert_eq!(registry.len().await, 1);

        let (live, _) = registry.insert(blank().await, Duration::from_secs(60)).await;
        assert_eq!(registry.len().await, 1);
        assert!(registry.get(live).await.is_some());
    }
}
