use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::auth::{JwtKeys, MemoryTokenCache, TokenCache, TransitionService};
use crate::config::AppConfig;
use crate::docs::DocsStore;
use crate::game::MetricService;
use crate::session::{SessionRegistry, SessionStore};
use crate::storage::{KvStore, MemoryStore, PgStore};
use crate::users::UserDb;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub keys: JwtKeys,
    pub store: Arc<dyn KvStore>,
    pub users: Arc<UserDb>,
    pub metrics: Arc<MetricService>,
    pub docs: Arc<DocsStore>,
    pub sessions: Arc<SessionRegistry>,
    pub transitions: Arc<TransitionService>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store: Arc<dyn KvStore> = match &config.database_url {
            Some(url) => {
                let db = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connect to database")?;
                sqlx::migrate!("./migrations")
                    .run(&db)
                    .await
                    .context("run migrations")?;
                info!("using postgres key-value store");
                Arc::new(PgStore::new(db))
            }
            None => {
                info!("DATABASE_URL not set, using in-memory store");
                Arc::new(MemoryStore::new())
            }
        };

        Self::from_parts(config, store, Arc::new(MemoryTokenCache::new())).await
    }

    pub async fn from_parts(
        config: Arc<AppConfig>,
        store: Arc<dyn KvStore>,
        cache: Arc<dyn TokenCache>,
    ) -> anyhow::Result<Self> {
        let keys = JwtKeys::from(&config.jwt);
        let users = Arc::new(UserDb::init(store.clone()).await?);
        Ok(Self {
            transitions: Arc::new(TransitionService::new(keys.clone(), cache)),
            metrics: Arc::new(MetricService::new(store.clone())),
            docs: Arc::new(DocsStore::new(store.clone())),
            sessions: Arc::new(SessionRegistry::new()),
            users,
            store,
            keys,
            config,
        })
    }

    /// Fully in-memory state for tests.
    pub async fn fake() -> Self {
        Self::from_parts(
            Arc::new(AppConfig::for_tests()),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryTokenCache::new()),
        )
        .await
        .expect("in-memory state")
    }

    /// Logged-out session over the shared repositories.
    pub fn new_session(&self) -> SessionStore {
        SessionStore::new(self.users.clone(), self.metrics.clone())
    }
}
