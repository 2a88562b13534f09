use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::PgPool;
use tokio::sync::RwLock;

/// Version stamped into every persisted blob.
pub const BLOB_VERSION: u32 = 1;

pub const USERS_KEY: &str = "csmcl_users";
pub const METRICS_KEY: &str = "csmcl_metrics";
pub const DOCS_KEY: &str = "csmcl_docs";

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> anyhow::Result<()>;
    async fn remove(&self, key: &str) -> anyhow::Result<()>;
}

#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> anyhow::Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// Key-value store over the `kv_entries` table.
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl KvStore for PgStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let row = sqlx::query_as::<_, (String,)>(
            r#"
            SELECT value
              FROM kv_entries
             WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.db)
        .await
        .with_context(|| format!("kv get {}", key))?;
        Ok(row.map(|(v,)| v))
    }

    async fn set(&self, key: &str, value: String) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_entries (key, value, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (key) DO UPDATE
               SET value = EXCLUDED.value,
                   updated_at = now()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.db)
        .await
        .with_context(|| format!("kv set {}", key))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        sqlx::query(r#"DELETE FROM kv_entries WHERE key = $1"#)
            .bind(key)
            .execute(&self.db)
            .await
            .with_context(|| format!("kv remove {}", key))?;
        Ok(())
    }
}

/// Read a versioned JSON blob. `None` when the key has never been written.
pub async fn load_json<T: DeserializeOwned>(
    store: &dyn KvStore,
    key: &str,
) -> anyhow::Result<Option<T>> {
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };
    let value: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("parse blob {}", key))?;
    let version = value.get("version").and_then(|v| v.as_u64()).unwrap_or(0);
    anyhow::ensure!(
        version == u64::from(BLOB_VERSION),
        "blob {} has unsupported version {}",
        key,
        version
    );
    let data = serde_json::from_value(value).with_context(|| format!("decode blob {}", key))?;
    Ok(Some(data))
}

/// Write a JSON blob. The payload must carry a `version` field.
pub async fn save_json<T: Serialize>(
    store: &dyn KvStore,
    key: &str,
    data: &T,
) -> anyhow::Result<()> {
    let raw = serde_json::to_string(data).with_context(|| format!("encode blob {}", key))?;
    store.set(key, raw).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Blob {
        version: u32,
        items: Vec<String>,
    }

    #[tokio::test]
    async fn memory_store_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", "v".into()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn load_json_missing_key_is_none() {
        let store = MemoryStore::new();
        let blob: Option<Blob> = load_json(&store, "nothing").await.unwrap();
        assert!(blob.is_none());
    }

    #[tokio::test]
    async fn load_json_rejects_unknown_version() {
        let store = MemoryStore::new();
        store
            .set("k", r#"{"version":7,"items":[]}"#.into())
            .await
            .unwrap();
        let err = load_json::<Blob>(&store, "k").await.unwrap_err();
        assert!(err.to_string().contains("unsupported version"));
    }

    #[tokio::test]
    async fn load_json_rejects_corrupt_blob() {
        let store = MemoryStore::new();
        store.set("k", "{not json".into()).await.unwrap();
        assert!(load_json::<Blob>(&store, "k").await.is_err());
    }

    #[tokio::test]
    async fn save_then_load_keeps_payload() {
        let store = MemoryStore::new();
        let blob = Blob {
            version: BLOB_VERSION,
            items: vec!["a".into()],
        };
        save_json(&store, "k", &blob).await.unwrap();
        let back: Blob = load_json(&store, "k").await.unwrap().unwrap();
        assert_eq!(back, blob);
    }
}
