use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::storage::{load_json, save_json, KvStore, BLOB_VERSION, DOCS_KEY};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocsBlob {
    version: u32,
    markdown_content: BTreeMap<String, String>,
    current_section: Option<String>,
    is_editing: bool,
}

impl Default for DocsBlob {
    fn default() -> Self {
        Self {
            version: BLOB_VERSION,
            markdown_content: BTreeMap::new(),
            current_section: None,
            is_editing: false,
        }
    }
}

/// Current section and editing flag, as shown to clients.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DocsState {
    pub current_section: Option<String>,
    pub is_editing: bool,
    pub sections: Vec<String>,
}

/// Markdown content per documentation section.
pub struct DocsStore {
    store: Arc<dyn KvStore>,
    write_lock: Mutex<()>,
}

impl DocsStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    async fn read(&self) -> anyhow::Result<DocsBlob> {
        Ok(load_json::<DocsBlob>(self.store.as_ref(), DOCS_KEY)
            .await?
            .unwrap_or_default())
    }

    async fn modify<R>(&self, f: impl FnOnce(&mut DocsBlob) -> R) -> anyhow::Result<R> {
        let _guard = self.write_lock.lock().await;
        let mut blob = self.read().await?;
        let out = f(&mut blob);
        save_json(self.store.as_ref(), DOCS_KEY, &blob).await?;
        Ok(out)
    }

    pub async fn set_content(&self, section: &str, content: String) -> anyhow::Result<()> {
        debug!(section, len = content.len(), "docs content set");
        self.modify(|b| {
            b.markdown_content.insert(section.to_string(), content);
        })
        .await
    }

    /// Empty for sections that were never written.
    pub async fn content(&self, section: &str) -> anyhow::Result<String> {
        Ok(self
            .read()
            .await?
            .markdown_content
            .get(section)
            .cloned()
            .unwrap_or_default())
    }

    pub async fn set_current_section(&self, section: Option<String>) -> anyhow::Result<()> {
        self.modify(|b| b.current_section = section).await
    }

    pub async fn current_content(&self) -> anyhow::Result<String> {
        let blob = self.read().await?;
        Ok(blob
            .current_section
            .as_ref()
            .and_then(|s| blob.markdown_content.get(s))
            .cloned()
            .unwrap_or_default())
    }

    /// Flips the editing flag and returns the new value.
    pub async fn toggle_editing(&self) -> anyhow::Result<bool> {
        self.modify(|b| {
            b.is_editing = !b.is_editing;
            b.is_editing
        })
        .await
    }

    pub async fn state(&self) -> anyhow::Result<DocsState> {
        let blob = self.read().await?;
        Ok(DocsState {
            current_section: blob.current_section,
            is_editing: blob.is_editing,
            sections: blob.markdown_content.into_keys().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn content_round_trips_per_section() {
        let docs = DocsStore::new(Arc::new(MemoryStore::new()));
        assert_eq!(docs.content("intro").await.unwrap(), "");
        docs.set_content("intro", "# Welcome".into()).await.unwrap();
        docs.set_content("wallet", "# Wallets".into()).await.unwrap();
        assert_eq!(docs.content("intro").await.unwrap(), "# Welcome");
        assert_eq!(docs.state().await.unwrap().sections, vec!["intro", "wallet"]);
    }

    #[tokio::test]
    async fn current_content_follows_current_section() {
        let docs = DocsStore::new(Arc::new(MemoryStore::new()));
        docs.set_content("intro", "# Welcome".into()).await.unwrap();
        assert_eq!(docs.current_content().await.unwrap(), "");
        docs.set_current_section(Some("intro".into())).await.unwrap();
        assert_eq!(docs.current_content().await.unwrap(), "# Welcome");
        docs.set_current_section(Some("missing".into())).await.unwrap();
        assert_eq!(docs.current_content().await.unwrap(), "");
    }

    #[tokio::test]
    async fn editing_toggles_and_persists() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let docs = DocsStore::new(kv.clone());
        assert!(docs.toggle_editing().await.unwrap());
        let reopened = DocsStore::new(kv);
        assert!(reopened.state().await.unwrap().is_editing);
        assert!(!reopened.toggle_editing().await.unwrap());
    }
}
