use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::storage::{load_json, save_json, KvStore, BLOB_VERSION, METRICS_KEY};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MetricCategory {
    Documentation,
    Explorer,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    FirstView,
    Completion,
    Engagement,
}

#[derive(Debug, Clone, Serialize)]
pub struct Metric {
    pub id: &'static str,
    pub xp: u32,
    pub category: MetricCategory,
    pub kind: MetricKind,
}

pub const METRICS: &[Metric] = &[
    Metric {
        id: "docs-started",
        xp: 50,
        category: MetricCategory::Documentation,
        kind: MetricKind::FirstView,
    },
    Metric {
        id: "docs-completed",
        xp: 100,
        category: MetricCategory::Documentation,
        kind: MetricKind::Completion,
    },
    Metric {
        id: "quiz-attempt",
        xp: 25,
        category: MetricCategory::Documentation,
        kind: MetricKind::Engagement,
    },
    Metric {
        id: "quiz-completed",
        xp: 75,
        category: MetricCategory::Documentation,
        kind: MetricKind::Completion,
    },
    Metric {
        id: "space-setup",
        xp: 150,
        category: MetricCategory::Explorer,
        kind: MetricKind::Completion,
    },
    Metric {
        id: "network-connect",
        xp: 100,
        category: MetricCategory::Explorer,
        kind: MetricKind::Engagement,
    },
    Metric {
        id: "feature-discovery",
        xp: 50,
        category: MetricCategory::Explorer,
        kind: MetricKind::Engagement,
    },
];

pub fn find_metric(id: &str, category: MetricCategory) -> Option<&'static Metric> {
    METRICS.iter().find(|m| m.id == id && m.category == category)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricEntry {
    pub metric_id: String,
    pub category: MetricCategory,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct MetricsBlob {
    version: u32,
    entries: Vec<MetricEntry>,
}

/// Tracks XP-granting events and keeps an append-only log of them.
pub struct MetricService {
    store: Arc<dyn KvStore>,
    write_lock: Mutex<()>,
}

impl MetricService {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the XP the metric is worth, 0 when unknown. Logging the event
    /// is best-effort.
    pub async fn track_metric(
        &self,
        metric_id: &str,
        category: MetricCategory,
        data: serde_json::Value,
    ) -> u32 {
        let Some(metric) = find_metric(metric_id, category) else {
            debug!(metric_id, ?category, "unknown metric");
            return 0;
        };

        let entry = MetricEntry {
            metric_id: metric_id.to_string(),
            category,
            timestamp: OffsetDateTime::now_utc(),
            data,
        };
        if let Err(e) = self.append(entry).await {
            error!(error = %e, metric_id, "storing metric failed");
        }
        metric.xp
    }

    async fn append(&self, entry: MetricEntry) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut blob = load_json::<MetricsBlob>(self.store.as_ref(), METRICS_KEY)
            .await?
            .unwrap_or(MetricsBlob {
                version: BLOB_VERSION,
                entries: Vec::new(),
            });
        blob.entries.push(entry);
        save_json(self.store.as_ref(), METRICS_KEY, &blob).await
    }

    /// Every tracked event so far. Unreadable logs read as empty.
    pub async fn summary(&self) -> Vec<MetricEntry> {
        match load_json::<MetricsBlob>(self.store.as_ref(), METRICS_KEY).await {
            Ok(Some(blob)) => blob.entries,
            Ok(None) => Vec::new(),
            Err(e) => {
                error!(error = %e, "reading metrics failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn service() -> MetricService {
        MetricService::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn known_metric_returns_xp_and_is_logged() {
        let svc = service();
        let xp = svc
            .track_metric(
                "docs-completed",
                MetricCategory::Documentation,
                serde_json::json!({"section": "intro"}),
            )
            .await;
        assert_eq!(xp, 100);
        let log = svc.summary().await;
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].metric_id, "docs-completed");
        assert_eq!(log[0].data["section"], "intro");
    }

    #[tokio::test]
    async fn unknown_metric_or_wrong_category_is_zero() {
        let svc = service();
        let null = serde_json::Value::Null;
        assert_eq!(
            svc.track_metric("nope", MetricCategory::Explorer, null.clone())
                .await,
            0
        );
        assert_eq!(
            svc.track_metric("space-setup", MetricCategory::Documentation, null)
                .await,
            0
        );
        assert!(svc.summary().await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_log_still_grants_xp() {
        let store = Arc::new(MemoryStore::new());
        store.set(METRICS_KEY, "garbage".into()).await.unwrap();
        let svc = MetricService::new(store);
        let xp = svc
            .track_metric("network-connect", MetricCategory::Explorer, serde_json::Value::Null)
            .await;
        assert_eq!(xp, 100);
        assert!(svc.summary().await.is_empty());
    }
}
