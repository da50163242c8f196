//! Failed-Event Pipeline (component G): watch-driven ingestion of failure
//! reports nodes write into a shared keyspace, promoted into a time-bounded
//! history and exposed to API readers.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use gwctl_store::{GetPrefixOptions, PutOptions, SortOrder, StoreAdapter};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::FailedEventError;

const SOURCE_PREFIX: &str = "failed_events/";
const HISTORY_PREFIX: &str = "failed_events_history/";
const STORE_DEADLINE: Duration = Duration::from_secs(5);
/// Failed-event history entries expire after 7 days (spec §5).
const HISTORY_TTL_SECONDS: i64 = 604_800;

/// A failed-event record, kept as an opaque JSON value since the node side
/// owns the exact shape (spec §3: "format defined by the node side").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedEvent {
    pub key: String,
    pub value: Value,
}

pub struct FailedEventPipeline<S: StoreAdapter> {
    store: Arc<S>,
}

impl<S: StoreAdapter> FailedEventPipeline<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Processes a single raw event: parse, grant a 7-day lease, write into
    /// history. Parse failures are logged and skipped, never propagated.
    async fn ingest_one(&self, node_id: &str, raw_value: &[u8]) {
        let parsed: Value = match serde_json::from_slice(raw_value) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "failed-event value did not parse as JSON, skipping");
                return;
            }
        };

        let timestamp = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let key = format!("{HISTORY_PREFIX}{node_id}/{timestamp}");

        let lease_id = match self.store.grant_lease(HISTORY_TTL_SECONDS, STORE_DEADLINE).await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "failed to grant history lease, dropping event");
                return;
            }
        };
        if let Err(e) = self
            .store
            .put(&key, raw_value, PutOptions { lease_id: Some(lease_id) }, STORE_DEADLINE)
            .await
        {
            warn!(error = %e, "failed to write failed-event history entry");
            return;
        }
        let _ = parsed;
        info!(node_id, key, "failed event promoted to history");
    }

    /// Extracts the node id a source key was written under:
    /// `failed_events/{nodeId}/...` or `failed_events/{nodeId}`. Falls back
    /// to `"unknown"` for a key shape the node side doesn't document.
    fn node_id_from_source_key(key: &str) -> String {
        key.strip_prefix(SOURCE_PREFIX)
            .and_then(|rest| rest.split('/').next())
            .filter(|s| !s.is_empty())
            .unwrap_or("unknown")
            .to_string()
    }

    /// Runs until the watch stream ends or `shutdown` fires. A broken watch
    /// stream is surfaced as a warning and the task returns — the process
    /// supervisor (§5) is expected to restart it.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut stream = match self.store.watch_prefix(SOURCE_PREFIX).await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "failed-event pipeline could not open watch");
                return;
            }
        };

        loop {
            tokio::select! {
                next = stream.next() => {
                    match next {
                        Some(Ok(event)) => {
                            let node_id = Self::node_id_from_source_key(&event.key);
                            self.ingest_one(&node_id, &event.value).await;
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "failed-event watch channel broke, pipeline exiting");
                            return;
                        }
                        None => {
                            warn!("failed-event watch stream ended, pipeline exiting");
                            return;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("failed-event pipeline shutting down");
                        return;
                    }
                }
            }
        }
    }

    /// History in descending key order (newest first), optionally scoped
    /// to one node and filtered by exact `event_type` match.
    pub async fn read_history(
        &self,
        node_id: Option<&str>,
        event_type: Option<&str>,
    ) -> Result<Vec<FailedEvent>, FailedEventError> {
        let prefix = match node_id {
            Some(id) => format!("{HISTORY_PREFIX}{id}/"),
            None => HISTORY_PREFIX.to_string(),
        };
        let opts = GetPrefixOptions { order: SortOrder::Descend, limit: None };
        let kvs = self.store.get_prefix(&prefix, opts, STORE_DEADLINE).await?;

        let mut out = Vec::new();
        for kv in kvs {
            let Ok(value) = serde_json::from_slice::<Value>(&kv.value) else { continue };
            if let Some(wanted) = event_type {
                let matches = value.get("event_type").and_then(Value::as_str) == Some(wanted);
                if !matches {
                    continue;
                }
            }
            out.push(FailedEvent { key: kv.key, value });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gwctl_store::{MemoryStore, PutOptions};

    #[tokio::test]
    async fn ingest_promotes_parsed_event_to_history() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = FailedEventPipeline::new(Arc::clone(&store));
        let raw = br#"{"event_type":"pppoe_dial","node_id":"n1","user_id":"1"}"#;
        pipeline.ingest_one("n1", raw).await;

        let history = pipeline.read_history(Some("n1"), None).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn ingest_skips_unparsable_value() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = FailedEventPipeline::new(Arc::clone(&store));
        pipeline.ingest_one("n1", b"not json").await;
        let history = pipeline.read_history(Some("n1"), None).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn read_history_filters_by_event_type() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = FailedEventPipeline::new(Arc::clone(&store));
        pipeline
            .ingest_one("n1", br#"{"event_type":"pppoe_dial","node_id":"n1"}"#)
            .await;
        pipeline
            .ingest_one("n1", br#"{"event_type":"dhcp_lease","node_id":"n1"}"#)
            .await;
        let history = pipeline.read_history(Some("n1"), Some("dhcp_lease")).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn watch_driven_ingestion_round_trips() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = Arc::new(FailedEventPipeline::new(Arc::clone(&store)));
        let (tx, rx) = watch::channel(false);

        let task_pipeline = Arc::clone(&pipeline);
        let handle = tokio::spawn(async move { task_pipeline.run(rx).await });

        // Give the watch a moment to establish before the write lands.
        tokio::time::sleep(Duration::from_millis(20)).await;
        store
            .put(
                "failed_events/n1",
                br#"{"event_type":"pppoe_dial","node_id":"n1","user_id":"1"}"#,
                PutOptions::default(),
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let history = pipeline.read_history(Some("n1"), Some("pppoe_dial")).await.unwrap();
        assert_eq!(history.len(), 1);

        let _ = tx.send(true);
        let _ = handle.await;
    }
}
