//! Subscriber-Count Registry (component I): per-node integer cap consulted
//! by HSI validation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gwctl_store::{PutOptions, StoreAdapter};
use serde::{Deserialize, Serialize};

use crate::error::SubscriberCountError;

const STORE_DEADLINE: Duration = Duration::from_secs(5);

fn key(node_id: &str) -> String {
    format!("user_counts/{node_id}/")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub node: String,
    pub resource_version: String,
    pub updated_by: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriberCountRecord {
    pub count: i64,
    pub metadata: RecordMetadata,
}

pub struct SubscriberCountRegistry<S: StoreAdapter> {
    store: Arc<S>,
}

impl<S: StoreAdapter> SubscriberCountRegistry<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn get(&self, node_id: &str) -> Result<SubscriberCountRecord, SubscriberCountError> {
        let raw = self
            .store
            .get(&key(node_id), STORE_DEADLINE)
            .await?
            .ok_or_else(|| SubscriberCountError::NotFound { node_id: node_id.to_string() })?;
        serde_json::from_slice(&raw)
            .map_err(|_| SubscriberCountError::NotFound { node_id: node_id.to_string() })
    }

    /// Returns the bare integer if a cap is set, without surfacing metadata.
    /// Used internally by HSI validation, which only cares about the bound.
    pub async fn get_count(&self, node_id: &str) -> Result<Option<i64>, SubscriberCountError> {
        match self.get(node_id).await {
            Ok(record) => Ok(Some(record.count)),
            Err(SubscriberCountError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Upsert the cap. Resource-version follows the same read-modify-write
    /// rule HSI records use (design note 9): prior version parsed as an
    /// integer and incremented, or "1" on first write, "2" if unparsable.
    pub async fn put(&self, node_id: &str, count: i64, updated_by: &str) -> Result<(), SubscriberCountError> {
        if count < 0 {
            return Err(SubscriberCountError::Negative { value: count });
        }
        let key = key(node_id);
        let next_version = match self.store.get(&key, STORE_DEADLINE).await? {
            None => "1".to_string(),
            Some(raw) => match serde_json::from_slice::<SubscriberCountRecord>(&raw) {
                Ok(prior) => match prior.metadata.resource_version.parse::<i64>() {
                    Ok(v) => (v + 1).to_string(),
                    Err(_) => "2".to_string(),
                },
                Err(_) => "2".to_string(),
            },
        };
        let record = SubscriberCountRecord {
            count,
            metadata: RecordMetadata {
                node: node_id.to_string(),
                resource_version: next_version,
                updated_by: updated_by.to_string(),
                updated_at: Utc::now().to_rfc3339(),
            },
        };
        let value = serde_json::to_vec(&record).map_err(|e| {
            tracing::error!(error = %e, "failed to serialize subscriber count record");
            SubscriberCountError::Negative { value: count }
        })?;
        self.store.put(&key, &value, PutOptions::default(), STORE_DEADLINE).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gwctl_store::MemoryStore;

    fn registry() -> SubscriberCountRegistry<MemoryStore> {
        SubscriberCountRegistry::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn get_missing_fails() {
        let r = registry();
        let err = r.get("n1").await.unwrap_err();
        assert!(matches!(err, SubscriberCountError::NotFound { .. }));
    }

    #[tokio::test]
    async fn put_then_get_roundtrip() {
        let r = registry();
        r.put("n1", 5, "admin").await.unwrap();
        let record = r.get("n1").await.unwrap();
        assert_eq!(record.count, 5);
        assert_eq!(record.metadata.resource_version, "1");
    }

    #[tokio::test]
    async fn negative_count_rejected() {
        let r = registry();
        let err = r.put("n1", -1, "admin").await.unwrap_err();
        assert!(matches!(err, SubscriberCountError::Negative { value: -1 }));
    }

    #[tokio::test]
    async fn second_put_bumps_version() {
        let r = registry();
        r.put("n1", 5, "admin").await.unwrap();
        r.put("n1", 6, "admin").await.unwrap();
        let record = r.get("n1").await.unwrap();
        assert_eq!(record.metadata.resource_version, "2");
    }
}
