//! HSI Config Service (component E): CRUD over versioned HSI records with
//! cross-record invariants, subscriber-count caps, and resource-version
//! monotonicity.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gwctl_store::{GetPrefixOptions, PutOptions, StoreAdapter};
use serde::{Deserialize, Serialize};

use crate::error::HsiError;
use crate::subscriber_count::SubscriberCountRegistry;

const STORE_DEADLINE: Duration = Duration::from_secs(5);

fn prefix(node_id: &str) -> String {
    format!("configs/{node_id}/hsi/")
}

fn key(node_id: &str, user_id: &str) -> String {
    format!("configs/{node_id}/hsi/{user_id}")
}

/// The submitted fields of an HSI record, exactly as the wire contract
/// carries them (the `config` section of [`HsiRecord`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HsiConfig {
    pub user_id: String,
    pub vlan_id: String,
    pub account: String,
    pub password: String,
    pub pool_start: String,
    pub pool_end: String,
    pub dhcp_subnet: String,
    pub dhcp_gateway: String,
}

impl HsiConfig {
    /// The eight content fields validated non-empty before anything else
    /// (spec §4.E step 2).
    fn empty_field(&self) -> Option<&'static str> {
        if self.user_id.is_empty() {
            return Some("user_id");
        }
        if self.vlan_id.is_empty() {
            return Some("vlan_id");
        }
        if self.account.is_empty() {
            return Some("account");
        }
        if self.password.is_empty() {
            return Some("password");
        }
        if self.pool_start.is_empty() {
            return Some("pool_start");
        }
        if self.pool_end.is_empty() {
            return Some("pool_end");
        }
        if self.dhcp_subnet.is_empty() {
            return Some("dhcp_subnet");
        }
        if self.dhcp_gateway.is_empty() {
            return Some("dhcp_gateway");
        }
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HsiMetadata {
    pub node: String,
    pub resource_version: String,
    pub updated_by: String,
    pub updated_at: String,
    pub enable_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HsiRecord {
    pub config: HsiConfig,
    pub metadata: HsiMetadata,
}

pub struct HsiService<S: StoreAdapter> {
    store: Arc<S>,
    subscriber_counts: Arc<SubscriberCountRegistry<S>>,
}

impl<S: StoreAdapter> HsiService<S> {
    pub fn new(store: Arc<S>, subscriber_counts: Arc<SubscriberCountRegistry<S>>) -> Self {
        Self { store, subscriber_counts }
    }

    /// Validations run in the exact order spec §4.E lists them; the first
    /// failure terminates the request.
    async fn validate(&self, node_id: &str, user_id: &str, config: &HsiConfig) -> Result<(), HsiError> {
        if node_id.is_empty() || user_id.is_empty() {
            return Err(HsiError::Malformed { reason: "nodeId and userId are required".to_string() });
        }
        if let Some(field) = config.empty_field() {
            return Err(HsiError::EmptyField { field: field.to_string() });
        }

        if let Some(count) = self.subscriber_counts.get_count(node_id).await? {
            if let Ok(uid) = user_id.parse::<i64>() {
                if uid > count {
                    return Err(HsiError::UserIdExceeds { user_id: user_id.to_string(), count });
                }
            }
        }

        let existing = self.store.get_prefix(&prefix(node_id), GetPrefixOptions::default(), STORE_DEADLINE).await?;
        for kv in existing {
            let Ok(record) = serde_json::from_slice::<HsiRecord>(&kv.value) else { continue };
            if record.config.vlan_id == config.vlan_id && record.config.user_id != user_id {
                return Err(HsiError::VlanConflict {
                    vlan_id: config.vlan_id.clone(),
                    user_id: record.config.user_id,
                });
            }
        }
        Ok(())
    }

    /// Computes the next resource-version per the read-modify-write rule:
    /// "1" on first write, else `prior + 1`, or "2" if the prior version
    /// does not parse. Not atomic with the write itself (design note 9).
    fn next_version(prior: Option<&HsiRecord>) -> String {
        match prior {
            None => "1".to_string(),
            Some(record) => match record.metadata.resource_version.parse::<i64>() {
                Ok(v) => (v + 1).to_string(),
                Err(_) => "2".to_string(),
            },
        }
    }

    pub async fn create_or_update(
        &self,
        node_id: &str,
        user_id: &str,
        config: HsiConfig,
        updated_by: &str,
    ) -> Result<HsiRecord, HsiError> {
        self.validate(node_id, user_id, &config).await?;

        let key = key(node_id, user_id);
        let prior_raw = self.store.get(&key, STORE_DEADLINE).await?;
        let prior: Option<HsiRecord> = prior_raw.as_deref().and_then(|raw| serde_json::from_slice(raw).ok());

        let enable_status = match &prior {
            Some(record) => record.metadata.enable_status.clone(),
            None => "disabled".to_string(),
        };
        let record = HsiRecord {
            config,
            metadata: HsiMetadata {
                node: node_id.to_string(),
                resource_version: Self::next_version(prior.as_ref()),
                updated_by: updated_by.to_string(),
                updated_at: Utc::now().to_rfc3339(),
                enable_status,
            },
        };
        let value = serde_json::to_vec(&record).map_err(|e| HsiError::Malformed { reason: e.to_string() })?;
        self.store.put(&key, &value, PutOptions::default(), STORE_DEADLINE).await?;
        Ok(record)
    }

    pub async fn get(&self, node_id: &str, user_id: &str) -> Result<HsiRecord, HsiError> {
        let raw = self.store.get(&key(node_id, user_id), STORE_DEADLINE).await?.ok_or_else(|| HsiError::NotFound {
            node_id: node_id.to_string(),
            user_id: user_id.to_string(),
        })?;
        serde_json::from_slice(&raw).map_err(|e| HsiError::Malformed { reason: e.to_string() })
    }

    /// User-ids under `configs/{nodeId}/hsi/`, filtered by the subscriber
    /// cap when one is set. Non-integer user-ids are always kept.
    pub async fn list_user_ids(&self, node_id: &str) -> Result<Vec<String>, HsiError> {
        let kvs = self.store.get_prefix(&prefix(node_id), GetPrefixOptions::default(), STORE_DEADLINE).await?;
        let cap = self.subscriber_counts.get_count(node_id).await?;
        let p = prefix(node_id);
        let mut ids = Vec::new();
        for kv in kvs {
            let Some(user_id) = kv.key.strip_prefix(&p) else { continue };
            match (cap, user_id.parse::<i64>()) {
                (Some(count), Ok(uid)) if uid > count => continue,
                _ => ids.push(user_id.to_string()),
            }
        }
        Ok(ids)
    }

    pub async fn delete(&self, node_id: &str, user_id: &str) -> Result<(), HsiError> {
        self.store.delete(&key(node_id, user_id), STORE_DEADLINE).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gwctl_store::MemoryStore;

    fn config(user_id: &str, vlan_id: &str) -> HsiConfig {
        HsiConfig {
            user_id: user_id.to_string(),
            vlan_id: vlan_id.to_string(),
            account: "a".to_string(),
            password: "p".to_string(),
            pool_start: "10.0.0.10".to_string(),
            pool_end: "10.0.0.20".to_string(),
            dhcp_subnet: "255.255.255.0".to_string(),
            dhcp_gateway: "10.0.0.1".to_string(),
        }
    }

    fn service() -> HsiService<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let counts = Arc::new(SubscriberCountRegistry::new(Arc::clone(&store)));
        HsiService::new(store, counts)
    }

    #[tokio::test]
    async fn create_sets_version_one_and_disabled() {
        let hsi = service();
        let record = hsi.create_or_update("n1", "1", config("1", "100"), "admin").await.unwrap();
        assert_eq!(record.metadata.resource_version, "1");
        assert_eq!(record.metadata.enable_status, "disabled");
    }

    #[tokio::test]
    async fn update_preserves_enable_status_and_bumps_version() {
        let hsi = service();
        hsi.create_or_update("n1", "1", config("1", "100"), "admin").await.unwrap();
        let updated = hsi.create_or_update("n1", "1", config("1", "101"), "admin").await.unwrap();
        assert_eq!(updated.metadata.resource_version, "2");
        assert_eq!(updated.metadata.enable_status, "disabled");
    }

    #[tokio::test]
    async fn vlan_conflict_names_offending_user() {
        let hsi = service();
        hsi.create_or_update("n1", "1", config("1", "100"), "admin").await.unwrap();
        let err = hsi.create_or_update("n1", "2", config("2", "100"), "admin").await.unwrap_err();
        match err {
            HsiError::VlanConflict { user_id, .. } => assert_eq!(user_id, "1"),
            other => panic!("expected VlanConflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn same_user_same_vlan_is_not_a_conflict() {
        let hsi = service();
        hsi.create_or_update("n1", "1", config("1", "100"), "admin").await.unwrap();
        hsi.create_or_update("n1", "1", config("1", "100"), "admin").await.unwrap();
    }

    #[tokio::test]
    async fn empty_field_rejected() {
        let hsi = service();
        let mut cfg = config("1", "100");
        cfg.account = String::new();
        let err = hsi.create_or_update("n1", "1", cfg, "admin").await.unwrap_err();
        assert!(matches!(err, HsiError::EmptyField { field } if field == "account"));
    }

    #[tokio::test]
    async fn user_id_exceeding_cap_rejected() {
        let hsi = service();
        hsi.subscriber_counts.put("n1", 5, "admin").await.unwrap();
        let err = hsi.create_or_update("n1", "7", config("7", "100"), "admin").await.unwrap_err();
        assert!(matches!(err, HsiError::UserIdExceeds { count: 5, .. }));
    }

    #[tokio::test]
    async fn list_user_ids_filters_by_cap() {
        let hsi = service();
        hsi.subscriber_counts.put("n1", 5, "admin").await.unwrap();
        hsi.create_or_update("n1", "3", config("3", "100"), "admin").await.unwrap();
        let ids = hsi.list_user_ids("n1").await.unwrap();
        assert_eq!(ids, vec!["3".to_string()]);
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let hsi = service();
        hsi.create_or_update("n1", "1", config("1", "100"), "admin").await.unwrap();
        hsi.delete("n1", "1").await.unwrap();
        let err = hsi.get("n1", "1").await.unwrap_err();
        assert!(matches!(err, HsiError::NotFound { .. }));
    }
}
