//! Node Registry (component C): register/heartbeat/unregister and the
//! stale-node sweeper.
//!
//! The registry and the [`monitor`](crate::monitor) supervisor hold opaque
//! capability handles to each other (design note 9): rather than the
//! registry depending on the concrete `MonitorSupervisor`, it depends on the
//! [`MonitorController`] trait, which the supervisor implements and the
//! caller injects at construction.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use gwctl_store::{GetPrefixOptions, PutOptions, StoreAdapter};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::RegistryError;

const NODE_PREFIX: &str = "nodes/";
const STORE_DEADLINE: Duration = Duration::from_secs(5);
const SWEEPER_READ_DEADLINE: Duration = Duration::from_secs(10);

/// Wall-clock cadence of the stale-node sweeper.
pub const CHECK_INTERVAL: Duration = Duration::from_secs(30);
/// A node is stale once `last_seen_at` is older than this.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Active,
    /// Prepared but never produced by this implementation — the sweeper
    /// deletes stale nodes outright rather than marking them inactive
    /// (design note 9.iii).
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub uuid: String,
    pub ip: String,
    pub version: String,
    pub registered_at: i64,
    pub last_seen_at: i64,
    pub status: NodeStatus,
}

/// Capability the registry uses to start/stop the monitor for a node,
/// implemented by the monitor supervisor.
#[async_trait]
pub trait MonitorController: Send + Sync + 'static {
    async fn start(&self, uuid: &str, ip: &str);
    async fn stop(&self, uuid: &str);
}

pub struct NodeRegistry<S: StoreAdapter> {
    store: Arc<S>,
    monitor: Arc<dyn MonitorController>,
}

impl<S: StoreAdapter> NodeRegistry<S> {
    pub fn new(store: Arc<S>, monitor: Arc<dyn MonitorController>) -> Self {
        Self { store, monitor }
    }

    /// Idempotent overwrite. Notifies the monitor supervisor only after the
    /// record is durably written, and before returning to the caller —
    /// register always precedes its corresponding monitor-start.
    pub async fn register(&self, uuid: &str, ip: &str, version: &str) -> Result<(), RegistryError> {
        if uuid.is_empty() {
            return Err(RegistryError::Malformed { reason: "uuid is required".to_string() });
        }
        let now = Utc::now().timestamp();
        let record = NodeRecord {
            uuid: uuid.to_string(),
            ip: ip.to_string(),
            version: version.to_string(),
            registered_at: now,
            last_seen_at: now,
            status: NodeStatus::Active,
        };
        let key = format!("{NODE_PREFIX}{uuid}");
        let value = serde_json::to_vec(&record).map_err(|e| RegistryError::Malformed { reason: e.to_string() })?;
        self.store.put(&key, &value, PutOptions::default(), STORE_DEADLINE).await?;
        self.monitor.start(uuid, ip).await;
        info!(node_uuid = uuid, ip, "node registered");
        Ok(())
    }

    /// Requires the node to currently exist. Stops the monitor before
    /// deleting the key so that the key-delete and monitor-stop are never
    /// observed out of order by a concurrent reader.
    pub async fn unregister(&self, uuid: &str) -> Result<(), RegistryError> {
        let key = format!("{NODE_PREFIX}{uuid}");
        if self.store.get(&key, STORE_DEADLINE).await?.is_none() {
            return Err(RegistryError::NotRegistered { uuid: uuid.to_string() });
        }
        self.monitor.stop(uuid).await;
        self.store.delete(&key, STORE_DEADLINE).await?;
        info!(node_uuid = uuid, "node unregistered");
        Ok(())
    }

    /// Requires an existing record; merges in the new liveness fields.
    /// Unknown uuid fails rather than auto-creating a record.
    pub async fn heartbeat(&self, uuid: &str, node_ip: &str, uptime_seconds: u64) -> Result<(), RegistryError> {
        let key = format!("{NODE_PREFIX}{uuid}");
        let raw = self.store.get(&key, STORE_DEADLINE).await?.ok_or_else(|| RegistryError::NotRegistered {
            uuid: uuid.to_string(),
        })?;
        let mut record: NodeRecord =
            serde_json::from_slice(&raw).map_err(|e| RegistryError::Malformed { reason: e.to_string() })?;
        record.last_seen_at = Utc::now().timestamp();
        record.ip = node_ip.to_string();
        record.status = NodeStatus::Active;
        let _ = uptime_seconds; // carried through telemetry, not persisted on the record itself

        let value = serde_json::to_vec(&record).map_err(|e| RegistryError::Malformed { reason: e.to_string() })?;
        self.store.put(&key, &value, PutOptions::default(), STORE_DEADLINE).await?;
        Ok(())
    }

    /// Raw key+value pairs under `nodes/`, as the REST listing exposes them.
    pub async fn list(&self) -> Result<Vec<gwctl_store::KeyValue>, RegistryError> {
        let kvs = self.store.get_prefix(NODE_PREFIX, GetPrefixOptions::default(), STORE_DEADLINE).await?;
        Ok(kvs)
    }

    /// One sweep over every `nodes/*` record: stop monitoring and delete
    /// any whose `last_seen_at` predates `HEARTBEAT_TIMEOUT`. Records whose
    /// `last_seen_at` fails to parse are skipped and logged, not deleted.
    async fn sweep_once(&self) {
        let kvs = match self.store.get_prefix(NODE_PREFIX, GetPrefixOptions::default(), SWEEPER_READ_DEADLINE).await
        {
            Ok(kvs) => kvs,
            Err(e) => {
                warn!(error = %e, "stale sweeper range read failed");
                return;
            }
        };

        let now = Utc::now().timestamp();
        let cutoff = now - HEARTBEAT_TIMEOUT.as_secs() as i64;

        for kv in kvs {
            let record: NodeRecord = match serde_json::from_slice(&kv.value) {
                Ok(r) => r,
                Err(e) => {
                    warn!(key = %kv.key, error = %e, "skipping unparsable node record in sweep");
                    continue;
                }
            };
            if record.last_seen_at >= cutoff {
                continue;
            }
            self.monitor.stop(&record.uuid).await;
            if let Err(e) = self.store.delete(&kv.key, STORE_DEADLINE).await {
                warn!(node_uuid = %record.uuid, error = %e, "failed to delete stale node record");
                continue;
            }
            info!(node_uuid = %record.uuid, "stale node swept");
        }
    }

    /// Run the sweeper loop until `shutdown` fires. Intended to be spawned
    /// as one long-lived task per process.
    pub async fn run_sweeper(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(CHECK_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.sweep_once().await,
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("stale sweeper shutting down");
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gwctl_store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingController {
        starts: AtomicUsize,
        stops: AtomicUsize,
    }

    impl CountingController {
        fn new() -> Arc<Self> {
            Arc::new(Self { starts: AtomicUsize::new(0), stops: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl MonitorController for CountingController {
        async fn start(&self, _uuid: &str, _ip: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
        async fn stop(&self, _uuid: &str) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn registry() -> (NodeRegistry<MemoryStore>, Arc<CountingController>) {
        let controller = CountingController::new();
        let registry = NodeRegistry::new(Arc::new(MemoryStore::new()), controller.clone());
        (registry, controller)
    }

    #[tokio::test]
    async fn register_starts_monitor() {
        let (registry, controller) = registry();
        registry.register("n1", "10.0.0.5", "1.0").await.unwrap();
        assert_eq!(controller.starts.load(Ordering::SeqCst), 1);
        assert_eq!(registry.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn heartbeat_on_unknown_node_fails() {
        let (registry, _controller) = registry();
        let err = registry.heartbeat("ghost", "10.0.0.1", 10).await.unwrap_err();
        assert!(matches!(err, RegistryError::NotRegistered { .. }));
    }

    #[tokio::test]
    async fn heartbeat_updates_last_seen() {
        let (registry, _controller) = registry();
        registry.register("n1", "10.0.0.5", "1.0").await.unwrap();
        registry.heartbeat("n1", "10.0.0.5", 10).await.unwrap();
        let kvs = registry.list().await.unwrap();
        let record: NodeRecord = serde_json::from_slice(&kvs[0].value).unwrap();
        assert_eq!(record.status, NodeStatus::Active);
    }

    #[tokio::test]
    async fn unregister_missing_node_fails() {
        let (registry, _controller) = registry();
        let err = registry.unregister("ghost").await.unwrap_err();
        assert!(matches!(err, RegistryError::NotRegistered { .. }));
    }

    #[tokio::test]
    async fn unregister_stops_before_delete() {
        let (registry, controller) = registry();
        registry.register("n1", "10.0.0.5", "1.0").await.unwrap();
        registry.unregister("n1").await.unwrap();
        assert_eq!(controller.stops.load(Ordering::SeqCst), 1);
        assert!(registry.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sweep_removes_stale_node() {
        let (registry, controller) = registry();
        let key = format!("{NODE_PREFIX}n1");
        let stale = NodeRecord {
            uuid: "n1".to_string(),
            ip: "10.0.0.5".to_string(),
            version: "1.0".to_string(),
            registered_at: 0,
            last_seen_at: 0,
            status: NodeStatus::Active,
        };
        registry
            .store
            .put(&key, &serde_json::to_vec(&stale).unwrap(), PutOptions::default(), STORE_DEADLINE)
            .await
            .unwrap();
        registry.sweep_once().await;
        assert!(registry.list().await.unwrap().is_empty());
        assert_eq!(controller.stops.load(Ordering::SeqCst), 1);
    }
}
