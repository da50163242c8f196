//! In-memory store adapter for tests and local development.
//!
//! Backed by a `BTreeMap` behind a `RwLock`, with a `broadcast` channel
//! fanning out PUT/DELETE events to watchers and a background reaper task
//! that expires leases. Not persistent — all data is lost when the process
//! exits.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{broadcast, RwLock};
use tokio::time::Instant;
use tracing::warn;

use crate::{
    GetPrefixOptions, KeyValue, PutOptions, SortOrder, StoreAdapter, StoreError, WatchEvent,
    WatchEventKind, WatchStream,
};

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const LEASE_REAPER_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug)]
struct LeaseEntry {
    expires_at: Instant,
    keys: HashSet<String>,
}

struct Inner {
    data: RwLock<BTreeMap<String, Vec<u8>>>,
    leases: RwLock<HashMap<i64, LeaseEntry>>,
    next_lease_id: AtomicI64,
    events: broadcast::Sender<WatchEvent>,
}

/// An in-memory [`StoreAdapter`], safe to share and clone across tasks.
///
/// # Examples
///
/// ```
/// # use gwctl_store::{MemoryStore, StoreAdapter, PutOptions};
/// # use std::time::Duration;
/// # #[tokio::main]
/// # async fn main() {
/// let store = MemoryStore::new();
/// store.put("nodes/n1", b"{}", PutOptions::default(), Duration::from_secs(1)).await.unwrap();
/// let v = store.get("nodes/n1", Duration::from_secs(1)).await.unwrap();
/// assert_eq!(v, Some(b"{}".to_vec()));
/// # }
/// ```
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store and spawn its lease reaper.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let inner = Arc::new(Inner {
            data: RwLock::new(BTreeMap::new()),
            leases: RwLock::new(HashMap::new()),
            next_lease_id: AtomicI64::new(1),
            events,
        });

        let reaper_inner = Arc::clone(&inner);
        tokio::spawn(async move {
            reap_expired_leases(reaper_inner).await;
        });

        Self { inner }
    }

    fn publish(&self, event: WatchEvent) {
        // No receivers is the common case in tests; ignore the send error.
        let _ = self.inner.events.send(event);
    }
}

async fn reap_expired_leases(inner: Arc<Inner>) {
    let mut interval = tokio::time::interval(LEASE_REAPER_INTERVAL);
    loop {
        interval.tick().await;
        let now = Instant::now();
        let expired: Vec<(i64, HashSet<String>)> = {
            let leases = inner.leases.read().await;
            leases
                .iter()
                .filter(|(_, entry)| entry.expires_at <= now)
                .map(|(id, entry)| (*id, entry.keys.clone()))
                .collect()
        };
        if expired.is_empty() {
            continue;
        }
        for (lease_id, keys) in expired {
            let mut data = inner.data.write().await;
            for key in &keys {
                if data.remove(key).is_some() {
                    let _ = inner.events.send(WatchEvent {
                        kind: WatchEventKind::Delete,
                        key: key.clone(),
                        value: Vec::new(),
                    });
                }
            }
            drop(data);
            inner.leases.write().await.remove(&lease_id);
        }
    }
}

#[async_trait::async_trait]
impl StoreAdapter for MemoryStore {
    async fn get(&self, key: &str, _deadline: Duration) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.inner.data.read().await.get(key).cloned())
    }

    async fn get_prefix(
        &self,
        prefix: &str,
        opts: GetPrefixOptions,
        _deadline: Duration,
    ) -> Result<Vec<KeyValue>, StoreError> {
        let data = self.inner.data.read().await;
        let mut out: Vec<KeyValue> = data
            .range(prefix.to_owned()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| KeyValue {
                key: k.clone(),
                value: v.clone(),
            })
            .collect();
        if opts.order == SortOrder::Descend {
            out.reverse();
        }
        if let Some(limit) = opts.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn put(
        &self,
        key: &str,
        value: &[u8],
        opts: PutOptions,
        _deadline: Duration,
    ) -> Result<(), StoreError> {
        if let Some(lease_id) = opts.lease_id {
            let mut leases = self.inner.leases.write().await;
            let entry = leases
                .get_mut(&lease_id)
                .ok_or(StoreError::UnknownLease(lease_id))?;
            entry.keys.insert(key.to_owned());
        }

        self.inner
            .data
            .write()
            .await
            .insert(key.to_owned(), value.to_vec());

        self.publish(WatchEvent {
            kind: WatchEventKind::Put,
            key: key.to_owned(),
            value: value.to_vec(),
        });
        Ok(())
    }

    async fn delete(&self, key: &str, _deadline: Duration) -> Result<(), StoreError> {
        let removed = self.inner.data.write().await.remove(key).is_some();
        if removed {
            self.publish(WatchEvent {
                kind: WatchEventKind::Delete,
                key: key.to_owned(),
                value: Vec::new(),
            });
        }
        Ok(())
    }

    async fn watch_prefix(&self, prefix: &str) -> Result<WatchStream, StoreError> {
        let rx = self.inner.events.subscribe();
        let prefix = prefix.to_owned();
        let stream = tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(move |item| {
            let prefix = prefix.clone();
            async move {
                match item {
                    Ok(event) if event.key.starts_with(&prefix) => Some(Ok(event)),
                    Ok(_) => None,
                    Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(n)) => {
                        warn!(skipped = n, "memory store watcher lagged, dropping events");
                        None
                    }
                }
            }
        });
        Ok(Box::pin(stream))
    }

    async fn grant_lease(&self, ttl_seconds: i64, _deadline: Duration) -> Result<i64, StoreError> {
        let id = self.inner.next_lease_id.fetch_add(1, Ordering::SeqCst);
        let expires_at = Instant::now() + Duration::from_secs(ttl_seconds.max(0) as u64);
        self.inner.leases.write().await.insert(
            id,
            LeaseEntry {
                expires_at,
                keys: HashSet::new(),
            },
        );
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const D: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn put_and_get_roundtrip() {
        let store = MemoryStore::new();
        store
            .put("nodes/n1", b"hello", PutOptions::default(), D)
            .await
            .unwrap();
        assert_eq!(
            store.get("nodes/n1", D).await.unwrap(),
            Some(b"hello".to_vec())
        );
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get("nope", D).await.unwrap(), None);
    }

    #[tokio::test]
    async fn prefix_scan_is_ordered_and_scoped() {
        let store = MemoryStore::new();
        for (k, v) in [("configs/n1/hsi/1", "a"), ("configs/n1/hsi/2", "b"), ("configs/n2/hsi/1", "c")] {
            store
                .put(k, v.as_bytes(), PutOptions::default(), D)
                .await
                .unwrap();
        }
        let kvs = store
            .get_prefix("configs/n1/hsi/", GetPrefixOptions::default(), D)
            .await
            .unwrap();
        assert_eq!(kvs.len(), 2);
        assert_eq!(kvs[0].key, "configs/n1/hsi/1");
        assert_eq!(kvs[1].key, "configs/n1/hsi/2");
    }

    #[tokio::test]
    async fn prefix_scan_descend_reverses_order() {
        let store = MemoryStore::new();
        store.put("a/1", b"1", PutOptions::default(), D).await.unwrap();
        store.put("a/2", b"2", PutOptions::default(), D).await.unwrap();
        let kvs = store
            .get_prefix(
                "a/",
                GetPrefixOptions {
                    order: SortOrder::Descend,
                    limit: None,
                },
                D,
            )
            .await
            .unwrap();
        assert_eq!(kvs[0].key, "a/2");
        assert_eq!(kvs[1].key, "a/1");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryStore::new();
        store.delete("nope", D).await.unwrap();
        store.put("k", b"v", PutOptions::default(), D).await.unwrap();
        store.delete("k", D).await.unwrap();
        store.delete("k", D).await.unwrap();
        assert_eq!(store.get("k", D).await.unwrap(), None);
    }

    #[tokio::test]
    async fn watch_prefix_observes_put_and_delete() {
        let store = MemoryStore::new();
        let mut stream = store.watch_prefix("watched/").await.unwrap();

        let writer = store.clone();
        tokio::spawn(async move {
            writer
                .put("watched/a", b"1", PutOptions::default(), D)
                .await
                .unwrap();
            writer.delete("watched/a", D).await.unwrap();
        });

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.kind, WatchEventKind::Put);
        assert_eq!(first.key, "watched/a");

        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.kind, WatchEventKind::Delete);
    }

    #[tokio::test]
    async fn watch_prefix_ignores_other_prefixes() {
        let store = MemoryStore::new();
        let mut stream = store.watch_prefix("a/").await.unwrap();
        store.put("b/1", b"x", PutOptions::default(), D).await.unwrap();
        store.put("a/1", b"y", PutOptions::default(), D).await.unwrap();
        let event = stream.next().await.unwrap().unwrap();
        assert_eq!(event.key, "a/1");
    }

    #[tokio::test]
    async fn lease_expiry_deletes_key() {
        let store = MemoryStore::new();
        let lease_id = store.grant_lease(0, D).await.unwrap();
        store
            .put(
                "token_blacklist/abc",
                b"1",
                PutOptions {
                    lease_id: Some(lease_id),
                },
                D,
            )
            .await
            .unwrap();
        // The reaper ticks every 200ms; a zero-second TTL is already expired
        // on the very first tick.
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(store.get("token_blacklist/abc", D).await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_with_unknown_lease_fails() {
        let store = MemoryStore::new();
        let err = store
            .put("k", b"v", PutOptions { lease_id: Some(999) }, D)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownLease(999)));
    }
}
