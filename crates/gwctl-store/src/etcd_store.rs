//! etcd-backed [`StoreAdapter`] — the production default.
//!
//! A single shared connection is established at startup via
//! [`EtcdStore::connect`]; every other component reaches the store through
//! this one handle (spec §3, "Ownership in the process"). `etcd_client`'s
//! request methods take `&mut self`, so the client is held behind a
//! `tokio::sync::Mutex` — cloning the underlying client is cheap (it's a
//! thin wrapper over a shared tonic channel), but serializing through one
//! mutex keeps this adapter simple and is not a bottleneck: etcd requests
//! are already serialized on the wire per-stream.

use std::time::Duration;

use etcd_client::{
    Client, ConnectOptions, DeleteOptions, EventType, GetOptions, PutOptions as EtcdPutOptions,
    SortOrder as EtcdSortOrder, SortTarget, WatchOptions,
};
use futures::StreamExt;
use tokio::sync::Mutex;

use crate::{
    GetPrefixOptions, KeyValue, PutOptions, SortOrder, StoreAdapter, StoreError, WatchEvent,
    WatchEventKind, WatchStream,
};

/// A [`StoreAdapter`] backed by a real etcd cluster.
pub struct EtcdStore {
    client: Mutex<Client>,
}

impl EtcdStore {
    /// Connect to the etcd cluster at the given endpoints (comma-separated
    /// list already split by the caller, per spec §4.A / §6's
    /// `ETCD_ENDPOINTS`).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if no endpoint can be reached.
    pub async fn connect(endpoints: &[String]) -> Result<Self, StoreError> {
        let client = Client::connect(endpoints, Option::<ConnectOptions>::None)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self {
            client: Mutex::new(client),
        })
    }

    async fn with_timeout<T>(
        deadline: Duration,
        fut: impl std::future::Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(deadline, fut)
            .await
            .map_err(|_| StoreError::DeadlineExceeded)?
    }
}

#[async_trait::async_trait]
impl StoreAdapter for EtcdStore {
    async fn get(&self, key: &str, deadline: Duration) -> Result<Option<Vec<u8>>, StoreError> {
        Self::with_timeout(deadline, async {
            let mut client = self.client.lock().await;
            let resp = client
                .get(key, None)
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            Ok(resp.kvs().first().map(|kv| kv.value().to_vec()))
        })
        .await
    }

    async fn get_prefix(
        &self,
        prefix: &str,
        opts: GetPrefixOptions,
        deadline: Duration,
    ) -> Result<Vec<KeyValue>, StoreError> {
        Self::with_timeout(deadline, async {
            let mut options = GetOptions::new()
                .with_prefix()
                .with_sort(SortTarget::Key, to_etcd_order(opts.order));
            if let Some(limit) = opts.limit {
                options = options.with_limit(limit as i64);
            }

            let mut client = self.client.lock().await;
            let resp = client
                .get(prefix, Some(options))
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;

            Ok(resp
                .kvs()
                .iter()
                .map(|kv| KeyValue {
                    key: String::from_utf8_lossy(kv.key()).into_owned(),
                    value: kv.value().to_vec(),
                })
                .collect())
        })
        .await
    }

    async fn put(
        &self,
        key: &str,
        value: &[u8],
        opts: PutOptions,
        deadline: Duration,
    ) -> Result<(), StoreError> {
        Self::with_timeout(deadline, async {
            let options = opts
                .lease_id
                .map(|id| EtcdPutOptions::new().with_lease(id));

            let mut client = self.client.lock().await;
            client
                .put(key, value, options)
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str, deadline: Duration) -> Result<(), StoreError> {
        Self::with_timeout(deadline, async {
            let mut client = self.client.lock().await;
            client
                .delete(key, Option::<DeleteOptions>::None)
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn watch_prefix(&self, prefix: &str) -> Result<WatchStream, StoreError> {
        let mut client = self.client.lock().await;
        let (_watcher, stream) = client
            .watch(prefix, Some(WatchOptions::new().with_prefix()))
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        drop(client);

        let mapped = stream.flat_map(|resp| {
            let events: Vec<Result<WatchEvent, StoreError>> = match resp {
                Ok(resp) => resp
                    .events()
                    .iter()
                    .filter_map(|event| {
                        let kv = event.kv()?;
                        let key = String::from_utf8_lossy(kv.key()).into_owned();
                        let kind = match event.event_type() {
                            EventType::Put => WatchEventKind::Put,
                            EventType::Delete => WatchEventKind::Delete,
                        };
                        Some(Ok(WatchEvent {
                            kind,
                            key,
                            value: kv.value().to_vec(),
                        }))
                    })
                    .collect(),
                Err(e) => vec![Err(StoreError::WatchClosed(e.to_string()))],
            };
            futures::stream::iter(events)
        });

        Ok(Box::pin(mapped))
    }

    async fn grant_lease(&self, ttl_seconds: i64, deadline: Duration) -> Result<i64, StoreError> {
        Self::with_timeout(deadline, async {
            let mut client = self.client.lock().await;
            let resp = client
                .lease_grant(ttl_seconds, None)
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            Ok(resp.id())
        })
        .await
    }
}

fn to_etcd_order(order: SortOrder) -> EtcdSortOrder {
    match order {
        SortOrder::Ascend => EtcdSortOrder::Ascend,
        SortOrder::Descend => EtcdSortOrder::Descend,
    }
}
