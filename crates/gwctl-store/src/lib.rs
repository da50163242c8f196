//! Store adapter for `gwctl` — a typed wrapper over a watchable, ordered,
//! leasable key-value store.
//!
//! This crate defines [`StoreAdapter`], the sole capability handle every
//! other `gwctl` component uses to reach persistent state. It knows nothing
//! about nodes, HSI records, or tokens — just keys, values, prefixes,
//! watches, and leases, mirroring the contract section 4.A of the design
//! describes.
//!
//! Two implementations are provided:
//!
//! - [`EtcdStore`] — production default, backed by `etcd-client` (feature
//!   `etcd-backend`, enabled by default).
//! - [`MemoryStore`] — in-process, for tests and local development.

mod error;
#[cfg(feature = "etcd-backend")]
mod etcd_store;
mod memory;

pub use error::StoreError;
#[cfg(feature = "etcd-backend")]
pub use etcd_store::EtcdStore;
pub use memory::MemoryStore;

use std::time::Duration;

use futures::stream::BoxStream;

/// A single key/value pair as returned by a range read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: Vec<u8>,
}

/// Ordering for [`StoreAdapter::get_prefix`] results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascend,
    Descend,
}

/// Options for a prefix range read.
#[derive(Debug, Clone, Default)]
pub struct GetPrefixOptions {
    /// Key ordering of the returned pairs.
    pub order: SortOrder,
    /// Cap on the number of pairs returned; `None` means unbounded.
    pub limit: Option<usize>,
}

/// Options for a single write.
#[derive(Debug, Clone, Copy, Default)]
pub struct PutOptions {
    /// Attach the write to a previously granted lease; the key is deleted
    /// by the store automatically once the lease expires.
    pub lease_id: Option<i64>,
}

/// The kind of change a watch stream reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Put,
    Delete,
}

/// A single change observed on a watched prefix.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub key: String,
    /// Populated for [`WatchEventKind::Put`]; empty for deletes.
    pub value: Vec<u8>,
}

/// A stream of [`WatchEvent`]s, terminating (with an `Err`) if the
/// underlying watch channel breaks.
pub type WatchStream = BoxStream<'static, Result<WatchEvent, StoreError>>;

/// A typed handle to a watchable, ordered, leasable key-value store.
///
/// Every method takes a caller-supplied `deadline`; implementations must
/// bound the operation by it and return [`StoreError::DeadlineExceeded`] on
/// expiry rather than hang. Transient backend errors surface unchanged —
/// the adapter itself never retries (spec §4.A).
#[async_trait::async_trait]
pub trait StoreAdapter: Send + Sync + 'static {
    /// Point read. Returns `Ok(None)` if the key does not exist.
    async fn get(&self, key: &str, deadline: Duration) -> Result<Option<Vec<u8>>, StoreError>;

    /// Range read over every key starting with `prefix`.
    async fn get_prefix(
        &self,
        prefix: &str,
        opts: GetPrefixOptions,
        deadline: Duration,
    ) -> Result<Vec<KeyValue>, StoreError>;

    /// Write `value` at `key`, optionally attaching it to a lease.
    async fn put(
        &self,
        key: &str,
        value: &[u8],
        opts: PutOptions,
        deadline: Duration,
    ) -> Result<(), StoreError>;

    /// Delete a key. Idempotent — deleting a missing key is not an error.
    async fn delete(&self, key: &str, deadline: Duration) -> Result<(), StoreError>;

    /// Open a long-lived watch over every key starting with `prefix`. The
    /// returned stream yields one item per PUT/DELETE observed from the
    /// moment the watch is established.
    async fn watch_prefix(&self, prefix: &str) -> Result<WatchStream, StoreError>;

    /// Grant a lease that expires `ttl_seconds` after this call returns.
    /// Any key written with [`PutOptions::lease_id`] set to the returned ID
    /// is deleted by the store when the lease expires.
    async fn grant_lease(&self, ttl_seconds: i64, deadline: Duration) -> Result<i64, StoreError>;
}
