//! Error types for `gwctl-core`.
//!
//! Each domain module gets its own enum so handlers can match precisely;
//! every enum composes [`gwctl_store::StoreError`] via `#[from]` rather than
//! re-wrapping it.

use gwctl_store::StoreError;

/// Errors from identity and session operations (component B).
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No such user, or the password did not match the stored hash.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Username already has a record.
    #[error("user already exists: {username}")]
    UserExists { username: String },

    /// No such user to delete or describe.
    #[error("user not found: {username}")]
    UserNotFound { username: String },

    /// The bearer header was absent.
    #[error("missing authorization header")]
    Missing,

    /// Signature or expiry check failed.
    #[error("invalid token: {reason}")]
    InvalidToken { reason: String },

    /// The token is present in the revocation set.
    #[error("token has been revoked")]
    Revoked,

    /// bcrypt hashing or verification failed internally.
    #[error("password hashing error: {0}")]
    Hashing(String),

    /// The store returned an error while reading/writing auth state.
    #[error("auth store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from node registry operations (component C).
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Heartbeat or unregister referenced a uuid with no record.
    #[error("node not registered: {uuid}")]
    NotRegistered { uuid: String },

    /// Register/heartbeat request was missing a required field.
    #[error("malformed request: {reason}")]
    Malformed { reason: String },

    /// The store returned an error.
    #[error("registry store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from HSI config service operations (component E).
#[derive(Debug, thiserror::Error)]
pub enum HsiError {
    /// `nodeId` or `userId` was empty where required.
    #[error("malformed request: {reason}")]
    Malformed { reason: String },

    /// One of the eight content fields was empty.
    #[error("empty content field: {field}")]
    EmptyField { field: String },

    /// `userId` exceeds the node's configured subscriber count.
    #[error("user id {user_id} exceeds subscriber count {count}")]
    UserIdExceeds { user_id: String, count: i64 },

    /// The requested vlan-id collides with a different user-id on the node.
    #[error("vlan {vlan_id} already in use by user {user_id}")]
    VlanConflict { vlan_id: String, user_id: String },

    /// No record at the given node/user.
    #[error("hsi record not found: node={node_id} user={user_id}")]
    NotFound { node_id: String, user_id: String },

    /// The store returned an error.
    #[error("hsi store error: {0}")]
    Store(#[from] StoreError),

    /// The subscriber-count registry returned an error.
    #[error("subscriber count error: {0}")]
    SubscriberCount(#[from] SubscriberCountError),
}

/// Errors from command publishing operations (component F).
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// No HSI record exists for the target node/user; dial/hangup refused.
    #[error("no hsi record for node={node_id} user={user_id}")]
    NoHsiRecord { node_id: String, user_id: String },

    /// The store returned an error.
    #[error("command store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from the failed-event pipeline (component G).
#[derive(Debug, thiserror::Error)]
pub enum FailedEventError {
    /// The watch stream backing the pipeline broke.
    #[error("failed-event watch closed: {reason}")]
    WatchClosed { reason: String },

    /// The store returned an error.
    #[error("failed-event store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from process-global metric registration (component D).
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// `prometheus` rejected a metric definition or registration.
    #[error("metric registration failed: {0}")]
    Registration(#[from] prometheus::Error),
}

/// Errors from the subscriber-count registry (component I).
#[derive(Debug, thiserror::Error)]
pub enum SubscriberCountError {
    /// No cap set for the node.
    #[error("subscriber count not set for node: {node_id}")]
    NotFound { node_id: String },

    /// A negative count was supplied.
    #[error("subscriber count must be >= 0, got {value}")]
    Negative { value: i64 },

    /// The store returned an error.
    #[error("subscriber count store error: {0}")]
    Store(#[from] StoreError),
}
