//! Core domain logic for `gwctl`, the control plane of a fleet of
//! software-defined residential gateway nodes.
//!
//! Contains identity/session management, the node registry and its stale
//! sweeper, the per-node monitor supervisor, the HSI configuration service,
//! the command publisher, the failed-event pipeline, the subscriber-count
//! registry, and the process-global metric registry. This crate depends on
//! `gwctl-store` for persistence and `gwctl-proto` for the gRPC contracts;
//! it knows nothing about HTTP routing or transport — that lives in
//! `gwctl-server`.

pub mod auth;
pub mod commands;
pub mod error;
pub mod failed_events;
pub mod hsi;
pub mod metrics;
pub mod monitor;
pub mod node_registry;
pub mod subscriber_count;
