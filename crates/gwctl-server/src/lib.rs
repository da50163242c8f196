//! `gwctl` control-plane server.
//!
//! Wires together the core library, the store adapter, and the inbound
//! gRPC/HTTPS transports into a running process. Serves the JSON API at
//! `/api/*`.

pub mod config;
pub mod error;
pub mod grpc;
pub mod middleware;
pub mod routes;
pub mod state;
