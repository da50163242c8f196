//! Server configuration for `gwctl`.
//!
//! Loads configuration from environment variables with sensible defaults,
//! never panicking on malformed input — every parse falls back to a
//! hardcoded default (spec §6).

use std::net::SocketAddr;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Comma-separated etcd endpoints.
    pub etcd_endpoints: Vec<String>,
    /// Inbound gRPC (`NodeManagement`) bind port.
    pub grpc_port: u16,
    /// HTTPS REST API bind port.
    pub https_port: u16,
    /// HTTP-to-HTTPS redirector port (out of core; plumbing only).
    pub http_redirect_port: u16,
    /// TLS-terminated access-log HTTPS port, mirrors `https_port`'s listener
    /// with verbose request logging enabled.
    pub log_https_port: u16,
    /// Bind address for the metrics endpoint.
    pub prometheus_listen_ip: String,
    /// TLS certificate path.
    pub cert_file: String,
    /// TLS private key path.
    pub key_file: String,
    /// JWT signing secret. Randomly generated if unset (logged once at
    /// startup since it is not persisted across restarts).
    pub jwt_secret: String,
    /// Stale-node sweeper cadence.
    pub check_interval: Duration,
    /// Liveness window before a node is considered stale.
    pub heartbeat_timeout: Duration,
    /// Log level filter (e.g., `info`, `debug`, `warn`).
    pub log_level: String,
}

const DEFAULT_ETCD_ENDPOINT: &str = "localhost:2379";
const DEFAULT_GRPC_PORT: u16 = 50051;
const DEFAULT_HTTPS_PORT: u16 = 8443;
const DEFAULT_HTTP_REDIRECT_PORT: u16 = 8080;
const DEFAULT_LOG_HTTPS_PORT: u16 = 8444;
const DEFAULT_PROMETHEUS_LISTEN_IP: &str = "127.0.0.1";
const DEFAULT_METRICS_PORT: u16 = 55688;

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// - `ETCD_ENDPOINTS` — comma list (default `localhost:2379`)
    /// - `GRPC_PORT` — inbound gRPC port (default `50051`)
    /// - `HTTPS_PORT` — REST API port (default `8443`)
    /// - `HTTP_REDIRECT_PORT` — redirector port (default `8080`)
    /// - `LOG_HTTPS_PORT` — verbose-access-log HTTPS port (default `8444`)
    /// - `PROMETHEUS_LISTEN_IP` — metrics listener address (default `127.0.0.1`)
    /// - `CERT_FILE` / `KEY_FILE` — TLS material (default `./cert.pem` / `./key.pem`)
    /// - `JWT_SECRET` — signing secret (random 32-byte base64 if unset)
    /// - `GWCTL_LOG_LEVEL` — log filter (default `info`)
    #[must_use]
    pub fn from_env() -> Self {
        let etcd_endpoints = std::env::var("ETCD_ENDPOINTS")
            .unwrap_or_else(|_| DEFAULT_ETCD_ENDPOINT.to_owned())
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();

        let grpc_port = parse_env_or("GRPC_PORT", DEFAULT_GRPC_PORT);
        let https_port = parse_env_or("HTTPS_PORT", DEFAULT_HTTPS_PORT);
        let http_redirect_port = parse_env_or("HTTP_REDIRECT_PORT", DEFAULT_HTTP_REDIRECT_PORT);
        let log_https_port = parse_env_or("LOG_HTTPS_PORT", DEFAULT_LOG_HTTPS_PORT);

        let prometheus_listen_ip =
            std::env::var("PROMETHEUS_LISTEN_IP").unwrap_or_else(|_| DEFAULT_PROMETHEUS_LISTEN_IP.to_owned());

        let cert_file = std::env::var("CERT_FILE").unwrap_or_else(|_| "./cert.pem".to_owned());
        let key_file = std::env::var("KEY_FILE").unwrap_or_else(|_| "./key.pem".to_owned());

        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| gwctl_core::auth::generate_secret());

        let check_interval =
            Duration::from_secs(parse_env_or("GWCTL_CHECK_INTERVAL_SECS", gwctl_core::node_registry::CHECK_INTERVAL.as_secs()));
        let heartbeat_timeout = Duration::from_secs(parse_env_or(
            "GWCTL_HEARTBEAT_TIMEOUT_SECS",
            gwctl_core::node_registry::HEARTBEAT_TIMEOUT.as_secs(),
        ));

        let log_level = std::env::var("GWCTL_LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());

        Self {
            etcd_endpoints,
            grpc_port,
            https_port,
            http_redirect_port,
            log_https_port,
            prometheus_listen_ip,
            cert_file,
            key_file,
            jwt_secret,
            check_interval,
            heartbeat_timeout,
            log_level,
        }
    }

    pub fn https_bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.https_port))
    }

    pub fn http_redirect_bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.http_redirect_port))
    }

    pub fn grpc_bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.grpc_port))
    }

    pub fn metrics_bind_addr(&self) -> SocketAddr {
        let ip: std::net::IpAddr = self.prometheus_listen_ip.parse().unwrap_or(std::net::IpAddr::from([127, 0, 0, 1]));
        SocketAddr::from((ip, DEFAULT_METRICS_PORT))
    }
}

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_env_or_falls_back_on_missing() {
        let value: u16 = parse_env_or("GWCTL_TEST_NONEXISTENT_VAR", 1234);
        assert_eq!(value, 1234);
    }

    #[test]
    fn parse_env_or_falls_back_on_malformed() {
        std::env::set_var("GWCTL_TEST_MALFORMED_VAR", "not-a-number");
        let value: u16 = parse_env_or("GWCTL_TEST_MALFORMED_VAR", 1234);
        std::env::remove_var("GWCTL_TEST_MALFORMED_VAR");
        assert_eq!(value, 1234);
    }
}
