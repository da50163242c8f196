//! Node Monitor Supervisor (component D): per-node scrape tasks, owning
//! the outbound gRPC client and tick loop for each registered node.
//!
//! The supervisor is injected into the [`node_registry`](crate::node_registry)
//! as a [`crate::node_registry::MonitorController`]; no other component may
//! hold a reference to a node's outbound client or scrape context.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gwctl_proto::fastrg::fastrg_service_client::FastrgServiceClient;
use gwctl_proto::fastrg::{DhcpServerState as WireDhcpState, PppoeSessionState as WirePppoeState};
use gwctl_proto::node_management::Empty;
use tokio::sync::{watch, Mutex};
use tonic::transport::Channel;
use tracing::{debug, warn};

use crate::metrics::{DhcpServerState, MetricRegistry, PppoeSessionState};
use crate::node_registry::MonitorController;

const SCRAPE_TICK_PERIOD: Duration = Duration::from_secs(1);
const SCRAPE_DEADLINE: Duration = Duration::from_secs(5);
const OUTBOUND_PORT: u16 = 50052;

struct Monitor {
    shutdown: watch::Sender<bool>,
}

/// Owns `nodeUuid → Monitor` under a single read-write lock, as design note
/// 9 and §5 require; start/stop are serialized per uuid by holding the map
/// lock across both the stop-existing and spawn-new steps.
pub struct MonitorSupervisor {
    monitors: Mutex<HashMap<String, Monitor>>,
    metrics: Arc<MetricRegistry>,
}

impl MonitorSupervisor {
    #[must_use]
    pub fn new(metrics: Arc<MetricRegistry>) -> Arc<Self> {
        Arc::new(Self { monitors: Mutex::new(HashMap::new()), metrics })
    }

    async fn tick(client: &mut FastrgServiceClient<Channel>, uuid: &str, metrics: &MetricRegistry) {
        match client.get_system_info(tonic::Request::new(Empty {})).await {
            Ok(reply) => {
                let reply = reply.into_inner();
                for nic in reply.nics {
                    metrics.set_nic_counters(
                        uuid,
                        &nic.nic_index.to_string(),
                        nic.rx_packets as i64,
                        nic.tx_packets as i64,
                        nic.rx_bytes as i64,
                        nic.tx_bytes as i64,
                        nic.rx_errors as i64,
                        nic.tx_errors as i64,
                        nic.rx_dropped as i64,
                    );
                }
                for user in &reply.users {
                    // The node's last slot represents traffic it could not
                    // attribute to a known user (spec §4.D.1).
                    if user.unknown_user {
                        metrics.set_unknown_user_counters(
                            uuid,
                            user.rx_packets as i64,
                            user.tx_packets as i64,
                            user.rx_bytes as i64,
                            user.tx_bytes as i64,
                        );
                    } else {
                        metrics.set_user_counters(
                            uuid,
                            &user.user_id,
                            user.rx_packets as i64,
                            user.tx_packets as i64,
                            user.rx_bytes as i64,
                            user.tx_bytes as i64,
                        );
                    }
                }
            }
            Err(e) => warn!(node_uuid = uuid, error = %e, "GetSystemInfo scrape failed"),
        }

        match client.get_hsi_info(tonic::Request::new(Empty {})).await {
            Ok(reply) => {
                let reply = reply.into_inner();
                let mut totals: HashMap<PppoeSessionState, i64> = HashMap::new();
                for session in &reply.sessions {
                    let state = map_pppoe_state(session.state);
                    *totals.entry(state).or_insert(0) += 1;
                    metrics.set_pppoe_session_counters(
                        uuid,
                        &session.user_id,
                        session.rx_packets as i64,
                        session.tx_packets as i64,
                        session.rx_bytes as i64,
                        session.tx_bytes as i64,
                    );
                }
                let counts: Vec<(PppoeSessionState, i64)> = totals.into_iter().collect();
                metrics.set_pppoe_session_totals(uuid, &counts);
            }
            Err(e) => warn!(node_uuid = uuid, error = %e, "GetHsiInfo scrape failed"),
        }

        match client.get_dhcp_info(tonic::Request::new(Empty {})).await {
            Ok(reply) => {
                let reply = reply.into_inner();
                for lease in &reply.leases {
                    let max = pool_capacity(&lease.pool_start, &lease.pool_end).unwrap_or(0);
                    metrics.set_dhcp_user_leases(uuid, &lease.user_id, i64::from(lease.current_leases), max);
                }
                let mut totals: HashMap<DhcpServerState, i64> = HashMap::new();
                for server in &reply.servers {
                    let state = map_dhcp_state(server.state);
                    *totals.entry(state).or_insert(0) += 1;
                }
                let counts: Vec<(DhcpServerState, i64)> = totals.into_iter().collect();
                metrics.set_dhcp_server_totals(uuid, &counts);
            }
            Err(e) => warn!(node_uuid = uuid, error = %e, "GetDhcpInfo scrape failed"),
        }
    }

    async fn run(uuid: String, ip: String, metrics: Arc<MetricRegistry>, mut shutdown: watch::Receiver<bool>) {
        let endpoint = format!("http://{ip}:{OUTBOUND_PORT}");
        let channel = match Channel::from_shared(endpoint).and_then(|c| Ok(c.timeout(SCRAPE_DEADLINE).connect_lazy()))
        {
            Ok(channel) => channel,
            Err(e) => {
                warn!(node_uuid = %uuid, error = %e, "failed to build outbound channel");
                return;
            }
        };
        let mut client = FastrgServiceClient::new(channel);
        let mut ticker = tokio::time::interval(SCRAPE_TICK_PERIOD);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    Self::tick(&mut client, &uuid, &metrics).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        debug!(node_uuid = %uuid, "monitor stopping");
                        return;
                    }
                }
            }
        }
    }
}

#[async_trait]
impl MonitorController for MonitorSupervisor {
    /// If a monitor for `uuid` already exists, it is stopped first.
    async fn start(&self, uuid: &str, ip: &str) {
        let mut monitors = self.monitors.lock().await;
        if let Some(existing) = monitors.remove(uuid) {
            let _ = existing.shutdown.send(true);
        }
        let (tx, rx) = watch::channel(false);
        let metrics = Arc::clone(&self.metrics);
        tokio::spawn(Self::run(uuid.to_string(), ip.to_string(), metrics, rx));
        monitors.insert(uuid.to_string(), Monitor { shutdown: tx });
    }

    /// Cancels the tick loop (which closes the outbound channel by drop)
    /// and deletes every metric series carrying this node's uuid.
    async fn stop(&self, uuid: &str) {
        let mut monitors = self.monitors.lock().await;
        if let Some(monitor) = monitors.remove(uuid) {
            let _ = monitor.shutdown.send(true);
        }
        drop(monitors);
        self.metrics.clear_node(uuid);
    }
}

fn map_pppoe_state(wire: i32) -> PppoeSessionState {
    match WirePppoeState::try_from(wire).unwrap_or(WirePppoeState::Error) {
        WirePppoeState::NotConfigured => PppoeSessionState::NotConfigured,
        WirePppoeState::Init => PppoeSessionState::Init,
        WirePppoeState::Lcp => PppoeSessionState::Lcp,
        WirePppoeState::Auth => PppoeSessionState::Auth,
        WirePppoeState::Ipcp => PppoeSessionState::Ipcp,
        WirePppoeState::Data => PppoeSessionState::Data,
        WirePppoeState::End => PppoeSessionState::End,
        WirePppoeState::Error => PppoeSessionState::Error,
    }
}

fn map_dhcp_state(wire: i32) -> DhcpServerState {
    match WireDhcpState::try_from(wire).unwrap_or(WireDhcpState::NotConfigured) {
        WireDhcpState::NotConfigured => DhcpServerState::NotConfigured,
        WireDhcpState::Stopped => DhcpServerState::Stopped,
        WireDhcpState::Running => DhcpServerState::Running,
    }
}

/// `max = ipToInt(poolEnd) - ipToInt(poolStart) + 1` (spec §4.D.3).
fn pool_capacity(start: &str, end: &str) -> Option<i64> {
    let start: std::net::Ipv4Addr = start.parse().ok()?;
    let end: std::net::Ipv4Addr = end.parse().ok()?;
    let start = u32::from(start);
    let end = u32::from(end);
    Some(i64::from(end) - i64::from(start) + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_capacity_computes_inclusive_range() {
        assert_eq!(pool_capacity("10.0.0.10", "10.0.0.19"), Some(10));
    }

    #[test]
    fn pool_capacity_rejects_malformed_ip() {
        assert_eq!(pool_capacity("not-an-ip", "10.0.0.19"), None);
    }

    #[tokio::test]
    async fn start_then_stop_clears_metrics() {
        let metrics = Arc::new(MetricRegistry::new().unwrap());
        let supervisor = MonitorSupervisor::new(Arc::clone(&metrics));
        supervisor.start("n1", "127.0.0.1").await;
        metrics.set_unknown_user_counters("n1", 1, 1, 1, 1);
        supervisor.stop("n1").await;
        assert!(!metrics.has_node("n1"));
    }
}
