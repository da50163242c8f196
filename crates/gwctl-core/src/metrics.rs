//! Process-global metric registry (supporting components D and H, design
//! note 9).
//!
//! A single [`MetricRegistry`] is created at startup and passed by
//! reference to the monitor supervisor; nothing else in the process holds
//! ad-hoc module-level metric state. Every gauge family carries a
//! `node_uuid` label so [`MetricRegistry::clear_node`] can drop every
//! series belonging to a node once it is unregistered or swept.

use std::collections::HashSet;
use std::sync::Mutex;

use prometheus::{GaugeVec, IntGaugeVec, Opts, Registry};

use crate::error::MetricsError;

/// The eight mutually exclusive PPPoE session states scraped from a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PppoeSessionState {
    NotConfigured,
    Init,
    Lcp,
    Auth,
    Ipcp,
    Data,
    End,
    Error,
}

impl PppoeSessionState {
    pub const ALL: [Self; 8] =
        [Self::NotConfigured, Self::Init, Self::Lcp, Self::Auth, Self::Ipcp, Self::Data, Self::End, Self::Error];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::Init => "init",
            Self::Lcp => "lcp",
            Self::Auth => "auth",
            Self::Ipcp => "ipcp",
            Self::Data => "data",
            Self::End => "end",
            Self::Error => "error",
        }
    }
}

/// The three DHCP server states scraped from a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DhcpServerState {
    NotConfigured,
    Stopped,
    Running,
}

impl DhcpServerState {
    pub const ALL: [Self; 3] = [Self::NotConfigured, Self::Stopped, Self::Running];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::Stopped => "stopped",
            Self::Running => "running",
        }
    }
}

/// Tracks which label combinations have been emitted for a node, so its
/// series can be dropped in full when the node stops being monitored.
#[derive(Default)]
struct NodeSeries {
    nic_indices: HashSet<String>,
    user_ids: HashSet<String>,
}

/// Process-global Prometheus registry. Cheap to clone — everything behind
/// it is reference-counted by the underlying `prometheus` collectors.
#[derive(Clone)]
pub struct MetricRegistry {
    registry: Registry,

    nic_rx_packets: IntGaugeVec,
    nic_tx_packets: IntGaugeVec,
    nic_rx_bytes: IntGaugeVec,
    nic_tx_bytes: IntGaugeVec,
    nic_rx_errors: IntGaugeVec,
    nic_tx_errors: IntGaugeVec,
    nic_rx_dropped: IntGaugeVec,

    user_rx_packets: IntGaugeVec,
    user_tx_packets: IntGaugeVec,
    user_rx_bytes: IntGaugeVec,
    user_tx_bytes: IntGaugeVec,
    unknown_user_rx_packets: IntGaugeVec,
    unknown_user_tx_packets: IntGaugeVec,
    unknown_user_rx_bytes: IntGaugeVec,
    unknown_user_tx_bytes: IntGaugeVec,

    pppoe_session_total: IntGaugeVec,
    pppoe_session_rx_packets: IntGaugeVec,
    pppoe_session_tx_packets: IntGaugeVec,
    pppoe_session_rx_bytes: IntGaugeVec,
    pppoe_session_tx_bytes: IntGaugeVec,

    dhcp_user_current_leases: IntGaugeVec,
    dhcp_user_max_leases: IntGaugeVec,
    dhcp_server_total: IntGaugeVec,

    nodes: std::sync::Arc<Mutex<std::collections::HashMap<String, NodeSeries>>>,
}

fn gauge(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> Result<IntGaugeVec, MetricsError> {
    let gauge = IntGaugeVec::new(Opts::new(name, help), labels)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

impl MetricRegistry {
    /// Builds every gauge family and registers it with a fresh
    /// [`Registry`]. Fails only if two families are registered under the
    /// same name, which would be a programming error in this module.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();
        Ok(Self {
            nic_rx_packets: gauge(&registry, "gwctl_nic_rx_packets", "NIC received packets", &["node_uuid", "nic_index"])?,
            nic_tx_packets: gauge(&registry, "gwctl_nic_tx_packets", "NIC transmitted packets", &["node_uuid", "nic_index"])?,
            nic_rx_bytes: gauge(&registry, "gwctl_nic_rx_bytes", "NIC received bytes", &["node_uuid", "nic_index"])?,
            nic_tx_bytes: gauge(&registry, "gwctl_nic_tx_bytes", "NIC transmitted bytes", &["node_uuid", "nic_index"])?,
            nic_rx_errors: gauge(&registry, "gwctl_nic_rx_errors", "NIC receive errors", &["node_uuid", "nic_index"])?,
            nic_tx_errors: gauge(&registry, "gwctl_nic_tx_errors", "NIC transmit errors", &["node_uuid", "nic_index"])?,
            nic_rx_dropped: gauge(&registry, "gwctl_nic_rx_dropped", "NIC receive drops", &["node_uuid", "nic_index"])?,

            user_rx_packets: gauge(&registry, "gwctl_user_rx_packets", "Per-user received packets", &["node_uuid", "user_id"])?,
            user_tx_packets: gauge(&registry, "gwctl_user_tx_packets", "Per-user transmitted packets", &["node_uuid", "user_id"])?,
            user_rx_bytes: gauge(&registry, "gwctl_user_rx_bytes", "Per-user received bytes", &["node_uuid", "user_id"])?,
            user_tx_bytes: gauge(&registry, "gwctl_user_tx_bytes", "Per-user transmitted bytes", &["node_uuid", "user_id"])?,
            unknown_user_rx_packets: gauge(&registry, "gwctl_unknown_user_rx_packets", "Unattributed received packets", &["node_uuid"])?,
            unknown_user_tx_packets: gauge(&registry, "gwctl_unknown_user_tx_packets", "Unattributed transmitted packets", &["node_uuid"])?,
            unknown_user_rx_bytes: gauge(&registry, "gwctl_unknown_user_rx_bytes", "Unattributed received bytes", &["node_uuid"])?,
            unknown_user_tx_bytes: gauge(&registry, "gwctl_unknown_user_tx_bytes", "Unattributed transmitted bytes", &["node_uuid"])?,

            pppoe_session_total: gauge(&registry, "gwctl_pppoe_session_total", "PPPoE sessions by state", &["node_uuid", "state"])?,
            pppoe_session_rx_packets: gauge(&registry, "gwctl_pppoe_session_rx_packets", "Per-session received packets", &["node_uuid", "user_id"])?,
            pppoe_session_tx_packets: gauge(&registry, "gwctl_pppoe_session_tx_packets", "Per-session transmitted packets", &["node_uuid", "user_id"])?,
            pppoe_session_rx_bytes: gauge(&registry, "gwctl_pppoe_session_rx_bytes", "Per-session received bytes", &["node_uuid", "user_id"])?,
            pppoe_session_tx_bytes: gauge(&registry, "gwctl_pppoe_session_tx_bytes", "Per-session transmitted bytes", &["node_uuid", "user_id"])?,

            dhcp_user_current_leases: gauge(&registry, "gwctl_dhcp_user_current_leases", "Current DHCP leases per user", &["node_uuid", "user_id"])?,
            dhcp_user_max_leases: gauge(&registry, "gwctl_dhcp_user_max_leases", "Max DHCP leases per user pool", &["node_uuid", "user_id"])?,
            dhcp_server_total: gauge(&registry, "gwctl_dhcp_server_total", "DHCP servers by state", &["node_uuid", "state"])?,

            nodes: std::sync::Arc::new(Mutex::new(std::collections::HashMap::new())),
            registry,
        })
    }

    /// Render the registered families in Prometheus text exposition format.
    pub fn gather_text(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let families = self.registry.gather();
        let mut buf = Vec::new();
        // An encoding failure here means a collector produced invalid UTF-8
        // metric text, which `prometheus` collectors never do.
        encoder.encode(&families, &mut buf).ok();
        String::from_utf8(buf).unwrap_or_default()
    }

    fn touch(&self, uuid: &str, nic_index: Option<&str>, user_id: Option<&str>) {
        let mut nodes = self.nodes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let entry = nodes.entry(uuid.to_string()).or_default();
        if let Some(n) = nic_index {
            entry.nic_indices.insert(n.to_string());
        }
        if let Some(u) = user_id {
            entry.user_ids.insert(u.to_string());
        }
    }

    pub fn set_nic_counters(&self, uuid: &str, nic_index: &str, rx_p: i64, tx_p: i64, rx_b: i64, tx_b: i64, rx_e: i64, tx_e: i64, rx_d: i64) {
        self.touch(uuid, Some(nic_index), None);
        self.nic_rx_packets.with_label_values(&[uuid, nic_index]).set(rx_p);
        self.nic_tx_packets.with_label_values(&[uuid, nic_index]).set(tx_p);
        self.nic_rx_bytes.with_label_values(&[uuid, nic_index]).set(rx_b);
        self.nic_tx_bytes.with_label_values(&[uuid, nic_index]).set(tx_b);
        self.nic_rx_errors.with_label_values(&[uuid, nic_index]).set(rx_e);
        self.nic_tx_errors.with_label_values(&[uuid, nic_index]).set(tx_e);
        self.nic_rx_dropped.with_label_values(&[uuid, nic_index]).set(rx_d);
    }

    pub fn set_user_counters(&self, uuid: &str, user_id: &str, rx_p: i64, tx_p: i64, rx_b: i64, tx_b: i64) {
        self.touch(uuid, None, Some(user_id));
        self.user_rx_packets.with_label_values(&[uuid, user_id]).set(rx_p);
        self.user_tx_packets.with_label_values(&[uuid, user_id]).set(tx_p);
        self.user_rx_bytes.with_label_values(&[uuid, user_id]).set(rx_b);
        self.user_tx_bytes.with_label_values(&[uuid, user_id]).set(tx_b);
    }

    pub fn set_unknown_user_counters(&self, uuid: &str, rx_p: i64, tx_p: i64, rx_b: i64, tx_b: i64) {
        self.unknown_user_rx_packets.with_label_values(&[uuid]).set(rx_p);
        self.unknown_user_tx_packets.with_label_values(&[uuid]).set(tx_p);
        self.unknown_user_rx_bytes.with_label_values(&[uuid]).set(rx_b);
        self.unknown_user_tx_bytes.with_label_values(&[uuid]).set(tx_b);
    }

    /// Reset all eight session-state buckets to zero then apply `counts`.
    /// Called once per tick so states with no current sessions read zero
    /// rather than retaining a stale prior value.
    pub fn set_pppoe_session_totals(&self, uuid: &str, counts: &[(PppoeSessionState, i64)]) {
        for state in PppoeSessionState::ALL {
            self.pppoe_session_total.with_label_values(&[uuid, state.as_str()]).set(0);
        }
        for (state, count) in counts {
            self.pppoe_session_total.with_label_values(&[uuid, state.as_str()]).set(*count);
        }
    }

    pub fn set_pppoe_session_counters(&self, uuid: &str, user_id: &str, rx_p: i64, tx_p: i64, rx_b: i64, tx_b: i64) {
        self.touch(uuid, None, Some(user_id));
        self.pppoe_session_rx_packets.with_label_values(&[uuid, user_id]).set(rx_p);
        self.pppoe_session_tx_packets.with_label_values(&[uuid, user_id]).set(tx_p);
        self.pppoe_session_rx_bytes.with_label_values(&[uuid, user_id]).set(rx_b);
        self.pppoe_session_tx_bytes.with_label_values(&[uuid, user_id]).set(tx_b);
    }

    pub fn set_dhcp_user_leases(&self, uuid: &str, user_id: &str, current: i64, max: i64) {
        self.touch(uuid, None, Some(user_id));
        self.dhcp_user_current_leases.with_label_values(&[uuid, user_id]).set(current);
        self.dhcp_user_max_leases.with_label_values(&[uuid, user_id]).set(max);
    }

    pub fn set_dhcp_server_totals(&self, uuid: &str, counts: &[(DhcpServerState, i64)]) {
        for state in DhcpServerState::ALL {
            self.dhcp_server_total.with_label_values(&[uuid, state.as_str()]).set(0);
        }
        for (state, count) in counts {
            self.dhcp_server_total.with_label_values(&[uuid, state.as_str()]).set(*count);
        }
    }

    /// Delete every labelled series carrying `node_uuid=uuid`. Called by
    /// the monitor supervisor's `stop(uuid)` (spec §4.D).
    pub fn clear_node(&self, uuid: &str) {
        let series = {
            let mut nodes = self.nodes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            nodes.remove(uuid)
        };
        let Some(series) = series else { return };

        for nic_index in &series.nic_indices {
            let _ = self.nic_rx_packets.remove_label_values(&[uuid, nic_index]);
            let _ = self.nic_tx_packets.remove_label_values(&[uuid, nic_index]);
            let _ = self.nic_rx_bytes.remove_label_values(&[uuid, nic_index]);
            let _ = self.nic_tx_bytes.remove_label_values(&[uuid, nic_index]);
            let _ = self.nic_rx_errors.remove_label_values(&[uuid, nic_index]);
            let _ = self.nic_tx_errors.remove_label_values(&[uuid, nic_index]);
            let _ = self.nic_rx_dropped.remove_label_values(&[uuid, nic_index]);
        }
        for user_id in &series.user_ids {
            let _ = self.user_rx_packets.remove_label_values(&[uuid, user_id]);
            let _ = self.user_tx_packets.remove_label_values(&[uuid, user_id]);
            let _ = self.user_rx_bytes.remove_label_values(&[uuid, user_id]);
            let _ = self.user_tx_bytes.remove_label_values(&[uuid, user_id]);
            let _ = self.pppoe_session_rx_packets.remove_label_values(&[uuid, user_id]);
            let _ = self.pppoe_session_tx_packets.remove_label_values(&[uuid, user_id]);
            let _ = self.pppoe_session_rx_bytes.remove_label_values(&[uuid, user_id]);
            let _ = self.pppoe_session_tx_bytes.remove_label_values(&[uuid, user_id]);
            let _ = self.dhcp_user_current_leases.remove_label_values(&[uuid, user_id]);
            let _ = self.dhcp_user_max_leases.remove_label_values(&[uuid, user_id]);
        }
        let _ = self.unknown_user_rx_packets.remove_label_values(&[uuid]);
        let _ = self.unknown_user_tx_packets.remove_label_values(&[uuid]);
        let _ = self.unknown_user_rx_bytes.remove_label_values(&[uuid]);
        let _ = self.unknown_user_tx_bytes.remove_label_values(&[uuid]);
        for state in PppoeSessionState::ALL {
            let _ = self.pppoe_session_total.remove_label_values(&[uuid, state.as_str()]);
        }
        for state in DhcpServerState::ALL {
            let _ = self.dhcp_server_total.remove_label_values(&[uuid, state.as_str()]);
        }
    }

    /// True if no series for `uuid` remain — used by tests to assert
    /// post-unregister cleanup (spec §8).
    pub fn has_node(&self, uuid: &str) -> bool {
        self.nodes.lock().unwrap_or_else(std::sync::PoisonError::into_inner).contains_key(uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_node_removes_tracked_series() {
        let metrics = MetricRegistry::new().unwrap();
        metrics.set_nic_counters("n1", "0", 1, 2, 3, 4, 0, 0, 0);
        metrics.set_user_counters("n1", "7", 1, 1, 1, 1);
        assert!(metrics.has_node("n1"));
        metrics.clear_node("n1");
        assert!(!metrics.has_node("n1"));
    }

    #[test]
    fn gather_text_includes_registered_family() {
        let metrics = MetricRegistry::new().unwrap();
        metrics.set_unknown_user_counters("n1", 5, 5, 500, 500);
        let text = metrics.gather_text();
        assert!(text.contains("gwctl_unknown_user_rx_packets"));
    }
}
