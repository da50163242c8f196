//! Command Publisher (component F): writes imperative dial/hangup
//! envelopes into the command keyspace for the target node to consume.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gwctl_store::{PutOptions, StoreAdapter};
use serde::{Deserialize, Serialize};

use crate::error::CommandError;
use crate::hsi::HsiService;

const STORE_DEADLINE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Dial,
    Hangup,
}

impl Action {
    fn as_str(self) -> &'static str {
        match self {
            Self::Dial => "dial",
            Self::Hangup => "hangup",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub action: Action,
    pub user_id: String,
    pub vlan: String,
    pub account: String,
    pub password: String,
    pub timestamp: String,
}

pub struct CommandPublisher<S: StoreAdapter> {
    store: Arc<S>,
    hsi: Arc<HsiService<S>>,
}

impl<S: StoreAdapter> CommandPublisher<S> {
    pub fn new(store: Arc<S>, hsi: Arc<HsiService<S>>) -> Self {
        Self { store, hsi }
    }

    /// Both dial and hangup require the HSI record to exist; the envelope
    /// is filled from it so the node receives a self-contained command.
    /// Latest-writer-wins — re-publishing simply overwrites the prior
    /// envelope (spec §4.F). Never waits for the node to acknowledge.
    pub async fn publish(&self, node_id: &str, user_id: &str, action: Action) -> Result<(), CommandError> {
        let record = self.hsi.get(node_id, user_id).await.map_err(|_| CommandError::NoHsiRecord {
            node_id: node_id.to_string(),
            user_id: user_id.to_string(),
        })?;

        let envelope = CommandEnvelope {
            action,
            user_id: user_id.to_string(),
            vlan: record.config.vlan_id,
            account: record.config.account,
            password: record.config.password,
            timestamp: Utc::now().to_rfc3339(),
        };
        let key = format!("commands/{node_id}/pppoe_{}_{user_id}", action.as_str());
        let value = serde_json::to_vec(&envelope).map_err(|e| {
            tracing::error!(error = %e, "failed to serialize command envelope");
            CommandError::NoHsiRecord { node_id: node_id.to_string(), user_id: user_id.to_string() }
        })?;
        self.store.put(&key, &value, PutOptions::default(), STORE_DEADLINE).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hsi::HsiConfig;
    use crate::subscriber_count::SubscriberCountRegistry;
    use gwctl_store::MemoryStore;

    fn setup() -> (Arc<MemoryStore>, CommandPublisher<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let counts = Arc::new(SubscriberCountRegistry::new(Arc::clone(&store)));
        let hsi = Arc::new(HsiService::new(Arc::clone(&store), counts));
        let publisher = CommandPublisher::new(Arc::clone(&store), hsi);
        (store, publisher)
    }

    #[tokio::test]
    async fn dial_without_hsi_record_fails() {
        let (_store, publisher) = setup();
        let err = publisher.publish("n1", "1", Action::Dial).await.unwrap_err();
        assert!(matches!(err, CommandError::NoHsiRecord { .. }));
    }

    #[tokio::test]
    async fn dial_writes_envelope_from_hsi_record() {
        let (store, publisher) = setup();
        publisher
            .hsi
            .create_or_update(
                "n1",
                "1",
                HsiConfig {
                    user_id: "1".to_string(),
                    vlan_id: "100".to_string(),
                    account: "a".to_string(),
                    password: "p".to_string(),
                    pool_start: "10.0.0.10".to_string(),
                    pool_end: "10.0.0.20".to_string(),
                    dhcp_subnet: "255.255.255.0".to_string(),
                    dhcp_gateway: "10.0.0.1".to_string(),
                },
                "admin",
            )
            .await
            .unwrap();

        publisher.publish("n1", "1", Action::Dial).await.unwrap();
        let raw = store.get("commands/n1/pppoe_dial_1", Duration::from_secs(1)).await.unwrap().unwrap();
        let envelope: CommandEnvelope = serde_json::from_slice(&raw).unwrap();
        assert_eq!(envelope.vlan, "100");
        assert_eq!(envelope.account, "a");
    }
}
