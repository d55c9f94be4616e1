//! Active-zone status publication
//!
//! Each validator periodically publishes a summary of its zone to the
//! cluster-wide `zone-status` topic, and refreshes it after every accepted
//! command. The Zone Monitor subscribes and aggregates the summaries into a
//! view of every active zone.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::debug;

use model::ids::{AccountId, MemberId, TransactionId, ZoneId};
use model::key::PublicKey;
use model::metadata::Metadata;
use model::zone::{Account, Member, Transaction};

use crate::state::ZoneState;

/// Name of the cluster-wide status topic.
pub const STATUS_TOPIC: &str = "zone-status";

/// Snapshot of one active zone, published on the status topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveZoneSummary {
    pub zone_id: ZoneId,
    pub members: BTreeMap<MemberId, Member>,
    pub accounts: BTreeMap<AccountId, Account>,
    pub transactions: BTreeMap<TransactionId, Transaction>,
    pub metadata: Option<Metadata>,
    pub client_public_keys: BTreeSet<PublicKey>,
}

impl ActiveZoneSummary {
    /// Summarize a zone's current state. Returns `None` before creation.
    pub fn of(state: &ZoneState) -> Option<Self> {
        let zone = state.zone.as_ref()?;
        Some(Self {
            zone_id: zone.id,
            members: zone.members.clone(),
            accounts: zone.accounts.clone(),
            transactions: zone.transactions.clone(),
            metadata: zone.metadata.clone(),
            client_public_keys: state.connected_clients.values().cloned().collect(),
        })
    }
}

/// Messages carried on the status topic.
#[derive(Debug, Clone)]
pub enum StatusMessage {
    UpsertActiveZoneSummary(ActiveZoneSummary),
}

/// The `zone-status` publish/subscribe topic. Delivery is best-effort and
/// unordered across zones; each summary supersedes the previous one for its
/// zone id.
#[derive(Clone)]
pub struct StatusTopic {
    tx: broadcast::Sender<StatusMessage>,
}

impl StatusTopic {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, message: StatusMessage) {
        // A send error just means nobody is subscribed right now.
        let _ = self.tx.send(message);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusMessage> {
        self.tx.subscribe()
    }
}

impl Default for StatusTopic {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Aggregates status summaries into a cluster-wide view of active zones.
pub struct ZoneMonitor {
    summaries: Mutex<BTreeMap<ZoneId, ActiveZoneSummary>>,
}

impl ZoneMonitor {
    /// Spawn a monitor subscribed to the topic.
    pub fn spawn(topic: &StatusTopic) -> Arc<Self> {
        let monitor = Arc::new(Self {
            summaries: Mutex::new(BTreeMap::new()),
        });
        let mut rx = topic.subscribe();
        let aggregator = Arc::clone(&monitor);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(StatusMessage::UpsertActiveZoneSummary(summary)) => {
                        debug!(zone_id = %summary.zone_id, "zone summary upserted");
                        aggregator
                            .summaries
                            .lock()
                            .expect("zone monitor lock poisoned")
                            .insert(summary.zone_id, summary);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "zone monitor lagged behind status topic");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        monitor
    }

    /// Ids of every zone seen on the topic.
    pub fn active_zones(&self) -> Vec<ZoneId> {
        self.summaries
            .lock()
            .expect("zone monitor lock poisoned")
            .keys()
            .copied()
            .collect()
    }

    /// The latest summary for a zone, if one has been published.
    pub fn summary(&self, zone_id: &ZoneId) -> Option<ActiveZoneSummary> {
        self.summaries
            .lock()
            .expect("zone monitor lock poisoned")
            .get(zone_id)
            .cloned()
    }
}
