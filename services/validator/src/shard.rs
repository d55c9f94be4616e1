//! Zone-to-validator routing
//!
//! Hashes zone ids across a fixed shard count and keeps at most one live
//! validator per zone. Validators are spawned lazily on first delivery
//! (replaying their journal) and respawned transparently after passivation;
//! a rebalance stop removes the entry and tells the validator to finish and
//! terminate.

use dashmap::DashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{info, warn};

use journal::EventJournal;
use model::ids::ZoneId;
use protocol::command::ZoneCommandEnvelope;
use protocol::response::{ZoneResponse, ZoneResponseEnvelope};

use crate::actor::{self, ClientEndpoint, ZoneHandle, ZoneMessage};
use crate::registry::ClientDelivery;
use crate::status::StatusTopic;
use crate::ValidatorConfig;

/// Fixed shard count for the cluster.
pub const MAX_SHARDS: u64 = 10;

/// The shard a zone lives on.
pub fn shard_id(zone_id: &ZoneId) -> u64 {
    let mut hasher = DefaultHasher::new();
    zone_id.to_string().hash(&mut hasher);
    hasher.finish() % MAX_SHARDS
}

/// Routes command envelopes to the unique validator instance owning each
/// zone.
pub struct ShardRouter {
    journal: Arc<dyn EventJournal>,
    topic: StatusTopic,
    config: ValidatorConfig,
    zones: DashMap<ZoneId, ZoneHandle>,
}

impl ShardRouter {
    pub fn new(journal: Arc<dyn EventJournal>, topic: StatusTopic, config: ValidatorConfig) -> Self {
        Self {
            journal,
            topic,
            config,
            zones: DashMap::new(),
        }
    }

    /// Deliver a command envelope to its zone's validator, spawning or
    /// respawning the validator as needed.
    pub fn deliver(&self, envelope: ZoneCommandEnvelope, endpoint: ClientEndpoint) {
        let zone_id = envelope.zone_id;
        let mut message = ZoneMessage::Command { envelope, endpoint };
        for _ in 0..2 {
            let handle = self
                .zones
                .entry(zone_id)
                .or_insert_with(|| {
                    info!(%zone_id, shard = shard_id(&zone_id), "starting zone validator");
                    actor::spawn(
                        zone_id,
                        Arc::clone(&self.journal),
                        self.topic.clone(),
                        self.config.clone(),
                    )
                })
                .clone();
            match handle.tx.send(message) {
                Ok(()) => return,
                Err(returned) => {
                    // Stale handle from a passivated or crashed validator.
                    self.zones.remove(&zone_id);
                    message = returned.0;
                }
            }
        }
        if let ZoneMessage::Command { envelope, endpoint } = message {
            warn!(%zone_id, "zone validator unavailable, rejecting command");
            let _ = endpoint.tx.send(ClientDelivery::Response(ZoneResponseEnvelope {
                correlation_id: envelope.correlation_id,
                response: ZoneResponse::Unavailable,
            }));
        }
    }

    /// Rebalance: tell a zone's validator to finish in-flight work and
    /// terminate. The next delivery spawns a fresh instance from the journal.
    pub fn stop_zone(&self, zone_id: &ZoneId) -> bool {
        match self.zones.remove(zone_id) {
            Some((_, handle)) => {
                info!(%zone_id, "stopping zone validator for hand-off");
                let _ = handle.tx.send(ZoneMessage::Stop);
                true
            }
            None => false,
        }
    }

    /// Number of validators whose tasks are still running.
    pub fn live_zones(&self) -> usize {
        self.zones
            .iter()
            .filter(|entry| !entry.value().is_closed())
            .count()
    }
}
