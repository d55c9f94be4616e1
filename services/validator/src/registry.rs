//! Connected-client registry and notification delivery
//!
//! Tracks connected clients in insertion order and assigns each one its
//! notification sequence numbers: starting at 0 on join, incremented per
//! delivered notification, discarded on quit. Sequence numbers are strictly
//! monotonic per (zone, client) with no holes, so receivers can detect gaps.

use tokio::sync::mpsc::UnboundedSender;

use model::ids::{ClientHandle, ZoneId};
use model::key::PublicKey;
use protocol::notification::{ZoneNotification, ZoneNotificationEnvelope};
use protocol::response::ZoneResponseEnvelope;

/// What the validator pushes down a client's connection.
#[derive(Debug, Clone)]
pub enum ClientDelivery {
    Response(ZoneResponseEnvelope),
    Notification(ZoneNotificationEnvelope),
}

struct ClientEntry {
    handle: ClientHandle,
    public_key: PublicKey,
    tx: UnboundedSender<ClientDelivery>,
    next_sequence: u64,
}

/// Connected clients of one zone, in insertion order.
#[derive(Default)]
pub struct ClientRegistry {
    clients: Vec<ClientEntry>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client. A re-join under the same handle replaces the
    /// connection and restarts its sequence numbers at 0.
    pub fn join(
        &mut self,
        handle: ClientHandle,
        public_key: PublicKey,
        tx: UnboundedSender<ClientDelivery>,
    ) {
        self.clients.retain(|c| c.handle != handle);
        self.clients.push(ClientEntry {
            handle,
            public_key,
            tx,
            next_sequence: 0,
        });
    }

    /// Deregister a client, returning its public key if it was connected.
    pub fn quit(&mut self, handle: &ClientHandle) -> Option<PublicKey> {
        let position = self.clients.iter().position(|c| c.handle == *handle)?;
        Some(self.clients.remove(position).public_key)
    }

    pub fn contains(&self, handle: &ClientHandle) -> bool {
        self.clients.iter().any(|c| c.handle == *handle)
    }

    pub fn public_key_of(&self, handle: &ClientHandle) -> Option<PublicKey> {
        self.clients
            .iter()
            .find(|c| c.handle == *handle)
            .map(|c| c.public_key.clone())
    }

    /// Whether `tx` is the connection currently registered under `handle`.
    /// A watcher for a superseded connection must not evict its successor.
    pub fn is_same_connection(
        &self,
        handle: &ClientHandle,
        tx: &UnboundedSender<ClientDelivery>,
    ) -> bool {
        self.clients
            .iter()
            .any(|c| c.handle == *handle && c.tx.same_channel(tx))
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Send a notification to every connected client in insertion order,
    /// numbering it with each client's next sequence number.
    ///
    /// Send failures are ignored here: a failed send means the connection is
    /// gone, and the liveness watcher delivers the disconnect separately.
    pub fn broadcast(&mut self, origin: &str, zone_id: ZoneId, notification: ZoneNotification) {
        for client in &mut self.clients {
            let envelope = ZoneNotificationEnvelope {
                origin: origin.to_string(),
                zone_id,
                sequence_number: client.next_sequence,
                notification: notification.clone(),
            };
            let _ = client.tx.send(ClientDelivery::Notification(envelope));
            client.next_sequence += 1;
        }
    }
}
