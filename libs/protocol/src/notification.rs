//! Client notifications and the notification envelope
//!
//! Every accepted event fans out to the currently connected clients as a
//! notification, numbered per (zone, client) so receivers can detect gaps
//! and reordering.

use serde::{Deserialize, Serialize};

use model::ids::{ClientHandle, ZoneId};
use model::key::PublicKey;
use model::zone::{Account, Member, Transaction};

/// A state-change notification delivered to connected clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ZoneNotification {
    ClientJoined {
        handle: ClientHandle,
        public_key: PublicKey,
    },
    ClientQuit {
        handle: ClientHandle,
        public_key: PublicKey,
    },
    ZoneNameChanged {
        name: Option<String>,
    },
    MemberCreated {
        member: Member,
    },
    MemberUpdated {
        member: Member,
    },
    AccountCreated {
        account: Account,
    },
    /// Carries the member the update was performed as; for events that
    /// predate `acting_as`, the owner with the minimum id.
    AccountUpdated {
        acting_as: Member,
        account: Account,
    },
    TransactionAdded {
        transaction: Transaction,
    },
}

/// Transport wrapper around a notification.
///
/// `sequence_number` is strictly monotonic per (zone, client) with no holes,
/// starting at 0 when the client joins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneNotificationEnvelope {
    /// Identity of the validator instance that produced the notification.
    pub origin: String,
    pub zone_id: ZoneId,
    pub sequence_number: u64,
    pub notification: ZoneNotification,
}
