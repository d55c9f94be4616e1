//! Persisted events and the event envelope
//!
//! Events are the durable record of a zone. The envelope carries the caller
//! context captured at acceptance time; the journal assigns sequence numbers
//! on top.

use serde::{Deserialize, Serialize};

use model::ids::{ClientHandle, MemberId};
use model::key::PublicKey;
use model::zone::{Account, Member, Transaction, Zone};

/// A state change accepted by a zone's validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ZoneEvent {
    ZoneCreated { zone: Zone },
    ClientJoined { handle: ClientHandle },
    ClientQuit { handle: ClientHandle },
    ZoneNameChanged { name: Option<String> },
    MemberCreated { member: Member },
    MemberUpdated { member: Member },
    AccountCreated { account: Account },
    /// `acting_as` is absent on events written before it was recorded.
    AccountUpdated {
        acting_as: Option<MemberId>,
        account: Account,
    },
    TransactionAdded { transaction: Transaction },
}

impl ZoneEvent {
    /// Event kind as a string label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            ZoneEvent::ZoneCreated { .. } => "ZoneCreated",
            ZoneEvent::ClientJoined { .. } => "ClientJoined",
            ZoneEvent::ClientQuit { .. } => "ClientQuit",
            ZoneEvent::ZoneNameChanged { .. } => "ZoneNameChanged",
            ZoneEvent::MemberCreated { .. } => "MemberCreated",
            ZoneEvent::MemberUpdated { .. } => "MemberUpdated",
            ZoneEvent::AccountCreated { .. } => "AccountCreated",
            ZoneEvent::AccountUpdated { .. } => "AccountUpdated",
            ZoneEvent::TransactionAdded { .. } => "TransactionAdded",
        }
    }
}

/// The persisted wrapper around an event: caller context plus a wall-clock
/// timestamp. Journal sequence numbers, not these timestamps, are the
/// authoritative order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneEventEnvelope {
    pub remote_address: Option<String>,
    pub public_key: Option<PublicKey>,
    pub timestamp: i64,
    pub event: ZoneEvent,
}

impl ZoneEventEnvelope {
    /// Serialize to the journal payload form.
    pub fn to_payload(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from the journal payload form.
    pub fn from_payload(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}
