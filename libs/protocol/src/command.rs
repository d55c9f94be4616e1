//! Commands and the command envelope

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use model::ids::{AccountId, MemberId, ZoneId};
use model::key::PublicKey;
use model::metadata::Metadata;
use model::numeric::decimal_string;
use model::zone::{Account, Member};

/// A command addressed to a zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ZoneCommand {
    /// Create the zone, its equity owner member, and its equity account.
    CreateZone {
        equity_owner_public_key: PublicKey,
        equity_owner_name: Option<String>,
        equity_owner_metadata: Option<Metadata>,
        equity_account_name: Option<String>,
        equity_account_metadata: Option<Metadata>,
        name: Option<String>,
        metadata: Option<Metadata>,
    },

    /// Register the sending client for notifications.
    JoinZone,

    /// Deregister the sending client.
    QuitZone,

    /// Replace the zone's name.
    ChangeZoneName { name: Option<String> },

    CreateMember {
        owner_public_keys: BTreeSet<PublicKey>,
        name: Option<String>,
        metadata: Option<Metadata>,
    },

    /// Replace an existing member wholesale. The caller must own it.
    UpdateMember { member: Member },

    CreateAccount {
        owner_member_ids: BTreeSet<MemberId>,
        name: Option<String>,
        metadata: Option<Metadata>,
    },

    /// Replace an existing account, acting as one of its owner members.
    UpdateAccount { acting_as: MemberId, account: Account },

    /// Transfer value between two accounts, acting as a member with debit
    /// rights on the source.
    AddTransaction {
        acting_as: MemberId,
        from: AccountId,
        to: AccountId,
        #[serde(with = "decimal_string")]
        value: Decimal,
        description: Option<String>,
        metadata: Option<Metadata>,
    },
}

impl ZoneCommand {
    /// Command kind as a string label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            ZoneCommand::CreateZone { .. } => "CreateZone",
            ZoneCommand::JoinZone => "JoinZone",
            ZoneCommand::QuitZone => "QuitZone",
            ZoneCommand::ChangeZoneName { .. } => "ChangeZoneName",
            ZoneCommand::CreateMember { .. } => "CreateMember",
            ZoneCommand::UpdateMember { .. } => "UpdateMember",
            ZoneCommand::CreateAccount { .. } => "CreateAccount",
            ZoneCommand::UpdateAccount { .. } => "UpdateAccount",
            ZoneCommand::AddTransaction { .. } => "AddTransaction",
        }
    }
}

/// Transport wrapper around a command, carrying routing metadata.
///
/// `public_key` is the caller identity resolved by the gateway;
/// `reply_to` names the connection the response must be delivered to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneCommandEnvelope {
    pub remote_address: Option<String>,
    pub public_key: PublicKey,
    pub correlation_id: i64,
    pub reply_to: String,
    pub zone_id: ZoneId,
    pub command: ZoneCommand,
}
