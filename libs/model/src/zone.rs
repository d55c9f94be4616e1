//! Zone entity model
//!
//! A zone is a self-contained ledger: members (identified by their public
//! keys), accounts (owned by members), and transactions between accounts.
//! One designated equity account is the source of new money and the only
//! account allowed to hold a negative balance.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::ids::{AccountId, MemberId, TransactionId, ZoneId};
use crate::key::PublicKey;
use crate::metadata::Metadata;
use crate::numeric::decimal_string;
use crate::ZONE_LIFETIME_MILLIS;

/// A member of a zone, identified by one or more RSA public keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub owner_public_keys: BTreeSet<PublicKey>,
    pub name: Option<String>,
    pub metadata: Option<Metadata>,
}

/// An account within a zone, owned by one or more members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub owner_member_ids: BTreeSet<MemberId>,
    pub name: Option<String>,
    pub metadata: Option<Metadata>,
}

/// A transfer of value between two distinct accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub from: AccountId,
    pub to: AccountId,
    #[serde(with = "decimal_string")]
    pub value: Decimal,
    pub creator: MemberId,
    pub created: i64,
    pub description: Option<String>,
    pub metadata: Option<Metadata>,
}

/// A zone: the authoritative ledger of members, accounts, and transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub equity_account_id: AccountId,
    pub members: BTreeMap<MemberId, Member>,
    pub accounts: BTreeMap<AccountId, Account>,
    pub transactions: BTreeMap<TransactionId, Transaction>,
    pub created: i64,
    pub expires: i64,
    pub name: Option<String>,
    pub metadata: Option<Metadata>,
}

impl Zone {
    /// Build a fresh zone with its equity owner member (id `"0"`) and equity
    /// account (id `"0"`, owned by that member).
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        id: ZoneId,
        equity_owner_public_key: PublicKey,
        equity_owner_name: Option<String>,
        equity_owner_metadata: Option<Metadata>,
        equity_account_name: Option<String>,
        equity_account_metadata: Option<Metadata>,
        created: i64,
        name: Option<String>,
        metadata: Option<Metadata>,
    ) -> Self {
        let member_id = MemberId::from_index(0);
        let account_id = AccountId::from_index(0);
        let equity_owner = Member {
            id: member_id.clone(),
            owner_public_keys: BTreeSet::from([equity_owner_public_key]),
            name: equity_owner_name,
            metadata: equity_owner_metadata,
        };
        let equity_account = Account {
            id: account_id.clone(),
            owner_member_ids: BTreeSet::from([member_id.clone()]),
            name: equity_account_name,
            metadata: equity_account_metadata,
        };
        Self {
            id,
            equity_account_id: account_id.clone(),
            members: BTreeMap::from([(member_id, equity_owner)]),
            accounts: BTreeMap::from([(account_id, equity_account)]),
            transactions: BTreeMap::new(),
            created,
            expires: created + ZONE_LIFETIME_MILLIS,
            name,
            metadata,
        }
    }

    /// The id the next created member will receive: the decimal form of the
    /// current map size.
    pub fn next_member_id(&self) -> MemberId {
        MemberId::from_index(self.members.len())
    }

    /// The id the next created account will receive.
    pub fn next_account_id(&self) -> AccountId {
        AccountId::from_index(self.accounts.len())
    }

    /// The id the next added transaction will receive.
    pub fn next_transaction_id(&self) -> TransactionId {
        TransactionId::from_index(self.transactions.len())
    }

    /// Whether the given key is among a member's owner keys.
    pub fn member_owned_by(&self, member_id: &MemberId, key: &PublicKey) -> bool {
        self.members
            .get(member_id)
            .map(|m| m.owner_public_keys.contains(key))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_zone(created: i64) -> Zone {
        Zone::create(
            ZoneId::generate(),
            PublicKey::new(vec![1, 2, 3]),
            Some("Dave".to_string()),
            None,
            None,
            None,
            created,
            Some("Dave's Game".to_string()),
            None,
        )
    }

    #[test]
    fn test_create_assigns_zero_ids() {
        let zone = test_zone(1_514_156_286_183);
        assert_eq!(zone.equity_account_id.as_str(), "0");
        assert!(zone.members.contains_key(&MemberId::from_index(0)));
        assert!(zone.accounts.contains_key(&AccountId::from_index(0)));
        assert!(zone.transactions.is_empty());
    }

    #[test]
    fn test_create_sets_expiry_from_lifetime() {
        let created = 1_514_156_286_183;
        let zone = test_zone(created);
        assert_eq!(zone.created, created);
        assert_eq!(zone.expires, created + ZONE_LIFETIME_MILLIS);
    }

    #[test]
    fn test_equity_account_owned_by_equity_owner() {
        let zone = test_zone(0);
        let account = &zone.accounts[&zone.equity_account_id];
        assert!(account.owner_member_ids.contains(&MemberId::from_index(0)));
        assert!(zone.member_owned_by(&MemberId::from_index(0), &PublicKey::new(vec![1, 2, 3])));
        assert!(!zone.member_owned_by(&MemberId::from_index(0), &PublicKey::new(vec![9])));
    }

    #[test]
    fn test_next_ids_track_map_sizes() {
        let mut zone = test_zone(0);
        assert_eq!(zone.next_member_id().as_str(), "1");
        let id = zone.next_member_id();
        zone.members.insert(
            id.clone(),
            Member {
                id,
                owner_public_keys: BTreeSet::from([PublicKey::new(vec![4])]),
                name: None,
                metadata: None,
            },
        );
        assert_eq!(zone.next_member_id().as_str(), "2");
    }

    #[test]
    fn test_zone_json_roundtrip() {
        let zone = test_zone(42);
        let json = serde_json::to_string(&zone).unwrap();
        let back: Zone = serde_json::from_str(&json).unwrap();
        assert_eq!(zone, back);
    }
}
