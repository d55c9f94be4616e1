//! Zone state and the event applier
//!
//! `apply` is the only way state changes, on the live path and on replay
//! alike, so a validator rebuilt from the journal is indistinguishable from
//! the one that wrote it. The applier is total over the event set and never
//! fails; anything that could fail was rejected at validation time.

use rust_decimal::Decimal;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use model::ids::{AccountId, ClientHandle};
use model::key::PublicKey;
use model::zone::Zone;
use protocol::event::{ZoneEvent, ZoneEventEnvelope};

/// In-memory state of one zone.
///
/// `connected_clients` is session state, not ledger state: it is rebuilt
/// from live joins only and cleared after replay.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ZoneState {
    pub zone: Option<Zone>,
    pub balances: BTreeMap<AccountId, Decimal>,
    pub connected_clients: BTreeMap<ClientHandle, PublicKey>,
}

impl ZoneState {
    /// Current balance of an account (zero when absent).
    pub fn balance(&self, account_id: &AccountId) -> Decimal {
        self.balances.get(account_id).copied().unwrap_or_default()
    }

    /// Drop session state after a journal replay: the handles recorded in
    /// old join events refer to connections that did not survive the
    /// restart, so clients must rejoin.
    pub fn after_recovery(&mut self) {
        self.connected_clients.clear();
    }

    /// Deterministic SHA-256 fingerprint of the state.
    pub fn fingerprint(&self) -> String {
        let bytes = bincode::serialize(self).expect("ZoneState serialization cannot fail");
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        format!("{:x}", hasher.finalize())
    }

    /// Check the structural invariants that must hold after every applied
    /// event. Returns a description of the first violation found.
    pub fn check_invariants(&self) -> Result<(), String> {
        let zone = match &self.zone {
            None => {
                if !self.balances.is_empty() || !self.connected_clients.is_empty() {
                    return Err("zone absent but balances or clients present".into());
                }
                return Ok(());
            }
            Some(zone) => zone,
        };

        if !zone.accounts.contains_key(&zone.equity_account_id) {
            return Err(format!(
                "equity account {} missing",
                zone.equity_account_id
            ));
        }
        for (id, account) in &zone.accounts {
            for owner in &account.owner_member_ids {
                if !zone.members.contains_key(owner) {
                    return Err(format!("account {} owned by missing member {}", id, owner));
                }
            }
        }
        for (id, transaction) in &zone.transactions {
            if !zone.accounts.contains_key(&transaction.from)
                || !zone.accounts.contains_key(&transaction.to)
            {
                return Err(format!("transaction {} references a missing account", id));
            }
            if !zone.members.contains_key(&transaction.creator) {
                return Err(format!("transaction {} created by a missing member", id));
            }
        }

        if self.balances.len() != zone.accounts.len()
            || !zone.accounts.keys().all(|id| self.balances.contains_key(id))
        {
            return Err("balances do not cover exactly the zone's accounts".into());
        }
        let sum: Decimal = self.balances.values().copied().sum();
        if sum != Decimal::ZERO {
            return Err(format!("balance sum is {}, not zero", sum));
        }
        for (id, balance) in &self.balances {
            if *id != zone.equity_account_id && *balance < Decimal::ZERO {
                return Err(format!("non-equity account {} is negative: {}", id, balance));
            }
        }

        for i in 0..zone.members.len() {
            if !zone.members.contains_key(&model::ids::MemberId::from_index(i)) {
                return Err(format!("member ids are not the contiguous range 0..{}", i));
            }
        }
        for i in 0..zone.accounts.len() {
            if !zone.accounts.contains_key(&AccountId::from_index(i)) {
                return Err(format!("account ids are not the contiguous range 0..{}", i));
            }
        }

        Ok(())
    }
}

/// Fold one persisted event into the state.
pub fn apply(state: &mut ZoneState, envelope: &ZoneEventEnvelope) {
    match &envelope.event {
        ZoneEvent::ZoneCreated { zone } => {
            state.balances = zone
                .accounts
                .keys()
                .map(|id| (id.clone(), Decimal::ZERO))
                .collect();
            state.zone = Some(zone.clone());
        }
        ZoneEvent::ClientJoined { handle } => {
            if let Some(public_key) = &envelope.public_key {
                state
                    .connected_clients
                    .insert(handle.clone(), public_key.clone());
            }
        }
        ZoneEvent::ClientQuit { handle } => {
            state.connected_clients.remove(handle);
        }
        ZoneEvent::ZoneNameChanged { name } => {
            if let Some(zone) = &mut state.zone {
                zone.name = name.clone();
            }
        }
        ZoneEvent::MemberCreated { member } | ZoneEvent::MemberUpdated { member } => {
            if let Some(zone) = &mut state.zone {
                zone.members.insert(member.id.clone(), member.clone());
            }
        }
        ZoneEvent::AccountCreated { account } => {
            if let Some(zone) = &mut state.zone {
                zone.accounts.insert(account.id.clone(), account.clone());
                state.balances.insert(account.id.clone(), Decimal::ZERO);
            }
        }
        ZoneEvent::AccountUpdated { account, .. } => {
            if let Some(zone) = &mut state.zone {
                zone.accounts.insert(account.id.clone(), account.clone());
            }
        }
        ZoneEvent::TransactionAdded { transaction } => {
            if let Some(zone) = &mut state.zone {
                *state
                    .balances
                    .entry(transaction.from.clone())
                    .or_insert(Decimal::ZERO) -= transaction.value;
                *state
                    .balances
                    .entry(transaction.to.clone())
                    .or_insert(Decimal::ZERO) += transaction.value;
                zone.transactions
                    .insert(transaction.id.clone(), transaction.clone());
            }
        }
    }
}

/// Rebuild state by folding envelopes in persisted order.
pub fn replay<'a>(envelopes: impl IntoIterator<Item = &'a ZoneEventEnvelope>) -> ZoneState {
    let mut state = ZoneState::default();
    for envelope in envelopes {
        apply(&mut state, envelope);
    }
    state.after_recovery();
    state
}
