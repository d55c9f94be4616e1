//! Command dispatch decisions
//!
//! The synchronous heart of the validator: given current state and a
//! command, decide whether to reject, answer idempotently, or accept an
//! event. No IO happens here; the actor shell persists accepted events and
//! only then derives the response and notification from the applied state.
//!
//! Redelivery idempotence: a command whose application would leave state
//! unchanged is answered with the current success value and persists
//! nothing, which makes retries after transport errors safe.

use model::errors::ZoneError;
use model::ids::{ClientHandle, ZoneId};
use model::key::PublicKey;
use model::zone::{Account, Member, Transaction, Zone};
use protocol::command::ZoneCommand;
use protocol::event::ZoneEvent;
use protocol::notification::ZoneNotification;
use protocol::response::{JoinedZone, ZoneResponse};

use crate::state::ZoneState;
use crate::validate;

/// Outcome of dispatching a command against current state.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Validation failed; answer with the errors, persist nothing.
    Reject(Vec<ZoneError>),
    /// Applying would change nothing; answer with the current success value,
    /// persist nothing.
    Idempotent(ZoneResponse),
    /// Persist this event, apply it, then respond and notify.
    Accept(ZoneEvent),
}

/// Decide what a command does. `now` is the wall-clock instant the command
/// is being processed, used for created/expiry stamps.
pub fn decide(
    state: &ZoneState,
    caller: &PublicKey,
    handle: &ClientHandle,
    zone_id: ZoneId,
    command: &ZoneCommand,
    now: i64,
) -> Decision {
    if let Err(errors) = validate::validate_command(state, caller, command) {
        return Decision::Reject(errors);
    }

    match command {
        ZoneCommand::CreateZone {
            equity_owner_public_key,
            equity_owner_name,
            equity_owner_metadata,
            equity_account_name,
            equity_account_metadata,
            name,
            metadata,
        } => match &state.zone {
            Some(zone) => Decision::Idempotent(ZoneResponse::CreateZone {
                result: Ok(zone.clone()),
            }),
            None => Decision::Accept(ZoneEvent::ZoneCreated {
                zone: Zone::create(
                    zone_id,
                    equity_owner_public_key.clone(),
                    equity_owner_name.clone(),
                    equity_owner_metadata.clone(),
                    equity_account_name.clone(),
                    equity_account_metadata.clone(),
                    now,
                    name.clone(),
                    metadata.clone(),
                ),
            }),
        },

        ZoneCommand::JoinZone => {
            if state.connected_clients.contains_key(handle) {
                Decision::Idempotent(ZoneResponse::JoinZone {
                    result: Ok(joined_zone(state)),
                })
            } else {
                Decision::Accept(ZoneEvent::ClientJoined {
                    handle: handle.clone(),
                })
            }
        }

        ZoneCommand::QuitZone => {
            if state.connected_clients.contains_key(handle) {
                Decision::Accept(ZoneEvent::ClientQuit {
                    handle: handle.clone(),
                })
            } else {
                Decision::Idempotent(ZoneResponse::QuitZone { result: Ok(()) })
            }
        }

        ZoneCommand::ChangeZoneName { name } => {
            let zone = state.zone.as_ref().expect("validated: zone present");
            if zone.name == *name {
                Decision::Idempotent(ZoneResponse::ChangeZoneName { result: Ok(()) })
            } else {
                Decision::Accept(ZoneEvent::ZoneNameChanged { name: name.clone() })
            }
        }

        ZoneCommand::CreateMember {
            owner_public_keys,
            name,
            metadata,
        } => {
            let zone = state.zone.as_ref().expect("validated: zone present");
            Decision::Accept(ZoneEvent::MemberCreated {
                member: Member {
                    id: zone.next_member_id(),
                    owner_public_keys: owner_public_keys.clone(),
                    name: name.clone(),
                    metadata: metadata.clone(),
                },
            })
        }

        ZoneCommand::UpdateMember { member } => {
            let zone = state.zone.as_ref().expect("validated: zone present");
            if zone.members.get(&member.id) == Some(member) {
                Decision::Idempotent(ZoneResponse::UpdateMember { result: Ok(()) })
            } else {
                Decision::Accept(ZoneEvent::MemberUpdated {
                    member: member.clone(),
                })
            }
        }

        ZoneCommand::CreateAccount {
            owner_member_ids,
            name,
            metadata,
        } => {
            let zone = state.zone.as_ref().expect("validated: zone present");
            Decision::Accept(ZoneEvent::AccountCreated {
                account: Account {
                    id: zone.next_account_id(),
                    owner_member_ids: owner_member_ids.clone(),
                    name: name.clone(),
                    metadata: metadata.clone(),
                },
            })
        }

        ZoneCommand::UpdateAccount { acting_as, account } => {
            let zone = state.zone.as_ref().expect("validated: zone present");
            if zone.accounts.get(&account.id) == Some(account) {
                Decision::Idempotent(ZoneResponse::UpdateAccount { result: Ok(()) })
            } else {
                Decision::Accept(ZoneEvent::AccountUpdated {
                    acting_as: Some(acting_as.clone()),
                    account: account.clone(),
                })
            }
        }

        ZoneCommand::AddTransaction {
            acting_as,
            from,
            to,
            value,
            description,
            metadata,
        } => {
            let zone = state.zone.as_ref().expect("validated: zone present");
            Decision::Accept(ZoneEvent::TransactionAdded {
                transaction: Transaction {
                    id: zone.next_transaction_id(),
                    from: from.clone(),
                    to: to.clone(),
                    value: *value,
                    creator: acting_as.clone(),
                    created: now,
                    description: description.clone(),
                    metadata: metadata.clone(),
                },
            })
        }
    }
}

/// The failure response matching a command's kind.
pub fn failure_response(command: &ZoneCommand, errors: Vec<ZoneError>) -> ZoneResponse {
    match command {
        ZoneCommand::CreateZone { .. } => ZoneResponse::CreateZone {
            result: Err(errors),
        },
        ZoneCommand::JoinZone => ZoneResponse::JoinZone {
            result: Err(errors),
        },
        ZoneCommand::QuitZone => ZoneResponse::QuitZone {
            result: Err(errors),
        },
        ZoneCommand::ChangeZoneName { .. } => ZoneResponse::ChangeZoneName {
            result: Err(errors),
        },
        ZoneCommand::CreateMember { .. } => ZoneResponse::CreateMember {
            result: Err(errors),
        },
        ZoneCommand::UpdateMember { .. } => ZoneResponse::UpdateMember {
            result: Err(errors),
        },
        ZoneCommand::CreateAccount { .. } => ZoneResponse::CreateAccount {
            result: Err(errors),
        },
        ZoneCommand::UpdateAccount { .. } => ZoneResponse::UpdateAccount {
            result: Err(errors),
        },
        ZoneCommand::AddTransaction { .. } => ZoneResponse::AddTransaction {
            result: Err(errors),
        },
    }
}

/// The success response for an accepted event, derived from the state the
/// event has already been applied to.
pub fn success_response(state: &ZoneState, event: &ZoneEvent) -> ZoneResponse {
    match event {
        ZoneEvent::ZoneCreated { zone } => ZoneResponse::CreateZone {
            result: Ok(zone.clone()),
        },
        ZoneEvent::ClientJoined { .. } => ZoneResponse::JoinZone {
            result: Ok(joined_zone(state)),
        },
        ZoneEvent::ClientQuit { .. } => ZoneResponse::QuitZone { result: Ok(()) },
        ZoneEvent::ZoneNameChanged { .. } => ZoneResponse::ChangeZoneName { result: Ok(()) },
        ZoneEvent::MemberCreated { member } => ZoneResponse::CreateMember {
            result: Ok(member.clone()),
        },
        ZoneEvent::MemberUpdated { .. } => ZoneResponse::UpdateMember { result: Ok(()) },
        ZoneEvent::AccountCreated { account } => ZoneResponse::CreateAccount {
            result: Ok(account.clone()),
        },
        ZoneEvent::AccountUpdated { .. } => ZoneResponse::UpdateAccount { result: Ok(()) },
        ZoneEvent::TransactionAdded { transaction } => ZoneResponse::AddTransaction {
            result: Ok(transaction.clone()),
        },
    }
}

/// The notification broadcast for an accepted event, if any. `envelope_key`
/// is the public key recorded on the persisted envelope.
pub fn notification(
    state: &ZoneState,
    event: &ZoneEvent,
    envelope_key: Option<&PublicKey>,
) -> Option<ZoneNotification> {
    match event {
        // The creator learns of the zone through its response; nobody else
        // can be connected yet.
        ZoneEvent::ZoneCreated { .. } => None,
        ZoneEvent::ClientJoined { handle } => Some(ZoneNotification::ClientJoined {
            handle: handle.clone(),
            public_key: envelope_key?.clone(),
        }),
        ZoneEvent::ClientQuit { handle } => Some(ZoneNotification::ClientQuit {
            handle: handle.clone(),
            public_key: envelope_key?.clone(),
        }),
        ZoneEvent::ZoneNameChanged { name } => {
            Some(ZoneNotification::ZoneNameChanged { name: name.clone() })
        }
        ZoneEvent::MemberCreated { member } => Some(ZoneNotification::MemberCreated {
            member: member.clone(),
        }),
        ZoneEvent::MemberUpdated { member } => Some(ZoneNotification::MemberUpdated {
            member: member.clone(),
        }),
        ZoneEvent::AccountCreated { account } => Some(ZoneNotification::AccountCreated {
            account: account.clone(),
        }),
        ZoneEvent::AccountUpdated { acting_as, account } => {
            let zone = state.zone.as_ref()?;
            // Events written before acting_as was recorded fall back to the
            // owner with the minimum id.
            let member_id = acting_as
                .clone()
                .or_else(|| account.owner_member_ids.iter().next().cloned())?;
            Some(ZoneNotification::AccountUpdated {
                acting_as: zone.members.get(&member_id)?.clone(),
                account: account.clone(),
            })
        }
        ZoneEvent::TransactionAdded { transaction } => {
            Some(ZoneNotification::TransactionAdded {
                transaction: transaction.clone(),
            })
        }
    }
}

fn joined_zone(state: &ZoneState) -> JoinedZone {
    JoinedZone {
        zone: state.zone.clone().expect("joined zone must exist"),
        connected_clients: state.connected_clients.clone(),
    }
}
