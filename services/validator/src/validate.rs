//! Command validation
//!
//! Pure, deterministic validators producing accumulated error lists: every
//! independent check contributes its errors, while dependent checks (those
//! that need an earlier check's subject to exist) short-circuit with `?` or
//! stay silent when the earlier check already reported.

use rust_decimal::Decimal;
use std::collections::BTreeSet;

use model::errors::ZoneError;
use model::ids::MemberId;
use model::key::{KeyCheckError, PublicKey};
use model::metadata::Metadata;
use model::zone::{Member, Zone};
use model::{MAX_METADATA_SIZE, MAX_TAG_LENGTH};
use protocol::command::ZoneCommand;

use crate::state::ZoneState;

/// A validated value or a non-empty list of error codes.
pub type Validated<T> = Result<T, Vec<ZoneError>>;

/// Combine two independent checks, concatenating error lists when both fail.
pub fn combine<A, B>(a: Validated<A>, b: Validated<B>) -> Validated<(A, B)> {
    match (a, b) {
        (Ok(a), Ok(b)) => Ok((a, b)),
        (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
        (Err(mut e1), Err(e2)) => {
            e1.extend(e2);
            Err(e1)
        }
    }
}

/// Collapse a list of independent checks into one.
fn collect(checks: Vec<Validated<()>>) -> Validated<()> {
    checks
        .into_iter()
        .fold(Ok(()), |acc, check| combine(acc, check).map(|_| ()))
}

fn require_zone(state: &ZoneState) -> Validated<&Zone> {
    state
        .zone
        .as_ref()
        .ok_or_else(|| vec![ZoneError::ZoneDoesNotExist])
}

fn validate_tag(tag: Option<&String>) -> Validated<()> {
    match tag {
        Some(tag) if tag.chars().count() > MAX_TAG_LENGTH => {
            Err(vec![ZoneError::TagLengthExceeded])
        }
        _ => Ok(()),
    }
}

fn validate_metadata(metadata: Option<&Metadata>) -> Validated<()> {
    match metadata {
        Some(metadata) if metadata.byte_len() > MAX_METADATA_SIZE => {
            Err(vec![ZoneError::MetadataLengthExceeded])
        }
        _ => Ok(()),
    }
}

fn validate_public_key(key: &PublicKey) -> Validated<()> {
    match key.check() {
        Ok(()) => Ok(()),
        Err(KeyCheckError::Undecodable) => Err(vec![ZoneError::InvalidPublicKey]),
        Err(KeyCheckError::NotRsa) => Err(vec![ZoneError::InvalidPublicKeyType]),
        Err(KeyCheckError::WrongLength { .. }) => Err(vec![ZoneError::InvalidPublicKeyLength]),
    }
}

fn validate_public_keys(keys: &BTreeSet<PublicKey>) -> Validated<()> {
    if keys.is_empty() {
        return Err(vec![ZoneError::NoPublicKeys]);
    }
    collect(keys.iter().map(validate_public_key).collect())
}

fn validate_owner_member_ids(zone: &Zone, ids: &BTreeSet<MemberId>) -> Validated<()> {
    if ids.is_empty() {
        return Err(vec![ZoneError::NoMemberIds]);
    }
    collect(
        ids.iter()
            .map(|id| {
                if zone.members.contains_key(id) {
                    Ok(())
                } else {
                    Err(vec![ZoneError::MemberDoesNotExist(id.clone())])
                }
            })
            .collect(),
    )
}

/// The member the caller is acting as: it must exist and the caller's key
/// must be among its owner keys.
fn authorized_member<'a>(
    zone: &'a Zone,
    member_id: &MemberId,
    caller: &PublicKey,
) -> Validated<&'a Member> {
    match zone.members.get(member_id) {
        None => Err(vec![ZoneError::MemberDoesNotExist(member_id.clone())]),
        Some(member) if !member.owner_public_keys.contains(caller) => {
            Err(vec![ZoneError::MemberKeyMismatch])
        }
        Some(member) => Ok(member),
    }
}

/// Run the validation suite over a command.
pub fn validate_command(
    state: &ZoneState,
    caller: &PublicKey,
    command: &ZoneCommand,
) -> Validated<()> {
    match command {
        ZoneCommand::CreateZone {
            equity_owner_public_key,
            equity_owner_name,
            equity_owner_metadata,
            equity_account_name,
            equity_account_metadata,
            name,
            metadata,
        } => collect(vec![
            validate_public_key(equity_owner_public_key),
            validate_tag(equity_owner_name.as_ref()),
            validate_metadata(equity_owner_metadata.as_ref()),
            validate_tag(equity_account_name.as_ref()),
            validate_metadata(equity_account_metadata.as_ref()),
            validate_tag(name.as_ref()),
            validate_metadata(metadata.as_ref()),
        ]),

        ZoneCommand::JoinZone | ZoneCommand::QuitZone => require_zone(state).map(|_| ()),

        ZoneCommand::ChangeZoneName { name } => {
            require_zone(state)?;
            validate_tag(name.as_ref())
        }

        ZoneCommand::CreateMember {
            owner_public_keys,
            name,
            metadata,
        } => {
            require_zone(state)?;
            collect(vec![
                validate_public_keys(owner_public_keys),
                validate_tag(name.as_ref()),
                validate_metadata(metadata.as_ref()),
            ])
        }

        ZoneCommand::UpdateMember { member } => {
            let zone = require_zone(state)?;
            let ownership = match zone.members.get(&member.id) {
                None => Err(vec![ZoneError::MemberDoesNotExist(member.id.clone())]),
                Some(existing) if !existing.owner_public_keys.contains(caller) => {
                    Err(vec![ZoneError::MemberKeyMismatch])
                }
                Some(_) => Ok(()),
            };
            collect(vec![
                ownership,
                validate_public_keys(&member.owner_public_keys),
                validate_tag(member.name.as_ref()),
                validate_metadata(member.metadata.as_ref()),
            ])
        }

        ZoneCommand::CreateAccount {
            owner_member_ids,
            name,
            metadata,
        } => {
            let zone = require_zone(state)?;
            collect(vec![
                validate_owner_member_ids(zone, owner_member_ids),
                validate_tag(name.as_ref()),
                validate_metadata(metadata.as_ref()),
            ])
        }

        ZoneCommand::UpdateAccount { acting_as, account } => {
            let zone = require_zone(state)?;
            let ownership = match zone.accounts.get(&account.id) {
                None => Err(vec![ZoneError::AccountDoesNotExist(account.id.clone())]),
                Some(existing) if !existing.owner_member_ids.contains(acting_as) => {
                    Err(vec![ZoneError::AccountOwnerMismatch])
                }
                Some(_) => Ok(()),
            };
            collect(vec![
                ownership,
                authorized_member(zone, acting_as, caller).map(|_| ()),
                validate_owner_member_ids(zone, &account.owner_member_ids),
                validate_tag(account.name.as_ref()),
                validate_metadata(account.metadata.as_ref()),
            ])
        }

        ZoneCommand::AddTransaction {
            acting_as,
            from,
            to,
            value,
            description,
            metadata,
        } => {
            let zone = require_zone(state)?;
            let source = zone.accounts.get(from);
            let source_check = if source.is_some() {
                Ok(())
            } else {
                Err(vec![ZoneError::SourceAccountDoesNotExist])
            };
            let dest_check = if zone.accounts.contains_key(to) {
                Ok(())
            } else {
                Err(vec![ZoneError::DestinationAccountDoesNotExist])
            };
            let reflexive_check = if from == to {
                Err(vec![ZoneError::ReflexiveTransaction])
            } else {
                Ok(())
            };
            let value_check = if *value < Decimal::ZERO {
                Err(vec![ZoneError::NegativeTransactionValue])
            } else {
                Ok(())
            };
            // Debit rights and balance need the source account; when it is
            // missing the source check already reported.
            let debit_check = match source {
                Some(account) if !account.owner_member_ids.contains(acting_as) => {
                    Err(vec![ZoneError::AccountOwnerMismatch])
                }
                _ => Ok(()),
            };
            let balance_check = if source.is_some()
                && *value >= Decimal::ZERO
                && *from != zone.equity_account_id
                && state.balance(from) - *value < Decimal::ZERO
            {
                Err(vec![ZoneError::InsufficientBalance])
            } else {
                Ok(())
            };
            collect(vec![
                source_check,
                dest_check,
                reflexive_check,
                value_check,
                debit_check,
                authorized_member(zone, acting_as, caller).map(|_| ()),
                balance_check,
                validate_tag(description.as_ref()),
                validate_metadata(metadata.as_ref()),
            ])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state;
    use crate::testutil::{caller_key, rsa_key};
    use model::ids::{AccountId, ZoneId};
    use model::zone::Account;
    use protocol::event::{ZoneEvent, ZoneEventEnvelope};
    use std::str::FromStr;

    fn apply(state: &mut ZoneState, event: ZoneEvent) {
        state::apply(
            state,
            &ZoneEventEnvelope {
                remote_address: None,
                public_key: Some(caller_key()),
                timestamp: 0,
                event,
            },
        );
    }

    /// A zone owned by `caller_key()` with a second account "1" owned by the
    /// equity owner member.
    fn populated_state() -> ZoneState {
        let mut st = ZoneState::default();
        apply(
            &mut st,
            ZoneEvent::ZoneCreated {
                zone: Zone::create(
                    ZoneId::generate(),
                    caller_key(),
                    Some("Dave".to_string()),
                    None,
                    None,
                    None,
                    0,
                    None,
                    None,
                ),
            },
        );
        apply(
            &mut st,
            ZoneEvent::AccountCreated {
                account: Account {
                    id: AccountId::from_index(1),
                    owner_member_ids: [MemberId::from_index(0)].into(),
                    name: None,
                    metadata: None,
                },
            },
        );
        st
    }

    fn errors_of(state: &ZoneState, command: ZoneCommand) -> Vec<ZoneError> {
        validate_command(state, &caller_key(), &command).err().unwrap_or_default()
    }

    #[test]
    fn test_combine_accumulates_errors() {
        let a: Validated<()> = Err(vec![ZoneError::TagLengthExceeded]);
        let b: Validated<()> = Err(vec![ZoneError::MetadataLengthExceeded]);
        assert_eq!(
            combine(a, b),
            Err(vec![
                ZoneError::TagLengthExceeded,
                ZoneError::MetadataLengthExceeded
            ])
        );
    }

    #[test]
    fn test_tag_boundary() {
        assert_eq!(validate_tag(Some(&"a".repeat(160))), Ok(()));
        assert_eq!(
            validate_tag(Some(&"a".repeat(161))),
            Err(vec![ZoneError::TagLengthExceeded])
        );
        assert_eq!(validate_tag(None), Ok(()));
    }

    #[test]
    fn test_tag_length_counts_characters_not_bytes() {
        // 160 two-byte characters are within the bound.
        assert_eq!(validate_tag(Some(&"é".repeat(160))), Ok(()));
    }

    #[test]
    fn test_metadata_boundary() {
        // A JSON string of n characters serializes to n + 2 bytes.
        let at_limit = Metadata::from_json(&serde_json::json!("x".repeat(1022)));
        assert_eq!(at_limit.byte_len(), 1024);
        assert_eq!(validate_metadata(Some(&at_limit)), Ok(()));

        let over_limit = Metadata::from_json(&serde_json::json!("x".repeat(1023)));
        assert_eq!(over_limit.byte_len(), 1025);
        assert_eq!(
            validate_metadata(Some(&over_limit)),
            Err(vec![ZoneError::MetadataLengthExceeded])
        );
    }

    #[test]
    fn test_key_of_wrong_length_rejected() {
        let short = rsa_key(2047, 12);
        assert_eq!(
            validate_public_key(&short),
            Err(vec![ZoneError::InvalidPublicKeyLength])
        );
        assert_eq!(validate_public_key(&caller_key()), Ok(()));
    }

    #[test]
    fn test_undecodable_key_rejected() {
        assert_eq!(
            validate_public_key(&PublicKey::new(vec![1, 2, 3])),
            Err(vec![ZoneError::InvalidPublicKey])
        );
    }

    #[test]
    fn test_empty_key_set_rejected() {
        assert_eq!(
            validate_public_keys(&BTreeSet::new()),
            Err(vec![ZoneError::NoPublicKeys])
        );
    }

    #[test]
    fn test_zone_must_exist_short_circuits() {
        let state = ZoneState::default();
        assert_eq!(
            errors_of(
                &state,
                ZoneCommand::ChangeZoneName {
                    name: Some("a".repeat(161)),
                }
            ),
            vec![ZoneError::ZoneDoesNotExist]
        );
    }

    #[test]
    fn test_create_member_with_unknown_caller_is_fine() {
        // Caller identity is only judged where ownership matters.
        let state = populated_state();
        let foreign = PublicKey::new(vec![7, 7, 7]);
        let result = validate_command(
            &state,
            &foreign,
            &ZoneCommand::CreateMember {
                owner_public_keys: [caller_key()].into(),
                name: None,
                metadata: None,
            },
        );
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn test_update_member_key_mismatch() {
        let state = populated_state();
        let member = state.zone.as_ref().unwrap().members[&MemberId::from_index(0)].clone();
        let foreign = PublicKey::new(vec![7, 7, 7]);
        let result = validate_command(&state, &foreign, &ZoneCommand::UpdateMember { member });
        assert_eq!(result, Err(vec![ZoneError::MemberKeyMismatch]));
    }

    #[test]
    fn test_update_account_owner_mismatch() {
        let mut state = populated_state();
        // A second member who does not own account "1".
        apply(
            &mut state,
            ZoneEvent::MemberCreated {
                member: Member {
                    id: MemberId::from_index(1),
                    owner_public_keys: [caller_key()].into(),
                    name: None,
                    metadata: None,
                },
            },
        );
        let account = state.zone.as_ref().unwrap().accounts[&AccountId::from_index(1)].clone();
        let errors = errors_of(
            &state,
            ZoneCommand::UpdateAccount {
                acting_as: MemberId::from_index(1),
                account,
            },
        );
        assert_eq!(errors, vec![ZoneError::AccountOwnerMismatch]);
    }

    #[test]
    fn test_reflexive_transaction_rejected() {
        let state = populated_state();
        let errors = errors_of(
            &state,
            ZoneCommand::AddTransaction {
                acting_as: MemberId::from_index(0),
                from: AccountId::from_index(1),
                to: AccountId::from_index(1),
                value: Decimal::ONE,
                description: None,
                metadata: None,
            },
        );
        assert_eq!(errors, vec![ZoneError::ReflexiveTransaction]);
    }

    #[test]
    fn test_independent_transaction_errors_accumulate() {
        let state = populated_state();
        let errors = errors_of(
            &state,
            ZoneCommand::AddTransaction {
                acting_as: MemberId::from_index(0),
                from: AccountId::from_index(1),
                to: AccountId::from_index(1),
                value: Decimal::from_str("-1").unwrap(),
                description: None,
                metadata: None,
            },
        );
        assert_eq!(
            errors,
            vec![
                ZoneError::ReflexiveTransaction,
                ZoneError::NegativeTransactionValue
            ]
        );
    }

    #[test]
    fn test_zero_value_transaction_accepted() {
        let state = populated_state();
        let result = validate_command(
            &state,
            &caller_key(),
            &ZoneCommand::AddTransaction {
                acting_as: MemberId::from_index(0),
                from: AccountId::from_index(1),
                to: AccountId::from_index(0),
                value: Decimal::ZERO,
                description: None,
                metadata: None,
            },
        );
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn test_equity_account_may_overdraw() {
        let state = populated_state();
        let result = validate_command(
            &state,
            &caller_key(),
            &ZoneCommand::AddTransaction {
                acting_as: MemberId::from_index(0),
                from: AccountId::from_index(0),
                to: AccountId::from_index(1),
                value: Decimal::from_str("5000000000000000000000").unwrap(),
                description: None,
                metadata: None,
            },
        );
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn test_non_equity_account_may_not_overdraw() {
        let state = populated_state();
        let errors = errors_of(
            &state,
            ZoneCommand::AddTransaction {
                acting_as: MemberId::from_index(0),
                from: AccountId::from_index(1),
                to: AccountId::from_index(0),
                value: Decimal::ONE,
                description: None,
                metadata: None,
            },
        );
        assert_eq!(errors, vec![ZoneError::InsufficientBalance]);
    }

    #[test]
    fn test_missing_source_and_destination_accumulate() {
        let state = populated_state();
        let errors = errors_of(
            &state,
            ZoneCommand::AddTransaction {
                acting_as: MemberId::from_index(0),
                from: AccountId::from_index(8),
                to: AccountId::from_index(9),
                value: Decimal::ONE,
                description: None,
                metadata: None,
            },
        );
        assert_eq!(
            errors,
            vec![
                ZoneError::SourceAccountDoesNotExist,
                ZoneError::DestinationAccountDoesNotExist
            ]
        );
    }
}
