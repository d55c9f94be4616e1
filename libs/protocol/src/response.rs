//! Responses and the response envelope

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use model::errors::ZoneError;
use model::ids::ClientHandle;
use model::key::PublicKey;
use model::zone::{Account, Member, Transaction, Zone};

/// Outcome of a command: a success value or a non-empty error list.
pub type ZoneResult<T> = Result<T, Vec<ZoneError>>;

/// Payload of a successful join: the zone plus the clients connected after
/// the join, keyed by handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedZone {
    pub zone: Zone,
    pub connected_clients: BTreeMap<ClientHandle, PublicKey>,
}

/// A response to a zone command, one variant per command kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ZoneResponse {
    CreateZone { result: ZoneResult<Zone> },
    JoinZone { result: ZoneResult<JoinedZone> },
    QuitZone { result: ZoneResult<()> },
    ChangeZoneName { result: ZoneResult<()> },
    CreateMember { result: ZoneResult<Member> },
    UpdateMember { result: ZoneResult<()> },
    CreateAccount { result: ZoneResult<Account> },
    UpdateAccount { result: ZoneResult<()> },
    AddTransaction { result: ZoneResult<Transaction> },

    /// The zone's validator could not take the command (persistence failure
    /// or shard hand-off in flight). Safe to retry: accepted commands are
    /// idempotent under redelivery.
    Unavailable,
}

impl ZoneResponse {
    /// The validation errors carried by a failure response, if any.
    pub fn errors(&self) -> Option<&[ZoneError]> {
        match self {
            ZoneResponse::CreateZone { result: Err(e) }
            | ZoneResponse::JoinZone { result: Err(e) }
            | ZoneResponse::QuitZone { result: Err(e) }
            | ZoneResponse::ChangeZoneName { result: Err(e) }
            | ZoneResponse::CreateMember { result: Err(e) }
            | ZoneResponse::UpdateMember { result: Err(e) }
            | ZoneResponse::CreateAccount { result: Err(e) }
            | ZoneResponse::UpdateAccount { result: Err(e) }
            | ZoneResponse::AddTransaction { result: Err(e) } => Some(e.as_slice()),
            _ => None,
        }
    }

    /// Whether this response reports a validation failure.
    pub fn is_failure(&self) -> bool {
        self.errors().is_some()
    }
}

/// Transport wrapper around a response, correlating it to its command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneResponseEnvelope {
    pub correlation_id: i64,
    pub response: ZoneResponse,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_detection() {
        let failure = ZoneResponse::AddTransaction {
            result: Err(vec![ZoneError::InsufficientBalance]),
        };
        assert!(failure.is_failure());
        assert_eq!(failure.errors(), Some(&[ZoneError::InsufficientBalance][..]));

        let success = ZoneResponse::QuitZone { result: Ok(()) };
        assert!(!success.is_failure());
        assert_eq!(success.errors(), None);

        assert!(!ZoneResponse::Unavailable.is_failure());
    }
}
