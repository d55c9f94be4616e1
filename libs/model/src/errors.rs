//! Command validation error taxonomy
//!
//! A closed enumeration of the error codes a command can fail with. Failures
//! accumulate: a response carries a non-empty list covering every independent
//! check that failed. Authorisation failures are ordinary validation errors
//! and travel back to the caller like any other.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{AccountId, MemberId};

/// A single validation error code.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneError {
    #[error("tag exceeds the maximum length")]
    TagLengthExceeded,

    #[error("metadata exceeds the maximum serialized size")]
    MetadataLengthExceeded,

    #[error("no public keys given")]
    NoPublicKeys,

    #[error("public key does not decode")]
    InvalidPublicKey,

    #[error("public key is not an RSA key")]
    InvalidPublicKeyType,

    #[error("public key modulus has the wrong length")]
    InvalidPublicKeyLength,

    #[error("no member ids given")]
    NoMemberIds,

    #[error("member {0} does not exist")]
    MemberDoesNotExist(MemberId),

    #[error("account {0} does not exist")]
    AccountDoesNotExist(AccountId),

    #[error("caller key does not match the member's owner keys")]
    MemberKeyMismatch,

    #[error("acting member does not own the account")]
    AccountOwnerMismatch,

    #[error("source account does not exist")]
    SourceAccountDoesNotExist,

    #[error("destination account does not exist")]
    DestinationAccountDoesNotExist,

    #[error("transaction source and destination are the same account")]
    ReflexiveTransaction,

    #[error("transaction value is negative")]
    NegativeTransactionValue,

    #[error("insufficient balance on the source account")]
    InsufficientBalance,

    #[error("zone does not exist")]
    ZoneDoesNotExist,
}
