//! Types library for the Liquidity zone backend
//!
//! This library provides the core type definitions shared across the zone
//! system: identifiers, bounded tags and metadata, DER-encoded public keys,
//! the zone entity model, and the closed validation-error enumeration.
//!
//! # Modules
//! - `ids`: Unique identifiers (ZoneId, MemberId, AccountId, TransactionId, ClientHandle)
//! - `numeric`: Decimal serialization helpers (ASCII base-10 strings)
//! - `key`: DER-encoded RSA public keys with structural checks
//! - `metadata`: Bounded opaque metadata documents
//! - `zone`: Zone, Member, Account, and Transaction entities
//! - `errors`: Command validation error taxonomy

pub mod ids;
pub mod numeric;
pub mod key;
pub mod metadata;
pub mod zone;
pub mod errors;

/// Maximum length of a name tag, in UTF-8 characters.
pub const MAX_TAG_LENGTH: usize = 160;

/// Maximum serialized size of a metadata document, in bytes.
pub const MAX_METADATA_SIZE: usize = 1024;

/// Required RSA modulus size for caller public keys, in bits.
pub const REQUIRED_KEY_BITS: usize = 2048;

/// Lifetime of a zone from creation to expiry, in milliseconds (7 days).
pub const ZONE_LIFETIME_MILLIS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::key::*;
    pub use crate::metadata::*;
    pub use crate::zone::*;
    pub use crate::errors::*;
    pub use crate::{MAX_METADATA_SIZE, MAX_TAG_LENGTH, REQUIRED_KEY_BITS, ZONE_LIFETIME_MILLIS};
}
