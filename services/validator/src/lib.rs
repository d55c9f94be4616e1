//! Zone Validator
//!
//! A per-zone, single-writer, event-sourced state machine. Commands are
//! validated against in-memory state, accepted changes are persisted to the
//! event journal, state mutation happens only by folding persisted events,
//! and every accepted event fans out to connected clients as an ordered,
//! per-client-numbered notification.
//!
//! # Modules
//! - `state`: ZoneState and the event applier (shared by live path and replay)
//! - `validate`: Accumulating command validation
//! - `command`: Command dispatch decisions, responses, and notifications
//! - `registry`: Connected-client tracking and notification delivery
//! - `passivation`: Idle-timeout companion
//! - `status`: Active-zone summary publication
//! - `shard`: Zone-to-validator routing
//! - `actor`: The validator task itself

pub mod state;
pub mod validate;
pub mod command;
pub mod registry;
pub mod passivation;
pub mod status;
pub mod shard;
pub mod actor;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// How long a zone with no connected clients stays resident before its
/// validator stops itself.
pub const PASSIVATION_TIMEOUT: Duration = Duration::from_secs(120);

/// How often active-zone summaries are published.
pub const STATUS_PUBLISH_INTERVAL: Duration = Duration::from_secs(30);

/// Validator tuning knobs.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub passivation_timeout: Duration,
    pub status_publish_interval: Duration,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            passivation_timeout: PASSIVATION_TIMEOUT,
            status_publish_interval: STATUS_PUBLISH_INTERVAL,
        }
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use model::key::PublicKey;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use rsa::pkcs8::EncodePublicKey;
    use rsa::RsaPrivateKey;
    use std::sync::OnceLock;

    pub fn rsa_key(bits: usize, seed: u64) -> PublicKey {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let private = RsaPrivateKey::new(&mut rng, bits).unwrap();
        let der = private.to_public_key().to_public_key_der().unwrap();
        PublicKey::new(der.as_bytes().to_vec())
    }

    /// The one structurally valid caller key shared across tests; RSA key
    /// generation is too slow to repeat per test.
    pub fn caller_key() -> PublicKey {
        static KEY: OnceLock<PublicKey> = OnceLock::new();
        KEY.get_or_init(|| rsa_key(2048, 11)).clone()
    }
}

/// Current wall-clock time in epoch milliseconds.
///
/// Stamped onto persisted event envelopes. Journal sequence numbers, not
/// these timestamps, are the authoritative event order.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as i64
}
