//! Decimal serialization helpers
//!
//! Monetary values use `rust_decimal::Decimal` for deterministic arithmetic
//! and are carried on the wire as ASCII base-10 strings to prevent precision
//! loss. Apply with `#[serde(with = "model::numeric::decimal_string")]`.

/// Serde adapter: `Decimal` as an ASCII base-10 string.
pub mod decimal_string {
    use rust_decimal::Decimal;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        let s = String::deserialize(deserializer)?;
        Decimal::from_str(&s).map_err(D::Error::custom)
    }
}
