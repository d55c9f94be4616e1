//! Bounded metadata documents
//!
//! Zones, members, accounts, and transactions may carry an opaque metadata
//! document. It is stored as canonical JSON bytes: equality and the size
//! bound are judged on the bytes, and the validator never inspects the
//! content. Binary formats carry the bytes verbatim; human-readable formats
//! embed the JSON document inline.

use serde::de::Visitor;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// An opaque, size-bounded metadata document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata(Vec<u8>);

impl Metadata {
    /// Build from a JSON value, storing its canonical serialization.
    pub fn from_json(value: &Value) -> Self {
        Self(serde_json::to_vec(value).expect("JSON value serialization cannot fail"))
    }

    /// Wrap raw document bytes as received off the wire.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The serialized size in bytes, as judged by the size bound.
    pub fn byte_len(&self) -> usize {
        self.0.len()
    }

    /// The raw document bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Parse the document back into a JSON value.
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.0)
    }
}

impl Serialize for Metadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            let value = self.to_json().map_err(serde::ser::Error::custom)?;
            value.serialize(serializer)
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

struct MetadataVisitor;

impl<'de> Visitor<'de> for MetadataVisitor {
    type Value = Metadata;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("metadata document bytes")
    }

    fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
        Ok(Metadata(v.to_vec()))
    }

    fn visit_byte_buf<E: serde::de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
        Ok(Metadata(v))
    }
}

impl<'de> Deserialize<'de> for Metadata {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let value = Value::deserialize(deserializer)?;
            Ok(Metadata::from_json(&value))
        } else {
            deserializer.deserialize_byte_buf(MetadataVisitor)
        }
    }
}
