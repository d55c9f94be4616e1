//! Caller public keys
//!
//! A caller is identified by a DER-encoded RSA SubjectPublicKeyInfo. The
//! bytes are carried verbatim: equality, ordering, and hashing are all over
//! the raw DER, and the structural check (well-formed SPKI, rsaEncryption
//! algorithm, 2048-bit modulus) runs only at validation time so that replay
//! of old journals never re-judges stored keys.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rsa::pkcs8::der::Decode as _;
use rsa::pkcs8::{DecodePublicKey, ObjectIdentifier, SubjectPublicKeyInfoRef};
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use serde::de::Visitor;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::REQUIRED_KEY_BITS;

/// OID for the rsaEncryption algorithm (PKCS #1).
const RSA_ENCRYPTION_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");

/// A DER-encoded RSA SubjectPublicKeyInfo identifying a caller.
///
/// Serialized as raw DER bytes in binary formats and as base64 in
/// human-readable formats.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey(Vec<u8>);

/// Outcome of the structural check on a key's DER bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyCheckError {
    /// The bytes do not parse as a SubjectPublicKeyInfo.
    Undecodable,
    /// The SPKI algorithm is not rsaEncryption.
    NotRsa,
    /// The RSA modulus has the wrong bit length.
    WrongLength { bits: usize },
}

impl PublicKey {
    /// Wrap existing DER bytes. No validation is performed here.
    pub fn new(der: impl Into<Vec<u8>>) -> Self {
        Self(der.into())
    }

    /// The raw DER bytes.
    pub fn as_der(&self) -> &[u8] {
        &self.0
    }

    /// Structural check: well-formed SPKI, rsaEncryption, 2048-bit modulus.
    pub fn check(&self) -> Result<(), KeyCheckError> {
        let spki = SubjectPublicKeyInfoRef::from_der(self.0.as_slice())
            .map_err(|_| KeyCheckError::Undecodable)?;
        if spki.algorithm.oid != RSA_ENCRYPTION_OID {
            return Err(KeyCheckError::NotRsa);
        }
        let key =
            RsaPublicKey::from_public_key_der(&self.0).map_err(|_| KeyCheckError::Undecodable)?;
        let bits = key.n().bits();
        if bits != REQUIRED_KEY_BITS {
            return Err(KeyCheckError::WrongLength { bits });
        }
        Ok(())
    }

    /// SHA-256 fingerprint of the DER bytes, as lowercase hex.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.0);
        format!("{:x}", hasher.finalize())
    }

    /// Base64 of the DER bytes (the form used in human-readable encodings).
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.0)
    }

    /// Decode from the base64 form.
    pub fn from_base64(s: &str) -> Result<Self, base64::DecodeError> {
        Ok(Self(BASE64.decode(s)?))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.fingerprint()[..12])
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_base64())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

struct KeyVisitor;

impl<'de> Visitor<'de> for KeyVisitor {
    type Value = PublicKey;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DER bytes or a base64 string")
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
        PublicKey::from_base64(v).map_err(E::custom)
    }

    fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
        Ok(PublicKey::new(v.to_vec()))
    }

    fn visit_byte_buf<E: serde::de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
        Ok(PublicKey::new(v))
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_str(KeyVisitor)
        } else {
            deserializer.deserialize_byte_buf(KeyVisitor)
        }
    }
}
