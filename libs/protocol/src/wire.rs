//! Length-delimited tagged binary framing
//!
//! Every message travels as `[kind: u8][len: u32 LE][payload]` where the
//! payload is the bincode serialization of the envelope. Strings are UTF-8,
//! decimals ASCII base-10 strings, timestamps epoch-millis i64, public keys
//! raw DER bytes, and zone ids canonical hex strings.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::command::ZoneCommandEnvelope;
use crate::event::ZoneEventEnvelope;
use crate::notification::ZoneNotificationEnvelope;
use crate::response::ZoneResponseEnvelope;

/// Reject frames claiming a payload larger than this (likely corruption).
const MAX_FRAME_PAYLOAD: usize = 16 * 1024 * 1024;

const KIND_COMMAND: u8 = 1;
const KIND_RESPONSE: u8 = 2;
const KIND_EVENT: u8 = 3;
const KIND_NOTIFICATION: u8 = 4;

#[derive(Error, Debug)]
pub enum WireError {
    #[error("frame truncated: need {needed} bytes, have {have}")]
    Truncated { needed: usize, have: usize },

    #[error("implausible payload length: {0}")]
    ImplausibleLength(usize),

    #[error("unknown message kind: {0}")]
    UnknownKind(u8),

    #[error("payload encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

/// A framed protocol message.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    Command(ZoneCommandEnvelope),
    Response(ZoneResponseEnvelope),
    Event(ZoneEventEnvelope),
    Notification(ZoneNotificationEnvelope),
}

fn frame<T: Serialize>(kind: u8, value: &T) -> Result<Vec<u8>, WireError> {
    let payload = bincode::serialize(value)?;
    let mut buf = Vec::with_capacity(1 + 4 + payload.len());
    buf.push(kind);
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

fn unframe<T: DeserializeOwned>(payload: &[u8]) -> Result<T, WireError> {
    Ok(bincode::deserialize(payload)?)
}

impl WireMessage {
    /// Serialize to the framed binary form.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        match self {
            WireMessage::Command(e) => frame(KIND_COMMAND, e),
            WireMessage::Response(e) => frame(KIND_RESPONSE, e),
            WireMessage::Event(e) => frame(KIND_EVENT, e),
            WireMessage::Notification(e) => frame(KIND_NOTIFICATION, e),
        }
    }

    /// Deserialize one frame, returning the message and the bytes consumed.
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize), WireError> {
        if data.len() < 5 {
            return Err(WireError::Truncated {
                needed: 5,
                have: data.len(),
            });
        }
        let kind = data[0];
        let len = u32::from_le_bytes([data[1], data[2], data[3], data[4]]) as usize;
        if len > MAX_FRAME_PAYLOAD {
            return Err(WireError::ImplausibleLength(len));
        }
        let total = 5 + len;
        if data.len() < total {
            return Err(WireError::Truncated {
                needed: total,
                have: data.len(),
            });
        }
        let payload = &data[5..total];
        let message = match kind {
            KIND_COMMAND => WireMessage::Command(unframe(payload)?),
            KIND_RESPONSE => WireMessage::Response(unframe(payload)?),
            KIND_EVENT => WireMessage::Event(unframe(payload)?),
            KIND_NOTIFICATION => WireMessage::Notification(unframe(payload)?),
            other => return Err(WireError::UnknownKind(other)),
        };
        Ok((message, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ZoneCommand;
    use crate::event::ZoneEvent;
    use crate::notification::ZoneNotification;
    use crate::response::{JoinedZone, ZoneResponse};
    use model::errors::ZoneError;
    use model::ids::{AccountId, ClientHandle, MemberId, ZoneId};
    use model::key::PublicKey;
    use model::metadata::Metadata;
    use model::zone::Zone;
    use rust_decimal::Decimal;
    use std::collections::BTreeMap;
    use std::str::FromStr;

    fn sample_zone() -> Zone {
        Zone::create(
            ZoneId::generate(),
            PublicKey::new(vec![0x30, 0x82, 0x01, 0x22]),
            Some("Dave".to_string()),
            None,
            None,
            Some(Metadata::from_json(&serde_json::json!({"k": "v"}))),
            1_514_156_286_183,
            Some("Dave's Game".to_string()),
            None,
        )
    }

    fn roundtrip(message: WireMessage) {
        let bytes = message.to_bytes().unwrap();
        let (decoded, consumed) = WireMessage::from_bytes(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(message, decoded);
    }

    #[test]
    fn test_command_roundtrip() {
        roundtrip(WireMessage::Command(ZoneCommandEnvelope {
            remote_address: Some("203.0.113.7".to_string()),
            public_key: PublicKey::new(vec![1, 2, 3]),
            correlation_id: 42,
            reply_to: "conn-1".to_string(),
            zone_id: ZoneId::generate(),
            command: ZoneCommand::AddTransaction {
                acting_as: MemberId::from_index(0),
                from: AccountId::from_index(0),
                to: AccountId::from_index(1),
                value: Decimal::from_str("5000000000000000000000").unwrap(),
                description: Some("Jenny's Lottery Win".to_string()),
                metadata: None,
            },
        }));
    }

    #[test]
    fn test_response_roundtrip() {
        roundtrip(WireMessage::Response(ZoneResponseEnvelope {
            correlation_id: 7,
            response: ZoneResponse::JoinZone {
                result: Ok(JoinedZone {
                    zone: sample_zone(),
                    connected_clients: BTreeMap::from([(
                        ClientHandle::new("conn-1"),
                        PublicKey::new(vec![1, 2, 3]),
                    )]),
                }),
            },
        }));
    }

    #[test]
    fn test_failure_response_roundtrip() {
        roundtrip(WireMessage::Response(ZoneResponseEnvelope {
            correlation_id: 8,
            response: ZoneResponse::AddTransaction {
                result: Err(vec![
                    ZoneError::ReflexiveTransaction,
                    ZoneError::InsufficientBalance,
                ]),
            },
        }));
    }

    #[test]
    fn test_event_roundtrip() {
        roundtrip(WireMessage::Event(ZoneEventEnvelope {
            remote_address: None,
            public_key: Some(PublicKey::new(vec![9, 9])),
            timestamp: 1_514_156_286_183,
            event: ZoneEvent::ZoneCreated {
                zone: sample_zone(),
            },
        }));
    }

    #[test]
    fn test_legacy_account_updated_roundtrip() {
        roundtrip(WireMessage::Event(ZoneEventEnvelope {
            remote_address: None,
            public_key: None,
            timestamp: 0,
            event: ZoneEvent::AccountUpdated {
                acting_as: None,
                account: sample_zone().accounts[&AccountId::from_index(0)].clone(),
            },
        }));
    }

    #[test]
    fn test_notification_roundtrip() {
        roundtrip(WireMessage::Notification(ZoneNotificationEnvelope {
            origin: "validator-1".to_string(),
            zone_id: ZoneId::generate(),
            sequence_number: 3,
            notification: ZoneNotification::ClientQuit {
                handle: ClientHandle::new("conn-2"),
                public_key: PublicKey::new(vec![1]),
            },
        }));
    }

    #[test]
    fn test_truncated_frame_rejected() {
        let message = WireMessage::Notification(ZoneNotificationEnvelope {
            origin: "validator-1".to_string(),
            zone_id: ZoneId::generate(),
            sequence_number: 0,
            notification: ZoneNotification::ZoneNameChanged { name: None },
        });
        let bytes = message.to_bytes().unwrap();
        let result = WireMessage::from_bytes(&bytes[..bytes.len() - 1]);
        assert!(matches!(result, Err(WireError::Truncated { .. })));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let mut bytes = WireMessage::Event(ZoneEventEnvelope {
            remote_address: None,
            public_key: None,
            timestamp: 0,
            event: ZoneEvent::ZoneNameChanged { name: None },
        })
        .to_bytes()
        .unwrap();
        bytes[0] = 99;
        assert!(matches!(
            WireMessage::from_bytes(&bytes),
            Err(WireError::UnknownKind(99))
        ));
    }

    #[test]
    fn test_event_payload_roundtrip() {
        let envelope = ZoneEventEnvelope {
            remote_address: Some("198.51.100.1".to_string()),
            public_key: None,
            timestamp: 5,
            event: ZoneEvent::ClientJoined {
                handle: ClientHandle::new("conn-3"),
            },
        };
        let payload = envelope.to_payload().unwrap();
        assert_eq!(ZoneEventEnvelope::from_payload(&payload).unwrap(), envelope);
    }
}
