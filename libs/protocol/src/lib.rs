//! Wire types for the Liquidity zone backend
//!
//! Defines the command, response, event, and notification messages exchanged
//! between clients, the validator, and the journal, together with their
//! transport envelopes and a length-delimited binary codec.
//!
//! # Modules
//! - `command`: Commands and the command envelope
//! - `response`: Responses and the response envelope
//! - `event`: Persisted events and the event envelope
//! - `notification`: Client notifications and the notification envelope
//! - `wire`: Length-delimited tagged binary framing

pub mod command;
pub mod response;
pub mod event;
pub mod notification;
pub mod wire;

pub use command::{ZoneCommand, ZoneCommandEnvelope};
pub use event::{ZoneEvent, ZoneEventEnvelope};
pub use notification::{ZoneNotification, ZoneNotificationEnvelope};
pub use response::{JoinedZone, ZoneResponse, ZoneResponseEnvelope, ZoneResult};
pub use wire::{WireError, WireMessage};
