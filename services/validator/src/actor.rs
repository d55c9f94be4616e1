//! The validator task
//!
//! One tokio task per zone, owning the zone's state and inbox. Commands are
//! processed strictly sequentially; the journal append is the only await
//! point, and the response, status refresh, and notification fan-out all
//! happen in the same turn once the append returns, response first.
//!
//! Effects are emitted as queued outbound messages rather than callbacks, so
//! nothing here holds a reference back into the validator.

use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info};
use uuid::Uuid;

use journal::EventJournal;
use model::ids::{ClientHandle, ZoneId};
use protocol::command::ZoneCommandEnvelope;
use protocol::event::{ZoneEvent, ZoneEventEnvelope};
use protocol::response::{ZoneResponse, ZoneResponseEnvelope};

use crate::command::{self, Decision};
use crate::passivation::{self, TimerCommand};
use crate::registry::{ClientDelivery, ClientRegistry};
use crate::state::{self, ZoneState};
use crate::status::{ActiveZoneSummary, StatusMessage, StatusTopic};
use crate::{now_millis, ValidatorConfig};

/// A client connection as the validator sees it: the handle under which the
/// client is known, and the channel its responses and notifications go down.
#[derive(Debug, Clone)]
pub struct ClientEndpoint {
    pub handle: ClientHandle,
    pub tx: UnboundedSender<ClientDelivery>,
}

/// Inbox messages of a zone validator.
#[derive(Debug)]
pub enum ZoneMessage {
    /// A routed command together with the connection that sent it.
    Command {
        envelope: ZoneCommandEnvelope,
        endpoint: ClientEndpoint,
    },
    /// A watched client's connection closed without a QuitZone.
    ClientDisconnected {
        handle: ClientHandle,
        connection: UnboundedSender<ClientDelivery>,
    },
    /// Self-tick: refresh the published status summary.
    PublishStatus,
    /// Shard hand-off: finish in-flight work and terminate.
    Stop,
}

/// Handle to a running zone validator.
#[derive(Debug, Clone)]
pub struct ZoneHandle {
    pub tx: UnboundedSender<ZoneMessage>,
}

impl ZoneHandle {
    /// Whether the validator behind this handle has terminated.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn a validator for a zone. State is rebuilt by replaying the zone's
/// journal before the first message is taken.
pub fn spawn(
    zone_id: ZoneId,
    journal: Arc<dyn EventJournal>,
    topic: StatusTopic,
    config: ValidatorConfig,
) -> ZoneHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let inbox_tx = tx.clone();
    tokio::spawn(async move {
        let timer = passivation::spawn(config.passivation_timeout);
        match Validator::recover(zone_id, journal, topic, inbox_tx, timer.commands).await {
            Ok(validator) => validator.run(rx, timer.timeouts, config).await,
            Err(()) => {}
        }
    });
    ZoneHandle { tx }
}

struct Validator {
    zone_id: ZoneId,
    persistence_id: String,
    origin: String,
    journal: Arc<dyn EventJournal>,
    topic: StatusTopic,
    inbox_tx: UnboundedSender<ZoneMessage>,
    state: ZoneState,
    registry: ClientRegistry,
    timer_commands: UnboundedSender<TimerCommand>,
}

impl Validator {
    async fn recover(
        zone_id: ZoneId,
        journal: Arc<dyn EventJournal>,
        topic: StatusTopic,
        inbox_tx: UnboundedSender<ZoneMessage>,
        timer_commands: UnboundedSender<TimerCommand>,
    ) -> Result<Self, ()> {
        let persistence_id = zone_id.persistence_id();
        let records = match journal.read_all(&persistence_id).await {
            Ok(records) => records,
            Err(e) => {
                error!(%zone_id, error = %e, "journal replay failed");
                return Err(());
            }
        };
        let mut state = ZoneState::default();
        for record in &records {
            match ZoneEventEnvelope::from_payload(&record.payload) {
                Ok(envelope) => state::apply(&mut state, &envelope),
                Err(e) => {
                    error!(
                        %zone_id,
                        sequence = record.sequence,
                        error = %e,
                        "undecodable event record"
                    );
                    return Err(());
                }
            }
        }
        state.after_recovery();
        if let Err(violation) = state.check_invariants() {
            panic!("zone {} replayed into invalid state: {}", zone_id, violation);
        }
        info!(%zone_id, events = records.len(), "zone validator started");
        Ok(Self {
            zone_id,
            persistence_id,
            origin: format!("zone-validator-{}", Uuid::new_v4()),
            journal,
            topic,
            inbox_tx,
            state,
            registry: ClientRegistry::new(),
            timer_commands,
        })
    }

    async fn run(
        mut self,
        mut inbox: UnboundedReceiver<ZoneMessage>,
        mut timeouts: UnboundedReceiver<()>,
        config: ValidatorConfig,
    ) {
        let mut publish = tokio::time::interval(config.status_publish_interval);
        publish.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                message = inbox.recv() => match message {
                    None => break,
                    Some(ZoneMessage::Command { envelope, endpoint }) => {
                        if !self.handle_command(envelope, endpoint).await {
                            break;
                        }
                    }
                    Some(ZoneMessage::ClientDisconnected { handle, connection }) => {
                        if !self.handle_disconnect(handle, connection).await {
                            break;
                        }
                    }
                    Some(ZoneMessage::PublishStatus) => self.publish_status(),
                    Some(ZoneMessage::Stop) => {
                        info!(zone_id = %self.zone_id, "zone validator stopping for hand-off");
                        break;
                    }
                },
                Some(()) = timeouts.recv() => {
                    if self.registry.is_empty() {
                        info!(zone_id = %self.zone_id, "passivating idle zone");
                        break;
                    }
                },
                _ = publish.tick() => self.publish_status(),
            }
        }
    }

    /// Process one command. Returns false when the validator must stop.
    async fn handle_command(
        &mut self,
        envelope: ZoneCommandEnvelope,
        endpoint: ClientEndpoint,
    ) -> bool {
        let _ = self.timer_commands.send(TimerCommand::CommandReceived);
        let ZoneCommandEnvelope {
            remote_address,
            public_key,
            correlation_id,
            reply_to: _,
            zone_id: _,
            command,
        } = envelope;
        debug!(
            zone_id = %self.zone_id,
            command = command.label(),
            client = %endpoint.handle,
            "command received"
        );

        let decision = command::decide(
            &self.state,
            &public_key,
            &endpoint.handle,
            self.zone_id,
            &command,
            now_millis(),
        );
        match decision {
            Decision::Reject(errors) => {
                debug!(
                    zone_id = %self.zone_id,
                    command = command.label(),
                    ?errors,
                    "command rejected"
                );
                respond(&endpoint, correlation_id, command::failure_response(&command, errors));
                true
            }
            Decision::Idempotent(response) => {
                debug!(
                    zone_id = %self.zone_id,
                    command = command.label(),
                    "redelivered command, answering without persisting"
                );
                respond(&endpoint, correlation_id, response);
                true
            }
            Decision::Accept(event) => {
                let event_envelope = ZoneEventEnvelope {
                    remote_address,
                    public_key: Some(public_key),
                    timestamp: now_millis(),
                    event,
                };
                match self.persist(&event_envelope).await {
                    Ok(sequence) => {
                        debug!(
                            zone_id = %self.zone_id,
                            sequence,
                            event = event_envelope.event.label(),
                            "event persisted"
                        );
                        self.apply_and_fan_out(event_envelope, Some((endpoint, correlation_id)));
                        true
                    }
                    Err(()) => {
                        respond(&endpoint, correlation_id, ZoneResponse::Unavailable);
                        false
                    }
                }
            }
        }
    }

    /// A watched connection closed: persist the implied quit and notify the
    /// remaining clients. Returns false when the validator must stop.
    async fn handle_disconnect(
        &mut self,
        handle: ClientHandle,
        connection: UnboundedSender<ClientDelivery>,
    ) -> bool {
        if !self.registry.is_same_connection(&handle, &connection) {
            // Already quit, or the handle rejoined over a new connection.
            return true;
        }
        let Some(public_key) = self.registry.public_key_of(&handle) else {
            return true;
        };
        info!(zone_id = %self.zone_id, client = %handle, "client connection lost");
        let envelope = ZoneEventEnvelope {
            remote_address: None,
            public_key: Some(public_key),
            timestamp: now_millis(),
            event: ZoneEvent::ClientQuit { handle },
        };
        match self.persist(&envelope).await {
            Ok(_) => {
                self.apply_and_fan_out(envelope, None);
                true
            }
            Err(()) => false,
        }
    }

    async fn persist(&self, envelope: &ZoneEventEnvelope) -> Result<u64, ()> {
        let payload = match envelope.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                error!(zone_id = %self.zone_id, error = %e, "event serialization failed");
                return Err(());
            }
        };
        self.journal
            .append(&self.persistence_id, &payload)
            .await
            .map_err(|e| {
                error!(
                    zone_id = %self.zone_id,
                    error = %e,
                    "event persistence failed, stopping validator"
                );
            })
    }

    /// Post-persist turn: fold the event into state, maintain the registry
    /// and passivation gating, then respond, refresh status, and notify.
    fn apply_and_fan_out(
        &mut self,
        envelope: ZoneEventEnvelope,
        reply: Option<(ClientEndpoint, i64)>,
    ) {
        let was_empty = self.state.connected_clients.is_empty();
        state::apply(&mut self.state, &envelope);
        if let Err(violation) = self.state.check_invariants() {
            panic!(
                "zone {} state invariant violated: {}",
                self.zone_id, violation
            );
        }

        match &envelope.event {
            ZoneEvent::ClientJoined { handle } => {
                if let (Some(public_key), Some((endpoint, _))) = (&envelope.public_key, &reply) {
                    self.registry
                        .join(handle.clone(), public_key.clone(), endpoint.tx.clone());
                    self.watch(handle.clone(), endpoint.tx.clone());
                }
            }
            ZoneEvent::ClientQuit { handle } => {
                self.registry.quit(handle);
            }
            _ => {}
        }

        let now_empty = self.state.connected_clients.is_empty();
        if was_empty && !now_empty {
            let _ = self.timer_commands.send(TimerCommand::Stop);
        } else if !was_empty && now_empty {
            let _ = self.timer_commands.send(TimerCommand::Start);
        }

        if let Some((endpoint, correlation_id)) = reply {
            respond(
                &endpoint,
                correlation_id,
                command::success_response(&self.state, &envelope.event),
            );
        }
        let _ = self.inbox_tx.send(ZoneMessage::PublishStatus);
        if let Some(notification) =
            command::notification(&self.state, &envelope.event, envelope.public_key.as_ref())
        {
            self.registry
                .broadcast(&self.origin, self.zone_id, notification);
        }
    }

    /// Watch a joined client's connection; its closure becomes a
    /// ClientDisconnected message on the inbox.
    fn watch(&self, handle: ClientHandle, tx: UnboundedSender<ClientDelivery>) {
        let inbox = self.inbox_tx.clone();
        tokio::spawn(async move {
            tx.closed().await;
            let _ = inbox.send(ZoneMessage::ClientDisconnected {
                handle,
                connection: tx,
            });
        });
    }

    fn publish_status(&self) {
        if let Some(summary) = ActiveZoneSummary::of(&self.state) {
            self.topic
                .publish(StatusMessage::UpsertActiveZoneSummary(summary));
        }
    }
}

fn respond(endpoint: &ClientEndpoint, correlation_id: i64, response: ZoneResponse) {
    let _ = endpoint.tx.send(ClientDelivery::Response(ZoneResponseEnvelope {
        correlation_id,
        response,
    }));
}
