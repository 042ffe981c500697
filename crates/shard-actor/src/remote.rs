//! # Remote Delivery Endpoint
//!
//! The server side of a cross-node hop. A peer's router sends a
//! [`RemoteRequest`]; the endpoint decodes the payload, tags the message
//! `Origin::Remote` and hands it to the same [`SystemRegistry`] the local
//! router uses. There is no second implementation of actor semantics here,
//! and a remote-origin message is never routed onwards.
//!
//! Payloads travel as JSON text: this is the only place where in-process
//! values are serialized.

use crate::message::{ActorMessage, Origin, Payload};
use crate::registry::SystemRegistry;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Requests accepted by [`RemoteDeliveryEndpoint::handle`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RemoteRequest {
    Tell {
        system: String,
        entity_id: u64,
        message_type: String,
        payload: String,
    },
    Ask {
        system: String,
        entity_id: u64,
        message_type: String,
        payload: String,
        timeout_ms: u64,
    },
    HasActor {
        system: String,
        entity_id: u64,
    },
    BatchTell {
        system: String,
        /// Comma-separated decimal entity ids
        entity_ids: String,
        message_type: String,
        payload: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "value", rename_all = "snake_case")]
pub enum RemoteResponse {
    Delivered(bool),
    /// JSON text of the reply, `None` on failure or timeout
    Reply(Option<String>),
    Present(bool),
    Accepted(usize),
}

/// Re-entry point for messages forwarded by peers.
#[derive(Clone)]
pub struct RemoteDeliveryEndpoint {
    systems: SystemRegistry,
}

impl RemoteDeliveryEndpoint {
    pub fn new(systems: SystemRegistry) -> Self {
        Self { systems }
    }

    pub async fn handle(&self, request: RemoteRequest) -> RemoteResponse {
        match request {
            RemoteRequest::Tell {
                system,
                entity_id,
                message_type,
                payload,
            } => RemoteResponse::Delivered(
                self.tell(&system, entity_id, &message_type, &payload).await,
            ),
            RemoteRequest::Ask {
                system,
                entity_id,
                message_type,
                payload,
                timeout_ms,
            } => RemoteResponse::Reply(
                self.ask(&system, entity_id, &message_type, &payload, timeout_ms)
                    .await,
            ),
            RemoteRequest::HasActor { system, entity_id } => {
                RemoteResponse::Present(self.has_actor(&system, entity_id))
            }
            RemoteRequest::BatchTell {
                system,
                entity_ids,
                message_type,
                payload,
            } => RemoteResponse::Accepted(
                self.batch_tell(&system, &entity_ids, &message_type, &payload)
                    .await,
            ),
        }
    }

    pub async fn tell(&self, system: &str, entity_id: u64, message_type: &str, payload: &str) -> bool {
        let Some(payload) = decode_payload(system, entity_id, payload) else {
            return false;
        };
        self.deliver(system, entity_id, message_type, payload).await
    }

    pub async fn ask(
        &self,
        system: &str,
        entity_id: u64,
        message_type: &str,
        payload: &str,
        timeout_ms: u64,
    ) -> Option<String> {
        let payload = decode_payload(system, entity_id, payload)?;
        let message = ActorMessage::new(message_type, payload).with_origin(Origin::Remote);
        let timeout = Duration::from_millis(timeout_ms);
        match self.systems.ask(system, entity_id, message, timeout).await {
            Ok(reply) => match serde_json::to_string(&reply) {
                Ok(encoded) => Some(encoded),
                Err(e) => {
                    warn!(system, entity_id, error = %e, "Could not encode reply");
                    None
                }
            },
            Err(e) => {
                warn!(system, entity_id, message_type, error = %e, "Remote ask failed");
                None
            }
        }
    }

    pub fn has_actor(&self, system: &str, entity_id: u64) -> bool {
        self.systems.has_actor(system, entity_id)
    }

    /// Delivers the same message to every id in `entity_ids`. Malformed ids
    /// are skipped; returns how many deliveries were accepted.
    pub async fn batch_tell(&self, system: &str, entity_ids: &str, message_type: &str, payload: &str) -> usize {
        let Some(payload) = decode_payload(system, 0, payload) else {
            return 0;
        };
        let mut accepted = 0;
        for raw in entity_ids.split(',').map(str::trim).filter(|raw| !raw.is_empty()) {
            match raw.parse::<u64>() {
                Ok(entity_id) => {
                    if self.deliver(system, entity_id, message_type, payload.clone()).await {
                        accepted += 1;
                    }
                }
                Err(_) => warn!(system, entity_id = raw, "Skipping malformed entity id"),
            }
        }
        accepted
    }

    async fn deliver(&self, system: &str, entity_id: u64, message_type: &str, payload: Payload) -> bool {
        let message = ActorMessage::new(message_type, payload).with_origin(Origin::Remote);
        match self.systems.tell(system, entity_id, message).await {
            Ok(()) => {
                debug!(system, entity_id, message_type, "Accepted remote message");
                true
            }
            Err(e) => {
                warn!(system, entity_id, message_type, error = %e, "Remote tell rejected");
                false
            }
        }
    }
}

fn decode_payload(system: &str, entity_id: u64, payload: &str) -> Option<Payload> {
    match serde_json::from_str(payload) {
        Ok(payload) => Some(payload),
        Err(e) => {
            warn!(system, entity_id, error = %e, "Rejecting undecodable payload");
            None
        }
    }
}
