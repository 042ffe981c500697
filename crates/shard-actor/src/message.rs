//! # Actor Messages
//!
//! This module defines what travels through a mailbox. Business traffic is an
//! [`ActorMessage`]: a message type, a payload and, for asks, a single-use reply
//! handle. Runtime control traffic (flush, evict, stop) shares the same queue so
//! that it is serialized with business processing.

use crate::error::ActorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::oneshot;

/// Message payload in its in-process form. It is only rendered to JSON text at
/// the remote hop.
pub type Payload = serde_json::Value;

/// Type alias for the one-shot reply channel carried by an ask.
pub type Response<T> = oneshot::Sender<Result<T, ActorError>>;

/// Where a message entered the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    /// Sent by a caller in this process.
    Local,
    /// Forwarded by a peer's router through the remote delivery endpoint.
    Remote,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Local => f.write_str("local"),
            Origin::Remote => f.write_str("remote"),
        }
    }
}

/// A business message addressed to one actor.
#[derive(Debug)]
pub struct ActorMessage {
    kind: String,
    payload: Payload,
    origin: Origin,
    respond_to: Option<Response<Payload>>,
}

impl ActorMessage {
    /// A locally originated fire-and-forget message.
    pub fn new(kind: impl Into<String>, payload: Payload) -> Self {
        Self {
            kind: kind.into(),
            payload,
            origin: Origin::Local,
            respond_to: None,
        }
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn expects_reply(&self) -> bool {
        self.respond_to.is_some()
    }

    /// Attaches a fresh reply handle and returns the receiving half.
    pub(crate) fn expecting_reply(mut self) -> (Self, oneshot::Receiver<Result<Payload, ActorError>>) {
        let (respond_to, response) = oneshot::channel();
        self.respond_to = Some(respond_to);
        (self, response)
    }

    pub(crate) fn into_parts(self) -> (String, Payload, Origin, Option<Response<Payload>>) {
        (self.kind, self.payload, self.origin, self.respond_to)
    }
}

/// Everything a mailbox can carry.
#[derive(Debug)]
pub(crate) enum Envelope {
    Message(ActorMessage),
    /// Write the state through to cache and store if dirty. Replies `true`
    /// when something was written.
    Flush {
        respond_to: Option<Response<bool>>,
    },
    /// Passivate if still idle for `idle_timeout`. Replies whether the actor
    /// left the registry.
    Evict {
        idle_timeout: Duration,
        respond_to: oneshot::Sender<bool>,
    },
    /// Drain, flush and terminate. Replies whether the final flush succeeded.
    Stop {
        respond_to: Option<oneshot::Sender<bool>>,
    },
}

impl Envelope {
    /// Fails a pending ask when the envelope is dropped without processing.
    pub(crate) fn reject(self, error: ActorError) {
        if let Envelope::Message(message) = self {
            if let Some(respond_to) = message.respond_to {
                let _ = respond_to.send(Err(error));
            }
        }
    }
}
