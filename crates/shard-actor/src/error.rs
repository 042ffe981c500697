//! # Runtime Errors
//!
//! This module defines the error types used throughout the actor runtime.
//! Callers of the router never see these directly: `tell` collapses them into a
//! `bool` and `ask` into an `Option`, after logging the cause. They surface
//! unchanged on the lower-level [`ActorRef`](crate::ActorRef) and
//! [`ActorSystem`](crate::ActorSystem) APIs.

use std::time::Duration;

/// Errors raised by the warm cache or the durable store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("write rejected for key {0}")]
    WriteRejected(String),
    #[error("stored state could not be decoded: {0}")]
    Codec(String),
}

/// Errors that can occur within the actor runtime itself.
#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    #[error("actor system `{0}` is not hosted on this node")]
    SystemAbsent(String),
    #[error("actor system `{0}` is shutting down")]
    ShuttingDown(String),
    #[error("mailbox of entity {0} is full")]
    MailboxFull(u64),
    #[error("mailbox of entity {0} is closed")]
    MailboxClosed(u64),
    #[error("resident actor limit of {0} reached")]
    CapacityExceeded(usize),
    #[error("ask timed out after {0:?}")]
    AskTimeout(Duration),
    #[error("actor dropped the reply handle")]
    ActorDropped,
    #[error("hydration of entity {entity_id} failed: {reason}")]
    Hydration { entity_id: u64, reason: String },
    #[error("entity error: {0}")]
    Entity(Box<dyn std::error::Error + Send + Sync>),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("remote delivery to {node} failed: {reason}")]
    RemoteDelivery { node: String, reason: String },
    #[error("no owner for entity {0} and routing is fail-closed")]
    Unroutable(u64),
    #[error("payload codec: {0}")]
    Codec(#[from] serde_json::Error),
}

impl ActorError {
    pub fn remote(node: impl Into<String>, reason: impl ToString) -> Self {
        ActorError::RemoteDelivery {
            node: node.into(),
            reason: reason.to_string(),
        }
    }
}
