//! Error types for the Player actor.

use thiserror::Error;

/// Errors that can occur during player operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlayerError {
    /// The payload did not match what the message kind expects.
    #[error("Invalid payload for {message_type}: {reason}")]
    InvalidPayload { message_type: String, reason: String },

    /// The actor does not handle this message kind.
    #[error("Unknown player message: {0}")]
    UnknownMessage(String),

    /// The wallet holds less than the requested amount.
    #[error("Insufficient gold: requested {requested}, available {available}")]
    InsufficientGold { requested: u64, available: u64 },

    /// The message was not accepted or the reply never came. Whether it was
    /// applied is unknown.
    #[error("Player {player_id} unavailable for {message_type}")]
    Unavailable { player_id: u64, message_type: String },

    /// A reply arrived but could not be decoded.
    #[error("Malformed player reply: {0}")]
    MalformedReply(String),
}
