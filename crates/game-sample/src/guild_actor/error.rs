//! Error types for the Guild actor.

use crate::player_actor::PlayerError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GuildError {
    #[error("Invalid payload for {message_type}: {reason}")]
    InvalidPayload { message_type: String, reason: String },

    #[error("Unknown guild message: {0}")]
    UnknownMessage(String),

    /// The message was not accepted or the reply never came.
    #[error("Guild {guild_id} unavailable for {message_type}")]
    Unavailable { guild_id: u64, message_type: String },

    #[error("Malformed guild reply: {0}")]
    MalformedReply(String),

    /// A player step of a guild flow failed.
    #[error(transparent)]
    Player(#[from] PlayerError),
}
