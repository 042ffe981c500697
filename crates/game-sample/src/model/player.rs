use serde::{Deserialize, Serialize};

/// Actor system name for players.
pub const PLAYER_SYSTEM: &str = "player";

/// Message kinds understood by a [`Player`] actor.
pub mod player_messages {
    /// Payload: amount (u64). Reply: new balance.
    pub const ADD_GOLD: &str = "ADD_GOLD";
    /// Payload: amount (u64). Reply: [`SpendOutcome`](super::SpendOutcome).
    pub const SPEND_GOLD: &str = "SPEND_GOLD";
    /// Reply: the full [`Player`](super::Player).
    pub const GET_INFO: &str = "GET_INFO";
    /// Payload: new name (string).
    pub const SET_NAME: &str = "SET_NAME";
    /// Payload: guild id (u64), or null to leave.
    pub const JOIN_GUILD: &str = "JOIN_GUILD";
}

/// A player profile and wallet.
///
/// The state is owned by exactly one actor; see
/// [`impl ActorEntity for Player`](#impl-ActorEntity-for-Player) for the
/// message handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: u64,
    pub name: String,
    pub gold: u64,
    pub level: u32,
    pub guild_id: Option<u64>,
}

impl Player {
    /// State of a player never seen before.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            name: format!("player-{id}"),
            gold: 0,
            level: 1,
            guild_id: None,
        }
    }
}

/// Reply to `SPEND_GOLD`. Running short is a normal outcome, not a handler
/// failure, so it travels back as data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendOutcome {
    pub spent: bool,
    pub gold: u64,
}
