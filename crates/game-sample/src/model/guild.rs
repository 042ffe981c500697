use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Actor system name for guilds.
pub const GUILD_SYSTEM: &str = "guild";

/// Message kinds understood by a [`Guild`] actor.
pub mod guild_messages {
    /// Payload: amount (u64). Reply: new treasury.
    pub const DEPOSIT: &str = "DEPOSIT";
    /// Payload: player id (u64). Reply: member count.
    pub const ADD_MEMBER: &str = "ADD_MEMBER";
    /// Reply: the full [`Guild`](super::Guild).
    pub const GET_INFO: &str = "GET_INFO";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    pub id: u64,
    pub name: String,
    pub treasury: u64,
    pub members: BTreeSet<u64>,
}

impl Guild {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            name: format!("guild-{id}"),
            treasury: 0,
            members: BTreeSet::new(),
        }
    }
}
