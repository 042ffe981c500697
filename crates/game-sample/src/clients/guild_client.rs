//! # Guild Client
//!
//! High-level API for guild actors, plus the player-to-guild flows that
//! touch both entity types.
use super::PlayerClient;
use crate::guild_actor::GuildError;
use crate::model::{guild_messages as msg, Guild, GUILD_SYSTEM};
use serde::de::DeserializeOwned;
use serde_json::json;
use shard_actor::{EntityClient, Payload, ShardRouter};
use tracing::{error, info, instrument};

/// Client for interacting with guild actors.
#[derive(Clone)]
pub struct GuildClient {
    router: ShardRouter,
    players: PlayerClient,
}

impl GuildClient {
    pub fn new(router: ShardRouter, players: PlayerClient) -> Self {
        Self { router, players }
    }
}

impl EntityClient for GuildClient {
    type Error = GuildError;

    fn system(&self) -> &str {
        GUILD_SYSTEM
    }

    fn router(&self) -> &ShardRouter {
        &self.router
    }

    fn unavailable(entity_id: u64, message_type: &str) -> Self::Error {
        GuildError::Unavailable {
            guild_id: entity_id,
            message_type: message_type.to_string(),
        }
    }
}

impl GuildClient {
    /// Adds gold to the treasury and returns the new total.
    #[instrument(skip(self))]
    pub async fn deposit(&self, guild_id: u64, amount: u64) -> Result<u64, GuildError> {
        let reply = self.request(guild_id, msg::DEPOSIT, json!(amount)).await?;
        decode_reply(reply)
    }

    #[instrument(skip(self))]
    pub async fn get_info(&self, guild_id: u64) -> Result<Guild, GuildError> {
        let reply = self.request(guild_id, msg::GET_INFO, Payload::Null).await?;
        decode_reply(reply)
    }

    /// Adds the player to the roster and points the player at the guild.
    /// Returns the member count.
    #[instrument(skip(self))]
    pub async fn enroll(&self, guild_id: u64, player_id: u64) -> Result<usize, GuildError> {
        let reply = self.request(guild_id, msg::ADD_MEMBER, json!(player_id)).await?;
        let members: usize = decode_reply(reply)?;
        self.players.join_guild(player_id, Some(guild_id)).await?;
        info!(members, "Player enrolled");
        Ok(members)
    }

    /// Moves gold from a player's wallet into the guild treasury. Returns the
    /// new treasury.
    #[instrument(skip(self))]
    pub async fn donate(&self, player_id: u64, guild_id: u64, amount: u64) -> Result<u64, GuildError> {
        let remaining = self.players.spend_gold(player_id, amount).await?;
        match self.deposit(guild_id, amount).await {
            Ok(treasury) => {
                info!(remaining, treasury, "Donation completed");
                Ok(treasury)
            }
            Err(e) => {
                // The deposit may still have been applied, so the gold is not refunded.
                error!(error = %e, "Donation debited but deposit unconfirmed");
                Err(e)
            }
        }
    }
}

fn decode_reply<T: DeserializeOwned>(reply: Payload) -> Result<T, GuildError> {
    serde_json::from_value(reply).map_err(|e| GuildError::MalformedReply(e.to_string()))
}
