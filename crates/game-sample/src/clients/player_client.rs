//! # Player Client
//!
//! High-level API for player actors, wherever in the cluster they live.
use crate::model::{player_messages as msg, Player, SpendOutcome, PLAYER_SYSTEM};
use crate::player_actor::PlayerError;
use serde::de::DeserializeOwned;
use serde_json::json;
use shard_actor::{EntityClient, Payload, ShardRouter};
use tracing::{debug, instrument};

/// Client for interacting with player actors.
#[derive(Clone)]
pub struct PlayerClient {
    router: ShardRouter,
}

impl PlayerClient {
    pub fn new(router: ShardRouter) -> Self {
        Self { router }
    }
}

impl EntityClient for PlayerClient {
    type Error = PlayerError;

    fn system(&self) -> &str {
        PLAYER_SYSTEM
    }

    fn router(&self) -> &ShardRouter {
        &self.router
    }

    fn unavailable(entity_id: u64, message_type: &str) -> Self::Error {
        PlayerError::Unavailable {
            player_id: entity_id,
            message_type: message_type.to_string(),
        }
    }
}

impl PlayerClient {
    /// Credits gold without waiting for the new balance.
    #[instrument(skip(self))]
    pub async fn add_gold(&self, player_id: u64, amount: u64) -> Result<(), PlayerError> {
        self.send(player_id, msg::ADD_GOLD, json!(amount)).await
    }

    /// Debits gold and returns the remaining balance.
    #[instrument(skip(self))]
    pub async fn spend_gold(&self, player_id: u64, amount: u64) -> Result<u64, PlayerError> {
        let reply = self.request(player_id, msg::SPEND_GOLD, json!(amount)).await?;
        let outcome: SpendOutcome = decode_reply(reply)?;
        if outcome.spent {
            Ok(outcome.gold)
        } else {
            debug!(available = outcome.gold, "Spend refused");
            Err(PlayerError::InsufficientGold {
                requested: amount,
                available: outcome.gold,
            })
        }
    }

    #[instrument(skip(self))]
    pub async fn get_info(&self, player_id: u64) -> Result<Player, PlayerError> {
        let reply = self.request(player_id, msg::GET_INFO, Payload::Null).await?;
        decode_reply(reply)
    }

    #[instrument(skip(self))]
    pub async fn set_name(&self, player_id: u64, name: String) -> Result<(), PlayerError> {
        self.request(player_id, msg::SET_NAME, json!(name)).await?;
        Ok(())
    }

    /// Records guild membership on the player side only.
    #[instrument(skip(self))]
    pub async fn join_guild(&self, player_id: u64, guild_id: Option<u64>) -> Result<(), PlayerError> {
        self.request(player_id, msg::JOIN_GUILD, json!(guild_id)).await?;
        Ok(())
    }
}

fn decode_reply<T: DeserializeOwned>(reply: Payload) -> Result<T, PlayerError> {
    serde_json::from_value(reply).map_err(|e| PlayerError::MalformedReply(e.to_string()))
}
