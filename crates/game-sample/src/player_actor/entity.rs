//! [`ActorEntity`] implementation for [`Player`].

use super::error::PlayerError;
use crate::model::{player_messages as msg, Player, SpendOutcome};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;
use shard_actor::{ActorContext, ActorEntity, Payload};
use tracing::debug;

#[async_trait]
impl ActorEntity for Player {
    type Context = ();
    type Error = PlayerError;

    /// Handles player messages.
    ///
    /// # Messages
    /// - `ADD_GOLD`: credits the wallet, replies with the balance
    /// - `SPEND_GOLD`: debits if the balance covers it, replies with a [`SpendOutcome`]
    /// - `GET_INFO`: replies with the whole player
    /// - `SET_NAME`, `JOIN_GUILD`: profile updates
    async fn handle(
        &mut self,
        ctx: &mut ActorContext<'_, Self>,
        kind: &str,
        payload: Payload,
    ) -> Result<Payload, PlayerError> {
        match kind {
            msg::ADD_GOLD => {
                let amount: u64 = decode(kind, payload)?;
                self.gold = self.gold.saturating_add(amount);
                ctx.mark_dirty();
                debug!(player_id = self.id, amount, gold = self.gold, "Gold added");
                Ok(json!(self.gold))
            }
            msg::SPEND_GOLD => {
                let amount: u64 = decode(kind, payload)?;
                let spent = self.gold >= amount;
                if spent {
                    self.gold -= amount;
                    ctx.mark_dirty();
                }
                let outcome = SpendOutcome {
                    spent,
                    gold: self.gold,
                };
                Ok(json!(outcome))
            }
            msg::GET_INFO => Ok(json!(self)),
            msg::SET_NAME => {
                let name: String = decode(kind, payload)?;
                if name.trim().is_empty() {
                    return Err(PlayerError::InvalidPayload {
                        message_type: kind.to_string(),
                        reason: "name is blank".to_string(),
                    });
                }
                self.name = name;
                ctx.mark_dirty();
                Ok(Payload::Null)
            }
            msg::JOIN_GUILD => {
                self.guild_id = decode(kind, payload)?;
                ctx.mark_dirty();
                Ok(json!(self.guild_id))
            }
            other => Err(PlayerError::UnknownMessage(other.to_string())),
        }
    }
}

fn decode<T: DeserializeOwned>(kind: &str, payload: Payload) -> Result<T, PlayerError> {
    serde_json::from_value(payload).map_err(|e| PlayerError::InvalidPayload {
        message_type: kind.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shard_actor::{ActorMessage, ActorSystem, ActorSystemConfig, Storage};
    use std::time::Duration;

    fn players() -> ActorSystem<Player> {
        ActorSystem::new(
            "player",
            ActorSystemConfig::default(),
            Storage::in_memory(),
            (),
            Player::new,
        )
    }

    async fn ask(system: &ActorSystem<Player>, kind: &str, payload: Payload) -> Result<Payload, shard_actor::ActorError> {
        system
            .ask(1, ActorMessage::new(kind, payload), Duration::from_secs(1))
            .await
    }

    #[tokio::test]
    async fn spend_beyond_balance_is_refused_without_change() {
        let system = players();
        ask(&system, msg::ADD_GOLD, json!(30)).await.unwrap();

        let reply = ask(&system, msg::SPEND_GOLD, json!(50)).await.unwrap();
        let outcome: SpendOutcome = serde_json::from_value(reply).unwrap();
        assert_eq!(outcome, SpendOutcome { spent: false, gold: 30 });

        let reply = ask(&system, msg::SPEND_GOLD, json!(20)).await.unwrap();
        let outcome: SpendOutcome = serde_json::from_value(reply).unwrap();
        assert_eq!(outcome, SpendOutcome { spent: true, gold: 10 });
    }

    #[tokio::test]
    async fn malformed_payload_is_a_handler_error() {
        let system = players();
        let err = ask(&system, msg::ADD_GOLD, json!("lots")).await.unwrap_err();
        assert!(err.to_string().contains("Invalid payload for ADD_GOLD"));

        let err = ask(&system, msg::SET_NAME, json!("  ")).await.unwrap_err();
        assert!(err.to_string().contains("name is blank"));
    }

    #[tokio::test]
    async fn new_player_defaults() {
        let system = players();
        let info: Player = serde_json::from_value(ask(&system, msg::GET_INFO, Payload::Null).await.unwrap()).unwrap();
        assert_eq!(info, Player::new(1));
        assert_eq!(info.level, 1);
        assert!(!system.get_actor(1).unwrap().is_dirty());
    }
}
