//! [`ActorEntity`] implementation for [`Guild`].

use super::error::GuildError;
use crate::model::{guild_messages as msg, Guild};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;
use shard_actor::{ActorContext, ActorEntity, Payload};
use tracing::info;

#[async_trait]
impl ActorEntity for Guild {
    type Context = ();
    type Error = GuildError;

    async fn handle(
        &mut self,
        ctx: &mut ActorContext<'_, Self>,
        kind: &str,
        payload: Payload,
    ) -> Result<Payload, GuildError> {
        match kind {
            msg::DEPOSIT => {
                let amount: u64 = decode(kind, payload)?;
                self.treasury = self.treasury.saturating_add(amount);
                ctx.mark_dirty();
                Ok(json!(self.treasury))
            }
            msg::ADD_MEMBER => {
                let player_id: u64 = decode(kind, payload)?;
                if self.members.insert(player_id) {
                    ctx.mark_dirty();
                    info!(guild_id = self.id, player_id, "Member joined");
                }
                Ok(json!(self.members.len()))
            }
            msg::GET_INFO => Ok(json!(self)),
            other => Err(GuildError::UnknownMessage(other.to_string())),
        }
    }
}

fn decode<T: DeserializeOwned>(kind: &str, payload: Payload) -> Result<T, GuildError> {
    serde_json::from_value(payload).map_err(|e| GuildError::InvalidPayload {
        message_type: kind.to_string(),
        reason: e.to_string(),
    })
}
