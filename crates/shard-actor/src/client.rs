//! # EntityClient Trait
//!
//! Domain clients (a `PlayerClient`, a `GuildClient`, ...) wrap the
//! [`ShardRouter`] for one actor system and translate its `bool` / `Option`
//! signals into their own error type. This trait supplies the plumbing so a
//! client only names its system, its router and its "unavailable" error.
//!
//! # Example
//!
//! ```rust
//! use shard_actor::{EntityClient, ShardRouter};
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("player {0} unavailable")]
//! struct PlayerUnavailable(u64);
//!
//! struct PlayerClient { router: ShardRouter }
//!
//! impl EntityClient for PlayerClient {
//!     type Error = PlayerUnavailable;
//!
//!     fn system(&self) -> &str { "player" }
//!     fn router(&self) -> &ShardRouter { &self.router }
//!     fn unavailable(entity_id: u64, _message_type: &str) -> Self::Error {
//!         PlayerUnavailable(entity_id)
//!     }
//! }
//!
//! // send(), request() and is_resident() are provided.
//! async fn usage(client: PlayerClient) {
//!     let _ = client.send(1001, "ADD_GOLD", serde_json::json!(100)).await;
//! }
//! ```

use crate::message::Payload;
use crate::router::ShardRouter;
use async_trait::async_trait;
use std::time::Duration;

/// Ask timeout used unless a client overrides [`EntityClient::ask_timeout`].
pub const DEFAULT_ASK_TIMEOUT: Duration = Duration::from_secs(3);

/// Trait for entity-specific clients to inherit routed tell/ask.
#[async_trait]
pub trait EntityClient: Send + Sync {
    /// The client's error type.
    type Error: Send + Sync;

    /// Actor system the client addresses.
    fn system(&self) -> &str;

    fn router(&self) -> &ShardRouter;

    /// Error returned when a tell was not accepted or an ask got no reply.
    /// The outcome of such a message is unknown, not failed.
    fn unavailable(entity_id: u64, message_type: &str) -> Self::Error;

    fn ask_timeout(&self) -> Duration {
        DEFAULT_ASK_TIMEOUT
    }

    /// Fire-and-forget.
    #[tracing::instrument(skip(self, payload))]
    async fn send(&self, entity_id: u64, message_type: &str, payload: Payload) -> Result<(), Self::Error> {
        tracing::debug!("Sending tell");
        if self
            .router()
            .tell(self.system(), entity_id, message_type, payload)
            .await
        {
            Ok(())
        } else {
            Err(Self::unavailable(entity_id, message_type))
        }
    }

    /// Request/reply within [`EntityClient::ask_timeout`].
    #[tracing::instrument(skip(self, payload))]
    async fn request(&self, entity_id: u64, message_type: &str, payload: Payload) -> Result<Payload, Self::Error> {
        tracing::debug!("Sending ask");
        self.router()
            .ask(self.system(), entity_id, message_type, payload, self.ask_timeout())
            .await
            .ok_or_else(|| Self::unavailable(entity_id, message_type))
    }

    /// Whether the entity is currently in memory on its owning node.
    async fn is_resident(&self, entity_id: u64) -> bool {
        self.router().has_actor(self.system(), entity_id).await
    }
}
