//! # Player Actor
//!
//! Hosts [`Player`] entities: one actor per player id, hydrated on first
//! message and evicted once idle.
//!
//! ## Structure
//!
//! - [`entity`] - [`ActorEntity`](shard_actor::ActorEntity) implementation for [`Player`]
//! - [`error`] - [`PlayerError`] type for type-safe error handling
//! - [`new_system()`] - Builds the actor system for players
//!
//! ## Usage
//!
//! ```rust
//! use game_sample::player_actor;
//! use game_sample::model::player_messages;
//! use shard_actor::{ActorMessage, ActorSystemConfig, Storage};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let players = player_actor::new_system(ActorSystemConfig::default(), Storage::in_memory());
//!     players.start();
//!
//!     let message = ActorMessage::new(player_messages::ADD_GOLD, serde_json::json!(100));
//!     let gold = players.ask(1001, message, Duration::from_secs(1)).await?;
//!     assert_eq!(gold, serde_json::json!(100));
//!
//!     players.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod entity;
pub mod error;

pub use error::*;

use crate::model::{Player, PLAYER_SYSTEM};
use shard_actor::{ActorSystem, ActorSystemConfig, Storage};

/// Creates the player actor system. Call `start()` to run its sweeps.
pub fn new_system(config: ActorSystemConfig, storage: Storage) -> ActorSystem<Player> {
    ActorSystem::new(PLAYER_SYSTEM, config, storage, (), Player::new)
}
