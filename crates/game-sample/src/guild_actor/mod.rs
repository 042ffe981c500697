//! # Guild Actor
//!
//! Hosts [`Guild`] entities: a treasury and a member roster per guild id.
//! Player-to-guild flows (donations) are orchestrated by
//! [`GuildClient`](crate::clients::GuildClient), not by the guild actor, so a
//! guild handler never waits on a player actor.
//!
//! ## Structure
//!
//! - [`entity`] - [`ActorEntity`](shard_actor::ActorEntity) implementation for [`Guild`]
//! - [`error`] - [`GuildError`]
//! - [`new_system()`] - Builds the actor system for guilds

pub mod entity;
pub mod error;

pub use error::*;

use crate::model::{Guild, GUILD_SYSTEM};
use shard_actor::{ActorSystem, ActorSystemConfig, Storage};

/// Creates the guild actor system. Call `start()` to run its sweeps.
pub fn new_system(config: ActorSystemConfig, storage: Storage) -> ActorSystem<Guild> {
    ActorSystem::new(GUILD_SYSTEM, config, storage, (), Guild::new)
}
