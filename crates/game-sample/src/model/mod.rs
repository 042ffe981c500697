//! Serializable entity state types and the message kinds they accept.
//!
//! The structs here are plain data. Their [`ActorEntity`](shard_actor::ActorEntity)
//! implementations live in [`crate::player_actor`] and [`crate::guild_actor`].

pub mod guild;
pub mod player;

pub use guild::*;
pub use player::*;
