//! Typed wrappers around the [`ShardRouter`](shard_actor::ShardRouter), one per entity type.

pub mod guild_client;
pub mod player_client;

pub use guild_client::*;
pub use player_client::*;
