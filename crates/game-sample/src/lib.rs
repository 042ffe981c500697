//! # Game Sample Library
//!
//! A thin game node built on `shard_actor`, exposed as a library for
//! integration testing.

pub mod clients;
pub mod guild_actor;
pub mod lifecycle;
pub mod model;
pub mod player_actor;
