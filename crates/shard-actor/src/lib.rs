//! # Shard Actor
//!
//! A distributed actor runtime for game-server backends. Mutable per-entity
//! state (a player, a guild) is owned by exactly one in-memory actor at a time,
//! processed without locks, and sharded across a cluster of nodes by a
//! consistent hash ring.
//!
//! ## Why actors?
//!
//! - **Single writer**: each entity's state is mutated only by its own actor
//!   task, one message at a time, so handlers need no locks
//! - **Lazy residency**: actors are hydrated on first reference and evicted
//!   when idle, so memory tracks the active player base, not the whole table
//! - **Location transparency**: callers name an entity; the router decides
//!   whether it lives here or on a peer
//!
//! **Further Reading**:
//! - [Actors with Tokio](https://ryhl.io/blog/actors-with-tokio/) - the task + channel shape used here
//! - [Consistent hashing (Wikipedia)](https://en.wikipedia.org/wiki/Consistent_hashing) - why virtual nodes bound key movement
//!
//! ## Architecture Overview
//!
//! 1. **Entity Layer** ([`ActorEntity`]) - your state type and its message handler
//! 2. **Actor Layer** ([`ActorRef`], [`ActorSystem`]) - mailbox, hydration, persistence sweeps, eviction
//! 3. **Shard Layer** ([`ConsistentHashRing`], [`ClusterMembership`]) - which node owns which entity
//! 4. **Routing Layer** ([`ShardRouter`], [`RemoteDeliveryEndpoint`], [`RpcTransport`]) - local or remote delivery
//!
//! ## State Tiers
//!
//! The actor's in-memory state is authoritative. Dirty state is written
//! through to a [`WarmCache`] and then a [`DurableStore`] by a periodic sweep,
//! on eviction and on shutdown. Hydration reads the same tiers in the same
//! order, falling back to a default-state factory for entities never seen.
//!
//! ## Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use serde::{Deserialize, Serialize};
//! use serde_json::json;
//! use shard_actor::{
//!     ActorContext, ActorEntity, ActorSystem, ActorSystemConfig, ClusterConfig, ClusterMembership,
//!     LoopbackTransport, Payload, ShardRouter, Storage, SystemRegistry,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Counter { id: u64, value: i64 }
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("unknown message {0}")]
//! struct CounterError(String);
//!
//! #[async_trait]
//! impl ActorEntity for Counter {
//!     type Context = ();
//!     type Error = CounterError;
//!
//!     async fn handle(&mut self, ctx: &mut ActorContext<'_, Self>, kind: &str, payload: Payload) -> Result<Payload, CounterError> {
//!         match kind {
//!             "ADD" => {
//!                 self.value += payload.as_i64().unwrap_or(0);
//!                 ctx.mark_dirty();
//!                 Ok(json!(self.value))
//!             }
//!             "GET" => Ok(json!(self.value)),
//!             other => Err(CounterError(other.to_string())),
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let counters = ActorSystem::new("counter", ActorSystemConfig::default(), Storage::in_memory(), (), |id| Counter { id, value: 0 });
//!     counters.start();
//!
//!     let systems = SystemRegistry::new();
//!     systems.register(counters.clone());
//!     let router = ShardRouter::new(
//!         ClusterConfig::default(),
//!         systems,
//!         Arc::new(ClusterMembership::new(160)),
//!         Arc::new(LoopbackTransport::new()),
//!     );
//!
//!     assert!(router.tell("counter", 7, "ADD", json!(5)).await);
//!     let value = router.ask("counter", 7, "GET", Payload::Null, Duration::from_secs(1)).await;
//!     assert_eq!(value, Some(json!(5)));
//!
//!     counters.shutdown().await;
//! }
//! ```
//!
//! ## Testing
//!
//! [`MemoryCache`] and [`MemoryStore`] can fail on demand to exercise the
//! persistence-failure paths, [`LoopbackTransport`] can disconnect or blackhole
//! a node, and the [`mock`] module offers an expectation-driven transport for
//! router tests.

pub mod actor;
pub mod client;
pub mod config;
pub mod entity;
pub mod error;
mod mailbox;
pub mod membership;
pub mod message;
pub mod mock;
pub mod registry;
pub mod remote;
pub mod ring;
pub mod router;
pub mod storage;
pub mod system;
pub mod tracing;
pub mod transport;

// Re-export core types for convenience
pub use actor::{ActorRef, ActorStats, LifecyclePhase};
pub use client::{EntityClient, DEFAULT_ASK_TIMEOUT};
pub use config::{ActorSystemConfig, ClusterConfig, RoutingPolicy};
pub use entity::{ActorContext, ActorEntity};
pub use error::{ActorError, StorageError};
pub use membership::{ClusterMembership, ShardMap};
pub use message::{ActorMessage, Origin, Payload, Response};
pub use registry::{LocalDelivery, SystemRegistry};
pub use remote::{RemoteDeliveryEndpoint, RemoteRequest, RemoteResponse};
pub use ring::{ClusterNode, ConsistentHashRing};
pub use router::{Route, ShardRouter};
pub use storage::{cache_key, DurableStore, EntityRecord, MemoryCache, MemoryStore, Storage, WarmCache};
pub use system::{ActorSystem, FlushReport, ShutdownReport};
pub use transport::{LoopbackTransport, RpcTransport};
