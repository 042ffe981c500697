//! # ActorEntity Trait
//!
//! The `ActorEntity` trait is the contract every sharded entity type (a player,
//! a guild, ...) implements to be hosted by an [`ActorSystem`](crate::ActorSystem).
//! The runtime owns the plumbing (mailbox, hydration, persistence, routing);
//! the entity only decides how a message changes its state.
//!
//! The state itself is the entity value. It must be serializable because the
//! runtime writes it through to the warm cache and the durable store, and
//! reads it back when the actor is hydrated again after eviction.
//!
//! # Provided Methods (Hooks)
//! - [`ActorEntity::on_activate`] runs once after hydration, before the first message.
//! - [`ActorEntity::on_passivate`] runs once before the final flush.
//!
//! Both default to doing nothing.

use crate::actor::ActorShared;
use crate::message::{Origin, Payload};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::Ordering;

/// Trait that any sharded entity must implement to be managed by an `ActorSystem`.
///
/// # Async & Context
/// The trait is `#[async_trait]` so handlers may await (for instance on another
/// actor through the router). The `Context` associated type is injected once at
/// construction and handed to every handler call, which keeps dependencies out
/// of the serialized state.
#[async_trait]
pub trait ActorEntity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Runtime dependencies shared by every actor of this type.
    /// Use `()` if no dependencies are needed.
    type Context: Send + Sync + 'static;

    /// The error type for this entity.
    ///
    /// One error enum per entity type rather than one per message type; a
    /// failing `ask` surfaces it boxed inside [`ActorError::Entity`](crate::ActorError::Entity).
    type Error: std::error::Error + Send + Sync + 'static;

    /// Handle one business message. The returned payload resolves the caller's
    /// ask, and is discarded for a tell.
    ///
    /// Call [`ActorContext::mark_dirty`] whenever the state changed so the
    /// persistence sweep writes it through.
    async fn handle(
        &mut self,
        ctx: &mut ActorContext<'_, Self>,
        kind: &str,
        payload: Payload,
    ) -> Result<Payload, Self::Error>;

    /// Called after hydration and before the first message is processed.
    async fn on_activate(&mut self, _ctx: &mut ActorContext<'_, Self>) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called when the actor leaves memory (eviction or shutdown), before the
    /// final flush.
    async fn on_passivate(&mut self, _ctx: &mut ActorContext<'_, Self>) {}
}

/// What a handler can see of the runtime while processing a message.
pub struct ActorContext<'a, E: ActorEntity> {
    system: &'a str,
    origin: Origin,
    shared: &'a ActorShared,
    context: &'a E::Context,
}

impl<'a, E: ActorEntity> ActorContext<'a, E> {
    pub(crate) fn new(
        system: &'a str,
        origin: Origin,
        shared: &'a ActorShared,
        context: &'a E::Context,
    ) -> Self {
        Self {
            system,
            origin,
            shared,
            context,
        }
    }

    pub fn entity_id(&self) -> u64 {
        self.shared.entity_id
    }

    /// Name of the actor system hosting this entity.
    pub fn system(&self) -> &str {
        self.system
    }

    /// Whether the message being handled came from this process or a peer.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// The dependencies injected when the actor system was built.
    pub fn context(&self) -> &E::Context {
        self.context
    }

    /// Flags the state as not yet reflected in the cache and store.
    pub fn mark_dirty(&mut self) {
        self.shared.dirty.store(true, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.shared.dirty.load(Ordering::Acquire)
    }
}
