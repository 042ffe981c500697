//! # Entity Actor
//!
//! This module defines the per-entity actor: the task that owns one entity's
//! state and drains its mailbox one envelope at a time, and [`ActorRef`], the
//! cheap handle callers use to reach it.
//!
//! **Concurrency model**: each resident entity has exactly one tokio task. The
//! task exclusively owns the state, so handlers mutate it without locks; two
//! callers racing on the same entity are simply queued one after the other.
//!
//! **Lifecycle**: `Hydrating` → `Active` ⇄ `Flushing` → `Evicted`.
//!
//! 1. Hydrating: state is loaded from the warm cache, else the durable store,
//!    else the system's default-state factory. Messages sent meanwhile queue.
//! 2. Active: business messages and flush requests are processed in order.
//! 3. Flushing: the state is written through to cache then store. Because
//!    flushes are mailbox envelopes, at most one is ever in flight.
//! 4. Evicted: the mailbox is closed and drained, a final flush runs, the actor
//!    leaves the registry and only then signals termination.

use crate::entity::{ActorContext, ActorEntity};
use crate::error::ActorError;
use crate::mailbox::{MailboxReceiver, MailboxSender, Rejected};
use crate::message::{ActorMessage, Envelope, Origin, Payload};
use crate::storage::{cache_key, EntityRecord};
use crate::system::ActorSystem;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Where an actor is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Hydrating,
    Active,
    Flushing,
    Evicted,
}

impl LifecyclePhase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => LifecyclePhase::Hydrating,
            1 => LifecyclePhase::Active,
            2 => LifecyclePhase::Flushing,
            _ => LifecyclePhase::Evicted,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            LifecyclePhase::Hydrating => 0,
            LifecyclePhase::Active => 1,
            LifecyclePhase::Flushing => 2,
            LifecyclePhase::Evicted => 3,
        }
    }
}

/// Point-in-time diagnostics of one actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorStats {
    pub entity_id: u64,
    pub phase: LifecyclePhase,
    pub dirty: bool,
    pub processed: u64,
    pub idle_for: Duration,
}

/// State shared between an actor task and its handles.
#[derive(Debug)]
pub(crate) struct ActorShared {
    pub(crate) entity_id: u64,
    /// Distinguishes successive incarnations of the same entity in the registry.
    pub(crate) generation: u64,
    pub(crate) dirty: AtomicBool,
    phase: AtomicU8,
    created_at: Instant,
    last_access_ms: AtomicU64,
    processed: AtomicU64,
    terminated: watch::Sender<bool>,
}

impl ActorShared {
    pub(crate) fn new(entity_id: u64, generation: u64) -> Self {
        let (terminated, _) = watch::channel(false);
        Self {
            entity_id,
            generation,
            dirty: AtomicBool::new(false),
            phase: AtomicU8::new(LifecyclePhase::Hydrating.as_u8()),
            created_at: Instant::now(),
            last_access_ms: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            terminated,
        }
    }

    pub(crate) fn touch(&self) {
        let elapsed = self.created_at.elapsed().as_millis() as u64;
        self.last_access_ms.fetch_max(elapsed, Ordering::AcqRel);
    }

    pub(crate) fn idle_for(&self) -> Duration {
        let last_access = Duration::from_millis(self.last_access_ms.load(Ordering::Acquire));
        self.created_at.elapsed().saturating_sub(last_access)
    }

    fn phase(&self) -> LifecyclePhase {
        LifecyclePhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn set_phase(&self, phase: LifecyclePhase) {
        self.phase.store(phase.as_u8(), Ordering::Release);
    }
}

/// Handle to one resident actor. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct ActorRef {
    sender: MailboxSender,
    shared: Arc<ActorShared>,
}

impl ActorRef {
    pub(crate) fn new(sender: MailboxSender, shared: Arc<ActorShared>) -> Self {
        Self { sender, shared }
    }

    pub fn entity_id(&self) -> u64 {
        self.shared.entity_id
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.shared.phase()
    }

    pub fn is_dirty(&self) -> bool {
        self.shared.dirty.load(Ordering::Acquire)
    }

    pub fn idle_for(&self) -> Duration {
        self.shared.idle_for()
    }

    pub fn stats(&self) -> ActorStats {
        ActorStats {
            entity_id: self.entity_id(),
            phase: self.phase(),
            dirty: self.is_dirty(),
            processed: self.shared.processed.load(Ordering::Acquire),
            idle_for: self.idle_for(),
        }
    }

    pub(crate) fn shared(&self) -> Arc<ActorShared> {
        self.shared.clone()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.shared.generation
    }

    pub(crate) fn touch(&self) {
        self.shared.touch();
    }

    /// Enqueues a message without waiting for it to be processed.
    ///
    /// Fails only when the mailbox cannot take it: full, or closed because the
    /// actor is passivating. The actor system retries the latter on a fresh
    /// incarnation; direct users of `ActorRef` see the error.
    pub fn tell(&self, message: ActorMessage) -> Result<(), ActorError> {
        self.try_deliver(Envelope::Message(message))
            .map_err(|rejected| self.refuse(rejected))
    }

    /// Enqueues a message and waits up to `timeout` for the actor's reply.
    ///
    /// A timeout releases only the caller: the actor still processes the
    /// message, so the outcome is unknown rather than failed.
    pub async fn ask(&self, message: ActorMessage, timeout: Duration) -> Result<Payload, ActorError> {
        let (message, response) = message.expecting_reply();
        self.tell(message)?;
        match tokio::time::timeout(timeout, response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ActorError::ActorDropped),
            Err(_) => Err(ActorError::AskTimeout(timeout)),
        }
    }

    pub(crate) fn try_deliver(&self, envelope: Envelope) -> Result<(), Rejected> {
        self.touch();
        self.sender.try_send(envelope)
    }

    /// Resolves a pending ask carried by the rejected envelope and returns
    /// the matching error for the sender.
    pub(crate) fn refuse(&self, rejected: Rejected) -> ActorError {
        let entity_id = self.entity_id();
        match rejected {
            Rejected::Full(envelope) => {
                envelope.reject(ActorError::MailboxFull(entity_id));
                ActorError::MailboxFull(entity_id)
            }
            Rejected::Closed(envelope) => {
                envelope.reject(ActorError::MailboxClosed(entity_id));
                ActorError::MailboxClosed(entity_id)
            }
        }
    }

    /// Asks the actor to write its state through if dirty. An actor that is
    /// already passivating flushes on its own, so this reports `false` then.
    pub(crate) async fn request_flush(&self) -> Result<bool, ActorError> {
        let (respond_to, response) = oneshot::channel();
        let envelope = Envelope::Flush {
            respond_to: Some(respond_to),
        };
        if self.sender.send(envelope).await.is_err() {
            return Ok(false);
        }
        response.await.map_err(|_| ActorError::ActorDropped)?
    }

    /// Asks the actor to passivate if it is still idle. Returns whether it left
    /// the registry.
    pub(crate) async fn request_evict(&self, idle_timeout: Duration) -> bool {
        let (respond_to, response) = oneshot::channel();
        let envelope = Envelope::Evict {
            idle_timeout,
            respond_to,
        };
        if self.sender.try_send(envelope).is_err() {
            return false;
        }
        response.await.unwrap_or(false)
    }

    /// Stops the actor after a final flush. Returns whether its state was
    /// written through.
    pub(crate) async fn request_stop(&self) -> bool {
        let (respond_to, response) = oneshot::channel();
        let envelope = Envelope::Stop {
            respond_to: Some(respond_to),
        };
        if self.sender.send(envelope).await.is_err() {
            self.terminated().await;
            return !self.is_dirty();
        }
        response.await.unwrap_or(false)
    }

    /// Resolves once the actor has flushed, left the registry and stopped.
    pub async fn terminated(&self) {
        let mut terminated = self.shared.terminated.subscribe();
        let _ = terminated.wait_for(|done| *done).await;
    }
}

/// The task side of an actor: owns the receiver and, once hydrated, the state.
pub(crate) struct Actor<E: ActorEntity> {
    system: ActorSystem<E>,
    shared: Arc<ActorShared>,
    receiver: MailboxReceiver,
    version: u64,
}

impl<E: ActorEntity> Actor<E> {
    pub(crate) fn new(
        system: ActorSystem<E>,
        shared: Arc<ActorShared>,
        receiver: MailboxReceiver,
    ) -> Self {
        Self {
            system,
            shared,
            receiver,
            version: 0,
        }
    }

    /// Runs the actor until it is evicted, stopped, or abandoned.
    pub(crate) async fn run(mut self) {
        let system = self.system.name().to_string();
        let entity_id = self.shared.entity_id;

        let mut state = match self.hydrate().await {
            Ok(state) => state,
            Err(e) => {
                error!(%system, entity_id, error = %e, "Hydration failed, abandoning actor");
                self.abandon(e.to_string()).await;
                return;
            }
        };

        {
            let mut ctx = self.context(Origin::Local);
            if let Err(e) = state.on_activate(&mut ctx).await {
                error!(%system, entity_id, error = %e, "on_activate failed, abandoning actor");
                self.abandon(e.to_string()).await;
                return;
            }
        }

        self.shared.set_phase(LifecyclePhase::Active);
        info!(%system, entity_id, version = self.version, "Actor activated");

        while let Some(envelope) = self.receiver.recv().await {
            match envelope {
                Envelope::Message(message) => self.process(&mut state, message).await,
                Envelope::Flush { respond_to } => {
                    let result = self.flush(&state).await;
                    if let Some(respond_to) = respond_to {
                        let _ = respond_to.send(result);
                    }
                }
                Envelope::Evict {
                    idle_timeout,
                    respond_to,
                } => {
                    // Messages processed since the sweep picked this actor reset its idleness.
                    if self.shared.idle_for() < idle_timeout {
                        debug!(%system, entity_id, "Eviction skipped, actor is busy again");
                        let _ = respond_to.send(false);
                        continue;
                    }
                    if let Err(e) = self.flush(&state).await {
                        warn!(%system, entity_id, error = %e, "Eviction postponed, flush failed");
                        let _ = respond_to.send(false);
                        continue;
                    }
                    self.passivate(&mut state, Vec::new()).await;
                    info!(%system, entity_id, "Actor evicted");
                    let _ = respond_to.send(true);
                    return;
                }
                Envelope::Stop { respond_to } => {
                    self.passivate(&mut state, respond_to.into_iter().collect())
                        .await;
                    return;
                }
            }
        }

        self.passivate(&mut state, Vec::new()).await;
    }

    fn context(&self, origin: Origin) -> ActorContext<'_, E> {
        ActorContext::new(
            self.system.name(),
            origin,
            &self.shared,
            self.system.entity_context(),
        )
    }

    async fn process(&self, state: &mut E, message: ActorMessage) {
        let entity_id = self.shared.entity_id;
        let (kind, payload, origin, respond_to) = message.into_parts();
        self.shared.touch();
        debug!(system = self.system.name(), entity_id, %kind, %origin, "Handling message");

        let mut ctx = self.context(origin);
        let result = state
            .handle(&mut ctx, &kind, payload)
            .await
            .map_err(|e| ActorError::Entity(Box::new(e)));
        self.shared.processed.fetch_add(1, Ordering::AcqRel);
        self.shared.touch();

        if let Err(e) = &result {
            warn!(system = self.system.name(), entity_id, %kind, error = %e, "Handler failed");
        }
        if let Some(respond_to) = respond_to {
            // The caller may have timed out; its reply is dropped then.
            let _ = respond_to.send(result);
        }
    }

    async fn hydrate(&mut self) -> Result<E, ActorError> {
        let system = self.system.name().to_string();
        let entity_id = self.shared.entity_id;
        let storage = self.system.storage();
        let key = cache_key(&system, entity_id);

        match storage.cache.get(&key).await {
            Ok(Some(raw)) => match decode_record::<E>(&raw) {
                Ok((record, state)) => {
                    self.version = record.version;
                    debug!(%system, entity_id, version = record.version, "Hydrated from warm cache");
                    return Ok(state);
                }
                Err(e) => warn!(%system, entity_id, error = %e, "Discarding undecodable cache entry"),
            },
            Ok(None) => {}
            Err(e) => warn!(%system, entity_id, error = %e, "Warm cache unavailable during hydration"),
        }

        if let Some(record) = storage.store.find_by_id(&system, entity_id).await? {
            let state: E =
                serde_json::from_str(&record.state).map_err(|e| ActorError::Hydration {
                    entity_id,
                    reason: e.to_string(),
                })?;
            self.version = record.version;
            debug!(%system, entity_id, version = record.version, "Hydrated from durable store");
            match serde_json::to_string(&record) {
                Ok(raw) => {
                    if let Err(e) = storage.cache.set(&key, raw, self.system.config().cache_ttl()).await {
                        debug!(%system, entity_id, error = %e, "Could not re-warm cache");
                    }
                }
                Err(e) => debug!(%system, entity_id, error = %e, "Could not re-warm cache"),
            }
            return Ok(state);
        }

        debug!(%system, entity_id, "No shadow found, using default state");
        Ok(self.system.default_state(entity_id))
    }

    /// Writes the state through to cache then store if it is dirty. The dirty
    /// flag is cleared only when both writes succeed.
    async fn flush(&mut self, state: &E) -> Result<bool, ActorError> {
        if !self.shared.dirty.load(Ordering::Acquire) {
            return Ok(false);
        }
        let previous = self.shared.phase();
        self.shared.set_phase(LifecyclePhase::Flushing);
        let result = self.write_through(state).await;
        self.shared.set_phase(previous);

        match result {
            Ok(()) => {
                self.shared.dirty.store(false, Ordering::Release);
                debug!(system = self.system.name(), entity_id = self.shared.entity_id, version = self.version, "Flushed");
                Ok(true)
            }
            Err(e) => {
                warn!(system = self.system.name(), entity_id = self.shared.entity_id, error = %e, "Flush failed, will retry");
                Err(e)
            }
        }
    }

    async fn write_through(&mut self, state: &E) -> Result<(), ActorError> {
        let system = self.system.name();
        let entity_id = self.shared.entity_id;
        let storage = self.system.storage();
        let version = self.version + 1;

        let record = EntityRecord::new(system, entity_id, serde_json::to_string(state)?, version);
        let cached = serde_json::to_string(&record)?;

        // Both tiers are attempted even if the cache is down.
        let cache_result = storage
            .cache
            .set(&cache_key(system, entity_id), cached, self.system.config().cache_ttl())
            .await;
        let store_result = storage.store.save(record).await;
        if let (Err(e), Ok(())) = (&cache_result, &store_result) {
            // The cached shadow is now older than the store and would win at hydration.
            let key = cache_key(system, entity_id);
            match storage.cache.delete(&key).await {
                Ok(()) => debug!(%system, entity_id, error = %e, "Invalidated stale cache entry"),
                Err(delete_error) => {
                    error!(%system, entity_id, error = %delete_error, "Stale cache entry could not be invalidated")
                }
            }
        }
        cache_result?;
        store_result?;

        self.version = version;
        Ok(())
    }

    async fn flush_with_retry(&mut self, state: &E) -> bool {
        let attempts = self.system.config().flush_retry_attempts.max(1);
        for attempt in 0..attempts {
            if self.flush(state).await.is_ok() {
                return true;
            }
            if attempt + 1 < attempts {
                tokio::time::sleep(Duration::from_millis(100 << attempt.min(6))).await;
            }
        }
        false
    }

    /// Closes the mailbox, processes what was already queued, flushes, leaves
    /// the registry, then signals termination.
    async fn passivate(&mut self, state: &mut E, mut stop_waiters: Vec<oneshot::Sender<bool>>) {
        let system = self.system.name().to_string();
        let entity_id = self.shared.entity_id;

        {
            let mut ctx = self.context(Origin::Local);
            state.on_passivate(&mut ctx).await;
        }

        self.receiver.close();
        while let Some(envelope) = self.receiver.recv().await {
            match envelope {
                Envelope::Message(message) => self.process(state, message).await,
                Envelope::Flush { respond_to } => {
                    if let Some(respond_to) = respond_to {
                        let _ = respond_to.send(Ok(false));
                    }
                }
                Envelope::Evict { respond_to, .. } => {
                    let _ = respond_to.send(false);
                }
                Envelope::Stop { respond_to } => stop_waiters.extend(respond_to),
            }
        }

        let flushed = self.flush_with_retry(state).await;
        if !flushed {
            error!(%system, entity_id, "Final flush failed, latest state was not persisted");
        }

        self.shared.set_phase(LifecyclePhase::Evicted);
        self.system.deregister(entity_id, self.shared.generation);
        self.shared.terminated.send_replace(true);
        for waiter in stop_waiters {
            let _ = waiter.send(flushed);
        }
    }

    /// Gives up on an actor that never became active. Queued asks fail and the
    /// next reference to the entity retries hydration.
    async fn abandon(&mut self, reason: String) {
        let entity_id = self.shared.entity_id;
        self.shared.set_phase(LifecyclePhase::Evicted);
        self.receiver.close();
        while let Some(envelope) = self.receiver.recv().await {
            envelope.reject(ActorError::Hydration {
                entity_id,
                reason: reason.clone(),
            });
        }
        self.system.deregister(entity_id, self.shared.generation);
        self.shared.terminated.send_replace(true);
    }
}

// A handler panic or a runtime shutdown ends the task without passivating.
// Waiters on `terminated` must still be released and the registry slot freed.
impl<E: ActorEntity> Drop for Actor<E> {
    fn drop(&mut self) {
        if *self.shared.terminated.borrow() {
            return;
        }
        error!(
            system = self.system.name(),
            entity_id = self.shared.entity_id,
            dirty = self.shared.dirty.load(Ordering::Acquire),
            "Actor task ended without passivating"
        );
        self.shared.set_phase(LifecyclePhase::Evicted);
        self.system.deregister(self.shared.entity_id, self.shared.generation);
        self.shared.terminated.send_replace(true);
    }
}

fn decode_record<E: ActorEntity>(raw: &str) -> Result<(EntityRecord, E), serde_json::Error> {
    let record: EntityRecord = serde_json::from_str(raw)?;
    let state = serde_json::from_str(&record.state)?;
    Ok((record, state))
}
