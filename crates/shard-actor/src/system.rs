//! # Actor System
//!
//! An `ActorSystem<E>` hosts every resident actor of one entity type on this
//! node. It owns the registry from entity id to [`ActorRef`], creates actors on
//! first reference, and runs the two background sweeps:
//!
//! - **persistence**: every `save_interval`, ask each dirty actor to flush;
//! - **eviction**: every `eviction_check_interval`, passivate actors idle for
//!   longer than `idle_timeout`.
//!
//! The system is a cheap, clonable handle. Actor tasks hold a clone, so the
//! system outlives them; the sweeps hold only a weak reference.

use crate::actor::{Actor, ActorRef, ActorShared};
use crate::config::ActorSystemConfig;
use crate::error::ActorError;
use crate::mailbox::{mailbox, Rejected};
use crate::message::{ActorMessage, Envelope, Payload};
use crate::storage::Storage;
use crate::ActorEntity;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// How many times a message is re-offered to a fresh incarnation after
/// finding the mailbox of a passivating one closed.
const REDELIVERY_ATTEMPTS: usize = 3;

/// Outcome of one persistence sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Dirty actors asked to flush
    pub attempted: usize,
    /// Actors whose state was written through
    pub written: usize,
    /// Actors whose flush failed; they stay dirty for the next sweep
    pub failed: usize,
}

/// Outcome of a system shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub stopped: usize,
    /// Actors whose final flush did not succeed
    pub flush_failed: usize,
    /// Whether the deadline expired before every actor stopped
    pub timed_out: bool,
}

type StateFactory<E> = Box<dyn Fn(u64) -> E + Send + Sync>;

pub(crate) struct SystemInner<E: ActorEntity> {
    name: String,
    config: ActorSystemConfig,
    storage: Storage,
    context: E::Context,
    factory: StateFactory<E>,
    registry: DashMap<u64, ActorRef>,
    /// Registry slots taken, including creations still in flight.
    reserved: AtomicUsize,
    generations: AtomicU64,
    shutting_down: AtomicBool,
    sweepers: Mutex<Vec<JoinHandle<()>>>,
}

/// Hosts the actors of one entity type.
pub struct ActorSystem<E: ActorEntity> {
    inner: Arc<SystemInner<E>>,
}

impl<E: ActorEntity> Clone for ActorSystem<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E: ActorEntity> ActorSystem<E> {
    /// Builds a system. `factory` produces the default state of an entity that
    /// has no shadow in either the cache or the store.
    ///
    /// Background sweeps do not run until [`ActorSystem::start`] is called.
    pub fn new(
        name: impl Into<String>,
        config: ActorSystemConfig,
        storage: Storage,
        context: E::Context,
        factory: impl Fn(u64) -> E + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(SystemInner {
                name: name.into(),
                config,
                storage,
                context,
                factory: Box::new(factory),
                registry: DashMap::new(),
                reserved: AtomicUsize::new(0),
                generations: AtomicU64::new(0),
                shutting_down: AtomicBool::new(false),
                sweepers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &ActorSystemConfig {
        &self.inner.config
    }

    pub(crate) fn storage(&self) -> &Storage {
        &self.inner.storage
    }

    pub(crate) fn entity_context(&self) -> &E::Context {
        &self.inner.context
    }

    pub(crate) fn default_state(&self, entity_id: u64) -> E {
        (self.inner.factory)(entity_id)
    }

    /// Spawns the persistence and eviction sweeps. Calling it twice is a no-op.
    pub fn start(&self) {
        let mut sweepers = self.inner.sweepers.lock();
        if !sweepers.is_empty() {
            return;
        }
        let weak = Arc::downgrade(&self.inner);
        sweepers.push(tokio::spawn(persistence_sweep(
            weak.clone(),
            self.inner.config.save_interval(),
        )));
        sweepers.push(tokio::spawn(eviction_sweep(
            weak,
            self.inner.config.eviction_check_interval(),
        )));
        info!(
            system = %self.inner.name,
            save_interval = ?self.inner.config.save_interval(),
            idle_timeout = ?self.inner.config.idle_timeout(),
            "Actor system started"
        );
    }

    /// Returns the resident actor for `entity_id`, creating it if needed.
    ///
    /// A created actor hydrates inside its own task; messages sent before
    /// hydration completes wait in the mailbox.
    pub fn get_actor(&self, entity_id: u64) -> Result<ActorRef, ActorError> {
        if self.inner.shutting_down.load(Ordering::Acquire) {
            return Err(ActorError::ShuttingDown(self.inner.name.clone()));
        }
        if let Some(actor) = self.inner.registry.get(&entity_id) {
            actor.touch();
            return Ok(actor.clone());
        }

        let max_resident = self.inner.config.max_resident_actors;
        if !self.reserve_slot(max_resident) {
            warn!(system = %self.inner.name, entity_id, max_resident, "Refusing to create actor");
            return Err(ActorError::CapacityExceeded(max_resident));
        }

        let (actor, receiver) = match self.inner.registry.entry(entity_id) {
            Entry::Occupied(occupied) => {
                self.release_slot();
                return Ok(occupied.get().clone());
            }
            Entry::Vacant(vacant) => {
                // Shutdown snapshots the registry after raising the flag, so an
                // insert that sees the flag clear here is part of that snapshot.
                if self.inner.shutting_down.load(Ordering::Acquire) {
                    self.release_slot();
                    return Err(ActorError::ShuttingDown(self.inner.name.clone()));
                }
                let generation = self.inner.generations.fetch_add(1, Ordering::AcqRel);
                let shared = Arc::new(ActorShared::new(entity_id, generation));
                let (sender, receiver) = mailbox(self.inner.config.mailbox_capacity);
                let actor = ActorRef::new(sender, shared);
                vacant.insert(actor.clone());
                (actor, receiver)
            }
        };

        debug!(system = %self.inner.name, entity_id, "Spawning actor");
        let task = Actor::new(self.clone(), actor.shared(), receiver);
        tokio::spawn(task.run());
        Ok(actor)
    }

    /// Returns the resident actor without creating one.
    pub fn get_actor_if_present(&self, entity_id: u64) -> Option<ActorRef> {
        self.inner
            .registry
            .get(&entity_id)
            .map(|actor| actor.clone())
    }

    pub fn has_actor(&self, entity_id: u64) -> bool {
        self.inner.registry.contains_key(&entity_id)
    }

    pub fn resident_count(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::Acquire)
    }

    /// Enqueues a message for `entity_id`, creating the actor if needed.
    ///
    /// If the resident actor is passivating, waits for it to finish its final
    /// flush and delivers to a freshly hydrated one, so no write is lost.
    pub async fn tell(&self, entity_id: u64, message: ActorMessage) -> Result<(), ActorError> {
        self.deliver(entity_id, Envelope::Message(message)).await
    }

    /// Sends a message and waits up to `timeout` for the reply. The timeout
    /// covers waiting for a passivating predecessor as well.
    pub async fn ask(
        &self,
        entity_id: u64,
        message: ActorMessage,
        timeout: Duration,
    ) -> Result<Payload, ActorError> {
        let (message, response) = message.expecting_reply();
        let exchange = async {
            self.deliver(entity_id, Envelope::Message(message)).await?;
            response.await.map_err(|_| ActorError::ActorDropped)?
        };
        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| ActorError::AskTimeout(timeout))?
    }

    async fn deliver(&self, entity_id: u64, mut envelope: Envelope) -> Result<(), ActorError> {
        for _ in 0..REDELIVERY_ATTEMPTS {
            let actor = self.get_actor(entity_id)?;
            match actor.try_deliver(envelope) {
                Ok(()) => return Ok(()),
                Err(rejected @ Rejected::Full(_)) => return Err(actor.refuse(rejected)),
                Err(Rejected::Closed(returned)) => {
                    debug!(system = %self.inner.name, entity_id, "Actor passivating, redelivering after it stops");
                    envelope = returned;
                    actor.terminated().await;
                }
            }
        }
        envelope.reject(ActorError::MailboxClosed(entity_id));
        Err(ActorError::MailboxClosed(entity_id))
    }

    /// Asks every dirty actor to write its state through, concurrently.
    pub async fn flush_all(&self) -> FlushReport {
        let dirty: Vec<ActorRef> = self
            .inner
            .registry
            .iter()
            .filter(|entry| entry.value().is_dirty())
            .map(|entry| entry.value().clone())
            .collect();

        let mut report = FlushReport {
            attempted: dirty.len(),
            ..FlushReport::default()
        };
        let mut flushes = JoinSet::new();
        for actor in dirty {
            flushes.spawn(async move { actor.request_flush().await });
        }
        while let Some(joined) = flushes.join_next().await {
            match joined {
                Ok(Ok(true)) => report.written += 1,
                Ok(Ok(false)) => {}
                Ok(Err(_)) | Err(_) => report.failed += 1,
            }
        }
        report
    }

    /// Passivates every actor idle for at least the configured idle timeout.
    /// Returns how many left memory.
    pub async fn evict_idle(&self) -> usize {
        self.evict_idle_for(self.inner.config.idle_timeout()).await
    }

    async fn evict_idle_for(&self, idle_timeout: Duration) -> usize {
        let idle: Vec<ActorRef> = self
            .inner
            .registry
            .iter()
            .filter(|entry| entry.value().idle_for() >= idle_timeout)
            .map(|entry| entry.value().clone())
            .collect();

        let mut evictions = JoinSet::new();
        for actor in idle {
            evictions.spawn(async move { actor.request_evict(idle_timeout).await });
        }
        let mut evicted = 0;
        while let Some(joined) = evictions.join_next().await {
            if matches!(joined, Ok(true)) {
                evicted += 1;
            }
        }
        evicted
    }

    /// Stops the sweeps, refuses new actors, and stops every resident actor
    /// after its final flush, waiting at most the configured deadline.
    pub async fn shutdown(&self) -> ShutdownReport {
        if self.inner.shutting_down.swap(true, Ordering::AcqRel) {
            return ShutdownReport::default();
        }
        for sweeper in self.inner.sweepers.lock().drain(..) {
            sweeper.abort();
        }

        let resident: Vec<ActorRef> = self
            .inner
            .registry
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        info!(system = %self.inner.name, resident = resident.len(), "Shutting down actor system");

        let mut stops = JoinSet::new();
        for actor in resident {
            stops.spawn(async move { actor.request_stop().await });
        }

        let mut report = ShutdownReport::default();
        let deadline = self.inner.config.shutdown_deadline();
        let drained = tokio::time::timeout(deadline, async {
            while let Some(joined) = stops.join_next().await {
                report.stopped += 1;
                if !matches!(joined, Ok(true)) {
                    report.flush_failed += 1;
                }
            }
        })
        .await;

        if drained.is_err() {
            report.timed_out = true;
            warn!(system = %self.inner.name, ?deadline, remaining = stops.len(), "Shutdown deadline expired");
        }
        info!(
            system = %self.inner.name,
            stopped = report.stopped,
            flush_failed = report.flush_failed,
            "Actor system stopped"
        );
        report
    }

    /// Removes an actor from the registry unless a newer incarnation already
    /// replaced it.
    pub(crate) fn deregister(&self, entity_id: u64, generation: u64) {
        let removed = self
            .inner
            .registry
            .remove_if(&entity_id, |_, actor| actor.generation() == generation);
        if removed.is_some() {
            self.release_slot();
        }
    }

    fn reserve_slot(&self, max_resident: usize) -> bool {
        self.inner
            .reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |taken| {
                (taken < max_resident).then_some(taken + 1)
            })
            .is_ok()
    }

    fn release_slot(&self) {
        self.inner.reserved.fetch_sub(1, Ordering::AcqRel);
    }
}

async fn persistence_sweep<E: ActorEntity>(system: Weak<SystemInner<E>>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let Some(inner) = system.upgrade() else { break };
        let system = ActorSystem { inner };
        let report = system.flush_all().await;
        if report.failed > 0 {
            warn!(system = system.name(), written = report.written, failed = report.failed, "Persistence sweep incomplete");
        } else if report.written > 0 {
            debug!(system = system.name(), written = report.written, "Persistence sweep");
        }
    }
}

async fn eviction_sweep<E: ActorEntity>(system: Weak<SystemInner<E>>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let Some(inner) = system.upgrade() else { break };
        let system = ActorSystem { inner };
        let evicted = system.evict_idle().await;
        if evicted > 0 {
            info!(system = system.name(), evicted, resident = system.resident_count(), "Eviction sweep");
        }
    }
}
