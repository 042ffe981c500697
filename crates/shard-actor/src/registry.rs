//! Name-indexed view of the actor systems hosted on this node.
//!
//! The router and the remote delivery endpoint address systems by name and do
//! not know their entity types. [`LocalDelivery`] erases the type so that both
//! reach every system through the same local API.

use crate::error::ActorError;
use crate::message::{ActorMessage, Payload};
use crate::system::{ActorSystem, ShutdownReport};
use crate::ActorEntity;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Type-erased local entry point of one actor system.
#[async_trait]
pub trait LocalDelivery: Send + Sync {
    fn name(&self) -> &str;

    async fn tell(&self, entity_id: u64, message: ActorMessage) -> Result<(), ActorError>;

    async fn ask(
        &self,
        entity_id: u64,
        message: ActorMessage,
        timeout: Duration,
    ) -> Result<Payload, ActorError>;

    fn has_actor(&self, entity_id: u64) -> bool;

    fn resident_count(&self) -> usize;

    async fn shutdown(&self) -> ShutdownReport;
}

#[async_trait]
impl<E: ActorEntity> LocalDelivery for ActorSystem<E> {
    fn name(&self) -> &str {
        ActorSystem::name(self)
    }

    async fn tell(&self, entity_id: u64, message: ActorMessage) -> Result<(), ActorError> {
        ActorSystem::tell(self, entity_id, message).await
    }

    async fn ask(
        &self,
        entity_id: u64,
        message: ActorMessage,
        timeout: Duration,
    ) -> Result<Payload, ActorError> {
        ActorSystem::ask(self, entity_id, message, timeout).await
    }

    fn has_actor(&self, entity_id: u64) -> bool {
        ActorSystem::has_actor(self, entity_id)
    }

    fn resident_count(&self) -> usize {
        ActorSystem::resident_count(self)
    }

    async fn shutdown(&self) -> ShutdownReport {
        ActorSystem::shutdown(self).await
    }
}

/// The actor systems hosted on this node, by name. Cloning shares the table.
#[derive(Clone, Default)]
pub struct SystemRegistry {
    systems: Arc<RwLock<BTreeMap<String, Arc<dyn LocalDelivery>>>>,
}

impl SystemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a system under its own name, replacing any previous one.
    pub fn register(&self, system: impl LocalDelivery + 'static) {
        let system: Arc<dyn LocalDelivery> = Arc::new(system);
        self.systems
            .write()
            .insert(system.name().to_string(), system);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn LocalDelivery>> {
        self.systems.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.systems.read().keys().cloned().collect()
    }

    fn require(&self, name: &str) -> Result<Arc<dyn LocalDelivery>, ActorError> {
        self.get(name)
            .ok_or_else(|| ActorError::SystemAbsent(name.to_string()))
    }

    pub async fn tell(
        &self,
        system: &str,
        entity_id: u64,
        message: ActorMessage,
    ) -> Result<(), ActorError> {
        self.require(system)?.tell(entity_id, message).await
    }

    pub async fn ask(
        &self,
        system: &str,
        entity_id: u64,
        message: ActorMessage,
        timeout: Duration,
    ) -> Result<Payload, ActorError> {
        self.require(system)?.ask(entity_id, message, timeout).await
    }

    pub fn has_actor(&self, system: &str, entity_id: u64) -> bool {
        self.get(system)
            .is_some_and(|system| system.has_actor(entity_id))
    }

    /// Shuts every system down one after the other.
    pub async fn shutdown_all(&self) -> BTreeMap<String, ShutdownReport> {
        let systems: Vec<Arc<dyn LocalDelivery>> = self.systems.read().values().cloned().collect();
        let mut reports = BTreeMap::new();
        for system in systems {
            reports.insert(system.name().to_string(), system.shutdown().await);
        }
        reports
    }
}
