#![allow(dead_code)]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shard_actor::{
    ActorContext, ActorEntity, ActorMessage, ActorSystem, ActorSystemConfig, ClusterConfig,
    ClusterMembership, ClusterNode, LoopbackTransport, MemoryCache, MemoryStore, Origin, Payload,
    RemoteDeliveryEndpoint, ShardRouter, Storage, SystemRegistry,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const SYSTEM: &str = "counter";

// --- Test Entity ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Counter {
    pub id: u64,
    pub value: i64,
    pub last_origin: Option<Origin>,
}

#[derive(Debug, thiserror::Error)]
pub enum CounterError {
    #[error("unknown message {0}")]
    Unknown(String),
    #[error("rejected on purpose")]
    Rejected,
}

/// Lifecycle hook counters shared by every counter actor.
#[derive(Debug, Default)]
pub struct Hooks {
    pub activations: AtomicUsize,
    pub passivations: AtomicUsize,
}

impl Hooks {
    pub fn activations(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    pub fn passivations(&self) -> usize {
        self.passivations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActorEntity for Counter {
    type Context = Arc<Hooks>;
    type Error = CounterError;

    async fn handle(
        &mut self,
        ctx: &mut ActorContext<'_, Self>,
        kind: &str,
        payload: Payload,
    ) -> Result<Payload, CounterError> {
        match kind {
            "ADD" => {
                self.value += payload.as_i64().unwrap_or(0);
                self.last_origin = Some(ctx.origin());
                ctx.mark_dirty();
                Ok(json!(self.value))
            }
            "SLOW" => {
                tokio::time::sleep(Duration::from_secs(payload.as_u64().unwrap_or(5))).await;
                self.value += 1;
                ctx.mark_dirty();
                Ok(json!(self.value))
            }
            "GET" => Ok(json!(self.value)),
            "ORIGIN" => Ok(json!(self.last_origin)),
            "FAIL" => Err(CounterError::Rejected),
            other => Err(CounterError::Unknown(other.to_string())),
        }
    }

    async fn on_activate(&mut self, ctx: &mut ActorContext<'_, Self>) -> Result<(), CounterError> {
        ctx.context().activations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn on_passivate(&mut self, ctx: &mut ActorContext<'_, Self>) {
        ctx.context().passivations.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn message(kind: &str, payload: Payload) -> ActorMessage {
    ActorMessage::new(kind, payload)
}

pub fn decode_state(raw: &str) -> Counter {
    serde_json::from_str(raw).unwrap()
}

// --- Single system ---

pub struct Harness {
    pub system: ActorSystem<Counter>,
    pub cache: Arc<MemoryCache>,
    pub store: Arc<MemoryStore>,
    pub hooks: Arc<Hooks>,
}

pub fn counter_system(config: ActorSystemConfig) -> Harness {
    let cache = Arc::new(MemoryCache::new());
    let store = Arc::new(MemoryStore::new());
    let hooks = Arc::new(Hooks::default());
    let system = ActorSystem::new(
        SYSTEM,
        config,
        Storage::new(cache.clone(), store.clone()),
        hooks.clone(),
        |id| Counter {
            id,
            ..Counter::default()
        },
    );
    Harness {
        system,
        cache,
        store,
        hooks,
    }
}

// --- Cluster ---

pub fn cluster_config(port: u16) -> ClusterConfig {
    ClusterConfig {
        enabled: true,
        host: "127.0.0.1".to_string(),
        port,
        virtual_nodes_per_node: 64,
        rpc_timeout_ms: 500,
        ..ClusterConfig::default()
    }
}

pub fn ring_entry(config: &ClusterConfig) -> ClusterNode {
    ClusterNode::new(&config.host, config.port).hosting(SYSTEM)
}

pub struct TestNode {
    pub config: ClusterConfig,
    pub harness: Harness,
    pub endpoint: RemoteDeliveryEndpoint,
    pub router: ShardRouter,
}

impl TestNode {
    pub fn node_id(&self) -> String {
        self.config.node_id()
    }

    pub fn holds(&self, entity_id: u64) -> bool {
        self.harness.system.has_actor(entity_id)
    }
}

pub fn test_node(
    config: ClusterConfig,
    membership: Arc<ClusterMembership>,
    transport: &LoopbackTransport,
) -> TestNode {
    let harness = counter_system(ActorSystemConfig::default());
    let systems = SystemRegistry::new();
    systems.register(harness.system.clone());
    let endpoint = RemoteDeliveryEndpoint::new(systems.clone());
    transport.register(config.node_id(), endpoint.clone());
    let router = ShardRouter::new(
        config.clone(),
        systems,
        membership,
        Arc::new(transport.clone()),
    );
    TestNode {
        config,
        harness,
        endpoint,
        router,
    }
}

/// Two nodes sharing one membership view and one loopback transport.
pub fn two_node_cluster() -> (TestNode, TestNode, LoopbackTransport) {
    shard_actor::tracing::setup_tracing();
    let a = cluster_config(7001);
    let b = cluster_config(7002);
    let membership = Arc::new(ClusterMembership::with_nodes(
        64,
        [ring_entry(&a), ring_entry(&b)],
    ));
    let transport = LoopbackTransport::new();
    let node_a = test_node(a, membership.clone(), &transport);
    let node_b = test_node(b, membership, &transport);
    (node_a, node_b, transport)
}

/// First `count` entity ids owned by `node_id` for the counter system.
pub fn ids_owned_by(membership: &ClusterMembership, node_id: &str, count: usize) -> Vec<u64> {
    (0..)
        .filter(|id| {
            membership
                .locate(SYSTEM, *id)
                .is_some_and(|node| node.node_id == node_id)
        })
        .take(count)
        .collect()
}
