//! # Shard Router
//!
//! Makes local versus remote delivery invisible to callers. For each message
//! the router looks the entity up on the ring of its actor system and either
//! hands it to the local [`SystemRegistry`] or forwards it over the
//! [`RpcTransport`] to the owning node's
//! [`RemoteDeliveryEndpoint`](crate::RemoteDeliveryEndpoint).
//!
//! Failures never escape as errors: `tell` reports a `bool` and `ask` an
//! `Option`, after logging the cause. A `None` from `ask` means the outcome is
//! unknown, since the target may have applied the message and lost the reply.
//!
//! ## Unreachable owners
//!
//! Every remote call is made once, without retry. A peer that accepts the
//! call but never answers costs the caller the full timeout (`rpc_timeout` for
//! `tell`, the caller's timeout for `ask`). A peer whose transport refuses the
//! call outright fails fast: `tell` returns `false` and `ask` returns `None`
//! as soon as the transport reports the error.
//!
//! ## Degraded routing
//!
//! With clustering enabled, an empty ring or a lookup miss is resolved by the
//! configured [`RoutingPolicy`]: deliver locally (fail-open, the default) or
//! reject (fail-closed). Either way it is logged at `warn`. With clustering
//! disabled every message is local.

use crate::config::{ClusterConfig, RoutingPolicy};
use crate::membership::ClusterMembership;
use crate::message::{ActorMessage, Payload};
use crate::registry::SystemRegistry;
use crate::remote::{RemoteRequest, RemoteResponse};
use crate::ring::ClusterNode;
use crate::transport::RpcTransport;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Routing decision for one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Local,
    Remote(ClusterNode),
    /// Fail-closed routing found no owner.
    Unroutable,
}

struct RouterInner {
    config: ClusterConfig,
    local_node_id: String,
    systems: SystemRegistry,
    membership: Arc<ClusterMembership>,
    transport: Arc<dyn RpcTransport>,
}

/// Cluster-aware front door to every actor system. Cloning is cheap.
#[derive(Clone)]
pub struct ShardRouter {
    inner: Arc<RouterInner>,
}

impl ShardRouter {
    pub fn new(
        config: ClusterConfig,
        systems: SystemRegistry,
        membership: Arc<ClusterMembership>,
        transport: Arc<dyn RpcTransport>,
    ) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                local_node_id: config.node_id(),
                config,
                systems,
                membership,
                transport,
            }),
        }
    }

    pub fn local_node_id(&self) -> &str {
        &self.inner.local_node_id
    }

    pub fn systems(&self) -> &SystemRegistry {
        &self.inner.systems
    }

    pub fn membership(&self) -> &Arc<ClusterMembership> {
        &self.inner.membership
    }

    /// Where a message for `entity_id` of `system` would be delivered now.
    pub fn owner_of(&self, system: &str, entity_id: u64) -> Route {
        if !self.inner.config.enabled {
            return Route::Local;
        }
        let snapshot = self.inner.membership.snapshot();
        let Some(ring) = snapshot.ring(system).filter(|ring| !ring.is_empty()) else {
            return self.degraded(system, entity_id, "ring is empty");
        };
        match ring.locate_entity(entity_id) {
            Some(node) if node.node_id == self.inner.local_node_id => Route::Local,
            Some(node) => Route::Remote(node.clone()),
            None => self.degraded(system, entity_id, "lookup miss"),
        }
    }

    fn degraded(&self, system: &str, entity_id: u64, reason: &str) -> Route {
        let policy = self.inner.config.routing_policy;
        warn!(system, entity_id, reason, ?policy, "Routing degraded");
        match policy {
            RoutingPolicy::FailOpen => Route::Local,
            RoutingPolicy::FailClosed => Route::Unroutable,
        }
    }

    /// Fire-and-forget delivery. `true` means the owning node accepted the
    /// message into the entity's mailbox.
    pub async fn tell(&self, system: &str, entity_id: u64, message_type: &str, payload: Payload) -> bool {
        match self.owner_of(system, entity_id) {
            Route::Local => self.tell_local(system, entity_id, message_type, payload).await,
            Route::Remote(node) => {
                let Some(payload) = encode_payload(system, entity_id, &payload) else {
                    return false;
                };
                let request = RemoteRequest::Tell {
                    system: system.to_string(),
                    entity_id,
                    message_type: message_type.to_string(),
                    payload,
                };
                let timeout = self.inner.config.rpc_timeout();
                match self.call(&node, request, timeout).await {
                    Some(RemoteResponse::Delivered(accepted)) => accepted,
                    Some(other) => unexpected(&node, &other),
                    None => false,
                }
            }
            Route::Unroutable => false,
        }
    }

    /// Request/reply delivery. Waits at most `timeout` whether the owner is
    /// local or remote.
    pub async fn ask(
        &self,
        system: &str,
        entity_id: u64,
        message_type: &str,
        payload: Payload,
        timeout: Duration,
    ) -> Option<Payload> {
        match self.owner_of(system, entity_id) {
            Route::Local => {
                let message = ActorMessage::new(message_type, payload);
                match self.inner.systems.ask(system, entity_id, message, timeout).await {
                    Ok(reply) => Some(reply),
                    Err(e) => {
                        warn!(system, entity_id, message_type, error = %e, "Local ask failed");
                        None
                    }
                }
            }
            Route::Remote(node) => {
                let request = RemoteRequest::Ask {
                    system: system.to_string(),
                    entity_id,
                    message_type: message_type.to_string(),
                    payload: encode_payload(system, entity_id, &payload)?,
                    timeout_ms: timeout.as_millis() as u64,
                };
                match self.call(&node, request, timeout).await? {
                    RemoteResponse::Reply(Some(reply)) => match serde_json::from_str(&reply) {
                        Ok(reply) => Some(reply),
                        Err(e) => {
                            warn!(node = %node.node_id, system, entity_id, error = %e, "Undecodable remote reply");
                            None
                        }
                    },
                    RemoteResponse::Reply(None) => None,
                    other => {
                        unexpected(&node, &other);
                        None
                    }
                }
            }
            Route::Unroutable => None,
        }
    }

    /// Delivers the same message to many entities. Malformed ids are skipped
    /// and do not abort the batch; ids are grouped so that each remote owner
    /// receives a single call. Returns the number of accepted deliveries.
    pub async fn batch_tell<I, S>(&self, system: &str, entity_ids: I, message_type: &str, payload: Payload) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut local = Vec::new();
        let mut remote: BTreeMap<String, (ClusterNode, Vec<u64>)> = BTreeMap::new();
        for raw in entity_ids {
            let raw = raw.as_ref().trim();
            let Ok(entity_id) = raw.parse::<u64>() else {
                warn!(system, entity_id = raw, "Skipping malformed entity id");
                continue;
            };
            match self.owner_of(system, entity_id) {
                Route::Local => local.push(entity_id),
                Route::Remote(node) => {
                    remote
                        .entry(node.node_id.clone())
                        .or_insert_with(|| (node, Vec::new()))
                        .1
                        .push(entity_id);
                }
                Route::Unroutable => {}
            }
        }

        let mut accepted = 0;
        for entity_id in local {
            if self.tell_local(system, entity_id, message_type, payload.clone()).await {
                accepted += 1;
            }
        }

        if remote.is_empty() {
            return accepted;
        }
        let Some(encoded) = encode_payload(system, 0, &payload) else {
            return accepted;
        };
        let timeout = self.inner.config.rpc_timeout();
        for (node, ids) in remote.into_values() {
            let entity_ids = ids.iter().map(u64::to_string).collect::<Vec<_>>().join(",");
            let request = RemoteRequest::BatchTell {
                system: system.to_string(),
                entity_ids,
                message_type: message_type.to_string(),
                payload: encoded.clone(),
            };
            match self.call(&node, request, timeout).await {
                Some(RemoteResponse::Accepted(count)) => accepted += count,
                Some(other) => {
                    unexpected(&node, &other);
                }
                None => {}
            }
        }
        accepted
    }

    /// Whether the owning node currently holds the entity in memory.
    pub async fn has_actor(&self, system: &str, entity_id: u64) -> bool {
        match self.owner_of(system, entity_id) {
            Route::Local => self.inner.systems.has_actor(system, entity_id),
            Route::Remote(node) => {
                let request = RemoteRequest::HasActor {
                    system: system.to_string(),
                    entity_id,
                };
                let timeout = self.inner.config.rpc_timeout();
                match self.call(&node, request, timeout).await {
                    Some(RemoteResponse::Present(present)) => present,
                    Some(other) => unexpected(&node, &other),
                    None => false,
                }
            }
            Route::Unroutable => false,
        }
    }

    async fn tell_local(&self, system: &str, entity_id: u64, message_type: &str, payload: Payload) -> bool {
        let message = ActorMessage::new(message_type, payload);
        match self.inner.systems.tell(system, entity_id, message).await {
            Ok(()) => true,
            Err(e) => {
                warn!(system, entity_id, message_type, error = %e, "Local tell rejected");
                false
            }
        }
    }

    /// One RPC attempt, bounded by `timeout` even if the transport is not.
    async fn call(&self, node: &ClusterNode, request: RemoteRequest, timeout: Duration) -> Option<RemoteResponse> {
        debug!(node = %node.node_id, ?request, "Forwarding to owner");
        match tokio::time::timeout(timeout, self.inner.transport.call(node, request, timeout)).await {
            Ok(Ok(response)) => Some(response),
            Ok(Err(e)) => {
                warn!(node = %node.node_id, error = %e, "Remote delivery failed");
                None
            }
            Err(_) => {
                warn!(node = %node.node_id, ?timeout, "Remote delivery timed out");
                None
            }
        }
    }
}

fn encode_payload(system: &str, entity_id: u64, payload: &Payload) -> Option<String> {
    match serde_json::to_string(payload) {
        Ok(encoded) => Some(encoded),
        Err(e) => {
            warn!(system, entity_id, error = %e, "Could not encode payload");
            None
        }
    }
}

fn unexpected(node: &ClusterNode, response: &RemoteResponse) -> bool {
    warn!(node = %node.node_id, ?response, "Unexpected response kind");
    false
}
