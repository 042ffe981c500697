//! RPC seam between a router and the remote delivery endpoints of its peers.
//!
//! The runtime only needs request/reply addressed by node with a per-call
//! timeout. Deployments plug their own transport in behind [`RpcTransport`];
//! [`LoopbackTransport`] connects endpoints living in the same process, which
//! is what the tests and the sample cluster use.

use crate::error::ActorError;
use crate::remote::{RemoteDeliveryEndpoint, RemoteRequest, RemoteResponse};
use crate::ring::ClusterNode;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Sends `request` to `node` and waits at most `timeout` for the response.
    async fn call(
        &self,
        node: &ClusterNode,
        request: RemoteRequest,
        timeout: Duration,
    ) -> Result<RemoteResponse, ActorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    /// Calls fail at once, like a refused connection.
    Disconnected,
    /// Calls never complete, like a partitioned peer.
    Blackholed,
}

#[derive(Default)]
struct LoopbackInner {
    endpoints: RwLock<HashMap<String, RemoteDeliveryEndpoint>>,
    faults: RwLock<HashMap<String, Fault>>,
    calls: AtomicUsize,
}

/// In-process transport. Requests and responses still cross a JSON
/// serialization boundary, as they would on a real wire.
#[derive(Clone, Default)]
pub struct LoopbackTransport {
    inner: Arc<LoopbackInner>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `endpoint` reachable as `node_id`.
    pub fn register(&self, node_id: impl Into<String>, endpoint: RemoteDeliveryEndpoint) {
        self.inner.endpoints.write().insert(node_id.into(), endpoint);
    }

    pub fn disconnect(&self, node_id: impl Into<String>) {
        self.inner.faults.write().insert(node_id.into(), Fault::Disconnected);
    }

    pub fn blackhole(&self, node_id: impl Into<String>) {
        self.inner.faults.write().insert(node_id.into(), Fault::Blackholed);
    }

    pub fn heal(&self, node_id: &str) {
        self.inner.faults.write().remove(node_id);
    }

    /// Number of calls attempted, faulty ones included.
    pub fn call_count(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RpcTransport for LoopbackTransport {
    async fn call(
        &self,
        node: &ClusterNode,
        request: RemoteRequest,
        timeout: Duration,
    ) -> Result<RemoteResponse, ActorError> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        let fault = self.inner.faults.read().get(&node.node_id).copied();
        match fault {
            Some(Fault::Disconnected) => {
                return Err(ActorError::remote(&node.node_id, "connection refused"))
            }
            Some(Fault::Blackholed) => {
                tokio::time::sleep(timeout).await;
                return Err(ActorError::remote(&node.node_id, "timed out"));
            }
            None => {}
        }

        let endpoint = self
            .inner
            .endpoints
            .read()
            .get(&node.node_id)
            .cloned()
            .ok_or_else(|| ActorError::remote(&node.node_id, "no endpoint listening"))?;

        let request: RemoteRequest = serde_json::from_str(&serde_json::to_string(&request)?)?;
        let response = tokio::time::timeout(timeout, endpoint.handle(request))
            .await
            .map_err(|_| ActorError::remote(&node.node_id, "timed out"))?;
        Ok(serde_json::from_str(&serde_json::to_string(&response)?)?)
    }
}
