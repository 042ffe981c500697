//! # Mock Transport & Testing Guide
//!
//! `MockTransport` implements [`RpcTransport`] without any peer behind it. Each
//! call pops the next expectation and returns its canned response, so router
//! behaviour around remote owners (success, refusal, garbage replies) can be
//! tested deterministically and without spawning a second node.
//!
//! ## When to use Mocks vs a Loopback Cluster
//!
//! | Feature | MockTransport | LoopbackTransport |
//! |---------|---------------|-------------------|
//! | **Peer** | None (expectations) | Real endpoint + actor systems |
//! | **Determinism** | Fully deterministic | Subject to scheduler |
//! | **Use Case** | Router logic around remote calls | End-to-end multi-node flows |
//! | **Error Injection** | Any error (`return_err`) | Disconnect / blackhole a node |
//!
//! ## Example
//!
//! ```rust
//! use shard_actor::mock::MockTransport;
//! use shard_actor::{ClusterConfig, ClusterMembership, ClusterNode, RemoteResponse, ShardRouter, SystemRegistry};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ClusterConfig { enabled: true, ..ClusterConfig::default() };
//!     let peer = ClusterNode::new("10.0.0.9", 7000).hosting("player");
//!     let membership = Arc::new(ClusterMembership::with_nodes(16, [peer]));
//!
//!     let mut mock = MockTransport::new();
//!     mock.expect_call("10.0.0.9:7000").return_ok(RemoteResponse::Delivered(true));
//!
//!     let router = ShardRouter::new(config, SystemRegistry::new(), membership, Arc::new(mock.clone()));
//!     assert!(router.tell("player", 1, "ADD_GOLD", serde_json::json!(5)).await);
//!     mock.verify();
//! }
//! ```

use crate::error::ActorError;
use crate::remote::{RemoteRequest, RemoteResponse};
use crate::ring::ClusterNode;
use crate::transport::RpcTransport;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// EXPECTATION BUILDER API
// =============================================================================

/// An expected call and the response to return for it.
struct Expectation {
    node_id: String,
    response: Result<RemoteResponse, ActorError>,
}

/// A transport with expectation tracking for fluent testing.
///
/// Calls must arrive in the order expectations were registered; a call to an
/// unexpected node, or with no expectation left, panics.
#[derive(Clone, Default)]
pub struct MockTransport {
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
    received: Arc<Mutex<Vec<(String, RemoteRequest)>>>,
}

impl MockTransport {
    /// Creates a mock transport with no expectations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects the next call to target `node_id`.
    pub fn expect_call(&mut self, node_id: impl Into<String>) -> CallExpectationBuilder {
        CallExpectationBuilder {
            node_id: node_id.into(),
            expectations: self.expectations.clone(),
        }
    }

    /// Requests received so far, with the node they were sent to.
    pub fn requests(&self) -> Vec<(String, RemoteRequest)> {
        self.received.lock().clone()
    }

    /// Verifies that all expectations were met.
    pub fn verify(&self) {
        let remaining = self.expectations.lock().len();
        if remaining > 0 {
            panic!("Not all expectations were met. {remaining} remaining");
        }
    }
}

#[async_trait]
impl RpcTransport for MockTransport {
    async fn call(
        &self,
        node: &ClusterNode,
        request: RemoteRequest,
        _timeout: Duration,
    ) -> Result<RemoteResponse, ActorError> {
        self.received.lock().push((node.node_id.clone(), request.clone()));
        let expectation = self.expectations.lock().pop_front();
        match expectation {
            Some(expectation) if expectation.node_id == node.node_id => expectation.response,
            Some(expectation) => panic!(
                "Expected a call to {}, got {} with {request:?}",
                expectation.node_id, node.node_id
            ),
            None => panic!("Unexpected call to {} with {request:?}", node.node_id),
        }
    }
}

/// Builder for call expectations.
pub struct CallExpectationBuilder {
    node_id: String,
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
}

impl CallExpectationBuilder {
    /// Sets the expectation to return a successful response.
    pub fn return_ok(self, response: RemoteResponse) {
        self.expectations.lock().push_back(Expectation {
            node_id: self.node_id,
            response: Ok(response),
        });
    }

    /// Sets the expectation to fail the call.
    pub fn return_err(self, error: ActorError) {
        self.expectations.lock().push_back(Expectation {
            node_id: self.node_id,
            response: Err(error),
        });
    }
}
