//! Cluster membership view and the per-system shard map derived from it.
//!
//! Lookups vastly outnumber membership changes, so the derived [`ShardMap`] is
//! an immutable snapshot behind `RwLock<Arc<_>>`. A reader holds the lock only
//! long enough to clone the `Arc`; a writer builds the next map off to the side
//! and swaps it in, so routing never waits for a rebuild.

use crate::ring::{ClusterNode, ConsistentHashRing};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::info;

/// One ring per actor-system name, over the nodes hosting that system.
#[derive(Debug, Clone, Default)]
pub struct ShardMap {
    rings: HashMap<String, ConsistentHashRing>,
    /// Incremented on every membership change.
    pub epoch: u64,
}

impl ShardMap {
    fn build(virtual_nodes: usize, nodes: &BTreeMap<String, ClusterNode>, epoch: u64) -> Self {
        let mut hosts: HashMap<&str, Vec<ClusterNode>> = HashMap::new();
        for node in nodes.values() {
            for system in &node.systems {
                hosts.entry(system.as_str()).or_default().push(node.clone());
            }
        }
        let rings = hosts
            .into_iter()
            .map(|(system, members)| {
                (
                    system.to_string(),
                    ConsistentHashRing::with_nodes(virtual_nodes, members),
                )
            })
            .collect();
        Self { rings, epoch }
    }

    pub fn ring(&self, system: &str) -> Option<&ConsistentHashRing> {
        self.rings.get(system)
    }

    pub fn locate(&self, system: &str, entity_id: u64) -> Option<&ClusterNode> {
        self.ring(system)?.locate_entity(entity_id)
    }
}

/// The nodes this process believes are in the cluster.
pub struct ClusterMembership {
    virtual_nodes: usize,
    nodes: Mutex<BTreeMap<String, ClusterNode>>,
    snapshot: RwLock<Arc<ShardMap>>,
}

impl ClusterMembership {
    pub fn new(virtual_nodes: usize) -> Self {
        Self {
            virtual_nodes,
            nodes: Mutex::new(BTreeMap::new()),
            snapshot: RwLock::new(Arc::new(ShardMap::default())),
        }
    }

    pub fn with_nodes(virtual_nodes: usize, nodes: impl IntoIterator<Item = ClusterNode>) -> Self {
        let membership = Self::new(virtual_nodes);
        membership.replace_all(nodes);
        membership
    }

    /// Adds or refreshes a node.
    pub fn join(&self, node: ClusterNode) {
        let mut nodes = self.nodes.lock();
        info!(node = %node.node_id, systems = ?node.systems, "Node joined");
        nodes.insert(node.node_id.clone(), node);
        self.publish(&nodes);
    }

    /// Removes a node. Returns whether it was a member.
    pub fn leave(&self, node_id: &str) -> bool {
        let mut nodes = self.nodes.lock();
        let removed = nodes.remove(node_id).is_some();
        if removed {
            info!(node = node_id, "Node left");
            self.publish(&nodes);
        }
        removed
    }

    /// Replaces the whole view, as after a discovery refresh.
    pub fn replace_all(&self, members: impl IntoIterator<Item = ClusterNode>) {
        let mut nodes = self.nodes.lock();
        *nodes = members
            .into_iter()
            .map(|node| (node.node_id.clone(), node))
            .collect();
        self.publish(&nodes);
    }

    /// Current shard map. Cheap; never waits for a rebuild in progress.
    pub fn snapshot(&self) -> Arc<ShardMap> {
        self.snapshot.read().clone()
    }

    pub fn locate(&self, system: &str, entity_id: u64) -> Option<ClusterNode> {
        self.snapshot().locate(system, entity_id).cloned()
    }

    pub fn nodes(&self) -> Vec<ClusterNode> {
        self.nodes.lock().values().cloned().collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.lock().len()
    }

    // Writers are serialized by the `nodes` mutex held by the caller.
    fn publish(&self, nodes: &BTreeMap<String, ClusterNode>) {
        let epoch = self.snapshot.read().epoch + 1;
        let next = Arc::new(ShardMap::build(self.virtual_nodes, nodes, epoch));
        *self.snapshot.write() = next;
    }
}
