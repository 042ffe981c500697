//! Consistent Hash Ring
//!
//! Maps an entity key to the cluster node that owns it. Each physical node
//! contributes `virtual_nodes` points to a sorted ring; a key belongs to the
//! first point at or after its hash, wrapping around at the end.
//!
//! Properties:
//! - Deterministic: hashing is xxh3 with a fixed seed, so every process that
//!   sees the same membership computes the same ring
//! - Minimal disruption: adding a node to an N-node ring moves about 1/(N+1)
//!   of the keys, all of them to the new node
//! - Order independent: the ring is rebuilt from the node set, so the join
//!   order of nodes never changes ownership

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::{SystemTime, UNIX_EPOCH};
use xxhash_rust::xxh3::xxh3_64;

/// A physical node of the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterNode {
    /// `host:port`
    pub node_id: String,
    pub host: String,
    pub port: u16,
    /// Actor systems this node hosts; it only appears on their rings.
    pub systems: BTreeSet<String>,
    pub join_time_ms: u64,
}

impl ClusterNode {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        let join_time_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self {
            node_id: format!("{host}:{port}"),
            host,
            port,
            systems: BTreeSet::new(),
            join_time_ms,
        }
    }

    /// Adds an actor system to the set this node hosts.
    pub fn hosting(mut self, system: impl Into<String>) -> Self {
        self.systems.insert(system.into());
        self
    }

    pub fn hosts(&self, system: &str) -> bool {
        self.systems.contains(system)
    }
}

/// Ring of virtual points over a set of nodes.
#[derive(Debug, Clone)]
pub struct ConsistentHashRing {
    virtual_nodes: usize,
    points: BTreeMap<u64, String>,
    nodes: BTreeMap<String, ClusterNode>,
}

impl ConsistentHashRing {
    /// Creates an empty ring. At least one point per node is always used.
    pub fn new(virtual_nodes: usize) -> Self {
        Self {
            virtual_nodes: virtual_nodes.max(1),
            points: BTreeMap::new(),
            nodes: BTreeMap::new(),
        }
    }

    pub fn with_nodes(virtual_nodes: usize, nodes: impl IntoIterator<Item = ClusterNode>) -> Self {
        let mut ring = Self::new(virtual_nodes);
        for node in nodes {
            ring.nodes.insert(node.node_id.clone(), node);
        }
        ring.rebuild();
        ring
    }

    /// Adds a node, or refreshes its details if already present. Returns
    /// whether the node is new.
    pub fn add_node(&mut self, node: ClusterNode) -> bool {
        let added = self.nodes.insert(node.node_id.clone(), node).is_none();
        if added {
            self.rebuild();
        }
        added
    }

    pub fn remove_node(&mut self, node_id: &str) -> Option<ClusterNode> {
        let removed = self.nodes.remove(node_id);
        if removed.is_some() {
            self.rebuild();
        }
        removed
    }

    /// Returns the owner of `key`, or `None` on an empty ring.
    pub fn locate(&self, key: &str) -> Option<&ClusterNode> {
        let hash = xxh3_64(key.as_bytes());
        let (_, node_id) = self
            .points
            .range(hash..)
            .next()
            .or_else(|| self.points.iter().next())?;
        self.nodes.get(node_id)
    }

    /// Owner of an entity id, keyed by its decimal form.
    pub fn locate_entity(&self, entity_id: u64) -> Option<&ClusterNode> {
        self.locate(&entity_id.to_string())
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ClusterNode> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    pub fn virtual_nodes(&self) -> usize {
        self.virtual_nodes
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    fn rebuild(&mut self) {
        self.points.clear();
        for node_id in self.nodes.keys() {
            for i in 0..self.virtual_nodes {
                let point = xxh3_64(format!("{node_id}#VN{i}").as_bytes());
                // Collisions go to the smaller node id whatever the iteration order.
                self.points
                    .entry(point)
                    .and_modify(|owner| {
                        if node_id.as_str() < owner.as_str() {
                            owner.clone_from(node_id);
                        }
                    })
                    .or_insert_with(|| node_id.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(count: u16) -> Vec<ClusterNode> {
        (0..count)
            .map(|i| ClusterNode::new("10.0.0.1", 7000 + i).hosting("player"))
            .collect()
    }

    #[test]
    fn test_empty_returns_none() {
        let ring = ConsistentHashRing::new(160);
        assert!(ring.locate("1001").is_none());
        assert!(ring.is_empty());
    }

    #[test]
    fn test_single_node_owns_all() {
        let ring = ConsistentHashRing::with_nodes(160, nodes(1));
        for id in 0..100u64 {
            assert_eq!(
                ring.locate_entity(id).map(|n| n.node_id.as_str()),
                Some("10.0.0.1:7000")
            );
        }
    }

    #[test]
    fn test_deterministic() {
        let ring = ConsistentHashRing::with_nodes(160, nodes(5));
        let mut reversed = nodes(5);
        reversed.reverse();
        let other = ConsistentHashRing::with_nodes(160, reversed);

        for id in 0..1_000u64 {
            let first = ring.locate_entity(id).map(|n| n.node_id.clone());
            assert_eq!(first, ring.locate_entity(id).map(|n| n.node_id.clone()));
            assert_eq!(first, other.locate_entity(id).map(|n| n.node_id.clone()));
        }
    }

    #[test]
    fn test_reasonable_distribution() {
        let ring = ConsistentHashRing::with_nodes(160, nodes(4));
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        let num_keys = 10_000u64;

        for id in 0..num_keys {
            if let Some(owner) = ring.locate_entity(id) {
                *counts.entry(owner.node_id.clone()).or_default() += 1;
            }
        }

        // ~25% each; virtual nodes smooth but do not equalize
        assert_eq!(counts.len(), 4);
        for (node, count) in counts {
            assert!(
                (1_500..=3_500).contains(&count),
                "{node}: got {count}, expected ~2500"
            );
        }
    }

    #[test]
    fn test_minimal_disruption_on_join() {
        let mut ring = ConsistentHashRing::with_nodes(160, nodes(4));
        let num_keys = 10_000u64;
        let before: Vec<String> = (0..num_keys)
            .filter_map(|id| ring.locate_entity(id).map(|n| n.node_id.clone()))
            .collect();

        let newcomer = ClusterNode::new("10.0.0.1", 7004).hosting("player");
        assert!(ring.add_node(newcomer));

        let mut moved = 0;
        for (id, previous) in (0..num_keys).zip(&before) {
            let current = &ring.locate_entity(id).unwrap().node_id;
            if current != previous {
                moved += 1;
                assert_eq!(current, "10.0.0.1:7004", "key {id} moved between old nodes");
            }
        }

        // Expect ~1/5 = 20% of keys to move
        let fraction = moved as f64 / num_keys as f64;
        assert!(
            (0.13..=0.27).contains(&fraction),
            "moved {fraction:.3} of keys, expected ~0.2"
        );
    }

    #[test]
    fn test_remove_restores_previous_owners() {
        let original = ConsistentHashRing::with_nodes(160, nodes(3));
        let mut ring = original.clone();
        ring.add_node(ClusterNode::new("10.0.0.1", 7003));
        assert!(ring.remove_node("10.0.0.1:7003").is_some());

        for id in 0..1_000u64 {
            assert_eq!(
                ring.locate_entity(id).map(|n| &n.node_id),
                original.locate_entity(id).map(|n| &n.node_id)
            );
        }
    }

    #[test]
    fn test_readding_a_node_is_not_a_membership_change() {
        let mut ring = ConsistentHashRing::with_nodes(8, nodes(2));
        assert_eq!(ring.point_count(), 16);
        assert!(!ring.add_node(nodes(1).remove(0)));
        assert_eq!(ring.node_count(), 2);
        assert!(ring.contains("10.0.0.1:7001"));
    }
}
