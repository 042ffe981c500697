//! Runtime configuration
//!
//! Plain structs with sensible defaults, deserializable from any serde source
//! and overridable from environment variables via `from_env()`.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Per actor-system settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorSystemConfig {
    /// Upper bound on actors resident in memory (env: ACTOR_MAX_RESIDENT)
    pub max_resident_actors: usize,

    /// Idle time before an actor is flushed and evicted (env: ACTOR_IDLE_TIMEOUT_MINUTES)
    pub idle_timeout_minutes: u64,

    /// Period of the persistence sweep (env: ACTOR_SAVE_INTERVAL_SECONDS)
    pub save_interval_seconds: u64,

    /// Period of the idle-eviction sweep
    pub eviction_check_interval_seconds: u64,

    /// Mailbox bound; `None` means unbounded (env: ACTOR_MAILBOX_CAPACITY, 0 = unbounded)
    pub mailbox_capacity: Option<usize>,

    /// Expiry of warm-cache shadows
    pub cache_ttl_seconds: u64,

    /// How long shutdown waits for final flushes
    pub shutdown_deadline_seconds: u64,

    /// Attempts for a flush that cannot be postponed (after the mailbox closed)
    pub flush_retry_attempts: u32,
}

impl Default for ActorSystemConfig {
    fn default() -> Self {
        Self {
            max_resident_actors: 100_000,
            idle_timeout_minutes: 30,
            save_interval_seconds: 60,
            eviction_check_interval_seconds: 60,
            mailbox_capacity: None,
            cache_ttl_seconds: 24 * 60 * 60,
            shutdown_deadline_seconds: 30,
            flush_retry_attempts: 3,
        }
    }
}

impl ActorSystemConfig {
    /// Create configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();
        override_from_env("ACTOR_MAX_RESIDENT", &mut config.max_resident_actors);
        override_from_env("ACTOR_IDLE_TIMEOUT_MINUTES", &mut config.idle_timeout_minutes);
        override_from_env("ACTOR_SAVE_INTERVAL_SECONDS", &mut config.save_interval_seconds);
        if let Some(capacity) = env_value::<usize>("ACTOR_MAILBOX_CAPACITY") {
            config.mailbox_capacity = (capacity > 0).then_some(capacity);
        }
        config
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_minutes * 60)
    }

    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.save_interval_seconds.max(1))
    }

    pub fn eviction_check_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_check_interval_seconds.max(1))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn shutdown_deadline(&self) -> Duration {
        Duration::from_secs(self.shutdown_deadline_seconds)
    }
}

/// What the router does when clustering is on but no owner can be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingPolicy {
    /// Deliver locally rather than drop the message.
    #[default]
    FailOpen,
    /// Reject: `tell` returns `false`, `ask` returns `None`.
    FailClosed,
}

impl FromStr for RoutingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "fail_open" | "open" => Ok(RoutingPolicy::FailOpen),
            "fail_closed" | "closed" => Ok(RoutingPolicy::FailClosed),
            other => Err(format!("unknown routing policy `{other}`")),
        }
    }
}

/// Cluster and routing settings of this node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Route through the hash ring at all (env: CLUSTER_ENABLED)
    pub enabled: bool,

    /// Address peers use to reach this node (env: CLUSTER_HOST)
    pub host: String,

    /// (env: CLUSTER_PORT)
    pub port: u16,

    /// Ring points per physical node (env: CLUSTER_VIRTUAL_NODES)
    pub virtual_nodes_per_node: usize,

    /// Behaviour on empty ring or lookup miss (env: CLUSTER_ROUTING_POLICY)
    pub routing_policy: RoutingPolicy,

    /// Default per-call timeout of remote tells (env: CLUSTER_RPC_TIMEOUT_MS)
    pub rpc_timeout_ms: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "127.0.0.1".to_string(),
            port: 7000,
            virtual_nodes_per_node: 160,
            routing_policy: RoutingPolicy::FailOpen,
            rpc_timeout_ms: 3_000,
        }
    }
}

impl ClusterConfig {
    /// Create configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();
        override_from_env("CLUSTER_ENABLED", &mut config.enabled);
        if let Ok(host) = std::env::var("CLUSTER_HOST") {
            config.host = host;
        }
        override_from_env("CLUSTER_PORT", &mut config.port);
        override_from_env("CLUSTER_VIRTUAL_NODES", &mut config.virtual_nodes_per_node);
        override_from_env("CLUSTER_ROUTING_POLICY", &mut config.routing_policy);
        override_from_env("CLUSTER_RPC_TIMEOUT_MS", &mut config.rpc_timeout_ms);
        config
    }

    /// `host:port`, the node id used on the ring.
    pub fn node_id(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
}

fn env_value<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparsable environment override");
            None
        }
    }
}

fn override_from_env<T: FromStr>(key: &str, target: &mut T) {
    if let Some(value) = env_value(key) {
        *target = value;
    }
}
