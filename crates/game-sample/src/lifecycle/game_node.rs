use crate::clients::{GuildClient, PlayerClient};
use crate::guild_actor;
use crate::model::{Guild, Player, GUILD_SYSTEM, PLAYER_SYSTEM};
use crate::player_actor;
use shard_actor::{
    ActorSystem, ActorSystemConfig, ClusterConfig, ClusterMembership, ClusterNode,
    LoopbackTransport, RemoteDeliveryEndpoint, RpcTransport, ShardRouter, ShutdownReport, Storage,
    SystemRegistry,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Everything hosted by one game-server process.
pub struct GameNode {
    pub config: ClusterConfig,
    pub players: ActorSystem<Player>,
    pub guilds: ActorSystem<Guild>,
    pub systems: SystemRegistry,
    pub endpoint: RemoteDeliveryEndpoint,
    pub router: ShardRouter,
    pub player_client: PlayerClient,
    pub guild_client: GuildClient,
}

impl GameNode {
    /// Builds and starts a node. Both actor systems share `storage`.
    pub fn new(
        config: ClusterConfig,
        actors: ActorSystemConfig,
        storage: Storage,
        membership: Arc<ClusterMembership>,
        transport: Arc<dyn RpcTransport>,
    ) -> Self {
        let players = player_actor::new_system(actors.clone(), storage.clone());
        let guilds = guild_actor::new_system(actors, storage);
        players.start();
        guilds.start();

        let systems = SystemRegistry::new();
        systems.register(players.clone());
        systems.register(guilds.clone());

        let endpoint = RemoteDeliveryEndpoint::new(systems.clone());
        let router = ShardRouter::new(config.clone(), systems.clone(), membership, transport);
        let player_client = PlayerClient::new(router.clone());
        let guild_client = GuildClient::new(router.clone(), player_client.clone());

        info!(node = %config.node_id(), clustered = config.enabled, "Game node started");
        Self {
            config,
            players,
            guilds,
            systems,
            endpoint,
            router,
            player_client,
            guild_client,
        }
    }

    /// A single, non-clustered node with in-memory storage.
    pub fn standalone(actors: ActorSystemConfig) -> Self {
        let config = ClusterConfig::default();
        let membership = Arc::new(ClusterMembership::new(config.virtual_nodes_per_node));
        Self::new(
            config,
            actors,
            Storage::in_memory(),
            membership,
            Arc::new(LoopbackTransport::new()),
        )
    }

    pub fn node_id(&self) -> String {
        self.config.node_id()
    }

    /// How this node appears on the hash ring.
    pub fn ring_entry(&self) -> ClusterNode {
        ClusterNode::new(&self.config.host, self.config.port)
            .hosting(PLAYER_SYSTEM)
            .hosting(GUILD_SYSTEM)
    }

    /// Stops every actor system, flushing dirty actors first.
    pub async fn shutdown(&self) -> BTreeMap<String, ShutdownReport> {
        info!(node = %self.node_id(), "Shutting down game node");
        let reports = self.systems.shutdown_all().await;
        for (system, report) in &reports {
            info!(
                system = %system,
                stopped = report.stopped,
                flush_failed = report.flush_failed,
                timed_out = report.timed_out,
                "Actor system stopped"
            );
        }
        reports
    }
}

/// Several clustered nodes in one process, joined over a [`LoopbackTransport`].
pub struct LoopbackCluster {
    pub nodes: Vec<GameNode>,
    pub membership: Arc<ClusterMembership>,
    pub transport: LoopbackTransport,
}

impl LoopbackCluster {
    /// One node per port on `127.0.0.1`, each with its own in-memory storage.
    pub fn new(ports: &[u16], actors: ActorSystemConfig) -> Self {
        Self::with_storage(ports.iter().map(|port| (*port, Storage::in_memory())), actors)
    }

    pub fn with_storage(nodes: impl IntoIterator<Item = (u16, Storage)>, actors: ActorSystemConfig) -> Self {
        let template = ClusterConfig {
            enabled: true,
            ..ClusterConfig::default()
        };
        let membership = Arc::new(ClusterMembership::new(template.virtual_nodes_per_node));
        let transport = LoopbackTransport::new();

        let nodes: Vec<GameNode> = nodes
            .into_iter()
            .map(|(port, storage)| {
                let config = ClusterConfig {
                    port,
                    ..template.clone()
                };
                let node = GameNode::new(
                    config,
                    actors.clone(),
                    storage,
                    membership.clone(),
                    Arc::new(transport.clone()),
                );
                transport.register(node.node_id(), node.endpoint.clone());
                node
            })
            .collect();

        membership.replace_all(nodes.iter().map(GameNode::ring_entry));
        Self {
            nodes,
            membership,
            transport,
        }
    }

    /// The node that owns `entity_id` of `system` under the current membership.
    pub fn owner(&self, system: &str, entity_id: u64) -> Option<&GameNode> {
        let owner = self.membership.locate(system, entity_id)?;
        self.nodes.iter().find(|node| node.node_id() == owner.node_id)
    }

    pub async fn shutdown(&self) {
        for node in &self.nodes {
            node.shutdown().await;
        }
    }
}
