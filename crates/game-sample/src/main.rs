//! # Game Sample
//!
//! Runs the sharded actor runtime end to end.
//!
//! ## 🚀 Core Components
//!
//! - **[model](game_sample::model)**: Serializable state ([`Player`](game_sample::model::Player), [`Guild`](game_sample::model::Guild)) and message kinds.
//! - **[clients](game_sample::clients)**: Typed wrappers (e.g. [`PlayerClient`](game_sample::clients::PlayerClient)) over the shard router.
//! - **[lifecycle](game_sample::lifecycle)**: [`GameNode`] wiring and a [`LoopbackCluster`] of nodes in one process.
//!
//! ## 📚 Quick Start
//!
//! The demo:
//! 1.  Starts a standalone node and moves gold around on it.
//! 2.  Starts a two-node loopback cluster and sends the same traffic to both nodes.
//! 3.  Shuts everything down, flushing dirty actors.

use game_sample::lifecycle::{GameNode, LoopbackCluster};
use game_sample::model::PLAYER_SYSTEM;
use shard_actor::tracing::setup_tracing;
use shard_actor::ActorSystemConfig;
use tracing::{error, info, Instrument};

#[tokio::main]
async fn main() -> Result<(), String> {
    // Setup tracing once for the entire application
    setup_tracing();

    info!("Starting game sample");
    let actors = ActorSystemConfig::from_env();

    let node = GameNode::standalone(actors.clone());
    let span = tracing::info_span!("standalone");
    async {
        node.player_client
            .add_gold(1001, 100)
            .await
            .map_err(|e| e.to_string())?;
        let player = node
            .player_client
            .get_info(1001)
            .await
            .map_err(|e| e.to_string())?;
        info!(player_id = player.id, gold = player.gold, "Player loaded");

        node.guild_client
            .enroll(7, 1001)
            .await
            .map_err(|e| e.to_string())?;
        let treasury = node
            .guild_client
            .donate(1001, 7, 40)
            .await
            .map_err(|e| e.to_string())?;
        info!(treasury, "Guild treasury updated");

        match node.guild_client.donate(1001, 7, 1_000).await {
            Ok(_) => error!("Overdraft was accepted"),
            Err(e) => info!(error = %e, "Overdraft refused"),
        }
        Ok::<_, String>(())
    }
    .instrument(span)
    .await?;
    node.shutdown().await;

    let cluster = LoopbackCluster::new(&[7001, 7002], actors);
    let span = tracing::info_span!("cluster");
    async {
        let (a, b) = (&cluster.nodes[0], &cluster.nodes[1]);
        for player_id in 2000..2010 {
            // Half the traffic enters through each node; the router forwards as needed.
            let entry = if player_id % 2 == 0 { a } else { b };
            entry
                .player_client
                .add_gold(player_id, 10)
                .await
                .map_err(|e| e.to_string())?;
        }
        for player_id in 2000..2010 {
            let player = a
                .player_client
                .get_info(player_id)
                .await
                .map_err(|e| e.to_string())?;
            let owner = cluster
                .owner(PLAYER_SYSTEM, player_id)
                .map(GameNode::node_id)
                .unwrap_or_default();
            info!(player_id, gold = player.gold, owner = %owner, "Player located");
        }
        info!(
            a = a.players.resident_count(),
            b = b.players.resident_count(),
            "Resident players per node"
        );
        Ok::<_, String>(())
    }
    .instrument(span)
    .await?;
    cluster.shutdown().await;

    info!("Game sample completed successfully");
    Ok(())
}
