//! # Node Lifecycle & Wiring
//!
//! Individual actors are simple; wiring a node together is where the
//! complexity lives. This module builds a complete game node and tears it down.
//!
//! ## GameNode
//!
//! [`GameNode`] owns everything one process needs:
//!
//! 1. **Actor systems** - one per entity type (`player`, `guild`), each with its
//!    own storage and background sweeps
//! 2. **System registry** - name lookup shared by the router and the remote
//!    endpoint, so both re-enter local delivery the same way
//! 3. **Router** - decides local or remote delivery from the membership view
//! 4. **Remote endpoint** - what peers call into
//! 5. **Clients** - typed wrappers handed to game code
//!
//! Everything is passed in explicitly; nothing is discovered at runtime.
//!
//! ## LoopbackCluster
//!
//! [`LoopbackCluster`] runs several nodes in one process, sharing one
//! membership view and one [`LoopbackTransport`](shard_actor::LoopbackTransport).
//! The demo and the integration tests use it in place of a real network.
//!
//! ## Graceful Shutdown
//!
//! [`GameNode::shutdown`] stops accepting messages, lets every actor drain its
//! mailbox, and flushes dirty state through to the cache and the store before
//! returning one report per actor system.
//!
//! **Usage:**
//! ```bash
//! RUST_LOG=info cargo run      # Lifecycle events
//! RUST_LOG=debug cargo run     # Per-message routing
//! ```

pub mod game_node;

pub use game_node::*;
