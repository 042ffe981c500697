//! # Observability & Tracing
//!
//! This module provides the tracing setup shared by every binary and test
//! built on the runtime.
//!
//! ## Configuration
//!
//! The runtime uses a compact format that hides the crate/module prefix
//! (`with_target(false)`). Every event carries the structured fields needed to
//! follow one entity across the cluster instead: `system`, `entity_id` and,
//! on routed paths, `node`.
//!
//! ```bash
//! # Lifecycle only: activations, evictions, membership, shutdown
//! RUST_LOG=info cargo run
//!
//! # Per-message flow, flushes, forwarding decisions
//! RUST_LOG=debug cargo run
//!
//! # Only the runtime
//! RUST_LOG=shard_actor=debug cargo run
//! ```
//!
//! ## What Gets Traced
//!
//! - **Actor lifecycle** (`info`): activation with the hydrated version, eviction,
//!   system start and shutdown
//! - **Message flow** (`debug`): handled messages with their origin, flushes,
//!   redeliveries after passivation
//! - **Degraded paths** (`warn`): routing degraded, remote delivery failures,
//!   failed flushes that will be retried
//! - **Losses** (`error`): abandoned hydrations, final flushes that failed
//!
//! ## Example Output
//!
//! ```text
//! INFO Actor activated system="player" entity_id=1001 version=0
//! DEBUG Handling message system="player" entity_id=1001 kind="ADD_GOLD" origin=local
//! WARN Remote delivery failed node="10.0.0.2:7000" error=remote delivery to 10.0.0.2:7000 failed: connection refused
//! INFO Actor evicted system="player" entity_id=1001
//! ```

/// Installs the global subscriber. Safe to call more than once; later calls
/// are ignored, which lets every test call it.
pub fn setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();
}
