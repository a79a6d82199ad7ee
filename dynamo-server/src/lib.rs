pub mod cli;
pub mod dto;
pub mod error;
pub mod http;
pub mod state;

use std::sync::atomic::AtomicI64;
use std::sync::Arc;

use dynamo_core::EngineConfig;
use dynamo_membership::{MembershipHandle, MembershipService};
use dynamo_replication::Coordinator;
use dynamo_ring::HashRing;
use dynamo_store::LocalStore;

pub use cli::Cli;
pub use state::AppState;

/// Wires up every component from an `EngineConfig` and starts the
/// membership background task. Returns the router-ready state plus the
/// handle needed to stop that task during shutdown.
pub fn build_node(config: &EngineConfig) -> (AppState, MembershipHandle) {
    let store = Arc::new(LocalStore::new());
    let ring = Arc::new(HashRing::new(&config.all_nodes, config.vnodes_per_node));
    let membership = Arc::new(MembershipService::new(
        config.node_id.clone(),
        &config.all_nodes,
        config.ping_timeout,
    ));
    let membership_handle = MembershipHandle::spawn(membership.clone(), config.heartbeat_interval);

    let coordinator = Arc::new(Coordinator::new(
        config.node_id.clone(),
        config.replication_factor,
        store.clone(),
        ring.clone(),
        membership.clone(),
        config.replication_timeout,
        config.read_timeout,
    ));

    let state = AppState {
        node_id: config.node_id.clone(),
        all_nodes: config.all_nodes.clone(),
        coordinator,
        store,
        ring,
        membership,
        replication_factor: config.replication_factor,
        read_quorum_r: config.read_quorum_r,
        write_quorum_w: config.write_quorum_w,
        delay_ms: Arc::new(AtomicI64::new(0)),
    };

    (state, membership_handle)
}
