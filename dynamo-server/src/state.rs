use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use dynamo_membership::MembershipService;
use dynamo_replication::Coordinator;
use dynamo_ring::HashRing;
use dynamo_store::LocalStore;

#[derive(Clone)]
pub struct AppState {
    pub node_id: String,
    pub all_nodes: Vec<String>,
    pub coordinator: Arc<Coordinator>,
    pub store: Arc<LocalStore>,
    pub ring: Arc<HashRing>,
    pub membership: Arc<MembershipService>,
    pub replication_factor: usize,
    pub read_quorum_r: usize,
    pub write_quorum_w: usize,
    pub delay_ms: Arc<AtomicI64>,
}

impl AppState {
    /// Sleep the process-wide artificial delay, if one is set. Applied only
    /// to client-facing and peer-replicate handlers (the control endpoints,
    /// get_local, gossip, and repair are never delayed).
    pub async fn maybe_delay(&self) {
        let ms = self.delay_ms.load(Ordering::Relaxed);
        if ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(ms as u64)).await;
        }
    }
}
