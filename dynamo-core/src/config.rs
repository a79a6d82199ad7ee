use std::time::Duration;

/// Process-wide replication engine configuration. Built from CLI flags by
/// the server binary; kept as a plain struct here so every crate can share
/// the same knobs without depending on `clap`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub node_id: String,
    pub port: u16,
    pub all_nodes: Vec<String>,
    pub replication_factor: usize,
    pub read_quorum_r: usize,
    pub write_quorum_w: usize,
    pub vnodes_per_node: usize,
    pub heartbeat_interval: Duration,
    pub ping_timeout: Duration,
    pub replication_timeout: Duration,
    pub read_timeout: Duration,
    pub debug: bool,
}

impl EngineConfig {
    pub fn peers(&self) -> Vec<String> {
        self.all_nodes
            .iter()
            .filter(|n| **n != self.node_id)
            .cloned()
            .collect()
    }
}
