use std::time::Duration;

use clap::Parser;
use dynamo_core::EngineConfig;

/// Dynamo-style replicated key-value store node.
#[derive(Debug, Parser)]
#[command(name = "dynamo-node")]
pub struct Cli {
    /// This node's id (must also appear in --all_nodes).
    #[arg(long)]
    pub node_id: String,

    /// Port to bind the HTTP server to.
    #[arg(long)]
    pub port: u16,

    /// Comma-separated host:port list of every node in the cluster.
    #[arg(long)]
    pub all_nodes: String,

    #[arg(long, default_value_t = 3)]
    pub replication_factor: usize,

    #[arg(long, default_value_t = 2)]
    pub read_quorum_r: usize,

    #[arg(long, default_value_t = 2)]
    pub write_quorum_w: usize,

    #[arg(long, default_value_t = 100)]
    pub vnodes_per_node: usize,

    #[arg(long, default_value_t = 1.0)]
    pub heartbeat_interval: f64,

    #[arg(long, default_value_t = 1.5)]
    pub ping_timeout: f64,

    #[arg(long, default_value_t = 1.0)]
    pub replication_timeout: f64,

    #[arg(long, default_value_t = 1.0)]
    pub read_timeout: f64,

    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    pub fn into_engine_config(self) -> EngineConfig {
        EngineConfig {
            node_id: self.node_id,
            port: self.port,
            all_nodes: self.all_nodes.split(',').map(|s| s.to_string()).collect(),
            replication_factor: self.replication_factor,
            read_quorum_r: self.read_quorum_r,
            write_quorum_w: self.write_quorum_w,
            vnodes_per_node: self.vnodes_per_node,
            heartbeat_interval: Duration::from_secs_f64(self.heartbeat_interval),
            ping_timeout: Duration::from_secs_f64(self.ping_timeout),
            replication_timeout: Duration::from_secs_f64(self.replication_timeout),
            read_timeout: Duration::from_secs_f64(self.read_timeout),
            debug: self.debug,
        }
    }
}
