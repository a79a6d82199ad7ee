use dynamo_core::{Version, VectorClock};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub status: &'static str,
    pub node: String,
}

#[derive(Debug, Deserialize)]
pub struct PutRequest {
    pub value: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PutResponse {
    pub success: bool,
    pub requested_replicas: Vec<String>,
    pub responded_to_parent_read: Vec<String>,
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    pub used_vc: VectorClock,
    pub stored_version: Version,
}

#[derive(Debug, Serialize)]
pub struct GetResponse {
    pub resolved_versions: Vec<Version>,
    pub responded_nodes: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReplicateRequest {
    pub key: Option<String>,
    pub value: Option<String>,
    #[serde(default)]
    pub vc: VectorClock,
}

#[derive(Debug, Serialize)]
pub struct ReplicateResponse {
    pub status: &'static str,
    pub node: String,
}

#[derive(Debug, Serialize)]
pub struct GetLocalResponse {
    pub versions: Vec<Version>,
}

#[derive(Debug, Serialize)]
pub struct ReplicasResponse {
    pub replicas: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RepairResponse {
    pub ok: bool,
    pub reason: Option<&'static str>,
    pub local_before: usize,
    pub remote_before: usize,
    pub merged: usize,
    pub pushed_to: Option<String>,
    pub pushed: usize,
}

#[derive(Debug, Deserialize)]
pub struct ControlDelayRequest {
    pub delay_ms: i64,
}

#[derive(Debug, Serialize)]
pub struct ControlDelayResponse {
    pub status: &'static str,
    pub delay_ms: i64,
}

#[derive(Debug, Serialize)]
pub struct ControlStatusResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RingSnapshotResponse {
    pub node: String,
    pub ring: Vec<(String, String)>,
    pub all_nodes: Vec<String>,
    pub alive_nodes: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
