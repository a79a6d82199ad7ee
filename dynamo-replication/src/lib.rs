use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dynamo_core::{Error, Result, VectorClock, Version};
use dynamo_membership::MembershipService;
use dynamo_ring::HashRing;
use dynamo_store::LocalStore;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
struct ReplicatePayload {
    key: String,
    value: String,
    vc: VectorClock,
}

#[derive(Debug, Deserialize)]
struct GetLocalResponse {
    versions: Vec<Version>,
}

#[derive(Debug, Clone)]
pub struct PutOutcome {
    pub success: bool,
    pub requested_replicas: Vec<String>,
    pub responded_to_parent_read: Vec<String>,
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    pub stored_version: Version,
}

#[derive(Debug, Clone)]
pub struct GetOutcome {
    pub resolved_versions: Vec<Version>,
    pub responded_nodes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RepairOutcome {
    pub local_before: usize,
    pub remote_before: usize,
    pub merged: usize,
    pub pushed_to: Option<String>,
    pub pushed: usize,
}

/// Orchestrates client PUT/GET, peer replicate/get-local RPCs, and on-demand
/// single-hop repair over the ring/store/membership components.
pub struct Coordinator {
    local_node_id: String,
    replication_factor: usize,
    store: Arc<LocalStore>,
    ring: Arc<HashRing>,
    membership: Arc<MembershipService>,
    client: reqwest::Client,
    replication_timeout: Duration,
    read_timeout: Duration,
}

impl Coordinator {
    pub fn new(
        local_node_id: String,
        replication_factor: usize,
        store: Arc<LocalStore>,
        ring: Arc<HashRing>,
        membership: Arc<MembershipService>,
        replication_timeout: Duration,
        read_timeout: Duration,
    ) -> Self {
        Self {
            local_node_id,
            replication_factor,
            store,
            ring,
            membership,
            client: reqwest::Client::new(),
            replication_timeout,
            read_timeout,
        }
    }

    fn candidates(&self, key: &str, ignore_liveness: bool) -> Vec<String> {
        let alive = if ignore_liveness {
            None
        } else {
            Some(self.membership.alive_nodes())
        };
        self.ring
            .get_replicas(key, self.replication_factor, alive.as_ref())
    }

    async fn rpc_replicate(&self, node: &str, key: &str, value: &str, vc: &VectorClock) -> bool {
        let payload = ReplicatePayload {
            key: key.to_string(),
            value: value.to_string(),
            vc: vc.clone(),
        };
        let url = format!("http://{node}/replicate");
        self.client
            .put(&url)
            .timeout(self.replication_timeout)
            .json(&payload)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    /// `None` means the RPC itself failed (timeout, connection refused,
    /// non-200); it must not be counted as a response toward `R`.
    async fn rpc_get_local(&self, node: &str, key: &str) -> Option<Vec<Version>> {
        let url = format!("http://{node}/get_local/{key}");
        let resp = self
            .client
            .get(&url)
            .timeout(self.replication_timeout)
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        resp.json::<GetLocalResponse>().await.ok().map(|r| r.versions)
    }

    /// Dynamo-style quorum write: unconditional local write, fan-out to the
    /// rest of the candidate set, success once `succeeded.len() >= w`
    /// (the local write always counts as one success).
    pub async fn quorum_write(
        &self,
        key: &str,
        value: &str,
        candidates: &[String],
        w: usize,
        parent_vc: VectorClock,
    ) -> (bool, Vec<String>, Vec<String>, Version) {
        let vc = parent_vc.increment(&self.local_node_id);
        let stored = self.store.put_local(key, value.to_string(), vc.clone());

        let rpc_targets: Vec<&String> = candidates.iter().filter(|n| **n != self.local_node_id).collect();
        let results = futures::future::join_all(
            rpc_targets.iter().map(|node| self.rpc_replicate(node, key, value, &vc)),
        )
        .await;

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for (node, ok) in rpc_targets.into_iter().zip(results) {
            if ok {
                succeeded.push(node.clone());
            } else {
                failed.push(node.clone());
            }
        }
        succeeded.push(self.local_node_id.clone());

        let success = succeeded.len() >= w;
        (success, succeeded, failed, stored)
    }

    /// Dynamo-style quorum read: fan out `get_local`, require at least `r`
    /// actual responses, merge by dominance, repair the local entry, and
    /// optionally fire-and-forget read-repair pushes to stale replicas.
    pub async fn quorum_read(
        &self,
        key: &str,
        candidates: &[String],
        r: usize,
        do_read_repair: bool,
    ) -> (bool, Vec<Version>, Vec<String>) {
        let results =
            futures::future::join_all(candidates.iter().map(|node| self.rpc_get_local(node, key))).await;

        let responders: Vec<String> = candidates
            .iter()
            .zip(&results)
            .filter(|(_, v)| v.is_some())
            .map(|(n, _)| n.clone())
            .collect();

        if responders.len() < r {
            return (false, Vec::new(), responders);
        }

        let mut per_node: Vec<(String, Vec<Version>)> = Vec::new();
        let mut flat = Vec::new();
        for (node, versions) in candidates.iter().zip(results) {
            let versions = versions.unwrap_or_default();
            flat.extend(versions.clone());
            per_node.push((node.clone(), versions));
        }

        let merged = prune_and_dedup(flat);
        self.store.overwrite_local_versions(key, merged.clone());

        if do_read_repair && !merged.is_empty() {
            let merged_sigs: HashSet<_> = merged.iter().map(|v| v.signature()).collect();
            for (node, existing) in per_node {
                let existing_sigs: HashSet<_> = existing.iter().map(|v| v.signature()).collect();
                if !merged_sigs.is_subset(&existing_sigs) {
                    self.spawn_repair_push(node, key.to_string(), merged.clone());
                }
            }
        }

        (true, merged, responders)
    }

    fn spawn_repair_push(&self, node: String, key: String, versions: Vec<Version>) {
        let client = self.client.clone();
        let timeout = self.replication_timeout;
        tokio::spawn(async move {
            for v in versions {
                let payload = ReplicatePayload {
                    key: key.clone(),
                    value: v.value,
                    vc: v.vc,
                };
                let url = format!("http://{node}/replicate");
                if let Err(e) = client.put(&url).timeout(timeout).json(&payload).send().await {
                    debug!(node, error = %e, "read-repair push failed");
                }
            }
        });
    }

    /// Client-facing PUT: internal quorum-read for the causal parent,
    /// merge-then-increment the vector clock, unconditional local write,
    /// then fan out and require `w` successes.
    pub async fn client_put(&self, key: &str, value: &str, r: usize, w: usize) -> PutOutcome {
        let candidates = self.candidates(key, false);

        let (ok, parent_versions, responders) = self.quorum_read(key, &candidates, r, true).await;
        let parent_versions = if ok { parent_versions } else { Vec::new() };

        let parent_vc = parent_versions
            .iter()
            .fold(VectorClock::new(), |acc, v| VectorClock::merge(&acc, &v.vc));

        let (success, succeeded, failed, stored_version) =
            self.quorum_write(key, value, &candidates, w, parent_vc).await;

        PutOutcome {
            success,
            requested_replicas: candidates,
            responded_to_parent_read: responders,
            succeeded,
            failed,
            stored_version,
        }
    }

    /// Client-facing GET: the quorum-read procedure, surfaced as an error
    /// when fewer than `r` replicas answered at all.
    pub async fn client_get(&self, key: &str, r: usize) -> Result<GetOutcome> {
        let candidates = self.candidates(key, false);
        let (ok, merged, responders) = self.quorum_read(key, &candidates, r, true).await;
        if !ok {
            return Err(Error::InsufficientReplicas(format!(
                "only {} of {r} required replicas responded",
                responders.len()
            )));
        }
        Ok(GetOutcome {
            resolved_versions: merged,
            responded_nodes: responders,
        })
    }

    /// Single-hop anti-entropy against the next candidate in the full
    /// (liveness-ignoring) preference list.
    pub async fn repair_once(&self, key: &str) -> Option<RepairOutcome> {
        let candidates = self.candidates(key, true);
        if candidates.is_empty() {
            return None;
        }

        let target = match candidates.iter().position(|n| *n == self.local_node_id) {
            Some(idx) => candidates[(idx + 1) % candidates.len()].clone(),
            None => candidates[0].clone(),
        };

        let local_versions = self.store.get_local_versions(key);

        let url = format!("http://{target}/get_local/{key}");
        let remote_versions = match self
            .client
            .get(&url)
            .timeout(self.read_timeout)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => resp
                .json::<GetLocalResponse>()
                .await
                .map(|r| r.versions)
                .unwrap_or_default(),
            _ => {
                return Some(RepairOutcome {
                    local_before: local_versions.len(),
                    remote_before: 0,
                    merged: local_versions.len(),
                    pushed_to: None,
                    pushed: 0,
                });
            }
        };

        let mut all = local_versions.clone();
        all.extend(remote_versions.clone());
        let merged = prune_and_dedup(all);
        self.store.overwrite_local_versions(key, merged.clone());

        let mut pushed = 0;
        for v in &merged {
            let payload = ReplicatePayload {
                key: key.to_string(),
                value: v.value.clone(),
                vc: v.vc.clone(),
            };
            let url = format!("http://{target}/replicate");
            if self
                .client
                .put(&url)
                .timeout(self.read_timeout)
                .json(&payload)
                .send()
                .await
                .is_ok()
            {
                pushed += 1;
            }
        }

        Some(RepairOutcome {
            local_before: local_versions.len(),
            remote_before: remote_versions.len(),
            merged: merged.len(),
            pushed_to: Some(target),
            pushed,
        })
    }
}

fn prune_and_dedup(all: Vec<Version>) -> Vec<Version> {
    use dynamo_core::Comparison;

    let mut keep = Vec::with_capacity(all.len());
    for (i, v) in all.iter().enumerate() {
        let dominated = all
            .iter()
            .enumerate()
            .any(|(j, w)| i != j && VectorClock::compare(&v.vc, &w.vc) == Comparison::Less);
        if !dominated {
            keep.push(v.clone());
        }
    }

    let mut seen = HashSet::new();
    keep.into_iter().filter(|v| seen.insert(v.signature())).collect()
}
