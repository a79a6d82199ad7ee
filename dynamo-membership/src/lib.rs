use std::collections::{HashMap, HashSet};
use std::time::Duration;

use dynamo_core::now_millis;
use parking_lot::{Mutex, RwLock};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

const FAIL_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Alive,
    Dead,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberEntry {
    pub status: Status,
    pub incarnation: u64,
    pub timestamp: u64,
}

pub type MembershipTable = HashMap<String, MemberEntry>;

/// Heartbeat failure detector plus periodic gossip over a fixed peer set.
/// Ring membership (the node-id set) never changes at runtime; this service
/// only tracks liveness of that fixed set.
pub struct MembershipService {
    self_id: String,
    peers: Vec<String>,
    table: RwLock<MembershipTable>,
    fail_counts: Mutex<HashMap<String, u32>>,
    client: reqwest::Client,
    ping_timeout: Duration,
}

impl MembershipService {
    pub fn new(self_id: String, all_nodes: &[String], ping_timeout: Duration) -> Self {
        let peers: Vec<String> = all_nodes.iter().filter(|n| **n != self_id).cloned().collect();
        let now = now_millis();

        let mut table = HashMap::new();
        table.insert(
            self_id.clone(),
            MemberEntry {
                status: Status::Alive,
                incarnation: 1,
                timestamp: now,
            },
        );
        for peer in &peers {
            table.insert(
                peer.clone(),
                MemberEntry {
                    status: Status::Alive,
                    incarnation: 1,
                    timestamp: now,
                },
            );
        }

        let fail_counts = peers.iter().map(|p| (p.clone(), 0)).collect();

        Self {
            self_id,
            peers,
            table: RwLock::new(table),
            fail_counts: Mutex::new(fail_counts),
            client: reqwest::Client::new(),
            ping_timeout,
        }
    }

    pub fn alive_nodes(&self) -> HashSet<String> {
        self.table
            .read()
            .iter()
            .filter(|(_, e)| e.status == Status::Alive)
            .map(|(node, _)| node.clone())
            .collect()
    }

    pub fn get_membership(&self) -> MembershipTable {
        self.table.read().clone()
    }

    fn mark_alive(&self, node: &str) {
        let mut table = self.table.write();
        if let Some(entry) = table.get_mut(node) {
            entry.status = Status::Alive;
            entry.timestamp = now_millis();
        }
    }

    fn mark_dead(&self, node: &str) {
        let mut table = self.table.write();
        if let Some(entry) = table.get_mut(node) {
            entry.status = Status::Dead;
            entry.timestamp = now_millis();
        }
    }

    async fn probe_once(&self, peer: &str) {
        let url = format!("http://{peer}/ping");
        let ok = self
            .client
            .get(&url)
            .timeout(self.ping_timeout)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false);

        if ok {
            *self.fail_counts.lock().entry(peer.to_string()).or_insert(0) = 0;
            self.mark_alive(peer);
            return;
        }

        let count = {
            let mut counts = self.fail_counts.lock();
            let c = counts.entry(peer.to_string()).or_insert(0);
            *c += 1;
            *c
        };
        debug!(peer, count, "ping failed");
        if count >= FAIL_THRESHOLD {
            self.mark_dead(peer);
        }
    }

    async fn gossip_once(&self) {
        let candidates: Vec<String> = self
            .alive_nodes()
            .into_iter()
            .filter(|n| *n != self.self_id)
            .collect();
        let Some(peer) = candidates.choose(&mut rand::thread_rng()) else {
            return;
        };

        let url = format!("http://{peer}/gossip");
        let body = self.get_membership();
        let resp = self
            .client
            .post(&url)
            .timeout(self.ping_timeout)
            .json(&body)
            .send()
            .await;

        match resp {
            Ok(r) if r.status().is_success() => match r.json::<MembershipTable>().await {
                Ok(remote) => self.merge(remote),
                Err(e) => debug!(peer, error = %e, "gossip response decode failed"),
            },
            _ => debug!(peer, "gossip failed"),
        }
    }

    /// Merge a remote membership view into the local table. Unknown nodes
    /// are adopted; known nodes update on higher incarnation, or on equal
    /// incarnation with a newer timestamp. The local node's own entry is
    /// authoritative: observing self marked dead bumps our own incarnation
    /// and re-asserts `alive` instead of adopting the remote claim.
    pub fn merge(&self, remote: MembershipTable) {
        let mut table = self.table.write();
        for (node, remote_entry) in remote {
            if node == self.self_id {
                if remote_entry.status == Status::Dead {
                    let local = table.get(&self.self_id).cloned();
                    let next_incarnation = local
                        .as_ref()
                        .map(|l| l.incarnation.max(remote_entry.incarnation + 1))
                        .unwrap_or(remote_entry.incarnation + 1);
                    table.insert(
                        self.self_id.clone(),
                        MemberEntry {
                            status: Status::Alive,
                            incarnation: next_incarnation,
                            timestamp: now_millis(),
                        },
                    );
                }
                continue;
            }

            match table.get(&node) {
                None => {
                    table.insert(node, remote_entry);
                }
                Some(local) => {
                    if remote_entry.incarnation > local.incarnation
                        || (remote_entry.incarnation == local.incarnation
                            && remote_entry.timestamp > local.timestamp)
                    {
                        table.insert(node, remote_entry);
                    }
                }
            }
        }
    }

    async fn run(&self, heartbeat_interval: Duration, mut stop_rx: watch::Receiver<bool>) {
        loop {
            if *stop_rx.borrow() {
                break;
            }

            futures::future::join_all(self.peers.iter().map(|p| self.probe_once(p))).await;
            self.gossip_once().await;

            tokio::time::sleep(heartbeat_interval).await;
        }
    }
}

/// Owns the background probe/gossip task and its cooperative stop signal.
pub struct MembershipHandle {
    service: std::sync::Arc<MembershipService>,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MembershipHandle {
    pub fn spawn(service: std::sync::Arc<MembershipService>, heartbeat_interval: Duration) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        let svc = service.clone();
        let task = tokio::spawn(async move {
            svc.run(heartbeat_interval, stop_rx).await;
        });
        Self { service, stop_tx, task }
    }

    pub fn service(&self) -> &std::sync::Arc<MembershipService> {
        &self.service
    }

    /// Signal the loop to stop after its current iteration and wait for it
    /// to exit. Mirrors the original's "checked once per loop, no
    /// preemption" stop semantics, via an idiomatic cancellation channel
    /// instead of a raw boolean flag.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.task.await;
    }
}
