use std::collections::{HashMap, HashSet};

use sha1::{Digest, Sha1};

/// A ring position: the big-endian SHA-1 digest of a vnode or key id.
/// Byte-array comparison is lexicographic, which matches big-endian
/// unsigned-integer comparison, so `[u8; 20]` can be ordered directly.
pub type Position = [u8; 20];

fn hash_fn(s: &str) -> Position {
    let mut hasher = Sha1::new();
    hasher.update(s.as_bytes());
    hasher.finalize().into()
}

/// Consistent-hash ring with virtual nodes. Built once at startup and
/// immutable/lock-free thereafter (ring membership is fixed for the life of
/// the process; see the component design notes on runtime ring reshuffling).
pub struct HashRing {
    vnodes: usize,
    ring: Vec<Position>,
    vnode_at: HashMap<Position, String>,
    vnode_to_node: HashMap<String, String>,
    nodes: HashSet<String>,
}

impl HashRing {
    pub fn new(nodes: &[String], vnodes: usize) -> Self {
        let mut ring = HashRing {
            vnodes,
            ring: Vec::new(),
            vnode_at: HashMap::new(),
            vnode_to_node: HashMap::new(),
            nodes: HashSet::new(),
        };
        for node in nodes {
            ring.add_node(node);
        }
        ring
    }

    fn add_node(&mut self, node_id: &str) {
        if !self.nodes.insert(node_id.to_string()) {
            return;
        }
        for i in 0..self.vnodes {
            let mut vnode_id = format!("{node_id}#{i}");
            let mut pos = hash_fn(&vnode_id);
            while self.vnode_at.contains_key(&pos) {
                vnode_id.push('_');
                pos = hash_fn(&vnode_id);
            }
            let idx = self.ring.partition_point(|p| *p < pos);
            self.ring.insert(idx, pos);
            self.vnode_at.insert(pos, vnode_id.clone());
            self.vnode_to_node.insert(vnode_id, node_id.to_string());
        }
    }

    /// Up to `N` distinct physical node ids replicating `key`, walking the
    /// ring clockwise from `hash(key)`. If `alive` is `Some`, nodes not in
    /// that set are skipped. Terminates after `N` collected or after a full
    /// ring revolution, whichever comes first; the returned list may be
    /// shorter than `N`.
    pub fn get_replicas(&self, key: &str, n: usize, alive: Option<&HashSet<String>>) -> Vec<String> {
        if self.ring.is_empty() {
            return Vec::new();
        }

        let key_pos = hash_fn(key);
        let ring_len = self.ring.len();
        let idx = self.ring.partition_point(|p| *p <= key_pos);

        let mut res = Vec::with_capacity(n);
        let mut seen = HashSet::new();
        let mut i = idx;
        loop {
            let pos = self.ring[i % ring_len];
            let vnode_id = &self.vnode_at[&pos];
            let node = &self.vnode_to_node[vnode_id];
            i += 1;

            let full_revolution = i - idx >= ring_len;

            if seen.contains(node) {
                if full_revolution {
                    break;
                }
                continue;
            }
            if let Some(alive) = alive {
                if !alive.contains(node) {
                    if full_revolution {
                        break;
                    }
                    continue;
                }
            }

            res.push(node.clone());
            seen.insert(node.clone());

            if res.len() >= n || full_revolution {
                break;
            }
        }

        res
    }

    pub fn all_nodes(&self) -> Vec<String> {
        self.nodes.iter().cloned().collect()
    }

    /// `(position, vnode_id)` pairs in ring order, for debugging.
    pub fn ring_snapshot(&self) -> Vec<(String, String)> {
        self.ring
            .iter()
            .map(|pos| (hex::encode(pos), self.vnode_at[pos].clone()))
            .collect()
    }
}
