use std::collections::HashMap;
use std::sync::Arc;

use dynamo_core::{now_millis, Comparison, VectorClock, Version};
use parking_lot::{Mutex, RwLock};

/// In-memory per-key mapping from key to its set of non-dominated versions.
///
/// Each key gets its own mutex so that operations on unrelated keys never
/// contend; the top-level map is only locked to look up or create that
/// per-key mutex, never held across the dominance-pruning work itself.
pub struct LocalStore {
    keys: RwLock<HashMap<String, Arc<Mutex<Vec<Version>>>>>,
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStore {
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
        }
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<Vec<Version>>> {
        if let Some(lock) = self.keys.read().get(key) {
            return lock.clone();
        }
        self.keys
            .write()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
            .clone()
    }

    /// Insert a new version, re-running dominance pruning over the full
    /// key-set, and return the canonical stored version (the candidate if it
    /// survived pruning, otherwise whichever version dominates it).
    pub fn put_local(&self, key: &str, value: String, vc: VectorClock) -> Version {
        let lock = self.key_lock(key);
        let mut guard = lock.lock();

        let candidate = Version::new(value, vc, now_millis());
        let candidate_sig = candidate.signature();

        let mut all = guard.clone();
        all.push(candidate.clone());
        let pruned = prune_and_dedup(all);

        let result = pruned
            .iter()
            .find(|v| v.signature() == candidate_sig)
            .cloned()
            .or_else(|| pruned.last().cloned())
            .unwrap_or(candidate);

        *guard = pruned;
        result
    }

    /// Snapshot copy of the current version set for a key, possibly empty.
    pub fn get_local_versions(&self, key: &str) -> Vec<Version> {
        let lock = self.key_lock(key);
        lock.lock().clone()
    }

    /// Replace the set with a caller-supplied list. The caller is
    /// responsible for dominance/dedup having already been applied.
    pub fn overwrite_local_versions(&self, key: &str, versions: Vec<Version>) {
        let lock = self.key_lock(key);
        *lock.lock() = versions;
    }

    /// Union remote versions with the local set, prune dominated, dedup,
    /// persist, and return the new set.
    pub fn merge_remote_versions(&self, key: &str, remote: Vec<Version>) -> Vec<Version> {
        let lock = self.key_lock(key);
        let mut guard = lock.lock();

        let mut all = guard.clone();
        all.extend(remote);
        let pruned = prune_and_dedup(all);

        *guard = pruned.clone();
        pruned
    }
}

/// Dominance pruning: a version `v` is kept iff no other version `w` in the
/// union satisfies `compare(v.vc, w.vc) = LESS`. `O(k^2)` by design, sibling
/// counts are expected to stay small, so no indexing is worth the complexity.
fn prune_and_dedup(all: Vec<Version>) -> Vec<Version> {
    let mut keep = Vec::with_capacity(all.len());
    for (i, v) in all.iter().enumerate() {
        let mut dominated = false;
        for (j, w) in all.iter().enumerate() {
            if i == j {
                continue;
            }
            if VectorClock::compare(&v.vc, &w.vc) == Comparison::Less {
                dominated = true;
                break;
            }
        }
        if !dominated {
            keep.push(v.clone());
        }
    }

    let mut seen = std::collections::HashSet::new();
    let mut unique = Vec::with_capacity(keep.len());
    for v in keep {
        let sig = v.signature();
        if seen.insert(sig) {
            unique.push(v);
        }
    }
    unique
}
