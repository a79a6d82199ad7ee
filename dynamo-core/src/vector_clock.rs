use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Result of comparing two vector clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Less,
    Equal,
    Greater,
    Concurrent,
}

/// Mapping from node id to a monotone counter. Missing entries are zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorClock(HashMap<String, u64>);

impl VectorClock {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn get(&self, node_id: &str) -> u64 {
        self.0.get(node_id).copied().unwrap_or(0)
    }

    /// Counter for `node_id` += 1, returning the new clock.
    pub fn increment(&self, node_id: &str) -> Self {
        let mut out = self.clone();
        let entry = out.0.entry(node_id.to_string()).or_insert(0);
        *entry += 1;
        out
    }

    /// Coordinate-wise max of two clocks.
    pub fn merge(a: &Self, b: &Self) -> Self {
        let mut out = a.clone();
        for (node, &count) in &b.0 {
            let entry = out.0.entry(node.clone()).or_insert(0);
            if count > *entry {
                *entry = count;
            }
        }
        out
    }

    /// Compare over the union of both clocks' keys, treating absence as zero.
    pub fn compare(a: &Self, b: &Self) -> Comparison {
        let mut a_less = false;
        let mut b_less = false;
        let keys = a.0.keys().chain(b.0.keys());
        let mut seen = std::collections::HashSet::new();
        for key in keys {
            if !seen.insert(key.as_str()) {
                continue;
            }
            let av = a.get(key);
            let bv = b.get(key);
            if av < bv {
                a_less = true;
            } else if av > bv {
                b_less = true;
            }
        }
        match (a_less, b_less) {
            (false, false) => Comparison::Equal,
            (true, false) => Comparison::Less,
            (false, true) => Comparison::Greater,
            (true, true) => Comparison::Concurrent,
        }
    }

    /// Order-independent byte form, for dedup signatures: entries sorted by node id.
    pub fn canonical(&self) -> String {
        let mut entries: Vec<(&str, u64)> = self.0.iter().map(|(k, &v)| (k.as_str(), v)).collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        let mut out = String::new();
        for (node, count) in entries {
            out.push_str(node);
            out.push(':');
            out.push_str(&count.to_string());
            out.push(',');
        }
        out
    }
}
