use serde::{Deserialize, Serialize};

use crate::vector_clock::VectorClock;

/// A single stored value together with the vector clock at acceptance time.
///
/// `ts` is a wall-clock tie-break / debugging aid only, never used for
/// causality decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub value: String,
    pub vc: VectorClock,
    pub ts: u64,
}

impl Version {
    pub fn new(value: String, vc: VectorClock, ts: u64) -> Self {
        Self { value, vc, ts }
    }

    /// Dedup key: identical `(value, canonical(vc))` pairs are the same version.
    pub fn signature(&self) -> (String, String) {
        (self.value.clone(), self.vc.canonical())
    }
}

/// Current wall-clock time in milliseconds since the epoch.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
