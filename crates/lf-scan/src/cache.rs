//! Memoized scan runs.

use std::collections::HashMap;

use lf_sim::SimulationResult;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::warn;

/// In-memory results of earlier runs, keyed by request digest.
///
/// Keys cover the request, the parameter values and the scan options but
/// not the model, so one cache must only serve scans over one model
/// factory.
#[derive(Debug, Clone, Default)]
pub struct ScanCache {
    runs: HashMap<String, SimulationResult>,
    hits: usize,
}

impl ScanCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hex SHA-256 digest of the JSON form of `request`, or `None` if it
    /// has no JSON form. Such requests are never cached.
    pub fn key(request: &impl Serialize) -> Option<String> {
        let json = match serde_json::to_vec(request) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "scan request has no cache key");
                return None;
            }
        };
        let mut hasher = Sha256::new();
        hasher.update(&json);
        Some(format!("{:x}", hasher.finalize()))
    }

    pub fn get(&mut self, key: &str) -> Option<&SimulationResult> {
        let hit = self.runs.get(key);
        if hit.is_some() {
            self.hits += 1;
        }
        hit
    }

    pub fn insert(&mut self, key: String, result: SimulationResult) {
        self.runs.insert(key, result);
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Lookups answered from the cache so far.
    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn clear(&mut self) {
        self.runs.clear();
        self.hits = 0;
    }
}
