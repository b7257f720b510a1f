//! Cycle counters

use std::collections::BTreeMap;

/// Ordered string→count map aggregated over one clean-up cycle.
///
/// Keys are semantic: `resources-processed`, `<endpoint>-with-ttl`,
/// `<endpoint>-with-expiry`, `<endpoint>-deleted`, `rule-<id>-matches`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counter(BTreeMap<String, usize>);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a single key by one
    pub fn bump(&mut self, key: impl Into<String>) {
        *self.0.entry(key.into()).or_insert(0) += 1;
    }

    /// Current count for a key (zero when absent)
    pub fn get(&self, key: &str) -> usize {
        self.0.get(key).copied().unwrap_or(0)
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge another counter in, summing overlapping keys
    pub fn merge(&mut self, other: Counter) {
        for (key, value) in other.0 {
            *self.0.entry(key).or_insert(0) += value;
        }
    }

    /// `k1=v1, k2=v2, …` rendering used in the cycle summary log line
    pub fn summary(&self) -> String {
        self.0
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
