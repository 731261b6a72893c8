//! Execution counters
//!
//! - Counters only, monotonic
//! - One registry per execution context

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one query execution
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Batched resolver round trips issued
    resolver_calls: AtomicU64,
    /// Distinct keys filled by the resolver
    keys_resolved: AtomicU64,
    /// Null candidates synthesized for keys without candidates
    null_candidates: AtomicU64,
    /// Rows pulled into join spools
    rows_spooled: AtomicU64,
    /// Rows served from replay buffers instead of upstream
    rows_replayed: AtomicU64,
    /// Digit vectors visited by the odometer
    combinations: AtomicU64,
    /// Strategy switches to direct
    strategy_switches: AtomicU64,
    /// Completed plan swaps
    plan_swaps: AtomicU64,
    /// Caches reused across a swap
    caches_transplanted: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_resolver_calls(&self) {
        self.resolver_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_keys_resolved(&self, keys: u64) {
        self.keys_resolved.fetch_add(keys, Ordering::Relaxed);
    }

    pub fn increment_null_candidates(&self) {
        self.null_candidates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rows_spooled(&self) {
        self.rows_spooled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rows_replayed(&self) {
        self.rows_replayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_combinations(&self) {
        self.combinations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_strategy_switches(&self) {
        self.strategy_switches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_plan_swaps(&self) {
        self.plan_swaps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_caches_transplanted(&self) {
        self.caches_transplanted.fetch_add(1, Ordering::Relaxed);
    }

    /// Resolver calls so far
    pub fn resolver_calls(&self) -> u64 {
        self.resolver_calls.load(Ordering::Relaxed)
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            resolver_calls: self.resolver_calls.load(Ordering::Relaxed),
            keys_resolved: self.keys_resolved.load(Ordering::Relaxed),
            null_candidates: self.null_candidates.load(Ordering::Relaxed),
            rows_spooled: self.rows_spooled.load(Ordering::Relaxed),
            rows_replayed: self.rows_replayed.load(Ordering::Relaxed),
            combinations: self.combinations.load(Ordering::Relaxed),
            strategy_switches: self.strategy_switches.load(Ordering::Relaxed),
            plan_swaps: self.plan_swaps.load(Ordering::Relaxed),
            caches_transplanted: self.caches_transplanted.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of all counters
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub resolver_calls: u64,
    pub keys_resolved: u64,
    pub null_candidates: u64,
    pub rows_spooled: u64,
    pub rows_replayed: u64,
    pub combinations: u64,
    pub strategy_switches: u64,
    pub plan_swaps: u64,
    pub caches_transplanted: u64,
}
