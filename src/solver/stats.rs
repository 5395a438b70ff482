//! Per-solver cache statistics.
//!
//! One counter block per solver instance, mutated through atomics so
//! read-only snapshots never block the hot path.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug, Default)]
pub struct CexCacheStats {
    pub queries: AtomicU64,
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub quick_hits: AtomicU64,
    pub prev_hits: AtomicU64,
    pub guess_hits: AtomicU64,
    pub ub_exact_hits: AtomicU64,
    pub ub_superset_hits: AtomicU64,
    pub ub_subset_hits: AtomicU64,
    pub try_all_hits: AtomicU64,
    pub backend_queries: AtomicU64,
    pub backend_time_us: AtomicU64,
    pub lookup_time_us: AtomicU64,
}

impl CexCacheStats {
    pub fn snapshot(&self) -> CexCacheStatsSnapshot {
        CexCacheStatsSnapshot {
            queries: self.queries.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            quick_hits: self.quick_hits.load(Ordering::Relaxed),
            prev_hits: self.prev_hits.load(Ordering::Relaxed),
            guess_hits: self.guess_hits.load(Ordering::Relaxed),
            ub_exact_hits: self.ub_exact_hits.load(Ordering::Relaxed),
            ub_superset_hits: self.ub_superset_hits.load(Ordering::Relaxed),
            ub_subset_hits: self.ub_subset_hits.load(Ordering::Relaxed),
            try_all_hits: self.try_all_hits.load(Ordering::Relaxed),
            backend_queries: self.backend_queries.load(Ordering::Relaxed),
            backend_time_us: self.backend_time_us.load(Ordering::Relaxed),
            lookup_time_us: self.lookup_time_us.load(Ordering::Relaxed),
        }
    }

    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time view of the counters, serializable for telemetry sinks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CexCacheStatsSnapshot {
    pub queries: u64,
    pub hits: u64,
    pub misses: u64,
    pub quick_hits: u64,
    pub prev_hits: u64,
    pub guess_hits: u64,
    pub ub_exact_hits: u64,
    pub ub_superset_hits: u64,
    pub ub_subset_hits: u64,
    pub try_all_hits: u64,
    pub backend_queries: u64,
    pub backend_time_us: u64,
    pub lookup_time_us: u64,
}

/// Adds the elapsed wall time to a counter when dropped.
pub struct TimerGuard<'a> {
    counter: &'a AtomicU64,
    started: Instant,
}

impl<'a> TimerGuard<'a> {
    pub fn new(counter: &'a AtomicU64) -> Self {
        TimerGuard {
            counter,
            started: Instant::now(),
        }
    }
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        let micros = self.started.elapsed().as_micros() as u64;
        self.counter.fetch_add(micros, Ordering::Relaxed);
    }
}
