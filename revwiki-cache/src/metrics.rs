//! Render cache metrics
//!
//! Counters for cache effectiveness and time spent in the renderer.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Live counters, updated by the cache
#[derive(Debug, Default)]
pub struct RenderMetrics {
    /// Lookups answered from a stored entry
    pub hit_count: AtomicU64,

    /// Lookups that had to invoke the renderer
    pub miss_count: AtomicU64,

    /// Lookups that waited on another caller's in-flight render
    pub coalesced_count: AtomicU64,

    /// Renderer invocations that failed
    pub failure_count: AtomicU64,

    /// Entries dropped to respect the capacity
    pub eviction_count: AtomicU64,

    /// Total time spent in the renderer (nanoseconds)
    pub total_render_time_ns: AtomicU64,
}

impl RenderMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hit_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.miss_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_coalesced(&self) {
        self.coalesced_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.eviction_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_render(&self, duration: Duration) {
        self.total_render_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.hit_count.store(0, Ordering::Relaxed);
        self.miss_count.store(0, Ordering::Relaxed);
        self.coalesced_count.store(0, Ordering::Relaxed);
        self.failure_count.store(0, Ordering::Relaxed);
        self.eviction_count.store(0, Ordering::Relaxed);
        self.total_render_time_ns.store(0, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self, entries: usize) -> CacheStats {
        CacheStats {
            hits: self.hit_count.load(Ordering::Relaxed),
            misses: self.miss_count.load(Ordering::Relaxed),
            coalesced: self.coalesced_count.load(Ordering::Relaxed),
            failures: self.failure_count.load(Ordering::Relaxed),
            evictions: self.eviction_count.load(Ordering::Relaxed),
            total_render_time_ns: self.total_render_time_ns.load(Ordering::Relaxed),
            entries,
        }
    }
}

/// Statistics about cache usage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub coalesced: u64,
    pub failures: u64,
    pub evictions: u64,
    pub total_render_time_ns: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Fraction of lookups served without rendering (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.coalesced;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }

    /// Average renderer time per miss
    pub fn avg_render_time(&self) -> Duration {
        if self.misses == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.total_render_time_ns / self.misses)
        }
    }
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Render Cache:")?;
        writeln!(
            f,
            "  Hits: {} | Coalesced: {} | Misses: {} | Hit Rate: {:.1}%",
            self.hits,
            self.coalesced,
            self.misses,
            self.hit_rate() * 100.0
        )?;
        writeln!(
            f,
            "  Failures: {} | Evictions: {} | Entries: {}",
            self.failures, self.evictions, self.entries
        )?;
        writeln!(
            f,
            "  Avg Render: {:.2}ms",
            self.avg_render_time().as_secs_f64() * 1000.0
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_counts_coalesced_as_served() {
        let metrics = RenderMetrics::new();
        metrics.record_hit();
        metrics.record_coalesced();
        metrics.record_miss();
        metrics.record_miss();

        let stats = metrics.snapshot(2);
        assert_eq!(stats.hit_rate(), 0.5);
        assert_eq!(stats.entries, 2);
    }

    #[test]
    fn test_avg_render_time() {
        let metrics = RenderMetrics::new();
        metrics.record_miss();
        metrics.record_render(Duration::from_millis(10));
        metrics.record_miss();
        metrics.record_render(Duration::from_millis(20));

        assert_eq!(
            metrics.snapshot(0).avg_render_time(),
            Duration::from_millis(15)
        );
    }

    #[test]
    fn test_reset() {
        let metrics = RenderMetrics::new();
        metrics.record_hit();
        metrics.record_failure();
        metrics.reset();

        assert_eq!(metrics.snapshot(0), CacheStats::default());
    }
}
