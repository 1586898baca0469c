//! Body-keyed render cache with a single-flight guard
//!
//! Keys are the raw body text, compared verbatim. A key's slot is created
//! on first lookup and holds an in-flight lock plus the rendered value once
//! it exists. Only the caller holding the lock renders; everyone else either
//! finds the value already set or waits for the lock and then finds it.
//! Rendered keys are also tracked in an LRU index that drives eviction.

use crate::metrics::{CacheStats, RenderMetrics};
use crate::renderer::{RenderError, Renderer};
use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::{debug, warn};

/// Per-key cache slot
struct Slot {
    value: OnceLock<Arc<str>>,
    in_flight: Mutex<()>,
}

impl Slot {
    fn new() -> Self {
        Slot {
            value: OnceLock::new(),
            in_flight: Mutex::new(()),
        }
    }
}

/// Memoizes a [`Renderer`] by raw body text
pub struct RenderCache<R: Renderer> {
    renderer: R,

    entries: DashMap<Arc<str>, Arc<Slot>>,

    /// Rendered keys, least recently used first
    recency: Mutex<LruCache<Arc<str>, ()>>,

    /// Maximum number of entries (0 = unlimited)
    max_entries: usize,

    metrics: RenderMetrics,
}

impl<R: Renderer> RenderCache<R> {
    /// Create an unbounded cache
    pub fn new(renderer: R) -> Self {
        Self::with_max_entries(renderer, 0)
    }

    /// Create a cache that keeps at most `max_entries` rendered bodies
    /// (0 = unlimited)
    pub fn with_max_entries(renderer: R, max_entries: usize) -> Self {
        RenderCache {
            renderer,
            entries: DashMap::new(),
            recency: Mutex::new(LruCache::unbounded()),
            max_entries,
            metrics: RenderMetrics::new(),
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Return the rendered output for `body`, rendering it on a miss
    ///
    /// The renderer runs at most once per distinct body while the entry is
    /// retained. A failed render is returned to the caller and leaves nothing
    /// behind for the key, so a later call tries again.
    pub fn render_content(&self, body: &str) -> Result<Arc<str>, RenderError> {
        loop {
            let (key, slot) = self.slot(body);

            if let Some(value) = slot.value.get() {
                self.touch(body);
                self.metrics.record_hit();
                return Ok(Arc::clone(value));
            }

            let guard = slot.in_flight.lock();

            // Another caller may have finished while we waited on the lock.
            if let Some(value) = slot.value.get() {
                self.touch(body);
                self.metrics.record_coalesced();
                return Ok(Arc::clone(value));
            }

            // A failed render dropped this slot while we waited.
            if !self.is_current(body, &slot) {
                continue;
            }

            self.metrics.record_miss();
            debug!(body_len = body.len(), "render cache miss");

            let started = Instant::now();
            let result = self.renderer.render_raw(body);
            self.metrics.record_render(started.elapsed());

            let output: Arc<str> = match result {
                Ok(output) => Arc::from(output),
                Err(err) => {
                    self.metrics.record_failure();
                    warn!(error = %err, body_len = body.len(), "render failed");
                    // Still holding the guard, so no waiter can have filled it.
                    self.entries
                        .remove_if(body, |_, s| Arc::ptr_eq(s, &slot) && s.value.get().is_none());
                    drop(guard);
                    return Err(err);
                }
            };

            // We hold the in-flight lock and saw the slot empty, so this set wins.
            let _ = slot.value.set(Arc::clone(&output));
            drop(guard);

            self.admit(key);
            return Ok(output);
        }
    }

    /// Look up a rendered body without rendering
    pub fn get(&self, body: &str) -> Option<Arc<str>> {
        let slot = self.entries.get(body).map(|entry| Arc::clone(entry.value()))?;
        let value = slot.value.get().cloned();
        if value.is_some() {
            self.touch(body);
        }
        value
    }

    /// Number of rendered entries
    pub fn len(&self) -> usize {
        self.recency.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry and reset the counters
    pub fn clear(&self) {
        let mut recency = self.recency.lock();
        self.entries.clear();
        recency.clear();
        self.metrics.reset();
    }

    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot(self.len())
    }

    fn slot(&self, body: &str) -> (Arc<str>, Arc<Slot>) {
        if let Some(entry) = self.entries.get(body) {
            return (Arc::clone(entry.key()), Arc::clone(entry.value()));
        }

        let entry = self
            .entries
            .entry(Arc::from(body))
            .or_insert_with(|| Arc::new(Slot::new()));
        (Arc::clone(entry.key()), Arc::clone(entry.value()))
    }

    fn is_current(&self, body: &str, slot: &Arc<Slot>) -> bool {
        self.entries
            .get(body)
            .is_some_and(|entry| Arc::ptr_eq(entry.value(), slot))
    }

    fn touch(&self, body: &str) {
        self.recency.lock().promote(body);
    }

    /// Record a freshly rendered key and evict least recently used entries
    /// until within capacity
    fn admit(&self, key: Arc<str>) {
        let evicted: Vec<Arc<str>> = {
            let mut recency = self.recency.lock();
            recency.put(key, ());
            if self.max_entries == 0 {
                return;
            }
            let mut evicted = Vec::new();
            while recency.len() > self.max_entries {
                match recency.pop_lru() {
                    Some((key, ())) => evicted.push(key),
                    None => break,
                }
            }
            evicted
        };

        for key in evicted {
            if self
                .entries
                .remove_if(&key, |_, slot| slot.value.get().is_some())
                .is_some()
            {
                self.metrics.record_eviction();
                debug!(body_len = key.len(), "evicted render cache entry");
            }
        }
    }
}

impl<R: Renderer> std::fmt::Debug for RenderCache<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderCache")
            .field("entries", &self.len())
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::time::Duration;

    /// Renderer that counts its invocations
    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl Counting {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Renderer for Counting {
        type Tree = String;

        fn parse(&self, raw: &str) -> Result<Self::Tree, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            if raw.contains("broken") {
                return Err(RenderError::Parse("broken markup".into()));
            }
            Ok(raw.to_string())
        }

        fn render(&self, tree: &Self::Tree) -> Result<String, RenderError> {
            Ok(format!("<p>{tree}</p>"))
        }
    }

    #[test]
    fn test_second_lookup_is_a_hit() {
        let cache = RenderCache::new(Counting::default());

        assert_eq!(&*cache.render_content("hello").unwrap(), "<p>hello</p>");
        assert_eq!(&*cache.render_content("hello").unwrap(), "<p>hello</p>");

        assert_eq!(cache.renderer().calls(), 1);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_keys_are_verbatim() {
        let cache = RenderCache::new(Counting::default());

        cache.render_content("a").unwrap();
        cache.render_content("a ").unwrap();
        cache.render_content("A").unwrap();

        assert_eq!(cache.renderer().calls(), 3);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let cache = RenderCache::new(Counting::default());

        assert!(cache.render_content("broken").is_err());
        assert!(cache.render_content("broken").is_err());

        assert_eq!(cache.renderer().calls(), 2);
        assert_eq!(cache.get("broken"), None);
        assert_eq!(cache.stats().failures, 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_failed_renders_leave_no_slots() {
        let cache = RenderCache::with_max_entries(Counting::default(), 2);

        for i in 0..1000 {
            assert!(cache.render_content(&format!("broken {i}")).is_err());
        }
        cache.render_content("fine").unwrap();

        assert_eq!(cache.entries.len(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().failures, 1000);
    }

    #[test]
    fn test_concurrent_callers_share_one_render() {
        let cache = RenderCache::new(Counting {
            calls: AtomicUsize::new(0),
            delay: Some(Duration::from_millis(50)),
        });
        let barrier = Barrier::new(8);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    barrier.wait();
                    let out = cache.render_content("shared body").unwrap();
                    assert_eq!(&*out, "<p>shared body</p>");
                });
            }
        });

        assert_eq!(cache.renderer().calls(), 1);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits + stats.coalesced, 7);
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() {
        let cache = RenderCache::with_max_entries(Counting::default(), 2);

        cache.render_content("one").unwrap();
        cache.render_content("two").unwrap();
        // Touch "one" so "two" becomes the oldest.
        cache.render_content("one").unwrap();
        cache.render_content("three").unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.get("one").is_some());
        assert!(cache.get("two").is_none());
        assert!(cache.get("three").is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_eviction_follows_lookups() {
        let cache = RenderCache::with_max_entries(Counting::default(), 3);

        for body in ["a", "b", "c"] {
            cache.render_content(body).unwrap();
        }
        assert!(cache.get("a").is_some());
        cache.render_content("d").unwrap();
        cache.render_content("e").unwrap();

        assert_eq!(cache.entries.len(), 3);
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_none());
        assert_eq!(cache.stats().evictions, 2);
    }

    #[test]
    fn test_clear() {
        let cache = RenderCache::new(Counting::default());
        cache.render_content("x").unwrap();
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());

        cache.render_content("x").unwrap();
        assert_eq!(cache.renderer().calls(), 2);
    }
}
