//! Bounded in-memory cache of decoded images with width-variant matching.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::domain::entities::{CacheFlags, ImageData, Request};
use crate::domain::ports::CacheStore;
use crate::infrastructure::cache::LruCache;

/// Default maximum number of (key, width) entries to keep.
pub const DEFAULT_CAPACITY: usize = 100;

struct Inner {
    /// variant key (key + width + flags) -> decoded image.
    entries: LruCache<u64, Arc<ImageData>>,
    /// source hash -> pixel widths ever stored for it, ascending.
    ///
    /// Widths are appended but never removed individually; a stale width
    /// simply misses in `entries` after eviction.
    widths: HashMap<u64, Vec<u32>>,
}

/// In-memory cache tier.
///
/// A narrower request can be satisfied by a previously cached wider variant
/// of the same logical source, never the reverse: serving an upscaled image
/// would lose fidelity.
pub struct MemoryCache {
    inner: Mutex<Inner>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    /// Creates a cache bounded to `capacity` (key, width) entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                widths: HashMap::new(),
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Creates a cache with the default capacity.
    #[must_use]
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Returns cache statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        CacheStats {
            hits,
            misses,
            hit_rate,
            size: self.inner.lock().entries.len(),
        }
    }

    fn lookup(&self, request: &Request) -> Option<Arc<ImageData>> {
        let width = request.resolved_width();
        let mut inner = self.inner.lock();

        if let Some(image) = inner.entries.get(&request.variant_key_with(width)) {
            return Some(Arc::clone(image));
        }

        // A wider cached variant scales down without losing fidelity; the
        // widths are sorted ascending, so the first hit is the smallest
        // adequate one.
        let candidates = inner
            .widths
            .get(&request.source_hash())
            .map(|widths| {
                widths
                    .iter()
                    .copied()
                    .filter(|w| *w > width)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        for wider in candidates {
            if let Some(image) = inner.entries.get(&request.variant_key_with(wider)) {
                return Some(Arc::clone(image));
            }
        }

        None
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

impl CacheStore for MemoryCache {
    fn is_valid(&self, request: &Request) -> bool {
        request.caches().contains(CacheFlags::MEMORY)
    }

    fn get(&self, request: &Request) -> Option<Arc<ImageData>> {
        if let Some(image) = self.lookup(request) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key = %request.key(), width = request.resolved_width(), "memory cache hit");
            Some(image)
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(key = %request.key(), width = request.resolved_width(), "memory cache miss");
            None
        }
    }

    fn put(&self, request: &Request, image: Arc<ImageData>) {
        // Record the width actually served: a source image narrower than the
        // request stays indexed under its real width.
        let width = image.pixel_width().max(request.resolved_width());
        let mut inner = self.inner.lock();
        inner.entries.put(request.variant_key_with(width), image);

        let widths = inner.widths.entry(request.source_hash()).or_default();
        if let Err(pos) = widths.binary_search(&width) {
            widths.insert(pos, width);
        }
        debug!(key = %request.key(), width, "stored image in memory cache");
    }

    fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.widths.clear();
        debug!("cleared memory cache");
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Current number of cached entries.
    pub size: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} entries, {:.1}% hit rate ({} hits, {} misses)",
            self.size, self.hit_rate, self.hits, self.misses
        )
    }
}
