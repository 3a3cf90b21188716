//! Cache tiers: in-process LRU and on-disk byte store.

mod disk;
mod lru;
mod memory;

pub use disk::DiskCache;
pub use lru::LruCache;
pub use memory::{CacheStats, DEFAULT_CAPACITY, MemoryCache};
