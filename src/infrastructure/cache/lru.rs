//! Generic fixed-capacity LRU store with O(1) get/put/evict.
//!
//! The access-order list is an arena of slots linked by indices instead of
//! a pointer graph, so there are no reference cycles to break and splice
//! and evict stay O(1).

use std::collections::HashMap;
use std::hash::Hash;

struct Slot<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Fixed-capacity key-value store with least-recently-used eviction.
///
/// The head of the access list is always the most recently accessed entry,
/// the tail the least. A read promotes the entry to the head, so reads count
/// as uses for recency purposes.
pub struct LruCache<K, V> {
    capacity: usize,
    index: HashMap<K, usize>,
    slots: Vec<Option<Slot<K, V>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl<K: Eq + Hash + Clone, V> LruCache<K, V> {
    /// Creates a cache holding at most `capacity` entries (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            index: HashMap::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: None,
            tail: None,
        }
    }

    /// Maximum number of entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns true when the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Looks up a value and promotes it to most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let idx = *self.index.get(key)?;
        self.detach(idx);
        self.push_front(idx);
        self.slots[idx].as_ref().map(|slot| &slot.value)
    }

    /// Looks up a value without touching recency.
    #[must_use]
    pub fn peek(&self, key: &K) -> Option<&V> {
        let idx = *self.index.get(key)?;
        self.slots[idx].as_ref().map(|slot| &slot.value)
    }

    /// Inserts or updates a value, promoting it to most recently used.
    ///
    /// Updating an existing key resets its recency without changing the
    /// occupied count. Inserting at capacity evicts the current tail first,
    /// returning the evicted pair.
    pub fn put(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(&idx) = self.index.get(&key) {
            if let Some(slot) = self.slots[idx].as_mut() {
                slot.value = value;
            }
            self.detach(idx);
            self.push_front(idx);
            return None;
        }

        let evicted = if self.index.len() >= self.capacity {
            self.tail.and_then(|tail| {
                self.detach(tail);
                let slot = self.slots[tail].take()?;
                self.index.remove(&slot.key);
                self.free.push(tail);
                Some((slot.key, slot.value))
            })
        } else {
            None
        };

        let slot = Slot {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        };
        let idx = if let Some(idx) = self.free.pop() {
            self.slots[idx] = Some(slot);
            idx
        } else {
            self.slots.push(Some(slot));
            self.slots.len() - 1
        };
        self.index.insert(key, idx);
        self.push_front(idx);
        evicted
    }

    /// Removes a key, returning its value. Removing an absent key is a no-op.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let idx = self.index.remove(key)?;
        self.detach(idx);
        let slot = self.slots[idx].take()?;
        self.free.push(idx);
        Some(slot.value)
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.index.clear();
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
    }

    /// Unlinks a slot from the access list.
    fn detach(&mut self, idx: usize) {
        let (prev, next) = match self.slots[idx].as_ref() {
            Some(slot) => (slot.prev, slot.next),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(slot) = self.slots[p].as_mut() {
                    slot.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(slot) = self.slots[n].as_mut() {
                    slot.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(slot) = self.slots[idx].as_mut() {
            slot.prev = None;
            slot.next = None;
        }
    }

    /// Links a detached slot in as the new head.
    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        if let Some(slot) = self.slots[idx].as_mut() {
            slot.prev = None;
            slot.next = old_head;
        }
        if let Some(h) = old_head
            && let Some(slot) = self.slots[h].as_mut()
        {
            slot.prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }
}

impl<K: Eq + Hash + Clone, V> std::fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
