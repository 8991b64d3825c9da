//! Bounded cache of decoded reset-interval groups
//!
//! Every hit raises the accessed item's score by 2 and lowers all others by
//! 1. When full, the item with the lowest score is evicted; ties go to the
//! item inserted first.

use std::collections::HashMap;
use std::hash::Hash;

use crate::error::{Error, Result};

#[derive(Debug)]
struct Slot<V> {
    value: V,
    hits: i64,
    inserted: u64,
}

/// Capacity-bounded cache with hit-count scoring.
#[derive(Debug)]
pub struct BlockCache<K, V> {
    slots: HashMap<K, Slot<V>>,
    capacity: usize,
    next_insert: u64,
}

impl<K: Eq + Hash + Copy, V> BlockCache<K, V> {
    /// Create a cache holding at most `capacity` items.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidFormat(
                "block cache capacity must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            slots: HashMap::with_capacity(capacity),
            capacity,
            next_insert: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    /// Current score of `key`, if cached.
    pub fn hits(&self, key: &K) -> Option<i64> {
        self.slots.get(key).map(|slot| slot.hits)
    }

    /// Look up `key`, updating scores on a hit.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        if !self.slots.contains_key(key) {
            return None;
        }
        for (k, slot) in &mut self.slots {
            if k == key {
                slot.hits += 2;
            } else {
                slot.hits -= 1;
            }
        }
        self.slots.get(key).map(|slot| &slot.value)
    }

    /// Evict the lowest-scoring item if the cache is full.
    pub fn prune(&mut self) -> Option<V> {
        if self.slots.len() < self.capacity {
            return None;
        }
        let victim = self
            .slots
            .iter()
            .min_by_key(|(_, slot)| (slot.hits, slot.inserted))
            .map(|(key, _)| *key)?;
        tracing::debug!("Evicting cached block group (score {:?})", self.hits(&victim));
        self.slots.remove(&victim).map(|slot| slot.value)
    }

    /// Insert or replace `key`. A new key makes room first.
    ///
    /// Returns the evicted value, if any.
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        if let Some(slot) = self.slots.get_mut(&key) {
            slot.value = value;
            return None;
        }
        let evicted = self.prune();
        self.slots.insert(
            key,
            Slot {
                value,
                hits: 1,
                inserted: self.next_insert,
            },
        );
        self.next_insert += 1;
        evicted
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}
