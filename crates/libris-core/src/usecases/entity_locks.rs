//! Keyed mutual exclusion
//!
//! [`EntityLocks`] hands out one async mutex per entity id so operations on
//! the same book or loan run one at a time while operations on different
//! entities never wait on each other. Slots are created on first use and
//! pruned when the last guard for them is dropped.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A table of per-entity async mutexes
#[derive(Debug)]
pub struct EntityLocks<K>
where
    K: Eq + Hash + Clone,
{
    slots: DashMap<K, Arc<Mutex<()>>>,
}

impl<K> EntityLocks<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Waits until no other guard for `key` is held, then takes it
    pub async fn lock(&self, key: &K) -> EntityGuard<'_, K> {
        // The shard lock taken by `entry` is released before awaiting.
        let slot = self
            .slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = slot.lock_owned().await;
        EntityGuard {
            locks: self,
            key: key.clone(),
            guard: Some(guard),
        }
    }

    /// Number of entities with a held or awaited lock
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<K> Default for EntityLocks<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive access to one entity; released on drop
pub struct EntityGuard<'a, K>
where
    K: Eq + Hash + Clone,
{
    locks: &'a EntityLocks<K>,
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K> Drop for EntityGuard<'_, K>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map itself still references the slot: nobody holds or awaits it.
        self.locks
            .slots
            .remove_if(&self.key, |_, slot| Arc::strong_count(slot) == 1);
    }
}
