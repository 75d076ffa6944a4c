//! In-process mutual exclusion per key.
//!
//! Used to serialise work on the same product (reservations and cancellations) and on the same payment (status
//! updates). The database's conditional updates remain the source of truth; these locks keep same-key operations from
//! contending inside SQLite.
use std::{collections::HashMap, hash::Hash, sync::Arc};

use log::*;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Unused entries are pruned once the table grows past this size.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug)]
pub struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self { locks: Mutex::new(HashMap::new()) }
    }
}

impl<K> KeyedLocks<K>
where K: Eq + Hash + Ord + Clone + std::fmt::Debug
{
    pub fn new() -> Self {
        Self::default()
    }

    async fn entry(&self, key: &K) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        if locks.len() > PRUNE_THRESHOLD {
            // An entry whose only reference is the table itself is not held or awaited by anyone.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    pub async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        let lock = self.entry(key).await;
        trace!("🔒️ Waiting for lock on {key:?}");
        lock.lock_owned().await
    }

    /// Locks every key, always in ascending order, so that two callers with overlapping key sets cannot deadlock.
    pub async fn lock_all(&self, keys: &[K]) -> Vec<OwnedMutexGuard<()>> {
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();
        let mut guards = Vec::with_capacity(keys.len());
        for key in &keys {
            guards.push(self.lock(key).await);
        }
        guards
    }

    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}
