//! Per-name mutual exclusion
//!
//! Every update to a forward FQDN or a PTR name runs while holding that
//! name's lock, so two events touching the same name never hand overlapping
//! scripts to the updater. Events touching disjoint names proceed in
//! parallel.
//!
//! ## Entry Lifetime
//!
//! Lock entries are created on first use and never removed. Memory grows
//! with the number of distinct names ever seen, but a waiter can never end
//! up holding a lock that was evicted and replaced under the same name.
//!
//! ## Ordering Contract
//!
//! When one operation needs two names (old and new PTR names), it must go
//! through [`NameLockRegistry::acquire_ordered`]. The pair is deduplicated
//! and locked in ascending order of the normalized names, so two tasks
//! holding swapped old/new names always contend on the same name first and
//! never wait on each other in a cycle. Released in reverse order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::trace;

/// Registry of named locks shared by every update task
///
/// Cloning is cheap and yields a handle to the same registry.
#[derive(Debug, Clone, Default)]
pub struct NameLockRegistry {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl NameLockRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other task holds `name`, then hold it
    ///
    /// Names are compared case-insensitively and as absolute names, so
    /// `Host.Example.com` and `host.example.com.` share one lock.
    pub async fn acquire(&self, name: &str) -> NameLock {
        let key = normalize(name);
        let lock = self.entry(&key);

        trace!(name = %key, "Waiting for name lock");
        let guard = lock.lock_owned().await;
        trace!(name = %key, "Acquired name lock");

        NameLock { name: key, _guard: guard }
    }

    /// Acquire the old and new names of one operation
    ///
    /// Absent names are skipped and a name equal to the other is locked
    /// once. The remaining names are locked in ascending order.
    pub async fn acquire_ordered(&self, old: Option<&str>, new: Option<&str>) -> NameLockSet {
        let mut names: Vec<String> = old.into_iter().chain(new).map(normalize).collect();
        names.sort();
        names.dedup();

        let mut held = Vec::with_capacity(names.len());
        for name in &names {
            held.push(self.acquire(name).await);
        }

        NameLockSet { held }
    }

    /// Number of distinct names seen so far
    pub fn len(&self) -> usize {
        self.table().len()
    }

    /// Whether no name has been locked yet
    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    /// Whether an entry exists for `name`
    pub fn contains(&self, name: &str) -> bool {
        self.table().contains_key(&normalize(name))
    }

    /// Atomic get-or-insert of the entry for `key`
    fn entry(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.table();
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    fn table(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        // The map is only mutated by insertions, so a poisoned table is still consistent
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn normalize(name: &str) -> String {
    let mut key = name.trim().to_ascii_lowercase();
    if !key.ends_with('.') {
        key.push('.');
    }
    key
}

/// Exclusive hold on one name; released on drop
#[derive(Debug)]
pub struct NameLock {
    name: String,
    _guard: OwnedMutexGuard<()>,
}

impl NameLock {
    /// The normalized name this lock guards
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Release the lock, waking the next waiter for this name
    pub fn release(self) {
        trace!(name = %self.name, "Released name lock");
    }
}

/// Locks taken together under the ordering contract
///
/// Released in reverse acquisition order.
#[derive(Debug)]
pub struct NameLockSet {
    held: Vec<NameLock>,
}

impl NameLockSet {
    /// Names held, in acquisition order
    pub fn names(&self) -> Vec<&str> {
        self.held.iter().map(NameLock::name).collect()
    }

    /// Release every lock in reverse acquisition order
    pub fn release(self) {}
}

impl Drop for NameLockSet {
    fn drop(&mut self) {
        while let Some(lock) = self.held.pop() {
            lock.release();
        }
    }
}
