use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use rustc_hash::FxHashMap;

/// At most one outstanding operation per key.
///
/// [`SingleFlight::begin`] atomically checks and marks the key; the returned
/// [`Flight`] clears it when dropped, whatever the outcome of the work.
pub struct SingleFlight<K: Eq + Hash> {
    inner: Arc<Mutex<Table<K>>>,
}

struct Table<K> {
    // key -> ticket of the flight that owns it
    keys: FxHashMap<K, u64>,
    next: u64,
}

impl<K: Eq + Hash> Default for SingleFlight<K> {
    fn default() -> Self {
        Self { inner: Arc::new(Mutex::new(Table { keys: FxHashMap::default(), next: 0 })) }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

impl<K: Eq + Hash + Clone> SingleFlight<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` in flight. `None` when another flight for it is outstanding.
    pub fn begin(&self, key: K) -> Option<Flight<K>> {
        let mut t = lock(&self.inner);
        if t.keys.contains_key(&key) {
            return None;
        }
        t.next += 1;
        let ticket = t.next;
        t.keys.insert(key.clone(), ticket);
        Some(Flight { inner: Arc::clone(&self.inner), key, ticket })
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        lock(&self.inner).keys.contains_key(key)
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget all keys. Guards issued before the clear release nothing.
    pub fn clear(&self) {
        lock(&self.inner).keys.clear();
    }
}

/// Guard for one in-flight key.
pub struct Flight<K: Eq + Hash> {
    inner: Arc<Mutex<Table<K>>>,
    key: K,
    ticket: u64,
}

impl<K: Eq + Hash> Flight<K> {
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K: Eq + Hash> Drop for Flight<K> {
    fn drop(&mut self) {
        let mut t = lock(&self.inner);
        if t.keys.get(&self.key) == Some(&self.ticket) {
            t.keys.remove(&self.key);
        }
    }
}
