//! A small TTL cache in front of chat-platform listing calls.
//!
//! Expiry is measured with [`tokio::time::Instant`], so tests can drive it
//! with a paused clock.

use std::{
  collections::HashMap,
  hash::Hash,
  sync::{PoisonError, RwLock},
  time::Duration,
};

use tokio::time::Instant;

pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

struct Entry<V> {
  value:   V,
  expires: Instant,
}

pub struct TtlCache<K, V> {
  ttl:     Duration,
  entries: RwLock<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
  K: Eq + Hash,
  V: Clone,
{
  pub fn new(ttl: Duration) -> Self {
    Self { ttl, entries: RwLock::new(HashMap::new()) }
  }

  pub fn ttl(&self) -> Duration { self.ttl }

  /// The cached value, unless it has expired.
  pub fn get(&self, key: &K) -> Option<V> {
    let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
    entries
      .get(key)
      .filter(|e| e.expires > Instant::now())
      .map(|e| e.value.clone())
  }

  /// Store `value`, dropping any entries that have already expired.
  pub fn insert(&self, key: K, value: V) {
    let now         = Instant::now();
    let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
    entries.retain(|_, e| e.expires > now);
    entries.insert(key, Entry { value, expires: now + self.ttl });
  }

  pub fn invalidate(&self, key: &K) {
    self.entries.write().unwrap_or_else(PoisonError::into_inner).remove(key);
  }

  pub fn clear(&self) {
    self.entries.write().unwrap_or_else(PoisonError::into_inner).clear();
  }
}

impl<K: Eq + Hash, V: Clone> Default for TtlCache<K, V> {
  fn default() -> Self { Self::new(DEFAULT_TTL) }
}
