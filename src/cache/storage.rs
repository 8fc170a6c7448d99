//! Cache storage trait, in-memory implementation and the request cache.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use super::key::topic_of;

/// Trait for cache storage backends.
///
/// Payloads are stored as serialized JSON strings. None of the operations can
/// fail: a miss is simply `None`.
pub trait CacheStorage: Send + Sync {
  /// Get the payload stored under `key`.
  fn get(&self, key: &str) -> Option<String>;

  /// Store a payload, overwriting any previous entry for `key`.
  fn set(&self, key: &str, payload: String);

  /// Remove every entry.
  fn clear(&self);

  /// Remove a single entry. Returns whether an entry was removed.
  fn remove(&self, key: &str) -> bool;

  /// Remove every entry for which `predicate(key, payload)` holds.
  /// Returns the number of removed entries.
  fn remove_where(&self, predicate: &dyn Fn(&str, &str) -> bool) -> usize;

  /// Snapshot of the stored keys.
  fn keys(&self) -> Vec<String>;
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn get(&self, _key: &str) -> Option<String> {
    None // Always miss
  }

  fn set(&self, _key: &str, _payload: String) {
    // Discard
  }

  fn clear(&self) {}

  fn remove(&self, _key: &str) -> bool {
    false
  }

  fn remove_where(&self, _predicate: &dyn Fn(&str, &str) -> bool) -> usize {
    0
  }

  fn keys(&self) -> Vec<String> {
    Vec::new()
  }
}

/// Process-wide in-memory storage. Entries are never evicted by size or age.
#[derive(Default)]
pub struct MemoryStorage {
  entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  // Every mutation is a single map operation, so a poisoned map is still consistent.
  fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl CacheStorage for MemoryStorage {
  fn get(&self, key: &str) -> Option<String> {
    self.entries().get(key).cloned()
  }

  fn set(&self, key: &str, payload: String) {
    self.entries().insert(key.to_string(), payload);
  }

  fn clear(&self) {
    self.entries().clear();
  }

  fn remove(&self, key: &str) -> bool {
    self.entries().remove(key).is_some()
  }

  fn remove_where(&self, predicate: &dyn Fn(&str, &str) -> bool) -> usize {
    let mut entries = self.entries();
    let before = entries.len();
    entries.retain(|key, payload| !predicate(key.as_str(), payload.as_str()));
    before - entries.len()
  }

  fn keys(&self) -> Vec<String> {
    self.entries().keys().cloned().collect()
  }
}

/// Keyed response cache shared by every consumer of a session.
///
/// Wraps a storage backend and knows which topics are exempt: entries of an
/// exempt topic hold slow-changing reference data and survive topic and
/// containment sweeps. Only [`RequestCache::clear_all`] and
/// [`RequestCache::clear_by_key`] remove them.
#[derive(Clone)]
pub struct RequestCache {
  storage: Arc<dyn CacheStorage>,
  exempt_topics: Arc<BTreeSet<String>>,
}

impl RequestCache {
  /// Create a cache over the given storage backend.
  pub fn new<S>(storage: S, exempt_topics: impl IntoIterator<Item = impl Into<String>>) -> Self
  where
    S: CacheStorage + 'static,
  {
    Self {
      storage: Arc::new(storage),
      exempt_topics: Arc::new(exempt_topics.into_iter().map(Into::into).collect()),
    }
  }

  /// In-memory cache with the given exempt topics.
  pub fn in_memory(exempt_topics: impl IntoIterator<Item = impl Into<String>>) -> Self {
    Self::new(MemoryStorage::new(), exempt_topics)
  }

  /// Cache that never stores anything.
  pub fn disabled() -> Self {
    Self::new(NoopStorage, Vec::<String>::new())
  }

  /// Whether `topic` is exempt from staleness suppression and sweeps.
  pub fn is_exempt(&self, topic: &str) -> bool {
    self.exempt_topics.contains(topic)
  }

  pub fn get(&self, key: &str) -> Option<String> {
    self.storage.get(key)
  }

  pub fn set(&self, key: &str, payload: String) {
    self.storage.set(key, payload);
  }

  pub fn contains_key(&self, key: &str) -> bool {
    self.storage.get(key).is_some()
  }

  pub fn keys(&self) -> Vec<String> {
    self.storage.keys()
  }

  pub fn len(&self) -> usize {
    self.storage.keys().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Empty the cache entirely, exempt topics included.
  pub fn clear_all(&self) {
    self.storage.clear();
    info!("Cache cleared");
  }

  /// Remove exactly one entry if present.
  pub fn clear_by_key(&self, key: &str) {
    if self.storage.remove(key) {
      debug!("Cache entry removed: {}", key);
    }
  }

  /// Remove every non-exempt entry whose key starts with one of `topics`.
  ///
  /// This is a plain prefix match, so a topic also sweeps topics whose name it
  /// prefixes.
  pub fn clear_by_topics<T>(&self, topics: &[T]) -> usize
  where
    T: AsRef<str>,
  {
    let removed = self.clear_matching(|key, _| {
      topics
        .iter()
        .any(|topic| key.starts_with(topic.as_ref()))
    });
    info!("Cleared {} cache entries by topic", removed);
    removed
  }

  /// Remove every non-exempt entry whose serialized payload contains `needle`.
  ///
  /// Used after a mutation of an entity: any cached read that embedded the
  /// entity's identifier may now be out of date. Over-invalidation on
  /// substring collisions is accepted.
  pub fn clear_containing(&self, needle: &str) -> usize {
    let removed = self.clear_matching(|_, payload| payload.contains(needle));
    info!("Cleared {} cache entries containing {}", removed, needle);
    removed
  }

  /// Remove every non-exempt entry for which `predicate(key, payload)` holds.
  pub fn clear_matching<F>(&self, predicate: F) -> usize
  where
    F: Fn(&str, &str) -> bool,
  {
    self
      .storage
      .remove_where(&|key: &str, payload: &str| {
        !self.is_exempt(topic_of(key)) && predicate(key, payload)
      })
  }
}

impl std::fmt::Debug for RequestCache {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RequestCache")
      .field("entries", &self.len())
      .field("exempt_topics", &self.exempt_topics)
      .finish()
  }
}
