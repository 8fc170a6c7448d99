//! Fetch coordinator that orchestrates caching, stale-result suppression and
//! the loading signal around the transport.

use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::key::cache_key;
use super::loading::LoadingTracker;
use super::storage::RequestCache;
use super::stream::RequestStream;
use super::traits::{FetchOutcome, Fetched, Transport};

/// Coordinator that sits between consumers and the transport.
///
/// Owns the session state: the request cache and the loading signal. It is
/// created at session start and cheap to clone; clones share all state.
#[derive(Clone)]
pub struct FetchCoordinator {
  transport: Arc<dyn Transport>,
  cache: RequestCache,
  loading: LoadingTracker,
}

impl FetchCoordinator {
  /// Create a coordinator over the given transport and cache.
  pub fn new<T>(transport: T, cache: RequestCache) -> Self
  where
    T: Transport + 'static,
  {
    Self::from_shared(Arc::new(transport), cache)
  }

  pub fn from_shared(transport: Arc<dyn Transport>, cache: RequestCache) -> Self {
    Self {
      transport,
      cache,
      loading: LoadingTracker::new(),
    }
  }

  pub fn cache(&self) -> &RequestCache {
    &self.cache
  }

  /// The shared in-flight signal.
  pub fn loading(&self) -> &LoadingTracker {
    &self.loading
  }

  pub fn is_loading(&self) -> bool {
    self.loading.is_loading()
  }

  /// Read through the cache without taking part in a guarded stream.
  ///
  /// Never suppressed: the value is always delivered.
  pub async fn fetch_cached<T, P>(&self, topic: &str, params: Option<&P>) -> Result<FetchOutcome<T>>
  where
    T: DeserializeOwned,
    P: Serialize + ?Sized,
  {
    match self.read(None, topic, params).await? {
      Fetched::Fresh(outcome) => Ok(outcome),
      Fetched::Stale => Err(eyre!("Unguarded fetch of {} reported stale", topic)),
    }
  }

  /// Read through the cache as part of `stream`.
  ///
  /// 1. Take a ticket from the stream
  /// 2. Serve from cache on hit, otherwise call the transport and cache the
  ///    raw result
  /// 3. If another call was started in the stream meanwhile, return
  ///    [`Fetched::Stale`] so the consumer leaves its displayed state alone.
  ///    Exempt topics skip this check.
  /// 4. Decode the delivered value
  ///
  /// A stale call still writes its result to the cache.
  pub async fn fetch_guarded<T, P>(
    &self,
    stream: &RequestStream,
    topic: &str,
    params: Option<&P>,
  ) -> Result<Fetched<T>>
  where
    T: DeserializeOwned,
    P: Serialize + ?Sized,
  {
    self.read(Some(stream), topic, params).await
  }

  async fn read<T, P>(
    &self,
    stream: Option<&RequestStream>,
    topic: &str,
    params: Option<&P>,
  ) -> Result<Fetched<T>>
  where
    T: DeserializeOwned,
    P: Serialize + ?Sized,
  {
    let _guard = self.loading.begin();

    let params = params.map(|p| to_params(topic, p)).transpose()?;
    let key = cache_key(topic, params.as_ref())?;

    let ticket = stream.map(|stream| {
      let ticket = stream.issue();
      debug!("Ticket {} issued on {} for {}", ticket.value(), stream.name(), key);
      (stream, ticket)
    });

    // Check cache first
    let candidate = if let Some(payload) = self.cache.get(&key) {
      debug!("Cache HIT: {}", key);
      Candidate::Cached(payload)
    } else {
      debug!("Cache MISS: {}", key);
      let raw = self.call(topic, params).await?;
      let payload = serde_json::to_string(&raw)
        .map_err(|e| eyre!("Failed to serialize result of {}: {}", key, e))?;
      self.cache.set(&key, payload);
      Candidate::Network(raw)
    };

    // Exempt topics take a ticket but are never suppressed
    if let Some((stream, ticket)) = ticket {
      if !self.cache.is_exempt(topic) && !stream.is_latest(ticket) {
        debug!(
          "Suppressing stale result for {} (ticket {}, current {})",
          key,
          ticket.value(),
          stream.current()
        );
        return Ok(Fetched::Stale);
      }
    }

    let outcome = match candidate {
      Candidate::Cached(payload) => FetchOutcome::from_cache(
        serde_json::from_str(&payload).map_err(|e| eyre!("Failed to decode cached {}: {}", key, e))?,
      ),
      Candidate::Network(raw) => FetchOutcome::from_network(
        serde_json::from_value(raw).map_err(|e| eyre!("Failed to decode result of {}: {}", key, e))?,
      ),
    };

    Ok(Fetched::Fresh(outcome))
  }

  /// Call the transport directly, bypassing the cache in both directions.
  ///
  /// Meant for mutations. Does not touch the cache on success or failure.
  pub async fn fetch_uncached<T, P>(&self, topic: &str, params: Option<&P>) -> Result<T>
  where
    T: DeserializeOwned,
    P: Serialize + ?Sized,
  {
    let _guard = self.loading.begin();

    let params = params.map(|p| to_params(topic, p)).transpose()?;
    let raw = self.call(topic, params).await?;

    serde_json::from_value(raw).map_err(|e| eyre!("Failed to decode result of {}: {}", topic, e))
  }

  /// Run a mutation and, once it succeeded, drop every non-exempt cached read
  /// whose payload mentions `affected_id`.
  pub async fn mutate<T, P>(&self, topic: &str, params: Option<&P>, affected_id: &str) -> Result<T>
  where
    T: DeserializeOwned,
    P: Serialize + ?Sized,
  {
    let result = self.fetch_uncached(topic, params).await?;
    self.cache.clear_containing(affected_id);
    Ok(result)
  }

  /// Empty the cache.
  pub fn clear_cache(&self) {
    self.cache.clear_all();
  }

  /// Drop every non-exempt entry whose key starts with one of `topics`.
  pub fn clear_cache_by_endpoint<T>(&self, topics: &[T])
  where
    T: AsRef<str>,
  {
    self.cache.clear_by_topics(topics);
  }

  pub fn clear_cache_by_key(&self, key: &str) {
    self.cache.clear_by_key(key);
  }

  async fn call(&self, topic: &str, params: Option<Value>) -> Result<Value> {
    self.transport.call(topic, params).await.inspect_err(|e| {
      warn!("Transport call {} failed: {}", topic, e);
    })
  }
}

/// Undecoded result of a read.
enum Candidate {
  Cached(String),
  Network(Value),
}

fn to_params<P>(topic: &str, params: &P) -> Result<Value>
where
  P: Serialize + ?Sized,
{
  serde_json::to_value(params).map_err(|e| eyre!("Failed to serialize params for {}: {}", topic, e))
}
