//! Core traits and types for the fetch layer.

use async_trait::async_trait;
use color_eyre::Result;
use serde_json::Value;

/// The remote data source.
///
/// Given a topic name and optional params, eventually produces a raw JSON
/// result or fails. Calls may settle in any order relative to the order in
/// which they were made.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn call(&self, topic: &str, params: Option<Value>) -> Result<Value>;
}

/// Result of a guarded read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched<T> {
  /// The call is the latest one in its stream (or unguarded); apply the value.
  Fresh(FetchOutcome<T>),
  /// A newer call was started in the same stream; discard this result.
  Stale,
}

impl<T> Fetched<T> {
  pub fn is_stale(&self) -> bool {
    matches!(self, Fetched::Stale)
  }

  /// The delivered value, or `None` if the result was suppressed.
  pub fn into_data(self) -> Option<T> {
    match self {
      Fetched::Fresh(outcome) => Some(outcome.data),
      Fetched::Stale => None,
    }
  }
}

/// A delivered value together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
}

impl<T> FetchOutcome<T> {
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
    }
  }

  pub fn from_cache(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
    }
  }
}

/// Indicates where fetched data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from the transport
  Network,
  /// Data served from the request cache
  Cache,
}
