//! Shared in-flight signal for UI consumers.

use std::sync::Arc;

use tokio::sync::watch;

/// Counts outstanding coordinator calls.
///
/// `loading` is a single signal for the whole coordinator, not per key: it is
/// true while at least one call is unresolved.
#[derive(Debug, Clone)]
pub struct LoadingTracker {
  tx: Arc<watch::Sender<usize>>,
}

impl Default for LoadingTracker {
  fn default() -> Self {
    Self::new()
  }
}

impl LoadingTracker {
  pub fn new() -> Self {
    let (tx, _rx) = watch::channel(0);
    Self { tx: Arc::new(tx) }
  }

  pub fn is_loading(&self) -> bool {
    self.in_flight() > 0
  }

  pub fn in_flight(&self) -> usize {
    *self.tx.borrow()
  }

  /// Subscribe to changes of the in-flight count.
  pub fn subscribe(&self) -> watch::Receiver<usize> {
    self.tx.subscribe()
  }

  /// Register a call. The returned guard releases it when dropped, so the
  /// count is restored on success, failure and cancellation alike.
  pub fn begin(&self) -> InFlightGuard {
    self.tx.send_modify(|count| *count += 1);
    InFlightGuard {
      tx: Arc::clone(&self.tx),
    }
  }
}

/// Releases one in-flight registration on drop.
#[derive(Debug)]
pub struct InFlightGuard {
  tx: Arc<watch::Sender<usize>>,
}

impl Drop for InFlightGuard {
  fn drop(&mut self) {
    self
      .tx
      .send_modify(|count| *count = count.saturating_sub(1));
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_overlapping_calls() {
    let tracker = LoadingTracker::new();
    assert!(!tracker.is_loading());

    let a = tracker.begin();
    let b = tracker.begin();
    assert_eq!(tracker.in_flight(), 2);

    drop(a);
    assert!(tracker.is_loading());

    drop(b);
    assert!(!tracker.is_loading());
  }

  #[tokio::test]
  async fn test_subscribers_see_changes() {
    let tracker = LoadingTracker::new();
    let mut rx = tracker.subscribe();

    let guard = tracker.begin();
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), 1);

    drop(guard);
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), 0);
  }
}
