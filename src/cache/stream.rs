//! Sequence counters for guarded request streams.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A logical stream of requests where only the most recently started call may
/// deliver its result (e.g. "transactions for the selected employee").
///
/// Cloning shares the counter. The counter only ever grows.
#[derive(Debug, Clone)]
pub struct RequestStream {
  name: Arc<str>,
  counter: Arc<AtomicU64>,
}

/// Position of a call within its stream, taken when the call starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

impl RequestStream {
  pub fn new(name: impl Into<Arc<str>>) -> Self {
    Self {
      name: name.into(),
      counter: Arc::new(AtomicU64::new(0)),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Current counter value.
  pub fn current(&self) -> u64 {
    self.counter.load(Ordering::SeqCst)
  }

  /// Start a call: bump the counter and return the post-increment value.
  pub fn issue(&self) -> Ticket {
    Ticket(self.counter.fetch_add(1, Ordering::SeqCst) + 1)
  }

  /// Whether `ticket` still belongs to the most recently started call.
  pub fn is_latest(&self, ticket: Ticket) -> bool {
    self.current() == ticket.0
  }

  /// Mark every outstanding call as stale without starting a new one.
  ///
  /// Used when the stream's context changes (e.g. the filter is reset) and
  /// nothing in flight should be applied anymore.
  pub fn supersede(&self) {
    self.counter.fetch_add(1, Ordering::SeqCst);
  }
}

impl Ticket {
  pub fn value(self) -> u64 {
    self.0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_issue_is_monotonic() {
    let stream = RequestStream::new("transactions");
    let a = stream.issue();
    let b = stream.issue();
    assert!(b > a);
    assert_eq!(b.value(), 2);
    assert!(!stream.is_latest(a));
    assert!(stream.is_latest(b));
  }

  #[test]
  fn test_clones_share_counter() {
    let stream = RequestStream::new("transactions");
    let other = stream.clone();
    let ticket = stream.issue();
    other.issue();
    assert!(!stream.is_latest(ticket));
    assert_eq!(stream.current(), 2);
  }

  #[test]
  fn test_supersede_invalidates_outstanding() {
    let stream = RequestStream::new("transactions");
    let ticket = stream.issue();
    stream.supersede();
    assert!(!stream.is_latest(ticket));

    let next = stream.issue();
    assert!(stream.is_latest(next));
  }
}
