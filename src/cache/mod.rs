//! Client-side fetch layer: keyed response cache, stale-result suppression
//! and a shared loading signal around an asynchronous transport.
//!
//! - Responses are cached by a key derived from topic + params
//! - Reads that are part of a guarded stream only deliver the result of the
//!   most recently started call
//! - Mutations bypass the cache and invalidate every cached read that
//!   mentions the mutated entity

mod key;
mod layer;
mod loading;
mod storage;
mod stream;
mod traits;

pub use key::{cache_key, topic_of};
pub use layer::FetchCoordinator;
pub use loading::{InFlightGuard, LoadingTracker};
pub use storage::{CacheStorage, MemoryStorage, NoopStorage, RequestCache};
pub use stream::{RequestStream, Ticket};
pub use traits::{CacheSource, FetchOutcome, Fetched, Transport};
