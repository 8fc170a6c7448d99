//! Client-side data access with a keyed response cache, explicit
//! invalidation and suppression of out-of-order responses.

pub mod app;
pub mod cache;
pub mod config;
pub mod ledger;
pub mod logging;
