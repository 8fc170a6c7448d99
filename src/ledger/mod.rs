//! Ledger domain: employees, their card transactions and approvals, served
//! through the cached fetch layer.

mod cached_client;
mod client;
mod endpoint;
mod types;

pub use cached_client::CachedLedgerClient;
pub use client::{Latency, MockLedgerTransport, TRANSACTIONS_PER_PAGE};
pub use endpoint::Endpoint;
pub use types::{
  Employee, PaginatedRequestParams, PaginatedResponse, RequestByEmployeeParams,
  SetTransactionApprovalParams, Transaction,
};
