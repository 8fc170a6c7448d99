//! Cached ledger client that wraps the transport with the fetch layer.

use color_eyre::Result;
use std::time::Duration;
use tracing::info;

use crate::cache::{FetchCoordinator, Fetched, LoadingTracker, RequestCache, RequestStream, Transport};
use crate::config::Config;

use super::client::{Latency, MockLedgerTransport};
use super::endpoint::Endpoint;
use super::types::{
  Employee, PaginatedRequestParams, PaginatedResponse, RequestByEmployeeParams,
  SetTransactionApprovalParams, Transaction,
};

/// Ledger client with transparent caching and stale-result suppression.
///
/// All transaction reads share one guarded stream: whichever transaction
/// listing was requested last is the only one allowed to reach the view.
#[derive(Clone)]
pub struct CachedLedgerClient {
  coordinator: FetchCoordinator,
  transactions: RequestStream,
}

impl CachedLedgerClient {
  /// Create a client over the mock backend described by `config`.
  pub fn new(config: &Config) -> Result<Self> {
    let latency = Latency::between(
      Duration::from_millis(config.transport.min_latency_ms),
      Duration::from_millis(config.transport.max_latency_ms),
    );
    let transport = MockLedgerTransport::seeded(latency)?;

    let cache = if config.cache.enabled {
      RequestCache::in_memory(config.cache.exempt_topics.iter().cloned())
    } else {
      info!("Response cache disabled");
      RequestCache::disabled()
    };

    Ok(Self::with_transport(transport, cache))
  }

  pub fn with_transport<T>(transport: T, cache: RequestCache) -> Self
  where
    T: Transport + 'static,
  {
    Self {
      coordinator: FetchCoordinator::new(transport, cache),
      transactions: RequestStream::new("transactions"),
    }
  }

  pub fn coordinator(&self) -> &FetchCoordinator {
    &self.coordinator
  }

  pub fn loading(&self) -> &LoadingTracker {
    self.coordinator.loading()
  }

  /// Get all employees.
  pub async fn employees(&self) -> Result<Fetched<Vec<Employee>>> {
    self
      .coordinator
      .fetch_guarded::<_, ()>(&self.transactions, Endpoint::Employees.as_str(), None)
      .await
  }

  /// Get one page of all transactions.
  pub async fn paginated_transactions(
    &self,
    page: u32,
  ) -> Result<Fetched<PaginatedResponse<Vec<Transaction>>>> {
    let params = PaginatedRequestParams { page: Some(page) };
    self
      .coordinator
      .fetch_guarded(
        &self.transactions,
        Endpoint::PaginatedTransactions.as_str(),
        Some(&params),
      )
      .await
  }

  /// Get every transaction of one employee.
  pub async fn transactions_by_employee(&self, employee_id: &str) -> Result<Fetched<Vec<Transaction>>> {
    let params = RequestByEmployeeParams {
      employee_id: employee_id.to_string(),
    };
    self
      .coordinator
      .fetch_guarded(
        &self.transactions,
        Endpoint::TransactionsByEmployee.as_str(),
        Some(&params),
      )
      .await
  }

  /// Approve or un-approve a transaction.
  ///
  /// Not cached. On success every cached listing that contains the
  /// transaction is dropped, so the next read fetches the new state.
  pub async fn set_transaction_approval(&self, transaction_id: &str, value: bool) -> Result<()> {
    let params = SetTransactionApprovalParams {
      transaction_id: transaction_id.to_string(),
      value,
    };
    let _: serde_json::Value = self
      .coordinator
      .mutate(
        Endpoint::SetTransactionApproval.as_str(),
        Some(&params),
        transaction_id,
      )
      .await?;

    info!("Transaction {} approval set to {}", transaction_id, value);
    Ok(())
  }

  /// Discard every transaction read still in flight, e.g. when the filter
  /// is cleared.
  pub fn reset_transactions(&self) {
    self.transactions.supersede();
  }

  /// Drop all derived state.
  pub fn clear_cache(&self) {
    self.coordinator.clear_cache();
  }

  pub fn clear_cache_by_endpoint(&self, endpoints: &[Endpoint]) {
    self.coordinator.clear_cache_by_endpoint(endpoints);
  }

  pub fn clear_cache_by_key(&self, key: &str) {
    self.coordinator.clear_cache_by_key(key);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{cache_key, CacheSource};

  fn client() -> CachedLedgerClient {
    let transport = MockLedgerTransport::seeded(Latency::NONE).unwrap();
    CachedLedgerClient::with_transport(transport, RequestCache::in_memory(["employees"]))
  }

  #[tokio::test]
  async fn test_employees_cached_under_bare_topic() {
    let client = client();
    let employees = client.employees().await.unwrap().into_data().unwrap();
    assert_eq!(employees.len(), 4);
    assert_eq!(client.coordinator().cache().keys(), vec!["employees".to_string()]);

    match client.employees().await.unwrap() {
      Fetched::Fresh(outcome) => assert_eq!(outcome.source, CacheSource::Cache),
      Fetched::Stale => panic!("employees must never be suppressed"),
    }
  }

  #[tokio::test]
  async fn test_approval_invalidates_affected_listings() {
    let client = client();
    client.employees().await.unwrap();
    let page = client
      .paginated_transactions(0)
      .await
      .unwrap()
      .into_data()
      .unwrap();
    let target = page.data[1].clone();
    assert!(!target.approved);

    client
      .transactions_by_employee(&target.employee.id)
      .await
      .unwrap();
    let other_employee = if target.employee.id == "emp-1" { "emp-3" } else { "emp-1" };
    client.transactions_by_employee(other_employee).await.unwrap();
    assert_eq!(client.coordinator().cache().len(), 4);

    client.set_transaction_approval(&target.id, true).await.unwrap();

    let cache = client.coordinator().cache();
    assert!(cache.contains_key("employees"));
    assert!(!cache.contains_key(&cache_key("paginatedTransactions", Some(&PaginatedRequestParams { page: Some(0) })).unwrap()));
    assert!(cache.contains_key(
      &cache_key(
        "transactionsByEmployee",
        Some(&RequestByEmployeeParams {
          employee_id: other_employee.to_string()
        })
      )
      .unwrap()
    ));
    assert_eq!(cache.len(), 2);

    // The re-fetched page reflects the approval
    let page = client
      .paginated_transactions(0)
      .await
      .unwrap()
      .into_data()
      .unwrap();
    assert!(page.data[1].approved);
  }

  #[tokio::test]
  async fn test_failed_approval_keeps_cache() {
    let client = client();
    client.paginated_transactions(0).await.unwrap();

    assert!(client.set_transaction_approval("txn-9999", true).await.is_err());
    assert_eq!(client.coordinator().cache().len(), 1);
    assert!(!client.loading().is_loading());
  }

  #[tokio::test(start_paused = true)]
  async fn test_rapid_filter_changes_deliver_only_latest() {
    let transport = MockLedgerTransport::seeded(Latency::between(
      Duration::from_millis(10),
      Duration::from_millis(500),
    ))
    .unwrap();
    let client = CachedLedgerClient::with_transport(transport, RequestCache::in_memory(["employees"]));

    let ids = ["emp-1", "emp-2", "emp-3", "emp-4"];
    let results = futures::future::join_all(ids.iter().map(|id| client.transactions_by_employee(id))).await;

    let delivered: Vec<Vec<Transaction>> = results
      .into_iter()
      .map(|r| r.unwrap())
      .filter_map(Fetched::into_data)
      .collect();
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].iter().all(|t| t.employee.id == "emp-4"));

    // Every call still landed in the cache
    assert_eq!(client.coordinator().cache().len(), 4);
    assert!(!client.loading().is_loading());
  }

  #[tokio::test]
  async fn test_clear_by_endpoint() {
    let client = client();
    client.employees().await.unwrap();
    client.paginated_transactions(0).await.unwrap();
    client.paginated_transactions(1).await.unwrap();

    client.clear_cache_by_endpoint(&[Endpoint::PaginatedTransactions, Endpoint::Employees]);
    assert_eq!(client.coordinator().cache().keys(), vec!["employees".to_string()]);

    client.clear_cache();
    assert!(client.coordinator().cache().is_empty());
  }
}
