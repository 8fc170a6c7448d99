//! In-memory ledger backend with simulated network latency.

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use color_eyre::{eyre::eyre, Result};
use rand::Rng;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

use crate::cache::Transport;

use super::endpoint::Endpoint;
use super::types::{
  Employee, PaginatedRequestParams, PaginatedResponse, RequestByEmployeeParams,
  SetTransactionApprovalParams, Transaction,
};

/// Number of transactions per page of `paginatedTransactions`.
pub const TRANSACTIONS_PER_PAGE: usize = 5;

const MERCHANTS: [&str; 6] = [
  "Social Media Ads Inc",
  "Cloud Hosting Co",
  "Office Supplies Depot",
  "Airline Travel",
  "Coffee Roasters",
  "Team Lunch Catering",
];

/// Range from which the delay of each call is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Latency {
  pub min: Duration,
  pub max: Duration,
}

impl Latency {
  pub const NONE: Latency = Latency {
    min: Duration::ZERO,
    max: Duration::ZERO,
  };

  pub fn between(min: Duration, max: Duration) -> Self {
    Self {
      min: min.min(max),
      max: min.max(max),
    }
  }

  fn sample(&self) -> Duration {
    if self.min == self.max {
      return self.min;
    }
    rand::thread_rng().gen_range(self.min..=self.max)
  }
}

#[derive(Debug)]
struct LedgerData {
  employees: Vec<Employee>,
  transactions: Vec<Transaction>,
}

/// Mock ledger API that answers every registered endpoint from memory.
///
/// Each call sleeps for a random delay first, so concurrent calls settle out
/// of order the way real network calls do.
#[derive(Debug)]
pub struct MockLedgerTransport {
  data: Mutex<LedgerData>,
  latency: Latency,
}

impl MockLedgerTransport {
  /// Create a backend with the built-in sample ledger.
  pub fn seeded(latency: Latency) -> Result<Self> {
    let employees = sample_employees();
    let transactions = sample_transactions(&employees)?;
    Ok(Self::with_data(employees, transactions, latency))
  }

  pub fn with_data(employees: Vec<Employee>, transactions: Vec<Transaction>, latency: Latency) -> Self {
    Self {
      data: Mutex::new(LedgerData {
        employees,
        transactions,
      }),
      latency,
    }
  }

  fn data(&self) -> MutexGuard<'_, LedgerData> {
    self.data.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn dispatch(&self, endpoint: Endpoint, params: Option<Value>) -> Result<Value> {
    match endpoint {
      Endpoint::Employees => to_value(&self.data().employees),
      Endpoint::PaginatedTransactions => {
        let params: PaginatedRequestParams = decode_params(endpoint, params)?;
        to_value(&self.paginated_transactions(params)?)
      }
      Endpoint::TransactionsByEmployee => {
        let params: RequestByEmployeeParams = decode_params(endpoint, params)?;
        to_value(&self.transactions_by_employee(&params)?)
      }
      Endpoint::SetTransactionApproval => {
        let params: SetTransactionApprovalParams = decode_params(endpoint, params)?;
        self.set_transaction_approval(&params)?;
        Ok(Value::Null)
      }
    }
  }

  fn paginated_transactions(
    &self,
    params: PaginatedRequestParams,
  ) -> Result<PaginatedResponse<Vec<Transaction>>> {
    let page = params.page.ok_or_else(|| eyre!("Page cannot be null"))? as usize;
    let data = self.data();

    let start = page * TRANSACTIONS_PER_PAGE;
    if start > data.transactions.len() {
      return Err(eyre!("Invalid page {}", page));
    }
    let end = (start + TRANSACTIONS_PER_PAGE).min(data.transactions.len());
    let next_page = (end < data.transactions.len()).then(|| page as u32 + 1);

    Ok(PaginatedResponse {
      data: data.transactions[start..end].to_vec(),
      next_page,
    })
  }

  fn transactions_by_employee(&self, params: &RequestByEmployeeParams) -> Result<Vec<Transaction>> {
    if params.employee_id.is_empty() {
      return Err(eyre!("Employee id cannot be empty"));
    }

    Ok(
      self
        .data()
        .transactions
        .iter()
        .filter(|t| t.employee.id == params.employee_id)
        .cloned()
        .collect(),
    )
  }

  fn set_transaction_approval(&self, params: &SetTransactionApprovalParams) -> Result<()> {
    let mut data = self.data();
    let transaction = data
      .transactions
      .iter_mut()
      .find(|t| t.id == params.transaction_id)
      .ok_or_else(|| eyre!("Invalid transaction to approve: {}", params.transaction_id))?;

    transaction.approved = params.value;
    Ok(())
  }
}

#[async_trait]
impl Transport for MockLedgerTransport {
  async fn call(&self, topic: &str, params: Option<Value>) -> Result<Value> {
    let endpoint: Endpoint = topic.parse()?;

    let delay = self.latency.sample();
    debug!("{} responding in {}ms", endpoint, delay.as_millis());
    if !delay.is_zero() {
      tokio::time::sleep(delay).await;
    }

    self.dispatch(endpoint, params)
  }
}

fn decode_params<P>(endpoint: Endpoint, params: Option<Value>) -> Result<P>
where
  P: DeserializeOwned,
{
  let params = params.ok_or_else(|| eyre!("Missing params for {}", endpoint))?;
  serde_json::from_value(params).map_err(|e| eyre!("Invalid params for {}: {}", endpoint, e))
}

fn to_value<T>(value: &T) -> Result<Value>
where
  T: Serialize + ?Sized,
{
  serde_json::to_value(value).map_err(|e| eyre!("Failed to serialize response: {}", e))
}

fn sample_employees() -> Vec<Employee> {
  [
    ("James", "Smith"),
    ("Mary", "Johnson"),
    ("Robert", "Williams"),
    ("Patricia", "Brown"),
  ]
  .into_iter()
  .enumerate()
  .map(|(i, (first, last))| Employee {
    id: format!("emp-{}", i + 1),
    first_name: first.to_string(),
    last_name: last.to_string(),
  })
  .collect()
}

fn sample_transactions(employees: &[Employee]) -> Result<Vec<Transaction>> {
  let start = NaiveDate::from_ymd_opt(2024, 1, 2).ok_or_else(|| eyre!("Invalid sample start date"))?;

  (0..18u64)
    .map(|i| {
      let employee = employees[i as usize % employees.len()].clone();
      let date = start
        .checked_add_days(Days::new(i * 3))
        .ok_or_else(|| eyre!("Sample date out of range"))?;

      Ok(Transaction {
        id: format!("txn-{:04}", i + 1),
        amount: ((i * 137 + 42) % 900) as f64 + 0.99,
        employee,
        merchant: MERCHANTS[i as usize % MERCHANTS.len()].to_string(),
        date,
        approved: i % 4 == 0,
      })
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn transport() -> MockLedgerTransport {
    MockLedgerTransport::seeded(Latency::NONE).unwrap()
  }

  #[tokio::test]
  async fn test_employees() {
    let employees: Vec<Employee> =
      serde_json::from_value(transport().call("employees", None).await.unwrap()).unwrap();
    assert_eq!(employees.len(), 4);
    assert_eq!(employees[0].full_name(), "James Smith");
  }

  #[tokio::test]
  async fn test_pagination() {
    let transport = transport();

    let first: PaginatedResponse<Vec<Transaction>> = serde_json::from_value(
      transport
        .call("paginatedTransactions", Some(json!({ "page": 0 })))
        .await
        .unwrap(),
    )
    .unwrap();
    assert_eq!(first.data.len(), TRANSACTIONS_PER_PAGE);
    assert_eq!(first.next_page, Some(1));

    let last: PaginatedResponse<Vec<Transaction>> = serde_json::from_value(
      transport
        .call("paginatedTransactions", Some(json!({ "page": 3 })))
        .await
        .unwrap(),
    )
    .unwrap();
    assert_eq!(last.data.len(), 3);
    assert_eq!(last.next_page, None);
  }

  #[tokio::test]
  async fn test_null_page_is_rejected() {
    let result = transport()
      .call("paginatedTransactions", Some(json!({ "page": null })))
      .await;
    assert!(result.unwrap_err().to_string().contains("Page cannot be null"));
  }

  #[tokio::test]
  async fn test_transactions_by_employee() {
    let transactions: Vec<Transaction> = serde_json::from_value(
      transport()
        .call("transactionsByEmployee", Some(json!({ "employeeId": "emp-2" })))
        .await
        .unwrap(),
    )
    .unwrap();
    assert!(!transactions.is_empty());
    assert!(transactions.iter().all(|t| t.employee.id == "emp-2"));
  }

  #[tokio::test]
  async fn test_empty_employee_id_is_rejected() {
    let result = transport()
      .call("transactionsByEmployee", Some(json!({ "employeeId": "" })))
      .await;
    assert!(result.is_err());
  }

  #[tokio::test]
  async fn test_set_transaction_approval() {
    let transport = transport();
    transport
      .call(
        "setTransactionApproval",
        Some(json!({ "transactionId": "txn-0002", "value": true })),
      )
      .await
      .unwrap();

    let approved = transport
      .data()
      .transactions
      .iter()
      .find(|t| t.id == "txn-0002")
      .map(|t| t.approved);
    assert_eq!(approved, Some(true));

    let missing = transport
      .call(
        "setTransactionApproval",
        Some(json!({ "transactionId": "txn-9999", "value": true })),
      )
      .await;
    assert!(missing.is_err());
  }

  #[tokio::test]
  async fn test_unknown_topic() {
    assert!(transport().call("transactions", None).await.is_err());
  }

  #[tokio::test(start_paused = true)]
  async fn test_latency_is_simulated() {
    let transport = MockLedgerTransport::seeded(Latency::between(
      Duration::from_millis(200),
      Duration::from_millis(200),
    ))
    .unwrap();

    let started = tokio::time::Instant::now();
    transport.call("employees", None).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(200));
  }
}
