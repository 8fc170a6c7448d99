//! Registered endpoints of the ledger API.

use color_eyre::{eyre::eyre, Report};
use std::fmt;
use std::str::FromStr;

/// Topics the ledger transport understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
  /// List all employees
  Employees,
  /// One page of all transactions
  PaginatedTransactions,
  /// All transactions of a single employee
  TransactionsByEmployee,
  /// Approve or un-approve a transaction
  SetTransactionApproval,
}

impl Endpoint {
  pub const ALL: [Endpoint; 4] = [
    Endpoint::Employees,
    Endpoint::PaginatedTransactions,
    Endpoint::TransactionsByEmployee,
    Endpoint::SetTransactionApproval,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Employees => "employees",
      Self::PaginatedTransactions => "paginatedTransactions",
      Self::TransactionsByEmployee => "transactionsByEmployee",
      Self::SetTransactionApproval => "setTransactionApproval",
    }
  }
}

impl AsRef<str> for Endpoint {
  fn as_ref(&self) -> &str {
    self.as_str()
  }
}

impl fmt::Display for Endpoint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Endpoint {
  type Err = Report;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|endpoint| endpoint.as_str() == s)
      .ok_or_else(|| eyre!("Unknown endpoint: {}", s))
  }
}
