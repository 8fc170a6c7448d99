//! Scripted session that drives the ledger client the way a transactions
//! view would: initial load, paging, rapid filter changes and approvals.

use color_eyre::{eyre::eyre, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info};

use crate::cache::Fetched;
use crate::config::Config;
use crate::ledger::{CachedLedgerClient, Employee, PaginatedResponse, Transaction};

/// What the transactions view currently displays.
#[derive(Debug, Default)]
pub struct TransactionsView {
  /// None until the first listing arrives
  pub transactions: Option<Vec<Transaction>>,
  /// Next page to request, if the unfiltered listing has more
  pub next_page: Option<u32>,
  /// Employee the listing is filtered by
  pub employee_id: Option<String>,
}

impl TransactionsView {
  /// Apply a page of the unfiltered listing. Page 0 replaces the list, later
  /// pages extend it. Returns false if the result was stale and ignored.
  pub fn apply_page(&mut self, page: u32, fetched: Fetched<PaginatedResponse<Vec<Transaction>>>) -> bool {
    let Some(response) = fetched.into_data() else {
      return false;
    };

    let mut transactions = if page == 0 {
      Vec::new()
    } else {
      self.transactions.take().unwrap_or_default()
    };
    transactions.extend(response.data);

    self.transactions = Some(transactions);
    self.next_page = response.next_page;
    self.employee_id = None;
    true
  }

  /// Apply the listing of one employee. Returns false if ignored.
  pub fn apply_employee(&mut self, employee_id: &str, fetched: Fetched<Vec<Transaction>>) -> bool {
    let Some(transactions) = fetched.into_data() else {
      return false;
    };

    self.transactions = Some(transactions);
    self.next_page = None;
    self.employee_id = Some(employee_id.to_string());
    true
  }

  pub fn len(&self) -> usize {
    self.transactions.as_ref().map_or(0, Vec::len)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Main application state
pub struct App {
  client: CachedLedgerClient,
  employees: Vec<Employee>,
  view: TransactionsView,
}

impl App {
  pub fn new(config: &Config) -> Result<Self> {
    Ok(Self::with_client(CachedLedgerClient::new(config)?))
  }

  pub fn with_client(client: CachedLedgerClient) -> Self {
    Self {
      client,
      employees: Vec::new(),
      view: TransactionsView::default(),
    }
  }

  pub fn view(&self) -> &TransactionsView {
    &self.view
  }

  pub fn employees(&self) -> &[Employee] {
    &self.employees
  }

  /// Run the whole session. `employee` picks the filter that is selected
  /// last during the rapid filter changes.
  pub async fn run(&mut self, employee: Option<&str>) -> Result<()> {
    let mut loading = self.client.loading().subscribe();
    let watcher = tokio::spawn(async move {
      while loading.changed().await.is_ok() {
        let in_flight = *loading.borrow_and_update();
        debug!("{} request(s) in flight", in_flight);
      }
    });

    self.load_initial_data().await?;
    self.render("Initial load");

    self.load_more().await?;
    self.render("View more");

    let target = match employee {
      Some(id) => id.to_string(),
      None => self
        .employees
        .last()
        .map(|e| e.id.clone())
        .ok_or_else(|| eyre!("No employees to filter by"))?,
    };
    self.switch_filters(&target).await?;
    self.render("Rapid filter changes");

    self.approve_first_pending().await?;
    self.render("After approval");

    self.clear_filter().await?;
    self.render("Filter cleared");

    watcher.abort();
    Ok(())
  }

  /// Load employees and the first page concurrently.
  pub async fn load_initial_data(&mut self) -> Result<()> {
    // Employees start first so the page read holds the latest ticket
    let (employees, page) = tokio::join!(self.client.employees(), self.client.paginated_transactions(0));

    if let Some(employees) = employees?.into_data() {
      self.employees = employees;
    }
    self.view.apply_page(0, page?);
    Ok(())
  }

  /// Append the next page of the unfiltered listing, if any.
  pub async fn load_more(&mut self) -> Result<()> {
    let Some(page) = self.view.next_page else {
      return Ok(());
    };

    let fetched = self.client.paginated_transactions(page).await?;
    self.view.apply_page(page, fetched);
    Ok(())
  }

  /// Select every employee in quick succession, ending with `target`.
  ///
  /// Results are applied in completion order; stale ones are ignored, so the
  /// view ends up showing `target` no matter which response arrives last.
  pub async fn switch_filters(&mut self, target: &str) -> Result<()> {
    let mut order: Vec<String> = self
      .employees
      .iter()
      .map(|e| e.id.clone())
      .filter(|id| id != target)
      .collect();
    order.push(target.to_string());

    let client = &self.client;
    let mut pending: FuturesUnordered<_> = order
      .iter()
      .map(|id| async move { (id, client.transactions_by_employee(id).await) })
      .collect();

    while let Some((id, result)) = pending.next().await {
      if self.view.apply_employee(id, result?) {
        info!("Applied transactions of {}", id);
      } else {
        info!("Ignored stale transactions of {}", id);
      }
    }

    Ok(())
  }

  /// Approve the first unapproved transaction on screen and reload the
  /// current listing.
  pub async fn approve_first_pending(&mut self) -> Result<()> {
    let Some(transaction) = self
      .view
      .transactions
      .iter()
      .flatten()
      .find(|t| !t.approved)
      .cloned()
    else {
      info!("Nothing left to approve");
      return Ok(());
    };

    self
      .client
      .set_transaction_approval(&transaction.id, true)
      .await?;

    match self.view.employee_id.clone() {
      Some(id) => {
        let fetched = self.client.transactions_by_employee(&id).await?;
        self.view.apply_employee(&id, fetched);
      }
      None => {
        let fetched = self.client.paginated_transactions(0).await?;
        self.view.apply_page(0, fetched);
      }
    }
    Ok(())
  }

  /// Drop the employee filter and show the first page again.
  pub async fn clear_filter(&mut self) -> Result<()> {
    self.client.reset_transactions();
    let fetched = self.client.paginated_transactions(0).await?;
    self.view.apply_page(0, fetched);
    Ok(())
  }

  fn render(&self, title: &str) {
    let filter = self
      .view
      .employee_id
      .as_deref()
      .and_then(|id| self.employees.iter().find(|e| e.id == id))
      .map_or_else(|| "All employees".to_string(), Employee::full_name);

    println!("== {} ({}, {} transactions)", title, filter, self.view.len());
    for t in self.view.transactions.iter().flatten() {
      println!(
        "  [{}] {}  {:<22} {:>9.2}  {}  {}",
        if t.approved { "x" } else { " " },
        t.id,
        t.merchant,
        t.amount,
        t.date,
        t.employee.full_name()
      );
    }
    if self.view.next_page.is_some() {
      println!("  ... more available");
    }
    println!(
      "  cache entries: {}, loading: {}",
      self.client.coordinator().cache().len(),
      self.client.loading().is_loading()
    );
  }
}
