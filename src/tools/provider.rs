//! Transaction providers
//!
//! `HttpTransactionProvider` talks to a transaction data service over HTTP;
//! `StaticTransactionProvider` serves a fixed list for demos and tests.

use super::TransactionProvider;
use crate::error::AgentError;
use crate::models::Transaction;
use crate::Result;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How much history to request from the provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchWindow {
    pub days_back: u32,
    pub limit: Option<u32>,
}

impl FetchWindow {
    pub const DEMO: FetchWindow = FetchWindow { days_back: 7, limit: Some(20) };
    pub const STANDARD: FetchWindow = FetchWindow { days_back: 30, limit: Some(100) };
    pub const COMPREHENSIVE: FetchWindow = FetchWindow { days_back: 90, limit: Some(500) };

    /// Look up a named preset; unknown names fall back to `STANDARD`.
    pub fn preset(name: &str) -> FetchWindow {
        match name.trim().to_lowercase().as_str() {
            "demo" => Self::DEMO,
            "comprehensive" => Self::COMPREHENSIVE,
            "light" => FetchWindow { days_back: 14, limit: Some(50) },
            "unlimited" => FetchWindow { days_back: 365, limit: None },
            "standard" => Self::STANDARD,
            other => {
                warn!(preset = other, "Unknown fetch window preset, using standard");
                Self::STANDARD
            }
        }
    }
}

impl Default for FetchWindow {
    fn default() -> Self {
        Self::STANDARD
    }
}

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    transactions: Vec<Transaction>,
}

pub struct HttpTransactionProvider {
    client: Client,
    base_url: String,
    window: FetchWindow,
}

impl HttpTransactionProvider {
    pub fn new(base_url: &str, window: FetchWindow) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            window,
        })
    }
}

#[async_trait::async_trait]
impl TransactionProvider for HttpTransactionProvider {
    async fn fetch(&self) -> Result<Vec<Transaction>> {
        let url = format!("{}/transactions", self.base_url);

        let response = self
            .client
            .post(url)
            .json(&json!({
                "days_back": self.window.days_back,
                "limit": self.window.limit,
            }))
            .send()
            .await
            .map_err(|e| {
                AgentError::ToolError(format!("Transaction provider request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::ToolError(format!(
                "Transaction provider returned {}: {}",
                status, body
            )));
        }

        let body: TransactionsResponse = response.json().await.map_err(|e| {
            AgentError::ToolError(format!("Invalid transaction provider response: {}", e))
        })?;

        let transactions = dedupe_ids(body.transactions);
        info!(count = transactions.len(), "Fetched transactions from provider");
        Ok(transactions)
    }
}

/// Ids must be unique per fetch; repeated ids get a numeric suffix.
fn dedupe_ids(transactions: Vec<Transaction>) -> Vec<Transaction> {
    let mut seen = HashSet::new();
    transactions
        .into_iter()
        .map(|mut t| {
            if !seen.insert(t.transaction_id.clone()) {
                let mut n = 2;
                while !seen.insert(format!("{}_{}", t.transaction_id, n)) {
                    n += 1;
                }
                debug!(id = %t.transaction_id, suffix = n, "Renamed duplicate transaction id");
                t.transaction_id = format!("{}_{}", t.transaction_id, n);
            }
            t
        })
        .collect()
}

/// Serves a fixed transaction list
pub struct StaticTransactionProvider {
    transactions: Vec<Transaction>,
}

impl StaticTransactionProvider {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions: dedupe_ids(transactions),
        }
    }

    /// A month of representative sample activity
    pub fn sample() -> Self {
        Self::new(sample_transactions())
    }
}

#[async_trait::async_trait]
impl TransactionProvider for StaticTransactionProvider {
    async fn fetch(&self) -> Result<Vec<Transaction>> {
        Ok(self.transactions.clone())
    }
}

fn sample_transactions() -> Vec<Transaction> {
    let rows: [(&str, f64, (u32, u32), &str, &str, &str); 10] = [
        ("s-001", 1500.0, (3, 1), "Monthly rent payment", "Landlord Co", "Payment"),
        ("s-002", 86.4, (3, 3), "Grocery shopping", "Giant Hypermarket", "Shops"),
        ("s-003", 42.0, (3, 5), "KFC fast food dinner", "KFC", "Food and Drink"),
        ("s-004", 45.5, (3, 9), "KFC fast food lunch", "KFC", "Food and Drink"),
        ("s-005", 120.0, (3, 10), "Electricity bill", "TNB", "Service"),
        ("s-006", 35.0, (3, 12), "Grab ride to office", "Grab", "Travel"),
        ("s-007", 15.9, (3, 14), "Netflix streaming service", "Netflix", "Service"),
        ("s-008", 480.0, (3, 18), "Concert tickets", "Ticketmaster", "Recreation"),
        ("s-009", 60.0, (3, 21), "Pharmacy prescription", "Guardian Pharmacy", "Healthcare"),
        ("s-010", -25.0, (3, 22), "Refund online purchase", "Online Store", "Shops"),
    ];

    rows.iter()
        .filter_map(|(id, amount, (month, day), description, merchant, category)| {
            Some(Transaction {
                transaction_id: id.to_string(),
                amount: *amount,
                date: NaiveDate::from_ymd_opt(2024, *month, *day)?,
                description: description.to_string(),
                merchant_name: merchant.to_string(),
                category: category.to_string(),
                budget_category: None,
            })
        })
        .collect()
}
