//! Spending analyzer
//!
//! Merges baseline and newly observed spending, compares the totals against
//! the budget and explains every category in deviation.
//! Deterministic; no LLM involvement.

pub mod patterns;

use crate::models::{
    Category, CategoryAmounts, DeviationDetail, SpendingAnalysis, Transaction,
};
use std::collections::BTreeMap;
use tracing::debug;

pub use patterns::{detect_pattern, is_discretionary, resolve_categories, transactions_in};

/// Category assigned to transactions the categorizer never annotated
pub const DEFAULT_FALLBACK_CATEGORY: Category = Category::Entertainment;

pub struct SpendingAnalyzer {
    fallback_category: Category,
}

impl SpendingAnalyzer {
    pub fn new(fallback_category: Category) -> Self {
        Self { fallback_category }
    }

    pub fn fallback_category(&self) -> Category {
        self.fallback_category
    }

    pub fn analyze(
        &self,
        transactions: &[Transaction],
        budget: &CategoryAmounts,
        baseline_spending: &CategoryAmounts,
    ) -> SpendingAnalysis {
        if transactions.is_empty() {
            debug!("No new transactions; returning baseline spending");
            return SpendingAnalysis {
                spending_by_category: baseline_spending.clone(),
                deviation_detected: false,
                deviation_details: BTreeMap::new(),
            };
        }

        // Resolve the fallback once so pattern detection sees the same
        // category assignment as the totals.
        let resolved = resolve_categories(transactions, self.fallback_category);

        let mut new_spending = CategoryAmounts::new();
        for txn in &resolved {
            if let Some(category) = txn.budget_category {
                *new_spending.entry(category).or_insert(0.0) += txn.amount;
            }
        }

        let mut total_spending = baseline_spending.clone();
        for (category, amount) in &new_spending {
            *total_spending.entry(*category).or_insert(0.0) += amount;
        }

        let mut deviation_details = BTreeMap::new();
        for (category, spent) in &total_spending {
            let budgeted = budget.get(category).copied().unwrap_or(0.0);
            if budgeted <= 0.0 || *spent <= budgeted {
                continue;
            }

            let category_transactions = transactions_in(*category, &resolved);
            let detail = DeviationDetail {
                budgeted,
                spent: *spent,
                overage: spent - budgeted,
                is_discretionary: is_discretionary(*category, &category_transactions),
                pattern: detect_pattern(&category_transactions),
                transaction_details: category_transactions,
            };

            debug!(
                category = %category,
                overage = detail.overage,
                pattern = %detail.pattern.pattern,
                "Deviation detected"
            );

            deviation_details.insert(*category, detail);
        }

        // Budgeted categories without activity still show their baseline
        for category in budget.keys() {
            total_spending
                .entry(*category)
                .or_insert_with(|| baseline_spending.get(category).copied().unwrap_or(0.0));
        }

        SpendingAnalysis {
            spending_by_category: total_spending,
            deviation_detected: !deviation_details.is_empty(),
            deviation_details,
        }
    }
}

impl Default for SpendingAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_CATEGORY)
    }
}
