//! Spending pattern detection
//!
//! Shared by the spending analyzer (deviation details) and the
//! reallocation engine (transfer rationale).

use crate::models::{Category, PatternEvidence, SpendingPattern, Transaction, CURRENCY};
use std::collections::HashMap;

/// A single transaction above this amount marks its merchant as high value
const HIGH_VALUE_THRESHOLD: f64 = 100.0;

/// Transactions above this count make a category "frequent small"
const FREQUENT_TRANSACTION_COUNT: usize = 5;

/// Fixed essential-spending keywords per category
const ESSENTIAL_KEYWORDS: &[(Category, &[&str])] = &[
    (Category::Healthcare, &["doctor", "pharmacy", "insurance"]),
    (Category::Housing, &["rent", "mortgage"]),
    (Category::Utilities, &["internet", "phone", "electric"]),
    (Category::Food, &["grocery"]),
    (Category::Transportation, &["gas"]),
];

/// Copy of `transactions` with every unassigned category set to `fallback`.
pub fn resolve_categories(transactions: &[Transaction], fallback: Category) -> Vec<Transaction> {
    transactions
        .iter()
        .map(|t| {
            let mut t = t.clone();
            t.budget_category.get_or_insert(fallback);
            t
        })
        .collect()
}

/// Transactions assigned to `category`, in input order.
pub fn transactions_in(category: Category, transactions: &[Transaction]) -> Vec<Transaction> {
    transactions
        .iter()
        .filter(|t| t.budget_category == Some(category))
        .cloned()
        .collect()
}

/// Classify why a category's spending looks the way it does.
///
/// Priority: large expense, recurring merchant, frequent small, general.
pub fn detect_pattern(transactions: &[Transaction]) -> PatternEvidence {
    if transactions.is_empty() {
        return PatternEvidence {
            pattern: SpendingPattern::NoData,
            description: "No transaction data available".to_string(),
            transaction_count: 0,
            average_amount: 0.0,
            largest_transaction: None,
            recurring_merchants: Vec::new(),
            high_value_merchant: None,
        };
    }

    let count = transactions.len();
    let total: f64 = transactions.iter().map(|t| t.amount).sum();
    let average = total / count as f64;

    // First maximum wins so ties resolve to the earliest transaction
    let largest = transactions
        .iter()
        .fold(None::<&Transaction>, |best, t| match best {
            Some(b) if b.amount >= t.amount => Some(b),
            _ => Some(t),
        })
        .cloned();

    let recurring_merchants = recurring_merchants(transactions);

    let high_value_merchant = largest
        .as_ref()
        .filter(|t| t.amount > HIGH_VALUE_THRESHOLD)
        .map(|t| t.merchant_name.clone());

    let (pattern, description) = match largest.as_ref() {
        Some(big) if big.amount > average * 2.0 => (
            SpendingPattern::LargeExpense,
            format!(
                "Overage caused by large expense: {} ({}{:.0})",
                big.description, CURRENCY, big.amount
            ),
        ),
        _ if !recurring_merchants.is_empty() => (
            SpendingPattern::RecurringOverspend,
            format!(
                "Regular overspending at: {}",
                recurring_merchants
                    .iter()
                    .take(2)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        ),
        _ if count > FREQUENT_TRANSACTION_COUNT => (
            SpendingPattern::FrequentSmall,
            format!("Many small transactions ({}{:.0} average)", CURRENCY, average),
        ),
        _ => (
            SpendingPattern::GeneralOverspend,
            format!("General overspending across {} transactions", count),
        ),
    };

    PatternEvidence {
        pattern,
        description,
        transaction_count: count,
        average_amount: average,
        largest_transaction: largest,
        recurring_merchants,
        high_value_merchant,
    }
}

/// Merchants seen more than once, in order of their second appearance.
fn recurring_merchants(transactions: &[Transaction]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut recurring = Vec::new();

    for txn in transactions {
        let merchant = txn.merchant_name.trim();
        if merchant.is_empty() {
            continue;
        }
        let seen = counts.entry(merchant).or_insert(0);
        *seen += 1;
        if *seen == 2 {
            recurring.push(merchant.to_string());
        }
    }

    recurring
}

/// A category is discretionary unless a description names essential spending.
pub fn is_discretionary(category: Category, transactions: &[Transaction]) -> bool {
    let Some((_, keywords)) = ESSENTIAL_KEYWORDS.iter().find(|(c, _)| *c == category) else {
        return true;
    };

    let all_text = transactions
        .iter()
        .map(|t| t.description.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    !keywords.iter().any(|kw| all_text.contains(kw))
}
