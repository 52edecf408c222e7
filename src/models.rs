//! Core data models for the budget guardian agent

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

//
// ================= Categories =================
//

/// The closed set of budget categories.
///
/// Variant order is the fixed declaration order used as the tie-break
/// everywhere a deterministic ordering over categories is needed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Housing,
    Food,
    Transportation,
    Utilities,
    Healthcare,
    Entertainment,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Housing,
        Category::Food,
        Category::Transportation,
        Category::Utilities,
        Category::Healthcare,
        Category::Entertainment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Housing => "Housing",
            Category::Food => "Food",
            Category::Transportation => "Transportation",
            Category::Utilities => "Utilities",
            Category::Healthcare => "Healthcare",
            Category::Entertainment => "Entertainment",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown budget category '{}'", s))
    }
}

/// Category → amount mapping, iterated in declaration order.
pub type CategoryAmounts = BTreeMap<Category, f64>;

/// Currency label used in human-readable text
pub const CURRENCY: &str = "RM";

//
// ================= Profile & Transactions =================
//

/// Opaque pass-through user profile
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub income: Option<f64>,
    #[serde(default)]
    pub employment_status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    #[serde(alias = "id")]
    pub transaction_id: String,
    /// Positive = spend, negative = refund/credit
    pub amount: f64,
    pub date: NaiveDate,
    pub description: String,
    #[serde(default)]
    pub merchant_name: String,
    /// Provider-assigned category, distinct from the budget category
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_category: Option<Category>,
}

//
// ================= Spending Analysis =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpendingPattern {
    LargeExpense,
    RecurringOverspend,
    FrequentSmall,
    GeneralOverspend,
    NoData,
}

impl fmt::Display for SpendingPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SpendingPattern::LargeExpense => "large_expense",
            SpendingPattern::RecurringOverspend => "recurring_overspend",
            SpendingPattern::FrequentSmall => "frequent_small",
            SpendingPattern::GeneralOverspend => "general_overspend",
            SpendingPattern::NoData => "no_data",
        };
        write!(f, "{}", s)
    }
}

/// Why a category is over budget, with the evidence used to decide.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternEvidence {
    pub pattern: SpendingPattern,
    pub description: String,
    pub transaction_count: usize,
    pub average_amount: f64,
    pub largest_transaction: Option<Transaction>,
    pub recurring_merchants: Vec<String>,
    pub high_value_merchant: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviationDetail {
    pub budgeted: f64,
    pub spent: f64,
    pub overage: f64,
    pub is_discretionary: bool,
    pub transaction_details: Vec<Transaction>,
    pub pattern: PatternEvidence,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SpendingAnalysis {
    pub spending_by_category: CategoryAmounts,
    pub deviation_detected: bool,
    pub deviation_details: BTreeMap<Category, DeviationDetail>,
}

//
// ================= Reallocation =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CategoryBudgetStatus {
    pub budget: f64,
    pub spent: f64,
    pub overage: f64,
    pub utilization: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReallocationRecommendation {
    pub from_category: Category,
    pub to_category: Category,
    pub amount: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OptimizationResult {
    pub optimization_needed: bool,
    #[serde(default)]
    pub total_reallocation: f64,
    #[serde(default)]
    pub recommendations: Vec<ReallocationRecommendation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposed_budget: Option<CategoryAmounts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_budget: Option<CategoryAmounts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub current_status: BTreeMap<Category, CategoryBudgetStatus>,
}

//
// ================= Research =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavingsTip {
    pub action: String,
    pub description: String,
    pub estimated_savings: String,
    pub difficulty: String,
    pub actionable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchRequest {
    /// Target category name, or "general" when nothing is over budget
    pub category: String,
    pub location: String,
    pub deficit_amount: f64,
    pub evidence: Option<DeviationDetail>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResearchResult {
    pub topic: String,
    pub category: String,
    pub location: String,
    pub queries_used: Vec<String>,
    pub recommendations: Vec<SavingsTip>,
}

//
// ================= Final Report =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BudgetStatus {
    Good,
    Alert,
}

impl fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BudgetStatus::Good => "good",
            BudgetStatus::Alert => "alert",
        };
        write!(f, "{}", s)
    }
}

/// One entry of the combined recommendation list, tagged by where it came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "source", content = "detail", rename_all = "snake_case")]
pub enum ReportRecommendation {
    OptimizeBudget(ReallocationRecommendation),
    ResearchTips(SavingsTip),
    Oracle(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinalReport {
    pub status: BudgetStatus,
    pub message: String,
    pub recommendations: Vec<ReportRecommendation>,
    pub budget_recommendations: Vec<ReallocationRecommendation>,
    pub research_recommendations: Vec<SavingsTip>,
    pub insights: Vec<String>,
    pub reasoning_trace: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_order_and_parsing() {
        assert!(Category::Housing < Category::Entertainment);
        assert_eq!("food".parse::<Category>(), Ok(Category::Food));
        assert_eq!(" Healthcare ".parse::<Category>(), Ok(Category::Healthcare));
        assert!("Travel".parse::<Category>().is_err());
    }

    #[test]
    fn test_category_amounts_serialize_by_name() {
        let mut budget = CategoryAmounts::new();
        budget.insert(Category::Food, 1200.0);
        budget.insert(Category::Housing, 2000.0);

        let json = serde_json::to_string(&budget).unwrap();
        assert_eq!(json, r#"{"Housing":2000.0,"Food":1200.0}"#);

        let parsed: CategoryAmounts = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, budget);
    }

    #[test]
    fn test_transaction_accepts_id_alias() {
        let txn: Transaction = serde_json::from_value(serde_json::json!({
            "id": "t1",
            "amount": -12.5,
            "date": "2024-03-01",
            "description": "Refund",
            "merchant_name": "Shop",
        }))
        .unwrap();

        assert_eq!(txn.transaction_id, "t1");
        assert_eq!(txn.budget_category, None);
        assert!(txn.amount < 0.0);
    }
}
