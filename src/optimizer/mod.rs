//! Budget reallocation engine
//!
//! Proposes cross-category transfers from under-utilized categories to
//! over-budget ones, constrained by the category relationship table.
//! Works on a copy of the budget; the input budget is never modified.

pub mod relationships;

use crate::analyzer::patterns::{detect_pattern, resolve_categories, transactions_in};
use crate::analyzer::DEFAULT_FALLBACK_CATEGORY;
use crate::models::{
    Category, CategoryAmounts, CategoryBudgetStatus, OptimizationResult, PatternEvidence,
    ReallocationRecommendation, SpendingPattern, Transaction, CURRENCY,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

pub use relationships::{relationship, transfer_allowed, TransferDifficulty};

/// Categories below this utilization (percent) may donate funds
pub const UNDER_UTILIZED_PERCENT: f64 = 60.0;

/// A source never gives away more than this share of its original budget
pub const MAX_SOURCE_SHARE: f64 = 0.2;

/// Smallest transfer worth recommending
pub const MIN_TRANSFER_AMOUNT: f64 = 50.0;

/// Per-category budget status for the given spending totals.
pub fn budget_status(
    budget: &CategoryAmounts,
    total_spending: &CategoryAmounts,
) -> BTreeMap<Category, CategoryBudgetStatus> {
    budget
        .iter()
        .map(|(category, &budgeted)| {
            let spent = total_spending.get(category).copied().unwrap_or(0.0);
            let utilization = if budgeted > 0.0 {
                spent / budgeted * 100.0
            } else {
                0.0
            };
            (
                *category,
                CategoryBudgetStatus {
                    budget: budgeted,
                    spent,
                    overage: spent - budgeted,
                    utilization,
                },
            )
        })
        .collect()
}

/// Replay a recommendation set on top of `original`.
///
/// Applies transfers in order, the same way the engine built them, so the
/// result equals the engine's `proposed_budget` exactly.
pub fn apply_recommendations(
    original: &CategoryAmounts,
    recommendations: &[ReallocationRecommendation],
) -> CategoryAmounts {
    let mut budget = original.clone();
    for rec in recommendations {
        apply_transfer(&mut budget, rec.from_category, rec.to_category, rec.amount);
    }
    budget
}

fn apply_transfer(budget: &mut CategoryAmounts, from: Category, to: Category, amount: f64) {
    *budget.entry(from).or_insert(0.0) -= amount;
    *budget.entry(to).or_insert(0.0) += amount;
}

#[derive(Debug, Clone, Copy)]
pub struct BudgetOptimizer {
    /// Same fallback the analyzer applies to unassigned transactions
    fallback_category: Category,
}

impl BudgetOptimizer {
    pub fn new(fallback_category: Category) -> Self {
        Self { fallback_category }
    }

    pub fn optimize(
        &self,
        current_budget: &CategoryAmounts,
        total_spending: &CategoryAmounts,
        transactions: &[Transaction],
    ) -> OptimizationResult {
        let status = budget_status(current_budget, total_spending);

        // BTreeMap iteration is declaration order; stable sorts below keep it
        // as the tie-break.
        let mut over_budget: Vec<(Category, CategoryBudgetStatus)> = status
            .iter()
            .filter(|(_, s)| s.overage > 0.0)
            .map(|(c, s)| (*c, *s))
            .collect();

        let mut under_utilized: Vec<(Category, CategoryBudgetStatus)> = status
            .iter()
            .filter(|(_, s)| s.overage <= 0.0 && s.utilization < UNDER_UTILIZED_PERCENT)
            .map(|(c, s)| (*c, *s))
            .collect();

        debug!(
            over_budget = ?over_budget.iter().map(|(c, _)| c).collect::<Vec<_>>(),
            under_utilized = ?under_utilized.iter().map(|(c, _)| c).collect::<Vec<_>>(),
            "Budget status computed"
        );

        if over_budget.is_empty() {
            return OptimizationResult {
                optimization_needed: false,
                message: Some("All categories are within budget. No optimization needed.".to_string()),
                current_status: status,
                ..Default::default()
            };
        }

        over_budget.sort_by(|a, b| b.1.overage.total_cmp(&a.1.overage));
        under_utilized.sort_by(|a, b| a.1.utilization.total_cmp(&b.1.utilization));

        let resolved = resolve_categories(transactions, self.fallback_category);
        let mut proposed_budget = current_budget.clone();
        let mut given: BTreeMap<Category, f64> = BTreeMap::new();
        let mut recommendations = Vec::new();
        let mut total_reallocation = 0.0;

        for (destination, dest_status) in &over_budget {
            let evidence = detect_pattern(&transactions_in(*destination, &resolved));
            let mut remaining_need = dest_status.overage;

            for (source, source_status) in &under_utilized {
                if remaining_need <= 0.0 {
                    break;
                }
                if !transfer_allowed(*source, *destination) {
                    continue;
                }

                let capacity = transfer_capacity(
                    source_status,
                    proposed_budget.get(source).copied().unwrap_or(0.0),
                    given.get(source).copied().unwrap_or(0.0),
                );
                let amount = capacity.min(remaining_need);
                if amount < MIN_TRANSFER_AMOUNT {
                    continue;
                }

                apply_transfer(&mut proposed_budget, *source, *destination, amount);
                *given.entry(*source).or_insert(0.0) += amount;
                remaining_need -= amount;
                total_reallocation += amount;

                debug!(
                    from = %source,
                    to = %destination,
                    amount,
                    "Transfer proposed"
                );

                recommendations.push(ReallocationRecommendation {
                    from_category: *source,
                    to_category: *destination,
                    amount,
                    reasoning: transfer_reasoning(*source, *destination, amount, &evidence),
                });
            }
        }

        if recommendations.is_empty() {
            info!("Over-budget categories found but no eligible transfer exists");
            return OptimizationResult {
                optimization_needed: false,
                message: Some("No suitable budget reallocation options found.".to_string()),
                current_status: status,
                ..Default::default()
            };
        }

        info!(
            transfers = recommendations.len(),
            total_reallocation,
            "Budget reallocation plan generated"
        );

        OptimizationResult {
            optimization_needed: true,
            total_reallocation,
            summary: Some(optimization_summary(&recommendations)),
            recommendations,
            proposed_budget: Some(proposed_budget),
            original_budget: Some(current_budget.clone()),
            message: None,
            current_status: status,
        }
    }
}

impl Default for BudgetOptimizer {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_CATEGORY)
    }
}

/// Largest amount `source` can still give.
///
/// Bounded by its remaining share of the original budget and by the unused
/// headroom below the utilization threshold of its current proposed budget.
fn transfer_capacity(source: &CategoryBudgetStatus, proposed: f64, already_given: f64) -> f64 {
    let share_left = source.budget * MAX_SOURCE_SHARE - already_given;
    let below_threshold = proposed * UNDER_UTILIZED_PERCENT / 100.0 - source.spent.max(0.0);
    share_left.min(below_threshold).max(0.0)
}

fn transfer_reasoning(
    from: Category,
    to: Category,
    amount: f64,
    evidence: &PatternEvidence,
) -> String {
    let flexibility_note = match relationship(from).transfer_difficulty {
        TransferDifficulty::Easy => {
            format!("{} typically has flexible spending that can be adjusted", from)
        }
        TransferDifficulty::Medium => {
            format!("{} spending can be optimized with some planning", from)
        }
        TransferDifficulty::Hard => format!("{} requires careful adjustment", from),
    };

    let pattern_context = match evidence.pattern {
        SpendingPattern::LargeExpense => {
            format!("The {} overage was caused by a large expense. ", to)
        }
        SpendingPattern::RecurringOverspend => {
            format!("The {} category shows recurring overspending patterns. ", to)
        }
        SpendingPattern::FrequentSmall => {
            format!("The {} overage comes from many small transactions. ", to)
        }
        SpendingPattern::GeneralOverspend | SpendingPattern::NoData => String::new(),
    };

    let mut reasoning = format!(
        "{}Reallocating {}{:.0} from {} to {}. {}.",
        pattern_context, CURRENCY, amount, from, to, flexibility_note
    );

    match (from, to) {
        (Category::Healthcare, Category::Food) => reasoning.push_str(
            " Consider meal planning to optimize food spending while maintaining health priorities.",
        ),
        (Category::Entertainment, Category::Housing) => reasoning
            .push_str(" Reducing entertainment spending to accommodate essential housing costs."),
        (Category::Utilities, Category::Food | Category::Transportation) => reasoning.push_str(
            " Your utility budget appears over-allocated, allowing for better distribution.",
        ),
        _ => {}
    }

    reasoning
}

fn optimization_summary(recommendations: &[ReallocationRecommendation]) -> String {
    let total: f64 = recommendations.iter().map(|r| r.amount).sum();
    let helped: BTreeSet<Category> = recommendations.iter().map(|r| r.to_category).collect();
    let donors: BTreeSet<Category> = recommendations.iter().map(|r| r.from_category).collect();

    format!(
        "Budget optimization plan: {} transfers totaling {}{:.0}. \
         Helping {} over-budget categories by optimizing {} under-utilized categories. \
         This reallocation maintains essential spending while accommodating actual usage patterns.",
        recommendations.len(),
        CURRENCY,
        total,
        helped.len(),
        donors.len()
    )
}
