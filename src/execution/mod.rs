//! Tool execution
//!
//! Turns a pending tool call into a tool record. Errors never escape:
//! they become failed records in the session history.

use crate::analyzer::SpendingAnalyzer;
use crate::models::{ResearchRequest, ResearchResult};
use crate::optimizer::BudgetOptimizer;
use crate::state::{SessionState, ToolOutcome, ToolRecord};
use crate::tools::{ToolCall, ToolKind, Toolbox};
use crate::Result;
use std::time::Instant;
use tracing::{debug, warn};

pub const NO_ANALYSIS: &str = "no analysis available";
pub const NO_RESEARCH_TOOL: &str = "Research tool not available";
pub const NO_TRANSACTIONS: &str = "no transactions available";

pub struct ExecutionEngine {
    toolbox: Toolbox,
    analyzer: SpendingAnalyzer,
    optimizer: BudgetOptimizer,
}

impl ExecutionEngine {
    pub fn new(toolbox: Toolbox, analyzer: SpendingAnalyzer) -> Self {
        let optimizer = BudgetOptimizer::new(analyzer.fallback_category());
        Self {
            toolbox,
            analyzer,
            optimizer,
        }
    }

    pub fn optimizer(&self) -> &BudgetOptimizer {
        &self.optimizer
    }

    pub async fn execute(&self, call: &ToolCall, state: &SessionState) -> ToolRecord {
        let start = Instant::now();

        let record = match self.run(call.tool, state).await {
            Ok(outcome) => ToolRecord::new(call.tool, outcome),
            Err(e) => {
                warn!(tool = %call.tool, error = %e, "Tool execution failed");
                ToolRecord::failed(call.tool, format!("{} failed: {}", call.tool, e))
            }
        };

        debug!(
            session_id = %state.session_id,
            tool = %call.tool,
            success = record.is_success(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Tool executed"
        );

        record
    }

    async fn run(&self, tool: ToolKind, state: &SessionState) -> Result<ToolOutcome> {
        match tool {
            ToolKind::GetTransactions => {
                let transactions = self.toolbox.provider.fetch().await?;
                Ok(ToolOutcome::Transactions {
                    transactions_retrieved: transactions.len(),
                    transactions,
                })
            }

            ToolKind::CategorizeTransactions => {
                if state.transactions.is_empty() {
                    return Ok(missing(NO_TRANSACTIONS));
                }

                let transactions: Vec<_> = state
                    .transactions
                    .iter()
                    .map(|t| {
                        let mut t = t.clone();
                        t.budget_category = Some(self.toolbox.categorizer.assign(&t));
                        t
                    })
                    .collect();

                Ok(ToolOutcome::Categorized {
                    categorized_count: transactions.len(),
                    transactions,
                })
            }

            ToolKind::AnalyzeSpending => Ok(ToolOutcome::Analysis(self.analyzer.analyze(
                &state.transactions,
                &state.budget,
                &state.baseline_spending,
            ))),

            ToolKind::OptimizeBudget => {
                let Some(analysis) = &state.spending_analysis else {
                    return Ok(missing(NO_ANALYSIS));
                };

                Ok(ToolOutcome::Optimization(self.optimizer.optimize(
                    &state.budget,
                    &analysis.spending_by_category,
                    &state.transactions,
                )))
            }

            ToolKind::ResearchTips => {
                let Some(research) = &self.toolbox.research else {
                    return Ok(missing(NO_RESEARCH_TOOL));
                };

                let request = match state.worst_deviation() {
                    Some((category, detail)) => ResearchRequest {
                        category: category.to_string(),
                        location: state.profile.location.clone(),
                        deficit_amount: detail.overage,
                        evidence: Some(detail.clone()),
                    },
                    None => ResearchRequest {
                        category: "general".to_string(),
                        location: state.profile.location.clone(),
                        deficit_amount: 0.0,
                        evidence: None,
                    },
                };

                let topic = format!("{} overspending", request.category.to_lowercase());
                let recommendations = research.search(&request).await;

                Ok(ToolOutcome::Research(ResearchResult {
                    queries_used: vec![format!("{} tips {}", topic, request.location)],
                    topic,
                    category: request.category,
                    location: request.location,
                    recommendations,
                }))
            }
        }
    }
}

/// Missing prerequisites are data, not exceptions
fn missing(error: &str) -> ToolOutcome {
    ToolOutcome::Failed {
        error: error.to_string(),
    }
}
