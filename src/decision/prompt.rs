//! Oracle instructions and the per-step context document

use crate::state::SessionState;
use crate::tools::ToolKind;
use serde_json::{json, Value};

const STANDARD_OPERATING_PROCEDURE: &str = r#"You are Budget Guardian, an expert financial analyst agent. Your goal is to conduct a complete financial analysis for the user based on their new transactions.

Follow this Standard Operating Procedure (SOP) precisely:
1. Fetch Data: always start by getting the user's transactions with the `get_transactions` tool. Do not proceed without transaction data.
2. Process Data: once you have transactions, categorize them with the `categorize_transactions` tool.
3. Analyze: after categorizing, analyze spending against the budget with the `analyze_spending` tool.
4. React to Analysis:
   * IF `deviation_detected` is true, call the `optimize_budget` tool to create a reallocation plan.
   * AFTER the optimization, call the `research_tips` tool to find actionable advice for the over-budget categories.
   * IF `deviation_detected` is false, you do not need `optimize_budget` or `research_tips`.
5. Final Report: once every necessary step is done, produce the final summary for the user.

RESPONSE FORMAT:
Respond with exactly one JSON object, either

For tool usage:
{
  "needs_tool": true,
  "reasoning": "Why you need this specific tool",
  "tool_call": {"tool": "tool_name", "args": {}}
}

For final analysis:
{
  "ready_for_conclusion": true,
  "reasoning": "Analysis complete",
  "status": "alert" if overspending was detected, otherwise "good",
  "key_insights": ["Key findings from the analysis"],
  "recommendations": ["Actionable recommendations"]
}"#;

/// System instruction sent with every consultation
pub fn system_prompt() -> String {
    let tools: Vec<String> = ToolKind::ALL
        .iter()
        .map(|t| format!("{}: {}", t.as_str(), t.description()))
        .collect();

    format!(
        "{}\n\nAvailable tools:\n- {}",
        STANDARD_OPERATING_PROCEDURE,
        tools.join("\n- ")
    )
}

/// Compact summary of what is known. Never carries the transaction list.
pub fn context_summary(state: &SessionState) -> Value {
    let mut context = json!({
        "user_profile": state.profile,
        "budget_plan": state.budget,
        "data_status": {
            "transactions_count": state.transactions.len(),
            "is_categorized": state.is_categorized(),
            "is_analyzed": state.is_analyzed(),
        },
        "current_step": state.current_step,
    });

    if let Some(analysis) = &state.spending_analysis {
        context["spending_summary"] = json!({
            "deviation_detected": state.deviation_detected,
            "categories_with_issues": state.deviation_details.keys().collect::<Vec<_>>(),
            "total_categories_analyzed": analysis.spending_by_category.len(),
        });
    }

    if let Some(last) = state.tool_results.last() {
        let mut recent = json!({
            "last_tool": last.tool,
            "results_count": state.tool_results.len(),
        });
        if let Some(error) = last.error() {
            recent["last_error"] = json!(error);
        }
        context["recent_tool"] = recent;
    }

    context
}

pub fn context_document(state: &SessionState) -> String {
    let summary = serde_json::to_string_pretty(&context_summary(state))
        .unwrap_or_else(|_| "{}".to_string());

    format!(
        "CURRENT STATE:\n{}\n\nTASK: Based on this summary, decide your next action for cash flow management. \
         When overspending occurs, the goal is immediate cash flow rebalancing.",
        summary
    )
}
