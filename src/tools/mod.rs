//! Tool kinds and the external capabilities behind them
//!
//! The agent knows exactly five tools. Three of them wrap external
//! collaborators (transaction provider, categorizer, research); the other
//! two are the deterministic analyzer and optimizer.

pub mod categorizer;
pub mod provider;
pub mod research;

use crate::models::{Category, ResearchRequest, SavingsTip, Transaction};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub use categorizer::KeywordCategorizer;
pub use provider::{HttpTransactionProvider, StaticTransactionProvider};
pub use research::ResearchTool;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    GetTransactions,
    CategorizeTransactions,
    AnalyzeSpending,
    OptimizeBudget,
    ResearchTips,
}

impl ToolKind {
    pub const ALL: [ToolKind; 5] = [
        ToolKind::GetTransactions,
        ToolKind::CategorizeTransactions,
        ToolKind::AnalyzeSpending,
        ToolKind::OptimizeBudget,
        ToolKind::ResearchTips,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::GetTransactions => "get_transactions",
            ToolKind::CategorizeTransactions => "categorize_transactions",
            ToolKind::AnalyzeSpending => "analyze_spending",
            ToolKind::OptimizeBudget => "optimize_budget",
            ToolKind::ResearchTips => "research_tips",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolKind::GetTransactions => "Fetch the user's recent transactions",
            ToolKind::CategorizeTransactions => "Assign a budget category to every transaction",
            ToolKind::AnalyzeSpending => "Compare baseline + new spending against the budget",
            ToolKind::OptimizeBudget => "Propose budget reallocation for over-budget categories",
            ToolKind::ResearchTips => "Find savings tips for the most over-budget category",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ToolKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim();
        ToolKind::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| format!("Unknown tool: {}", s))
    }
}

/// A single pending tool invocation requested by the decision loop
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub tool: ToolKind,
    #[serde(default)]
    pub args: serde_json::Value,
}

impl ToolCall {
    pub fn new(tool: ToolKind) -> Self {
        Self {
            tool,
            args: serde_json::Value::Object(Default::default()),
        }
    }
}

//
// ================= External capabilities =================
//

/// Source of raw transactions
#[async_trait::async_trait]
pub trait TransactionProvider: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Transaction>>;
}

/// Assigns one of the fixed budget categories to a transaction.
/// Must be deterministic for identical description text.
pub trait Categorizer: Send + Sync {
    fn assign(&self, transaction: &Transaction) -> Category;
}

/// Savings research. Returns at most two tips and never fails:
/// network problems degrade to fewer (or no) tips.
#[async_trait::async_trait]
pub trait ResearchCapability: Send + Sync {
    async fn search(&self, request: &ResearchRequest) -> Vec<SavingsTip>;
}

/// The external collaborators available to one orchestrator
#[derive(Clone)]
pub struct Toolbox {
    pub provider: Arc<dyn TransactionProvider>,
    pub categorizer: Arc<dyn Categorizer>,
    pub research: Option<Arc<dyn ResearchCapability>>,
}

impl Toolbox {
    pub fn new(
        provider: Arc<dyn TransactionProvider>,
        categorizer: Arc<dyn Categorizer>,
        research: Option<Arc<dyn ResearchCapability>>,
    ) -> Self {
        Self {
            provider,
            categorizer,
            research,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_names_round_trip_through_str() {
        for tool in ToolKind::ALL {
            assert_eq!(tool.as_str().parse::<ToolKind>(), Ok(tool));
        }
        assert!("detect_fraud".parse::<ToolKind>().is_err());
    }

    #[test]
    fn test_tool_call_deserializes_without_args() {
        let call: ToolCall = serde_json::from_str(r#"{"tool": "optimize_budget"}"#).unwrap();
        assert_eq!(call.tool, ToolKind::OptimizeBudget);
        assert!(call.args.is_null());
    }
}
