//! Session state
//!
//! Everything one analysis run knows, owned by the orchestrator. Every
//! transition consumes the state and returns the next one; nothing is
//! mutated behind the decision loop's back.

use crate::error::AgentError;
use crate::models::{
    Category, CategoryAmounts, DeviationDetail, FinalReport, OptimizationResult,
    ResearchResult, SpendingAnalysis, Transaction, UserProfile,
};
use crate::tools::{ToolCall, ToolKind};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;
use uuid::Uuid;

//
// ================= Session bootstrap =================
//

/// What a caller supplies to start a session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRequest {
    pub profile: UserProfile,
    pub budget: CategoryAmounts,
    #[serde(default)]
    pub baseline: Option<CategoryAmounts>,
}

impl SessionRequest {
    pub fn validate(&self) -> Result<()> {
        if self.budget.is_empty() {
            return Err(AgentError::InvalidRequest("budget is empty".to_string()));
        }

        for (category, amount) in &self.budget {
            if !amount.is_finite() || *amount < 0.0 {
                return Err(AgentError::InvalidRequest(format!(
                    "budget for {} must be a non-negative amount, got {}",
                    category, amount
                )));
            }
        }

        if let Some(baseline) = &self.baseline {
            if let Some((category, amount)) = baseline.iter().find(|(_, a)| !a.is_finite()) {
                return Err(AgentError::InvalidRequest(format!(
                    "baseline for {} is not a number: {}",
                    category, amount
                )));
            }
        }

        Ok(())
    }
}

//
// ================= Tool history =================
//

/// Tagged payload of one tool execution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ToolOutcome {
    Transactions {
        transactions_retrieved: usize,
        transactions: Vec<Transaction>,
    },
    Categorized {
        categorized_count: usize,
        transactions: Vec<Transaction>,
    },
    Analysis(SpendingAnalysis),
    Optimization(OptimizationResult),
    Research(ResearchResult),
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolRecord {
    pub tool: ToolKind,
    pub outcome: ToolOutcome,
}

impl ToolRecord {
    pub fn new(tool: ToolKind, outcome: ToolOutcome) -> Self {
        Self { tool, outcome }
    }

    pub fn failed(tool: ToolKind, error: impl Into<String>) -> Self {
        Self::new(tool, ToolOutcome::Failed { error: error.into() })
    }

    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, ToolOutcome::Failed { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            ToolOutcome::Failed { error } => Some(error),
            _ => None,
        }
    }
}

//
// ================= Session state =================
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    Reasoning,
    AwaitingTool,
    Concluded,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionState {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub profile: UserProfile,
    pub budget: CategoryAmounts,
    pub baseline_spending: CategoryAmounts,
    pub transactions: Vec<Transaction>,
    pub tool_results: Vec<ToolRecord>,
    pub deviation_detected: bool,
    pub deviation_details: BTreeMap<Category, DeviationDetail>,
    pub spending_analysis: Option<SpendingAnalysis>,
    pub budget_optimization: Option<OptimizationResult>,
    /// Proposed budget awaiting explicit acceptance
    pub rebalanced_budget: Option<CategoryAmounts>,
    pub pending_tool_call: Option<ToolCall>,
    pub current_step: u32,
    pub reasoning_trace: Vec<String>,
    pub final_report: Option<FinalReport>,
}

impl SessionState {
    pub fn new(request: SessionRequest) -> Result<Self> {
        request.validate()?;

        Ok(Self {
            session_id: Uuid::new_v4(),
            started_at: Utc::now(),
            profile: request.profile,
            budget: request.budget,
            baseline_spending: request.baseline.unwrap_or_default(),
            transactions: Vec::new(),
            tool_results: Vec::new(),
            deviation_detected: false,
            deviation_details: BTreeMap::new(),
            spending_analysis: None,
            budget_optimization: None,
            rebalanced_budget: None,
            pending_tool_call: None,
            current_step: 0,
            reasoning_trace: Vec::new(),
            final_report: None,
        })
    }

    pub fn phase(&self) -> SessionPhase {
        if self.final_report.is_some() {
            SessionPhase::Concluded
        } else if self.pending_tool_call.is_some() {
            SessionPhase::AwaitingTool
        } else {
            SessionPhase::Reasoning
        }
    }

    pub fn is_concluded(&self) -> bool {
        self.final_report.is_some()
    }

    /// Display name used in report messages
    pub fn user_name(&self) -> &str {
        let name = self.profile.name.trim();
        if name.is_empty() {
            "User"
        } else {
            name
        }
    }

    pub fn is_categorized(&self) -> bool {
        !self.transactions.is_empty()
            && self.transactions.iter().all(|t| t.budget_category.is_some())
    }

    pub fn is_analyzed(&self) -> bool {
        self.spending_analysis.is_some()
    }

    /// Tools that produced a successful result at least once
    pub fn tools_run(&self) -> HashSet<ToolKind> {
        self.tool_results
            .iter()
            .filter(|r| r.is_success())
            .map(|r| r.tool)
            .collect()
    }

    /// Whether `tool` succeeded after the latest analysis that detected a deviation
    pub fn completed_since_deviation(&self, tool: ToolKind) -> bool {
        let detected_at = self.tool_results.iter().rposition(|r| {
            matches!(&r.outcome, ToolOutcome::Analysis(a) if a.deviation_detected)
        });

        match detected_at {
            Some(index) => self.tool_results[index + 1..]
                .iter()
                .any(|r| r.tool == tool && r.is_success()),
            None => false,
        }
    }

    /// Tool names of the last `window` results, failures included
    pub fn recent_tools(&self, window: usize) -> Vec<ToolKind> {
        let start = self.tool_results.len().saturating_sub(window);
        self.tool_results[start..].iter().map(|r| r.tool).collect()
    }

    /// Category with the largest overage; ties go to declaration order
    pub fn worst_deviation(&self) -> Option<(Category, &DeviationDetail)> {
        let mut worst: Option<(Category, &DeviationDetail)> = None;
        for (category, detail) in &self.deviation_details {
            match worst {
                Some((_, top)) if top.overage >= detail.overage => {}
                _ => worst = Some((*category, detail)),
            }
        }
        worst
    }

    //
    // ---------- transitions ----------
    //

    pub fn with_reasoning(mut self, line: impl Into<String>) -> Self {
        self.reasoning_trace.push(line.into());
        self
    }

    /// Record the next tool request. Counts as one non-terminating step.
    pub fn with_pending_call(mut self, call: ToolCall) -> Self {
        self.pending_tool_call = Some(call);
        self.current_step += 1;
        self
    }

    pub fn take_pending_call(mut self) -> (Self, Option<ToolCall>) {
        let call = self.pending_tool_call.take();
        (self, call)
    }

    /// Merge one tool result into the state
    pub fn with_tool_result(mut self, record: ToolRecord) -> Self {
        debug!(
            session_id = %self.session_id,
            tool = %record.tool,
            success = record.is_success(),
            "Merging tool result"
        );

        match &record.outcome {
            ToolOutcome::Transactions { transactions, .. }
            | ToolOutcome::Categorized { transactions, .. } => {
                self.transactions = transactions.clone();
            }
            ToolOutcome::Analysis(analysis) => {
                self.deviation_detected = analysis.deviation_detected;
                self.deviation_details = analysis.deviation_details.clone();
                self.spending_analysis = Some(analysis.clone());
            }
            ToolOutcome::Optimization(result) => {
                self.rebalanced_budget = result.proposed_budget.clone();
                self.budget_optimization = Some(result.clone());
            }
            ToolOutcome::Research(_) | ToolOutcome::Failed { .. } => {}
        }

        self.tool_results.push(record);
        self
    }

    pub fn concluded(mut self, report: FinalReport) -> Self {
        self.pending_tool_call = None;
        self.final_report = Some(report);
        self
    }

    /// Replace the governing budget with the surfaced rebalanced budget
    pub fn accept_rebalanced_budget(mut self) -> Result<Self> {
        let proposed = self.rebalanced_budget.take().ok_or_else(|| {
            AgentError::MissingPrerequisite("no rebalanced budget to accept".to_string())
        })?;

        if let Some((category, amount)) = proposed.iter().find(|(_, a)| **a < 0.0) {
            return Err(AgentError::InvalidRequest(format!(
                "rebalanced budget for {} is negative: {}",
                category, amount
            )));
        }

        self.budget = proposed;
        Ok(self)
    }
}
