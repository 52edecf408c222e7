//! Decision loop
//!
//! One step per invocation: safety gate, completion check, oracle
//! consultation, response parsing. The loop only ever requests a tool;
//! executing it is the orchestrator's job.

pub mod parser;
pub mod prompt;
pub mod report;

use crate::oracle::ReasoningOracle;
use crate::state::{SessionPhase, SessionState};
use crate::tools::ToolKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use parser::{parse_decision, Conclusion, OracleDecision};

pub const DEFAULT_MAX_STEPS: u32 = 8;
pub const DEFAULT_REPETITION_WINDOW: usize = 4;
pub const DEFAULT_REPETITION_THRESHOLD: usize = 2;

pub const LOOP_PREVENTED: &str = "Analysis complete - prevented infinite loop";
pub const SAFETY_LIMIT: &str = "Safety limit reached";
pub const COMPLETED: &str = "Analysis completed successfully";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopConfig {
    pub max_steps: u32,
    pub repetition_window: usize,
    pub repetition_threshold: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            repetition_window: DEFAULT_REPETITION_WINDOW,
            repetition_threshold: DEFAULT_REPETITION_THRESHOLD,
        }
    }
}

/// Organic completion: analysis ran, and either nothing is over budget or
/// both remedies ran after the deviation was detected.
pub fn is_analysis_complete(state: &SessionState) -> bool {
    if !state.tools_run().contains(&ToolKind::AnalyzeSpending) {
        return false;
    }

    !state.deviation_detected
        || (state.completed_since_deviation(ToolKind::OptimizeBudget)
            && state.completed_since_deviation(ToolKind::ResearchTips))
}

/// First tool, in window order, seen at least `threshold` times
fn repeated_tool(recent: &[ToolKind], threshold: usize) -> Option<ToolKind> {
    recent
        .iter()
        .copied()
        .find(|tool| recent.iter().filter(|t| *t == tool).count() >= threshold)
}

pub struct DecisionLoop {
    oracle: Arc<dyn ReasoningOracle>,
    config: LoopConfig,
}

impl DecisionLoop {
    pub fn new(oracle: Arc<dyn ReasoningOracle>, config: LoopConfig) -> Self {
        Self { oracle, config }
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Reason to stop without consulting the oracle, if any
    pub fn safety_gate(&self, state: &SessionState) -> Option<&'static str> {
        if state.current_step >= self.config.max_steps {
            return Some(SAFETY_LIMIT);
        }

        let recent = state.recent_tools(self.config.repetition_window);
        if let Some(tool) = repeated_tool(&recent, self.config.repetition_threshold) {
            warn!(tool = %tool, window = ?recent, "Tool repetition detected");
            return Some(LOOP_PREVENTED);
        }

        None
    }

    pub async fn step(&self, state: SessionState) -> SessionState {
        match state.phase() {
            SessionPhase::Concluded => return state,
            SessionPhase::AwaitingTool => {
                warn!(session_id = %state.session_id, "Step requested while a tool call is pending");
                return state;
            }
            SessionPhase::Reasoning => {}
        }

        if let Some(reason) = self.safety_gate(&state) {
            info!(step = state.current_step, reason, "Safety gate concluded the session");
            let state = state.with_reasoning(format!("CONCLUDE: {}", reason));
            let report = report::summary_report(&state, reason);
            return state.concluded(report);
        }

        if is_analysis_complete(&state) {
            info!(step = state.current_step, "Analysis complete; generating final report");
            let state = state.with_reasoning(format!("CONCLUDE: {}", COMPLETED));
            let report = report::summary_report(&state, COMPLETED);
            return state.concluded(report);
        }

        let next_step = state.current_step + 1;
        let state = state.with_reasoning(format!("Step {}: Analyzing financial state", next_step));

        let response = self
            .oracle
            .consult(&prompt::system_prompt(), &prompt::context_document(&state))
            .await;

        let text = match response {
            Ok(text) => text,
            Err(e) => {
                warn!(step = state.current_step, error = %e, "Oracle consultation failed");
                let reason = format!("Analysis error: {}", e);
                let state = state.with_reasoning(format!("CONCLUDE: {}", reason));
                let report = report::summary_report(&state, &reason);
                return state.concluded(report);
            }
        };

        match parse_decision(&text) {
            OracleDecision::ToolRequest { reasoning, call } => {
                debug!(step = state.current_step + 1, tool = %call.tool, "Oracle requested tool");
                state
                    .with_reasoning(format!("DECIDE: {} ({})", call.tool, reasoning))
                    .with_pending_call(call)
            }
            OracleDecision::Conclusion(conclusion) => {
                info!(step = state.current_step, status = %conclusion.status, "Oracle concluded");
                let state = state.with_reasoning(format!("CONCLUDE: {}", conclusion.reasoning));
                let report = report::conclusion_report(&state, &conclusion);
                state.concluded(report)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BudgetStatus, Category, OptimizationResult, ResearchResult, SpendingAnalysis, UserProfile};
    use crate::oracle::{FailingOracle, ScriptedOracle};
    use crate::state::{SessionRequest, ToolOutcome, ToolRecord};

    fn fresh() -> SessionState {
        SessionState::new(SessionRequest {
            profile: UserProfile {
                name: "Sam".to_string(),
                ..Default::default()
            },
            budget: [(Category::Food, 100.0)].into_iter().collect(),
            baseline: None,
        })
        .unwrap()
    }

    fn record(tool: ToolKind) -> ToolRecord {
        let outcome = match tool {
            ToolKind::AnalyzeSpending => ToolOutcome::Analysis(SpendingAnalysis {
                deviation_detected: true,
                ..Default::default()
            }),
            ToolKind::OptimizeBudget => ToolOutcome::Optimization(OptimizationResult::default()),
            ToolKind::ResearchTips => ToolOutcome::Research(ResearchResult::default()),
            ToolKind::GetTransactions => ToolOutcome::Transactions {
                transactions_retrieved: 0,
                transactions: Vec::new(),
            },
            ToolKind::CategorizeTransactions => ToolOutcome::Categorized {
                categorized_count: 0,
                transactions: Vec::new(),
            },
        };
        ToolRecord::new(tool, outcome)
    }

    fn decision_loop(oracle: Arc<dyn ReasoningOracle>) -> DecisionLoop {
        DecisionLoop::new(oracle, LoopConfig::default())
    }

    const GET: &str = r#"{"needs_tool": true, "reasoning": "fetch", "tool_call": {"tool": "get_transactions", "args": {}}}"#;

    #[test]
    fn test_completion_check_requires_research_after_deviation() {
        let state = fresh()
            .with_tool_result(record(ToolKind::AnalyzeSpending))
            .with_tool_result(record(ToolKind::OptimizeBudget));
        assert!(!is_analysis_complete(&state));

        let state = state.with_tool_result(record(ToolKind::ResearchTips));
        assert!(is_analysis_complete(&state));
    }

    #[test]
    fn test_completion_without_deviation() {
        let analysis = ToolRecord::new(ToolKind::AnalyzeSpending, ToolOutcome::Analysis(SpendingAnalysis::default()));
        assert!(is_analysis_complete(&fresh().with_tool_result(analysis)));
        assert!(!is_analysis_complete(&fresh()));
    }

    #[tokio::test]
    async fn test_tool_request_sets_pending_call_and_step() {
        let oracle = Arc::new(ScriptedOracle::new([GET]));
        let state = decision_loop(oracle).step(fresh()).await;

        assert_eq!(state.phase(), SessionPhase::AwaitingTool);
        assert_eq!(state.current_step, 1);
        assert_eq!(
            state.pending_tool_call.as_ref().map(|c| c.tool),
            Some(ToolKind::GetTransactions)
        );

        assert_eq!(
            state.reasoning_trace,
            vec![
                "Step 1: Analyzing financial state".to_string(),
                "DECIDE: get_transactions (fetch)".to_string(),
            ]
        );
    }

    #[test]
    fn test_repeated_tool_reports_first_in_window_order() {
        use ToolKind::*;
        let recent = [OptimizeBudget, GetTransactions, OptimizeBudget, GetTransactions];

        assert_eq!(repeated_tool(&recent, 2), Some(OptimizeBudget));
        assert_eq!(repeated_tool(&recent[1..], 2), Some(GetTransactions));
        assert_eq!(repeated_tool(&recent, 3), None);
        assert_eq!(repeated_tool(&[], 1), None);
    }

    #[tokio::test]
    async fn test_repetition_concludes_without_oracle() {
        let oracle = Arc::new(ScriptedOracle::new([GET]));
        let state = fresh()
            .with_tool_result(record(ToolKind::GetTransactions))
            .with_tool_result(record(ToolKind::CategorizeTransactions))
            .with_tool_result(record(ToolKind::GetTransactions));

        let state = decision_loop(oracle.clone()).step(state).await;

        assert_eq!(state.phase(), SessionPhase::Concluded);
        assert!(state.pending_tool_call.is_none());
        assert_eq!(oracle.remaining(), 1);
        let report = state.final_report.unwrap();
        assert!(report.message.ends_with(&format!("({})", LOOP_PREVENTED)));
    }

    #[tokio::test]
    async fn test_step_ceiling_concludes() {
        let oracle = Arc::new(ScriptedOracle::new([GET]));
        let mut state = fresh();
        state.current_step = DEFAULT_MAX_STEPS;

        let state = decision_loop(oracle.clone()).step(state).await;

        assert!(state.is_concluded());
        assert_eq!(state.current_step, DEFAULT_MAX_STEPS);
        assert_eq!(oracle.remaining(), 1);
    }

    #[tokio::test]
    async fn test_oracle_failure_concludes_with_annotated_message() {
        let state = decision_loop(Arc::new(FailingOracle::new("quota exceeded")))
            .step(fresh())
            .await;

        let report = state.final_report.unwrap();
        assert_eq!(report.status, BudgetStatus::Good);
        assert!(report.message.contains("(Analysis error: Oracle error: quota exceeded)"));
    }

    #[tokio::test]
    async fn test_malformed_response_requests_categorizer() {
        let oracle = Arc::new(ScriptedOracle::new(["please categorize the transactions"]));
        let state = decision_loop(oracle).step(fresh()).await;

        assert_eq!(
            state.pending_tool_call.map(|c| c.tool),
            Some(ToolKind::CategorizeTransactions)
        );
    }

    #[tokio::test]
    async fn test_concluded_state_is_returned_unchanged() {
        let oracle = Arc::new(ScriptedOracle::new([GET]));
        let done = decision_loop(Arc::new(FailingOracle::new("x"))).step(fresh()).await;

        let again = decision_loop(oracle.clone()).step(done.clone()).await;
        assert_eq!(again, done);
        assert_eq!(oracle.remaining(), 1);
    }

    #[tokio::test]
    async fn test_step_counter_never_exceeds_ceiling() {
        // Oracle keeps requesting distinct tools in a cycle that never repeats within the window
        let cycle = ["get_transactions", "categorize_transactions", "analyze_spending", "optimize_budget", "research_tips"];
        let responses: Vec<String> = (0..20)
            .map(|i| {
                format!(
                    r#"{{"needs_tool": true, "reasoning": "r", "tool_call": {{"tool": "{}"}}}}"#,
                    cycle[i % cycle.len()]
                )
            })
            .collect();
        let config = LoopConfig {
            repetition_window: 1,
            repetition_threshold: 2,
            ..Default::default()
        };
        let decision = DecisionLoop::new(Arc::new(ScriptedOracle::new(responses)), config);

        let mut state = fresh();
        while !state.is_concluded() {
            assert!(state.current_step <= config.max_steps);
            state = decision.step(state).await;
            let (next, call) = state.take_pending_call();
            state = next;
            if let Some(call) = call {
                // Failed results never satisfy the completion check
                state = state.with_tool_result(ToolRecord::failed(call.tool, "offline"));
            }
        }

        assert!(state.current_step <= config.max_steps);
    }
}
