//! Main orchestrator - drives one session to its final report
//!
//! STEP → EXECUTE → MERGE → STEP ... → CONCLUDE

use crate::analyzer::SpendingAnalyzer;
use crate::audit::{AuditLog, SessionRecord};
use crate::config::{AgentConfig, Credentials};
use crate::decision::{report, DecisionLoop};
use crate::error::AgentError;
use crate::execution::ExecutionEngine;
use crate::models::{FinalReport, CURRENCY};
use crate::optimizer::BudgetOptimizer;
use crate::oracle::{GeminiOracle, ProcedureOracle, ReasoningOracle};
use crate::state::{SessionRequest, SessionState, ToolOutcome, ToolRecord};
use crate::tools::research::WebSearchClient;
use crate::tools::{
    HttpTransactionProvider, KeywordCategorizer, ResearchCapability, ResearchTool,
    StaticTransactionProvider, Toolbox, TransactionProvider,
};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extra loop turns allowed beyond the step ceiling
const ITERATION_GUARD_SLACK: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub report: FinalReport,
    pub state: SessionState,
}

/// One-line description of a tool record for the reasoning trace
fn summarize_record(record: &ToolRecord) -> String {
    match &record.outcome {
        ToolOutcome::Transactions {
            transactions_retrieved,
            ..
        } => format!("{} transactions retrieved", transactions_retrieved),
        ToolOutcome::Categorized {
            categorized_count, ..
        } => format!("{} transactions categorized", categorized_count),
        ToolOutcome::Analysis(analysis) if analysis.deviation_detected => format!(
            "deviation detected in {}",
            analysis
                .deviation_details
                .keys()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ),
        ToolOutcome::Analysis(_) => "all categories within budget".to_string(),
        ToolOutcome::Optimization(result) if result.optimization_needed => format!(
            "{} reallocation(s) totalling {}{:.2}",
            result.recommendations.len(),
            CURRENCY,
            result.total_reallocation
        ),
        ToolOutcome::Optimization(result) => result
            .message
            .clone()
            .unwrap_or_else(|| "no reallocation proposed".to_string()),
        ToolOutcome::Research(result) => format!(
            "{} tip(s) for {}",
            result.recommendations.len(),
            result.category
        ),
        ToolOutcome::Failed { error } => format!("error: {}", error),
    }
}

pub struct Orchestrator {
    decision_loop: DecisionLoop,
    execution_engine: ExecutionEngine,
    audit_log: AuditLog,
}

impl Orchestrator {
    pub fn new(
        decision_loop: DecisionLoop,
        execution_engine: ExecutionEngine,
        audit_log: AuditLog,
    ) -> Self {
        Self {
            decision_loop,
            execution_engine,
            audit_log,
        }
    }

    pub fn from_parts(
        oracle: Arc<dyn ReasoningOracle>,
        toolbox: Toolbox,
        config: &AgentConfig,
        audit_log: AuditLog,
    ) -> Self {
        Self::new(
            DecisionLoop::new(oracle, config.loop_config),
            ExecutionEngine::new(toolbox, SpendingAnalyzer::new(config.default_category)),
            audit_log,
        )
    }

    /// Gemini oracle, HTTP transaction provider and web-assisted research
    pub fn live(config: &AgentConfig, credentials: &Credentials, audit_log: AuditLog) -> Result<Self> {
        credentials.validate()?;

        let (Some(api_key), Some(base_url)) = (
            credentials.gemini_api_key.clone(),
            credentials.transactions_api_base_url.as_deref(),
        ) else {
            return Err(AgentError::ConfigError("live credentials incomplete".to_string()));
        };

        let oracle = Arc::new(GeminiOracle::new(api_key, credentials.gemini_model.clone())?);
        let provider: Arc<dyn TransactionProvider> =
            Arc::new(HttpTransactionProvider::new(base_url, config.fetch_window)?);

        let research = match &credentials.tavily_api_key {
            Some(key) => ResearchTool::with_web_search(WebSearchClient::new(key.clone())?),
            None => ResearchTool::offline(),
        };

        let toolbox = Toolbox::new(
            provider,
            Arc::new(KeywordCategorizer::new(config.default_category)),
            Some(Arc::new(research) as Arc<dyn ResearchCapability>),
        );

        Ok(Self::from_parts(oracle, toolbox, config, audit_log))
    }

    /// Offline procedure oracle over the bundled sample month
    pub fn demo(config: &AgentConfig, audit_log: AuditLog) -> Self {
        let toolbox = Toolbox::new(
            Arc::new(StaticTransactionProvider::sample()),
            Arc::new(KeywordCategorizer::new(config.default_category)),
            Some(Arc::new(ResearchTool::offline()) as Arc<dyn ResearchCapability>),
        );

        Self::from_parts(Arc::new(ProcedureOracle), toolbox, config, audit_log)
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit_log
    }

    /// Reallocation engine sharing this orchestrator's fallback category
    pub fn optimizer(&self) -> &BudgetOptimizer {
        self.execution_engine.optimizer()
    }

    /// Execute the pending tool call and merge its result
    pub async fn execute_pending(&self, state: SessionState) -> Result<SessionState> {
        if state.is_concluded() {
            return Err(AgentError::SessionConcluded(state.session_id.to_string()));
        }

        let (state, call) = state.take_pending_call();
        let Some(call) = call else {
            return Ok(state);
        };

        let record = self.execution_engine.execute(&call, &state).await;
        let line = format!("EXECUTE: {} - {}", call.tool, summarize_record(&record));

        debug!(session_id = %state.session_id, tool = %call.tool, "{}", line);

        Ok(state.with_reasoning(line).with_tool_result(record))
    }

    /// Run one session until the decision loop concludes
    pub async fn run(&self, request: SessionRequest) -> Result<SessionOutcome> {
        let start_time = Instant::now();
        let mut state = SessionState::new(request.clone())?;

        info!(
            session_id = %state.session_id,
            user = %state.user_name(),
            categories = state.budget.len(),
            "Orchestrator: starting session"
        );

        state = state.with_reasoning("INPUT: Session request received");

        let guard = self.decision_loop.config().max_steps + ITERATION_GUARD_SLACK;
        for turn in 0..guard {
            state = self.decision_loop.step(state).await;
            if state.is_concluded() {
                break;
            }

            debug!(session_id = %state.session_id, turn, step = state.current_step, "Executing pending tool");
            state = self.execute_pending(state).await?;
        }

        let report = match state.final_report.clone() {
            Some(report) => report,
            None => {
                warn!(session_id = %state.session_id, guard, "Iteration guard reached");
                let report = report::summary_report(&state, "Iteration guard reached");
                state = state.concluded(report.clone());
                report
            }
        };

        let elapsed_ms = start_time.elapsed().as_millis() as u64;

        info!(
            session_id = %state.session_id,
            status = %report.status,
            steps = state.current_step,
            tools = state.tool_results.len(),
            elapsed_ms,
            "Session concluded"
        );

        self.audit_log
            .record(SessionRecord::new(request, &state, report.clone(), elapsed_ms))
            .await?;

        Ok(SessionOutcome { report, state })
    }
}
