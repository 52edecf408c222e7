//! Reasoning oracle
//!
//! The decision loop's only non-deterministic input: a fixed system
//! instruction plus a per-step context document in, free text out.

pub mod gemini;

use crate::error::AgentError;
use crate::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

pub use gemini::GeminiOracle;

#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    async fn consult(&self, system: &str, context: &str) -> Result<String>;
}

/// Replays canned responses in order. Running out is an oracle error.
pub struct ScriptedOracle {
    responses: Mutex<VecDeque<String>>,
    contexts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            contexts: Mutex::new(Vec::new()),
        }
    }

    /// Follows the standard procedure for a session with a deviation
    pub fn standard_procedure() -> Self {
        let tool = |name: &str, why: &str| {
            format!(
                r#"{{"needs_tool": true, "reasoning": "{}", "tool_call": {{"tool": "{}", "args": {{}}}}}}"#,
                why, name
            )
        };

        Self::new([
            tool("get_transactions", "Need the latest transactions"),
            tool("categorize_transactions", "Transactions must be categorized"),
            tool("analyze_spending", "Compare spending against the budget"),
            tool("optimize_budget", "Deviation detected, rebalance the budget"),
            tool("research_tips", "Find savings tips for the worst category"),
            r#"{"ready_for_conclusion": true, "reasoning": "Analysis complete", "status": "alert", "key_insights": ["Spending exceeded the plan"], "recommendations": []}"#
                .to_string(),
        ])
    }

    /// Context documents received so far, oldest first
    pub fn contexts(&self) -> Vec<String> {
        self.contexts
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ReasoningOracle for ScriptedOracle {
    async fn consult(&self, _system: &str, context: &str) -> Result<String> {
        if let Ok(mut contexts) = self.contexts.lock() {
            contexts.push(context.to_string());
        }

        self.responses
            .lock()
            .map_err(|_| AgentError::OracleError("scripted oracle poisoned".to_string()))?
            .pop_front()
            .ok_or_else(|| AgentError::OracleError("scripted oracle exhausted".to_string()))
    }
}

/// Always fails with the given message
pub struct FailingOracle {
    message: String,
}

impl FailingOracle {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl ReasoningOracle for FailingOracle {
    async fn consult(&self, _system: &str, _context: &str) -> Result<String> {
        Err(AgentError::OracleError(self.message.clone()))
    }
}

/// Offline oracle that walks the standard procedure from the context
/// document alone. Stateless, so one instance serves any number of sessions.
pub struct ProcedureOracle;

impl ProcedureOracle {
    fn decide(context: &Value) -> Value {
        let count = context["data_status"]["transactions_count"].as_u64().unwrap_or(0);
        let categorized = context["data_status"]["is_categorized"].as_bool().unwrap_or(false);
        let analyzed = context["data_status"]["is_analyzed"].as_bool().unwrap_or(false);
        let deviation = context["spending_summary"]["deviation_detected"]
            .as_bool()
            .unwrap_or(false);
        let last_tool = context["recent_tool"]["last_tool"].as_str();

        let tool = |name: &str, reasoning: &str| {
            json!({
                "needs_tool": true,
                "reasoning": reasoning,
                "tool_call": {"tool": name, "args": {}},
            })
        };

        if count == 0 && last_tool.is_none() {
            tool("get_transactions", "No transaction data yet")
        } else if count > 0 && !categorized {
            tool("categorize_transactions", "Transactions need budget categories")
        } else if !analyzed {
            tool("analyze_spending", "Compare spending against the budget")
        } else if deviation && last_tool == Some("analyze_spending") {
            tool("optimize_budget", "Deviation detected; build a reallocation plan")
        } else if deviation && last_tool == Some("optimize_budget") {
            tool("research_tips", "Find savings advice for the over-budget category")
        } else {
            let status = if deviation { "alert" } else { "good" };
            json!({
                "ready_for_conclusion": true,
                "reasoning": "Procedure complete",
                "status": status,
                "key_insights": [],
                "recommendations": [],
            })
        }
    }
}

#[async_trait]
impl ReasoningOracle for ProcedureOracle {
    async fn consult(&self, _system: &str, context: &str) -> Result<String> {
        let start = context.find('{');
        let end = context.rfind('}');
        let parsed: Value = match (start, end) {
            (Some(s), Some(e)) if e > s => serde_json::from_str(&context[s..=e])?,
            _ => {
                return Err(AgentError::OracleError(
                    "context document carries no state".to_string(),
                ))
            }
        };

        Ok(Self::decide(&parsed).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_oracle_replays_then_errors() {
        let oracle = ScriptedOracle::new(["first", "second"]);

        assert_eq!(oracle.consult("sys", "ctx-1").await.unwrap(), "first");
        assert_eq!(oracle.consult("sys", "ctx-2").await.unwrap(), "second");
        assert!(matches!(
            oracle.consult("sys", "ctx-3").await,
            Err(AgentError::OracleError(_))
        ));
        assert_eq!(oracle.contexts(), vec!["ctx-1", "ctx-2", "ctx-3"]);
    }

    #[test]
    fn test_standard_procedure_is_valid_json() {
        let oracle = ScriptedOracle::standard_procedure();
        assert_eq!(oracle.remaining(), 6);

        let responses = oracle.responses.lock().unwrap();
        for response in responses.iter() {
            assert!(serde_json::from_str::<serde_json::Value>(response).is_ok());
        }
    }

    #[test]
    fn test_procedure_oracle_walks_the_procedure() {
        let next = |ctx: Value| ProcedureOracle::decide(&ctx)["tool_call"]["tool"].clone();

        assert_eq!(next(json!({"data_status": {"transactions_count": 0}})), "get_transactions");
        assert_eq!(
            next(json!({"data_status": {"transactions_count": 3, "is_categorized": false},
                        "recent_tool": {"last_tool": "get_transactions"}})),
            "categorize_transactions"
        );
        assert_eq!(
            next(json!({"data_status": {"transactions_count": 3, "is_categorized": true, "is_analyzed": false}})),
            "analyze_spending"
        );
        assert_eq!(
            next(json!({"data_status": {"transactions_count": 3, "is_categorized": true, "is_analyzed": true},
                        "spending_summary": {"deviation_detected": true},
                        "recent_tool": {"last_tool": "analyze_spending"}})),
            "optimize_budget"
        );
        assert_eq!(
            next(json!({"data_status": {"transactions_count": 3, "is_categorized": true, "is_analyzed": true},
                        "spending_summary": {"deviation_detected": true},
                        "recent_tool": {"last_tool": "optimize_budget"}})),
            "research_tips"
        );
    }

    #[tokio::test]
    async fn test_procedure_oracle_concludes_when_nothing_is_left() {
        let response = ProcedureOracle
            .consult("sys", r#"CURRENT STATE: {"data_status": {"transactions_count": 0, "is_analyzed": true}, "recent_tool": {"last_tool": "analyze_spending"}}"#)
            .await
            .unwrap();

        let parsed: Value = serde_json::from_str(&response).unwrap();
        assert_eq!(parsed["ready_for_conclusion"], true);
        assert_eq!(parsed["status"], "good");
    }
}
