//! Oracle response parsing
//!
//! Extracts the outermost JSON object from free text and maps it onto a
//! tool request or a conclusion. Anything else goes through keyword
//! fallback rules, so parsing never fails.

use crate::models::BudgetStatus;
use crate::tools::{ToolCall, ToolKind};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct Conclusion {
    pub reasoning: String,
    pub status: BudgetStatus,
    pub key_insights: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OracleDecision {
    ToolRequest { reasoning: String, call: ToolCall },
    Conclusion(Conclusion),
}

#[derive(Debug, Deserialize)]
struct RawDecision {
    #[serde(default)]
    needs_tool: bool,
    #[serde(default)]
    ready_for_conclusion: bool,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    tool_call: Option<RawToolCall>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    key_insights: Vec<Value>,
    #[serde(default)]
    recommendations: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawToolCall {
    tool: String,
    #[serde(default)]
    args: Value,
}

/// Text between the first `{` and the last `}`, inclusive
fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn as_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn from_raw(raw: RawDecision) -> Option<OracleDecision> {
    if raw.needs_tool {
        let raw_call = raw.tool_call?;
        let tool = raw_call.tool.parse::<ToolKind>().ok()?;
        return Some(OracleDecision::ToolRequest {
            reasoning: raw.reasoning.unwrap_or_else(|| format!("Requested {}", tool)),
            call: ToolCall {
                tool,
                args: raw_call.args,
            },
        });
    }

    if raw.ready_for_conclusion {
        let status = match raw.status.as_deref().map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("alert") => BudgetStatus::Alert,
            _ => BudgetStatus::Good,
        };
        return Some(OracleDecision::Conclusion(Conclusion {
            reasoning: raw.reasoning.unwrap_or_else(|| "Analysis complete".to_string()),
            status,
            key_insights: raw.key_insights.into_iter().map(as_text).collect(),
            recommendations: raw.recommendations.into_iter().map(as_text).collect(),
        }));
    }

    None
}

fn fallback(text: &str) -> OracleDecision {
    let lower = text.to_lowercase();

    let tool_request = |tool: ToolKind, reasoning: &str| OracleDecision::ToolRequest {
        reasoning: reasoning.to_string(),
        call: ToolCall::new(tool),
    };

    if lower.contains("categorize") {
        tool_request(ToolKind::CategorizeTransactions, "Need to categorize transactions")
    } else if lower.contains("optimize") || lower.contains("budget") {
        tool_request(ToolKind::OptimizeBudget, "Need to optimize budget")
    } else {
        OracleDecision::Conclusion(Conclusion {
            reasoning: "Parse error - concluding analysis".to_string(),
            status: BudgetStatus::Good,
            key_insights: Vec::new(),
            recommendations: Vec::new(),
        })
    }
}

pub fn parse_decision(text: &str) -> OracleDecision {
    let parsed = outermost_object(text)
        .and_then(|json| serde_json::from_str::<RawDecision>(json).ok())
        .and_then(from_raw);

    match parsed {
        Some(decision) => decision,
        None => {
            warn!(chars = text.len(), "Oracle response not usable; applying fallback rules");
            fallback(text)
        }
    }
}
