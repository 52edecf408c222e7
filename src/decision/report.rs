//! Final report synthesis

use super::parser::Conclusion;
use crate::models::{
    BudgetStatus, FinalReport, ReallocationRecommendation, ReportRecommendation, SavingsTip,
    CURRENCY,
};
use crate::state::{SessionState, ToolOutcome};

fn push_unique<T: PartialEq>(list: &mut Vec<T>, item: T) {
    if !list.contains(&item) {
        list.push(item);
    }
}

/// Budget and research recommendations from every successful result, in
/// history order with exact duplicates dropped.
pub fn collect_recommendations(
    state: &SessionState,
) -> (Vec<ReallocationRecommendation>, Vec<SavingsTip>) {
    let mut budget = Vec::new();
    let mut research = Vec::new();

    for record in &state.tool_results {
        match &record.outcome {
            ToolOutcome::Optimization(result) => {
                for rec in &result.recommendations {
                    push_unique(&mut budget, rec.clone());
                }
            }
            ToolOutcome::Research(result) => {
                for tip in &result.recommendations {
                    push_unique(&mut research, tip.clone());
                }
            }
            _ => {}
        }
    }

    (budget, research)
}

fn combined(
    budget: &[ReallocationRecommendation],
    research: &[SavingsTip],
    oracle: &[String],
) -> Vec<ReportRecommendation> {
    let mut all = Vec::with_capacity(budget.len() + research.len() + oracle.len());
    all.extend(budget.iter().cloned().map(ReportRecommendation::OptimizeBudget));
    all.extend(research.iter().cloned().map(ReportRecommendation::ResearchTips));
    for text in oracle {
        push_unique(&mut all, ReportRecommendation::Oracle(text.clone()));
    }
    all
}

/// One line per category in deviation
fn deviation_insights(state: &SessionState) -> Vec<String> {
    state
        .deviation_details
        .iter()
        .map(|(category, detail)| {
            format!(
                "{} is over budget by {}{:.2} ({})",
                category, CURRENCY, detail.overage, detail.pattern.description
            )
        })
        .collect()
}

/// Report for a conclusion the oracle reached
pub fn conclusion_report(state: &SessionState, conclusion: &Conclusion) -> FinalReport {
    let name = state.user_name();

    let message = match conclusion.status {
        BudgetStatus::Alert if !state.deviation_details.is_empty() => format!(
            "Hi {}, I've identified spending concerns in: {}.",
            name,
            state
                .deviation_details
                .keys()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ),
        BudgetStatus::Alert => format!(
            "Hi {}, I've identified some financial optimization opportunities.",
            name
        ),
        BudgetStatus::Good => format!(
            "Hi {}, your finances look healthy! Here's what I observed:",
            name
        ),
    };

    let (budget, research) = collect_recommendations(state);

    FinalReport {
        status: conclusion.status,
        message,
        recommendations: combined(&budget, &research, &conclusion.recommendations),
        budget_recommendations: budget,
        research_recommendations: research,
        insights: conclusion.key_insights.clone(),
        reasoning_trace: state.reasoning_trace.clone(),
    }
}

/// Report synthesized from state alone, annotated with why the loop stopped
pub fn summary_report(state: &SessionState, reason: &str) -> FinalReport {
    let name = state.user_name();

    let (status, mut message) = if state.deviation_detected {
        (
            BudgetStatus::Alert,
            format!(
                "Hi {}, I've completed my analysis and found some areas for improvement.",
                name
            ),
        )
    } else {
        (
            BudgetStatus::Good,
            format!("Hi {}, your spending appears to be on track.", name),
        )
    };

    if !reason.is_empty() {
        message.push_str(&format!(" ({})", reason));
    }

    let (budget, research) = collect_recommendations(state);

    FinalReport {
        status,
        message,
        recommendations: combined(&budget, &research, &[]),
        budget_recommendations: budget,
        research_recommendations: research,
        insights: deviation_insights(state),
        reasoning_trace: state.reasoning_trace.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::detect_pattern;
    use crate::models::{
        Category, DeviationDetail, OptimizationResult, ResearchResult, SpendingAnalysis,
        UserProfile,
    };
    use crate::state::{SessionRequest, ToolRecord};
    use crate::tools::ToolKind;

    fn state() -> SessionState {
        SessionState::new(SessionRequest {
            profile: UserProfile {
                name: "Mei".to_string(),
                ..Default::default()
            },
            budget: [(Category::Food, 1200.0)].into_iter().collect(),
            baseline: None,
        })
        .unwrap()
    }

    fn deviation_analysis() -> ToolRecord {
        let detail = DeviationDetail {
            budgeted: 1200.0,
            spent: 1300.0,
            overage: 100.0,
            is_discretionary: true,
            transaction_details: Vec::new(),
            pattern: detect_pattern(&[]),
        };
        ToolRecord::new(
            ToolKind::AnalyzeSpending,
            ToolOutcome::Analysis(SpendingAnalysis {
                spending_by_category: [(Category::Food, 1300.0)].into_iter().collect(),
                deviation_detected: true,
                deviation_details: [(Category::Food, detail)].into_iter().collect(),
            }),
        )
    }

    fn rec() -> ReallocationRecommendation {
        ReallocationRecommendation {
            from_category: Category::Entertainment,
            to_category: Category::Food,
            amount: 100.0,
            reasoning: "Reallocating".to_string(),
        }
    }

    fn tip() -> SavingsTip {
        SavingsTip {
            action: "Meal Prep Strategy".to_string(),
            description: "Cook at home".to_string(),
            estimated_savings: "RM 50/month".to_string(),
            difficulty: "Medium".to_string(),
            actionable: true,
            source_url: None,
        }
    }

    fn optimization() -> ToolRecord {
        ToolRecord::new(
            ToolKind::OptimizeBudget,
            ToolOutcome::Optimization(OptimizationResult {
                optimization_needed: true,
                recommendations: vec![rec()],
                ..Default::default()
            }),
        )
    }

    fn research() -> ToolRecord {
        ToolRecord::new(
            ToolKind::ResearchTips,
            ToolOutcome::Research(ResearchResult {
                recommendations: vec![tip()],
                ..Default::default()
            }),
        )
    }

    #[test]
    fn test_recommendations_grouped_and_deduplicated() {
        let state = state()
            .with_tool_result(deviation_analysis())
            .with_tool_result(optimization())
            .with_tool_result(research())
            .with_tool_result(optimization());

        let conclusion = Conclusion {
            reasoning: "Done".to_string(),
            status: BudgetStatus::Alert,
            key_insights: vec!["Food overspent".to_string()],
            recommendations: vec!["Track receipts".to_string(), "Track receipts".to_string()],
        };
        let report = conclusion_report(&state, &conclusion);

        assert_eq!(report.budget_recommendations, vec![rec()]);
        assert_eq!(report.research_recommendations, vec![tip()]);
        assert_eq!(
            report.recommendations,
            vec![
                ReportRecommendation::OptimizeBudget(rec()),
                ReportRecommendation::ResearchTips(tip()),
                ReportRecommendation::Oracle("Track receipts".to_string()),
            ]
        );
        assert_eq!(report.message, "Hi Mei, I've identified spending concerns in: Food.");
        assert_eq!(report.insights, vec!["Food overspent"]);
    }

    #[test]
    fn test_good_conclusion_message() {
        let conclusion = Conclusion {
            reasoning: "ok".to_string(),
            status: BudgetStatus::Good,
            key_insights: Vec::new(),
            recommendations: Vec::new(),
        };
        let report = conclusion_report(&state(), &conclusion);
        assert_eq!(report.message, "Hi Mei, your finances look healthy! Here's what I observed:");
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn test_summary_report_uses_state_status_and_reason() {
        let report = summary_report(&state().with_tool_result(deviation_analysis()), "Safety limit reached");

        assert_eq!(report.status, BudgetStatus::Alert);
        assert_eq!(
            report.message,
            "Hi Mei, I've completed my analysis and found some areas for improvement. (Safety limit reached)"
        );
        assert_eq!(report.insights.len(), 1);
        assert!(report.insights[0].starts_with("Food is over budget by RM100.00"));

        let report = summary_report(&state(), "");
        assert_eq!(report.status, BudgetStatus::Good);
        assert_eq!(report.message, "Hi Mei, your spending appears to be on track.");
    }
}
