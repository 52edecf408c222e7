use budget_guardian::{
    agent::Orchestrator,
    audit::AuditLog,
    config::{AgentConfig, Credentials},
    models::{Category, ReportRecommendation, UserProfile},
    state::SessionRequest,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn sample_request() -> SessionRequest {
    SessionRequest {
        profile: UserProfile {
            name: "Aisha".to_string(),
            location: "Kuala Lumpur".to_string(),
            income: Some(6500.0),
            employment_status: Some("employed".to_string()),
        },
        budget: [
            (Category::Housing, 1600.0),
            (Category::Food, 100.0),
            (Category::Transportation, 200.0),
            (Category::Utilities, 300.0),
            (Category::Healthcare, 400.0),
            (Category::Entertainment, 600.0),
        ]
        .into_iter()
        .collect(),
        baseline: None,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AgentConfig::from_env()?;
    let credentials = Credentials::from_env();

    // Optional path to a JSON session request
    let request: SessionRequest = match std::env::args().nth(1) {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => sample_request(),
    };

    let orchestrator = if credentials.wants_live() {
        info!(?credentials, "Budget Guardian starting in live mode");
        Orchestrator::live(&config, &credentials, AuditLog::new())?
    } else {
        info!("Budget Guardian starting in demo mode (no credentials configured)");
        Orchestrator::demo(&config, AuditLog::new())
    };

    let outcome = orchestrator.run(request).await?;
    let report = &outcome.report;

    println!("\n=== {} ===", report.status.to_string().to_uppercase());
    println!("{}", report.message);
    println!("Session: {}", outcome.state.session_id);

    if !report.insights.is_empty() {
        println!("\nInsights:");
        for insight in &report.insights {
            println!("  - {}", insight);
        }
    }

    if !report.recommendations.is_empty() {
        println!("\nRecommendations:");
        for rec in &report.recommendations {
            match rec {
                ReportRecommendation::OptimizeBudget(r) => println!("  [budget] {}", r.reasoning),
                ReportRecommendation::ResearchTips(t) => {
                    println!("  [tip] {}: {} ({})", t.action, t.description, t.estimated_savings)
                }
                ReportRecommendation::Oracle(text) => println!("  [agent] {}", text),
            }
        }
    }

    if let Some(proposed) = &outcome.state.rebalanced_budget {
        println!("\nProposed budget (not applied):");
        for (category, amount) in proposed {
            println!("  {:<15} {:>10.2}", category.as_str(), amount);
        }
    }

    println!("\nReasoning Trace:");
    for (i, trace) in report.reasoning_trace.iter().enumerate() {
        println!("  {}: {}", i + 1, trace);
    }

    Ok(())
}
