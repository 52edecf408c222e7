use budget_guardian::{
    agent::Orchestrator,
    api::start_server,
    audit::AuditLog,
    config::{AgentConfig, Credentials},
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

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

    info!("Budget Guardian - API Server");
    info!("Port: {}", config.port);

    let orchestrator = if credentials.wants_live() {
        // Partial credentials abort startup
        Orchestrator::live(&config, &credentials, AuditLog::new())?
    } else {
        warn!("GEMINI_API_KEY and TRANSACTIONS_API_BASE_URL not set; serving demo sessions");
        Orchestrator::demo(&config, AuditLog::new())
    };

    info!("Orchestrator initialized");

    start_server(Arc::new(orchestrator), config.port).await?;

    Ok(())
}
