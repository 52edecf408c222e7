//! Savings research
//!
//! Rule-based tips derived from the overspent category and its evidence,
//! optionally topped up with one filtered web search result. Never fails:
//! search problems degrade to the rule-based tips.

use super::ResearchCapability;
use crate::error::AgentError;
use crate::models::{ResearchRequest, SavingsTip, CURRENCY};
use crate::Result;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

/// Hard limit on tips returned per research call
pub const MAX_TIPS: usize = 2;

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

const IRRELEVANT_KEYWORDS: &[&str] = &[
    "construction", "building", "developer", "real estate development",
    "infrastructure", "policy", "government", "municipal", "urban planning",
    "affordable housing development", "modular construction", "contractor",
    "apartment hunting", "college students", "rental listings", "property investment",
];

const ACTIONABLE_KEYWORDS: &[&str] = &[
    "tip", "save", "budget", "cheap", "affordable", "discount",
    "reduce", "cut costs", "alternative", "strategy", "money",
    "local", "meal prep", "public transport", "free activities",
];

const NOISE_PHRASES: &[&str] = &[
    "stakeholders from different parts of the system",
    "policy makers", "urban planning", "developers",
    "construction industry", "real estate market",
];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Clone, Deserialize)]
struct SearchHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    url: String,
}

/// Thin client for a Tavily-compatible search endpoint
pub struct WebSearchClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl WebSearchClient {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_base_url(api_key, TAVILY_SEARCH_URL)
    }

    pub fn with_base_url(api_key: String, base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.to_string(),
        })
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let response = self
            .client
            .post(&self.base_url)
            .json(&json!({
                "api_key": self.api_key,
                "query": query,
                "search_depth": "basic",
                "max_results": 3,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AgentError::ToolError(format!(
                "Web search returned {}",
                response.status()
            )));
        }

        let body: SearchResponse = response.json().await?;
        Ok(body.results)
    }
}

pub struct ResearchTool {
    web: Option<WebSearchClient>,
}

impl ResearchTool {
    /// Rule-based tips only
    pub fn offline() -> Self {
        Self { web: None }
    }

    pub fn with_web_search(web: WebSearchClient) -> Self {
        Self { web: Some(web) }
    }

    async fn web_tips(&self, request: &ResearchRequest) -> Vec<SavingsTip> {
        let Some(web) = &self.web else {
            return Vec::new();
        };

        let query = format!(
            "budget {} tips {}",
            request.category.to_lowercase(),
            request.location
        );
        info!(query = %query, "Searching the web for savings tips");

        match web.search(&query).await {
            Ok(hits) => hits
                .iter()
                .take(2)
                .filter(|hit| is_relevant(&hit.title, &hit.content, &request.category))
                .filter_map(|hit| {
                    let description = clean_content(&hit.content);
                    if description.is_empty() {
                        return None;
                    }
                    Some(SavingsTip {
                        action: format!("Local Tip: {}...", truncate_chars(&hit.title, 50)),
                        description,
                        estimated_savings: monthly_savings(request.deficit_amount, 0.2, 100.0),
                        difficulty: "Varies".to_string(),
                        actionable: true,
                        source_url: (!hit.url.is_empty()).then(|| hit.url.clone()),
                    })
                })
                .collect(),
            Err(e) => {
                warn!(error = %e, "Web search failed; using rule-based tips only");
                Vec::new()
            }
        }
    }
}

#[async_trait::async_trait]
impl ResearchCapability for ResearchTool {
    async fn search(&self, request: &ResearchRequest) -> Vec<SavingsTip> {
        let mut tips = rule_based_tips(request);
        tips.extend(self.web_tips(request).await.into_iter().take(1));
        tips.truncate(MAX_TIPS);
        tips
    }
}

fn monthly_savings(deficit: f64, share: f64, cap: f64) -> String {
    format!("{} {:.0}/month", CURRENCY, (deficit * share).min(cap))
}

fn tip(action: &str, description: String, estimated_savings: String, difficulty: &str) -> SavingsTip {
    SavingsTip {
        action: action.to_string(),
        description,
        estimated_savings,
        difficulty: difficulty.to_string(),
        actionable: true,
        source_url: None,
    }
}

fn monitor_tip(category: &str) -> SavingsTip {
    tip(
        &format!("Monitor {} Spending", category),
        format!(
            "Track your {} expenses to identify any unusual charges or one-time costs. \
             Consider if recent overspending was due to seasonal factors or one-time expenses that won't recur.",
            category.to_lowercase()
        ),
        "Varies".to_string(),
        "Easy",
    )
}

/// Category-specific tips, steered by the merchants and descriptions that
/// caused the overage.
fn rule_based_tips(request: &ResearchRequest) -> Vec<SavingsTip> {
    let deficit = request.deficit_amount;
    let location = &request.location;
    let evidence_text = request
        .evidence
        .as_ref()
        .map(|d| {
            d.transaction_details
                .iter()
                .map(|t| format!("{} {}", t.description, t.merchant_name).to_lowercase())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();
    let mentions = |keywords: &[&str]| keywords.iter().any(|k| evidence_text.contains(k));

    let mut tips = Vec::new();

    match request.category.to_lowercase().as_str() {
        "food" => {
            if mentions(&["grocery", "groceries", "market", "shopping"]) {
                tips.push(tip(
                    "Smart Grocery Shopping",
                    format!(
                        "Shop at wet markets in {} for fresh produce and compare prices across grocery apps before buying.",
                        location
                    ),
                    monthly_savings(deficit, 0.3, 150.0),
                    "Easy",
                ));
            }
            if mentions(&["kfc", "fast food", "restaurant", "mcdonald"]) {
                tips.push(tip(
                    "Switch to Local Economy Meals",
                    format!(
                        "Replace fast food with local economy rice stalls in {}. A typical meal costs far less than at fast food chains.",
                        location
                    ),
                    monthly_savings(deficit, 0.4, 200.0),
                    "Easy",
                ));
            }
            tips.push(tip(
                "Meal Prep Strategy",
                format!(
                    "Cook large batches on weekends with ingredients from supermarkets in {}. Five or six home meals cost a fraction of eating out.",
                    location
                ),
                monthly_savings(deficit, 0.5, 250.0),
                "Medium",
            ));
        }
        "transportation" => {
            tips.push(tip(
                "Use Public Transit + Strategic Ride-Sharing",
                format!(
                    "Take rail into central {} and use ride-sharing for the final mile only. A monthly transit pass is cheaper than daily rides.",
                    location
                ),
                monthly_savings(deficit, 0.6, 300.0),
                "Easy",
            ));
        }
        "entertainment" => {
            tips.push(tip(
                "Free & Low-Cost Entertainment",
                format!(
                    "Explore free activities in {}: public parks, community events, free museum days. Replace expensive outings with home activities.",
                    location
                ),
                monthly_savings(deficit, 0.5, 200.0),
                "Easy",
            ));
            if mentions(&["airline", "flight"]) {
                tips.push(tip(
                    "Switch to Budget Airlines",
                    "Use budget carriers for domestic flights and book 2-3 months ahead for 40-60% savings.".to_string(),
                    monthly_savings(deficit, 0.4, 200.0),
                    "Easy",
                ));
            }
        }
        "housing" => {
            let large: Vec<String> = request
                .evidence
                .as_ref()
                .map(|d| {
                    d.transaction_details
                        .iter()
                        .filter(|t| t.amount > 500.0)
                        .take(3)
                        .map(|t| format!("{} ({}{:.0})", t.description, CURRENCY, t.amount))
                        .collect()
                })
                .unwrap_or_default();

            if large.is_empty() {
                tips.push(monitor_tip("Housing"));
            } else {
                tips.push(tip(
                    "Review Large Housing Transactions",
                    format!(
                        "Your Housing overage of {}{:.0} includes large payments: {}. Review if these are: \
                         1) One-time setup costs that won't recur, 2) Scheduled deposits/investments, or \
                         3) Recurring payments requiring budget adjustment.",
                        CURRENCY,
                        deficit,
                        large.join(", ")
                    ),
                    "Varies".to_string(),
                    "Easy",
                ));
            }
        }
        "utilities" => tips.push(monitor_tip("Utilities")),
        "healthcare" => tips.push(monitor_tip("Healthcare")),
        _ => {}
    }

    tips.truncate(MAX_TIPS);
    tips
}

fn is_relevant(title: &str, content: &str, category: &str) -> bool {
    let text = format!("{} {}", title, content).to_lowercase();
    let category = category.to_lowercase();

    if IRRELEVANT_KEYWORDS.iter().any(|k| text.contains(k)) {
        return false;
    }

    // Web content for necessity categories is never surfaced
    match category.as_str() {
        "food" | "entertainment" | "transportation" => {
            ACTIONABLE_KEYWORDS.iter().any(|k| text.contains(k))
        }
        _ => false,
    }
}

fn clean_content(content: &str) -> String {
    let mut cleaned = if content.chars().count() > 300 {
        format!("{}...", truncate_chars(content, 300))
    } else {
        content.to_string()
    };

    for phrase in NOISE_PHRASES {
        cleaned = cleaned.replace(phrase, "");
    }

    cleaned.trim().to_string()
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::patterns::detect_pattern;
    use crate::models::{Category, DeviationDetail, Transaction};
    use chrono::NaiveDate;

    fn request(category: &str, deficit: f64, descriptions: &[(&str, f64)]) -> ResearchRequest {
        let transactions: Vec<Transaction> = descriptions
            .iter()
            .enumerate()
            .map(|(i, (d, amount))| Transaction {
                transaction_id: i.to_string(),
                amount: *amount,
                date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                description: d.to_string(),
                merchant_name: String::new(),
                category: String::new(),
                budget_category: category.parse::<Category>().ok(),
            })
            .collect();

        ResearchRequest {
            category: category.to_string(),
            location: "Kuala Lumpur".to_string(),
            deficit_amount: deficit,
            evidence: Some(DeviationDetail {
                budgeted: 100.0,
                spent: 100.0 + deficit,
                overage: deficit,
                is_discretionary: true,
                pattern: detect_pattern(&transactions),
                transaction_details: transactions,
            }),
        }
    }

    #[tokio::test]
    async fn test_food_tips_follow_evidence() {
        let tool = ResearchTool::offline();
        let tips = tool
            .search(&request("Food", 400.0, &[("KFC fast food", 60.0)]))
            .await;

        assert_eq!(tips.len(), 2);
        assert_eq!(tips[0].action, "Switch to Local Economy Meals");
        assert_eq!(tips[0].estimated_savings, "RM 160/month");
        assert_eq!(tips[1].action, "Meal Prep Strategy");
    }

    #[tokio::test]
    async fn test_housing_tip_lists_large_payments() {
        let tool = ResearchTool::offline();
        let tips = tool
            .search(&request("Housing", 700.0, &[("Deposit", 1200.0), ("Repairs", 90.0)]))
            .await;

        assert_eq!(tips.len(), 1);
        assert!(tips[0].description.contains("Deposit (RM1200)"));
        assert!(!tips[0].description.contains("Repairs"));
    }

    #[tokio::test]
    async fn test_general_category_yields_no_tips() {
        let tips = ResearchTool::offline()
            .search(&ResearchRequest {
                category: "general".to_string(),
                location: "Penang".to_string(),
                deficit_amount: 0.0,
                evidence: None,
            })
            .await;

        assert!(tips.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_web_search_degrades_gracefully() {
        let web = WebSearchClient::with_base_url("key".to_string(), "http://127.0.0.1:9/search")
            .unwrap();
        let tool = ResearchTool::with_web_search(web);

        let tips = tool
            .search(&request("Entertainment", 100.0, &[("Cinema", 50.0)]))
            .await;

        assert_eq!(tips.len(), 1);
        assert_eq!(tips[0].action, "Free & Low-Cost Entertainment");
    }

    #[test]
    fn test_relevance_filter() {
        assert!(is_relevant("5 tips to save on food", "Cook at home", "Food"));
        assert!(!is_relevant("Urban planning policy", "tips", "Food"));
        assert!(!is_relevant("Save on rent", "tips", "Housing"));
        assert!(!is_relevant("Nice article", "nothing useful", "Entertainment"));
    }

    #[test]
    fn test_clean_content_truncates_on_char_boundary() {
        let long = "é".repeat(400);
        let cleaned = clean_content(&long);
        assert_eq!(cleaned.chars().count(), 303);
    }
}
