//! Environment configuration
//!
//! Values come from the process environment, after `dotenv` has loaded
//! `.env` in the binaries. Anything set but unparseable is a config error.

use crate::decision::LoopConfig;
use crate::error::AgentError;
use crate::models::Category;
use crate::tools::provider::FetchWindow;
use crate::Result;
use std::str::FromStr;

pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub loop_config: LoopConfig,
    pub default_category: Category,
    pub fetch_window: FetchWindow,
    pub port: u16,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            loop_config: LoopConfig::default(),
            default_category: crate::analyzer::DEFAULT_FALLBACK_CATEGORY,
            fetch_window: FetchWindow::default(),
            port: DEFAULT_PORT,
        }
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AgentError::ConfigError(format!("{}={:?}: {}", key, raw, e))),
        None => Ok(default),
    }
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let loop_config = LoopConfig {
            max_steps: parsed(&lookup, "AGENT_MAX_STEPS", defaults.loop_config.max_steps)?,
            repetition_window: parsed(
                &lookup,
                "AGENT_REPETITION_WINDOW",
                defaults.loop_config.repetition_window,
            )?,
            repetition_threshold: parsed(
                &lookup,
                "AGENT_REPETITION_THRESHOLD",
                defaults.loop_config.repetition_threshold,
            )?,
        };

        if loop_config.max_steps == 0 {
            return Err(AgentError::ConfigError("AGENT_MAX_STEPS must be at least 1".to_string()));
        }
        if loop_config.repetition_window == 0 || loop_config.repetition_threshold == 0 {
            return Err(AgentError::ConfigError(
                "AGENT_REPETITION_WINDOW and AGENT_REPETITION_THRESHOLD must be at least 1".to_string(),
            ));
        }

        let default_category = parsed(&lookup, "AGENT_DEFAULT_CATEGORY", defaults.default_category)?;

        let fetch_window = lookup("TRANSACTION_WINDOW")
            .map(|name| FetchWindow::preset(&name))
            .unwrap_or(defaults.fetch_window);

        let port = match lookup("PORT").or_else(|| lookup("API_PORT")) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| AgentError::ConfigError(format!("PORT={:?}: {}", raw, e)))?,
            None => defaults.port,
        };

        Ok(Self {
            loop_config,
            default_category,
            fetch_window,
            port,
        })
    }
}

/// External service credentials
#[derive(Clone, Default, PartialEq)]
pub struct Credentials {
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub transactions_api_base_url: Option<String>,
    pub tavily_api_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redacted = |v: &Option<String>| v.as_ref().map(|_| "<set>");
        f.debug_struct("Credentials")
            .field("gemini_api_key", &redacted(&self.gemini_api_key))
            .field("gemini_model", &self.gemini_model)
            .field("transactions_api_base_url", &self.transactions_api_base_url)
            .field("tavily_api_key", &redacted(&self.tavily_api_key))
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            gemini_api_key: non_empty("GEMINI_API_KEY"),
            gemini_model: non_empty("GEMINI_MODEL"),
            transactions_api_base_url: non_empty("TRANSACTIONS_API_BASE_URL"),
            tavily_api_key: non_empty("TAVILY_API_KEY"),
        }
    }

    /// Live mode is requested as soon as any required credential is present
    pub fn wants_live(&self) -> bool {
        self.gemini_api_key.is_some() || self.transactions_api_base_url.is_some()
    }

    /// Every credential live mode needs must be present
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.gemini_api_key.is_none() {
            missing.push("GEMINI_API_KEY");
        }
        if self.transactions_api_base_url.is_none() {
            missing.push("TRANSACTIONS_API_BASE_URL");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AgentError::ConfigError(format!(
                "missing required credentials: {}",
                missing.join(", ")
            )))
        }
    }
}
