//! Budget Guardian
//!
//! A personal-finance agent that:
//! - Fetches and categorizes transactions
//! - Compares baseline + new spending against a category budget
//! - Proposes budget reallocation over a fixed category graph
//! - Researches savings tips for the worst category
//! - Lets an LLM choose the next tool, bounded by a safety gate
//!
//! LOOP:
//! STEP (gate → complete? → oracle) → EXECUTE → MERGE → ... → REPORT

pub mod agent;
pub mod analyzer;
pub mod api;
pub mod audit;
pub mod config;
pub mod decision;
pub mod error;
pub mod execution;
pub mod models;
pub mod optimizer;
pub mod oracle;
pub mod state;
pub mod tools;

pub use error::{AgentError, Result};

// Re-export common types
pub use models::*;
