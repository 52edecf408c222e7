//! Session audit trail
//!
//! Completed sessions are kept in memory for the lifetime of the process.
//! Each record carries a hash of the request that started it.

use crate::models::{FinalReport, UserProfile};
use crate::state::{SessionRequest, SessionState};
use crate::tools::ToolKind;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: Uuid,
    pub profile: UserProfile,
    pub request: Arc<SessionRequest>,
    pub request_hash: String,
    pub report: Arc<FinalReport>,
    pub tools_invoked: Vec<ToolKind>,
    pub steps: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl SessionRecord {
    pub fn new(request: SessionRequest, state: &SessionState, report: FinalReport, elapsed_ms: u64) -> Self {
        Self {
            session_id: state.session_id,
            profile: state.profile.clone(),
            request_hash: compute_request_hash(&request),
            request: Arc::new(request),
            report: Arc::new(report),
            tools_invoked: state.tool_results.iter().map(|r| r.tool).collect(),
            steps: state.current_step,
            started_at: state.started_at,
            completed_at: Utc::now(),
            elapsed_ms,
        }
    }
}

/// Audit trail storage
#[derive(Clone)]
pub struct AuditLog {
    records: Arc<RwLock<HashMap<Uuid, SessionRecord>>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn record(&self, record: SessionRecord) -> Result<Uuid> {
        let session_id = record.session_id;
        let mut records = self.records.write().await;
        records.insert(session_id, record);
        Ok(session_id)
    }

    pub async fn get(&self, session_id: Uuid) -> Result<Option<SessionRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&session_id).cloned())
    }

    /// Session ids for a user name, oldest first
    pub async fn list_for_user(&self, name: &str) -> Result<Vec<Uuid>> {
        let records = self.records.read().await;

        let mut items: Vec<_> = records
            .values()
            .filter(|record| record.profile.name == name)
            .map(|record| (record.session_id, record.completed_at))
            .collect();

        items.sort_by_key(|(_, completed_at)| *completed_at);

        Ok(items.into_iter().map(|(id, _)| id).collect())
    }

    /// Verify a record's integrity via hash
    pub async fn verify_integrity(&self, session_id: Uuid) -> Result<bool> {
        let records = self.records.read().await;

        match records.get(&session_id) {
            Some(record) => Ok(compute_request_hash(&record.request) == record.request_hash),
            None => Ok(false),
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// SHA-256 of the request's JSON form, hex encoded
pub fn compute_request_hash(request: &SessionRequest) -> String {
    let mut hasher = Sha256::new();

    if serde_json::to_writer(&mut HashWriter(&mut hasher), request).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::report::summary_report;
    use crate::models::Category;

    fn request(name: &str) -> SessionRequest {
        SessionRequest {
            profile: UserProfile {
                name: name.to_string(),
                ..Default::default()
            },
            budget: [(Category::Food, 300.0)].into_iter().collect(),
            baseline: None,
        }
    }

    fn record_for(name: &str) -> SessionRecord {
        let req = request(name);
        let state = SessionState::new(req.clone()).unwrap();
        let report = summary_report(&state, "");
        SessionRecord::new(req, &state, report, 5)
    }

    #[test]
    fn test_hash_is_stable_and_sensitive() {
        let a = compute_request_hash(&request("Ana"));
        assert_eq!(a, compute_request_hash(&request("Ana")));
        assert_ne!(a, compute_request_hash(&request("Ben")));
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_record_and_verify() {
        let log = AuditLog::new();
        let record = record_for("Ana");
        let id = log.record(record).await.unwrap();

        assert!(log.get(id).await.unwrap().is_some());
        assert!(log.verify_integrity(id).await.unwrap());
        assert!(!log.verify_integrity(Uuid::new_v4()).await.unwrap());
        assert_eq!(log.list_for_user("Ana").await.unwrap(), vec![id]);
        assert!(log.list_for_user("Ben").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tampered_request_fails_verification() {
        let log = AuditLog::new();
        let mut record = record_for("Ana");
        record.request = Arc::new(request("Mallory"));
        let id = log.record(record).await.unwrap();

        assert!(!log.verify_integrity(id).await.unwrap());
    }
}
