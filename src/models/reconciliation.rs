use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ranked match returned by the external catalog, score on a 0-100 scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogCandidate {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Approved,
    Rejected,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Approved => "approved",
            TaskStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }
}

/// Human-review unit for mid-confidence catalog matches. Approve/reject is a
/// terminal transition guarded by an expected-version compare.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationTask {
    pub id: Uuid,
    pub entity_id: Uuid,
    pub entity_label: String,
    pub candidates: Vec<CatalogCandidate>,
    pub status: TaskStatus,
    pub chosen_candidate_id: Option<String>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VerificationTask {
    pub fn new(entity_id: Uuid, entity_label: impl Into<String>, candidates: Vec<CatalogCandidate>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            entity_id,
            entity_label: entity_label.into(),
            candidates,
            status: TaskStatus::Pending,
            chosen_candidate_id: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One per entity at most; creation is idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalLink {
    pub entity_id: Uuid,
    pub external_id: String,
    pub canonical_uri: String,
    pub linked_at: DateTime<Utc>,
}

impl ExternalLink {
    pub fn new(entity_id: Uuid, external_id: impl Into<String>, canonical_uri: impl Into<String>) -> Self {
        Self {
            entity_id,
            external_id: external_id.into(),
            canonical_uri: canonical_uri.into(),
            linked_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationDecision {
    AutoLinked,
    Queued,
    NoMatch,
    Skipped,
}

impl ReconciliationDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconciliationDecision::AutoLinked => "auto_linked",
            ReconciliationDecision::Queued => "queued",
            ReconciliationDecision::NoMatch => "no_match",
            ReconciliationDecision::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationOutcome {
    pub entity_id: Uuid,
    pub decision: ReconciliationDecision,
    pub link: Option<ExternalLink>,
    pub task_id: Option<Uuid>,
    pub best_score: Option<f64>,
}
