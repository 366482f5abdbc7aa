use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeReason {
    CrossBatchMatch,
    WithinBatchCluster,
    ManualVerification,
}

impl MergeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeReason::CrossBatchMatch => "cross_batch_match",
            MergeReason::WithinBatchCluster => "within_batch_cluster",
            MergeReason::ManualVerification => "manual_verification",
        }
    }
}

/// Append-only audit row. Exactly one is written whenever a mention's
/// resolved entity changes to a different entity than previously recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRecord {
    pub id: Uuid,
    pub source_entity_id: Uuid,
    pub target_entity_id: Uuid,
    pub reason: MergeReason,
    pub confidence: f32,
    pub merged_at: DateTime<Utc>,
}

impl MergeRecord {
    pub fn new(
        source_entity_id: Uuid,
        target_entity_id: Uuid,
        reason: MergeReason,
        confidence: f32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_entity_id,
            target_entity_id,
            reason,
            confidence,
            merged_at: Utc::now(),
        }
    }
}
