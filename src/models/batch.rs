use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Last completed pipeline stage for a batch. Ordering follows declaration:
/// a batch resumes from the first stage greater than the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStage {
    Pending,
    Preprocessing,
    Extracting,
    Resolving,
    Validating,
    Ingesting,
    Done,
    Failed,
}

impl BatchStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStage::Pending => "pending",
            BatchStage::Preprocessing => "preprocessing",
            BatchStage::Extracting => "extracting",
            BatchStage::Resolving => "resolving",
            BatchStage::Validating => "validating",
            BatchStage::Ingesting => "ingesting",
            BatchStage::Done => "done",
            BatchStage::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BatchStage::Pending),
            "preprocessing" => Some(BatchStage::Preprocessing),
            "extracting" => Some(BatchStage::Extracting),
            "resolving" => Some(BatchStage::Resolving),
            "validating" => Some(BatchStage::Validating),
            "ingesting" => Some(BatchStage::Ingesting),
            "done" => Some(BatchStage::Done),
            "failed" => Some(BatchStage::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchStage::Done | BatchStage::Failed)
    }
}

/// Checkpoint persisted after every completed stage so the durability layer
/// can resume a batch from its last good stage. `stage` is the current state
/// (including `Failed`); `completed` is the last stage that finished, which
/// survives a failure and is the resume point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStatus {
    pub batch_id: Uuid,
    pub org_id: String,
    pub stage: BatchStage,
    pub completed: BatchStage,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl BatchStatus {
    pub fn new(batch_id: Uuid, org_id: impl Into<String>) -> Self {
        Self {
            batch_id,
            org_id: org_id.into(),
            stage: BatchStage::Pending,
            completed: BatchStage::Pending,
            error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn advance(&mut self, stage: BatchStage) {
        self.stage = stage;
        self.completed = stage;
        self.error = None;
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.stage = BatchStage::Failed;
        self.error = Some(error.into());
        self.updated_at = Utc::now();
    }
}
