use serde::Serialize;
use uuid::Uuid;

/// Outcome counts for one cross-batch resolution pass. `failed` lists the
/// mention ids left unresolved by the partial-failure policy so callers can
/// re-submit them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolutionReport {
    pub total: usize,
    pub linked: usize,
    pub created: usize,
    pub merged: usize,
    pub failed: Vec<Uuid>,
}

/// What one pipeline run did to a batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub batch_id: Option<Uuid>,
    pub documents: usize,
    pub chunks: usize,
    pub mentions: usize,
    pub entities: usize,
    pub relations: usize,
    pub skipped_documents: Vec<Uuid>,
    pub resolution: ResolutionReport,
}
