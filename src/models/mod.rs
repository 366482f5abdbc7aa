pub mod batch;
pub mod context;
pub mod entity;
pub mod mention;
pub mod merge;
pub mod reconciliation;
pub mod relation;
pub mod report;

pub use batch::{BatchStage, BatchStatus};
pub use context::{Citation, ContextBundle, ContextEntry, SupportLevel};
pub use entity::{Entity, Provenance};
pub use mention::{normalize_text, EvidenceSpan, MentionRecord};
pub use merge::{MergeReason, MergeRecord};
pub use reconciliation::{
    CatalogCandidate, ExternalLink, ReconciliationDecision, ReconciliationOutcome, TaskStatus,
    VerificationTask,
};
pub use relation::{Relation, RelationObject};
pub use report::{BatchReport, ResolutionReport};
