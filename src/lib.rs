//! Knowledge extraction, entity resolution and graph retrieval engine.
//!
//! Documents go through a six-stage resumable pipeline (chunk, extract,
//! resolve, validate, ingest), mentions are deduplicated into canonical
//! entities within and across batches, entities can be reconciled against an
//! external catalog, and queries are answered by fusing embedding similarity
//! with multi-hop graph traversal into an evidence-linked context bundle.

pub mod capabilities;
pub mod config;
pub mod engine;
pub mod errors;
pub mod graph_rag;
pub mod models;
pub mod pipeline;
pub mod reconciliation;
pub mod resolution;
pub mod storage;

pub use capabilities::{
    EmbeddingProvider, ExternalEntityCatalog, LanguageModel, NoopCatalog, OntologyIndex,
    StaticOntology, TypeNode,
};
pub use config::{GraphRagConfig, PipelineConfig, ReconciliationConfig, ResolutionConfig};
pub use engine::{EngineConfig, KnowledgeEngine};
pub use errors::{GraphFuseError, GraphFuseResult};
pub use graph_rag::GraphRagService;
pub use models::{
    BatchReport, BatchStage, BatchStatus, ContextBundle, ContextEntry, Entity, EvidenceSpan,
    ExternalLink, MentionRecord, MergeReason, MergeRecord, ReconciliationDecision,
    ReconciliationOutcome, Relation, RelationObject, ResolutionReport, SupportLevel,
    VerificationTask,
};
pub use pipeline::{DocumentInput, ExtractionPipeline};
pub use reconciliation::ReconciliationService;
pub use resolution::{CrossBatchResolver, EntityRegistry, WithinBatchResolver};
pub use storage::{GraphStore, MemoryStore};
