pub mod catalog;
pub mod ontology;
pub mod retry;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::CapabilityResult;
use crate::models::CatalogCandidate;

pub use catalog::NoopCatalog;
pub use ontology::{StaticOntology, TypeNode};
pub use retry::with_backoff;

/// Turns text into a vector. Calls are suspension points; transient failures
/// are retried by the caller with backoff.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> CapabilityResult<Vec<f32>>;
}

/// Structured extraction capability. `output_schema` describes the JSON the
/// model must return; anything that does not parse against it is a
/// structural failure for the unit being extracted.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str, output_schema: &Value) -> CapabilityResult<Value>;
}

/// External authority catalog used by reconciliation. Scores are 0-100.
#[async_trait]
pub trait ExternalEntityCatalog: Send + Sync {
    async fn search_entities(
        &self,
        label: &str,
        language: &str,
        limit: usize,
    ) -> CapabilityResult<Vec<CatalogCandidate>>;
}

/// Controlled-vocabulary lookups used for grounding.
pub trait OntologyIndex: Send + Sync {
    fn class_hierarchy(&self) -> TypeNode;
    fn is_valid_type(&self, iri: &str) -> bool;
}
