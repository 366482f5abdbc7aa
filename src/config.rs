use serde::{Deserialize, Serialize};

/// Extraction pipeline limits and retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Hard cap on documents accepted into one batch.
    pub max_documents_per_batch: usize,
    /// Documents processed concurrently during extraction.
    pub document_concurrency: usize,
    /// Maximum chunk size in characters.
    pub max_chunk_chars: usize,
    /// Attempts per capability call before the failure surfaces as a stage failure.
    pub max_attempts: u32,
    /// Base delay for exponential backoff between retries.
    pub retry_base_delay_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_documents_per_batch: 25,
            document_concurrency: 4,
            max_chunk_chars: 1200,
            max_attempts: 3,
            retry_base_delay_ms: 200,
        }
    }
}

/// Thresholds and weights for within-batch clustering and cross-batch linking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Cosine similarity cutoff for single-linkage clustering within a batch.
    pub cluster_threshold: f32,
    /// Minimum blended score to link a mention to a persisted entity.
    pub link_threshold: f32,
    /// Weight of embedding cosine similarity in the blended score.
    pub embedding_weight: f32,
    /// Weight of label similarity in the blended score.
    pub label_weight: f32,
    /// Maximum ranked candidates returned by a registry lookup.
    pub max_candidates: usize,
    /// Mentions resolved concurrently during cross-batch resolution.
    pub mention_fanout: usize,
    /// Expected entity population per scope, sizes the negative filter.
    pub filter_capacity: usize,
    /// Acceptable false-positive rate for the negative filter.
    pub filter_fp_rate: f64,
    /// Attempts per embedding call before a mention is left unresolved.
    pub max_attempts: u32,
    /// Base delay for exponential backoff between retries.
    pub retry_base_delay_ms: u64,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            cluster_threshold: 0.85,
            link_threshold: 0.80,
            embedding_weight: 0.7,
            label_weight: 0.3,
            max_candidates: 10,
            mention_fanout: 5,
            filter_capacity: 100_000,
            filter_fp_rate: 0.01,
            max_attempts: 3,
            retry_base_delay_ms: 200,
        }
    }
}

/// Threshold policy for reconciling entities against the external catalog.
/// Scores are on the catalog's 0-100 scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    pub auto_link_threshold: f64,
    pub queue_threshold: f64,
    pub max_candidates: usize,
    pub language: String,
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            auto_link_threshold: 90.0,
            queue_threshold: 50.0,
            max_candidates: 5,
            language: "en".to_string(),
            max_attempts: 3,
            retry_base_delay_ms: 200,
        }
    }
}

/// Retrieval parameters for GraphRAG queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphRagConfig {
    /// Smoothing constant for reciprocal rank fusion.
    pub k_rrf: f32,
    /// Default seed count when the caller does not specify k.
    pub default_k: usize,
    /// Default traversal depth when the caller does not specify one.
    pub default_max_hops: usize,
    /// Character budget for the formatted context.
    pub context_char_budget: usize,
    /// Per-hop confidence penalty applied to inferred claims.
    pub hop_penalty: f32,
    /// Attempts per embedding call before the query fails.
    pub max_attempts: u32,
    /// Base delay for exponential backoff between retries.
    pub retry_base_delay_ms: u64,
}

impl Default for GraphRagConfig {
    fn default() -> Self {
        Self {
            k_rrf: 60.0,
            default_k: 8,
            default_max_hops: 2,
            context_char_budget: 4000,
            hop_penalty: 0.7,
            max_attempts: 3,
            retry_base_delay_ms: 200,
        }
    }
}
