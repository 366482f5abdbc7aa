use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::mention::EvidenceSpan;

/// How a surfaced claim is backed by the graph. Unsupported claims are
/// flagged in the bundle, never silently dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportLevel {
    Direct,
    Inferred,
    Unsupported,
}

impl SupportLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupportLevel::Direct => "direct",
            SupportLevel::Inferred => "inferred",
            SupportLevel::Unsupported => "unsupported",
        }
    }
}

/// Pointer from a context entry back to its supporting graph evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub relation_id: Uuid,
    pub predicate: String,
    pub mention_id: Option<Uuid>,
    pub span: Option<EvidenceSpan>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextEntry {
    pub entity_id: Uuid,
    pub label: String,
    pub score: f32,
    pub hop_depth: usize,
    pub text: String,
    pub citations: Vec<Citation>,
    pub support: SupportLevel,
    pub support_confidence: f32,
}

/// Evidence-linked answer context for one GraphRAG query.
#[derive(Debug, Clone, Serialize)]
pub struct ContextBundle {
    pub query: String,
    pub entries: Vec<ContextEntry>,
    /// True when lower-ranked candidates were cut by the character budget.
    pub truncated: bool,
}
