use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Character offsets of a mention into its source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceSpan {
    pub start: usize,
    pub end: usize,
}

/// Raw extraction evidence: a text span identified as referring to an entity.
/// Created during extraction, mutated only by resolvers (setting
/// `resolved_entity_id`), never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentionRecord {
    pub id: Uuid,
    pub document_id: Uuid,
    pub batch_id: Uuid,
    pub text: String,
    pub mention_type: String,
    pub confidence: f32,
    pub resolved_entity_id: Option<Uuid>,
    pub span: EvidenceSpan,
    pub created_at: DateTime<Utc>,
}

impl MentionRecord {
    pub fn new(
        document_id: Uuid,
        batch_id: Uuid,
        text: impl Into<String>,
        mention_type: impl Into<String>,
        confidence: f32,
        span: EvidenceSpan,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            batch_id,
            text: text.into(),
            mention_type: mention_type.into(),
            confidence,
            resolved_entity_id: None,
            span,
            created_at: Utc::now(),
        }
    }

    /// Lowercased, whitespace-collapsed text used for signatures and
    /// exact-duplicate detection.
    pub fn normalized_text(&self) -> String {
        normalize_text(&self.text)
    }
}

pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
