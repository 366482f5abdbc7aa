use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::capabilities::{retry::with_backoff_ms, LanguageModel};
use crate::errors::{CapabilityError, StageError};
use crate::models::EvidenceSpan;

lazy_static! {
    static ref IDENTIFIER_PATTERN: Regex = Regex::new(r"\b[A-Z]{2,10}-\d+\b").unwrap();
    static ref PROPER_NOUN_PATTERN: Regex =
        Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)+\b").unwrap();
    static ref ACRONYM_PATTERN: Regex = Regex::new(r"\b[A-Z]{2,10}\b").unwrap();
}

/// A typed span found in one chunk, offsets absolute into the source
/// document.
#[derive(Debug, Clone)]
pub struct RawMention {
    pub text: String,
    pub mention_type: String,
    pub confidence: f32,
    pub span: EvidenceSpan,
}

#[derive(Debug, Clone)]
pub enum RawObject {
    Label(String),
    Literal { value: Value, datatype: String },
}

/// A triple extracted from one chunk, subject and entity objects referenced
/// by surface label until the persister maps them to entity ids.
#[derive(Debug, Clone)]
pub struct RawRelation {
    pub subject: String,
    pub predicate: String,
    pub object: RawObject,
    pub confidence: f32,
}

#[derive(Deserialize)]
struct MentionOutput {
    mentions: Vec<ModelMention>,
}

#[derive(Deserialize)]
struct ModelMention {
    text: String,
    #[serde(rename = "type")]
    mention_type: String,
    confidence: f32,
    start: usize,
    end: usize,
}

#[derive(Deserialize)]
struct RelationOutput {
    relations: Vec<ModelRelation>,
}

#[derive(Deserialize)]
struct ModelRelation {
    subject: String,
    predicate: String,
    object: ModelObject,
    confidence: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
enum ModelObject {
    Entity { label: String },
    Literal { value: Value, datatype: String },
}

/// Finds typed entity mentions in a chunk. With a LanguageModel wired the
/// extraction is a structured generate call; without one a pattern fallback
/// catches proper nouns, acronyms and ticket-style identifiers.
pub struct MentionExtractor {
    model: Option<Arc<dyn LanguageModel>>,
    max_attempts: u32,
    retry_base_delay_ms: u64,
}

impl MentionExtractor {
    pub fn new(
        model: Option<Arc<dyn LanguageModel>>,
        max_attempts: u32,
        retry_base_delay_ms: u64,
    ) -> Self {
        Self {
            model,
            max_attempts,
            retry_base_delay_ms,
        }
    }

    pub async fn extract(
        &self,
        document_id: Uuid,
        chunk: &super::chunker::Chunk,
    ) -> Result<Vec<RawMention>, StageError> {
        match &self.model {
            Some(model) => {
                self.extract_with_model(model.as_ref(), document_id, chunk)
                    .await
            }
            None => Ok(extract_with_patterns(chunk)),
        }
    }

    async fn extract_with_model(
        &self,
        model: &dyn LanguageModel,
        document_id: Uuid,
        chunk: &super::chunker::Chunk,
    ) -> Result<Vec<RawMention>, StageError> {
        let prompt = format!(
            "Extract every entity mention from the text below. Report each \
             mention's exact text, its type, a confidence between 0 and 1, \
             and its character offsets within the text.\n\nText:\n{}",
            chunk.text
        );
        let schema = mention_schema();
        let value = with_backoff_ms(
            "extract mentions",
            self.max_attempts,
            self.retry_base_delay_ms,
            || model.generate(&prompt, &schema),
        )
        .await
        .map_err(|err| classify(document_id, "extracting", err))?;

        let parsed: MentionOutput = serde_json::from_value(value).map_err(|err| {
            StageError::Structural {
                document_id,
                message: format!("mention output does not match schema: {err}"),
            }
        })?;

        let mut out = Vec::with_capacity(parsed.mentions.len());
        for m in parsed.mentions {
            if m.start >= m.end || m.end > chunk.text.len() {
                return Err(StageError::Structural {
                    document_id,
                    message: format!("mention span {}..{} outside its chunk", m.start, m.end),
                });
            }
            out.push(RawMention {
                text: m.text,
                mention_type: m.mention_type,
                confidence: m.confidence.clamp(0.0, 1.0),
                span: EvidenceSpan {
                    start: chunk.start + m.start,
                    end: chunk.start + m.end,
                },
            });
        }
        Ok(out)
    }
}

/// Extracts subject-predicate-object triples. The pattern fallback emits
/// low-confidence co-occurrence edges between neighboring mentions so a
/// model-less composition still yields a connected graph.
pub struct RelationExtractor {
    model: Option<Arc<dyn LanguageModel>>,
    max_attempts: u32,
    retry_base_delay_ms: u64,
}

impl RelationExtractor {
    pub const FALLBACK_PREDICATE: &'static str = "co_occurs_with";

    pub fn new(
        model: Option<Arc<dyn LanguageModel>>,
        max_attempts: u32,
        retry_base_delay_ms: u64,
    ) -> Self {
        Self {
            model,
            max_attempts,
            retry_base_delay_ms,
        }
    }

    pub async fn extract(
        &self,
        document_id: Uuid,
        chunk: &super::chunker::Chunk,
        mentions: &[RawMention],
    ) -> Result<Vec<RawRelation>, StageError> {
        match &self.model {
            Some(model) => {
                self.extract_with_model(model.as_ref(), document_id, chunk, mentions)
                    .await
            }
            None => Ok(co_occurrences(mentions)),
        }
    }

    async fn extract_with_model(
        &self,
        model: &dyn LanguageModel,
        document_id: Uuid,
        chunk: &super::chunker::Chunk,
        mentions: &[RawMention],
    ) -> Result<Vec<RawRelation>, StageError> {
        let mention_list: Vec<&str> = mentions.iter().map(|m| m.text.as_str()).collect();
        let prompt = format!(
            "Given the text and the entity mentions found in it, extract \
             subject-predicate-object relations. Objects may be one of the \
             mentions or a typed literal value.\n\nMentions: {:?}\n\nText:\n{}",
            mention_list, chunk.text
        );
        let schema = relation_schema();
        let value = with_backoff_ms(
            "extract relations",
            self.max_attempts,
            self.retry_base_delay_ms,
            || model.generate(&prompt, &schema),
        )
        .await
        .map_err(|err| classify(document_id, "ingesting", err))?;

        let parsed: RelationOutput = serde_json::from_value(value).map_err(|err| {
            StageError::Structural {
                document_id,
                message: format!("relation output does not match schema: {err}"),
            }
        })?;

        Ok(parsed
            .relations
            .into_iter()
            .map(|r| RawRelation {
                subject: r.subject,
                predicate: r.predicate,
                object: match r.object {
                    ModelObject::Entity { label } => RawObject::Label(label),
                    ModelObject::Literal { value, datatype } => {
                        RawObject::Literal { value, datatype }
                    }
                },
                confidence: r.confidence.clamp(0.0, 1.0),
            })
            .collect())
    }
}

/// Capability failures during extraction: malformed structured output is a
/// document-level structural failure, everything else fails the stage.
fn classify(document_id: Uuid, stage: &'static str, err: CapabilityError) -> StageError {
    match err {
        CapabilityError::MalformedOutput(message) => StageError::Structural {
            document_id,
            message,
        },
        other => StageError::Transient {
            stage,
            source: other,
        },
    }
}

fn extract_with_patterns(chunk: &super::chunker::Chunk) -> Vec<RawMention> {
    let mut out: Vec<RawMention> = Vec::new();

    for m in IDENTIFIER_PATTERN.find_iter(&chunk.text) {
        out.push(pattern_mention(chunk, m, "identifier", 0.85));
    }
    for m in PROPER_NOUN_PATTERN.find_iter(&chunk.text) {
        out.push(pattern_mention(chunk, m, "named_entity", 0.75));
    }
    for m in ACRONYM_PATTERN.find_iter(&chunk.text) {
        let span = EvidenceSpan {
            start: chunk.start + m.start(),
            end: chunk.start + m.end(),
        };
        // Acronyms inside an identifier or name are already covered.
        if out.iter().any(|existing| overlaps(existing.span, span)) {
            continue;
        }
        out.push(pattern_mention(chunk, m, "acronym", 0.6));
    }

    out.sort_by_key(|m| m.span.start);
    out
}

fn pattern_mention(
    chunk: &super::chunker::Chunk,
    m: regex::Match<'_>,
    mention_type: &str,
    confidence: f32,
) -> RawMention {
    RawMention {
        text: m.as_str().to_string(),
        mention_type: mention_type.to_string(),
        confidence,
        span: EvidenceSpan {
            start: chunk.start + m.start(),
            end: chunk.start + m.end(),
        },
    }
}

fn overlaps(a: EvidenceSpan, b: EvidenceSpan) -> bool {
    a.start < b.end && b.start < a.end
}

fn co_occurrences(mentions: &[RawMention]) -> Vec<RawRelation> {
    let mut ordered: Vec<&RawMention> = mentions.iter().collect();
    ordered.sort_by_key(|m| m.span.start);
    ordered
        .windows(2)
        .filter(|pair| {
            crate::models::normalize_text(&pair[0].text)
                != crate::models::normalize_text(&pair[1].text)
        })
        .map(|pair| RawRelation {
            subject: pair[0].text.clone(),
            predicate: RelationExtractor::FALLBACK_PREDICATE.to_string(),
            object: RawObject::Label(pair[1].text.clone()),
            confidence: 0.5,
        })
        .collect()
}

fn mention_schema() -> Value {
    json!({
        "type": "object",
        "required": ["mentions"],
        "properties": {
            "mentions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["text", "type", "confidence", "start", "end"],
                    "properties": {
                        "text": { "type": "string" },
                        "type": { "type": "string" },
                        "confidence": { "type": "number" },
                        "start": { "type": "integer" },
                        "end": { "type": "integer" }
                    }
                }
            }
        }
    })
}

fn relation_schema() -> Value {
    json!({
        "type": "object",
        "required": ["relations"],
        "properties": {
            "relations": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["subject", "predicate", "object", "confidence"],
                    "properties": {
                        "subject": { "type": "string" },
                        "predicate": { "type": "string" },
                        "confidence": { "type": "number" },
                        "object": {
                            "type": "object",
                            "required": ["kind"],
                            "properties": {
                                "kind": { "enum": ["entity", "literal"] },
                                "label": { "type": "string" },
                                "value": {},
                                "datatype": { "type": "string" }
                            }
                        }
                    }
                }
            }
        }
    })
}
