use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::mention::normalize_text;

/// Document and batch ids an entity's evidence came from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Provenance {
    pub document_ids: Vec<Uuid>,
    pub batch_ids: Vec<Uuid>,
}

impl Provenance {
    pub fn record(&mut self, document_id: Uuid, batch_id: Uuid) {
        if !self.document_ids.contains(&document_id) {
            self.document_ids.push(document_id);
        }
        if !self.batch_ids.contains(&batch_id) {
            self.batch_ids.push(batch_id);
        }
    }

    pub fn merge(&mut self, other: &Provenance) {
        for doc in &other.document_ids {
            if !self.document_ids.contains(doc) {
                self.document_ids.push(*doc);
            }
        }
        for batch in &other.batch_ids {
            if !self.batch_ids.contains(batch) {
                self.batch_ids.push(*batch);
            }
        }
    }
}

/// Canonical graph node. Identity is stable once created: merges redirect
/// mentions and soft-delete the losing side, never hard-delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: Uuid,
    pub org_id: String,
    pub label: String,
    pub types: Vec<String>,
    pub attributes: serde_json::Map<String, Value>,
    pub grounding_confidence: f32,
    pub provenance: Provenance,
    pub embedding: Option<Vec<f32>>,
    pub deleted: bool,
    pub merged_into: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    pub fn new(org_id: impl Into<String>, label: impl Into<String>, types: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            org_id: org_id.into(),
            label: label.into(),
            types,
            attributes: serde_json::Map::new(),
            grounding_confidence: 0.0,
            provenance: Provenance::default(),
            embedding: None,
            deleted: false,
            merged_into: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn normalized_label(&self) -> String {
        normalize_text(&self.label)
    }

    /// Enrich the attribute map; existing values win over incoming ones.
    pub fn merge_attributes(&mut self, incoming: &serde_json::Map<String, Value>) {
        for (key, value) in incoming {
            self.attributes
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        self.updated_at = Utc::now();
    }

    /// Soft-delete marker set when this entity loses a merge.
    pub fn mark_merged_into(&mut self, target: Uuid) {
        self.deleted = true;
        self.merged_into = Some(target);
        self.updated_at = Utc::now();
    }
}
