use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Object side of a triple: another entity, or a typed literal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RelationObject {
    Entity { id: Uuid },
    Literal { value: Value, datatype: String },
}

/// Subject-predicate-object edge with confidence and evidence mention ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub predicate: String,
    pub object: RelationObject,
    pub confidence: f32,
    pub evidence: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Relation {
    pub fn new(
        subject_id: Uuid,
        predicate: impl Into<String>,
        object: RelationObject,
        confidence: f32,
        evidence: Vec<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject_id,
            predicate: predicate.into(),
            object,
            confidence,
            evidence,
            created_at: Utc::now(),
        }
    }

    pub fn object_entity_id(&self) -> Option<Uuid> {
        match &self.object {
            RelationObject::Entity { id } => Some(*id),
            RelationObject::Literal { .. } => None,
        }
    }

    pub fn touches(&self, entity_id: Uuid) -> bool {
        self.subject_id == entity_id || self.object_entity_id() == Some(entity_id)
    }
}
