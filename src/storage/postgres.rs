use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::{PersistenceError, PersistenceResult};
use crate::models::{
    BatchStage, BatchStatus, Entity, ExternalLink, MentionRecord, MergeRecord, Provenance,
    Relation, RelationObject, TaskStatus, VerificationTask,
};

use super::{
    BatchStatusRepository, EntityRepository, ExternalLinkRepository, MentionRepository,
    MergeHistoryRepository, RelationRepository, VerificationTaskRepository,
};

/// Postgres backend. Structured fields (types, attributes, provenance,
/// embeddings, candidate lists) are stored as jsonb.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS gf_entities (
        id UUID PRIMARY KEY,
        org_id TEXT NOT NULL,
        label TEXT NOT NULL,
        types JSONB NOT NULL,
        attributes JSONB NOT NULL,
        grounding_confidence REAL NOT NULL,
        provenance JSONB NOT NULL,
        embedding JSONB,
        deleted BOOLEAN NOT NULL DEFAULT FALSE,
        merged_into UUID,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS gf_relations (
        id UUID PRIMARY KEY,
        subject_id UUID NOT NULL,
        predicate TEXT NOT NULL,
        object JSONB NOT NULL,
        object_entity_id UUID,
        confidence REAL NOT NULL,
        evidence JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS gf_mentions (
        id UUID PRIMARY KEY,
        document_id UUID NOT NULL,
        batch_id UUID NOT NULL,
        text TEXT NOT NULL,
        mention_type TEXT NOT NULL,
        confidence REAL NOT NULL,
        resolved_entity_id UUID,
        span_start BIGINT NOT NULL,
        span_end BIGINT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS gf_merge_history (
        id UUID PRIMARY KEY,
        source_entity_id UUID NOT NULL,
        target_entity_id UUID NOT NULL,
        reason TEXT NOT NULL,
        confidence REAL NOT NULL,
        merged_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS gf_verification_tasks (
        id UUID PRIMARY KEY,
        entity_id UUID NOT NULL,
        entity_label TEXT NOT NULL,
        candidates JSONB NOT NULL,
        status TEXT NOT NULL,
        chosen_candidate_id TEXT,
        version BIGINT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS gf_external_links (
        entity_id UUID PRIMARY KEY,
        external_id TEXT NOT NULL,
        canonical_uri TEXT NOT NULL,
        linked_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS gf_batch_status (
        batch_id UUID PRIMARY KEY,
        org_id TEXT NOT NULL,
        stage TEXT NOT NULL,
        completed TEXT NOT NULL,
        error TEXT,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
];

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the backing tables when they do not exist yet.
    pub async fn ensure_schema(&self) -> PersistenceResult<()> {
        for ddl in SCHEMA {
            sqlx::query(ddl).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[derive(FromRow)]
struct EntityRow {
    id: Uuid,
    org_id: String,
    label: String,
    types: serde_json::Value,
    attributes: serde_json::Value,
    grounding_confidence: f32,
    provenance: serde_json::Value,
    embedding: Option<serde_json::Value>,
    deleted: bool,
    merged_into: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EntityRow {
    fn into_entity(self) -> PersistenceResult<Entity> {
        let types: Vec<String> = serde_json::from_value(self.types)
            .map_err(|e| PersistenceError::Backend(format!("corrupt entity types: {e}")))?;
        let attributes = match self.attributes {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        let provenance: Provenance = serde_json::from_value(self.provenance)
            .map_err(|e| PersistenceError::Backend(format!("corrupt provenance: {e}")))?;
        let embedding = match self.embedding {
            Some(value) => Some(
                serde_json::from_value(value)
                    .map_err(|e| PersistenceError::Backend(format!("corrupt embedding: {e}")))?,
            ),
            None => None,
        };
        Ok(Entity {
            id: self.id,
            org_id: self.org_id,
            label: self.label,
            types,
            attributes,
            grounding_confidence: self.grounding_confidence,
            provenance,
            embedding,
            deleted: self.deleted,
            merged_into: self.merged_into,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[async_trait]
impl EntityRepository for PostgresStore {
    async fn insert(&self, entity: &Entity) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO gf_entities
            (id, org_id, label, types, attributes, grounding_confidence, provenance,
             embedding, deleted, merged_into, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(entity.id)
        .bind(&entity.org_id)
        .bind(&entity.label)
        .bind(serde_json::to_value(&entity.types).unwrap_or_default())
        .bind(serde_json::Value::Object(entity.attributes.clone()))
        .bind(entity.grounding_confidence)
        .bind(serde_json::to_value(&entity.provenance).unwrap_or_default())
        .bind(entity.embedding.as_ref().map(|e| serde_json::to_value(e).unwrap_or_default()))
        .bind(entity.deleted)
        .bind(entity.merged_into)
        .bind(entity.created_at)
        .bind(entity.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, entity: &Entity) -> PersistenceResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE gf_entities
            SET label = $2, types = $3, attributes = $4, grounding_confidence = $5,
                provenance = $6, embedding = $7, deleted = $8, merged_into = $9,
                updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(entity.id)
        .bind(&entity.label)
        .bind(serde_json::to_value(&entity.types).unwrap_or_default())
        .bind(serde_json::Value::Object(entity.attributes.clone()))
        .bind(entity.grounding_confidence)
        .bind(serde_json::to_value(&entity.provenance).unwrap_or_default())
        .bind(entity.embedding.as_ref().map(|e| serde_json::to_value(e).unwrap_or_default()))
        .bind(entity.deleted)
        .bind(entity.merged_into)
        .bind(entity.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(PersistenceError::NotFound(format!("entity {}", entity.id)));
        }
        Ok(())
    }

    async fn find(&self, id: Uuid) -> PersistenceResult<Option<Entity>> {
        let row = sqlx::query_as::<_, EntityRow>("SELECT * FROM gf_entities WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(EntityRow::into_entity).transpose()
    }

    async fn list_by_org(&self, org_id: &str) -> PersistenceResult<Vec<Entity>> {
        let rows = sqlx::query_as::<_, EntityRow>(
            "SELECT * FROM gf_entities WHERE org_id = $1 AND deleted = FALSE ORDER BY id",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(EntityRow::into_entity).collect()
    }
}

#[derive(FromRow)]
struct RelationRow {
    id: Uuid,
    subject_id: Uuid,
    predicate: String,
    object: serde_json::Value,
    confidence: f32,
    evidence: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl RelationRow {
    fn into_relation(self) -> PersistenceResult<Relation> {
        let object: RelationObject = serde_json::from_value(self.object)
            .map_err(|e| PersistenceError::Backend(format!("corrupt relation object: {e}")))?;
        let evidence: Vec<Uuid> = serde_json::from_value(self.evidence)
            .map_err(|e| PersistenceError::Backend(format!("corrupt evidence: {e}")))?;
        Ok(Relation {
            id: self.id,
            subject_id: self.subject_id,
            predicate: self.predicate,
            object,
            confidence: self.confidence,
            evidence,
            created_at: self.created_at,
        })
    }
}

#[async_trait]
impl RelationRepository for PostgresStore {
    async fn insert(&self, relation: &Relation) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO gf_relations
            (id, subject_id, predicate, object, object_entity_id, confidence, evidence, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(relation.id)
        .bind(relation.subject_id)
        .bind(&relation.predicate)
        .bind(serde_json::to_value(&relation.object).unwrap_or_default())
        .bind(relation.object_entity_id())
        .bind(relation.confidence)
        .bind(serde_json::to_value(&relation.evidence).unwrap_or_default())
        .bind(relation.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_by_entity(&self, entity_id: Uuid) -> PersistenceResult<Vec<Relation>> {
        let rows = sqlx::query_as::<_, RelationRow>(
            r#"
            SELECT id, subject_id, predicate, object, confidence, evidence, created_at
            FROM gf_relations
            WHERE subject_id = $1 OR object_entity_id = $1
            ORDER BY id
            "#,
        )
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(RelationRow::into_relation).collect()
    }
}

#[derive(FromRow)]
struct MentionRow {
    id: Uuid,
    document_id: Uuid,
    batch_id: Uuid,
    text: String,
    mention_type: String,
    confidence: f32,
    resolved_entity_id: Option<Uuid>,
    span_start: i64,
    span_end: i64,
    created_at: DateTime<Utc>,
}

impl MentionRow {
    fn into_mention(self) -> MentionRecord {
        MentionRecord {
            id: self.id,
            document_id: self.document_id,
            batch_id: self.batch_id,
            text: self.text,
            mention_type: self.mention_type,
            confidence: self.confidence,
            resolved_entity_id: self.resolved_entity_id,
            span: crate::models::EvidenceSpan {
                start: self.span_start as usize,
                end: self.span_end as usize,
            },
            created_at: self.created_at,
        }
    }
}

#[async_trait]
impl MentionRepository for PostgresStore {
    async fn insert(&self, mention: &MentionRecord) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO gf_mentions
            (id, document_id, batch_id, text, mention_type, confidence,
             resolved_entity_id, span_start, span_end, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(mention.id)
        .bind(mention.document_id)
        .bind(mention.batch_id)
        .bind(&mention.text)
        .bind(&mention.mention_type)
        .bind(mention.confidence)
        .bind(mention.resolved_entity_id)
        .bind(mention.span.start as i64)
        .bind(mention.span.end as i64)
        .bind(mention.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, mention: &MentionRecord) -> PersistenceResult<()> {
        let result = sqlx::query(
            "UPDATE gf_mentions SET resolved_entity_id = $2, confidence = $3 WHERE id = $1",
        )
        .bind(mention.id)
        .bind(mention.resolved_entity_id)
        .bind(mention.confidence)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(PersistenceError::NotFound(format!("mention {}", mention.id)));
        }
        Ok(())
    }

    async fn find(&self, id: Uuid) -> PersistenceResult<Option<MentionRecord>> {
        let row = sqlx::query_as::<_, MentionRow>("SELECT * FROM gf_mentions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(MentionRow::into_mention))
    }

    async fn list_by_batch(&self, batch_id: Uuid) -> PersistenceResult<Vec<MentionRecord>> {
        let rows = sqlx::query_as::<_, MentionRow>(
            "SELECT * FROM gf_mentions WHERE batch_id = $1 ORDER BY id",
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(MentionRow::into_mention).collect())
    }
}

#[async_trait]
impl MergeHistoryRepository for PostgresStore {
    async fn append(&self, record: &MergeRecord) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO gf_merge_history
            (id, source_entity_id, target_entity_id, reason, confidence, merged_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id)
        .bind(record.source_entity_id)
        .bind(record.target_entity_id)
        .bind(record.reason.as_str())
        .bind(record.confidence)
        .bind(record.merged_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_for_entity(&self, entity_id: Uuid) -> PersistenceResult<Vec<MergeRecord>> {
        #[derive(FromRow)]
        struct Row {
            id: Uuid,
            source_entity_id: Uuid,
            target_entity_id: Uuid,
            reason: String,
            confidence: f32,
            merged_at: DateTime<Utc>,
        }
        let rows = sqlx::query_as::<_, Row>(
            r#"
            SELECT * FROM gf_merge_history
            WHERE source_entity_id = $1 OR target_entity_id = $1
            ORDER BY merged_at
            "#,
        )
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| {
                let reason = match r.reason.as_str() {
                    "within_batch_cluster" => crate::models::MergeReason::WithinBatchCluster,
                    "manual_verification" => crate::models::MergeReason::ManualVerification,
                    _ => crate::models::MergeReason::CrossBatchMatch,
                };
                Ok(MergeRecord {
                    id: r.id,
                    source_entity_id: r.source_entity_id,
                    target_entity_id: r.target_entity_id,
                    reason,
                    confidence: r.confidence,
                    merged_at: r.merged_at,
                })
            })
            .collect()
    }
}

#[derive(FromRow)]
struct TaskRow {
    id: Uuid,
    entity_id: Uuid,
    entity_label: String,
    candidates: serde_json::Value,
    status: String,
    chosen_candidate_id: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TaskRow {
    fn into_task(self) -> PersistenceResult<VerificationTask> {
        let candidates = serde_json::from_value(self.candidates)
            .map_err(|e| PersistenceError::Backend(format!("corrupt candidates: {e}")))?;
        let status = match self.status.as_str() {
            "approved" => TaskStatus::Approved,
            "rejected" => TaskStatus::Rejected,
            _ => TaskStatus::Pending,
        };
        Ok(VerificationTask {
            id: self.id,
            entity_id: self.entity_id,
            entity_label: self.entity_label,
            candidates,
            status,
            chosen_candidate_id: self.chosen_candidate_id,
            version: self.version as u64,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[async_trait]
impl VerificationTaskRepository for PostgresStore {
    async fn insert(&self, task: &VerificationTask) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO gf_verification_tasks
            (id, entity_id, entity_label, candidates, status, chosen_candidate_id,
             version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(task.id)
        .bind(task.entity_id)
        .bind(&task.entity_label)
        .bind(serde_json::to_value(&task.candidates).unwrap_or_default())
        .bind(task.status.as_str())
        .bind(&task.chosen_candidate_id)
        .bind(task.version as i64)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> PersistenceResult<Option<VerificationTask>> {
        let row =
            sqlx::query_as::<_, TaskRow>("SELECT * FROM gf_verification_tasks WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(TaskRow::into_task).transpose()
    }

    async fn update_with_version(
        &self,
        task: &VerificationTask,
        expected_version: u64,
    ) -> PersistenceResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE gf_verification_tasks
            SET status = $2, chosen_candidate_id = $3, version = $4, updated_at = $5
            WHERE id = $1 AND version = $6
            "#,
        )
        .bind(task.id)
        .bind(task.status.as_str())
        .bind(&task.chosen_candidate_id)
        .bind(task.version as i64)
        .bind(task.updated_at)
        .bind(expected_version as i64)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            let found = sqlx::query_scalar::<_, i64>(
                "SELECT version FROM gf_verification_tasks WHERE id = $1",
            )
            .bind(task.id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PersistenceError::NotFound(format!("task {}", task.id)))?;
            return Err(PersistenceError::Conflict {
                record: format!("task {}", task.id),
                expected: expected_version,
                found: found as u64,
            });
        }
        Ok(())
    }

    async fn list_pending(&self) -> PersistenceResult<Vec<VerificationTask>> {
        let rows = sqlx::query_as::<_, TaskRow>(
            "SELECT * FROM gf_verification_tasks WHERE status = 'pending' ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TaskRow::into_task).collect()
    }
}

#[async_trait]
impl ExternalLinkRepository for PostgresStore {
    async fn insert_if_absent(&self, link: &ExternalLink) -> PersistenceResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO gf_external_links (entity_id, external_id, canonical_uri, linked_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (entity_id) DO NOTHING
            "#,
        )
        .bind(link.entity_id)
        .bind(&link.external_id)
        .bind(&link.canonical_uri)
        .bind(link.linked_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, entity_id: Uuid) -> PersistenceResult<Option<ExternalLink>> {
        #[derive(FromRow)]
        struct Row {
            entity_id: Uuid,
            external_id: String,
            canonical_uri: String,
            linked_at: DateTime<Utc>,
        }
        let row = sqlx::query_as::<_, Row>(
            "SELECT * FROM gf_external_links WHERE entity_id = $1",
        )
        .bind(entity_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| ExternalLink {
            entity_id: r.entity_id,
            external_id: r.external_id,
            canonical_uri: r.canonical_uri,
            linked_at: r.linked_at,
        }))
    }
}

#[async_trait]
impl BatchStatusRepository for PostgresStore {
    async fn upsert(&self, status: &BatchStatus) -> PersistenceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO gf_batch_status (batch_id, org_id, stage, completed, error, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (batch_id)
            DO UPDATE SET stage = $3, completed = $4, error = $5, updated_at = $6
            "#,
        )
        .bind(status.batch_id)
        .bind(&status.org_id)
        .bind(status.stage.as_str())
        .bind(status.completed.as_str())
        .bind(&status.error)
        .bind(status.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, batch_id: Uuid) -> PersistenceResult<Option<BatchStatus>> {
        #[derive(FromRow)]
        struct Row {
            batch_id: Uuid,
            org_id: String,
            stage: String,
            completed: String,
            error: Option<String>,
            updated_at: DateTime<Utc>,
        }
        let row = sqlx::query_as::<_, Row>("SELECT * FROM gf_batch_status WHERE batch_id = $1")
            .bind(batch_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| BatchStatus {
            batch_id: r.batch_id,
            org_id: r.org_id,
            stage: BatchStage::from_str(&r.stage).unwrap_or(BatchStage::Pending),
            completed: BatchStage::from_str(&r.completed).unwrap_or(BatchStage::Pending),
            error: r.error,
            updated_at: r.updated_at,
        }))
    }
}
