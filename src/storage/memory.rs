use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::{PersistenceError, PersistenceResult};
use crate::models::{
    BatchStatus, Entity, ExternalLink, MentionRecord, MergeRecord, Relation, VerificationTask,
};

use super::{
    BatchStatusRepository, EntityRepository, ExternalLinkRepository, MentionRepository,
    MergeHistoryRepository, RelationRepository, VerificationTaskRepository,
};

/// In-memory backend for tests and single-process composition. Implements
/// every repository trait over RwLock-guarded maps; the version check on
/// verification tasks mirrors the Postgres compare-and-update.
#[derive(Default)]
pub struct MemoryStore {
    entities: RwLock<HashMap<Uuid, Entity>>,
    relations: RwLock<Vec<Relation>>,
    mentions: RwLock<HashMap<Uuid, MentionRecord>>,
    merges: RwLock<Vec<MergeRecord>>,
    tasks: RwLock<HashMap<Uuid, VerificationTask>>,
    links: RwLock<HashMap<Uuid, ExternalLink>>,
    batches: RwLock<HashMap<Uuid, BatchStatus>>,
}

#[async_trait]
impl EntityRepository for MemoryStore {
    async fn insert(&self, entity: &Entity) -> PersistenceResult<()> {
        self.entities
            .write()
            .await
            .insert(entity.id, entity.clone());
        Ok(())
    }

    async fn update(&self, entity: &Entity) -> PersistenceResult<()> {
        let mut entities = self.entities.write().await;
        if !entities.contains_key(&entity.id) {
            return Err(PersistenceError::NotFound(format!("entity {}", entity.id)));
        }
        entities.insert(entity.id, entity.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> PersistenceResult<Option<Entity>> {
        Ok(self.entities.read().await.get(&id).cloned())
    }

    async fn list_by_org(&self, org_id: &str) -> PersistenceResult<Vec<Entity>> {
        let mut result: Vec<Entity> = self
            .entities
            .read()
            .await
            .values()
            .filter(|e| e.org_id == org_id && !e.deleted)
            .cloned()
            .collect();
        result.sort_by_key(|e| e.id);
        Ok(result)
    }
}

#[async_trait]
impl RelationRepository for MemoryStore {
    async fn insert(&self, relation: &Relation) -> PersistenceResult<()> {
        self.relations.write().await.push(relation.clone());
        Ok(())
    }

    async fn list_by_entity(&self, entity_id: Uuid) -> PersistenceResult<Vec<Relation>> {
        Ok(self
            .relations
            .read()
            .await
            .iter()
            .filter(|r| r.touches(entity_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MentionRepository for MemoryStore {
    async fn insert(&self, mention: &MentionRecord) -> PersistenceResult<()> {
        self.mentions
            .write()
            .await
            .insert(mention.id, mention.clone());
        Ok(())
    }

    async fn update(&self, mention: &MentionRecord) -> PersistenceResult<()> {
        let mut mentions = self.mentions.write().await;
        if !mentions.contains_key(&mention.id) {
            return Err(PersistenceError::NotFound(format!("mention {}", mention.id)));
        }
        mentions.insert(mention.id, mention.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> PersistenceResult<Option<MentionRecord>> {
        Ok(self.mentions.read().await.get(&id).cloned())
    }

    async fn list_by_batch(&self, batch_id: Uuid) -> PersistenceResult<Vec<MentionRecord>> {
        let mut result: Vec<MentionRecord> = self
            .mentions
            .read()
            .await
            .values()
            .filter(|m| m.batch_id == batch_id)
            .cloned()
            .collect();
        result.sort_by_key(|m| m.id);
        Ok(result)
    }
}

#[async_trait]
impl MergeHistoryRepository for MemoryStore {
    async fn append(&self, record: &MergeRecord) -> PersistenceResult<()> {
        self.merges.write().await.push(record.clone());
        Ok(())
    }

    async fn list_for_entity(&self, entity_id: Uuid) -> PersistenceResult<Vec<MergeRecord>> {
        Ok(self
            .merges
            .read()
            .await
            .iter()
            .filter(|m| m.source_entity_id == entity_id || m.target_entity_id == entity_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl VerificationTaskRepository for MemoryStore {
    async fn insert(&self, task: &VerificationTask) -> PersistenceResult<()> {
        self.tasks.write().await.insert(task.id, task.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> PersistenceResult<Option<VerificationTask>> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn update_with_version(
        &self,
        task: &VerificationTask,
        expected_version: u64,
    ) -> PersistenceResult<()> {
        let mut tasks = self.tasks.write().await;
        let stored = tasks
            .get(&task.id)
            .ok_or_else(|| PersistenceError::NotFound(format!("task {}", task.id)))?;
        if stored.version != expected_version {
            return Err(PersistenceError::Conflict {
                record: format!("task {}", task.id),
                expected: expected_version,
                found: stored.version,
            });
        }
        tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn list_pending(&self) -> PersistenceResult<Vec<VerificationTask>> {
        let mut result: Vec<VerificationTask> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| !t.status.is_terminal())
            .cloned()
            .collect();
        result.sort_by_key(|t| t.id);
        Ok(result)
    }
}

#[async_trait]
impl ExternalLinkRepository for MemoryStore {
    async fn insert_if_absent(&self, link: &ExternalLink) -> PersistenceResult<bool> {
        let mut links = self.links.write().await;
        if links.contains_key(&link.entity_id) {
            return Ok(false);
        }
        links.insert(link.entity_id, link.clone());
        Ok(true)
    }

    async fn find(&self, entity_id: Uuid) -> PersistenceResult<Option<ExternalLink>> {
        Ok(self.links.read().await.get(&entity_id).cloned())
    }
}

#[async_trait]
impl BatchStatusRepository for MemoryStore {
    async fn upsert(&self, status: &BatchStatus) -> PersistenceResult<()> {
        self.batches
            .write()
            .await
            .insert(status.batch_id, status.clone());
        Ok(())
    }

    async fn find(&self, batch_id: Uuid) -> PersistenceResult<Option<BatchStatus>> {
        Ok(self.batches.read().await.get(&batch_id).cloned())
    }
}
