pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::PersistenceResult;
use crate::models::{
    BatchStatus, Entity, ExternalLink, MentionRecord, MergeRecord, Relation, VerificationTask,
};

pub use memory::MemoryStore;

#[async_trait]
pub trait EntityRepository: Send + Sync {
    async fn insert(&self, entity: &Entity) -> PersistenceResult<()>;
    async fn update(&self, entity: &Entity) -> PersistenceResult<()>;
    async fn find(&self, id: Uuid) -> PersistenceResult<Option<Entity>>;
    /// Live (non-deleted) entities in one org scope.
    async fn list_by_org(&self, org_id: &str) -> PersistenceResult<Vec<Entity>>;
}

#[async_trait]
pub trait RelationRepository: Send + Sync {
    async fn insert(&self, relation: &Relation) -> PersistenceResult<()>;
    /// Relations where the entity appears as subject or object.
    async fn list_by_entity(&self, entity_id: Uuid) -> PersistenceResult<Vec<Relation>>;
}

#[async_trait]
pub trait MentionRepository: Send + Sync {
    async fn insert(&self, mention: &MentionRecord) -> PersistenceResult<()>;
    async fn update(&self, mention: &MentionRecord) -> PersistenceResult<()>;
    async fn find(&self, id: Uuid) -> PersistenceResult<Option<MentionRecord>>;
    async fn list_by_batch(&self, batch_id: Uuid) -> PersistenceResult<Vec<MentionRecord>>;
}

#[async_trait]
pub trait MergeHistoryRepository: Send + Sync {
    async fn append(&self, record: &MergeRecord) -> PersistenceResult<()>;
    async fn list_for_entity(&self, entity_id: Uuid) -> PersistenceResult<Vec<MergeRecord>>;
}

#[async_trait]
pub trait VerificationTaskRepository: Send + Sync {
    async fn insert(&self, task: &VerificationTask) -> PersistenceResult<()>;
    async fn find(&self, id: Uuid) -> PersistenceResult<Option<VerificationTask>>;
    /// Persists `task` (with its version already bumped) only if the stored
    /// version equals `expected_version`; otherwise `Conflict`.
    async fn update_with_version(
        &self,
        task: &VerificationTask,
        expected_version: u64,
    ) -> PersistenceResult<()>;
    async fn list_pending(&self) -> PersistenceResult<Vec<VerificationTask>>;
}

#[async_trait]
pub trait ExternalLinkRepository: Send + Sync {
    /// Returns false when a link for the entity already exists (no-op).
    async fn insert_if_absent(&self, link: &ExternalLink) -> PersistenceResult<bool>;
    async fn find(&self, entity_id: Uuid) -> PersistenceResult<Option<ExternalLink>>;
}

#[async_trait]
pub trait BatchStatusRepository: Send + Sync {
    async fn upsert(&self, status: &BatchStatus) -> PersistenceResult<()>;
    async fn find(&self, batch_id: Uuid) -> PersistenceResult<Option<BatchStatus>>;
}

/// The persistence boundary handed to every component. Each slot is an
/// injected repository so backends can be mixed at composition time.
#[derive(Clone)]
pub struct GraphStore {
    pub entities: Arc<dyn EntityRepository>,
    pub relations: Arc<dyn RelationRepository>,
    pub mentions: Arc<dyn MentionRepository>,
    pub merges: Arc<dyn MergeHistoryRepository>,
    pub tasks: Arc<dyn VerificationTaskRepository>,
    pub links: Arc<dyn ExternalLinkRepository>,
    pub batches: Arc<dyn BatchStatusRepository>,
}

impl GraphStore {
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::default());
        Self {
            entities: store.clone(),
            relations: store.clone(),
            mentions: store.clone(),
            merges: store.clone(),
            tasks: store.clone(),
            links: store.clone(),
            batches: store,
        }
    }
}
