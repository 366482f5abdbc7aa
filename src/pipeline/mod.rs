pub mod chunker;
pub mod extract;
pub mod grounding;

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::capabilities::{
    retry::with_backoff_ms, EmbeddingProvider, LanguageModel, OntologyIndex,
};
use crate::config::{PipelineConfig, ResolutionConfig};
use crate::errors::{GraphFuseError, GraphFuseResult, PersistenceResult, StageError};
use crate::models::{
    normalize_text, BatchReport, BatchStage, BatchStatus, Entity, MentionRecord, Relation,
    RelationObject,
};
use crate::resolution::{CrossBatchResolver, WithinBatchResolver};
use crate::storage::GraphStore;

pub use chunker::{Chunk, Chunker};
pub use extract::{MentionExtractor, RawMention, RawObject, RawRelation, RelationExtractor};
pub use grounding::Grounder;

/// One document handed to the pipeline.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    pub id: Uuid,
    pub text: String,
}

struct ChunkedDocument {
    id: Uuid,
    chunks: Vec<Chunk>,
}

/// Six-stage extraction pipeline. A `BatchStatus` checkpoint is persisted
/// after every completed stage; re-running a batch resumes from the last
/// completed stage, reloading persisted outputs instead of recomputing them.
/// Pure stages (chunking, relation extraction) are recomputed on resume,
/// which is safe because they are deterministic for the same input.
pub struct ExtractionPipeline {
    store: GraphStore,
    embeddings: Arc<dyn EmbeddingProvider>,
    resolver: Arc<CrossBatchResolver>,
    chunker: Chunker,
    mention_extractor: MentionExtractor,
    relation_extractor: RelationExtractor,
    within_batch: WithinBatchResolver,
    grounder: Grounder,
    config: PipelineConfig,
}

impl ExtractionPipeline {
    pub fn new(
        store: GraphStore,
        embeddings: Arc<dyn EmbeddingProvider>,
        model: Option<Arc<dyn LanguageModel>>,
        ontology: Arc<dyn OntologyIndex>,
        resolver: Arc<CrossBatchResolver>,
        config: PipelineConfig,
        resolution: ResolutionConfig,
    ) -> Self {
        Self {
            store,
            embeddings,
            resolver,
            chunker: Chunker::new(config.max_chunk_chars),
            mention_extractor: MentionExtractor::new(
                model.clone(),
                config.max_attempts,
                config.retry_base_delay_ms,
            ),
            relation_extractor: RelationExtractor::new(
                model,
                config.max_attempts,
                config.retry_base_delay_ms,
            ),
            within_batch: WithinBatchResolver::new(resolution),
            grounder: Grounder::new(ontology),
            config,
        }
    }

    /// Runs (or resumes) one batch end to end.
    pub async fn run_batch(
        &self,
        org_id: &str,
        batch_id: Uuid,
        documents: Vec<DocumentInput>,
    ) -> GraphFuseResult<BatchReport> {
        let mut status = match self.store.batches.find(batch_id).await? {
            Some(existing) if existing.stage == BatchStage::Done => {
                info!("batch {} already done, nothing to do", batch_id);
                return Ok(BatchReport {
                    batch_id: Some(batch_id),
                    ..Default::default()
                });
            }
            Some(mut existing) => {
                if existing.stage == BatchStage::Failed {
                    // Resume from the last completed stage, not from scratch.
                    let completed = existing.completed;
                    existing.advance(completed);
                }
                existing
            }
            None => BatchStatus::new(batch_id, org_id),
        };
        let resumed_from = status.completed;
        if resumed_from > BatchStage::Pending {
            info!(
                "resuming batch {} after completed stage '{}'",
                batch_id,
                resumed_from.as_str()
            );
        }

        let mut report = BatchReport {
            batch_id: Some(batch_id),
            ..Default::default()
        };

        // Preprocessing: cap and chunk. Pure, recomputed on resume.
        let mut documents = documents;
        if documents.len() > self.config.max_documents_per_batch {
            let dropped = documents.split_off(self.config.max_documents_per_batch);
            warn!(
                "batch {} over the {}-document cap, skipping {} documents",
                batch_id,
                self.config.max_documents_per_batch,
                dropped.len()
            );
            report.skipped_documents.extend(dropped.iter().map(|d| d.id));
        }
        report.documents = documents.len();
        let chunked: Vec<ChunkedDocument> = documents
            .iter()
            .map(|d| ChunkedDocument {
                id: d.id,
                chunks: self.chunker.chunk(&d.text),
            })
            .collect();
        report.chunks = chunked.iter().map(|d| d.chunks.len()).sum();
        self.checkpoint(&mut status, BatchStage::Preprocessing).await?;

        // Extracting: mentions, persisted per batch.
        let mentions = if resumed_from >= BatchStage::Extracting {
            self.store.mentions.list_by_batch(batch_id).await?
        } else {
            match self.extract_mentions(batch_id, &chunked, &mut report).await {
                Ok(mentions) => mentions,
                Err(err) => return self.fail_batch(status, err.into()).await,
            }
        };
        report.mentions = mentions.len();
        self.checkpoint(&mut status, BatchStage::Extracting).await?;

        // Resolving: within-batch clustering into provisional entities.
        let provisional = if resumed_from >= BatchStage::Resolving {
            self.reload_provisional(&mentions).await?
        } else {
            match self
                .resolve_within_batch(org_id, batch_id, &mentions)
                .await
            {
                Ok(provisional) => provisional,
                Err(err) => return self.fail_batch(status, err.into()).await,
            }
        };
        self.checkpoint(&mut status, BatchStage::Resolving).await?;

        // Validating: grounding against the ontology, per-unit skip.
        let provisional = if resumed_from >= BatchStage::Validating {
            provisional
        } else {
            match self.ground_provisional(provisional).await {
                Ok(kept) => kept,
                Err(err) => return self.fail_batch(status, err.into()).await,
            }
        };
        report.entities = provisional.len();
        self.checkpoint(&mut status, BatchStage::Validating).await?;

        // Ingesting: cross-batch resolution, then relation persistence.
        report.resolution = match self
            .resolver
            .resolve_batch(org_id, batch_id, provisional)
            .await
        {
            Ok(resolution) => resolution,
            Err(err) => return self.fail_batch(status, err).await,
        };
        if let Err(err) = self.persist_relations(batch_id, &chunked, &mut report).await {
            return self.fail_batch(status, err.into()).await;
        }
        self.checkpoint(&mut status, BatchStage::Ingesting).await?;
        self.checkpoint(&mut status, BatchStage::Done).await?;

        info!(
            "batch {} done: {} documents, {} chunks, {} mentions, {} entities, {} relations",
            batch_id,
            report.documents,
            report.chunks,
            report.mentions,
            report.entities,
            report.relations
        );
        Ok(report)
    }

    async fn checkpoint(
        &self,
        status: &mut BatchStatus,
        stage: BatchStage,
    ) -> PersistenceResult<()> {
        if status.stage < stage {
            status.advance(stage);
            self.store.batches.upsert(status).await?;
        }
        Ok(())
    }

    async fn fail_batch(
        &self,
        mut status: BatchStatus,
        err: GraphFuseError,
    ) -> GraphFuseResult<BatchReport> {
        error!("batch {} failed: {}", status.batch_id, err);
        status.fail(err.to_string());
        self.store.batches.upsert(&status).await?;
        Err(err)
    }

    /// Extracts mentions with bounded document concurrency. Structural
    /// failures skip the affected document; anything else fails the stage.
    async fn extract_mentions(
        &self,
        batch_id: Uuid,
        chunked: &[ChunkedDocument],
        report: &mut BatchReport,
    ) -> Result<Vec<MentionRecord>, StageError> {
        let outcomes: Vec<Result<Vec<MentionRecord>, StageError>> = stream::iter(
            chunked
                .iter()
                .map(|doc| async move { self.extract_document(batch_id, doc).await }),
        )
        .buffer_unordered(self.config.document_concurrency.max(1))
        .collect()
        .await;

        let mut mentions = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(extracted) => mentions.extend(extracted),
                Err(StageError::Structural {
                    document_id,
                    message,
                }) => {
                    warn!("document {} skipped: {}", document_id, message);
                    report.skipped_documents.push(document_id);
                }
                Err(err) => return Err(err),
            }
        }

        mentions.sort_by_key(|m| (m.document_id, m.span.start));
        for mention in &mentions {
            self.store.mentions.insert(mention).await?;
        }
        Ok(mentions)
    }

    async fn extract_document(
        &self,
        batch_id: Uuid,
        doc: &ChunkedDocument,
    ) -> Result<Vec<MentionRecord>, StageError> {
        let mut out = Vec::new();
        for chunk in &doc.chunks {
            let raw = self.mention_extractor.extract(doc.id, chunk).await?;
            for r in raw {
                out.push(MentionRecord::new(
                    doc.id,
                    batch_id,
                    r.text,
                    r.mention_type,
                    r.confidence,
                    r.span,
                ));
            }
        }
        Ok(out)
    }

    /// Embeds every mention, clusters them, and persists one provisional
    /// entity per cluster with its mentions linked.
    async fn resolve_within_batch(
        &self,
        org_id: &str,
        batch_id: Uuid,
        mentions: &[MentionRecord],
    ) -> Result<Vec<(Entity, Vec<Uuid>)>, StageError> {
        let mut embeddings = Vec::with_capacity(mentions.len());
        for mention in mentions {
            let vector = with_backoff_ms(
                "embed mention",
                self.config.max_attempts,
                self.config.retry_base_delay_ms,
                || self.embeddings.embed(&mention.text),
            )
            .await
            .map_err(|source| StageError::Transient {
                stage: "resolving",
                source,
            })?;
            embeddings.push(Some(vector));
        }

        let clusters = self.within_batch.cluster(mentions, &embeddings);
        let provisional =
            self.within_batch
                .build_entities(org_id, batch_id, mentions, &embeddings, &clusters);

        for (entity, member_ids) in &provisional {
            self.store.entities.insert(entity).await?;
            for mention_id in member_ids {
                if let Some(mut mention) = self.store.mentions.find(*mention_id).await? {
                    mention.resolved_entity_id = Some(entity.id);
                    self.store.mentions.update(&mention).await?;
                }
            }
        }
        Ok(provisional)
    }

    /// Rebuilds the provisional entity list from persisted state when a
    /// resumed batch has already completed the resolving stage.
    async fn reload_provisional(
        &self,
        mentions: &[MentionRecord],
    ) -> PersistenceResult<Vec<(Entity, Vec<Uuid>)>> {
        let mut members: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for mention in mentions {
            if let Some(entity_id) = mention.resolved_entity_id {
                members.entry(entity_id).or_default().push(mention.id);
            }
        }
        let mut entity_ids: Vec<Uuid> = members.keys().copied().collect();
        entity_ids.sort();

        let mut provisional = Vec::with_capacity(entity_ids.len());
        for entity_id in entity_ids {
            if let Some(entity) = self.store.entities.find(entity_id).await? {
                if !entity.deleted {
                    let mut ids = members.remove(&entity_id).unwrap_or_default();
                    ids.sort();
                    provisional.push((entity, ids));
                }
            }
        }
        Ok(provisional)
    }

    /// Grounds each provisional entity; an entity whose types all fail
    /// validation is soft-deleted and dropped from the batch, its mentions
    /// keep pointing at it (identity is stable even for skipped units).
    async fn ground_provisional(
        &self,
        provisional: Vec<(Entity, Vec<Uuid>)>,
    ) -> Result<Vec<(Entity, Vec<Uuid>)>, StageError> {
        let mut kept = Vec::with_capacity(provisional.len());
        for (mut entity, member_ids) in provisional {
            if self.grounder.ground(&mut entity) {
                self.store.entities.update(&entity).await?;
                kept.push((entity, member_ids));
            } else {
                warn!(
                    "entity '{}' failed grounding, skipping its {} mentions",
                    entity.label,
                    member_ids.len()
                );
                entity.deleted = true;
                self.store.entities.update(&entity).await?;
            }
        }
        Ok(kept)
    }

    /// Re-extracts relations per chunk and persists them against the final
    /// (post-merge) entity ids. Insertion is deduplicated by
    /// subject/predicate/object so a resumed ingest does not double-write.
    async fn persist_relations(
        &self,
        batch_id: Uuid,
        chunked: &[ChunkedDocument],
        report: &mut BatchReport,
    ) -> Result<(), StageError> {
        let mentions = self.store.mentions.list_by_batch(batch_id).await?;

        let mut labels_by_doc: HashMap<Uuid, HashMap<String, (Uuid, Uuid)>> = HashMap::new();
        for mention in &mentions {
            if let Some(entity_id) = mention.resolved_entity_id {
                labels_by_doc
                    .entry(mention.document_id)
                    .or_default()
                    .entry(mention.normalized_text())
                    .or_insert((entity_id, mention.id));
            }
        }

        for doc in chunked {
            let Some(labels) = labels_by_doc.get(&doc.id) else {
                continue;
            };
            for chunk in &doc.chunks {
                let chunk_mentions: Vec<RawMention> = mentions
                    .iter()
                    .filter(|m| {
                        m.document_id == doc.id
                            && m.span.start >= chunk.start
                            && m.span.end <= chunk.end
                    })
                    .map(|m| RawMention {
                        text: m.text.clone(),
                        mention_type: m.mention_type.clone(),
                        confidence: m.confidence,
                        span: m.span,
                    })
                    .collect();

                let raw = match self
                    .relation_extractor
                    .extract(doc.id, chunk, &chunk_mentions)
                    .await
                {
                    Ok(raw) => raw,
                    Err(StageError::Structural {
                        document_id,
                        message,
                    }) => {
                        warn!("relations for document {} skipped: {}", document_id, message);
                        continue;
                    }
                    Err(err) => return Err(err),
                };

                for rel in raw {
                    self.persist_relation(labels, rel, report).await?;
                }
            }
        }
        Ok(())
    }

    async fn persist_relation(
        &self,
        labels: &HashMap<String, (Uuid, Uuid)>,
        rel: RawRelation,
        report: &mut BatchReport,
    ) -> Result<(), StageError> {
        let Some(&(subject_id, subject_mention)) = labels.get(&normalize_text(&rel.subject))
        else {
            return Ok(());
        };
        let (object, evidence) = match rel.object {
            RawObject::Label(label) => match labels.get(&normalize_text(&label)) {
                Some(&(object_id, object_mention)) => (
                    RelationObject::Entity { id: object_id },
                    vec![subject_mention, object_mention],
                ),
                None => return Ok(()),
            },
            RawObject::Literal { value, datatype } => (
                RelationObject::Literal { value, datatype },
                vec![subject_mention],
            ),
        };
        // Merges can collapse subject and object onto the same entity.
        if let RelationObject::Entity { id } = object {
            if id == subject_id {
                return Ok(());
            }
        }
        if self.relation_exists(subject_id, &rel.predicate, &object).await? {
            return Ok(());
        }
        let relation = Relation::new(subject_id, rel.predicate, object, rel.confidence, evidence);
        self.store.relations.insert(&relation).await?;
        report.relations += 1;
        Ok(())
    }

    async fn relation_exists(
        &self,
        subject_id: Uuid,
        predicate: &str,
        object: &RelationObject,
    ) -> Result<bool, StageError> {
        let existing = self.store.relations.list_by_entity(subject_id).await?;
        Ok(existing.iter().any(|r| {
            r.subject_id == subject_id
                && r.predicate == predicate
                && match (&r.object, object) {
                    (RelationObject::Entity { id: a }, RelationObject::Entity { id: b }) => a == b,
                    (
                        RelationObject::Literal {
                            value: va,
                            datatype: da,
                        },
                        RelationObject::Literal {
                            value: vb,
                            datatype: db,
                        },
                    ) => va == vb && da == db,
                    _ => false,
                }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::capabilities::StaticOntology;
    use crate::config::ResolutionConfig;
    use crate::errors::{CapabilityError, CapabilityResult};
    use crate::resolution::EntityRegistry;

    struct StubEmbeddings {
        by_text: HashMap<String, Vec<f32>>,
        fail: AtomicBool,
    }

    impl StubEmbeddings {
        fn new(pairs: &[(&str, Vec<f32>)]) -> Self {
            Self {
                by_text: pairs
                    .iter()
                    .map(|(t, v)| (t.to_string(), v.clone()))
                    .collect(),
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for StubEmbeddings {
        async fn embed(&self, text: &str) -> CapabilityResult<Vec<f32>> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(CapabilityError::Timeout("embedding upstream".into()));
            }
            Ok(self
                .by_text
                .get(text)
                .cloned()
                .unwrap_or_else(|| vec![0.2, 0.2, 0.2]))
        }
    }

    fn pipeline_with(
        embeddings: Arc<StubEmbeddings>,
        config: PipelineConfig,
    ) -> (ExtractionPipeline, GraphStore) {
        let store = GraphStore::in_memory();
        let resolution = ResolutionConfig::default();
        let registry = Arc::new(EntityRegistry::new(
            store.entities.clone(),
            resolution.clone(),
        ));
        let resolver = Arc::new(CrossBatchResolver::new(
            store.clone(),
            registry,
            embeddings.clone(),
            resolution.clone(),
        ));
        let ontology = Arc::new(StaticOntology::from_types([
            "named_entity",
            "acronym",
            "identifier",
        ]));
        let pipeline = ExtractionPipeline::new(
            store.clone(),
            embeddings,
            None,
            ontology,
            resolver,
            config,
            resolution,
        );
        (pipeline, store)
    }

    fn pipeline() -> (ExtractionPipeline, GraphStore) {
        pipeline_with(
            Arc::new(StubEmbeddings::new(&[])),
            PipelineConfig {
                retry_base_delay_ms: 1,
                ..PipelineConfig::default()
            },
        )
    }

    fn doc(text: &str) -> DocumentInput {
        DocumentInput {
            id: Uuid::new_v4(),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn batch_runs_end_to_end_and_resolves_every_mention() {
        let (pipeline, store) = pipeline();
        let batch_id = Uuid::new_v4();

        let report = pipeline
            .run_batch(
                "org-1",
                batch_id,
                vec![doc("Ada Lovelace met Charles Babbage in London Town.")],
            )
            .await
            .unwrap();

        assert_eq!(report.documents, 1);
        assert!(report.mentions >= 3);
        assert!(report.entities >= 3);
        assert!(report.relations >= 1);
        assert!(report.resolution.failed.is_empty());

        for mention in store.mentions.list_by_batch(batch_id).await.unwrap() {
            assert!(mention.resolved_entity_id.is_some());
        }
        let status = store.batches.find(batch_id).await.unwrap().unwrap();
        assert_eq!(status.stage, BatchStage::Done);
    }

    #[tokio::test]
    async fn document_cap_skips_the_overflow() {
        let (pipeline, _store) = pipeline_with(
            Arc::new(StubEmbeddings::new(&[])),
            PipelineConfig {
                max_documents_per_batch: 2,
                retry_base_delay_ms: 1,
                ..PipelineConfig::default()
            },
        );

        let docs = vec![doc("Ada Lovelace."), doc("Alan Turing."), doc("Grace Hopper.")];
        let skipped = docs[2].id;
        let report = pipeline
            .run_batch("org-1", Uuid::new_v4(), docs)
            .await
            .unwrap();

        assert_eq!(report.documents, 2);
        assert_eq!(report.skipped_documents, vec![skipped]);
    }

    #[tokio::test]
    async fn exhausted_transient_failure_marks_the_batch_failed() {
        let embeddings = Arc::new(StubEmbeddings::new(&[]));
        embeddings.fail.store(true, Ordering::SeqCst);
        let (pipeline, store) = pipeline_with(
            embeddings,
            PipelineConfig {
                max_attempts: 2,
                retry_base_delay_ms: 1,
                ..PipelineConfig::default()
            },
        );
        let batch_id = Uuid::new_v4();

        let err = pipeline
            .run_batch("org-1", batch_id, vec![doc("Ada Lovelace.")])
            .await
            .unwrap_err();
        assert!(matches!(err, GraphFuseError::Stage(_)));

        let status = store.batches.find(batch_id).await.unwrap().unwrap();
        assert_eq!(status.stage, BatchStage::Failed);
        assert!(status.error.is_some());
    }

    #[tokio::test]
    async fn failed_batch_reruns_to_done_once_the_capability_recovers() {
        let embeddings = Arc::new(StubEmbeddings::new(&[]));
        embeddings.fail.store(true, Ordering::SeqCst);
        let (pipeline, store) = pipeline_with(
            embeddings.clone(),
            PipelineConfig {
                max_attempts: 2,
                retry_base_delay_ms: 1,
                ..PipelineConfig::default()
            },
        );
        let batch_id = Uuid::new_v4();
        let documents = vec![doc("Ada Lovelace met Charles Babbage.")];

        pipeline
            .run_batch("org-1", batch_id, documents.clone())
            .await
            .unwrap_err();

        embeddings.fail.store(false, Ordering::SeqCst);
        let report = pipeline
            .run_batch("org-1", batch_id, documents)
            .await
            .unwrap();

        assert!(report.mentions >= 2);
        let status = store.batches.find(batch_id).await.unwrap().unwrap();
        assert_eq!(status.stage, BatchStage::Done);
    }

    #[tokio::test]
    async fn resume_skips_completed_extraction() {
        let (pipeline, store) = pipeline();
        let batch_id = Uuid::new_v4();
        let document_id = Uuid::new_v4();

        // Simulate a batch checkpointed after extraction: mentions are on
        // record and the stored stage says extracting is done.
        let mention = MentionRecord::new(
            document_id,
            batch_id,
            "Ada Lovelace",
            "named_entity",
            0.9,
            crate::models::EvidenceSpan { start: 0, end: 12 },
        );
        store.mentions.insert(&mention).await.unwrap();
        let mut status = BatchStatus::new(batch_id, "org-1");
        status.advance(BatchStage::Extracting);
        store.batches.upsert(&status).await.unwrap();

        // The document text would extract two mentions; the resumed run must
        // keep the single persisted one instead of re-extracting.
        let report = pipeline
            .run_batch(
                "org-1",
                batch_id,
                vec![DocumentInput {
                    id: document_id,
                    text: "Ada Lovelace met Charles Babbage.".to_string(),
                }],
            )
            .await
            .unwrap();

        assert_eq!(report.mentions, 1);
        let resolved = store.mentions.find(mention.id).await.unwrap().unwrap();
        assert!(resolved.resolved_entity_id.is_some());
        let status = store.batches.find(batch_id).await.unwrap().unwrap();
        assert_eq!(status.stage, BatchStage::Done);
    }

    #[tokio::test]
    async fn completed_batch_is_not_rerun() {
        let (pipeline, store) = pipeline();
        let batch_id = Uuid::new_v4();
        let mut status = BatchStatus::new(batch_id, "org-1");
        status.advance(BatchStage::Done);
        store.batches.upsert(&status).await.unwrap();

        let report = pipeline
            .run_batch("org-1", batch_id, vec![doc("Ada Lovelace.")])
            .await
            .unwrap();
        assert_eq!(report.documents, 0);
        assert_eq!(report.mentions, 0);
    }

    #[tokio::test]
    async fn ungrounded_entities_are_skipped_but_the_batch_completes() {
        let store = GraphStore::in_memory();
        let resolution = ResolutionConfig::default();
        let registry = Arc::new(EntityRegistry::new(
            store.entities.clone(),
            resolution.clone(),
        ));
        let embeddings = Arc::new(StubEmbeddings::new(&[]));
        let resolver = Arc::new(CrossBatchResolver::new(
            store.clone(),
            registry,
            embeddings.clone(),
            resolution.clone(),
        ));
        // Ontology without "acronym": acronym mentions fail grounding.
        let ontology = Arc::new(StaticOntology::from_types(["named_entity", "identifier"]));
        let pipeline = ExtractionPipeline::new(
            store.clone(),
            embeddings,
            None,
            ontology,
            resolver,
            PipelineConfig {
                retry_base_delay_ms: 1,
                ..PipelineConfig::default()
            },
            resolution,
        );
        let batch_id = Uuid::new_v4();

        let report = pipeline
            .run_batch(
                "org-1",
                batch_id,
                vec![doc("Ada Lovelace joined the ACM committee.")],
            )
            .await
            .unwrap();

        // The acronym's provisional entity was dropped by grounding.
        assert!(report.mentions > report.entities);
        let live = store.entities.list_by_org("org-1").await.unwrap();
        assert!(live.iter().all(|e| e.types != vec!["acronym".to_string()]));
        let status = store.batches.find(batch_id).await.unwrap().unwrap();
        assert_eq!(status.stage, BatchStage::Done);
    }
}
