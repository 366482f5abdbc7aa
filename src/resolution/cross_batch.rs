use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use crate::capabilities::{retry::with_backoff_ms, EmbeddingProvider};
use crate::config::ResolutionConfig;
use crate::errors::{GraphFuseResult, ResolutionError};
use crate::models::{Entity, MentionRecord, MergeReason, MergeRecord, ResolutionReport};
use crate::storage::GraphStore;

use super::registry::EntityRegistry;

enum Linked {
    Existing { merged: bool },
    Created,
}

/// Links mentions to previously persisted entities or creates new ones.
///
/// Partial-failure policy: a per-mention failure is caught and logged, the
/// mention stays unresolved and is listed in `ResolutionReport::failed`; the
/// rest of the batch continues. Callers re-submit failed mentions
/// explicitly, nothing retries behind their back.
pub struct CrossBatchResolver {
    store: GraphStore,
    registry: Arc<EntityRegistry>,
    embeddings: Arc<dyn EmbeddingProvider>,
    config: ResolutionConfig,
}

impl CrossBatchResolver {
    pub fn new(
        store: GraphStore,
        registry: Arc<EntityRegistry>,
        embeddings: Arc<dyn EmbeddingProvider>,
        config: ResolutionConfig,
    ) -> Self {
        Self {
            store,
            registry,
            embeddings,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<EntityRegistry> {
        &self.registry
    }

    /// Resolves standalone mentions with bounded fan-out.
    pub async fn resolve_mentions(
        &self,
        org_id: &str,
        mentions: Vec<MentionRecord>,
    ) -> GraphFuseResult<ResolutionReport> {
        self.registry.warm(org_id).await?;

        // Mentions arriving from outside the pipeline may not be persisted yet.
        for mention in &mentions {
            if self.store.mentions.find(mention.id).await?.is_none() {
                self.store.mentions.insert(mention).await?;
            }
        }

        let mut report = ResolutionReport {
            total: mentions.len(),
            ..Default::default()
        };

        let outcomes: Vec<(Uuid, Result<Linked, ResolutionError>)> =
            stream::iter(mentions.into_iter().map(|mention| {
                let id = mention.id;
                async move { (id, self.resolve_one(org_id, mention).await) }
            }))
            .buffer_unordered(self.config.mention_fanout.max(1))
            .collect()
            .await;

        for (mention_id, outcome) in outcomes {
            match outcome {
                Ok(Linked::Existing { merged }) => {
                    report.linked += 1;
                    if merged {
                        report.merged += 1;
                    }
                }
                Ok(Linked::Created) => report.created += 1,
                Err(err) => {
                    warn!("mention {} left unresolved: {}", mention_id, err);
                    report.failed.push(mention_id);
                }
            }
        }
        report.failed.sort();

        info!(
            "cross-batch resolution: {} linked, {} created, {} merged, {} failed of {}",
            report.linked,
            report.created,
            report.merged,
            report.failed.len(),
            report.total
        );
        Ok(report)
    }

    /// Resolves the provisional entities of one batch against history. A
    /// provisional entity that matches an existing one is soft-deleted and
    /// its mentions re-pointed, one merge row per re-pointed mention.
    pub async fn resolve_batch(
        &self,
        org_id: &str,
        batch_id: Uuid,
        provisional: Vec<(Entity, Vec<Uuid>)>,
    ) -> GraphFuseResult<ResolutionReport> {
        self.registry.warm(org_id).await?;

        let mut report = ResolutionReport::default();
        let scope = self.registry.scope(org_id).await;

        // Registry writes are serialized per scope for the whole pass.
        let _guard = scope.write_lock.lock().await;

        // The batch's own provisional entities are already persisted; hide
        // them from candidate search so they cannot match each other.
        let provisional_ids: Vec<Uuid> = provisional.iter().map(|(e, _)| e.id).collect();

        for (mut entity, mention_ids) in provisional {
            report.total += mention_ids.len();
            match self
                .resolve_provisional(org_id, &mut entity, &mention_ids, &provisional_ids, &scope)
                .await
            {
                Ok(Some(merged_mentions)) => {
                    report.linked += mention_ids.len();
                    report.merged += merged_mentions;
                }
                Ok(None) => report.created += 1,
                Err(err) => {
                    warn!(
                        "provisional entity '{}' left unmerged: {}",
                        entity.label, err
                    );
                    report.failed.extend(mention_ids);
                }
            }
        }
        report.failed.sort();
        info!(
            "batch {} cross-batch pass: {} merged into history, {} stand as new",
            batch_id, report.merged, report.created
        );
        Ok(report)
    }

    /// Returns `Some(merged_mention_count)` when the provisional entity was
    /// folded into an existing one, `None` when it stands as a new entity.
    async fn resolve_provisional(
        &self,
        org_id: &str,
        entity: &mut Entity,
        mention_ids: &[Uuid],
        provisional_ids: &[Uuid],
        scope: &super::registry::ScopeRegistry,
    ) -> Result<Option<usize>, ResolutionError> {
        let candidates = self
            .registry
            .find_candidates(
                org_id,
                &entity.label,
                entity.embedding.as_deref(),
                provisional_ids,
            )
            .await?;

        let best = candidates
            .first()
            .filter(|c| c.score >= self.config.link_threshold);

        match best {
            Some(candidate) => {
                let target_id = candidate.entity_id;
                let mut target = self
                    .store
                    .entities
                    .find(target_id)
                    .await?
                    .ok_or_else(|| {
                        ResolutionError::Validation(format!("candidate {target_id} vanished"))
                    })?;

                target.merge_attributes(&entity.attributes);
                target.provenance.merge(&entity.provenance);
                for t in &entity.types {
                    if !target.types.contains(t) {
                        target.types.push(t.clone());
                    }
                }
                self.store.entities.update(&target).await?;

                let mut merged_mentions = 0usize;
                for mention_id in mention_ids {
                    if let Some(mut mention) = self.store.mentions.find(*mention_id).await? {
                        if self
                            .link_mention(&mut mention, target_id, candidate.score)
                            .await?
                        {
                            merged_mentions += 1;
                        }
                    }
                }

                entity.mark_merged_into(target_id);
                self.store.entities.update(entity).await?;

                info!(
                    "merged provisional '{}' into entity {} (score {:.3})",
                    entity.label, target_id, candidate.score
                );
                Ok(Some(merged_mentions))
            }
            None => {
                scope.register(&entity.normalized_label());
                Ok(None)
            }
        }
    }

    async fn resolve_one(
        &self,
        org_id: &str,
        mut mention: MentionRecord,
    ) -> Result<Linked, ResolutionError> {
        let embedding = with_backoff_ms(
            "embed mention",
            self.config.max_attempts,
            self.config.retry_base_delay_ms,
            || self.embeddings.embed(&mention.text),
        )
        .await?;

        let candidates = self
            .registry
            .find_candidates(org_id, &mention.text, Some(&embedding), &[])
            .await?;

        if let Some(best) = candidates
            .first()
            .filter(|c| c.score >= self.config.link_threshold)
        {
            let merged = self.link_mention(&mut mention, best.entity_id, best.score).await?;
            self.enrich_target(best.entity_id, &mention).await?;
            return Ok(Linked::Existing { merged });
        }

        // No plausible match: take the scope lock and re-check before
        // creating, so a concurrent identical mention finds our entity
        // instead of minting its own.
        let scope = self.registry.scope(org_id).await;
        let _guard = scope.write_lock.lock().await;

        let candidates = self
            .registry
            .find_candidates(org_id, &mention.text, Some(&embedding), &[])
            .await?;
        if let Some(best) = candidates
            .first()
            .filter(|c| c.score >= self.config.link_threshold)
        {
            let merged = self.link_mention(&mut mention, best.entity_id, best.score).await?;
            self.enrich_target(best.entity_id, &mention).await?;
            return Ok(Linked::Existing { merged });
        }

        let mut entity = Entity::new(org_id, mention.text.clone(), vec![mention.mention_type.clone()]);
        entity.grounding_confidence = mention.confidence;
        entity.embedding = Some(embedding);
        entity.provenance.record(mention.document_id, mention.batch_id);
        self.store.entities.insert(&entity).await?;
        scope.register(&entity.normalized_label());

        self.link_mention(&mut mention, entity.id, 1.0).await?;
        info!("created entity {} for mention '{}'", entity.id, mention.text);
        Ok(Linked::Created)
    }

    /// Points the mention at `target`. Emits exactly one merge row when the
    /// mention previously resolved to a different entity.
    async fn link_mention(
        &self,
        mention: &mut MentionRecord,
        target: Uuid,
        score: f32,
    ) -> Result<bool, ResolutionError> {
        let merged = match mention.resolved_entity_id {
            Some(old) if old != target => {
                let record = MergeRecord::new(old, target, MergeReason::CrossBatchMatch, score);
                self.store.merges.append(&record).await?;
                true
            }
            _ => false,
        };
        mention.resolved_entity_id = Some(target);
        self.store.mentions.update(mention).await?;
        Ok(merged)
    }

    async fn enrich_target(
        &self,
        target_id: Uuid,
        mention: &MentionRecord,
    ) -> Result<(), ResolutionError> {
        if let Some(mut target) = self.store.entities.find(target_id).await? {
            target.provenance.record(mention.document_id, mention.batch_id);
            if !target.types.contains(&mention.mention_type) {
                target.types.push(mention.mention_type.clone());
            }
            self.store.entities.update(&target).await?;
        }
        Ok(())
    }
}
