pub mod citation;
pub mod rrf;
pub mod traversal;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::capabilities::{retry::with_backoff_ms, EmbeddingProvider};
use crate::config::GraphRagConfig;
use crate::errors::GraphFuseResult;
use crate::models::{Citation, ContextBundle, ContextEntry, Entity, Relation, RelationObject};
use crate::resolution::matchers::cosine_similarity;
use crate::storage::GraphStore;

pub use citation::CitationValidator;
pub use rrf::reciprocal_rank_fusion;
pub use traversal::{expand, Expansion};

/// Graph-grounded retrieval: seeds from embedding similarity, expands the
/// neighborhood, fuses the two rankings, and emits an evidence-linked
/// context bundle within a character budget.
pub struct GraphRagService {
    store: GraphStore,
    embeddings: Arc<dyn EmbeddingProvider>,
    config: GraphRagConfig,
}

impl GraphRagService {
    pub fn new(
        store: GraphStore,
        embeddings: Arc<dyn EmbeddingProvider>,
        config: GraphRagConfig,
    ) -> Self {
        Self {
            store,
            embeddings,
            config,
        }
    }

    /// Runs one retrieval query against the org's graph. `k` and `max_hops`
    /// fall back to the configured defaults when unset.
    pub async fn query(
        &self,
        org_id: &str,
        text: &str,
        k: Option<usize>,
        max_hops: Option<usize>,
    ) -> GraphFuseResult<ContextBundle> {
        let k = k.unwrap_or(self.config.default_k).max(1);
        let max_hops = max_hops.unwrap_or(self.config.default_max_hops);

        let query_embedding = with_backoff_ms(
            "query embedding",
            self.config.max_attempts,
            self.config.retry_base_delay_ms,
            || self.embeddings.embed(text),
        )
        .await?;

        let entities = self.store.entities.list_by_org(org_id).await?;
        let by_id: HashMap<Uuid, Entity> =
            entities.into_iter().map(|e| (e.id, e)).collect();

        let embedding_ranking = Self::rank_by_similarity(&by_id, &query_embedding);
        let seeds: Vec<Uuid> = embedding_ranking.iter().take(k).copied().collect();
        if seeds.is_empty() {
            debug!(org_id, "no seed entities for query");
            return Ok(ContextBundle {
                query: text.to_string(),
                entries: Vec::new(),
                truncated: false,
            });
        }

        let expansion = expand(&self.store.relations, &seeds, max_hops).await?;

        let in_graph: Vec<Uuid> = embedding_ranking
            .iter()
            .filter(|id| expansion.hop_depth.contains_key(id))
            .copied()
            .collect();
        let fused = reciprocal_rank_fusion(
            &[in_graph, expansion.distance_ranking()],
            self.config.k_rrf,
        );

        let validator = CitationValidator::new(self.config.hop_penalty);
        let mut entries = Vec::new();
        let mut truncated = false;
        let mut used = 0usize;

        for (entity_id, score) in fused {
            let entity = match by_id.get(&entity_id) {
                Some(entity) => entity,
                // Reached through a relation but deleted or out of scope.
                None => continue,
            };
            let relations = expansion.relations_for(entity_id);
            let entry_text = Self::format_entry(entity, &relations, &by_id);
            if used + entry_text.len() > self.config.context_char_budget && !entries.is_empty() {
                truncated = true;
                break;
            }
            used += entry_text.len();

            let (support, support_confidence) =
                validator.classify(entity_id, &seeds, &expansion);
            let citations = self.citations_for(&relations).await?;
            let hop_depth = expansion.hop_depth.get(&entity_id).copied().unwrap_or(0);

            entries.push(ContextEntry {
                entity_id,
                label: entity.label.clone(),
                score,
                hop_depth,
                text: entry_text,
                citations,
                support,
                support_confidence,
            });
        }

        info!(
            org_id,
            entries = entries.len(),
            truncated,
            "assembled context bundle"
        );
        Ok(ContextBundle {
            query: text.to_string(),
            entries,
            truncated,
        })
    }

    /// Cosine ranking over every embedded entity in scope, best first,
    /// ties broken by id for determinism.
    fn rank_by_similarity(by_id: &HashMap<Uuid, Entity>, query: &[f32]) -> Vec<Uuid> {
        let mut scored: Vec<(Uuid, f32)> = by_id
            .values()
            .filter_map(|e| {
                e.embedding
                    .as_ref()
                    .map(|emb| (e.id, cosine_similarity(query, emb)))
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.into_iter().map(|(id, _)| id).collect()
    }

    fn format_entry(
        entity: &Entity,
        relations: &[&Relation],
        by_id: &HashMap<Uuid, Entity>,
    ) -> String {
        let mut lines = Vec::with_capacity(relations.len() + 1);
        if entity.types.is_empty() {
            lines.push(entity.label.clone());
        } else {
            lines.push(format!("{} ({})", entity.label, entity.types.join(", ")));
        }
        for relation in relations {
            let object = match &relation.object {
                RelationObject::Entity { id } => by_id
                    .get(id)
                    .map(|e| e.label.clone())
                    .unwrap_or_else(|| id.to_string()),
                RelationObject::Literal { value, .. } => value.to_string(),
            };
            let subject = by_id
                .get(&relation.subject_id)
                .map(|e| e.label.as_str())
                .unwrap_or("?");
            lines.push(format!("  {} -[{}]-> {}", subject, relation.predicate, object));
        }
        lines.join("\n")
    }

    /// One citation per supporting relation, carrying the evidence span
    /// when the backing mention is still on record.
    async fn citations_for(&self, relations: &[&Relation]) -> GraphFuseResult<Vec<Citation>> {
        let mut citations = Vec::with_capacity(relations.len());
        for relation in relations {
            let mention_id = relation.evidence.first().copied();
            let span = match mention_id {
                Some(id) => self.store.mentions.find(id).await?.map(|m| m.span),
                None => None,
            };
            citations.push(Citation {
                relation_id: relation.id,
                predicate: relation.predicate.clone(),
                mention_id,
                span,
            });
        }
        Ok(citations)
    }
}
