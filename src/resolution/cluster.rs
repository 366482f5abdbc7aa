use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use crate::config::ResolutionConfig;
use crate::models::{Entity, MentionRecord, Provenance};

use super::matchers::cosine_similarity;

/// One provisional cluster: indices into the mention slice handed to
/// `cluster`, representative first decided by the canonical-selection rule.
#[derive(Debug, Clone)]
pub struct MentionCluster {
    pub representative: usize,
    pub members: Vec<usize>,
}

/// Groups the mentions of one batch into provisional entities.
///
/// Single-linkage clustering over cosine similarity with a fixed cutoff;
/// mentions with identical normalized text always cluster together. The
/// result is deterministic for a fixed similarity function: mentions are
/// visited in id order and the representative is picked by highest
/// confidence, then longest text, then smallest id.
pub struct WithinBatchResolver {
    config: ResolutionConfig,
}

impl WithinBatchResolver {
    pub fn new(config: ResolutionConfig) -> Self {
        Self { config }
    }

    pub fn cluster(
        &self,
        mentions: &[MentionRecord],
        embeddings: &[Option<Vec<f32>>],
    ) -> Vec<MentionCluster> {
        assert_eq!(mentions.len(), embeddings.len());
        let n = mentions.len();
        if n == 0 {
            return Vec::new();
        }

        // Id order makes union order independent of input order.
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by_key(|&i| mentions[i].id);

        let mut parent: Vec<usize> = (0..n).collect();
        for oi in 0..order.len() {
            for oj in (oi + 1)..order.len() {
                let (i, j) = (order[oi], order[oj]);
                if self.should_link(&mentions[i], &mentions[j], &embeddings[i], &embeddings[j]) {
                    union(&mut parent, i, j);
                }
            }
        }

        let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
        for &i in &order {
            groups.entry(find(&mut parent, i)).or_default().push(i);
        }

        let mut clusters: Vec<MentionCluster> = groups
            .into_values()
            .map(|members| {
                let representative = self.pick_representative(mentions, &members);
                MentionCluster {
                    representative,
                    members,
                }
            })
            .collect();
        clusters.sort_by_key(|c| mentions[c.representative].id);

        debug!(
            "clustered {} mentions into {} provisional groups",
            n,
            clusters.len()
        );
        clusters
    }

    /// Materializes one provisional entity per cluster, carrying the member
    /// mention ids alongside for linking.
    pub fn build_entities(
        &self,
        org_id: &str,
        batch_id: Uuid,
        mentions: &[MentionRecord],
        embeddings: &[Option<Vec<f32>>],
        clusters: &[MentionCluster],
    ) -> Vec<(Entity, Vec<Uuid>)> {
        clusters
            .iter()
            .map(|cluster| {
                let rep = &mentions[cluster.representative];
                let mut types: Vec<String> = Vec::new();
                let mut provenance = Provenance::default();
                let mut member_ids = Vec::with_capacity(cluster.members.len());
                for &idx in &cluster.members {
                    let mention = &mentions[idx];
                    if !types.contains(&mention.mention_type) {
                        types.push(mention.mention_type.clone());
                    }
                    provenance.record(mention.document_id, batch_id);
                    member_ids.push(mention.id);
                }

                let mut entity = Entity::new(org_id, rep.text.clone(), types);
                entity.grounding_confidence = rep.confidence;
                entity.provenance = provenance;
                entity.embedding = centroid(cluster, embeddings);
                (entity, member_ids)
            })
            .collect()
    }

    fn should_link(
        &self,
        a: &MentionRecord,
        b: &MentionRecord,
        emb_a: &Option<Vec<f32>>,
        emb_b: &Option<Vec<f32>>,
    ) -> bool {
        if a.normalized_text() == b.normalized_text() {
            return true;
        }
        match (emb_a, emb_b) {
            (Some(ea), Some(eb)) => cosine_similarity(ea, eb) >= self.config.cluster_threshold,
            _ => false,
        }
    }

    fn pick_representative(&self, mentions: &[MentionRecord], members: &[usize]) -> usize {
        let mut best = members[0];
        for &idx in &members[1..] {
            let (m, b) = (&mentions[idx], &mentions[best]);
            let better = m.confidence > b.confidence
                || (m.confidence == b.confidence && m.text.len() > b.text.len())
                || (m.confidence == b.confidence && m.text.len() == b.text.len() && m.id < b.id);
            if better {
                best = idx;
            }
        }
        best
    }
}

fn find(parent: &mut Vec<usize>, i: usize) -> usize {
    if parent[i] != i {
        let up = parent[i];
        let root = find(parent, up);
        parent[i] = root;
    }
    parent[i]
}

fn union(parent: &mut Vec<usize>, i: usize, j: usize) {
    let (ri, rj) = (find(parent, i), find(parent, j));
    if ri != rj {
        // Smaller root wins so the forest shape is input-order independent.
        let (lo, hi) = if ri < rj { (ri, rj) } else { (rj, ri) };
        parent[hi] = lo;
    }
}

fn centroid(cluster: &MentionCluster, embeddings: &[Option<Vec<f32>>]) -> Option<Vec<f32>> {
    let vectors: Vec<&Vec<f32>> = cluster
        .members
        .iter()
        .filter_map(|&i| embeddings[i].as_ref())
        .collect();
    let first = vectors.first()?;
    let dim = first.len();
    let mut sum = vec![0.0f32; dim];
    let mut count = 0usize;
    for v in vectors {
        if v.len() != dim {
            continue;
        }
        for (acc, x) in sum.iter_mut().zip(v.iter()) {
            *acc += x;
        }
        count += 1;
    }
    for x in &mut sum {
        *x /= count as f32;
    }
    Some(sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EvidenceSpan;

    fn mention(batch: Uuid, text: &str, confidence: f32) -> MentionRecord {
        MentionRecord::new(
            Uuid::new_v4(),
            batch,
            text,
            "person",
            confidence,
            EvidenceSpan { start: 0, end: text.len() },
        )
    }

    #[test]
    fn identical_normalized_text_clusters_to_one_entity() {
        let batch = Uuid::new_v4();
        let mentions = vec![
            mention(batch, "Ada Lovelace", 0.9),
            mention(batch, "ada   lovelace", 0.8),
        ];
        let embeddings = vec![None, None];
        let resolver = WithinBatchResolver::new(ResolutionConfig::default());

        let clusters = resolver.cluster(&mentions, &embeddings);
        assert_eq!(clusters.len(), 1);

        let entities = resolver.build_entities("org-1", batch, &mentions, &embeddings, &clusters);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].0.label, "Ada Lovelace");
        assert_eq!(entities[0].1.len(), 2);
    }

    #[test]
    fn similar_embeddings_cluster_dissimilar_text_apart_stays_apart() {
        let batch = Uuid::new_v4();
        let mentions = vec![
            mention(batch, "Ada Lovelace", 0.9),
            mention(batch, "Countess of Lovelace", 0.7),
            mention(batch, "Alan Turing", 0.9),
        ];
        let embeddings = vec![
            Some(vec![1.0, 0.0, 0.0]),
            Some(vec![0.98, 0.05, 0.0]),
            Some(vec![0.0, 1.0, 0.0]),
        ];
        let resolver = WithinBatchResolver::new(ResolutionConfig::default());

        let clusters = resolver.cluster(&mentions, &embeddings);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn clustering_is_deterministic_across_input_order() {
        let batch = Uuid::new_v4();
        let a = mention(batch, "Ada Lovelace", 0.9);
        let b = mention(batch, "ada lovelace", 0.8);
        let c = mention(batch, "Alan Turing", 0.9);
        let resolver = WithinBatchResolver::new(ResolutionConfig::default());

        let forward = resolver.cluster(&[a.clone(), b.clone(), c.clone()], &[None, None, None]);
        let reversed = resolver.cluster(&[c, b, a], &[None, None, None]);
        assert_eq!(forward.len(), reversed.len());

        let mut forward_sizes: Vec<usize> = forward.iter().map(|c| c.members.len()).collect();
        let mut reversed_sizes: Vec<usize> = reversed.iter().map(|c| c.members.len()).collect();
        forward_sizes.sort();
        reversed_sizes.sort();
        assert_eq!(forward_sizes, reversed_sizes);
    }

    #[test]
    fn representative_prefers_confidence_then_length() {
        let batch = Uuid::new_v4();
        let mentions = vec![
            mention(batch, "ada lovelace", 0.6),
            mention(batch, "Ada Lovelace", 0.9),
        ];
        let resolver = WithinBatchResolver::new(ResolutionConfig::default());
        let clusters = resolver.cluster(&mentions, &[None, None]);
        assert_eq!(clusters.len(), 1);
        assert_eq!(mentions[clusters[0].representative].confidence, 0.9);
    }
}
