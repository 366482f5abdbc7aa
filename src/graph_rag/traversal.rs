use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use petgraph::graphmap::DiGraphMap;
use tracing::debug;
use uuid::Uuid;

use crate::errors::PersistenceResult;
use crate::models::Relation;
use crate::storage::RelationRepository;

/// Subgraph reachable from the seed entities within the hop budget.
pub struct Expansion {
    /// Minimal hop distance from any seed, seeds at 0.
    pub hop_depth: HashMap<Uuid, usize>,
    /// Every relation touching a visited entity, deduplicated by id.
    pub relations: Vec<Relation>,
    /// Entity-to-entity edges for path checks.
    pub graph: DiGraphMap<Uuid, f32>,
}

impl Expansion {
    /// Candidates ranked by graph distance: nearest hop first, then entity
    /// id for determinism.
    pub fn distance_ranking(&self) -> Vec<Uuid> {
        let mut ranked: Vec<(Uuid, usize)> =
            self.hop_depth.iter().map(|(id, d)| (*id, *d)).collect();
        ranked.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        ranked.into_iter().map(|(id, _)| id).collect()
    }

    pub fn relations_for(&self, entity_id: Uuid) -> Vec<&Relation> {
        self.relations
            .iter()
            .filter(|r| r.touches(entity_id))
            .collect()
    }
}

/// Breadth-first expansion over relation edges, up to `max_hops` from the
/// seeds. Read-only; each frontier entity costs one repository lookup.
pub async fn expand(
    relations: &Arc<dyn RelationRepository>,
    seeds: &[Uuid],
    max_hops: usize,
) -> PersistenceResult<Expansion> {
    let mut hop_depth: HashMap<Uuid, usize> = HashMap::new();
    let mut seen_relations: HashSet<Uuid> = HashSet::new();
    let mut collected: Vec<Relation> = Vec::new();
    let mut graph: DiGraphMap<Uuid, f32> = DiGraphMap::new();
    let mut queue: VecDeque<(Uuid, usize)> = VecDeque::new();

    for seed in seeds {
        if hop_depth.insert(*seed, 0).is_none() {
            graph.add_node(*seed);
            queue.push_back((*seed, 0));
        }
    }

    while let Some((entity_id, depth)) = queue.pop_front() {
        if depth >= max_hops {
            continue;
        }
        for relation in relations.list_by_entity(entity_id).await? {
            if seen_relations.insert(relation.id) {
                if let Some(object_id) = relation.object_entity_id() {
                    graph.add_edge(relation.subject_id, object_id, relation.confidence);
                }
                collected.push(relation.clone());
            }
            let neighbors = [Some(relation.subject_id), relation.object_entity_id()];
            for neighbor in neighbors.into_iter().flatten() {
                if !hop_depth.contains_key(&neighbor) {
                    hop_depth.insert(neighbor, depth + 1);
                    queue.push_back((neighbor, depth + 1));
                }
            }
        }
    }

    debug!(
        "expanded {} seeds to {} entities and {} relations within {} hops",
        seeds.len(),
        hop_depth.len(),
        collected.len(),
        max_hops
    );

    Ok(Expansion {
        hop_depth,
        relations: collected,
        graph,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RelationObject;
    use crate::storage::MemoryStore;

    async fn chain(store: &MemoryStore, nodes: &[Uuid]) {
        for pair in nodes.windows(2) {
            let relation = Relation::new(
                pair[0],
                "related_to",
                RelationObject::Entity { id: pair[1] },
                0.9,
                vec![],
            );
            RelationRepository::insert(store, &relation).await.unwrap();
        }
    }

    #[tokio::test]
    async fn hop_budget_bounds_the_frontier() {
        let store = Arc::new(MemoryStore::default());
        let nodes: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        chain(&store, &nodes).await;

        let repo: Arc<dyn RelationRepository> = store;
        let expansion = expand(&repo, &nodes[0..1], 2).await.unwrap();

        assert_eq!(expansion.hop_depth.get(&nodes[0]), Some(&0));
        assert_eq!(expansion.hop_depth.get(&nodes[1]), Some(&1));
        assert_eq!(expansion.hop_depth.get(&nodes[2]), Some(&2));
        assert!(!expansion.hop_depth.contains_key(&nodes[3]));
    }

    #[tokio::test]
    async fn distance_ranking_is_depth_then_id() {
        let store = Arc::new(MemoryStore::default());
        let hub = Uuid::new_v4();
        let mut leaves: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        leaves.sort();
        for leaf in &leaves {
            let relation = Relation::new(
                hub,
                "points_at",
                RelationObject::Entity { id: *leaf },
                0.8,
                vec![],
            );
            RelationRepository::insert(store.as_ref(), &relation)
                .await
                .unwrap();
        }

        let repo: Arc<dyn RelationRepository> = store;
        let expansion = expand(&repo, &[hub], 1).await.unwrap();
        let ranking = expansion.distance_ranking();
        assert_eq!(ranking[0], hub);
        assert_eq!(&ranking[1..], &leaves[..]);
    }
}
