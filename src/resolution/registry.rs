use std::collections::HashMap;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ResolutionConfig;
use crate::errors::PersistenceResult;
use crate::models::mention::normalize_text;
use crate::storage::EntityRepository;

use super::matchers::{blended_score, cosine_similarity, label_similarity};

/// Set-membership filter over entity label signatures. A negative answer is
/// authoritative: the signature was never registered in this scope.
pub struct SignatureFilter {
    bits: Vec<u64>,
    num_bits: usize,
    num_hashes: u32,
}

impl SignatureFilter {
    pub fn new(expected_items: usize, fp_rate: f64) -> Self {
        let n = expected_items.max(1) as f64;
        let p = fp_rate.clamp(1e-9, 0.5);
        let ln2 = std::f64::consts::LN_2;
        let num_bits = ((-n * p.ln()) / (ln2 * ln2)).ceil().max(64.0) as usize;
        let num_hashes = ((num_bits as f64 / n) * ln2).round().max(1.0) as u32;
        Self {
            bits: vec![0u64; (num_bits + 63) / 64],
            num_bits,
            num_hashes,
        }
    }

    fn hash_pair(key: &str) -> (u64, u64) {
        let digest = Sha256::digest(key.as_bytes());
        let h1 = u64::from_le_bytes(digest[0..8].try_into().unwrap());
        let h2 = u64::from_le_bytes(digest[8..16].try_into().unwrap());
        (h1, h2 | 1)
    }

    pub fn insert(&mut self, key: &str) {
        let (h1, h2) = Self::hash_pair(key);
        for i in 0..self.num_hashes {
            let bit = (h1.wrapping_add((i as u64).wrapping_mul(h2)) % self.num_bits as u64) as usize;
            self.bits[bit / 64] |= 1u64 << (bit % 64);
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        let (h1, h2) = Self::hash_pair(key);
        (0..self.num_hashes).all(|i| {
            let bit = (h1.wrapping_add((i as u64).wrapping_mul(h2)) % self.num_bits as u64) as usize;
            self.bits[bit / 64] & (1u64 << (bit % 64)) != 0
        })
    }
}

/// Ranked cross-batch candidate.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub entity_id: Uuid,
    pub label: String,
    pub score: f32,
}

struct ScopeState {
    filter: SignatureFilter,
    warmed: bool,
}

/// Per-scope registry state. The write lock serializes the
/// check-then-create window of cross-batch resolution so two identical
/// mentions cannot race into two distinct new entities.
pub struct ScopeRegistry {
    pub write_lock: Mutex<()>,
    state: std::sync::RwLock<ScopeState>,
}

impl ScopeRegistry {
    fn new(config: &ResolutionConfig) -> Self {
        Self {
            write_lock: Mutex::new(()),
            state: std::sync::RwLock::new(ScopeState {
                filter: SignatureFilter::new(config.filter_capacity, config.filter_fp_rate),
                warmed: false,
            }),
        }
    }

    pub fn might_contain(&self, signature: &str) -> bool {
        self.state.read().expect("filter lock poisoned").filter.contains(signature)
    }

    pub fn register(&self, signature: &str) {
        self.state
            .write()
            .expect("filter lock poisoned")
            .filter
            .insert(signature);
    }
}

/// Candidate search against previously persisted entities, accelerated by a
/// probabilistic negative filter per org scope. Owned and injected
/// explicitly; initialized at service start, reset only at test boundaries.
pub struct EntityRegistry {
    entities: Arc<dyn EntityRepository>,
    config: ResolutionConfig,
    scopes: RwLock<HashMap<String, Arc<ScopeRegistry>>>,
}

impl EntityRegistry {
    pub fn new(entities: Arc<dyn EntityRepository>, config: ResolutionConfig) -> Self {
        Self {
            entities,
            config,
            scopes: RwLock::new(HashMap::new()),
        }
    }

    pub async fn scope(&self, org_id: &str) -> Arc<ScopeRegistry> {
        if let Some(scope) = self.scopes.read().await.get(org_id) {
            return scope.clone();
        }
        let mut scopes = self.scopes.write().await;
        scopes
            .entry(org_id.to_string())
            .or_insert_with(|| Arc::new(ScopeRegistry::new(&self.config)))
            .clone()
    }

    /// Loads signatures of already persisted entities into the scope filter.
    /// Runs once per scope; later calls are no-ops.
    pub async fn warm(&self, org_id: &str) -> PersistenceResult<usize> {
        let scope = self.scope(org_id).await;
        {
            let state = scope.state.read().expect("filter lock poisoned");
            if state.warmed {
                return Ok(0);
            }
        }
        let entities = self.entities.list_by_org(org_id).await?;
        let mut state = scope.state.write().expect("filter lock poisoned");
        if state.warmed {
            return Ok(0);
        }
        let mut loaded = 0usize;
        for entity in &entities {
            state.filter.insert(&entity.normalized_label());
            loaded += 1;
        }
        state.warmed = true;
        info!("warmed registry for scope {} with {} signatures", org_id, loaded);
        Ok(loaded)
    }

    /// Two-phase lookup: the filter rejects signatures that were never
    /// registered without touching the store; survivors are ranked by the
    /// blended embedding/label score. `exclude` hides the provisional
    /// entities of the batch currently being resolved so they cannot match
    /// themselves or each other.
    pub async fn find_candidates(
        &self,
        org_id: &str,
        text: &str,
        embedding: Option<&[f32]>,
        exclude: &[Uuid],
    ) -> PersistenceResult<Vec<ScoredCandidate>> {
        let signature = normalize_text(text);
        let scope = self.scope(org_id).await;
        if !scope.might_contain(&signature) {
            debug!("filter rejected signature for '{}'", text);
            return Ok(Vec::new());
        }

        let entities = self.entities.list_by_org(org_id).await?;
        let mut candidates: Vec<ScoredCandidate> = entities
            .iter()
            .filter(|e| !exclude.contains(&e.id))
            .map(|e| {
                let embedding_sim = match (embedding, e.embedding.as_deref()) {
                    (Some(q), Some(v)) => Some(cosine_similarity(q, v)),
                    _ => None,
                };
                let label_sim = label_similarity(text, &e.label);
                ScoredCandidate {
                    entity_id: e.id,
                    label: e.label.clone(),
                    score: blended_score(embedding_sim, label_sim, &self.config),
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.entity_id.cmp(&b.entity_id))
        });
        candidates.truncate(self.config.max_candidates);
        Ok(candidates)
    }

    pub fn link_threshold(&self) -> f32 {
        self.config.link_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Entity;
    use crate::storage::MemoryStore;

    #[test]
    fn filter_never_forgets_an_inserted_key() {
        let mut filter = SignatureFilter::new(1000, 0.01);
        for i in 0..500 {
            filter.insert(&format!("entity-{i}"));
        }
        for i in 0..500 {
            assert!(filter.contains(&format!("entity-{i}")));
        }
    }

    #[test]
    fn filter_rejects_most_unknown_keys() {
        let mut filter = SignatureFilter::new(1000, 0.01);
        for i in 0..500 {
            filter.insert(&format!("entity-{i}"));
        }
        let false_positives = (0..1000)
            .filter(|i| filter.contains(&format!("unknown-{i}")))
            .count();
        assert!(false_positives < 50, "fp count {false_positives}");
    }

    #[tokio::test]
    async fn unregistered_signature_skips_the_store() {
        let store = Arc::new(MemoryStore::default());
        let registry = EntityRegistry::new(store.clone(), ResolutionConfig::default());

        let candidates = registry
            .find_candidates("org-1", "Ada Lovelace", None, &[])
            .await
            .unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn warmed_registry_surfaces_persisted_entities() {
        let store = Arc::new(MemoryStore::default());
        let mut entity = Entity::new("org-1", "Ada Lovelace", vec!["person".into()]);
        entity.embedding = Some(vec![1.0, 0.0]);
        EntityRepository::insert(store.as_ref(), &entity).await.unwrap();

        let registry = EntityRegistry::new(store.clone(), ResolutionConfig::default());
        registry.warm("org-1").await.unwrap();

        let candidates = registry
            .find_candidates("org-1", "ada lovelace", Some(&[1.0, 0.0]), &[])
            .await
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].entity_id, entity.id);
        assert!(candidates[0].score > 0.9);
    }
}
