use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::capabilities::{retry::with_backoff_ms, ExternalEntityCatalog};
use crate::config::ReconciliationConfig;
use crate::errors::{PersistenceError, ReconciliationCause, ReconciliationError};
use crate::models::{
    CatalogCandidate, ExternalLink, ReconciliationDecision, ReconciliationOutcome, TaskStatus,
    VerificationTask,
};
use crate::storage::{ExternalLinkRepository, VerificationTaskRepository};

type ReconResult<T> = Result<T, ReconciliationError>;

/// Links persisted entities to an external authority catalog.
///
/// `reconcile` is idempotent per entity: an already-linked entity is a
/// `skipped` no-op. Threshold policy on the best candidate score:
/// `auto_link_threshold` and above links immediately, `queue_threshold` and
/// above opens a verification task, anything lower is `no_match`.
pub struct ReconciliationService {
    catalog: Arc<dyn ExternalEntityCatalog>,
    links: Arc<dyn ExternalLinkRepository>,
    tasks: Arc<dyn VerificationTaskRepository>,
    config: ReconciliationConfig,
}

impl ReconciliationService {
    pub fn new(
        catalog: Arc<dyn ExternalEntityCatalog>,
        links: Arc<dyn ExternalLinkRepository>,
        tasks: Arc<dyn VerificationTaskRepository>,
        config: ReconciliationConfig,
    ) -> Self {
        Self {
            catalog,
            links,
            tasks,
            config,
        }
    }

    pub async fn reconcile(&self, entity_id: Uuid, label: &str) -> ReconResult<ReconciliationOutcome> {
        self.reconcile_with(entity_id, label, &self.config).await
    }

    /// Same as `reconcile` with per-call threshold overrides.
    pub async fn reconcile_with(
        &self,
        entity_id: Uuid,
        label: &str,
        config: &ReconciliationConfig,
    ) -> ReconResult<ReconciliationOutcome> {
        let wrap = |cause: ReconciliationCause| ReconciliationError::new(entity_id.to_string(), cause);

        if let Some(link) = self
            .links
            .find(entity_id)
            .await
            .map_err(|e| wrap(e.into()))?
        {
            info!("entity {} already linked to {}, skipping", entity_id, link.external_id);
            return Ok(ReconciliationOutcome {
                entity_id,
                decision: ReconciliationDecision::Skipped,
                link: Some(link),
                task_id: None,
                best_score: None,
            });
        }

        let candidates = with_backoff_ms(
            "catalog search",
            config.max_attempts,
            config.retry_base_delay_ms,
            || {
                self.catalog
                    .search_entities(label, &config.language, config.max_candidates)
            },
        )
        .await
        .map_err(|e| wrap(e.into()))?;

        let best_score = candidates.first().map(|c| c.score);
        match candidates.first() {
            Some(best) if best.score >= config.auto_link_threshold => {
                let link = self.make_link(entity_id, best);
                self.links
                    .insert_if_absent(&link)
                    .await
                    .map_err(|e| wrap(e.into()))?;
                info!(
                    "auto-linked entity {} to {} (score {:.1})",
                    entity_id, best.id, best.score
                );
                Ok(ReconciliationOutcome {
                    entity_id,
                    decision: ReconciliationDecision::AutoLinked,
                    link: Some(link),
                    task_id: None,
                    best_score,
                })
            }
            Some(best) if best.score >= config.queue_threshold => {
                let task = VerificationTask::new(entity_id, label, candidates.clone());
                self.tasks
                    .insert(&task)
                    .await
                    .map_err(|e| wrap(e.into()))?;
                info!(
                    "queued entity {} for review (best score {:.1}, task {})",
                    entity_id, best.score, task.id
                );
                Ok(ReconciliationOutcome {
                    entity_id,
                    decision: ReconciliationDecision::Queued,
                    link: None,
                    task_id: Some(task.id),
                    best_score,
                })
            }
            _ => Ok(ReconciliationOutcome {
                entity_id,
                decision: ReconciliationDecision::NoMatch,
                link: None,
                task_id: None,
                best_score,
            }),
        }
    }

    /// Terminal transition: persists the chosen link and flips the task to
    /// approved. Guarded by an expected-version compare; a conflict is
    /// re-read and retried once before surfacing.
    pub async fn approve_task(&self, task_id: Uuid, chosen_id: &str) -> ReconResult<ExternalLink> {
        let mut attempts = 0;
        loop {
            let task = self.load_pending(task_id).await?;
            let candidate = task
                .candidates
                .iter()
                .find(|c| c.id == chosen_id)
                .ok_or_else(|| {
                    ReconciliationError::new(
                        task.entity_label.clone(),
                        ReconciliationCause::InvalidTaskState(format!(
                            "candidate {chosen_id} is not on task {task_id}"
                        )),
                    )
                })?
                .clone();

            let mut updated = task.clone();
            updated.status = TaskStatus::Approved;
            updated.chosen_candidate_id = Some(chosen_id.to_string());
            updated.version += 1;
            updated.updated_at = chrono::Utc::now();

            match self.tasks.update_with_version(&updated, task.version).await {
                Ok(()) => {
                    let link = self.make_link(task.entity_id, &candidate);
                    self.links.insert_if_absent(&link).await.map_err(|e| {
                        ReconciliationError::new(task.entity_label.clone(), ReconciliationCause::from(e))
                    })?;
                    info!("task {} approved with candidate {}", task_id, chosen_id);
                    return Ok(link);
                }
                Err(PersistenceError::Conflict { .. }) if attempts == 0 => {
                    warn!("task {} version conflict on approve, retrying once", task_id);
                    attempts += 1;
                }
                Err(e) => {
                    return Err(ReconciliationError::new(task.entity_label.clone(), ReconciliationCause::from(e)))
                }
            }
        }
    }

    /// Terminal transition: flips the task to rejected; no link is written.
    pub async fn reject_task(&self, task_id: Uuid) -> ReconResult<()> {
        let mut attempts = 0;
        loop {
            let task = self.load_pending(task_id).await?;
            let mut updated = task.clone();
            updated.status = TaskStatus::Rejected;
            updated.version += 1;
            updated.updated_at = chrono::Utc::now();

            match self.tasks.update_with_version(&updated, task.version).await {
                Ok(()) => {
                    info!("task {} rejected", task_id);
                    return Ok(());
                }
                Err(PersistenceError::Conflict { .. }) if attempts == 0 => {
                    warn!("task {} version conflict on reject, retrying once", task_id);
                    attempts += 1;
                }
                Err(e) => {
                    return Err(ReconciliationError::new(task.entity_label.clone(), ReconciliationCause::from(e)))
                }
            }
        }
    }

    async fn load_pending(&self, task_id: Uuid) -> ReconResult<VerificationTask> {
        let task = self
            .tasks
            .find(task_id)
            .await
            .map_err(|e| ReconciliationError::new(task_id.to_string(), ReconciliationCause::from(e)))?
            .ok_or_else(|| {
                ReconciliationError::new(
                    task_id.to_string(),
                    ReconciliationCause::Persistence(PersistenceError::NotFound(format!(
                        "task {task_id}"
                    ))),
                )
            })?;
        if task.status.is_terminal() {
            return Err(ReconciliationError::new(
                task.entity_label.clone(),
                ReconciliationCause::InvalidTaskState(format!(
                    "task {} is already {}",
                    task_id,
                    task.status.as_str()
                )),
            ));
        }
        Ok(task)
    }

    fn make_link(&self, entity_id: Uuid, candidate: &CatalogCandidate) -> ExternalLink {
        let uri = candidate
            .url
            .clone()
            .unwrap_or_else(|| format!("urn:catalog:{}", candidate.id));
        ExternalLink::new(entity_id, candidate.id.clone(), uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::capabilities::NoopCatalog;
    use crate::errors::CapabilityResult;
    use crate::storage::GraphStore;

    struct FixedCatalog {
        candidates: Vec<CatalogCandidate>,
    }

    #[async_trait]
    impl ExternalEntityCatalog for FixedCatalog {
        async fn search_entities(
            &self,
            _label: &str,
            _language: &str,
            limit: usize,
        ) -> CapabilityResult<Vec<CatalogCandidate>> {
            Ok(self.candidates.iter().take(limit).cloned().collect())
        }
    }

    fn candidate(id: &str, score: f64) -> CatalogCandidate {
        CatalogCandidate {
            id: id.to_string(),
            label: format!("candidate {id}"),
            description: None,
            url: Some(format!("https://catalog.example/{id}")),
            score,
        }
    }

    fn service(candidates: Vec<CatalogCandidate>) -> (ReconciliationService, GraphStore) {
        let store = GraphStore::in_memory();
        let service = ReconciliationService::new(
            Arc::new(FixedCatalog { candidates }),
            store.links.clone(),
            store.tasks.clone(),
            ReconciliationConfig::default(),
        );
        (service, store)
    }

    #[tokio::test]
    async fn score_at_auto_threshold_links_immediately() {
        let (service, store) = service(vec![candidate("Q1", 90.0)]);
        let entity_id = Uuid::new_v4();

        let outcome = service.reconcile(entity_id, "Ada Lovelace").await.unwrap();
        assert_eq!(outcome.decision, ReconciliationDecision::AutoLinked);
        assert!(store.links.find(entity_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn score_just_below_auto_threshold_queues() {
        let (service, store) = service(vec![candidate("Q1", 89.9)]);
        let entity_id = Uuid::new_v4();

        let outcome = service.reconcile(entity_id, "Ada Lovelace").await.unwrap();
        assert_eq!(outcome.decision, ReconciliationDecision::Queued);
        assert!(outcome.task_id.is_some());
        assert!(store.links.find(entity_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn queue_threshold_boundaries() {
        let (service, _) = service(vec![candidate("Q1", 50.0)]);
        let outcome = service.reconcile(Uuid::new_v4(), "x").await.unwrap();
        assert_eq!(outcome.decision, ReconciliationDecision::Queued);

        let (service, store) = self::service(vec![candidate("Q1", 49.9)]);
        let outcome = service.reconcile(Uuid::new_v4(), "x").await.unwrap();
        assert_eq!(outcome.decision, ReconciliationDecision::NoMatch);
        assert!(store.tasks.list_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_catalog_is_no_match_without_a_task() {
        let store = GraphStore::in_memory();
        let service = ReconciliationService::new(
            Arc::new(NoopCatalog),
            store.links.clone(),
            store.tasks.clone(),
            ReconciliationConfig::default(),
        );

        let outcome = service.reconcile(Uuid::new_v4(), "Ada Lovelace").await.unwrap();
        assert_eq!(outcome.decision, ReconciliationDecision::NoMatch);
        assert!(store.tasks.list_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reconcile_is_idempotent_for_linked_entities() {
        let (service, _) = service(vec![candidate("Q1", 95.0)]);
        let entity_id = Uuid::new_v4();

        let first = service.reconcile(entity_id, "Ada Lovelace").await.unwrap();
        assert_eq!(first.decision, ReconciliationDecision::AutoLinked);

        let second = service.reconcile(entity_id, "Ada Lovelace").await.unwrap();
        assert_eq!(second.decision, ReconciliationDecision::Skipped);
        let third = service.reconcile(entity_id, "Ada Lovelace").await.unwrap();
        assert_eq!(third.decision, ReconciliationDecision::Skipped);
    }

    #[tokio::test]
    async fn approve_persists_link_and_flips_status() {
        let (service, store) = service(vec![candidate("Q1", 70.0), candidate("Q2", 60.0)]);
        let entity_id = Uuid::new_v4();

        let outcome = service.reconcile(entity_id, "Ada Lovelace").await.unwrap();
        let task_id = outcome.task_id.unwrap();

        let link = service.approve_task(task_id, "Q2").await.unwrap();
        assert_eq!(link.external_id, "Q2");

        let task = store.tasks.find(task_id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Approved);
        assert_eq!(task.chosen_candidate_id.as_deref(), Some("Q2"));
        assert!(store.links.find(entity_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn reject_leaves_no_link() {
        let (service, store) = service(vec![candidate("Q1", 70.0)]);
        let entity_id = Uuid::new_v4();

        let outcome = service.reconcile(entity_id, "Ada Lovelace").await.unwrap();
        let task_id = outcome.task_id.unwrap();

        service.reject_task(task_id).await.unwrap();
        let task = store.tasks.find(task_id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Rejected);
        assert!(store.links.find(entity_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_terminal_transition_is_rejected() {
        let (service, _) = service(vec![candidate("Q1", 70.0)]);
        let outcome = service.reconcile(Uuid::new_v4(), "x").await.unwrap();
        let task_id = outcome.task_id.unwrap();

        service.approve_task(task_id, "Q1").await.unwrap();
        let err = service.reject_task(task_id).await.unwrap_err();
        assert!(matches!(
            err.source,
            ReconciliationCause::InvalidTaskState(_)
        ));
    }
}
