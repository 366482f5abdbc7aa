use std::sync::Arc;

use uuid::Uuid;

use crate::capabilities::{
    EmbeddingProvider, ExternalEntityCatalog, LanguageModel, NoopCatalog, OntologyIndex,
};
use crate::config::{GraphRagConfig, PipelineConfig, ReconciliationConfig, ResolutionConfig};
use crate::errors::GraphFuseResult;
use crate::graph_rag::GraphRagService;
use crate::models::{
    BatchReport, ContextBundle, ExternalLink, MentionRecord, ReconciliationOutcome,
    ResolutionReport,
};
use crate::pipeline::{DocumentInput, ExtractionPipeline};
use crate::reconciliation::ReconciliationService;
use crate::resolution::{CrossBatchResolver, EntityRegistry};
use crate::storage::GraphStore;

/// All tunables in one place, defaulted per component.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub pipeline: PipelineConfig,
    pub resolution: ResolutionConfig,
    pub reconciliation: ReconciliationConfig,
    pub graph_rag: GraphRagConfig,
}

/// Composition root: wires the extraction pipeline, resolvers,
/// reconciliation and retrieval over one shared store and capability set,
/// and exposes the public operations of the engine.
pub struct KnowledgeEngine {
    store: GraphStore,
    pipeline: ExtractionPipeline,
    resolver: Arc<CrossBatchResolver>,
    reconciliation: ReconciliationService,
    graph_rag: GraphRagService,
}

impl KnowledgeEngine {
    pub fn new(
        store: GraphStore,
        embeddings: Arc<dyn EmbeddingProvider>,
        model: Option<Arc<dyn LanguageModel>>,
        ontology: Arc<dyn OntologyIndex>,
        catalog: Arc<dyn ExternalEntityCatalog>,
        config: EngineConfig,
    ) -> Self {
        let registry = Arc::new(EntityRegistry::new(
            store.entities.clone(),
            config.resolution.clone(),
        ));
        let resolver = Arc::new(CrossBatchResolver::new(
            store.clone(),
            registry,
            embeddings.clone(),
            config.resolution.clone(),
        ));
        let pipeline = ExtractionPipeline::new(
            store.clone(),
            embeddings.clone(),
            model,
            ontology,
            resolver.clone(),
            config.pipeline,
            config.resolution,
        );
        let reconciliation = ReconciliationService::new(
            catalog,
            store.links.clone(),
            store.tasks.clone(),
            config.reconciliation,
        );
        let graph_rag = GraphRagService::new(store.clone(), embeddings, config.graph_rag);

        Self {
            store,
            pipeline,
            resolver,
            reconciliation,
            graph_rag,
        }
    }

    /// In-memory composition with the no-op catalog, for tests and local
    /// experimentation.
    pub fn in_memory(
        embeddings: Arc<dyn EmbeddingProvider>,
        model: Option<Arc<dyn LanguageModel>>,
        ontology: Arc<dyn OntologyIndex>,
    ) -> Self {
        Self::new(
            GraphStore::in_memory(),
            embeddings,
            model,
            ontology,
            Arc::new(NoopCatalog),
            EngineConfig::default(),
        )
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    /// Runs (or resumes) one extraction batch end to end.
    pub async fn ingest(
        &self,
        org_id: &str,
        batch_id: Uuid,
        documents: Vec<DocumentInput>,
    ) -> GraphFuseResult<BatchReport> {
        self.pipeline.run_batch(org_id, batch_id, documents).await
    }

    /// Resolves standalone mentions against history, outside a pipeline run.
    pub async fn resolve_mentions(
        &self,
        org_id: &str,
        mentions: Vec<MentionRecord>,
    ) -> GraphFuseResult<ResolutionReport> {
        self.resolver.resolve_mentions(org_id, mentions).await
    }

    pub async fn reconcile_entity(
        &self,
        entity_id: Uuid,
        label: &str,
    ) -> GraphFuseResult<ReconciliationOutcome> {
        Ok(self.reconciliation.reconcile(entity_id, label).await?)
    }

    pub async fn reconcile_entity_with(
        &self,
        entity_id: Uuid,
        label: &str,
        config: &ReconciliationConfig,
    ) -> GraphFuseResult<ReconciliationOutcome> {
        Ok(self
            .reconciliation
            .reconcile_with(entity_id, label, config)
            .await?)
    }

    pub async fn approve_task(
        &self,
        task_id: Uuid,
        chosen_id: &str,
    ) -> GraphFuseResult<ExternalLink> {
        Ok(self.reconciliation.approve_task(task_id, chosen_id).await?)
    }

    pub async fn reject_task(&self, task_id: Uuid) -> GraphFuseResult<()> {
        Ok(self.reconciliation.reject_task(task_id).await?)
    }

    /// Graph-grounded retrieval over everything ingested so far.
    pub async fn query(
        &self,
        org_id: &str,
        text: &str,
        k: Option<usize>,
        max_hops: Option<usize>,
    ) -> GraphFuseResult<ContextBundle> {
        self.graph_rag.query(org_id, text, k, max_hops).await
    }
}
