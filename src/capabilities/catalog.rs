use async_trait::async_trait;

use super::ExternalEntityCatalog;
use crate::errors::CapabilityResult;
use crate::models::CatalogCandidate;

/// Default catalog wired when no external authority is configured. Every
/// lookup returns no candidates, so reconciliation always decides `no_match`.
#[derive(Debug, Clone, Default)]
pub struct NoopCatalog;

#[async_trait]
impl ExternalEntityCatalog for NoopCatalog {
    async fn search_entities(
        &self,
        _label: &str,
        _language: &str,
        _limit: usize,
    ) -> CapabilityResult<Vec<CatalogCandidate>> {
        Ok(Vec::new())
    }
}
