//! Build the rule catalog, the engine and the store backend from configuration.

use std::sync::Arc;

use crate::config::{CatalogConfig, PlannerConfig, StoreBackendConfig};
use crate::core::{AllocationEngine, AssignmentStore, PlanningError, RuleCatalog};
use crate::infra::{InMemoryStore, JsonFileStore};

/// Rule catalog from configuration, every rule set validated.
pub fn build_catalog(cfg: &CatalogConfig) -> Result<RuleCatalog, PlanningError> {
    let mut catalog = RuleCatalog::new().strict(cfg.strict);
    for (resource_type, rules) in &cfg.types {
        catalog = catalog.with_type(resource_type.clone(), rules.clone());
    }
    for (resource_id, rules) in &cfg.resources {
        catalog = catalog.with_resource(resource_id.clone(), rules.clone());
    }
    catalog.validate()?;
    Ok(catalog)
}

/// Allocation engine from configuration.
pub fn build_engine(cfg: &PlannerConfig) -> Result<AllocationEngine, PlanningError> {
    cfg.validate()
        .map_err(|reason| PlanningError::InvalidRuleDefinition {
            resource: "config".into(),
            reason,
        })?;
    Ok(AllocationEngine::new(build_catalog(&cfg.catalog)?, cfg.engine()))
}

/// Store backend from configuration.
pub fn build_store(cfg: &StoreBackendConfig) -> Result<Arc<dyn AssignmentStore>, PlanningError> {
    let store: Arc<dyn AssignmentStore> = match cfg {
        StoreBackendConfig::InMemory => Arc::new(InMemoryStore::new()),
        StoreBackendConfig::File { path } => Arc::new(JsonFileStore::new(path)?),
    };
    tracing::info!(backend = ?cfg, "assignment store ready");
    Ok(store)
}
