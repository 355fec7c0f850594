//! Configuration models for the engine, the store backend and synchronisation.

pub mod planner;

pub use planner::{CatalogConfig, PlannerConfig, StoreBackendConfig, SyncConfig};
