//! Builders to construct planner components from configuration.

pub mod planner_builder;

pub use planner_builder::{build_catalog, build_engine, build_store};
