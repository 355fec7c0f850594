//! Tests for builder modules

use chrono::NaiveDate;
use crew_rota::builders::{build_catalog, build_engine, build_store};
use crew_rota::config::{CatalogConfig, PlannerConfig, StoreBackendConfig};
use crew_rota::core::{Employee, PlanningError, Resource, ResourceKind, RuleSet};

#[test]
fn test_build_catalog_prefers_resource_rules() {
    let mut cfg = CatalogConfig::default();
    cfg.types.insert("post".into(), RuleSet::bounded(1, 2));
    cfg.resources.insert("plonge".into(), RuleSet::bounded(2, 3));
    let catalog = build_catalog(&cfg).unwrap();

    let plonge = Resource::new("plonge", ResourceKind::Post, "post");
    let desk = Resource::new("desk", ResourceKind::Post, "post");
    assert_eq!(catalog.rules_for(&plonge).unwrap().max, 3);
    assert_eq!(catalog.rules_for(&desk).unwrap().max, 2);
}

#[test]
fn test_build_catalog_rejects_invalid_rules() {
    let mut cfg = CatalogConfig::default();
    cfg.types.insert("grill".into(), RuleSet::bounded(3, 0));
    assert!(matches!(
        build_catalog(&cfg),
        Err(PlanningError::InvalidRuleDefinition { .. })
    ));
}

#[test]
fn test_strict_catalog_rejects_unknown_types() {
    let cfg = CatalogConfig {
        strict: true,
        ..CatalogConfig::default()
    };
    let catalog = build_catalog(&cfg).unwrap();
    assert!(catalog.rules_for_type("unknown").is_err());
    assert!(build_catalog(&CatalogConfig::default())
        .unwrap()
        .rules_for_type("unknown")
        .is_ok());
}

#[test]
fn test_build_engine_applies_workload_cap() {
    let cfg = PlannerConfig {
        workload_cap: 1,
        ..PlannerConfig::default()
    };
    let engine = build_engine(&cfg).unwrap();
    assert_eq!(engine.config().workload_cap, 1);

    let roster = vec![Employee::new("ann", "Ann")];
    let resources = vec![
        Resource::new("p1", ResourceKind::Post, "post"),
        Resource::new("p2", ResourceKind::Post, "post"),
    ];
    let date = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
    let outcome = engine.generate(date, &roster, &resources, &[]);
    assert_eq!(outcome.board.rows_for(date).len(), 1);
}

#[test]
fn test_build_engine_rejects_invalid_config() {
    let cfg = PlannerConfig {
        workload_cap: 0,
        ..PlannerConfig::default()
    };
    assert!(build_engine(&cfg).is_err());
}

#[tokio::test]
async fn test_build_store_in_memory() {
    let store = build_store(&StoreBackendConfig::InMemory).unwrap();
    let date = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
    assert!(store.list_range(date, date).await.unwrap().is_empty());
}
