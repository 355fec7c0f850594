//! Tests for configuration validation

use std::time::Duration;

use chrono::Weekday;
use crew_rota::config::{PlannerConfig, StoreBackendConfig, SyncConfig};
use crew_rota::core::{RuleSet, DEFAULT_WORKLOAD_CAP};

#[test]
fn test_planner_config_defaults() {
    let cfg = PlannerConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.workload_cap, DEFAULT_WORKLOAD_CAP);
    assert_eq!(cfg.store, StoreBackendConfig::InMemory);
    assert_eq!(cfg.sync.debounce(), Duration::from_secs(2));
    assert_eq!(cfg.sync.poll_interval(), Duration::from_secs(30));
    assert_eq!(cfg.engine().workload_cap, DEFAULT_WORKLOAD_CAP);
}

#[test]
fn test_planner_config_invalid_workload_cap() {
    let invalid = PlannerConfig {
        workload_cap: 0,
        ..PlannerConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_planner_config_invalid_poll_interval() {
    let invalid = PlannerConfig {
        sync: SyncConfig {
            debounce_ms: 2_000,
            poll_interval_secs: 0,
        },
        ..PlannerConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_planner_config_invalid_rule_set() {
    let mut invalid = PlannerConfig::default();
    invalid
        .catalog
        .types
        .insert("grill".into(), RuleSet::bounded(4, 2));
    let err = invalid.validate().unwrap_err();
    assert!(err.contains("type `grill`"), "{err}");
}

#[test]
fn test_planner_config_invalid_file_path() {
    let invalid = PlannerConfig {
        store: StoreBackendConfig::File { path: "".into() },
        ..PlannerConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_from_json_str_fills_defaults() {
    let raw = r#"{
        "workload_cap": 2,
        "store": { "file": { "path": "/tmp/rota.json" } },
        "catalog": {
            "strict": true,
            "types": {
                "transit": {
                    "min": 1,
                    "max": 4,
                    "priority": 1,
                    "cascade": [
                        { "employee_id": "jack" },
                        { "employee_id": "didier", "weekdays": ["Mon"] }
                    ]
                }
            },
            "resources": {
                "sandwichs": { "min": 5, "max": 6, "requires_competency": true,
                               "lead": { "competency": "chef" } }
            }
        }
    }"#;
    let cfg = PlannerConfig::from_json_str(raw).unwrap();
    assert_eq!(cfg.workload_cap, 2);
    assert_eq!(cfg.sync, SyncConfig::default());
    assert!(cfg.catalog.strict);

    let transit = &cfg.catalog.types["transit"];
    assert_eq!(transit.cascade[1].weekdays, vec![Weekday::Mon]);
    assert!(transit.slots.is_empty());

    let sandwichs = &cfg.catalog.resources["sandwichs"];
    assert_eq!(sandwichs.lead.as_ref().map(|l| l.min_level), Some(1));
    assert!(!sandwichs.allows_fallback());
}

#[test]
fn test_from_json_str_rejects_invalid() {
    assert!(PlannerConfig::from_json_str(r#"{ "workload_cap": 0 }"#).is_err());
    assert!(PlannerConfig::from_json_str("not json").is_err());
}
