//! Tests for error types

use chrono::NaiveDate;
use crew_rota::core::{CellKey, PlanningError};

fn cell() -> CellKey {
    CellKey::new("van", NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(), "am")
}

#[test]
fn test_capacity_exceeded_error() {
    let err = PlanningError::CapacityExceeded {
        cell: cell(),
        capacity: 4,
    };
    assert_eq!(format!("{}", err), "capacity exceeded for van@2025-03-04/am: 4 place(s)");
}

#[test]
fn test_conflict_violation_error() {
    let err = PlanningError::ConflictViolation {
        cell: cell(),
        employee: "jack".into(),
        occupant: "margot".into(),
        group: "transit".into(),
    };
    assert_eq!(
        format!("{}", err),
        "jack cannot share van@2025-03-04/am with margot (conflict group `transit`)"
    );
}

#[test]
fn test_not_available_error() {
    let err = PlanningError::NotAvailable {
        employee: "ann".into(),
        date: NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(),
    };
    assert_eq!(format!("{}", err), "ann is not available on 2025-03-04");
}

#[test]
fn test_invalid_rule_error() {
    let err = PlanningError::InvalidRuleDefinition {
        resource: "grill".into(),
        reason: "max must be greater than 0".into(),
    };
    assert_eq!(
        format!("{}", err),
        "invalid rule definition for `grill`: max must be greater than 0"
    );
}

#[test]
fn test_persistence_failure_error() {
    let err = PlanningError::PersistenceFailure("connection failed".to_string());
    assert_eq!(format!("{}", err), "persistence failure: connection failed");
}

#[test]
fn test_errors_convert_into_anyhow() {
    let result: crew_rota::core::AppResult<()> = Err(PlanningError::CellClosed(cell()).into());
    assert_eq!(result.unwrap_err().to_string(), "van@2025-03-04/am is closed");
}
