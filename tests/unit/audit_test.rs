//! Tests for audit sink

use chrono::NaiveDate;
use crew_rota::core::{build_audit_event, AuditAction, AuditSink, CellKey, InMemoryAuditSink};

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 4).unwrap()
}

#[test]
fn test_in_memory_audit_sink() {
    let mut sink = InMemoryAuditSink::new(10);
    let cell = CellKey::new("van", date(), "day");

    let event = build_audit_event(
        AuditAction::Assign,
        date(),
        Some(&cell),
        Some("ann"),
        Some("payload".to_string()),
    );

    sink.record(event.clone());
    assert_eq!(sink.events().len(), 1);

    let events = sink.events();
    assert_eq!(events[0], event);
    assert_eq!(events[0].cell.as_ref(), Some(&cell));
    assert_eq!(events[0].employee_id.as_deref(), Some("ann"));
}

#[test]
fn test_audit_sink_overflow() {
    let mut sink = InMemoryAuditSink::new(2);

    sink.record(build_audit_event(AuditAction::Assign, date(), None, Some("a"), None));
    sink.record(build_audit_event(AuditAction::Move, date(), None, Some("b"), None));
    sink.record(build_audit_event(AuditAction::Unassign, date(), None, Some("c"), None));

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].action, AuditAction::Move); // First one popped
    assert_eq!(events[1].action, AuditAction::Unassign);
}

#[test]
fn test_build_audit_event() {
    let first = build_audit_event(AuditAction::Generate, date(), None, None, None);
    let second = build_audit_event(AuditAction::Generate, date(), None, None, None);

    assert_ne!(first.event_id, second.event_id);
    assert!(uuid::Uuid::parse_str(&first.event_id).is_ok());
    assert!(first.created_at_ms > 0);
    assert!(first.cell.is_none());
}

#[test]
fn test_audit_event_serializes_action_in_snake_case() {
    let event = build_audit_event(AuditAction::SetRole, date(), None, None, None);
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["action"], "set_role");
    assert_eq!(json["date"], "2025-03-04");
}
