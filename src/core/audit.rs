//! Audit trail of board mutations, generation runs and sync events.

use std::collections::VecDeque;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::model::{CellKey, EmployeeId};
use crate::util::clock::now_ms;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A generation run replaced the day.
    Generate,
    /// Employee placed from the pool.
    Assign,
    /// Assignment relocated.
    Move,
    /// Assignment removed.
    Unassign,
    /// Role changed.
    SetRole,
    /// Mutation refused by a capacity or conflict check.
    Reject,
    /// Day written to the store.
    Save,
    /// Day reloaded from the store, local edits dropped.
    Reload,
}

/// Audit event structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event identifier.
    pub event_id: String,
    /// Action taken.
    pub action: AuditAction,
    /// Date concerned.
    pub date: NaiveDate,
    /// Cell concerned, if any.
    pub cell: Option<CellKey>,
    /// Employee concerned, if any.
    pub employee_id: Option<EmployeeId>,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
    /// Additional context.
    pub detail: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: AuditEvent);
}

/// In-memory audit sink keeping the most recent events.
pub struct InMemoryAuditSink {
    events: VecDeque<AuditEvent>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.iter().cloned().collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

/// Sink that forwards events to `tracing` only.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&mut self, event: AuditEvent) {
        tracing::info!(
            event_id = %event.event_id,
            action = ?event.action,
            date = %event.date,
            employee = event.employee_id.as_deref().unwrap_or("-"),
            "audit"
        );
    }
}

/// Helper to build an audit event with a fresh id and timestamp.
pub fn build_audit_event(
    action: AuditAction,
    date: NaiveDate,
    cell: Option<&CellKey>,
    employee_id: Option<&str>,
    detail: Option<String>,
) -> AuditEvent {
    AuditEvent {
        event_id: uuid::Uuid::new_v4().to_string(),
        action,
        date,
        cell: cell.cloned(),
        employee_id: employee_id.map(str::to_string),
        created_at_ms: now_ms(),
        detail,
    }
}
