//! Interactive editing of a synced board.

use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;

use crate::core::{
    build_audit_event, AllocationWarning, AuditAction, AuditSink, CellKey, GenerationOutcome,
    PlanningError, Role,
};
use crate::runtime::sync::SyncAdapter;

/// Board edits as a user makes them: every successful mutation is audited and
/// arms a debounced save, every refusal is audited as a rejection.
pub struct BoardSession {
    adapter: SyncAdapter,
    audit: Arc<Mutex<dyn AuditSink>>,
}

impl BoardSession {
    /// Create a session over an adapter and a shared audit sink.
    pub fn new(adapter: SyncAdapter, audit: Arc<Mutex<dyn AuditSink>>) -> Self {
        Self { adapter, audit }
    }

    /// Underlying adapter.
    pub const fn adapter(&self) -> &SyncAdapter {
        &self.adapter
    }

    /// Place an employee with the default role.
    pub fn assign(&self, key: &CellKey, employee_id: &str) -> Result<Role, PlanningError> {
        let result = self.adapter.board().lock().assign(key, employee_id);
        self.settle(AuditAction::Assign, key, Some(employee_id), &result);
        result
    }

    /// Place an employee with an explicit role.
    pub fn assign_with_role(
        &self,
        key: &CellKey,
        employee_id: &str,
        role: Role,
    ) -> Result<(), PlanningError> {
        let result = self
            .adapter
            .board()
            .lock()
            .assign_with_role(key, employee_id, role);
        self.settle(AuditAction::Assign, key, Some(employee_id), &result);
        result
    }

    /// Relocate an assignment. Both dates are saved when they differ.
    pub fn move_assignment(
        &self,
        from: &CellKey,
        to: &CellKey,
        index: usize,
    ) -> Result<(), PlanningError> {
        let result = {
            let mut board = self.adapter.board().lock();
            let employee = board
                .cell(from)
                .and_then(|c| c.assignments().get(index))
                .map(|a| a.employee_id.clone());
            board.move_assignment(from, to, index).map(|()| employee)
        };
        match result {
            Ok(employee) => {
                self.record(
                    AuditAction::Move,
                    to,
                    employee.as_deref(),
                    Some(format!("from {from}")),
                );
                self.adapter.schedule_save(to.date);
                if from.date != to.date {
                    self.adapter.schedule_save(from.date);
                }
                Ok(())
            }
            Err(error) => {
                self.record(AuditAction::Reject, to, None, Some(error.to_string()));
                Err(error)
            }
        }
    }

    /// Remove an assignment, returning it to the pool.
    pub fn unassign(&self, key: &CellKey, index: usize) -> Result<(), PlanningError> {
        let result = self.adapter.board().lock().unassign(key, index);
        let employee = result.as_ref().ok().map(|a| a.employee_id.clone());
        let result = result.map(|_| ());
        self.settle(AuditAction::Unassign, key, employee.as_deref(), &result);
        result
    }

    /// Change the role of an assignment.
    pub fn set_role(&self, key: &CellKey, index: usize, role: Role) -> Result<(), PlanningError> {
        let result = self.adapter.board().lock().set_role(key, index, role);
        self.settle(AuditAction::SetRole, key, None, &result);
        result
    }

    /// Replace the generated dates on the board and schedule their saves.
    pub fn apply_generation(&self, outcome: GenerationOutcome) -> Vec<AllocationWarning> {
        let dates = outcome.board.dates();
        self.adapter.board().lock().merge(outcome.board);
        for date in &dates {
            self.record_on(
                AuditAction::Generate,
                *date,
                None,
                None,
                Some(format!("{} warnings", outcome.warnings.len())),
            );
            self.adapter.schedule_save(*date);
        }
        outcome.warnings
    }

    /// Show another date: the previous one is flushed, the new one loaded.
    ///
    /// A new date holding unsaved edits is saved instead of reloaded.
    pub async fn switch_date(&self, date: NaiveDate) -> Result<usize, PlanningError> {
        self.adapter.set_active_date(date).await?;
        if self.adapter.is_dirty(date) {
            self.adapter.flush(date).await?;
            return Ok(self.adapter.board().lock().rows_for(date).len());
        }
        let rows = self.adapter.load(date).await?;
        self.record_on(AuditAction::Reload, date, None, None, Some(format!("{rows} rows")));
        Ok(rows)
    }

    /// Write `date` now, skipping the debounce.
    pub async fn save_now(&self, date: NaiveDate) -> Result<(), PlanningError> {
        let outcome = self.adapter.flush(date).await?;
        self.record_on(AuditAction::Save, date, None, None, Some(format!("{outcome:?}")));
        Ok(())
    }

    fn settle<T>(
        &self,
        action: AuditAction,
        key: &CellKey,
        employee_id: Option<&str>,
        result: &Result<T, PlanningError>,
    ) {
        match result {
            Ok(_) => {
                self.record(action, key, employee_id, None);
                self.adapter.schedule_save(key.date);
            }
            Err(error) => {
                tracing::debug!(cell = %key, %error, "edit rejected");
                self.record(AuditAction::Reject, key, employee_id, Some(error.to_string()));
            }
        }
    }

    fn record(
        &self,
        action: AuditAction,
        key: &CellKey,
        employee_id: Option<&str>,
        detail: Option<String>,
    ) {
        self.audit
            .lock()
            .record(build_audit_event(action, key.date, Some(key), employee_id, detail));
    }

    fn record_on(
        &self,
        action: AuditAction,
        date: NaiveDate,
        cell: Option<&CellKey>,
        employee_id: Option<&str>,
        detail: Option<String>,
    ) {
        self.audit
            .lock()
            .record(build_audit_event(action, date, cell, employee_id, detail));
    }
}
