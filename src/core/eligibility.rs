//! Per-date availability: who can be placed, which resources are closed.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;

use crate::core::model::{Absence, AbsenceKind, Employee, EmployeeId, ResourceId};

/// Employees not blocked by an absence on `date`, in roster order.
///
/// Appointments never block; use [`appointment_notes`] to annotate them.
pub fn available_pool<'a>(
    date: NaiveDate,
    roster: &'a [Employee],
    absences: &[Absence],
) -> Vec<&'a Employee> {
    let blocked: BTreeSet<&str> = absences
        .iter()
        .filter(|a| a.blocks_employee() && a.covers(date))
        .filter_map(|a| a.employee_id.as_deref())
        .collect();
    roster
        .iter()
        .filter(|e| !blocked.contains(e.id.as_str()))
        .collect()
}

/// Resource closures in force on one date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Closures {
    all: bool,
    resources: BTreeSet<ResourceId>,
}

impl Closures {
    /// Whether the resource is closed.
    pub fn is_closed(&self, resource_id: &str) -> bool {
        self.all || self.resources.contains(resource_id)
    }

    /// Whether nothing is closed.
    pub fn is_empty(&self) -> bool {
        !self.all && self.resources.is_empty()
    }
}

/// Closures covering `date`. A closure without resource id closes everything.
pub fn closures_on(date: NaiveDate, absences: &[Absence]) -> Closures {
    let mut closures = Closures::default();
    for absence in absences
        .iter()
        .filter(|a| a.is_resource_closure() && a.covers(date))
    {
        match &absence.resource_id {
            Some(id) => {
                closures.resources.insert(id.clone());
            }
            None => closures.all = true,
        }
    }
    closures
}

/// Notes for employees with an appointment on `date`.
pub fn appointment_notes(date: NaiveDate, absences: &[Absence]) -> HashMap<EmployeeId, String> {
    let mut notes = HashMap::new();
    for absence in absences
        .iter()
        .filter(|a| a.kind == AbsenceKind::Appointment && a.covers(date))
    {
        let Some(employee) = &absence.employee_id else {
            continue;
        };
        let note = absence.time.map_or_else(
            || "appointment".to_string(),
            |t| format!("appointment at {}", t.format("%H:%M")),
        );
        notes.insert(employee.clone(), note);
    }
    notes
}
