//! Pure predicates over who may share a cell and who may lead.

use crate::core::model::{Employee, EmployeeId};

/// Outcome of [`can_join`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinCheck {
    /// No occupant conflicts with the candidate.
    Allowed,
    /// The candidate shares a conflict group with an occupant.
    Conflict {
        /// First conflicting occupant.
        occupant: EmployeeId,
        /// Shared group.
        group: String,
    },
}

impl JoinCheck {
    /// Whether the candidate may join.
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// False iff both employees carry the same conflict group.
pub fn can_share_cell(a: &Employee, b: &Employee) -> bool {
    match (&a.conflict_group, &b.conflict_group) {
        (Some(x), Some(y)) => x != y,
        _ => true,
    }
}

/// Check a candidate against the current occupants of a cell.
pub fn can_join<'a, I>(occupants: I, candidate: &Employee) -> JoinCheck
where
    I: IntoIterator<Item = &'a Employee>,
{
    for occupant in occupants {
        if occupant.id != candidate.id && !can_share_cell(occupant, candidate) {
            return JoinCheck::Conflict {
                occupant: occupant.id.clone(),
                group: candidate.conflict_group.clone().unwrap_or_default(),
            };
        }
    }
    JoinCheck::Allowed
}

/// False iff the employee is flagged never-lead.
pub const fn can_lead(employee: &Employee) -> bool {
    !employee.never_lead
}

/// Whether the employee may drive: licensed and allowed to lead.
pub const fn can_drive(employee: &Employee) -> bool {
    employee.has_license && can_lead(employee)
}
