//! Error types for rota planning operations.

use chrono::NaiveDate;
use thiserror::Error;

use crate::core::model::{CellKey, EmployeeId};

/// Errors produced by the rule catalog, the board store and the persistence layer.
///
/// Under-staffed cells are not errors; the engine reports them as
/// [`AllocationWarning`](crate::core::AllocationWarning) values instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanningError {
    /// The target cell is already at its capacity for that slot.
    #[error("capacity exceeded for {cell}: {capacity} place(s)")]
    CapacityExceeded {
        /// Cell that rejected the placement.
        cell: CellKey,
        /// Capacity of the cell.
        capacity: u32,
    },
    /// The candidate shares a conflict group with an occupant.
    #[error("{employee} cannot share {cell} with {occupant} (conflict group `{group}`)")]
    ConflictViolation {
        /// Cell that rejected the placement.
        cell: CellKey,
        /// Candidate employee.
        employee: EmployeeId,
        /// Occupant the candidate conflicts with.
        occupant: EmployeeId,
        /// Shared conflict group.
        group: String,
    },
    /// The employee is absent or already placed elsewhere that day.
    #[error("{employee} is not available on {date}")]
    NotAvailable {
        /// Employee identifier.
        employee: EmployeeId,
        /// Date of the attempted placement.
        date: NaiveDate,
    },
    /// A never-lead employee was given the lead role.
    #[error("{employee} may not hold the lead role")]
    LeadNotAllowed {
        /// Employee identifier.
        employee: EmployeeId,
    },
    /// The post only accepts employees holding its competency.
    #[error("{employee} lacks the `{competency}` competency required by {cell}")]
    IncompetentPlacement {
        /// Cell that rejected the placement.
        cell: CellKey,
        /// Employee identifier.
        employee: EmployeeId,
        /// Competency the post requires.
        competency: String,
    },
    /// The employee already occupies the cell.
    #[error("{employee} is already placed in {cell}")]
    AlreadyPlaced {
        /// Cell holding the employee.
        cell: CellKey,
        /// Employee identifier.
        employee: EmployeeId,
    },
    /// The resource is closed for that date.
    #[error("{0} is closed")]
    CellClosed(CellKey),
    /// No such cell on the board.
    #[error("unknown cell {0}")]
    UnknownCell(CellKey),
    /// No such employee in the roster snapshot.
    #[error("unknown employee {0}")]
    UnknownEmployee(EmployeeId),
    /// No assignment at the given index.
    #[error("no assignment at index {index} in {cell}")]
    UnknownPlacement {
        /// Cell that was addressed.
        cell: CellKey,
        /// Out-of-range index.
        index: usize,
    },
    /// Rule set is structurally invalid, or no rule applies and the catalog is strict.
    #[error("invalid rule definition for `{resource}`: {reason}")]
    InvalidRuleDefinition {
        /// Resource identifier or resource type.
        resource: String,
        /// What is wrong with it.
        reason: String,
    },
    /// The shared store is unreachable or rejected the write.
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
    /// The shared store holds newer data than this session.
    #[error("newer assignments for {date} were saved elsewhere; local edits were discarded")]
    StaleRead {
        /// Date that was reloaded.
        date: NaiveDate,
    },
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
