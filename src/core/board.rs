//! Board store: cells of ordered assignments plus the per-date unassigned pool.
//!
//! The pool is derived rather than stored: an employee is in the pool for a date
//! when no absence blocks them and they hold no vehicle seat that day. Posts clone
//! from the pool (the employee stays listed and may help on several posts);
//! vehicles move out of it (the employee leaves the pool until unassigned).
//! A vehicle seat and a cell of any other resource exclude each other per day.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDate;

use crate::core::conflict::{can_drive, can_join, can_lead, JoinCheck};
use crate::core::model::{
    Assignment, CellKey, Employee, EmployeeId, ResourceId, ResourceKind, Role,
};
use crate::core::PlanningError;

/// Static description of a cell, fixed when the cell is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellSpec {
    /// Vehicle or post.
    pub kind: ResourceKind,
    /// Maximum occupants.
    pub capacity: u32,
    /// Minimum occupants before the cell counts as incomplete.
    pub min: u32,
    /// Competency every occupant must hold, for strict posts.
    pub strict_competency: Option<String>,
    /// Closed cells accept nobody.
    pub closed: bool,
}

impl CellSpec {
    /// Open cell of the given kind and capacity.
    pub const fn new(kind: ResourceKind, capacity: u32) -> Self {
        Self {
            kind,
            capacity,
            min: 0,
            strict_competency: None,
            closed: false,
        }
    }
}

/// One cell: its spec and ordered occupants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    spec: CellSpec,
    assignments: Vec<Assignment>,
}

impl Cell {
    /// Cell description.
    pub const fn spec(&self) -> &CellSpec {
        &self.spec
    }

    /// Occupants in order.
    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    /// Whether the resource is closed for this cell.
    pub const fn is_closed(&self) -> bool {
        self.spec.closed
    }

    /// Number of occupants.
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Whether the cell has no occupant.
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    fn holds(&self, employee_id: &str) -> bool {
        self.assignments.iter().any(|a| a.employee_id == employee_id)
    }

    fn has_role(&self, role: Role) -> bool {
        self.assignments.iter().any(|a| a.role == role)
    }

    fn is_full(&self) -> bool {
        self.assignments.len() >= self.spec.capacity as usize
    }
}

/// A broken board invariant found by [`Board::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// More occupants than capacity.
    OverCapacity {
        /// Cell.
        cell: CellKey,
        /// Occupants.
        occupants: usize,
        /// Capacity.
        capacity: u32,
    },
    /// Two occupants share a conflict group.
    SharedConflictGroup {
        /// Cell.
        cell: CellKey,
        /// Group.
        group: String,
    },
    /// A never-lead employee holds the lead role.
    NeverLeadAsLead {
        /// Cell.
        cell: CellKey,
        /// Employee.
        employee: EmployeeId,
    },
    /// An employee is placed on a day they are absent.
    AbsentEmployeePlaced {
        /// Cell.
        cell: CellKey,
        /// Employee.
        employee: EmployeeId,
    },
    /// More than one lead in a cell.
    SeveralLeads {
        /// Cell.
        cell: CellKey,
    },
    /// A strict post holds an employee without its competency.
    MissingCompetency {
        /// Cell.
        cell: CellKey,
        /// Employee.
        employee: EmployeeId,
    },
    /// A closed cell has occupants.
    ClosedCellOccupied {
        /// Cell.
        cell: CellKey,
    },
    /// A vehicle occupant also holds a cell of another resource that day.
    VehicleSeatShared {
        /// Date.
        date: NaiveDate,
        /// Employee.
        employee: EmployeeId,
    },
}

/// In-memory board over one or more dates.
#[derive(Debug, Clone)]
pub struct Board {
    roster: Arc<BTreeMap<EmployeeId, Employee>>,
    cells: BTreeMap<CellKey, Cell>,
    /// Employees not blocked by an absence, in roster order.
    eligible: BTreeMap<NaiveDate, Vec<EmployeeId>>,
    revisions: BTreeMap<NaiveDate, u64>,
    /// Spec of every (resource, slot) pair seen, used to reopen stored rows.
    layouts: BTreeMap<(ResourceId, String), CellSpec>,
}

impl Board {
    /// Empty board over a roster snapshot.
    pub fn new(roster: &[Employee]) -> Self {
        Self::with_roster(Arc::new(
            roster.iter().map(|e| (e.id.clone(), e.clone())).collect(),
        ))
    }

    /// Empty board sharing an indexed roster.
    pub const fn with_roster(roster: Arc<BTreeMap<EmployeeId, Employee>>) -> Self {
        Self {
            roster,
            cells: BTreeMap::new(),
            eligible: BTreeMap::new(),
            revisions: BTreeMap::new(),
            layouts: BTreeMap::new(),
        }
    }

    /// Roster snapshot.
    pub fn roster(&self) -> &Arc<BTreeMap<EmployeeId, Employee>> {
        &self.roster
    }

    /// Look up an employee.
    pub fn employee(&self, employee_id: &str) -> Result<&Employee, PlanningError> {
        self.roster
            .get(employee_id)
            .ok_or_else(|| PlanningError::UnknownEmployee(employee_id.to_string()))
    }

    /// Declare the employees available on a date, in display order.
    pub fn open_day<I>(&mut self, date: NaiveDate, available: I)
    where
        I: IntoIterator<Item = EmployeeId>,
    {
        self.eligible.insert(date, available.into_iter().collect());
        self.revisions.entry(date).or_insert(0);
    }

    /// Add an empty cell. Reopening an existing cell keeps its occupants.
    pub fn open_cell(&mut self, key: CellKey, spec: CellSpec) {
        self.revisions.entry(key.date).or_insert(0);
        self.register_layout(key.resource_id.clone(), key.slot.clone(), spec.clone());
        self.cells
            .entry(key)
            .and_modify(|cell| cell.spec = spec.clone())
            .or_insert(Cell {
                spec,
                assignments: Vec::new(),
            });
    }

    /// Remember how cells of `resource_id`/`slot` are shaped on any date.
    ///
    /// Closures are per day, so the layout is always stored open.
    pub fn register_layout(&mut self, resource_id: ResourceId, slot: String, mut spec: CellSpec) {
        spec.closed = false;
        self.layouts.insert((resource_id, slot), spec);
    }

    /// Cell by key.
    pub fn cell(&self, key: &CellKey) -> Option<&Cell> {
        self.cells.get(key)
    }

    /// All cells in key order.
    pub fn cells(&self) -> impl Iterator<Item = (&CellKey, &Cell)> {
        self.cells.iter()
    }

    /// Cells of one date.
    pub fn cells_on(&self, date: NaiveDate) -> impl Iterator<Item = (&CellKey, &Cell)> {
        self.cells.iter().filter(move |(k, _)| k.date == date)
    }

    /// Dates the board covers.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.revisions.keys().copied().collect()
    }

    /// Occupant ids of a cell; empty for unknown cells.
    pub fn occupants(&self, key: &CellKey) -> Vec<&str> {
        self.cells.get(key).map_or_else(Vec::new, |c| {
            c.assignments.iter().map(|a| a.employee_id.as_str()).collect()
        })
    }

    /// Mutation counter of a date.
    pub fn revision(&self, date: NaiveDate) -> u64 {
        self.revisions.get(&date).copied().unwrap_or(0)
    }

    /// Employees free to be dragged onto a cell of that date.
    pub fn unassigned(&self, date: NaiveDate) -> Vec<&str> {
        self.eligible.get(&date).map_or_else(Vec::new, |ids| {
            ids.iter()
                .filter(|id| self.vehicle_holder(date, id, None).is_none())
                .map(String::as_str)
                .collect()
        })
    }

    /// Whether no absence keeps the employee off the board that day.
    pub fn is_eligible(&self, date: NaiveDate, employee_id: &str) -> bool {
        self.eligible
            .get(&date)
            .is_some_and(|ids| ids.iter().any(|id| id == employee_id))
    }

    /// Place an employee from the pool with the default role.
    ///
    /// On vehicles the first licensed occupant allowed to lead drives.
    pub fn assign(&mut self, key: &CellKey, employee_id: &str) -> Result<Role, PlanningError> {
        let cell = self.checked_cell(key)?;
        let employee = self.employee(employee_id)?;
        let role = if cell.spec.kind == ResourceKind::Vehicle
            && !cell.has_role(Role::Lead)
            && can_drive(employee)
        {
            Role::Lead
        } else {
            Role::Member
        };
        self.assign_with_role(key, employee_id, role)?;
        Ok(role)
    }

    /// Place an employee from the pool with an explicit role.
    ///
    /// A new lead or assistant demotes the previous holder of that role.
    pub fn assign_with_role(
        &mut self,
        key: &CellKey,
        employee_id: &str,
        role: Role,
    ) -> Result<(), PlanningError> {
        self.check_placement(key, employee_id, None)?;
        self.check_role(key, employee_id, role)?;
        let assignment = Assignment {
            employee_id: employee_id.to_string(),
            resource_id: key.resource_id.clone(),
            date: key.date,
            slot: key.slot.clone(),
            role,
            note: None,
        };
        self.push(key, assignment);
        tracing::debug!(cell = %key, employee = employee_id, ?role, "assigned");
        Ok(())
    }

    /// Relocate the assignment at `index` of `from` to the end of `to`.
    ///
    /// The role is kept unless `to` already has someone in it.
    pub fn move_assignment(
        &mut self,
        from: &CellKey,
        to: &CellKey,
        index: usize,
    ) -> Result<(), PlanningError> {
        let source = self
            .cells
            .get(from)
            .ok_or_else(|| PlanningError::UnknownCell(from.clone()))?;
        let moved = source
            .assignments
            .get(index)
            .cloned()
            .ok_or_else(|| PlanningError::UnknownPlacement {
                cell: from.clone(),
                index,
            })?;
        if from == to {
            return Ok(());
        }
        self.check_placement(to, &moved.employee_id, Some(from))?;

        let target = self.checked_cell(to)?;
        let keep_role = match moved.role {
            Role::Member => true,
            Role::Lead if target.spec.kind == ResourceKind::Vehicle => {
                !target.has_role(Role::Lead) && can_drive(self.employee(&moved.employee_id)?)
            }
            Role::Assistant if target.spec.kind == ResourceKind::Post => false,
            role => !target.has_role(role),
        };
        let role = if keep_role { moved.role } else { Role::Member };

        if let Some(cell) = self.cells.get_mut(from) {
            cell.assignments.remove(index);
        }
        self.bump(from.date);
        let note = if from.date == to.date { moved.note } else { None };
        self.push(
            to,
            Assignment {
                employee_id: moved.employee_id,
                resource_id: to.resource_id.clone(),
                date: to.date,
                slot: to.slot.clone(),
                role,
                note,
            },
        );
        tracing::debug!(%from, %to, ?role, "moved");
        Ok(())
    }

    /// Remove the assignment at `index`; vehicle occupants return to the pool.
    pub fn unassign(&mut self, key: &CellKey, index: usize) -> Result<Assignment, PlanningError> {
        let cell = self
            .cells
            .get_mut(key)
            .ok_or_else(|| PlanningError::UnknownCell(key.clone()))?;
        if index >= cell.assignments.len() {
            return Err(PlanningError::UnknownPlacement {
                cell: key.clone(),
                index,
            });
        }
        let removed = cell.assignments.remove(index);
        self.bump(key.date);
        tracing::debug!(cell = %key, employee = %removed.employee_id, "unassigned");
        Ok(removed)
    }

    /// Change the role of an occupant; lead and assistant stay unique per cell.
    pub fn set_role(
        &mut self,
        key: &CellKey,
        index: usize,
        role: Role,
    ) -> Result<(), PlanningError> {
        let employee_id = self
            .checked_cell(key)?
            .assignments
            .get(index)
            .map(|a| a.employee_id.clone())
            .ok_or_else(|| PlanningError::UnknownPlacement {
                cell: key.clone(),
                index,
            })?;
        self.check_role(key, &employee_id, role)?;
        if let Some(cell) = self.cells.get_mut(key) {
            if role != Role::Member {
                for other in cell.assignments.iter_mut().filter(|a| a.role == role) {
                    other.role = Role::Member;
                }
            }
            cell.assignments[index].role = role;
        }
        self.bump(key.date);
        Ok(())
    }

    /// Assignments of one date, in cell order.
    pub fn rows_for(&self, date: NaiveDate) -> Vec<Assignment> {
        self.cells_on(date)
            .flat_map(|(_, cell)| cell.assignments.iter().cloned())
            .collect()
    }

    /// Replace every assignment of `date` with `rows`, as loaded from the store.
    ///
    /// Cells missing on `date` are opened from their registered layout, and a
    /// date never opened admits the whole roster. Every row is kept as stored.
    /// A row whose resource and slot have no layout fails the whole call with
    /// [`PlanningError::PersistenceFailure`] and leaves the board untouched.
    pub fn replace_date(
        &mut self,
        date: NaiveDate,
        rows: Vec<Assignment>,
    ) -> Result<(), PlanningError> {
        let rows: Vec<Assignment> = rows.into_iter().filter(|r| r.date == date).collect();
        let mut missing = BTreeMap::new();
        for row in &rows {
            let key = row.cell();
            if self.cells.contains_key(&key) || missing.contains_key(&key) {
                continue;
            }
            let layout = (key.resource_id.clone(), key.slot.clone());
            let spec = self.layouts.get(&layout).cloned().ok_or_else(|| {
                PlanningError::PersistenceFailure(format!("stored row for unknown cell {key}"))
            })?;
            missing.insert(key, spec);
        }

        if !self.eligible.contains_key(&date) {
            let everyone = self.roster.keys().cloned().collect();
            self.eligible.insert(date, everyone);
        }
        for (key, spec) in missing {
            tracing::debug!(cell = %key, "cell opened for stored rows");
            self.cells.insert(
                key,
                Cell {
                    spec,
                    assignments: Vec::new(),
                },
            );
        }
        for (_, cell) in self.cells.iter_mut().filter(|(k, _)| k.date == date) {
            cell.assignments.clear();
        }
        for row in rows {
            if let Some(cell) = self.cells.get_mut(&row.cell()) {
                cell.assignments.push(row);
            }
        }
        self.bump(date);
        Ok(())
    }

    /// Absorb another board's dates. Cells and roster entries of `other` win on
    /// collision, and every absorbed date counts as mutated.
    pub fn merge(&mut self, other: Self) {
        if !Arc::ptr_eq(&self.roster, &other.roster) {
            let roster = Arc::make_mut(&mut self.roster);
            for (id, employee) in other.roster.iter() {
                roster.insert(id.clone(), employee.clone());
            }
        }
        let dates = other.dates();
        self.cells.retain(|key, _| !dates.contains(&key.date));
        self.cells.extend(other.cells);
        self.eligible.extend(other.eligible);
        self.layouts.extend(other.layouts);
        for date in dates {
            let theirs = other.revisions.get(&date).copied().unwrap_or(0);
            let entry = self.revisions.entry(date).or_insert(0);
            *entry = (*entry).max(theirs) + 1;
        }
    }

    /// Re-check every invariant and return all violations.
    pub fn validate(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();
        for (key, cell) in &self.cells {
            if cell.spec.closed && !cell.is_empty() {
                violations.push(InvariantViolation::ClosedCellOccupied { cell: key.clone() });
            }
            if cell.len() > cell.spec.capacity as usize {
                violations.push(InvariantViolation::OverCapacity {
                    cell: key.clone(),
                    occupants: cell.len(),
                    capacity: cell.spec.capacity,
                });
            }
            if cell.assignments.iter().filter(|a| a.role == Role::Lead).count() > 1 {
                violations.push(InvariantViolation::SeveralLeads { cell: key.clone() });
            }
            let mut groups = BTreeSet::new();
            for assignment in &cell.assignments {
                let cell_key = || key.clone();
                let employee = assignment.employee_id.clone();
                if !self.is_eligible(key.date, &assignment.employee_id) {
                    violations.push(InvariantViolation::AbsentEmployeePlaced {
                        cell: cell_key(),
                        employee: employee.clone(),
                    });
                }
                let Some(record) = self.roster.get(&assignment.employee_id) else {
                    continue;
                };
                if let Some(group) = &record.conflict_group {
                    if !groups.insert(group.as_str()) {
                        violations.push(InvariantViolation::SharedConflictGroup {
                            cell: cell_key(),
                            group: group.clone(),
                        });
                    }
                }
                if assignment.role == Role::Lead && !can_lead(record) {
                    violations.push(InvariantViolation::NeverLeadAsLead {
                        cell: cell_key(),
                        employee: employee.clone(),
                    });
                }
                if let Some(competency) = &cell.spec.strict_competency {
                    if !record.is_competent(competency) {
                        violations.push(InvariantViolation::MissingCompetency {
                            cell: cell_key(),
                            employee,
                        });
                    }
                }
            }
        }
        for date in self.dates() {
            violations.extend(self.shared_vehicle_seats(date));
        }
        violations
    }

    /// Vehicle occupants of `date` who also hold a cell of another resource.
    fn shared_vehicle_seats(&self, date: NaiveDate) -> Vec<InvariantViolation> {
        let mut resources: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        let mut seated = BTreeSet::new();
        for (key, cell) in self.cells_on(date) {
            for assignment in &cell.assignments {
                let employee = assignment.employee_id.as_str();
                resources.entry(employee).or_default().insert(key.resource_id.as_str());
                if cell.spec.kind.moves_on_assign() {
                    seated.insert(employee);
                }
            }
        }
        seated
            .into_iter()
            .filter(|employee| resources.get(employee).is_some_and(|r| r.len() > 1))
            .map(|employee| InvariantViolation::VehicleSeatShared {
                date,
                employee: employee.to_string(),
            })
            .collect()
    }

    /// Append an already-checked assignment.
    pub(crate) fn push(&mut self, key: &CellKey, assignment: Assignment) {
        if let Some(cell) = self.cells.get_mut(key) {
            if assignment.role != Role::Member {
                for other in cell.assignments.iter_mut().filter(|a| a.role == assignment.role) {
                    other.role = Role::Member;
                }
            }
            cell.assignments.push(assignment);
        }
        self.bump(key.date);
    }

    /// Mutable access to a cell's occupants for role fix-ups.
    pub(crate) fn assignments_mut(&mut self, key: &CellKey) -> Option<&mut Vec<Assignment>> {
        self.cells.get_mut(key).map(|c| &mut c.assignments)
    }

    /// Vehicle resource holding the employee on `date`, ignoring one cell.
    fn vehicle_holder(
        &self,
        date: NaiveDate,
        employee_id: &str,
        ignore: Option<&CellKey>,
    ) -> Option<&ResourceId> {
        self.cells_on(date)
            .filter(|(k, c)| c.spec.kind.moves_on_assign() && Some(*k) != ignore)
            .find(|(_, c)| c.holds(employee_id))
            .map(|(k, _)| &k.resource_id)
    }

    /// Whether the employee holds a cell of a resource other than `resource_id`
    /// on `date`, ignoring one cell.
    fn holds_elsewhere(
        &self,
        date: NaiveDate,
        employee_id: &str,
        resource_id: &str,
        ignore: Option<&CellKey>,
    ) -> bool {
        self.cells_on(date)
            .filter(|(k, _)| k.resource_id != resource_id && Some(*k) != ignore)
            .any(|(_, c)| c.holds(employee_id))
    }

    fn checked_cell(&self, key: &CellKey) -> Result<&Cell, PlanningError> {
        let cell = self
            .cells
            .get(key)
            .ok_or_else(|| PlanningError::UnknownCell(key.clone()))?;
        if cell.spec.closed {
            return Err(PlanningError::CellClosed(key.clone()));
        }
        Ok(cell)
    }

    /// Every check a placement into `key` must pass, `leaving` being the cell
    /// the employee is moved out of.
    fn check_placement(
        &self,
        key: &CellKey,
        employee_id: &str,
        leaving: Option<&CellKey>,
    ) -> Result<(), PlanningError> {
        let cell = self.checked_cell(key)?;
        let employee = self.employee(employee_id)?;
        if cell.holds(employee_id) {
            return Err(PlanningError::AlreadyPlaced {
                cell: key.clone(),
                employee: employee_id.to_string(),
            });
        }
        let not_available = || PlanningError::NotAvailable {
            employee: employee_id.to_string(),
            date: key.date,
        };
        if !self.is_eligible(key.date, employee_id) {
            return Err(not_available());
        }
        let seat_taken = if cell.spec.kind.moves_on_assign() {
            self.holds_elsewhere(key.date, employee_id, &key.resource_id, leaving)
        } else {
            self.vehicle_holder(key.date, employee_id, leaving).is_some()
        };
        if seat_taken {
            return Err(not_available());
        }
        if cell.is_full() {
            return Err(PlanningError::CapacityExceeded {
                cell: key.clone(),
                capacity: cell.spec.capacity,
            });
        }
        if let Some(competency) = &cell.spec.strict_competency {
            if !employee.is_competent(competency) {
                return Err(PlanningError::IncompetentPlacement {
                    cell: key.clone(),
                    employee: employee_id.to_string(),
                    competency: competency.clone(),
                });
            }
        }
        let occupants = cell
            .assignments
            .iter()
            .filter_map(|a| self.roster.get(&a.employee_id));
        if let JoinCheck::Conflict { occupant, group } = can_join(occupants, employee) {
            return Err(PlanningError::ConflictViolation {
                cell: key.clone(),
                employee: employee_id.to_string(),
                occupant,
                group,
            });
        }
        Ok(())
    }

    fn check_role(
        &self,
        key: &CellKey,
        employee_id: &str,
        role: Role,
    ) -> Result<(), PlanningError> {
        let cell = self.checked_cell(key)?;
        let employee = self.employee(employee_id)?;
        let allowed = match (role, cell.spec.kind) {
            (Role::Lead, ResourceKind::Vehicle) => can_drive(employee),
            (Role::Lead, ResourceKind::Post) => can_lead(employee),
            _ => true,
        };
        if allowed {
            Ok(())
        } else {
            Err(PlanningError::LeadNotAllowed {
                employee: employee_id.to_string(),
            })
        }
    }

    fn bump(&mut self, date: NaiveDate) {
        *self.revisions.entry(date).or_insert(0) += 1;
    }
}
