//! Priority-phased greedy allocation.
//!
//! Resources are staffed in ascending priority rank. Each cell goes through the
//! lead, cascade, competency and fallback phases, then vehicles get a driver and
//! an assistant. A per-employee workload counter, shared across the whole day,
//! keeps the least-loaded eligible employee first in every generic phase.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::board::{Board, CellSpec};
use crate::core::conflict::{can_drive, can_join, can_lead};
use crate::core::eligibility::{appointment_notes, available_pool, closures_on};
use crate::core::model::{
    Absence, Assignment, CellKey, Employee, EmployeeId, Resource, ResourceId, ResourceKind, Role,
};
use crate::core::rules::{RuleCatalog, RuleSet};
use crate::core::PlanningError;

/// Placements per person per day unless configured otherwise.
pub const DEFAULT_WORKLOAD_CAP: u32 = 3;

/// Engine tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum placements per employee per day; candidates at the cap are skipped.
    pub workload_cap: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workload_cap: DEFAULT_WORKLOAD_CAP,
        }
    }
}

/// Incomplete or skipped work reported alongside a generated board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationWarning {
    /// Fewer occupants than the rule set's minimum.
    UnmetMinimum {
        /// Cell.
        cell: CellKey,
        /// Minimum required.
        required: u32,
        /// Occupants placed.
        assigned: usize,
    },
    /// Nobody holds the lead role although one is expected.
    MissingLead {
        /// Cell.
        cell: CellKey,
    },
    /// The resource was skipped because its rules are invalid.
    InvalidRule {
        /// Resource.
        resource: ResourceId,
        /// Underlying error.
        error: PlanningError,
    },
}

/// Result of a generation run: best-effort board plus warnings.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    /// Generated board.
    pub board: Board,
    /// Everything that could not be satisfied.
    pub warnings: Vec<AllocationWarning>,
}

/// Allocation engine bound to a rule catalog.
#[derive(Debug, Clone)]
pub struct AllocationEngine {
    catalog: RuleCatalog,
    config: EngineConfig,
}

impl AllocationEngine {
    /// Create an engine.
    pub const fn new(catalog: RuleCatalog, config: EngineConfig) -> Self {
        Self { catalog, config }
    }

    /// Rule catalog in use.
    pub const fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    /// Engine configuration.
    pub const fn config(&self) -> EngineConfig {
        self.config
    }

    /// Teach `board` the cell layout of every resource and slot, so dates it
    /// never generated can be loaded from the store.
    ///
    /// Resources with invalid rules are skipped.
    pub fn register_layouts(&self, board: &mut Board, resources: &[Resource]) {
        for resource in resources {
            let rules = match self.catalog.rules_for(resource) {
                Ok(rules) => rules,
                Err(error) => {
                    warn!(resource = %resource.id, %error, "layout not registered");
                    continue;
                }
            };
            for slot in rules.slot_labels() {
                let spec = cell_spec(resource, rules, &slot, false);
                board.register_layout(resource.id.clone(), slot, spec);
            }
        }
    }

    /// Staff every resource for one date.
    pub fn generate(
        &self,
        date: NaiveDate,
        roster: &[Employee],
        resources: &[Resource],
        absences: &[Absence],
    ) -> GenerationOutcome {
        self.generate_day(date, roster, index_roster(roster), resources, absences)
    }

    /// Staff every resource for several dates, one worker per date in parallel.
    ///
    /// Dates share nothing but the inputs, so the result equals running
    /// [`generate`](Self::generate) per date and merging in date order.
    pub fn generate_range(
        &self,
        dates: &[NaiveDate],
        roster: &[Employee],
        resources: &[Resource],
        absences: &[Absence],
    ) -> GenerationOutcome {
        let index = index_roster(roster);
        let dates: Vec<NaiveDate> = dates
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mut outcomes = self.run_dates(&dates, roster, &index, resources, absences);
        outcomes.sort_by_key(|(date, _)| *date);

        let mut board = Board::with_roster(index);
        let mut warnings = Vec::new();
        for (_, outcome) in outcomes {
            board.merge(outcome.board);
            warnings.extend(outcome.warnings);
        }
        info!(days = dates.len(), warnings = warnings.len(), "range generated");
        GenerationOutcome { board, warnings }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn run_dates(
        &self,
        dates: &[NaiveDate],
        roster: &[Employee],
        index: &Arc<BTreeMap<EmployeeId, Employee>>,
        resources: &[Resource],
        absences: &[Absence],
    ) -> Vec<(NaiveDate, GenerationOutcome)> {
        let workers = num_cpus::get().min(dates.len()).max(1);
        let (job_tx, job_rx) = crossbeam_channel::bounded::<NaiveDate>(dates.len().max(1));
        let (out_tx, out_rx) = crossbeam_channel::unbounded();
        for date in dates {
            if job_tx.send(*date).is_err() {
                break;
            }
        }
        drop(job_tx);

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let out_tx = out_tx.clone();
                let index = Arc::clone(index);
                scope.spawn(move || {
                    for date in &job_rx {
                        let shared = Arc::clone(&index);
                        let outcome =
                            self.generate_day(date, roster, shared, resources, absences);
                        if out_tx.send((date, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(out_tx);
        out_rx.iter().collect()
    }

    #[cfg(target_arch = "wasm32")]
    fn run_dates(
        &self,
        dates: &[NaiveDate],
        roster: &[Employee],
        index: &Arc<BTreeMap<EmployeeId, Employee>>,
        resources: &[Resource],
        absences: &[Absence],
    ) -> Vec<(NaiveDate, GenerationOutcome)> {
        dates
            .iter()
            .map(|date| {
                let outcome =
                    self.generate_day(*date, roster, Arc::clone(index), resources, absences);
                (*date, outcome)
            })
            .collect()
    }

    fn generate_day(
        &self,
        date: NaiveDate,
        roster: &[Employee],
        index: Arc<BTreeMap<EmployeeId, Employee>>,
        resources: &[Resource],
        absences: &[Absence],
    ) -> GenerationOutcome {
        let pool = available_pool(date, roster, absences);
        let closures = closures_on(date, absences);
        let mut board = Board::with_roster(index);
        board.open_day(date, pool.iter().map(|e| e.id.clone()));

        let mut run = DayRun {
            date,
            pool,
            notes: appointment_notes(date, absences),
            workload: HashMap::new(),
            vehicle_seat: HashMap::new(),
            cap: self.config.workload_cap,
            board,
            warnings: Vec::new(),
        };

        let mut staffed: Vec<(&Resource, &RuleSet)> = Vec::with_capacity(resources.len());
        for resource in resources {
            match self.catalog.rules_for(resource) {
                Ok(rules) => staffed.push((resource, rules)),
                Err(error) => {
                    warn!(resource = %resource.id, %error, "resource skipped");
                    run.warnings.push(AllocationWarning::InvalidRule {
                        resource: resource.id.clone(),
                        error,
                    });
                }
            }
        }
        staffed.sort_by_key(|(_, rules)| rules.priority);

        for (resource, rules) in staffed {
            if !rules.active_on(date) {
                debug!(resource = %resource.id, %date, "not staffed on this weekday");
                continue;
            }
            let closed = closures.is_closed(&resource.id);
            for slot in rules.slot_labels() {
                let key = CellKey::new(resource.id.clone(), date, slot);
                let spec = cell_spec(resource, rules, &key.slot, closed);
                run.board.open_cell(key.clone(), spec);
                if closed {
                    debug!(cell = %key, "closed");
                    continue;
                }
                run.staff_cell(&key, resource, rules);
            }
        }

        info!(
            %date,
            available = run.pool.len(),
            warnings = run.warnings.len(),
            "day generated"
        );
        GenerationOutcome {
            board: run.board,
            warnings: run.warnings,
        }
    }
}

fn cell_spec(resource: &Resource, rules: &RuleSet, slot: &str, closed: bool) -> CellSpec {
    CellSpec {
        kind: resource.kind,
        capacity: rules.capacity(slot),
        min: rules.min,
        strict_competency: rules
            .strict_competency(&resource.resource_type)
            .filter(|_| resource.kind == ResourceKind::Post)
            .map(str::to_string),
        closed,
    }
}

fn index_roster(roster: &[Employee]) -> Arc<BTreeMap<EmployeeId, Employee>> {
    Arc::new(roster.iter().map(|e| (e.id.clone(), e.clone())).collect())
}

/// Mutable state of one date's run.
struct DayRun<'a> {
    date: NaiveDate,
    pool: Vec<&'a Employee>,
    notes: HashMap<EmployeeId, String>,
    workload: HashMap<EmployeeId, u32>,
    /// Vehicle each employee sits in today. Only employees with no placement
    /// yet may take a seat, and a seat excludes every other resource.
    vehicle_seat: HashMap<EmployeeId, ResourceId>,
    cap: u32,
    board: Board,
    warnings: Vec<AllocationWarning>,
}

impl<'a> DayRun<'a> {
    fn staff_cell(&mut self, key: &CellKey, resource: &Resource, rules: &RuleSet) {
        let kind = resource.kind;
        let mut remaining = rules.capacity(&key.slot) as usize;

        if let Some(lead) = &rules.lead {
            let qualified = self
                .ranked(|e| {
                    e.competency(&lead.competency) >= lead.min_level
                        && can_lead(e)
                        && (kind == ResourceKind::Post || e.has_license)
                })
                .into_iter()
                .find(|e| self.can_place(key, kind, e, 0));
            match qualified {
                Some(employee) if remaining > 0 => {
                    debug!(cell = %key, employee = %employee.id, "lead phase");
                    self.place(key, kind, employee, Role::Lead);
                    remaining -= 1;
                }
                _ => debug!(cell = %key, "no qualified lead available"),
            }
        }

        if remaining > 0 {
            let date = self.date;
            for entry in rules.cascade.iter().filter(|c| c.applies_on(date)) {
                let Some(employee) = self.pool.iter().copied().find(|e| e.id == entry.employee_id)
                else {
                    continue;
                };
                if !self.can_place(key, kind, employee, 0) {
                    continue;
                }
                let role = if kind == ResourceKind::Vehicle
                    && can_drive(employee)
                    && !self.has_role(key, Role::Lead)
                {
                    Role::Lead
                } else {
                    Role::Member
                };
                debug!(cell = %key, employee = %employee.id, ?role, "cascade phase");
                self.place(key, kind, employee, role);
                remaining -= 1;
                break;
            }
        }

        if rules.requires_competency && remaining > 0 {
            let competent = self.ranked(|e| e.is_competent(&resource.resource_type));
            remaining = self.fill(key, kind, competent, remaining);
        }

        if rules.allows_fallback() && remaining > 0 {
            let anyone = self.ranked(|_| true);
            self.fill(key, kind, anyone, remaining);
        }

        if kind == ResourceKind::Vehicle {
            self.complete_driver(key);
            self.promote_assistant(key);
        } else if rules.requires_lead() && !self.has_role(key, Role::Lead) {
            self.warnings
                .push(AllocationWarning::MissingLead { cell: key.clone() });
        }

        let assigned = self.occupants(key).len();
        if assigned < rules.min as usize {
            warn!(cell = %key, assigned, required = rules.min, "minimum not met");
            self.warnings.push(AllocationWarning::UnmetMinimum {
                cell: key.clone(),
                required: rules.min,
                assigned,
            });
        }
    }

    /// Promote or pull in a driver when a staffed vehicle has none.
    fn complete_driver(&mut self, key: &CellKey) {
        let occupants = self.occupants(key);
        let occupied = occupants.len();
        if occupied == 0 || self.has_role(key, Role::Lead) {
            return;
        }
        let promoted = occupants
            .iter()
            .enumerate()
            .filter(|(_, e)| can_drive(e))
            .min_by_key(|(_, e)| self.load(e))
            .map(|(index, _)| index);
        if let Some(index) = promoted {
            if let Some(assignments) = self.board.assignments_mut(key) {
                assignments[index].role = Role::Lead;
                debug!(cell = %key, employee = %assignments[index].employee_id, "driver promoted");
            }
            return;
        }

        let capacity = self
            .board
            .cell(key)
            .map_or(0, |c| c.spec().capacity as usize);
        if occupied < capacity {
            let rescue = self
                .ranked(can_drive)
                .into_iter()
                .find(|e| self.can_place(key, ResourceKind::Vehicle, e, 1));
            if let Some(employee) = rescue {
                debug!(cell = %key, employee = %employee.id, "driver pulled from pool");
                self.place(key, ResourceKind::Vehicle, employee, Role::Lead);
                return;
            }
        }
        warn!(cell = %key, "vehicle left without driver");
        self.warnings
            .push(AllocationWarning::MissingLead { cell: key.clone() });
    }

    fn promote_assistant(&mut self, key: &CellKey) {
        if self.has_role(key, Role::Assistant) {
            return;
        }
        if let Some(assignments) = self.board.assignments_mut(key) {
            if assignments.len() > 1 {
                if let Some(first) = assignments.iter_mut().find(|a| a.role != Role::Lead) {
                    first.role = Role::Assistant;
                }
            }
        }
    }

    /// Assign candidates in order until `remaining` reaches zero.
    fn fill(
        &mut self,
        key: &CellKey,
        kind: ResourceKind,
        candidates: Vec<&'a Employee>,
        mut remaining: usize,
    ) -> usize {
        for employee in candidates {
            if remaining == 0 {
                break;
            }
            if self.can_place(key, kind, employee, 0) {
                self.place(key, kind, employee, Role::Member);
                remaining -= 1;
            }
        }
        remaining
    }

    /// Pool members matching `keep`, least loaded first, stable on roster order.
    fn ranked<F>(&self, keep: F) -> Vec<&'a Employee>
    where
        F: Fn(&Employee) -> bool,
    {
        let mut candidates: Vec<&'a Employee> =
            self.pool.iter().copied().filter(|e| keep(*e)).collect();
        candidates.sort_by_key(|e| self.load(e));
        candidates
    }

    fn can_place(
        &self,
        key: &CellKey,
        kind: ResourceKind,
        employee: &Employee,
        tolerance: u32,
    ) -> bool {
        let load = self.load(employee);
        if load >= self.cap + tolerance {
            return false;
        }
        // A vehicle seat excludes every other resource, in both directions.
        let allowed = match self.vehicle_seat.get(&employee.id) {
            Some(resource) => kind == ResourceKind::Vehicle && *resource == key.resource_id,
            None => kind == ResourceKind::Post || load == 0,
        };
        if !allowed {
            return false;
        }
        let occupants = self.occupants(key);
        if occupants.iter().any(|o| o.id == employee.id) {
            return false;
        }
        let strict = self
            .board
            .cell(key)
            .and_then(|c| c.spec().strict_competency.as_deref());
        if strict.is_some_and(|competency| !employee.is_competent(competency)) {
            return false;
        }
        can_join(occupants, employee).is_allowed()
    }

    fn place(&mut self, key: &CellKey, kind: ResourceKind, employee: &Employee, role: Role) {
        let assignment = Assignment {
            employee_id: employee.id.clone(),
            resource_id: key.resource_id.clone(),
            date: key.date,
            slot: key.slot.clone(),
            role,
            note: self.notes.get(&employee.id).cloned(),
        };
        self.board.push(key, assignment);
        *self.workload.entry(employee.id.clone()).or_insert(0) += 1;
        if kind.moves_on_assign() {
            self.vehicle_seat
                .entry(employee.id.clone())
                .or_insert_with(|| key.resource_id.clone());
        }
    }

    fn occupants(&self, key: &CellKey) -> Vec<&Employee> {
        let roster = self.board.roster();
        self.board.cell(key).map_or_else(Vec::new, |cell| {
            cell.assignments()
                .iter()
                .filter_map(|a| roster.get(&a.employee_id))
                .collect()
        })
    }

    fn has_role(&self, key: &CellKey, role: Role) -> bool {
        self.board
            .cell(key)
            .is_some_and(|c| c.assignments().iter().any(|a| a.role == role))
    }

    fn load(&self, employee: &Employee) -> u32 {
        self.workload.get(&employee.id).copied().unwrap_or(0)
    }
}
