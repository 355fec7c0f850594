//! Input records and assignment values shared by every planning component.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Employee identifier as issued by the HR data layer.
pub type EmployeeId = String;
/// Resource identifier (vehicle plate, post name).
pub type ResourceId = String;

/// Ordinal skill tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillTier {
    /// Beginner.
    Low,
    /// Autonomous.
    Medium,
    /// Experienced.
    High,
}

impl Default for SkillTier {
    fn default() -> Self {
        Self::Medium
    }
}

/// A crew member, read-only to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    /// Identifier.
    pub id: EmployeeId,
    /// Display name.
    pub name: String,
    /// Skill tier.
    #[serde(default)]
    pub skill: SkillTier,
    /// Holds a driving license.
    #[serde(default)]
    pub has_license: bool,
    /// Spoken languages.
    #[serde(default)]
    pub languages: BTreeSet<String>,
    /// Resource type to proficiency level.
    #[serde(default)]
    pub competencies: BTreeMap<String, u8>,
    /// May never hold the lead role.
    #[serde(default)]
    pub never_lead: bool,
    /// Employees sharing a group never occupy the same cell.
    #[serde(default)]
    pub conflict_group: Option<String>,
}

impl Employee {
    /// Create an employee with no license, competencies or constraints.
    pub fn new(id: impl Into<EmployeeId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            skill: SkillTier::default(),
            has_license: false,
            languages: BTreeSet::new(),
            competencies: BTreeMap::new(),
            never_lead: false,
            conflict_group: None,
        }
    }

    /// Mark the employee as license holder.
    #[must_use]
    pub const fn licensed(mut self) -> Self {
        self.has_license = true;
        self
    }

    /// Add a competency at the given level.
    #[must_use]
    pub fn with_competency(mut self, resource_type: impl Into<String>, level: u8) -> Self {
        self.competencies.insert(resource_type.into(), level);
        self
    }

    /// Forbid the lead role.
    #[must_use]
    pub const fn never_lead(mut self) -> Self {
        self.never_lead = true;
        self
    }

    /// Put the employee in a conflict group.
    #[must_use]
    pub fn in_conflict_group(mut self, group: impl Into<String>) -> Self {
        self.conflict_group = Some(group.into());
        self
    }

    /// Proficiency for a resource type; zero or missing means not competent.
    pub fn competency(&self, resource_type: &str) -> u8 {
        self.competencies.get(resource_type).copied().unwrap_or(0)
    }

    /// Whether the employee can work the resource type at all.
    pub fn is_competent(&self, resource_type: &str) -> bool {
        self.competency(resource_type) > 0
    }
}

/// Competency row from the HR layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetencyRecord {
    /// Employee identifier.
    pub employee_id: EmployeeId,
    /// Resource type.
    pub resource_type: String,
    /// Proficiency level, zero meaning none.
    pub level: u8,
}

/// Merge competency rows into the roster. Rows for unknown employees are ignored.
pub fn apply_competencies(roster: &mut [Employee], records: &[CompetencyRecord]) {
    for record in records {
        match roster.iter_mut().find(|e| e.id == record.employee_id) {
            Some(employee) => {
                employee
                    .competencies
                    .insert(record.resource_type.clone(), record.level);
            }
            None => tracing::debug!(
                employee = %record.employee_id,
                "competency row for unknown employee ignored"
            ),
        }
    }
}

/// Kind of staffed resource. Decides role handling and board move semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Vehicle: driver/assistant roles, one vehicle per person per day.
    Vehicle,
    /// Kitchen post: people may help on several posts the same day.
    Post,
}

impl ResourceKind {
    /// Assigning from the pool removes the employee from the pool.
    pub const fn moves_on_assign(self) -> bool {
        matches!(self, Self::Vehicle)
    }
}

/// A capacity-limited slot to be staffed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Identifier.
    pub id: ResourceId,
    /// Display name.
    pub name: String,
    /// Vehicle or post.
    pub kind: ResourceKind,
    /// Resource type, used for rule lookup and competency matching.
    pub resource_type: String,
}

impl Resource {
    /// Create a resource.
    pub fn new(
        id: impl Into<ResourceId>,
        kind: ResourceKind,
        resource_type: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            kind,
            resource_type: resource_type.into(),
        }
    }
}

/// Kind of absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsenceKind {
    /// Paid leave.
    Leave,
    /// Sick leave.
    Sick,
    /// Training off-site.
    Training,
    /// Appointment: annotates the assignment, does not block it.
    Appointment,
    /// Service closure.
    Closure,
}

/// Absence over an inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Absence {
    /// Absent employee; `None` for a resource closure.
    pub employee_id: Option<EmployeeId>,
    /// Closed resource; `None` on a closure means every resource.
    #[serde(default)]
    pub resource_id: Option<ResourceId>,
    /// First day.
    pub date_start: NaiveDate,
    /// Last day, inclusive.
    pub date_end: NaiveDate,
    /// Kind.
    pub kind: AbsenceKind,
    /// Appointment time.
    #[serde(default)]
    pub time: Option<NaiveTime>,
}

impl Absence {
    /// Absence of one employee.
    pub fn employee(
        employee_id: impl Into<EmployeeId>,
        kind: AbsenceKind,
        date_start: NaiveDate,
        date_end: NaiveDate,
    ) -> Self {
        Self {
            employee_id: Some(employee_id.into()),
            resource_id: None,
            date_start,
            date_end,
            kind,
            time: None,
        }
    }

    /// Closure of one resource, or of all of them when `resource_id` is `None`.
    pub fn closure(
        resource_id: Option<ResourceId>,
        date_start: NaiveDate,
        date_end: NaiveDate,
    ) -> Self {
        Self {
            employee_id: None,
            resource_id,
            date_start,
            date_end,
            kind: AbsenceKind::Closure,
            time: None,
        }
    }

    /// Whether the inclusive range contains `date`.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.date_start <= date && date <= self.date_end
    }

    /// Whether the absence keeps its employee off the board.
    pub fn blocks_employee(&self) -> bool {
        self.employee_id.is_some() && self.kind != AbsenceKind::Appointment
    }

    /// Whether the absence closes resources rather than an employee.
    pub fn is_resource_closure(&self) -> bool {
        self.employee_id.is_none() && self.kind == AbsenceKind::Closure
    }
}

/// Role of an occupant. Posts only use `Lead` (chef) and `Member`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Driver on a vehicle, chef on a post.
    Lead,
    /// Second seat on a vehicle.
    Assistant,
    /// Any other occupant.
    Member,
}

/// Cell address: one resource, one date, one time slot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellKey {
    /// Resource.
    pub resource_id: ResourceId,
    /// Date.
    pub date: NaiveDate,
    /// Slot label.
    pub slot: String,
}

impl CellKey {
    /// Build a cell key.
    pub fn new(
        resource_id: impl Into<ResourceId>,
        date: NaiveDate,
        slot: impl Into<String>,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            date,
            slot: slot.into(),
        }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}/{}", self.resource_id, self.date, self.slot)
    }
}

/// One placed employee. Also the persisted row shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assignment {
    /// Employee.
    pub employee_id: EmployeeId,
    /// Resource.
    pub resource_id: ResourceId,
    /// Date.
    pub date: NaiveDate,
    /// Slot label.
    pub slot: String,
    /// Role.
    pub role: Role,
    /// Free-text annotation such as an appointment time.
    #[serde(default)]
    pub note: Option<String>,
}

impl Assignment {
    /// Cell this assignment lives in.
    pub fn cell(&self) -> CellKey {
        CellKey::new(self.resource_id.clone(), self.date, self.slot.clone())
    }
}
