//! Planning model, allocation engine and board store.

pub mod audit;
pub mod board;
pub mod conflict;
pub mod eligibility;
pub mod engine;
pub mod error;
pub mod model;
pub mod rules;
pub mod store;

pub use audit::{
    build_audit_event, AuditAction, AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink,
};
pub use board::{Board, Cell, CellSpec, InvariantViolation};
pub use conflict::{can_drive, can_join, can_lead, can_share_cell, JoinCheck};
pub use eligibility::{appointment_notes, available_pool, closures_on, Closures};
pub use engine::{
    AllocationEngine, AllocationWarning, EngineConfig, GenerationOutcome, DEFAULT_WORKLOAD_CAP,
};
pub use error::{AppResult, PlanningError};
pub use model::{
    apply_competencies, Absence, AbsenceKind, Assignment, CellKey, CompetencyRecord, Employee,
    EmployeeId, Resource, ResourceId, ResourceKind, Role, SkillTier,
};
pub use rules::{CascadeEntry, LeadRule, RuleCatalog, RuleSet, SlotRule, DEFAULT_SLOT};
pub use store::AssignmentStore;
