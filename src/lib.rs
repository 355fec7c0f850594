//! # Crew Rota
//!
//! A rule-driven allocation engine that staffs vehicles and kitchen posts day by day.
//!
//! Each resource type carries a rule set (headcount, priority, competency demands,
//! lead requirements, a cascade of preferred employees, slots). For every date the
//! engine filters the roster by absences, then fills resources in priority order
//! through fixed phases:
//!
//! 1. **Lead**: a competent lead for resources that require one
//! 2. **Cascade**: preferred employees in list order
//! 3. **Competency**: anyone holding the required competency
//! 4. **Fallback**: anyone at all, where the rule set allows it
//! 5. **Completion**: a driver for every staffed vehicle, an assistant where possible
//!
//! Throughout, capacity, conflict groups, never-lead flags and a per-day workload
//! cap are respected. Gaps are reported as warnings, never as failures.
//!
//! The resulting [`core::Board`] supports manual edits: posts clone an employee
//! into the cell (the employee stays in the pool), vehicles move them (one seat
//! per person per day). With the `tokio-runtime` feature, a
//! [`runtime::SyncAdapter`] keeps the board and an [`core::AssignmentStore`]
//! converged through a debounced full-day overwrite and a periodic poll.
//!
//! ```rust,ignore
//! use crew_rota::builders::{build_engine, build_store};
//! use crew_rota::config::PlannerConfig;
//!
//! let cfg = PlannerConfig::from_env()?;
//! let engine = build_engine(&cfg)?;
//! let outcome = engine.generate(date, &roster, &resources, &absences);
//! for warning in &outcome.warnings {
//!     tracing::warn!(?warning, "staffing gap");
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Planning model, allocation engine and board store.
pub mod core;
/// Configuration models for the engine, the store backend and synchronisation.
pub mod config;
/// Builders to construct planner components from configuration.
pub mod builders;
/// Assignment store backends.
pub mod infra;
/// Debounced persistence and remote-change polling.
#[cfg(feature = "tokio-runtime")]
pub mod runtime;
/// Shared utilities.
pub mod util;
