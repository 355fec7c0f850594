//! Rule catalog: per-resource-type staffing rules.

use std::collections::{HashMap, HashSet};

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::core::model::{EmployeeId, Resource};
use crate::core::PlanningError;

/// Slot label used when a rule set declares no slots.
pub const DEFAULT_SLOT: &str = "day";

/// One time slot a resource is staffed for, with an optional capacity override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRule {
    /// Slot label, e.g. `08-12`.
    pub label: String,
    /// Capacity for this slot instead of the rule set's `max`.
    #[serde(default)]
    pub capacity: Option<u32>,
}

impl SlotRule {
    /// Slot without override.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            capacity: None,
        }
    }
}

/// Competency that qualifies an employee as lead (chef, driver).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadRule {
    /// Competency key.
    pub competency: String,
    /// Minimum proficiency level.
    #[serde(default = "default_lead_level")]
    pub min_level: u8,
}

const fn default_lead_level() -> u8 {
    1
}

/// Preferred employee for a resource, optionally restricted to some weekdays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeEntry {
    /// Employee identifier.
    pub employee_id: EmployeeId,
    /// Weekdays the preference applies on; empty means every day.
    #[serde(default)]
    pub weekdays: Vec<Weekday>,
}

impl CascadeEntry {
    /// Preference valid every day.
    pub fn always(employee_id: impl Into<EmployeeId>) -> Self {
        Self {
            employee_id: employee_id.into(),
            weekdays: Vec::new(),
        }
    }

    /// Preference valid on the given weekdays only.
    pub fn on(employee_id: impl Into<EmployeeId>, weekdays: &[Weekday]) -> Self {
        Self {
            employee_id: employee_id.into(),
            weekdays: weekdays.to_vec(),
        }
    }

    /// Whether the entry applies on `date`.
    pub fn applies_on(&self, date: NaiveDate) -> bool {
        self.weekdays.is_empty() || self.weekdays.contains(&date.weekday())
    }
}

/// Staffing rules for one resource type (or one resource).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Minimum occupants before a cell is reported incomplete.
    pub min: u32,
    /// Maximum occupants.
    pub max: u32,
    /// Lower ranks are staffed first.
    #[serde(default = "lowest_priority")]
    pub priority: u32,
    /// Only competent employees fill the resource.
    #[serde(default)]
    pub requires_competency: bool,
    /// Lead requirement, if any.
    #[serde(default)]
    pub lead: Option<LeadRule>,
    /// Allow generic fill once competent employees run out.
    #[serde(default)]
    pub allow_uncompetent: bool,
    /// Time slots, in visiting order. Empty means one all-day slot.
    #[serde(default)]
    pub slots: Vec<SlotRule>,
    /// Preferred employees, tried in order before generic phases.
    #[serde(default)]
    pub cascade: Vec<CascadeEntry>,
    /// Weekdays the resource is staffed; empty means every day.
    #[serde(default)]
    pub weekdays: Vec<Weekday>,
}

const fn lowest_priority() -> u32 {
    u32::MAX
}

impl Default for RuleSet {
    /// Permissive rules applied to unknown resource types.
    fn default() -> Self {
        Self {
            min: 1,
            max: 2,
            priority: lowest_priority(),
            requires_competency: false,
            lead: None,
            allow_uncompetent: true,
            slots: Vec::new(),
            cascade: Vec::new(),
            weekdays: Vec::new(),
        }
    }
}

impl RuleSet {
    /// Rule set with the given bounds and otherwise default values.
    pub fn bounded(min: u32, max: u32) -> Self {
        Self {
            min,
            max,
            ..Self::default()
        }
    }

    /// Whether a lead phase runs.
    pub const fn requires_lead(&self) -> bool {
        self.lead.is_some()
    }

    /// Whether the fallback phase may run.
    pub const fn allows_fallback(&self) -> bool {
        self.allow_uncompetent || !self.requires_competency
    }

    /// Competency that every occupant must hold, if the post is strict.
    pub fn strict_competency<'a>(&self, resource_type: &'a str) -> Option<&'a str> {
        (self.requires_competency && !self.allow_uncompetent).then_some(resource_type)
    }

    /// Slots in declared order.
    pub fn slot_labels(&self) -> Vec<String> {
        if self.slots.is_empty() {
            vec![DEFAULT_SLOT.to_string()]
        } else {
            self.slots.iter().map(|s| s.label.clone()).collect()
        }
    }

    /// Capacity of a slot.
    pub fn capacity(&self, slot: &str) -> u32 {
        self.slots
            .iter()
            .find(|s| s.label == slot)
            .and_then(|s| s.capacity)
            .unwrap_or(self.max)
    }

    /// Whether the resource is staffed on `date`.
    pub fn active_on(&self, date: NaiveDate) -> bool {
        self.weekdays.is_empty() || self.weekdays.contains(&date.weekday())
    }

    /// Check structural soundness.
    pub fn validate(&self) -> Result<(), String> {
        if self.max == 0 {
            return Err("max must be greater than 0".into());
        }
        if self.max < self.min {
            return Err(format!("max ({}) is lower than min ({})", self.max, self.min));
        }
        let mut seen = HashSet::new();
        for slot in &self.slots {
            if slot.label.trim().is_empty() {
                return Err("slot label must not be empty".into());
            }
            if !seen.insert(slot.label.as_str()) {
                return Err(format!("duplicate slot `{}`", slot.label));
            }
        }
        if self.cascade.iter().any(|c| c.employee_id.trim().is_empty()) {
            return Err("cascade entries need an employee id".into());
        }
        if let Some(lead) = &self.lead {
            if lead.competency.trim().is_empty() {
                return Err("lead rule needs a competency".into());
            }
        }
        Ok(())
    }
}

/// Lookup of rule sets by resource id, then resource type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleCatalog {
    by_type: HashMap<String, RuleSet>,
    by_resource: HashMap<String, RuleSet>,
    /// Unknown types fail instead of falling back to [`RuleSet::default`].
    strict: bool,
    #[serde(skip)]
    fallback: RuleSet,
}

impl RuleCatalog {
    /// Empty permissive catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make unknown resource types an error.
    #[must_use]
    pub const fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Register rules for a resource type.
    #[must_use]
    pub fn with_type(mut self, resource_type: impl Into<String>, rules: RuleSet) -> Self {
        self.by_type.insert(resource_type.into(), rules);
        self
    }

    /// Register rules for one resource; they win over type rules.
    #[must_use]
    pub fn with_resource(mut self, resource_id: impl Into<String>, rules: RuleSet) -> Self {
        self.by_resource.insert(resource_id.into(), rules);
        self
    }

    /// Rules for a resource type.
    ///
    /// Unknown types get the permissive default (min 1, max 2, no competency,
    /// lowest priority). This is the only place the catalog degrades silently;
    /// strict catalogs return [`PlanningError::InvalidRuleDefinition`] instead.
    pub fn rules_for_type(&self, resource_type: &str) -> Result<&RuleSet, PlanningError> {
        if let Some(rules) = self.by_type.get(resource_type) {
            return Ok(rules);
        }
        if self.strict {
            return Err(PlanningError::InvalidRuleDefinition {
                resource: resource_type.to_string(),
                reason: "no rule set registered".into(),
            });
        }
        tracing::debug!(resource_type, "no rule set, using permissive default");
        Ok(&self.fallback)
    }

    /// Rules for a concrete resource, validated.
    pub fn rules_for(&self, resource: &Resource) -> Result<&RuleSet, PlanningError> {
        let rules = match self.by_resource.get(&resource.id) {
            Some(rules) => rules,
            None => self.rules_for_type(&resource.resource_type)?,
        };
        rules
            .validate()
            .map_err(|reason| PlanningError::InvalidRuleDefinition {
                resource: resource.id.clone(),
                reason,
            })?;
        Ok(rules)
    }

    /// Validate every registered rule set.
    pub fn validate(&self) -> Result<(), PlanningError> {
        for (name, rules) in self.by_type.iter().chain(self.by_resource.iter()) {
            rules
                .validate()
                .map_err(|reason| PlanningError::InvalidRuleDefinition {
                    resource: name.clone(),
                    reason,
                })?;
        }
        Ok(())
    }
}
