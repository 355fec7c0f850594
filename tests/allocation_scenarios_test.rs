//! End-to-end allocation scenarios.
//!
//! This test validates:
//! 1. Never-lead employees keep their cascade seat but never drive
//! 2. Strict posts stay under-staffed rather than taking unqualified staff
//! 3. Closed resources are skipped by every phase
//! 4. Generation is deterministic
//! 5. Randomised rosters never break a board invariant

use chrono::{NaiveDate, Weekday};
use crew_rota::core::{
    can_drive, Absence, AbsenceKind, AllocationEngine, AllocationWarning, CascadeEntry, CellKey,
    EngineConfig, Employee, LeadRule, Resource, ResourceKind, Role, RuleCatalog, RuleSet,
    SlotRule,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn tuesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 4).unwrap()
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
}

fn transit_crew() -> Vec<Employee> {
    vec![
        Employee::new("jack", "Jack")
            .licensed()
            .never_lead()
            .in_conflict_group("transit"),
        Employee::new("didier", "Didier")
            .licensed()
            .in_conflict_group("transit"),
        Employee::new("margot", "Margot")
            .licensed()
            .in_conflict_group("transit"),
        Employee::new("martial", "Martial").in_conflict_group("transit"),
        Employee::new("ann", "Ann").licensed(),
        Employee::new("bob", "Bob"),
    ]
}

fn transit_engine() -> AllocationEngine {
    let catalog = RuleCatalog::new().with_type(
        "transit",
        RuleSet {
            priority: 1,
            cascade: vec![
                CascadeEntry::always("jack"),
                CascadeEntry::on("didier", &[Weekday::Mon]),
                CascadeEntry::always("margot"),
                CascadeEntry::always("martial"),
            ],
            ..RuleSet::bounded(1, 4)
        },
    );
    AllocationEngine::new(catalog, EngineConfig::default())
}

#[test]
fn never_lead_cascade_member_is_paired_with_a_driver() {
    let roster = transit_crew();
    let resources = vec![Resource::new("transit", ResourceKind::Vehicle, "transit")];
    let outcome = transit_engine().generate(tuesday(), &roster, &resources, &[]);
    let key = CellKey::new("transit", tuesday(), "day");
    let cell = outcome.board.cell(&key).unwrap();

    let jack = cell
        .assignments()
        .iter()
        .find(|a| a.employee_id == "jack")
        .expect("jack is first in the cascade");
    assert_ne!(jack.role, Role::Lead);

    let leads: Vec<_> = cell
        .assignments()
        .iter()
        .filter(|a| a.role == Role::Lead)
        .collect();
    assert_eq!(leads.len(), 1);
    let driver = outcome.board.employee(&leads[0].employee_id).unwrap();
    assert!(can_drive(driver));
    assert!(driver.conflict_group.is_none());

    let transit_members = cell
        .assignments()
        .iter()
        .filter(|a| ["jack", "didier", "margot", "martial"].contains(&a.employee_id.as_str()))
        .count();
    assert_eq!(transit_members, 1);
    assert!(outcome.board.validate().is_empty());
    assert!(!outcome.warnings.iter().any(|w| matches!(w, AllocationWarning::MissingLead { .. })));
}

#[test]
fn weekday_guard_lets_didier_lead_on_monday() {
    let mut roster = transit_crew();
    roster.retain(|e| e.id != "jack");
    let resources = vec![Resource::new("transit", ResourceKind::Vehicle, "transit")];
    let outcome = transit_engine().generate(monday(), &roster, &resources, &[]);
    let cell = outcome
        .board
        .cell(&CellKey::new("transit", monday(), "day"))
        .unwrap();
    assert_eq!(cell.assignments()[0].employee_id, "didier");
    assert_eq!(cell.assignments()[0].role, Role::Lead);
}

#[test]
fn strict_post_without_chef_stays_short() {
    let catalog = RuleCatalog::new().with_type(
        "sandwich",
        RuleSet {
            requires_competency: true,
            allow_uncompetent: false,
            lead: Some(LeadRule {
                competency: "chef".into(),
                min_level: 1,
            }),
            ..RuleSet::bounded(5, 6)
        },
    );
    let mut roster: Vec<_> = (0..4)
        .map(|i| {
            Employee::new(format!("cook{i}"), format!("Cook {i}")).with_competency("sandwich", 1)
        })
        .collect();
    roster.push(Employee::new("visitor", "Visitor"));
    roster.push(Employee::new("helper", "Helper"));
    let resources = vec![Resource::new("sandwichs", ResourceKind::Post, "sandwich")];

    let engine = AllocationEngine::new(catalog, EngineConfig::default());
    let outcome = engine.generate(tuesday(), &roster, &resources, &[]);
    let key = CellKey::new("sandwichs", tuesday(), "day");
    let occupants = outcome.board.occupants(&key);

    assert_eq!(occupants.len(), 4);
    assert!(occupants.iter().all(|id| id.starts_with("cook")));
    assert!(outcome.warnings.contains(&AllocationWarning::UnmetMinimum {
        cell: key.clone(),
        required: 5,
        assigned: 4,
    }));
    assert!(outcome
        .warnings
        .contains(&AllocationWarning::MissingLead { cell: key }));
}

#[test]
fn closed_resource_is_skipped_by_every_phase() {
    let catalog = RuleCatalog::new()
        .with_type(
            "van",
            RuleSet {
                cascade: vec![CascadeEntry::always("ann")],
                slots: vec![SlotRule::new("am"), SlotRule::new("pm")],
                ..RuleSet::bounded(1, 2)
            },
        )
        .with_type("post", RuleSet::bounded(1, 1));
    let roster = vec![
        Employee::new("ann", "Ann").licensed(),
        Employee::new("bob", "Bob"),
    ];
    let resources = vec![
        Resource::new("van", ResourceKind::Vehicle, "van"),
        Resource::new("desk", ResourceKind::Post, "post"),
    ];
    let absences = vec![Absence::closure(Some("van".into()), monday(), tuesday())];
    let engine = AllocationEngine::new(catalog, EngineConfig::default());
    let outcome = engine.generate(tuesday(), &roster, &resources, &absences);

    for slot in ["am", "pm"] {
        let cell = outcome
            .board
            .cell(&CellKey::new("van", tuesday(), slot))
            .unwrap();
        assert!(cell.is_closed());
        assert!(cell.is_empty());
    }
    assert_eq!(outcome.board.occupants(&CellKey::new("desk", tuesday(), "day")), vec!["ann"]);
    assert!(outcome.warnings.is_empty());
}

#[test]
fn closure_without_resource_closes_everything() {
    let catalog = RuleCatalog::new().with_type("post", RuleSet::bounded(1, 1));
    let roster = vec![Employee::new("ann", "Ann")];
    let resources = vec![Resource::new("desk", ResourceKind::Post, "post")];
    let absences = vec![Absence::closure(None, tuesday(), tuesday())];
    let engine = AllocationEngine::new(catalog, EngineConfig::default());
    let outcome = engine.generate(tuesday(), &roster, &resources, &absences);
    assert!(outcome.board.rows_for(tuesday()).is_empty());
}

#[test]
fn absent_employees_are_never_placed() {
    let catalog = RuleCatalog::new().with_type("post", RuleSet::bounded(1, 3));
    let roster = vec![
        Employee::new("ann", "Ann"),
        Employee::new("bob", "Bob"),
        Employee::new("cid", "Cid"),
    ];
    let resources = vec![Resource::new("desk", ResourceKind::Post, "post")];
    let absences = vec![
        Absence::employee("bob", AbsenceKind::Leave, monday(), tuesday()),
        Absence::employee("cid", AbsenceKind::Training, tuesday(), tuesday()),
    ];
    let engine = AllocationEngine::new(catalog, EngineConfig::default());
    let outcome = engine.generate(tuesday(), &roster, &resources, &absences);
    assert_eq!(outcome.board.rows_for(tuesday()).len(), 1);
    assert!(!outcome.board.is_eligible(tuesday(), "bob"));
}

#[test]
fn generation_is_deterministic() {
    let roster = transit_crew();
    let resources = vec![
        Resource::new("transit", ResourceKind::Vehicle, "transit"),
        Resource::new("desk", ResourceKind::Post, "post"),
    ];
    let engine = transit_engine();
    let first = engine.generate(tuesday(), &roster, &resources, &[]);
    let second = engine.generate(tuesday(), &roster, &resources, &[]);
    assert_eq!(first.board.rows_for(tuesday()), second.board.rows_for(tuesday()));
    assert_eq!(first.warnings, second.warnings);
}

fn random_roster(rng: &mut StdRng, size: usize) -> Vec<Employee> {
    (0..size)
        .map(|i| {
            let mut employee = Employee::new(format!("e{i}"), format!("Employee {i}"));
            if rng.random_bool(0.6) {
                employee = employee.licensed();
            }
            if rng.random_bool(0.2) {
                employee = employee.never_lead();
            }
            if rng.random_bool(0.3) {
                employee = employee.in_conflict_group(format!("g{}", rng.random_range(0..3)));
            }
            for competency in ["grill", "chef", "van"] {
                if rng.random_bool(0.4) {
                    employee = employee.with_competency(competency, rng.random_range(1..4));
                }
            }
            employee
        })
        .collect()
}

fn random_catalog(rng: &mut StdRng) -> RuleCatalog {
    let grill = RuleSet {
        priority: rng.random_range(0..5),
        requires_competency: true,
        allow_uncompetent: rng.random_bool(0.5),
        lead: rng.random_bool(0.5).then(|| LeadRule {
            competency: "chef".into(),
            min_level: rng.random_range(1..4),
        }),
        ..RuleSet::bounded(1, rng.random_range(1..5))
    };
    let van = RuleSet {
        priority: rng.random_range(0..5),
        requires_competency: rng.random_bool(0.5),
        cascade: vec![CascadeEntry::always("e0"), CascadeEntry::always("e1")],
        slots: vec![SlotRule::new("am"), SlotRule::new("pm")],
        ..RuleSet::bounded(1, rng.random_range(1..4))
    };
    RuleCatalog::new().with_type("grill", grill).with_type("van", van)
}

#[test]
fn randomised_days_respect_every_invariant() {
    let mut rng = StdRng::seed_from_u64(0x0C0F_FEE0);
    for round in 0..200 {
        let size = rng.random_range(0..14);
        let roster = random_roster(&mut rng, size);
        let catalog = random_catalog(&mut rng);
        let resources = vec![
            Resource::new("v1", ResourceKind::Vehicle, "van"),
            Resource::new("v2", ResourceKind::Vehicle, "van"),
            Resource::new("g1", ResourceKind::Post, "grill"),
            Resource::new("g2", ResourceKind::Post, "grill"),
            Resource::new("misc", ResourceKind::Post, "unlisted"),
        ];
        let mut absences = Vec::new();
        for employee in &roster {
            if rng.random_bool(0.15) {
                absences.push(Absence::employee(
                    employee.id.clone(),
                    AbsenceKind::Sick,
                    monday(),
                    tuesday(),
                ));
            }
        }
        if rng.random_bool(0.1) {
            absences.push(Absence::closure(Some("g2".into()), tuesday(), tuesday()));
        }

        let cap = rng.random_range(1..4);
        let engine = AllocationEngine::new(catalog, EngineConfig { workload_cap: cap });
        let outcome = engine.generate(tuesday(), &roster, &resources, &absences);
        let violations = outcome.board.validate();
        assert!(violations.is_empty(), "round {round}: {violations:?}");

        let rows = outcome.board.rows_for(tuesday());
        for employee in &roster {
            let placements = rows.iter().filter(|r| r.employee_id == employee.id).count();
            assert!(placements <= cap as usize + 1, "round {round}: {} over cap", employee.id);
            let held: std::collections::BTreeSet<_> = rows
                .iter()
                .filter(|r| r.employee_id == employee.id)
                .map(|r| r.resource_id.as_str())
                .collect();
            if held.iter().any(|r| r.starts_with('v')) {
                assert_eq!(
                    held.len(),
                    1,
                    "round {round}: {} seated in a vehicle and elsewhere: {held:?}",
                    employee.id
                );
            }
        }
        for row in rows.iter().filter(|r| r.role == Role::Lead && r.resource_id.starts_with('v')) {
            let driver = outcome.board.employee(&row.employee_id).unwrap();
            assert!(can_drive(driver), "round {round}: {} drives", row.employee_id);
        }
    }
}
