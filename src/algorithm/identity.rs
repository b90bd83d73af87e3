//! Identity reconciliation
//!
//! The status register defines the canonical universe of persons. Every raw
//! status identifier gets a dense [`PersonId`], assigned in sorted raw-key
//! order so the mapping is stable across runs. Event role identifiers are
//! matched exactly against that universe; identifiers that do not match are
//! reported, never guessed, and two raw identifiers are never merged.

use std::collections::BTreeSet;

use log::{info, warn};
use rustc_hash::FxHashMap;

use crate::config::PanelConfig;
use crate::error::{PanelError, QualityBreach, Result};
use crate::models::{Gender, Person, PersonId, RowRef};
use crate::report::{Finding, FindingKind};
use crate::store::RecordStore;

/// Read-only mapping from raw identifiers to canonical persons
#[derive(Debug, Clone, Default)]
pub struct IdentityMap {
    lookup: FxHashMap<String, PersonId>,
    persons: Vec<Person>,
}

impl IdentityMap {
    /// Canonical person for a raw identifier (exact match)
    #[must_use]
    pub fn resolve(&self, raw_id: &str) -> Option<PersonId> {
        self.lookup.get(raw_id).copied()
    }

    /// Person by canonical id
    #[must_use]
    pub fn person(&self, id: PersonId) -> Option<&Person> {
        self.persons.get(id.0 as usize)
    }

    /// All persons ordered by canonical id
    #[must_use]
    pub fn persons(&self) -> &[Person] {
        &self.persons
    }

    /// Number of canonical persons
    #[must_use]
    pub fn len(&self) -> usize {
        self.persons.len()
    }

    /// Whether the universe is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }
}

/// Resolution statistics of one role over all event rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleResolution {
    /// Role name
    pub role: String,
    /// Rows whose identifier resolved
    pub resolved_rows: usize,
    /// Rows whose identifier did not resolve
    pub unresolved_rows: usize,
    /// Rows without an identifier
    pub missing_rows: usize,
}

/// Output of the identity reconciler
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// Canonical universe and raw-key mapping
    pub identities: IdentityMap,
    /// Per-role resolution statistics, in role order
    pub roles: Vec<RoleResolution>,
    /// Persons whose rows disagree on cohort
    pub cohort_conflicts: usize,
    /// Persons whose rows disagree on gender
    pub gender_conflicts: usize,
    /// Persons without a birth cohort
    pub missing_cohorts: usize,
    /// Findings raised during reconciliation
    pub findings: Vec<Finding>,
}

#[derive(Debug)]
struct PersonDraft {
    first_seen: RowRef,
    cohort: Option<i32>,
    gender: Gender,
    other_cohorts: BTreeSet<i32>,
    other_genders: BTreeSet<Gender>,
}

/// Builds the canonical universe and checks event identifier quality
#[derive(Debug, Clone, Copy)]
pub struct IdentityReconciler {
    unresolved_threshold: f64,
}

impl IdentityReconciler {
    /// Create a reconciler from the run configuration
    #[must_use]
    pub const fn new(config: &PanelConfig) -> Self {
        Self {
            unresolved_threshold: config.unresolved_threshold,
        }
    }

    /// Reconcile identities across the status and event registers
    ///
    /// Fails with [`PanelError::DataQualityExceeded`] when the unresolved
    /// fraction of any role exceeds the configured threshold.
    pub fn reconcile(&self, store: &RecordStore) -> Result<Reconciliation> {
        let drafts = draft_persons(store);
        let mut reconciliation = Reconciliation {
            identities: build_universe(&drafts),
            ..Default::default()
        };
        collect_person_findings(&drafts, &mut reconciliation);
        resolve_events(store, &mut reconciliation);
        self.check_thresholds(store, &reconciliation)?;

        info!(
            "Reconciled {} canonical persons from {} status rows",
            reconciliation.identities.len(),
            store.status_row_count()
        );
        for role in &reconciliation.roles {
            info!(
                "Role '{}': {} resolved, {} unresolved, {} missing",
                role.role, role.resolved_rows, role.unresolved_rows, role.missing_rows
            );
        }
        Ok(reconciliation)
    }

    fn check_thresholds(&self, store: &RecordStore, reconciliation: &Reconciliation) -> Result<()> {
        let total = store.event_row_count();
        if total == 0 {
            return Ok(());
        }
        for role in &reconciliation.roles {
            let breach = QualityBreach {
                measure: "unresolved identifiers".to_string(),
                role: Some(role.role.clone()),
                count: role.unresolved_rows,
                total,
                threshold: self.unresolved_threshold,
            };
            if breach.fraction() > self.unresolved_threshold {
                warn!("{breach}");
                return Err(PanelError::DataQualityExceeded(breach));
            }
        }
        Ok(())
    }
}

/// Report conflicting or missing person attributes
fn collect_person_findings(drafts: &FxHashMap<&str, PersonDraft>, out: &mut Reconciliation) {
    for person in out.identities.persons() {
        let Some(draft) = drafts.get(person.raw_id.as_str()) else {
            continue;
        };
        if !draft.other_cohorts.is_empty() {
            out.cohort_conflicts += 1;
            out.findings.push(
                Finding::new(
                    FindingKind::CohortConflict,
                    format!(
                        "kept cohort {:?}, also reported {:?}",
                        draft.cohort, draft.other_cohorts
                    ),
                )
                .raw_person(&person.raw_id)
                .person(person.id),
            );
        }
        if !draft.other_genders.is_empty() {
            out.gender_conflicts += 1;
            out.findings.push(
                Finding::new(
                    FindingKind::GenderConflict,
                    format!(
                        "kept gender {}, also reported {:?}",
                        draft.gender, draft.other_genders
                    ),
                )
                .raw_person(&person.raw_id)
                .person(person.id),
            );
        }
        if person.birth_cohort.is_none() {
            out.missing_cohorts += 1;
            out.findings.push(
                Finding::new(FindingKind::MissingCohort, "no birth cohort reported")
                    .raw_person(&person.raw_id)
                    .person(person.id),
            );
        }
    }
}

/// Resolve every event role identifier against the universe
fn resolve_events(store: &RecordStore, out: &mut Reconciliation) {
    let roles = store.roles();
    out.roles = roles
        .names()
        .iter()
        .map(|role| RoleResolution {
            role: role.clone(),
            ..Default::default()
        })
        .collect();

    for event in store.events() {
        for (slot, stats) in out.roles.iter_mut().enumerate() {
            match event.identifier(slot) {
                None => {
                    stats.missing_rows += 1;
                    out.findings.push(
                        Finding::new(FindingKind::MissingIdentifier, "no identifier for role")
                            .event(&event.id)
                            .role(&stats.role)
                            .year(event.year),
                    );
                }
                Some(raw) => match out.identities.resolve(raw) {
                    Some(_) => stats.resolved_rows += 1,
                    None => {
                        stats.unresolved_rows += 1;
                        out.findings.push(
                            Finding::new(
                                FindingKind::UnresolvedIdentifier,
                                "event references unknown person",
                            )
                            .event(&event.id)
                            .raw_person(raw)
                            .role(&stats.role)
                            .year(event.year),
                        );
                    }
                },
            }
        }
    }
}

/// Collect first-reported attributes per raw identifier in store order
fn draft_persons(store: &RecordStore) -> FxHashMap<&str, PersonDraft> {
    let mut drafts: FxHashMap<&str, PersonDraft> = FxHashMap::default();
    for row in store.status_rows() {
        let draft = drafts.entry(row.raw_id.as_str()).or_insert_with(|| PersonDraft {
            first_seen: row.source,
            cohort: None,
            gender: Gender::Unknown,
            other_cohorts: BTreeSet::new(),
            other_genders: BTreeSet::new(),
        });
        if let Some(cohort) = row.cohort {
            match draft.cohort {
                None => draft.cohort = Some(cohort),
                Some(kept) if kept != cohort => {
                    draft.other_cohorts.insert(cohort);
                }
                Some(_) => {}
            }
        }
        if row.gender != Gender::Unknown {
            if draft.gender == Gender::Unknown {
                draft.gender = row.gender;
            } else if draft.gender != row.gender {
                draft.other_genders.insert(row.gender);
            }
        }
    }
    drafts
}

/// Assign canonical ids in sorted raw-key order
fn build_universe(drafts: &FxHashMap<&str, PersonDraft>) -> IdentityMap {
    let mut keys: Vec<&str> = drafts.keys().copied().collect();
    keys.sort_unstable();

    let mut lookup = FxHashMap::default();
    lookup.reserve(keys.len());
    let mut persons = Vec::with_capacity(keys.len());
    for (index, raw_id) in keys.into_iter().enumerate() {
        let draft = &drafts[raw_id];
        let id = PersonId(u32::try_from(index).unwrap_or(u32::MAX));
        lookup.insert(raw_id.to_string(), id);
        persons.push(Person {
            id,
            raw_id: raw_id.to_string(),
            birth_cohort: draft.cohort,
            gender: draft.gender,
            first_seen: draft.first_seen,
        });
    }
    IdentityMap { lookup, persons }
}
