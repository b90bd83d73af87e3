//! Event attachment
//!
//! Raw event rows are grouped by event id. For every role of an event the
//! first row whose identifier resolves wins; repeated rows collapse into that
//! attachment. The attached person-year is then matched against the repaired
//! spells.

use log::{info, warn};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::PanelConfig;
use crate::error::{PanelError, QualityBreach, Result};
use crate::models::{Attachment, Event, PersonId, RoleSet};
use crate::report::{Finding, FindingKind, RoleCounters};
use crate::store::RecordStore;

use super::identity::IdentityMap;
use super::spells::SpellTable;

/// Output of the event attacher
#[derive(Debug, Clone, Default)]
pub struct AttachOutcome {
    /// Attachments in event first-seen order, then role order
    pub attachments: Vec<Attachment>,
    /// Per-role counters (attachment side only)
    pub roles: Vec<RoleCounters>,
    /// Distinct event ids
    pub events: usize,
    /// Events with at least one cross-role conflict
    pub conflicted_events: usize,
    /// Duplicates, conflicts and uncovered events
    pub findings: Vec<Finding>,
}

impl AttachOutcome {
    /// Attachments of the role at `role`
    pub fn of_role(&self, role: usize) -> impl Iterator<Item = &Attachment> {
        self.attachments.iter().filter(move |a| a.role == role)
    }
}

#[derive(Debug, Default)]
struct GroupResult {
    attachments: Vec<Attachment>,
    roles: Vec<RoleCounters>,
    findings: Vec<Finding>,
    conflicted: bool,
}

/// Attaches events to canonical persons and their spells
#[derive(Debug, Clone, Copy)]
pub struct EventAttacher {
    cross_role_threshold: f64,
}

impl EventAttacher {
    /// Create an attacher from the run configuration
    #[must_use]
    pub const fn new(config: &PanelConfig) -> Self {
        Self {
            cross_role_threshold: config.cross_role_threshold,
        }
    }

    /// Attach every event in the store
    ///
    /// Fails with [`PanelError::DataQualityExceeded`] when the fraction of
    /// events with a cross-role conflict exceeds the configured threshold.
    pub fn attach(
        &self,
        store: &RecordStore,
        identities: &IdentityMap,
        spells: &SpellTable,
    ) -> Result<AttachOutcome> {
        let roles = store.roles();
        let groups = group_events(store);

        let results: Vec<GroupResult> = groups
            .par_iter()
            .map(|(_, rows)| attach_group(rows, roles, identities, spells))
            .collect();

        let mut outcome = AttachOutcome {
            roles: empty_counters(roles),
            events: groups.len(),
            ..Default::default()
        };
        for result in results {
            for (total, part) in outcome.roles.iter_mut().zip(&result.roles) {
                total.attachments += part.attachments;
                total.uncovered += part.uncovered;
                total.duplicates_collapsed += part.duplicates_collapsed;
                total.conflicting_duplicates += part.conflicting_duplicates;
                total.cross_role_conflicts += part.cross_role_conflicts;
            }
            outcome.conflicted_events += usize::from(result.conflicted);
            outcome.attachments.extend(result.attachments);
            outcome.findings.extend(result.findings);
        }

        for role in &outcome.roles {
            info!(
                "Role '{}': {} attachments ({} uncovered, {} duplicates collapsed)",
                role.role, role.attachments, role.uncovered, role.duplicates_collapsed
            );
            if role.conflicting_duplicates > 0 {
                warn!(
                    "Role '{}': {} duplicate rows disagreed with the kept attachment",
                    role.role, role.conflicting_duplicates
                );
            }
        }
        self.check_cross_role(&outcome)?;
        Ok(outcome)
    }

    fn check_cross_role(&self, outcome: &AttachOutcome) -> Result<()> {
        if outcome.events == 0 || outcome.conflicted_events == 0 {
            return Ok(());
        }
        let breach = QualityBreach {
            measure: "cross-role identifier conflicts".to_string(),
            role: None,
            count: outcome.conflicted_events,
            total: outcome.events,
            threshold: self.cross_role_threshold,
        };
        warn!("{} events attach one person under two roles", outcome.conflicted_events);
        if breach.fraction() > self.cross_role_threshold {
            return Err(PanelError::DataQualityExceeded(breach));
        }
        Ok(())
    }
}

fn empty_counters(roles: &RoleSet) -> Vec<RoleCounters> {
    roles
        .names()
        .iter()
        .map(|role| RoleCounters {
            role: role.clone(),
            ..Default::default()
        })
        .collect()
}

/// Group raw event rows by event id, in first-seen order
fn group_events(store: &RecordStore) -> Vec<(&str, Vec<&Event>)> {
    let mut position: FxHashMap<&str, usize> = FxHashMap::default();
    let mut groups: Vec<(&str, Vec<&Event>)> = Vec::new();
    for event in store.events() {
        let index = *position.entry(event.id.as_str()).or_insert_with(|| {
            groups.push((event.id.as_str(), Vec::new()));
            groups.len() - 1
        });
        groups[index].1.push(event);
    }
    groups
}

fn attach_group(
    rows: &[&Event],
    roles: &RoleSet,
    identities: &IdentityMap,
    spells: &SpellTable,
) -> GroupResult {
    let mut result = GroupResult {
        roles: empty_counters(roles),
        ..Default::default()
    };

    for (slot, counters) in result.roles.iter_mut().enumerate() {
        let role = counters.role.as_str();
        let mut kept: Option<(&Event, PersonId)> = None;
        for &row in rows {
            let Some(raw) = row.identifier(slot) else {
                continue;
            };
            let Some(person) = identities.resolve(raw) else {
                continue;
            };
            match kept {
                None => kept = Some((row, person)),
                Some((first, first_person)) if first_person == person && first.year == row.year => {
                    counters.duplicates_collapsed += 1;
                    result.findings.push(
                        Finding::new(FindingKind::DuplicateEventRow, "collapsed into existing attachment")
                            .event(&row.id)
                            .raw_person(raw)
                            .person(person)
                            .role(role)
                            .year(row.year),
                    );
                }
                Some((first, first_person)) => {
                    counters.conflicting_duplicates += 1;
                    result.findings.push(
                        Finding::new(
                            FindingKind::ConflictingDuplicate,
                            format!(
                                "kept person {first_person} in {}, dropped person {person} in {}",
                                first.year, row.year
                            ),
                        )
                        .event(&row.id)
                        .raw_person(raw)
                        .person(person)
                        .role(role)
                        .year(row.year),
                    );
                }
            }
        }

        let Some((row, person)) = kept else {
            continue;
        };
        let matched_spell = spells.covering(person, row.year).map(|spell| spell.id);
        counters.attachments += 1;
        if matched_spell.is_none() {
            counters.uncovered += 1;
            result.findings.push(
                Finding::new(FindingKind::UncoveredEvent, "no spell covers the event year")
                    .event(&row.id)
                    .raw_person(row.identifier(slot).unwrap_or_default())
                    .person(person)
                    .role(role)
                    .year(row.year),
            );
        }
        result.attachments.push(Attachment {
            event_id: row.id.clone(),
            event_year: row.year,
            person,
            role: slot,
            matched_spell,
            source: row.source,
        });
    }

    flag_cross_role(&mut result, roles);
    result
}

/// Flag persons attached under more than one role of the same event
fn flag_cross_role(result: &mut GroupResult, roles: &RoleSet) {
    let attachments = &result.attachments;
    for (i, first) in attachments.iter().enumerate() {
        for second in &attachments[i + 1..] {
            if first.person != second.person {
                continue;
            }
            result.conflicted = true;
            let first_role = roles.name(first.role).unwrap_or_default();
            let second_role = roles.name(second.role).unwrap_or_default();
            result.findings.push(
                Finding::new(
                    FindingKind::CrossRoleIdentifierConflict,
                    format!("person attached as both {first_role} and {second_role}"),
                )
                .event(&second.event_id)
                .person(second.person)
                .role(second_role)
                .year(second.event_year),
            );
        }
    }
    if result.conflicted {
        let mut seen: FxHashMap<PersonId, usize> = FxHashMap::default();
        for attachment in attachments {
            *seen.entry(attachment.person).or_default() += 1;
        }
        for attachment in attachments {
            if seen[&attachment.person] > 1 {
                result.roles[attachment.role].cross_role_conflicts += 1;
            }
        }
    }
}

/// Check attachment uniqueness and spell matching
///
/// Every `(event, role)` has at most one attachment, and a matched spell
/// belongs to the attached person and covers the event year.
pub fn validate_attachments(attachments: &[Attachment], spells: &SpellTable) -> Result<()> {
    let mut seen: FxHashSet<(&str, usize)> = FxHashSet::default();
    for attachment in attachments {
        if !seen.insert((attachment.event_id.as_str(), attachment.role)) {
            return Err(PanelError::invariant(
                "event attachment",
                format!(
                    "event {} has more than one attachment for role {}",
                    attachment.event_id, attachment.role
                ),
            ));
        }
        if let Some(id) = attachment.matched_spell {
            let valid = id.person == attachment.person
                && spells.spell(id).is_some_and(|spell| spell.covers(attachment.event_year));
            if !valid {
                return Err(PanelError::invariant(
                    "event attachment",
                    format!("event {} matched spell {id} that does not cover it", attachment.event_id),
                ));
            }
        }
    }
    Ok(())
}
