//! Reconciliation audit
//!
//! Recounts events per role and year straight from the raw rows and compares
//! them with the attachments and the panel. The auditor only reads; every
//! discrepancy becomes a finding.

use std::collections::BTreeMap;

use log::{info, warn};
use rustc_hash::FxHashSet;

use crate::models::{Attachment, PersonId, RoleSet};
use crate::report::{Finding, FindingKind, RoleYearTally};
use crate::store::RecordStore;

use super::identity::IdentityMap;
use super::panel::Panel;
use super::risk_set::RiskSet;

/// Output of the auditor
#[derive(Debug, Clone, Default)]
pub struct AuditOutcome {
    /// Per role and year tallies, in role then year order
    pub tallies: Vec<RoleYearTally>,
    /// Covered attachments outside the risk set
    pub outside_risk_set: usize,
    /// Discrepancies found
    pub findings: Vec<Finding>,
}

/// Keys behind one role-year tally
#[derive(Debug, Default)]
struct Trace<'a> {
    /// First resolvable raw row per event: event id to raw identifier
    resolvable: BTreeMap<&'a str, &'a str>,
    /// Attachments: event id to person
    attached: BTreeMap<&'a str, PersonId>,
    /// Matched attachments inside the risk set, per person
    in_panel: BTreeMap<PersonId, Vec<&'a str>>,
    /// Panel event counts per person
    panel: BTreeMap<PersonId, u32>,
}

type Key = (usize, i32);

/// Compares raw events, attachments and the panel per role and year
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconciliationAuditor;

impl ReconciliationAuditor {
    /// Audit a completed run
    #[must_use]
    pub fn audit(
        &self,
        store: &RecordStore,
        identities: &IdentityMap,
        attachments: &[Attachment],
        risk_set: &RiskSet,
        panel: &Panel,
    ) -> AuditOutcome {
        let roles = store.roles();
        let mut tallies: BTreeMap<Key, RoleYearTally> = BTreeMap::new();
        let mut traces: BTreeMap<Key, Trace<'_>> = BTreeMap::new();
        let mut outcome = AuditOutcome::default();

        count_raw_events(store, identities, roles, &mut tallies, &mut traces);

        for attachment in attachments {
            let key = (attachment.role, attachment.event_year);
            let tally = tally_for(&mut tallies, roles, key);
            let trace = traces.entry(key).or_default();
            tally.attachments += 1;
            trace.attached.insert(attachment.event_id.as_str(), attachment.person);
            if !attachment.is_covered() {
                continue;
            }
            tally.matched += 1;
            if risk_set.contains(attachment.person, attachment.event_year) {
                tally.in_panel += 1;
                trace
                    .in_panel
                    .entry(attachment.person)
                    .or_default()
                    .push(attachment.event_id.as_str());
            } else {
                outcome.outside_risk_set += 1;
                outcome.findings.push(
                    Finding::new(
                        FindingKind::OutsideRiskSet,
                        "covered event for a person-year outside the risk set",
                    )
                    .event(&attachment.event_id)
                    .raw_person(raw_id(identities, attachment.person))
                    .person(attachment.person)
                    .role(roles.name(attachment.role).unwrap_or_default())
                    .year(attachment.event_year),
                );
            }
        }

        for row in panel.rows() {
            for (role, &count) in row.events.iter().enumerate() {
                if count > 0 {
                    let key = (role, row.year);
                    tally_for(&mut tallies, roles, key).panel_events += count as usize;
                    *traces.entry(key).or_default().panel.entry(row.person).or_default() += count;
                }
            }
        }

        for (key, tally) in &tallies {
            let Some(trace) = traces.get(key) else {
                continue;
            };
            if tally.resolvable_events != tally.attachments {
                outcome
                    .findings
                    .extend(attachment_mismatches(tally, trace, identities));
            }
            if tally.in_panel != tally.panel_events {
                outcome
                    .findings
                    .extend(panel_mismatches(tally, trace, identities));
            }
        }

        let mismatches = outcome
            .findings
            .iter()
            .filter(|f| f.finding_type == FindingKind::CountMismatch)
            .count();
        if mismatches > 0 {
            warn!("Audit found {mismatches} count mismatches");
        }
        if outcome.outside_risk_set > 0 {
            info!(
                "{} matched attachments fall outside the risk set",
                outcome.outside_risk_set
            );
        }
        outcome.tallies = tallies.into_values().collect();
        outcome
    }
}

fn tally_for<'a>(
    tallies: &'a mut BTreeMap<Key, RoleYearTally>,
    roles: &RoleSet,
    (role, year): Key,
) -> &'a mut RoleYearTally {
    tallies.entry((role, year)).or_insert_with(|| RoleYearTally {
        role: roles.name(role).unwrap_or_default().to_string(),
        year,
        ..Default::default()
    })
}

fn raw_id(identities: &IdentityMap, person: PersonId) -> &str {
    identities
        .person(person)
        .map(|p| p.raw_id.as_str())
        .unwrap_or_default()
}

/// Raw rows per role and year, and distinct events with a resolvable identifier
fn count_raw_events<'a>(
    store: &'a RecordStore,
    identities: &IdentityMap,
    roles: &RoleSet,
    tallies: &mut BTreeMap<Key, RoleYearTally>,
    traces: &mut BTreeMap<Key, Trace<'a>>,
) {
    let mut counted: FxHashSet<(&str, usize)> = FxHashSet::default();
    for event in store.events() {
        for role in 0..roles.len() {
            let Some(raw) = event.identifier(role) else {
                continue;
            };
            let key = (role, event.year);
            let tally = tally_for(tallies, roles, key);
            tally.raw_rows += 1;
            // The first resolvable row of an event defines its year.
            if identities.resolve(raw).is_none() || !counted.insert((event.id.as_str(), role)) {
                continue;
            }
            tally.resolvable_events += 1;
            traces
                .entry(key)
                .or_default()
                .resolvable
                .insert(event.id.as_str(), raw);
        }
    }
}

fn mismatch(tally: &RoleYearTally, detail: String) -> Finding {
    Finding::new(FindingKind::CountMismatch, detail)
        .role(&tally.role)
        .year(tally.year)
}

/// One finding per event present on only one side of raw rows vs attachments
fn attachment_mismatches(tally: &RoleYearTally, trace: &Trace<'_>, identities: &IdentityMap) -> Vec<Finding> {
    let mut findings = Vec::new();
    for (&event, &raw) in &trace.resolvable {
        if !trace.attached.contains_key(event) {
            let mut finding = mismatch(tally, "resolvable event has no attachment".to_string())
                .event(event)
                .raw_person(raw);
            if let Some(person) = identities.resolve(raw) {
                finding = finding.person(person);
            }
            findings.push(finding);
        }
    }
    for (&event, &person) in &trace.attached {
        if !trace.resolvable.contains_key(event) {
            findings.push(
                mismatch(tally, "attachment without a resolvable raw event".to_string())
                    .event(event)
                    .raw_person(raw_id(identities, person))
                    .person(person),
            );
        }
    }
    if findings.is_empty() {
        findings.push(mismatch(
            tally,
            format!(
                "{} resolvable events but {} attachments",
                tally.resolvable_events, tally.attachments
            ),
        ));
    }
    findings
}

/// One finding per person whose panel count disagrees with their attachments
fn panel_mismatches(tally: &RoleYearTally, trace: &Trace<'_>, identities: &IdentityMap) -> Vec<Finding> {
    let mut persons: Vec<PersonId> = trace.in_panel.keys().chain(trace.panel.keys()).copied().collect();
    persons.sort_unstable();
    persons.dedup();

    let mut findings = Vec::new();
    for person in persons {
        let events = trace.in_panel.get(&person).map(Vec::as_slice).unwrap_or_default();
        let counted = trace.panel.get(&person).copied().unwrap_or_default();
        if events.len() == counted as usize {
            continue;
        }
        let mut finding = mismatch(
            tally,
            format!(
                "{} matched attachments [{}] but {} panel events",
                events.len(),
                events.join(", "),
                counted
            ),
        )
        .raw_person(raw_id(identities, person))
        .person(person);
        if let Some(event) = events.first() {
            finding = finding.event(event);
        }
        findings.push(finding);
    }
    if findings.is_empty() {
        findings.push(mismatch(
            tally,
            format!(
                "{} matched attachments in the risk set but {} panel events",
                tally.in_panel, tally.panel_events
            ),
        ));
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::panel::PanelAssembler;
    use crate::algorithm::risk_set::RiskSetEntry;
    use crate::config::DatasetKind;
    use crate::models::{EventRecord, PersonId, RowRef, SpellId, Status, StatusRecord};

    fn setup() -> (RecordStore, IdentityMap) {
        let mut store = RecordStore::new(RoleSet::new(["mother"]));
        store.declare("bef", DatasetKind::Status).unwrap();
        store.declare("mfr", DatasetKind::Event).unwrap();
        store
            .push_status("bef", vec![StatusRecord::new("M", 1990, "1").with_cohort(1970)])
            .unwrap();
        store
            .push_events(
                "mfr",
                vec![
                    EventRecord::new("b1", 1990).with_identifier("mother", Some("M")),
                    EventRecord::new("b1", 1990).with_identifier("mother", Some("M")),
                    EventRecord::new("b2", 1990).with_identifier("mother", Some("X")),
                ],
            )
            .unwrap();
        let config = crate::config::PanelConfig {
            unresolved_threshold: 1.0,
            ..Default::default()
        };
        let identities = crate::algorithm::identity::IdentityReconciler::new(&config)
            .reconcile(&store)
            .unwrap()
            .identities;
        (store, identities)
    }

    fn attachment(year: i32) -> Attachment {
        Attachment {
            event_id: "b1".to_string(),
            event_year: year,
            person: PersonId(0),
            role: 0,
            matched_spell: Some(SpellId {
                person: PersonId(0),
                ordinal: 0,
            }),
            source: RowRef { dataset: 1, row: 0 },
        }
    }

    fn risk_set(years: &[i32]) -> RiskSet {
        RiskSet::from_entries(
            years
                .iter()
                .map(|&year| RiskSetEntry {
                    person: PersonId(0),
                    year,
                    age: year - 1970,
                    status: Status::Known("1".to_string()),
                    spell: SpellId {
                        person: PersonId(0),
                        ordinal: 0,
                    },
                })
                .collect(),
        )
    }

    #[test]
    fn consistent_run_has_no_mismatch() {
        let (store, identities) = setup();
        let attachments = vec![attachment(1990)];
        let risk = risk_set(&[1990]);
        let panel = PanelAssembler
            .assemble(store.roles(), &identities, &risk, &attachments);
        let outcome = ReconciliationAuditor.audit(&store, &identities, &attachments, &risk, &panel);

        assert!(outcome.findings.is_empty());
        let tally = &outcome.tallies[0];
        assert_eq!(tally.raw_rows, 3);
        assert_eq!(tally.resolvable_events, 1);
        assert_eq!(tally.in_panel, 1);
        assert_eq!(tally.panel_events, 1);
    }

    #[test]
    fn outside_risk_set_is_reported() {
        let (store, identities) = setup();
        let attachments = vec![attachment(1990)];
        let risk = risk_set(&[]);
        let panel = PanelAssembler
            .assemble(store.roles(), &identities, &risk, &attachments);
        let outcome = ReconciliationAuditor.audit(&store, &identities, &attachments, &risk, &panel);

        assert_eq!(outcome.outside_risk_set, 1);
        assert_eq!(outcome.findings[0].finding_type, FindingKind::OutsideRiskSet);
        assert_eq!(outcome.findings[0].person_id.as_deref(), Some("M"));
    }

    #[test]
    fn missing_attachment_names_event_and_person() {
        let (store, identities) = setup();
        let risk = risk_set(&[1990]);
        let panel = PanelAssembler.assemble(store.roles(), &identities, &risk, &[]);
        let outcome = ReconciliationAuditor.audit(&store, &identities, &[], &risk, &panel);

        assert_eq!(outcome.findings.len(), 1);
        let finding = &outcome.findings[0];
        assert_eq!(finding.finding_type, FindingKind::CountMismatch);
        assert_eq!(finding.event_id.as_deref(), Some("b1"));
        assert_eq!(finding.person_id.as_deref(), Some("M"));
        assert_eq!(finding.canonical_id, Some(PersonId(0)));
        assert_eq!(finding.role.as_deref(), Some("mother"));
        assert_eq!(finding.year, Some(1990));
    }

    #[test]
    fn panel_without_attached_event_names_event_and_person() {
        let (store, identities) = setup();
        let attachments = vec![attachment(1990)];
        let risk = risk_set(&[1990]);
        let panel = PanelAssembler.assemble(store.roles(), &identities, &risk, &[]);
        let outcome = ReconciliationAuditor.audit(&store, &identities, &attachments, &risk, &panel);

        assert_eq!(outcome.findings.len(), 1);
        let finding = &outcome.findings[0];
        assert_eq!(finding.finding_type, FindingKind::CountMismatch);
        assert_eq!(finding.event_id.as_deref(), Some("b1"));
        assert_eq!(finding.person_id.as_deref(), Some("M"));
        assert!(finding.detail.contains("[b1]"));
    }
}
