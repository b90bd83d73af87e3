//! Run report
//!
//! Stage-local recoverable conditions are aggregated here and returned next
//! to the panel. The report is purely diagnostic: nothing in it feeds back
//! into the panel.

pub mod finding;

use std::fmt::Write as _;

use serde::Serialize;

use crate::error::Result;

pub use finding::{Finding, FindingKind, findings_to_record_batch};

/// Per-role attachment counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoleCounters {
    /// Role name
    pub role: String,
    /// Event rows whose identifier resolved to a canonical person
    pub resolved_rows: usize,
    /// Event rows whose identifier did not resolve (orphan events)
    pub orphan_rows: usize,
    /// Event rows without an identifier for this role
    pub missing_rows: usize,
    /// Attachments created
    pub attachments: usize,
    /// Attachments with no covering spell
    pub uncovered: usize,
    /// Duplicate raw rows collapsed into an existing attachment
    pub duplicates_collapsed: usize,
    /// Duplicate raw rows that disagreed with the kept attachment
    pub conflicting_duplicates: usize,
    /// Attachments involved in a cross-role conflict
    pub cross_role_conflicts: usize,
}

/// Run-level counters collected from every stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageCounters {
    /// Status rows read from the record store
    pub status_rows: usize,
    /// Exact duplicate status rows dropped
    pub duplicate_status_rows: usize,
    /// Same person-year rows with a different status, dropped
    pub conflicting_status_rows: usize,
    /// Canonical persons
    pub persons: usize,
    /// Persons without a birth cohort
    pub persons_without_cohort: usize,
    /// Persons whose rows disagree on cohort
    pub cohort_conflicts: usize,
    /// Persons whose rows disagree on gender
    pub gender_conflicts: usize,
    /// Spells after repair
    pub spells: usize,
    /// Forward-filled spells
    pub inserted_spells: usize,
    /// Years covered by forward-filled spells
    pub inserted_years: usize,
    /// Unknown-status spells synthesized over gaps
    pub unknown_spells: usize,
    /// Years covered by unknown-status spells synthesized over gaps
    pub unknown_years: usize,
    /// Gaps left open
    pub unobserved_gaps: usize,
    /// Years inside open gaps
    pub unobserved_years: usize,
    /// Event rows read from the record store
    pub event_rows: usize,
    /// Distinct event ids
    pub events: usize,
    /// Per-role attachment counters
    pub roles: Vec<RoleCounters>,
    /// Person-years in the risk set
    pub risk_set_size: usize,
    /// Panel rows
    pub panel_rows: usize,
    /// Covered attachments outside the risk set
    pub outside_risk_set: usize,
}

impl StageCounters {
    /// Counters for `role`, if it exists
    #[must_use]
    pub fn role(&self, role: &str) -> Option<&RoleCounters> {
        self.roles.iter().find(|counters| counters.role == role)
    }
}

/// Event counts for one role and year, as reconciled by the auditor
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct RoleYearTally {
    /// Role name
    pub role: String,
    /// Event year
    pub year: i32,
    /// Raw event rows in the year (duplicates included)
    pub raw_rows: usize,
    /// Distinct events in the year with a resolvable identifier for the role
    pub resolvable_events: usize,
    /// Attachments in the year
    pub attachments: usize,
    /// Attachments in the year with a matched spell
    pub matched: usize,
    /// Matched attachments that landed in a panel row
    pub in_panel: usize,
    /// Sum of the role's panel event counts in the year
    pub panel_events: usize,
}

/// Diagnostic output of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Aggregated counters
    pub counters: StageCounters,
    /// Per role and year reconciliation
    pub tallies: Vec<RoleYearTally>,
    /// All findings, sorted
    pub findings: Vec<Finding>,
}

impl RunReport {
    /// Number of findings of `kind`
    #[must_use]
    pub fn count(&self, kind: FindingKind) -> usize {
        self.findings
            .iter()
            .filter(|finding| finding.finding_type == kind)
            .count()
    }

    /// Findings of `kind`
    pub fn findings_of(&self, kind: FindingKind) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(move |finding| finding.finding_type == kind)
    }

    /// Serialize the report as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Human-readable summary
    #[must_use]
    pub fn summary(&self) -> String {
        let c = &self.counters;
        let mut summary = String::new();
        let _ = writeln!(summary, "Panel Run Summary:");
        let _ = writeln!(summary, "  Status Rows: {} ({} duplicate, {} conflicting)", c.status_rows, c.duplicate_status_rows, c.conflicting_status_rows);
        let _ = writeln!(summary, "  Persons: {} ({} without cohort)", c.persons, c.persons_without_cohort);
        let _ = writeln!(summary, "  Spells: {} ({} inserted, {} unknown)", c.spells, c.inserted_spells, c.unknown_spells);
        let _ = writeln!(summary, "  Unobserved Gaps: {} ({} years)", c.unobserved_gaps, c.unobserved_years);
        let _ = writeln!(summary, "  Events: {} distinct from {} rows", c.events, c.event_rows);
        for role in &c.roles {
            let _ = writeln!(
                summary,
                "  Role {}: {} attached, {} uncovered, {} orphan, {} missing, {} duplicates collapsed",
                role.role, role.attachments, role.uncovered, role.orphan_rows, role.missing_rows, role.duplicates_collapsed
            );
        }
        let _ = writeln!(summary, "  Risk Set: {} person-years", c.risk_set_size);
        let _ = writeln!(summary, "  Panel Rows: {}", c.panel_rows);
        let _ = writeln!(summary, "  Outside Risk Set: {}", c.outside_risk_set);
        let _ = writeln!(summary, "  Findings: {}", self.findings.len());
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_kind() {
        let report = RunReport {
            findings: vec![
                Finding::new(FindingKind::UncoveredEvent, "a"),
                Finding::new(FindingKind::UncoveredEvent, "b"),
                Finding::new(FindingKind::MissingCohort, "c"),
            ],
            ..Default::default()
        };
        assert_eq!(report.count(FindingKind::UncoveredEvent), 2);
        assert_eq!(report.findings_of(FindingKind::MissingCohort).count(), 1);
        assert_eq!(report.count(FindingKind::CountMismatch), 0);
    }

    #[test]
    fn serializes_to_json() {
        let mut report = RunReport::default();
        report.counters.roles.push(RoleCounters {
            role: "mother".to_string(),
            ..Default::default()
        });
        let json = report.to_json().unwrap();
        assert!(json.contains("\"role\": \"mother\""));
        assert!(report.summary().contains("Role mother"));
    }
}
