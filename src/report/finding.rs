//! Structured findings
//!
//! A finding records one recoverable anomaly with enough keys (event id, raw
//! and canonical person id, role, year) to trace it back by hand.

use std::fmt;

use arrow::datatypes::FieldRef;
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use serde_arrow::schema::{SchemaLike, TracingOptions};

use crate::error::Result;
use crate::models::PersonId;

/// Category of a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// Event role identifier not present in the status register
    UnresolvedIdentifier,
    /// Event row without an identifier for a role
    MissingIdentifier,
    /// Attached event year not covered by any spell
    UncoveredEvent,
    /// Repeated raw row for an already attached `(event, role)`
    DuplicateEventRow,
    /// Repeated raw row whose identifier or year disagrees with the first
    ConflictingDuplicate,
    /// One person attached to one event under two roles
    CrossRoleIdentifierConflict,
    /// Covered attachment whose person-year is not in the risk set
    OutsideRiskSet,
    /// Event counts that do not reconcile
    CountMismatch,
    /// Status rows disagree on a person's birth cohort
    CohortConflict,
    /// Status rows disagree on a person's gender
    GenderConflict,
    /// Two status rows for the same person-year disagree on status
    StatusConflict,
    /// Person without a birth cohort; excluded from the risk set
    MissingCohort,
    /// Forward-filled spell
    InsertedSpell,
    /// Unknown-status spell synthesized over a gap
    UnknownSpell,
    /// Gap inside the observed span left open
    UnobservedGap,
}

impl FindingKind {
    /// Stable snake_case label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnresolvedIdentifier => "unresolved_identifier",
            Self::MissingIdentifier => "missing_identifier",
            Self::UncoveredEvent => "uncovered_event",
            Self::DuplicateEventRow => "duplicate_event_row",
            Self::ConflictingDuplicate => "conflicting_duplicate",
            Self::CrossRoleIdentifierConflict => "cross_role_identifier_conflict",
            Self::OutsideRiskSet => "outside_risk_set",
            Self::CountMismatch => "count_mismatch",
            Self::CohortConflict => "cohort_conflict",
            Self::GenderConflict => "gender_conflict",
            Self::StatusConflict => "status_conflict",
            Self::MissingCohort => "missing_cohort",
            Self::InsertedSpell => "inserted_spell",
            Self::UnknownSpell => "unknown_spell",
            Self::UnobservedGap => "unobserved_gap",
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recoverable anomaly
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Finding {
    /// Category
    pub finding_type: FindingKind,
    /// Event key, for event-related findings
    pub event_id: Option<String>,
    /// Canonical person, when resolved
    pub canonical_id: Option<PersonId>,
    /// Raw person identifier as it appeared in the source
    pub person_id: Option<String>,
    /// Role name, for role-related findings
    pub role: Option<String>,
    /// Year the finding concerns
    pub year: Option<i32>,
    /// Free-text detail
    pub detail: String,
}

impl Finding {
    /// Create a finding with only a category and detail
    pub fn new(finding_type: FindingKind, detail: impl Into<String>) -> Self {
        Self {
            finding_type,
            event_id: None,
            canonical_id: None,
            person_id: None,
            role: None,
            year: None,
            detail: detail.into(),
        }
    }

    /// Attach an event key
    #[must_use]
    pub fn event(mut self, event_id: &str) -> Self {
        self.event_id = Some(event_id.to_string());
        self
    }

    /// Attach a raw person identifier
    #[must_use]
    pub fn raw_person(mut self, raw_id: &str) -> Self {
        self.person_id = Some(raw_id.to_string());
        self
    }

    /// Attach a canonical person
    #[must_use]
    pub const fn person(mut self, id: PersonId) -> Self {
        self.canonical_id = Some(id);
        self
    }

    /// Attach a role name
    #[must_use]
    pub fn role(mut self, role: &str) -> Self {
        self.role = Some(role.to_string());
        self
    }

    /// Attach a year
    #[must_use]
    pub const fn year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }
}

/// Flat row layout used for the Arrow export
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FindingRow {
    finding_type: String,
    event_id: Option<String>,
    person_id: Option<String>,
    canonical_id: Option<u32>,
    role: Option<String>,
    year: Option<i32>,
    detail: String,
}

impl From<&Finding> for FindingRow {
    fn from(finding: &Finding) -> Self {
        Self {
            finding_type: finding.finding_type.as_str().to_string(),
            event_id: finding.event_id.clone(),
            person_id: finding.person_id.clone(),
            canonical_id: finding.canonical_id.map(|id| id.0),
            role: finding.role.clone(),
            year: finding.year,
            detail: finding.detail.clone(),
        }
    }
}

/// Convert findings to an Arrow record batch
pub fn findings_to_record_batch(findings: &[Finding]) -> Result<RecordBatch> {
    let rows: Vec<FindingRow> = findings.iter().map(FindingRow::from).collect();
    let fields = Vec::<FieldRef>::from_type::<FindingRow>(TracingOptions::default())
        .map_err(|e| anyhow::anyhow!("Schema generation error: {}", e))?;
    serde_arrow::to_record_batch(&fields, &rows)
        .map_err(|e| anyhow::anyhow!("Serialization error: {}", e).into())
}
