//! Panel assembly
//!
//! The risk set is left-joined with the covered attachments on
//! `(person, year = event_year)`, giving exactly one row per at-risk
//! person-year with one indicator and one count per role.

use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanBuilder, Int32Builder, StringBuilder, UInt32Builder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use log::info;
use rustc_hash::FxHashMap;
use smallvec::{SmallVec, smallvec};

use crate::error::Result;
use crate::models::{Attachment, PersonId, RoleSet, Status};

use super::identity::IdentityMap;
use super::risk_set::RiskSet;

/// Per-role event counts of one panel row
pub type RoleCounts = SmallVec<[u32; 2]>;

/// One person-year of the analysis panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelRow {
    /// Canonical person
    pub person: PersonId,
    /// Calendar year
    pub year: i32,
    /// Age in the year
    pub age: i32,
    /// Status of the covering spell
    pub status: Status,
    /// Matched events per role, aligned with the panel's role set
    pub events: RoleCounts,
}

impl PanelRow {
    /// Whether the row has at least one event for the role at `role`
    #[must_use]
    pub fn has_event(&self, role: usize) -> bool {
        self.events.get(role).is_some_and(|&count| count > 0)
    }
}

/// The analysis panel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Panel {
    roles: RoleSet,
    raw_ids: Vec<String>,
    rows: Vec<PanelRow>,
}

impl Panel {
    /// Rows ordered by `(person, year)`
    #[must_use]
    pub fn rows(&self) -> &[PanelRow] {
        &self.rows
    }

    /// Role columns of the panel
    #[must_use]
    pub const fn roles(&self) -> &RoleSet {
        &self.roles
    }

    /// Raw identifier of a canonical person
    #[must_use]
    pub fn raw_id(&self, person: PersonId) -> Option<&str> {
        self.raw_ids.get(person.0 as usize).map(String::as_str)
    }

    /// Row for a person-year
    #[must_use]
    pub fn row(&self, person: PersonId, year: i32) -> Option<&PanelRow> {
        self.rows
            .binary_search_by(|row| (row.person, row.year).cmp(&(person, year)))
            .ok()
            .map(|index| &self.rows[index])
    }

    /// Number of rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the panel is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sum of the role's event counts over rows in `year`
    #[must_use]
    pub fn events_in(&self, role: usize, year: i32) -> usize {
        self.rows
            .iter()
            .filter(|row| row.year == year)
            .map(|row| row.events.get(role).copied().unwrap_or(0) as usize)
            .sum()
    }

    /// Arrow schema of [`Panel::to_record_batch`]
    #[must_use]
    pub fn schema(&self) -> Schema {
        let mut fields = vec![
            Field::new("person_id", DataType::Utf8, false),
            Field::new("canonical_id", DataType::UInt32, false),
            Field::new("year", DataType::Int32, false),
            Field::new("age", DataType::Int32, false),
            Field::new("status", DataType::Utf8, true),
        ];
        for role in self.roles.names() {
            fields.push(Field::new(format!("{role}_event"), DataType::Boolean, false));
            fields.push(Field::new(format!("{role}_events"), DataType::UInt32, false));
        }
        Schema::new(fields)
    }

    /// Convert the panel to an Arrow record batch
    ///
    /// Unknown status is written as null.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let rows = self.rows.len();
        let mut person_builder = StringBuilder::with_capacity(rows, rows * 10);
        let mut canonical_builder = UInt32Builder::with_capacity(rows);
        let mut year_builder = Int32Builder::with_capacity(rows);
        let mut age_builder = Int32Builder::with_capacity(rows);
        let mut status_builder = StringBuilder::with_capacity(rows, rows * 2);
        let mut flag_builders: Vec<BooleanBuilder> =
            (0..self.roles.len()).map(|_| BooleanBuilder::with_capacity(rows)).collect();
        let mut count_builders: Vec<UInt32Builder> =
            (0..self.roles.len()).map(|_| UInt32Builder::with_capacity(rows)).collect();

        for row in &self.rows {
            person_builder.append_value(self.raw_id(row.person).unwrap_or_default());
            canonical_builder.append_value(row.person.0);
            year_builder.append_value(row.year);
            age_builder.append_value(row.age);
            status_builder.append_option(row.status.code());
            for (role, (flags, counts)) in flag_builders.iter_mut().zip(count_builders.iter_mut()).enumerate() {
                flags.append_value(row.has_event(role));
                counts.append_value(row.events.get(role).copied().unwrap_or(0));
            }
        }

        let mut arrays: Vec<ArrayRef> = vec![
            Arc::new(person_builder.finish()),
            Arc::new(canonical_builder.finish()),
            Arc::new(year_builder.finish()),
            Arc::new(age_builder.finish()),
            Arc::new(status_builder.finish()),
        ];
        for (mut flags, mut counts) in flag_builders.into_iter().zip(count_builders) {
            arrays.push(Arc::new(flags.finish()));
            arrays.push(Arc::new(counts.finish()));
        }

        Ok(RecordBatch::try_new(Arc::new(self.schema()), arrays)?)
    }
}

/// Joins the risk set with covered attachments
#[derive(Debug, Clone, Copy, Default)]
pub struct PanelAssembler;

impl PanelAssembler {
    /// Assemble one row per risk-set entry, in risk-set order
    #[must_use]
    pub fn assemble(
        &self,
        roles: &RoleSet,
        identities: &IdentityMap,
        risk_set: &RiskSet,
        attachments: &[Attachment],
    ) -> Panel {
        let mut counts: FxHashMap<(PersonId, i32), RoleCounts> = FxHashMap::default();
        for attachment in attachments.iter().filter(|a| a.is_covered()) {
            let slot = counts
                .entry((attachment.person, attachment.event_year))
                .or_insert_with(|| smallvec![0; roles.len()]);
            slot[attachment.role] += 1;
        }

        let rows: Vec<PanelRow> = risk_set
            .entries()
            .iter()
            .map(|entry| PanelRow {
                person: entry.person,
                year: entry.year,
                age: entry.age,
                status: entry.status.clone(),
                events: counts
                    .get(&(entry.person, entry.year))
                    .cloned()
                    .unwrap_or_else(|| smallvec![0; roles.len()]),
            })
            .collect();

        info!("Assembled panel with {} rows and {} role columns", rows.len(), roles.len());
        Panel {
            roles: roles.clone(),
            raw_ids: identities.persons().iter().map(|p| p.raw_id.clone()).collect(),
            rows,
        }
    }
}
