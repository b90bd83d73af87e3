//! Synthetic register extracts
//!
//! Seeded generator of status and event registers with the usual defects:
//! gaps inside observed spans, duplicate rows, births with unresolvable or
//! missing fathers. Output is deterministic for a given seed.

use std::sync::Arc;

use arrow::array::{ArrayRef, Int32Builder, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use rand::prelude::*;

use crate::config::{DatasetKind, PanelConfig, YearRange};
use crate::error::Result;
use crate::models::{EventRecord, Gender, StatusRecord};
use crate::store::RecordStore;

/// Parameters of the generator
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticConfig {
    /// Number of persons
    pub persons: usize,
    /// Calendar years the registers span
    pub years: YearRange,
    /// Inclusive range of birth cohorts
    pub cohorts: (i32, i32),
    /// Chance that a year inside a person's span is missing
    pub gap_rate: f64,
    /// Chance that a row is emitted twice
    pub duplicate_rate: f64,
    /// Chance that the status changes from one year to the next
    pub status_change_rate: f64,
    /// Chance of a birth per woman-year between ages 20 and 40
    pub birth_rate: f64,
    /// Chance that a father identifier is unknown to the status register
    pub orphan_rate: f64,
    /// Chance that a father identifier is missing
    pub missing_father_rate: f64,
    /// RNG seed
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            persons: 200,
            years: YearRange {
                start: 1990,
                end: 2010,
            },
            cohorts: (1950, 1985),
            gap_rate: 0.05,
            duplicate_rate: 0.02,
            status_change_rate: 0.1,
            birth_rate: 0.08,
            orphan_rate: 0.02,
            missing_father_rate: 0.05,
            seed: 42,
        }
    }
}

/// Generated status and event registers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyntheticRegisters {
    /// Status register rows
    pub status: Vec<StatusRecord>,
    /// Event register rows with `mother` and `father` identifiers
    pub events: Vec<EventRecord>,
}

const STATUS_CODES: [&str; 3] = ["1", "2", "3"];

impl SyntheticRegisters {
    /// Generate registers from `config`
    #[must_use]
    pub fn generate(config: &SyntheticConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut registers = Self::default();

        let people: Vec<(String, i32, Gender)> = (0..config.persons)
            .map(|i| {
                let cohort = rng.random_range(config.cohorts.0..=config.cohorts.1);
                let gender = if rng.random_bool(0.5) {
                    Gender::Female
                } else {
                    Gender::Male
                };
                (format!("P{i:06}"), cohort, gender)
            })
            .collect();
        let fathers: Vec<&str> = people
            .iter()
            .filter(|(_, _, gender)| *gender == Gender::Male)
            .map(|(id, _, _)| id.as_str())
            .collect();

        let span = config.years.end - config.years.start;
        let mut births = 0usize;
        for (id, cohort, gender) in &people {
            let first = config.years.start + rng.random_range(0..=span.min(5).max(0));
            let last = (config.years.end - rng.random_range(0..=span.min(5).max(0))).max(first);
            let mut status = rng.random_range(0..STATUS_CODES.len());

            for year in first..=last {
                if rng.random_bool(config.status_change_rate) {
                    status = rng.random_range(0..STATUS_CODES.len());
                }
                let endpoint = year == first || year == last;
                if !endpoint && rng.random_bool(config.gap_rate) {
                    continue;
                }
                let record = StatusRecord::new(id.as_str(), year, STATUS_CODES[status])
                    .with_cohort(*cohort)
                    .with_gender(*gender);
                if rng.random_bool(config.duplicate_rate) {
                    registers.status.push(record.clone());
                }
                registers.status.push(record);

                let age = year - cohort;
                if *gender == Gender::Female && (20..=40).contains(&age) && rng.random_bool(config.birth_rate) {
                    births += 1;
                    let father = if rng.random_bool(config.missing_father_rate) || fathers.is_empty() {
                        None
                    } else if rng.random_bool(config.orphan_rate) {
                        Some(format!("X{births:06}"))
                    } else {
                        Some(fathers[rng.random_range(0..fathers.len())].to_string())
                    };
                    let event = EventRecord::new(format!("E{births:06}"), year)
                        .with_type("birth")
                        .with_identifier("mother", Some(id.as_str()))
                        .with_identifier("father", father.as_deref());
                    if rng.random_bool(config.duplicate_rate) {
                        registers.events.push(event.clone());
                    }
                    registers.events.push(event);
                }
            }
        }
        registers
    }

    /// Load the registers into a store declaring `bef` (status) and `mfr`
    /// (events)
    pub fn into_store(self, config: &PanelConfig) -> Result<RecordStore> {
        let mut store = RecordStore::new(config.role_set());
        store.declare("bef", DatasetKind::Status)?;
        store.declare("mfr", DatasetKind::Event)?;
        store.push_status("bef", self.status)?;
        store.push_events("mfr", self.events)?;
        Ok(store)
    }

    /// Status register as a record batch in the default column layout
    pub fn status_batch(&self) -> Result<RecordBatch> {
        let rows = self.status.len();
        let mut id = StringBuilder::with_capacity(rows, rows * 7);
        let mut year = Int32Builder::with_capacity(rows);
        let mut cohort = Int32Builder::with_capacity(rows);
        let mut status = StringBuilder::with_capacity(rows, rows);
        let mut gender = StringBuilder::with_capacity(rows, rows);
        for record in &self.status {
            id.append_value(&record.id);
            year.append_value(record.year);
            cohort.append_option(record.cohort);
            status.append_option(record.status.as_deref());
            gender.append_value(match record.gender {
                Gender::Male => "M",
                Gender::Female => "F",
                Gender::Unknown => "",
            });
        }
        let schema = Schema::new(vec![
            Field::new("ID", DataType::Utf8, false),
            Field::new("Year", DataType::Int32, false),
            Field::new("Cohort", DataType::Int32, true),
            Field::new("Status", DataType::Utf8, true),
            Field::new("Gender", DataType::Utf8, true),
        ]);
        let columns: Vec<ArrayRef> = vec![
            Arc::new(id.finish()),
            Arc::new(year.finish()),
            Arc::new(cohort.finish()),
            Arc::new(status.finish()),
            Arc::new(gender.finish()),
        ];
        Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
    }

    /// Event register as a record batch in the default column layout
    pub fn event_batch(&self) -> Result<RecordBatch> {
        let rows = self.events.len();
        let mut event_id = StringBuilder::with_capacity(rows, rows * 7);
        let mut year = Int32Builder::with_capacity(rows);
        let mut mother = StringBuilder::with_capacity(rows, rows * 7);
        let mut father = StringBuilder::with_capacity(rows, rows * 7);
        for event in &self.events {
            event_id.append_value(&event.event_id);
            year.append_value(event.year);
            mother.append_option(role_identifier(event, "mother"));
            father.append_option(role_identifier(event, "father"));
        }
        let schema = Schema::new(vec![
            Field::new("EventID", DataType::Utf8, false),
            Field::new("Year", DataType::Int32, false),
            Field::new("MotherID", DataType::Utf8, true),
            Field::new("FatherID", DataType::Utf8, true),
        ]);
        let columns: Vec<ArrayRef> = vec![
            Arc::new(event_id.finish()),
            Arc::new(year.finish()),
            Arc::new(mother.finish()),
            Arc::new(father.finish()),
        ];
        Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
    }
}

fn role_identifier<'a>(event: &'a EventRecord, role: &str) -> Option<&'a str> {
    event
        .identifiers
        .iter()
        .find(|(name, _)| name == role)
        .and_then(|(_, id)| id.as_deref())
}
