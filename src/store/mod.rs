//! Record store
//!
//! Typed, append-only tables of raw register rows, one per declared dataset.
//! The store performs normalization only (trimming identifiers, turning blank
//! values into absent ones, rejecting rows without a key or year). It does no
//! linkage; every downstream entity refers back into it by [`RowRef`].

use std::collections::BTreeMap;

use arrow::record_batch::RecordBatch;
use log::{debug, warn};
use smallvec::SmallVec;

use crate::config::{DatasetKind, EventSchema, PanelConfig, StatusSchema};
use crate::error::{PanelError, Result};
use crate::models::{Event, EventRecord, Gender, RoleSet, RowRef, Status, StatusRecord, StatusRow};
use crate::utils::arrow::{read_text, read_year};

/// Rows of one declared dataset
#[derive(Debug, Clone, PartialEq)]
pub enum Table {
    /// Status register rows
    Status(Vec<StatusRow>),
    /// Event register rows
    Event(Vec<Event>),
}

impl Table {
    fn len(&self) -> usize {
        match self {
            Self::Status(rows) => rows.len(),
            Self::Event(rows) => rows.len(),
        }
    }
}

/// A declared dataset and its rows
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Declared name
    pub name: String,
    /// Typed rows
    pub table: Table,
    /// Rows dropped at ingestion because a key or year was missing
    pub rejected: usize,
}

impl Dataset {
    /// Kind of rows held
    #[must_use]
    pub const fn kind(&self) -> DatasetKind {
        match self.table {
            Table::Status(_) => DatasetKind::Status,
            Table::Event(_) => DatasetKind::Event,
        }
    }

    /// Number of accepted rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether no rows were accepted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Declared datasets mapped to their typed tables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordStore {
    datasets: Vec<Dataset>,
    index: BTreeMap<String, usize>,
    roles: RoleSet,
}

impl RecordStore {
    /// Create an empty store for events carrying `roles`
    #[must_use]
    pub fn new(roles: RoleSet) -> Self {
        Self {
            datasets: Vec::new(),
            index: BTreeMap::new(),
            roles,
        }
    }

    /// Create a store with every source of `config` declared
    pub fn from_config(config: &PanelConfig) -> Result<Self> {
        let mut store = Self::new(config.role_set());
        for source in &config.sources {
            store.declare(&source.name, source.kind)?;
        }
        Ok(store)
    }

    /// Declare a dataset; names must be unique
    pub fn declare(&mut self, name: &str, kind: DatasetKind) -> Result<usize> {
        if self.index.contains_key(name) {
            return Err(PanelError::config(format!("dataset '{name}' declared twice")));
        }
        let table = match kind {
            DatasetKind::Status => Table::Status(Vec::new()),
            DatasetKind::Event => Table::Event(Vec::new()),
        };
        let position = self.datasets.len();
        self.datasets.push(Dataset {
            name: name.to_string(),
            table,
            rejected: 0,
        });
        self.index.insert(name.to_string(), position);
        Ok(position)
    }

    fn dataset_mut(&mut self, name: &str, kind: DatasetKind) -> Result<(usize, &mut Dataset)> {
        let position = *self
            .index
            .get(name)
            .ok_or_else(|| PanelError::UnknownDataset(name.to_string()))?;
        let dataset = &mut self.datasets[position];
        if dataset.kind() != kind {
            return Err(PanelError::config(format!(
                "dataset '{name}' holds {:?} rows, not {kind:?}",
                dataset.kind()
            )));
        }
        Ok((position, dataset))
    }

    /// Append typed status records to a declared status dataset
    ///
    /// Returns the number of accepted rows.
    pub fn push_status<I>(&mut self, dataset: &str, records: I) -> Result<usize>
    where
        I: IntoIterator<Item = StatusRecord>,
    {
        let (position, target) = self.dataset_mut(dataset, DatasetKind::Status)?;
        let Table::Status(rows) = &mut target.table else {
            unreachable!("kind checked by dataset_mut");
        };

        let before = rows.len();
        let mut rejected = 0;
        for record in records {
            let raw_id = record.id.trim();
            if raw_id.is_empty() {
                rejected += 1;
                continue;
            }
            let source = RowRef {
                dataset: position,
                row: rows.len(),
            };
            rows.push(StatusRow {
                source,
                raw_id: raw_id.to_string(),
                year: record.year,
                cohort: record.cohort,
                status: Status::from_raw(record.status.as_deref()),
                gender: record.gender,
            });
        }
        let accepted = rows.len() - before;
        target.rejected += rejected;
        if rejected > 0 {
            warn!("Dataset '{dataset}': rejected {rejected} status rows without identifier");
        }
        debug!("Dataset '{dataset}': accepted {accepted} status rows");
        Ok(accepted)
    }

    /// Append typed event records to a declared event dataset
    ///
    /// Roles named in a record must be declared; roles a record omits are
    /// stored as absent.
    pub fn push_events<I>(&mut self, dataset: &str, records: I) -> Result<usize>
    where
        I: IntoIterator<Item = EventRecord>,
    {
        let roles = self.roles.clone();
        let (position, target) = self.dataset_mut(dataset, DatasetKind::Event)?;
        let Table::Event(rows) = &mut target.table else {
            unreachable!("kind checked by dataset_mut");
        };

        let before = rows.len();
        let mut rejected = 0;
        for record in records {
            let event_id = record.event_id.trim();
            if event_id.is_empty() {
                rejected += 1;
                continue;
            }
            let mut identifiers: SmallVec<[Option<String>; 2]> = SmallVec::from_elem(None, roles.len());
            for (role, raw) in record.identifiers {
                let slot = roles.index_of(&role).ok_or_else(|| {
                    PanelError::config(format!("dataset '{dataset}': undeclared role '{role}'"))
                })?;
                identifiers[slot] = raw
                    .as_deref()
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(ToString::to_string);
            }
            let source = RowRef {
                dataset: position,
                row: rows.len(),
            };
            rows.push(Event {
                source,
                id: event_id.to_string(),
                year: record.year,
                event_type: record
                    .event_type
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty()),
                identifiers,
            });
        }
        let accepted = rows.len() - before;
        target.rejected += rejected;
        if rejected > 0 {
            warn!("Dataset '{dataset}': rejected {rejected} event rows without event id");
        }
        debug!("Dataset '{dataset}': accepted {accepted} event rows");
        Ok(accepted)
    }

    /// Ingest an Arrow batch into a declared dataset using the configured schemas
    pub fn ingest_batch(&mut self, dataset: &str, batch: &RecordBatch, config: &PanelConfig) -> Result<usize> {
        let position = *self
            .index
            .get(dataset)
            .ok_or_else(|| PanelError::UnknownDataset(dataset.to_string()))?;
        match self.datasets[position].kind() {
            DatasetKind::Status => {
                let (records, missing) = status_records(dataset, batch, &config.status_schema)?;
                self.datasets[position].rejected += missing;
                self.push_status(dataset, records)
            }
            DatasetKind::Event => {
                let (records, missing) = event_records(dataset, batch, &config.event_schema)?;
                self.datasets[position].rejected += missing;
                self.push_events(dataset, records)
            }
        }
    }

    /// Declared roles
    #[must_use]
    pub const fn roles(&self) -> &RoleSet {
        &self.roles
    }

    /// All datasets in declaration order
    #[must_use]
    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    /// Status rows of every status dataset, in declaration then row order
    pub fn status_rows(&self) -> impl Iterator<Item = &StatusRow> {
        self.datasets
            .iter()
            .flat_map(|dataset| -> &[StatusRow] {
                match &dataset.table {
                    Table::Status(rows) => rows,
                    Table::Event(_) => &[],
                }
            })
    }

    /// Event rows of every event dataset, in declaration then row order
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.datasets
            .iter()
            .flat_map(|dataset| -> &[Event] {
                match &dataset.table {
                    Table::Event(rows) => rows,
                    Table::Status(_) => &[],
                }
            })
    }

    /// Resolve a status row reference
    #[must_use]
    pub fn status_row(&self, at: RowRef) -> Option<&StatusRow> {
        match &self.datasets.get(at.dataset)?.table {
            Table::Status(rows) => rows.get(at.row),
            Table::Event(_) => None,
        }
    }

    /// Resolve an event row reference
    #[must_use]
    pub fn event(&self, at: RowRef) -> Option<&Event> {
        match &self.datasets.get(at.dataset)?.table {
            Table::Event(rows) => rows.get(at.row),
            Table::Status(_) => None,
        }
    }

    /// Number of status rows across datasets
    #[must_use]
    pub fn status_row_count(&self) -> usize {
        self.status_rows().count()
    }

    /// Number of event rows across datasets
    #[must_use]
    pub fn event_row_count(&self) -> usize {
        self.events().count()
    }
}

/// Convert a status batch into records, counting rows without a year
fn status_records(dataset: &str, batch: &RecordBatch, schema: &StatusSchema) -> Result<(Vec<StatusRecord>, usize)> {
    let ids = read_text(batch, dataset, &schema.id)?;
    let years = read_year(batch, dataset, &schema.year)?;
    let cohorts = read_year(batch, dataset, &schema.cohort)?;
    let statuses = read_text(batch, dataset, &schema.status)?;
    let genders = read_text(batch, dataset, &schema.gender)?;

    let mut missing = 0;
    let mut records = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let (Some(id), Some(year)) = (&ids[row], years[row]) else {
            missing += 1;
            continue;
        };
        records.push(StatusRecord {
            id: id.clone(),
            year,
            cohort: cohorts[row],
            status: statuses[row].clone(),
            gender: genders[row].as_deref().map_or(Gender::Unknown, Gender::from),
        });
    }
    Ok((records, missing))
}

/// Convert an event batch into records, counting rows without an id or year
fn event_records(dataset: &str, batch: &RecordBatch, schema: &EventSchema) -> Result<(Vec<EventRecord>, usize)> {
    let ids = read_text(batch, dataset, &schema.event_id)?;
    let years = read_year(batch, dataset, &schema.year)?;
    let types = match &schema.event_type {
        Some(column) => Some(read_text(batch, dataset, column)?),
        None => None,
    };
    let role_columns = schema
        .roles
        .iter()
        .map(|role| Ok((role.role.as_str(), read_text(batch, dataset, &role.column)?)))
        .collect::<Result<Vec<_>>>()?;

    let mut missing = 0;
    let mut records = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let (Some(id), Some(year)) = (&ids[row], years[row]) else {
            missing += 1;
            continue;
        };
        records.push(EventRecord {
            event_id: id.clone(),
            year,
            event_type: types.as_ref().and_then(|t| t[row].clone()),
            identifiers: role_columns
                .iter()
                .map(|(role, values)| ((*role).to_string(), values[row].clone()))
                .collect(),
        });
    }
    Ok((records, missing))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int32Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn store() -> RecordStore {
        let mut store = RecordStore::new(RoleSet::new(["mother", "father"]));
        store.declare("bef", DatasetKind::Status).unwrap();
        store.declare("mfr", DatasetKind::Event).unwrap();
        store
    }

    #[test]
    fn duplicate_declaration_is_rejected() {
        let mut store = store();
        assert!(store.declare("bef", DatasetKind::Event).is_err());
    }

    #[test]
    fn push_status_normalizes_and_rejects_blank_ids() {
        let mut store = store();
        let accepted = store
            .push_status(
                "bef",
                vec![
                    StatusRecord::new(" A ", 1990, "1").with_cohort(1970),
                    StatusRecord::new("  ", 1990, "1"),
                ],
            )
            .unwrap();
        assert_eq!(accepted, 1);
        assert_eq!(store.datasets()[0].rejected, 1);
        let row = store.status_rows().next().unwrap();
        assert_eq!(row.raw_id, "A");
        assert_eq!(row.source, RowRef { dataset: 0, row: 0 });
        assert_eq!(store.status_row(row.source), Some(row));
    }

    #[test]
    fn push_events_aligns_identifiers_with_roles() {
        let mut store = store();
        store
            .push_events(
                "mfr",
                vec![EventRecord::new("b1", 2000).with_identifier("father", Some(" F "))],
            )
            .unwrap();
        let event = store.events().next().unwrap();
        assert_eq!(event.identifier(0), None);
        assert_eq!(event.identifier(1), Some("F"));
    }

    #[test]
    fn undeclared_role_is_an_error() {
        let mut store = store();
        let result = store.push_events(
            "mfr",
            vec![EventRecord::new("b1", 2000).with_identifier("child", Some("C"))],
        );
        assert!(result.is_err());
    }

    #[test]
    fn wrong_kind_is_an_error() {
        let mut store = store();
        assert!(store.push_events("bef", Vec::new()).is_err());
        assert!(matches!(
            store.push_status("lpr", Vec::new()),
            Err(PanelError::UnknownDataset(_))
        ));
    }

    #[test]
    fn ingests_status_batch_with_configured_columns() {
        let config = PanelConfig::default();
        let mut store = RecordStore::new(config.role_set());
        store.declare("bef", DatasetKind::Status).unwrap();

        let schema = Schema::new(vec![
            Field::new("ID", DataType::Utf8, true),
            Field::new("Year", DataType::Int32, true),
            Field::new("Cohort", DataType::Int32, true),
            Field::new("Status", DataType::Int32, true),
            Field::new("Gender", DataType::Utf8, true),
        ]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(StringArray::from(vec![Some("A"), Some("B"), Some("C")])),
                Arc::new(Int32Array::from(vec![Some(1990), Some(1990), None])),
                Arc::new(Int32Array::from(vec![Some(1970), None, Some(1971)])),
                Arc::new(Int32Array::from(vec![Some(1), None, Some(2)])),
                Arc::new(StringArray::from(vec![Some("2"), Some("1"), None])),
            ],
        )
        .unwrap();

        let accepted = store.ingest_batch("bef", &batch, &config).unwrap();
        assert_eq!(accepted, 2);
        assert_eq!(store.datasets()[0].rejected, 1);
        let rows: Vec<_> = store.status_rows().collect();
        assert_eq!(rows[0].status, Status::Known("1".to_string()));
        assert_eq!(rows[0].gender, Gender::Female);
        assert_eq!(rows[1].status, Status::Unknown);
        assert_eq!(rows[1].cohort, None);
    }

    #[test]
    fn ingest_reports_missing_role_column() {
        let config = PanelConfig::default();
        let mut store = RecordStore::new(config.role_set());
        store.declare("mfr", DatasetKind::Event).unwrap();
        let schema = Schema::new(vec![
            Field::new("EventID", DataType::Utf8, false),
            Field::new("Year", DataType::Int32, false),
            Field::new("MotherID", DataType::Utf8, true),
        ]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(StringArray::from(vec!["e1"])),
                Arc::new(Int32Array::from(vec![2000])),
                Arc::new(StringArray::from(vec![Some("A")])),
            ],
        )
        .unwrap();
        let err = store.ingest_batch("mfr", &batch, &config).unwrap_err();
        assert!(matches!(err, PanelError::MissingColumn { column, .. } if column == "FatherID"));
    }
}
