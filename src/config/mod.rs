//! Configuration for panel construction.
//!
//! Everything that is a policy choice (risk band, target years, gap repair,
//! quality thresholds) and every column name the ingestion depends on is
//! declared here rather than hardcoded.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PanelError, Result};
use crate::models::RoleSet;

/// How gaps strictly inside a person's observed span are repaired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GapFillPolicy {
    /// Carry the preceding status forward, up to `max_fill_gap` years
    #[default]
    ForwardFill,
    /// Leave the gap open and annotate it as unobserved
    LeaveGap,
    /// Fill the gap with an unknown-status spell
    MarkUnknown,
}

impl fmt::Display for GapFillPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ForwardFill => "forward-fill",
            Self::LeaveGap => "leave-gap",
            Self::MarkUnknown => "mark-unknown",
        };
        f.write_str(label)
    }
}

/// Kind of register extract a source holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    /// Population/status register
    Status,
    /// Event register
    Event,
}

/// A declared register extract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Dataset name used throughout logs and reports
    pub name: String,
    /// What the extract contains
    pub kind: DatasetKind,
    /// Parquet file or directory of Parquet files
    pub path: PathBuf,
}

/// Column names of the status register
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusSchema {
    /// Person identifier column
    pub id: String,
    /// Reporting year column (integer or date)
    pub year: String,
    /// Birth year column
    pub cohort: String,
    /// Status code column
    pub status: String,
    /// Gender column
    pub gender: String,
}

impl Default for StatusSchema {
    fn default() -> Self {
        Self {
            id: "ID".to_string(),
            year: "Year".to_string(),
            cohort: "Cohort".to_string(),
            status: "Status".to_string(),
            gender: "Gender".to_string(),
        }
    }
}

/// Mapping from a role to the event-register column carrying its identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleColumn {
    /// Role name, e.g. `mother`
    pub role: String,
    /// Column holding the raw identifier
    pub column: String,
}

impl RoleColumn {
    /// Create a role mapping
    pub fn new(role: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            column: column.into(),
        }
    }
}

/// Column names of the event register
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSchema {
    /// Event identifier column
    pub event_id: String,
    /// Event year column (integer or date)
    pub year: String,
    /// Optional event type column
    pub event_type: Option<String>,
    /// Role identifier columns, in output order
    pub roles: Vec<RoleColumn>,
}

impl Default for EventSchema {
    fn default() -> Self {
        Self {
            event_id: "EventID".to_string(),
            year: "Year".to_string(),
            event_type: None,
            roles: vec![
                RoleColumn::new("mother", "MotherID"),
                RoleColumn::new("father", "FatherID"),
            ],
        }
    }
}

/// Inclusive age band defining the risk population
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeBand {
    /// Minimum age (inclusive)
    pub min_age: i32,
    /// Maximum age (inclusive)
    pub max_age: i32,
}

impl AgeBand {
    /// Whether `age` lies in the band
    #[must_use]
    pub const fn contains(&self, age: i32) -> bool {
        self.min_age <= age && age <= self.max_age
    }
}

impl Default for AgeBand {
    fn default() -> Self {
        Self {
            min_age: 15,
            max_age: 50,
        }
    }
}

/// Inclusive range of target years
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    /// First target year
    pub start: i32,
    /// Last target year
    pub end: i32,
}

impl YearRange {
    /// Whether `year` lies in the range
    #[must_use]
    pub const fn contains(&self, year: i32) -> bool {
        self.start <= year && year <= self.end
    }
}

impl Default for YearRange {
    fn default() -> Self {
        Self {
            start: 1990,
            end: 2020,
        }
    }
}

/// Configuration for a panel run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Declared register extracts, ingested in this order
    pub sources: Vec<SourceConfig>,
    /// Status register column names
    pub status_schema: StatusSchema,
    /// Event register column names and roles
    pub event_schema: EventSchema,
    /// Risk population age band
    pub age_band: AgeBand,
    /// Target years of the panel
    pub years: YearRange,
    /// Gap repair policy
    pub gap_fill: GapFillPolicy,
    /// Longest gap (in years) forward-fill may bridge
    pub max_fill_gap: u32,
    /// Maximum fraction of event rows with an unresolved identifier, per role
    pub unresolved_threshold: f64,
    /// Maximum fraction of events with a cross-role identifier conflict
    pub cross_role_threshold: f64,
    /// Whether person-years covered only by unknown-status spells are at risk
    pub include_unknown_status: bool,
    /// Worker threads for the parallel stages (defaults to the CPU count)
    pub workers: Option<usize>,
    /// Parquet read batch size
    pub batch_size: Option<usize>,
    /// Show stage progress bars
    pub show_progress: bool,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            status_schema: StatusSchema::default(),
            event_schema: EventSchema::default(),
            age_band: AgeBand::default(),
            years: YearRange::default(),
            gap_fill: GapFillPolicy::default(),
            max_fill_gap: 2,
            unresolved_threshold: 0.2,
            cross_role_threshold: 0.01,
            include_unknown_status: true,
            workers: None,
            batch_size: None,
            show_progress: false,
        }
    }
}

impl PanelConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read configuration {}: {}", path.display(), e)
        })?;
        Self::from_json_str(&text)
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.age_band.min_age > self.age_band.max_age {
            return Err(PanelError::config(format!(
                "age band is empty: min_age {} > max_age {}",
                self.age_band.min_age, self.age_band.max_age
            )));
        }
        if self.years.start > self.years.end {
            return Err(PanelError::config(format!(
                "year range is empty: {} > {}",
                self.years.start, self.years.end
            )));
        }
        for (name, value) in [
            ("unresolved_threshold", self.unresolved_threshold),
            ("cross_role_threshold", self.cross_role_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PanelError::config(format!(
                    "{name} must be a fraction in [0, 1], got {value}"
                )));
            }
        }
        if self.event_schema.roles.is_empty() {
            return Err(PanelError::config("at least one event role must be declared"));
        }

        let mut roles = HashSet::new();
        for role in &self.event_schema.roles {
            if role.role.trim().is_empty() {
                return Err(PanelError::config("role names must not be empty"));
            }
            if !roles.insert(role.role.as_str()) {
                return Err(PanelError::config(format!("duplicate role '{}'", role.role)));
            }
        }

        let mut names = HashSet::new();
        for source in &self.sources {
            if !names.insert(source.name.as_str()) {
                return Err(PanelError::config(format!(
                    "duplicate dataset name '{}'",
                    source.name
                )));
            }
        }
        if !self.sources.is_empty() {
            for kind in [DatasetKind::Status, DatasetKind::Event] {
                if !self.sources.iter().any(|s| s.kind == kind) {
                    return Err(PanelError::config(format!(
                        "no {kind:?} source declared"
                    )));
                }
            }
        }
        if self.workers == Some(0) {
            return Err(PanelError::config("workers must be at least 1"));
        }
        Ok(())
    }

    /// Declared roles in output order
    #[must_use]
    pub fn role_set(&self) -> RoleSet {
        RoleSet::new(self.event_schema.roles.iter().map(|r| r.role.clone()))
    }

    /// Number of worker threads for the parallel stages
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }
}

impl fmt::Display for PanelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Panel Configuration:")?;
        writeln!(
            f,
            "  Age Band: {}-{}",
            self.age_band.min_age, self.age_band.max_age
        )?;
        writeln!(f, "  Target Years: {}-{}", self.years.start, self.years.end)?;
        writeln!(f, "  Gap Fill: {} (max {} years)", self.gap_fill, self.max_fill_gap)?;
        writeln!(f, "  Unresolved Threshold: {}", self.unresolved_threshold)?;
        writeln!(f, "  Cross-Role Threshold: {}", self.cross_role_threshold)?;
        writeln!(f, "  Include Unknown Status: {}", self.include_unknown_status)?;
        writeln!(f, "  Roles: {}", self.role_set().names().join(", "))?;
        for source in &self.sources {
            writeln!(
                f,
                "  Source {} ({:?}): {}",
                source.name,
                source.kind,
                source.path.display()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PanelConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gap_fill, GapFillPolicy::ForwardFill);
        assert_eq!(config.role_set().names(), ["mother", "father"]);
    }

    #[test]
    fn parses_partial_json() {
        let config = PanelConfig::from_json_str(
            r#"{
                "age_band": { "min_age": 18, "max_age": 45 },
                "gap_fill": "mark-unknown",
                "sources": [
                    { "name": "bef", "kind": "status", "path": "data/bef" },
                    { "name": "mfr", "kind": "event", "path": "data/mfr.parquet" }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(config.age_band.min_age, 18);
        assert_eq!(config.gap_fill, GapFillPolicy::MarkUnknown);
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.max_fill_gap, 2);
    }

    #[test]
    fn rejects_inverted_band() {
        let config = PanelConfig {
            age_band: AgeBand {
                min_age: 50,
                max_age: 15,
            },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PanelError::Config(_))));
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let config = PanelConfig {
            unresolved_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_roles() {
        let mut config = PanelConfig::default();
        config.event_schema.roles = vec![
            RoleColumn::new("mother", "A"),
            RoleColumn::new("mother", "B"),
        ];
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_sources_without_event_register() {
        let config = PanelConfig {
            sources: vec![SourceConfig {
                name: "bef".to_string(),
                kind: DatasetKind::Status,
                path: PathBuf::from("bef"),
            }],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
