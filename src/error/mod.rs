//! Error handling for the panel engine.
//!
//! Only conditions that must halt a run are errors. Recoverable data
//! anomalies (orphan events, uncovered events, conflicting duplicates, ...)
//! are collected as [`Finding`](crate::report::Finding)s instead.

use std::{fmt, io};

use arrow_schema::ArrowError;
use parquet::errors::ParquetError;

use crate::models::{PersonId, SpellId};

/// Aggregate statistics attached to a data-quality breach
#[derive(Debug, Clone, PartialEq)]
pub struct QualityBreach {
    /// Which measure tripped (e.g. `"unresolved identifiers"`)
    pub measure: String,
    /// Role the measure was computed for, if role-specific
    pub role: Option<String>,
    /// Number of offending rows or events
    pub count: usize,
    /// Denominator the fraction was computed over
    pub total: usize,
    /// Configured maximum fraction
    pub threshold: f64,
}

impl QualityBreach {
    /// Observed fraction of offending rows
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.count as f64 / self.total as f64
        }
    }
}

impl fmt::Display for QualityBreach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.measure)?;
        if let Some(role) = &self.role {
            write!(f, " for role '{role}'")?;
        }
        write!(
            f,
            ": {}/{} ({:.2}%) exceeds threshold {:.2}%",
            self.count,
            self.total,
            self.fraction() * 100.0,
            self.threshold * 100.0
        )
    }
}

/// Errors that halt a panel run
#[derive(Debug, thiserror::Error)]
pub enum PanelError {
    /// IO error while reading sources or writing outputs
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A declared column is not present in an ingested batch
    #[error("Dataset '{dataset}': missing column '{column}'")]
    MissingColumn {
        /// Declared dataset name
        dataset: String,
        /// Column that was looked up
        column: String,
    },

    /// A declared column has a type that cannot be read as the expected field
    #[error("Dataset '{dataset}': column '{column}' cannot be read as {expected}")]
    ColumnType {
        /// Declared dataset name
        dataset: String,
        /// Column that was read
        column: String,
        /// Expected logical type
        expected: &'static str,
    },

    /// A dataset name that was never declared
    #[error("Unknown dataset: {0}")]
    UnknownDataset(String),

    /// Input quality is too poor to ship a panel
    #[error("Data quality exceeded: {0}")]
    DataQualityExceeded(QualityBreach),

    /// Two repaired spells of one person overlap
    #[error("Overlapping spells for person {person}: {first} and {second}")]
    OverlappingSpell {
        /// Canonical person
        person: PersonId,
        /// Earlier spell
        first: SpellId,
        /// Later spell overlapping the earlier one
        second: SpellId,
    },

    /// A structural invariant failed after a stage
    #[error("Invariant violated after {stage}: {detail}")]
    InvariantViolation {
        /// Stage that produced the violating structure
        stage: &'static str,
        /// Human-readable description
        detail: String,
    },

    /// Anything else, with context
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PanelError {
    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Shorthand for an invariant violation
    pub fn invariant(stage: &'static str, detail: impl Into<String>) -> Self {
        Self::InvariantViolation {
            stage,
            detail: detail.into(),
        }
    }

    /// Whether the error is a structural bug rather than bad input or IO
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::OverlappingSpell { .. } | Self::InvariantViolation { .. }
        )
    }
}

/// Result type for panel operations
pub type Result<T> = std::result::Result<T, PanelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breach_fraction_and_display() {
        let breach = QualityBreach {
            measure: "unresolved identifiers".to_string(),
            role: Some("mother".to_string()),
            count: 3,
            total: 10,
            threshold: 0.2,
        };
        assert!((breach.fraction() - 0.3).abs() < f64::EPSILON);
        let text = breach.to_string();
        assert!(text.contains("role 'mother'"));
        assert!(text.contains("3/10"));
    }

    #[test]
    fn empty_breach_has_zero_fraction() {
        let breach = QualityBreach {
            measure: "cross-role conflicts".to_string(),
            role: None,
            count: 0,
            total: 0,
            threshold: 0.0,
        };
        assert_eq!(breach.fraction(), 0.0);
    }

    #[test]
    fn structural_classification() {
        assert!(PanelError::invariant("panel", "row count").is_structural());
        assert!(!PanelError::config("bad band").is_structural());
    }
}
