//! Common domain type definitions
//!
//! Keys, codes and raw status rows shared by every stage of the pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Gender of an individual as coded in the status register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    /// Male gender
    Male,
    /// Female gender
    Female,
    /// Unknown or not specified
    #[default]
    Unknown,
}

impl From<&str> for Gender {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "m" | "male" | "1" => Self::Male,
            "f" | "k" | "female" | "2" => Self::Female,
            _ => Self::Unknown,
        }
    }
}

impl From<i32> for Gender {
    fn from(value: i32) -> Self {
        match value {
            1 => Self::Male,
            2 => Self::Female,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Canonical person key assigned by the identity reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(pub u32);

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a spell as the `ordinal`-th spell of `person`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpellId {
    /// Owner of the spell
    pub person: PersonId,
    /// Position of the spell in the person's ordered spell list
    pub ordinal: u32,
}

impl fmt::Display for SpellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.person, self.ordinal)
    }
}

/// Reference back to a raw row in the record store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowRef {
    /// Index of the dataset in declaration order
    pub dataset: usize,
    /// Row index within the dataset
    pub row: usize,
}

/// Status value of a person-year
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Status {
    /// A status code as reported by the register
    Known(String),
    /// Missing in the register, or imputed as unknown by gap repair
    #[default]
    Unknown,
}

impl Status {
    /// Build a status from a raw, possibly missing, register value
    #[must_use]
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(code) if !code.is_empty() => Self::Known(code.to_string()),
            _ => Self::Unknown,
        }
    }

    /// Whether a status code is present
    #[must_use]
    pub const fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// The status code, if known
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Known(code) => Some(code),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(code) => f.write_str(code),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// A typed status-register record as handed over by the parsing collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    /// Raw person identifier
    pub id: String,
    /// Reporting year
    pub year: i32,
    /// Birth year, if reported
    pub cohort: Option<i32>,
    /// Raw status code, if reported
    pub status: Option<String>,
    /// Gender code
    pub gender: Gender,
}

impl StatusRecord {
    /// Create a record with a known status and no cohort or gender
    pub fn new(id: impl Into<String>, year: i32, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            year,
            cohort: None,
            status: Some(status.into()),
            gender: Gender::Unknown,
        }
    }

    /// Set the birth cohort
    #[must_use]
    pub const fn with_cohort(mut self, cohort: i32) -> Self {
        self.cohort = Some(cohort);
        self
    }

    /// Set the gender
    #[must_use]
    pub const fn with_gender(mut self, gender: Gender) -> Self {
        self.gender = gender;
        self
    }
}

/// A normalized status-register row owned by the record store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRow {
    /// Where the row came from
    pub source: RowRef,
    /// Raw person identifier, whitespace-trimmed
    pub raw_id: String,
    /// Reporting year
    pub year: i32,
    /// Birth year, if reported
    pub cohort: Option<i32>,
    /// Status value
    pub status: Status,
    /// Gender
    pub gender: Gender,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gender_codes() {
        assert_eq!(Gender::from("1"), Gender::Male);
        assert_eq!(Gender::from(" K "), Gender::Female);
        assert_eq!(Gender::from("x"), Gender::Unknown);
        assert_eq!(Gender::from(2), Gender::Female);
    }

    #[test]
    fn status_from_raw_trims_and_treats_blank_as_unknown() {
        assert_eq!(Status::from_raw(Some(" 3 ")), Status::Known("3".to_string()));
        assert_eq!(Status::from_raw(Some("  ")), Status::Unknown);
        assert_eq!(Status::from_raw(None), Status::Unknown);
        assert!(!Status::Unknown.is_known());
    }

    #[test]
    fn ids_display() {
        let spell = SpellId {
            person: PersonId(7),
            ordinal: 2,
        };
        assert_eq!(spell.to_string(), "7:2");
    }
}
