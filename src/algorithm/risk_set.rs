//! Risk-set filter
//!
//! A person-year is at risk when the person's age lies in the configured
//! band, the year lies in the target range and a spell covers the year.

use log::info;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::{AgeBand, PanelConfig, YearRange};
use crate::models::{Person, PersonId, SpellId, Status};

use super::identity::IdentityMap;
use super::spells::{PersonSpells, SpellTable};

/// One person-year in the risk population
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct RiskSetEntry {
    /// Canonical person
    pub person: PersonId,
    /// Calendar year
    pub year: i32,
    /// `year - cohort`
    pub age: i32,
    /// Status of the covering spell
    pub status: Status,
    /// Covering spell
    pub spell: SpellId,
}

/// Person-years at risk, ordered by `(person, year)`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RiskSet {
    entries: Vec<RiskSetEntry>,
}

impl RiskSet {
    /// Build a risk set from entries in any order
    #[must_use]
    pub fn from_entries(mut entries: Vec<RiskSetEntry>) -> Self {
        entries.sort();
        entries.dedup_by(|a, b| a.person == b.person && a.year == b.year);
        Self { entries }
    }

    /// Entries in `(person, year)` order
    #[must_use]
    pub fn entries(&self) -> &[RiskSetEntry] {
        &self.entries
    }

    /// Entry for a person-year
    #[must_use]
    pub fn get(&self, person: PersonId, year: i32) -> Option<&RiskSetEntry> {
        self.entries
            .binary_search_by(|entry| (entry.person, entry.year).cmp(&(person, year)))
            .ok()
            .map(|index| &self.entries[index])
    }

    /// Whether a person-year is at risk
    #[must_use]
    pub fn contains(&self, person: PersonId, year: i32) -> bool {
        self.get(person, year).is_some()
    }

    /// Number of person-years
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the risk set is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Selects at-risk person-years
#[derive(Debug, Clone, Copy)]
pub struct RiskSetFilter {
    band: AgeBand,
    years: YearRange,
    include_unknown_status: bool,
}

impl RiskSetFilter {
    /// Create a filter from the run configuration
    #[must_use]
    pub const fn new(config: &PanelConfig) -> Self {
        Self {
            band: config.age_band,
            years: config.years,
            include_unknown_status: config.include_unknown_status,
        }
    }

    /// Create a filter with an explicit band and range
    #[must_use]
    pub const fn with_band(band: AgeBand, years: YearRange, include_unknown_status: bool) -> Self {
        Self {
            band,
            years,
            include_unknown_status,
        }
    }

    /// Whether `person` can ever be at risk (has a cohort)
    #[must_use]
    pub const fn is_eligible(&self, person: &Person) -> bool {
        person.birth_cohort.is_some()
    }

    /// Build the risk set over all canonical persons
    #[must_use]
    pub fn build(&self, identities: &IdentityMap, spells: &SpellTable) -> RiskSet {
        let entries: Vec<RiskSetEntry> = identities
            .persons()
            .par_iter()
            .filter(|person| self.is_eligible(person))
            .filter_map(|person| spells.of(person.id).map(|s| self.entries_for(person, s)))
            .flatten_iter()
            .collect();

        info!(
            "Risk set holds {} person-years (ages {}-{}, years {}-{})",
            entries.len(),
            self.band.min_age,
            self.band.max_age,
            self.years.start,
            self.years.end
        );
        RiskSet { entries }
    }

    /// At-risk years of one person, ascending
    #[must_use]
    pub fn entries_for(&self, person: &Person, spells: &PersonSpells) -> Vec<RiskSetEntry> {
        let Some(cohort) = person.birth_cohort else {
            return Vec::new();
        };
        // Intersection of the band's calendar years with the target range.
        let first = self.years.start.max(cohort.saturating_add(self.band.min_age));
        let last = self.years.end.min(cohort.saturating_add(self.band.max_age));

        let mut entries = Vec::new();
        for spell in &spells.spells {
            if !self.include_unknown_status && !spell.status.is_known() {
                continue;
            }
            let start = spell.start_year.max(first);
            let end = spell.end_year.min(last);
            entries.extend((start..=end).map(|year| RiskSetEntry {
                person: person.id,
                year,
                age: year.saturating_sub(cohort),
                status: spell.status.clone(),
                spell: spell.id,
            }));
        }
        entries
    }
}
