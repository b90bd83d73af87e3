//! Spell repair
//!
//! Raw status rows are grouped per canonical person, deduplicated, sorted and
//! turned into an ordered list of non-overlapping spells. Gaps strictly inside
//! a person's observed span are handled by the configured
//! [`GapFillPolicy`]; years before the first or after the last observed year
//! are never filled. Every repair decision is recorded as a finding.

use log::{debug, info};
use rayon::prelude::*;

use crate::config::{GapFillPolicy, PanelConfig};
use crate::error::{PanelError, Result};
use crate::models::{GapReason, Person, PersonId, Spell, SpellId, SpellOrigin, Status, StatusRow, UnobservedGap};
use crate::report::{Finding, FindingKind};
use crate::store::RecordStore;

use super::identity::IdentityMap;

/// Repaired spells and open gaps of one person
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonSpells {
    /// Owner
    pub person: PersonId,
    /// Spells ordered by start year
    pub spells: Vec<Spell>,
    /// Gaps left open, ordered by start year
    pub gaps: Vec<UnobservedGap>,
}

impl PersonSpells {
    /// Spell covering `year`, if any
    #[must_use]
    pub fn covering(&self, year: i32) -> Option<&Spell> {
        let index = self.spells.partition_point(|spell| spell.end_year < year);
        self.spells.get(index).filter(|spell| spell.covers(year))
    }

    /// Open gap containing `year`, if any
    #[must_use]
    pub fn gap_at(&self, year: i32) -> Option<&UnobservedGap> {
        self.gaps.iter().find(|gap| gap.contains(year))
    }

    /// First and last covered year
    #[must_use]
    pub fn span(&self) -> Option<(i32, i32)> {
        Some((self.spells.first()?.start_year, self.spells.last()?.end_year))
    }
}

/// Spells of every canonical person, indexed by [`PersonId`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpellTable {
    by_person: Vec<PersonSpells>,
}

impl SpellTable {
    /// Spells of `person`
    #[must_use]
    pub fn of(&self, person: PersonId) -> Option<&PersonSpells> {
        self.by_person.get(person.0 as usize)
    }

    /// Spell of `person` covering `year`
    #[must_use]
    pub fn covering(&self, person: PersonId, year: i32) -> Option<&Spell> {
        self.of(person)?.covering(year)
    }

    /// Look up a spell by id
    #[must_use]
    pub fn spell(&self, id: SpellId) -> Option<&Spell> {
        self.of(id.person)?.spells.get(id.ordinal as usize)
    }

    /// Per-person spell lists ordered by person
    #[must_use]
    pub fn persons(&self) -> &[PersonSpells] {
        &self.by_person
    }

    /// All spells ordered by person then start year
    pub fn spells(&self) -> impl Iterator<Item = &Spell> {
        self.by_person.iter().flat_map(|p| p.spells.iter())
    }

    /// Total number of spells
    #[must_use]
    pub fn spell_count(&self) -> usize {
        self.by_person.iter().map(|p| p.spells.len()).sum()
    }
}

/// Counters of the repair stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairStats {
    /// Exact duplicate rows dropped
    pub duplicate_rows: usize,
    /// Same-year rows with a different status dropped
    pub conflicting_rows: usize,
    /// Forward-filled spells
    pub inserted_spells: usize,
    /// Years covered by forward-filled spells
    pub inserted_years: usize,
    /// Unknown-status spells synthesized over gaps
    pub unknown_spells: usize,
    /// Years covered by unknown-status gap spells
    pub unknown_years: usize,
    /// Gaps left open
    pub gaps: usize,
    /// Years inside open gaps
    pub gap_years: usize,
}

impl RepairStats {
    fn merge(&mut self, other: &Self) {
        self.duplicate_rows += other.duplicate_rows;
        self.conflicting_rows += other.conflicting_rows;
        self.inserted_spells += other.inserted_spells;
        self.inserted_years = self.inserted_years.saturating_add(other.inserted_years);
        self.unknown_spells += other.unknown_spells;
        self.unknown_years = self.unknown_years.saturating_add(other.unknown_years);
        self.gaps += other.gaps;
        self.gap_years = self.gap_years.saturating_add(other.gap_years);
    }
}

/// Output of the spell repairer
#[derive(Debug, Clone, Default)]
pub struct RepairOutcome {
    /// Repaired spells
    pub table: SpellTable,
    /// Stage counters
    pub stats: RepairStats,
    /// Repair decisions and conflicts
    pub findings: Vec<Finding>,
}

/// Repair of a single person
#[derive(Debug, Clone)]
pub struct PersonRepair {
    /// Repaired spells
    pub spells: PersonSpells,
    /// Counters
    pub stats: RepairStats,
    /// Findings
    pub findings: Vec<Finding>,
}

/// Applies the configured gap policy to every person uniformly
#[derive(Debug, Clone, Copy)]
pub struct SpellRepairer {
    policy: GapFillPolicy,
    max_fill_gap: u32,
}

impl SpellRepairer {
    /// Create a repairer from the run configuration
    #[must_use]
    pub const fn new(config: &PanelConfig) -> Self {
        Self {
            policy: config.gap_fill,
            max_fill_gap: config.max_fill_gap,
        }
    }

    /// Create a repairer with an explicit policy
    #[must_use]
    pub const fn with_policy(policy: GapFillPolicy, max_fill_gap: u32) -> Self {
        Self {
            policy,
            max_fill_gap,
        }
    }

    /// Repair the spells of every canonical person
    ///
    /// Persons are independent, so the work is spread over the current rayon
    /// pool; results are gathered in person order.
    pub fn repair(&self, store: &RecordStore, identities: &IdentityMap) -> Result<RepairOutcome> {
        let mut grouped: Vec<Vec<&StatusRow>> = vec![Vec::new(); identities.len()];
        for row in store.status_rows() {
            let person = identities.resolve(&row.raw_id).ok_or_else(|| {
                PanelError::invariant(
                    "identity reconciliation",
                    format!("status identifier '{}' missing from universe", row.raw_id),
                )
            })?;
            grouped[person.0 as usize].push(row);
        }

        let repairs: Vec<PersonRepair> = identities
            .persons()
            .par_iter()
            .map(|person| self.repair_person(person, &grouped[person.id.0 as usize]))
            .collect();

        let mut outcome = RepairOutcome::default();
        outcome.table.by_person.reserve(repairs.len());
        for repair in repairs {
            validate_person(&repair.spells)?;
            outcome.stats.merge(&repair.stats);
            outcome.findings.extend(repair.findings);
            outcome.table.by_person.push(repair.spells);
        }

        info!(
            "Repaired {} spells for {} persons ({} inserted, {} unknown, {} open gaps) using {}",
            outcome.table.spell_count(),
            identities.len(),
            outcome.stats.inserted_spells,
            outcome.stats.unknown_spells,
            outcome.stats.gaps,
            self.policy
        );
        Ok(outcome)
    }

    /// Repair the rows of one person
    ///
    /// `rows` may be unordered and contain duplicates.
    #[must_use]
    pub fn repair_person(&self, person: &Person, rows: &[&StatusRow]) -> PersonRepair {
        let mut stats = RepairStats::default();
        let mut findings = Vec::new();

        let mut sorted: Vec<&StatusRow> = rows.to_vec();
        sorted.sort_by_key(|row| (row.year, row.source));

        // One status per observed year; the first row in source order wins.
        let mut observed: Vec<(i32, &Status)> = Vec::with_capacity(sorted.len());
        for row in sorted {
            match observed.last() {
                Some(&(year, status)) if year == row.year => {
                    if *status == row.status {
                        stats.duplicate_rows += 1;
                    } else {
                        stats.conflicting_rows += 1;
                        findings.push(
                            Finding::new(
                                FindingKind::StatusConflict,
                                format!("kept status {status}, dropped {}", row.status),
                            )
                            .raw_person(&person.raw_id)
                            .person(person.id)
                            .year(year),
                        );
                    }
                }
                _ => observed.push((row.year, &row.status)),
            }
        }

        let mut segments: Vec<Segment> = Vec::with_capacity(observed.len());
        let mut gaps = Vec::new();
        for (index, &(year, status)) in observed.iter().enumerate() {
            if let Some(&(previous, previous_status)) = index.checked_sub(1).map(|i| &observed[i]) {
                // Years are distinct and sorted, so both bounds stay in range.
                if i64::from(year) - i64::from(previous) > 1 {
                    self.fill_gap(
                        person,
                        (previous + 1, year - 1),
                        previous_status,
                        &mut segments,
                        &mut gaps,
                        &mut stats,
                        &mut findings,
                    );
                }
            }
            segments.push(Segment {
                start: year,
                end: year,
                status: status.clone(),
                origin: SpellOrigin::Observed,
            });
        }

        PersonRepair {
            spells: PersonSpells {
                person: person.id,
                spells: merge_segments(person, segments),
                gaps,
            },
            stats,
            findings,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn fill_gap(
        &self,
        person: &Person,
        (start, end): (i32, i32),
        previous_status: &Status,
        segments: &mut Vec<Segment>,
        gaps: &mut Vec<UnobservedGap>,
        stats: &mut RepairStats,
        findings: &mut Vec<Finding>,
    ) {
        let length = year_count(start, end);
        let forward_fill = self.policy == GapFillPolicy::ForwardFill && length <= u64::from(self.max_fill_gap);
        let counted = usize::try_from(length).unwrap_or(usize::MAX);

        let finding = if forward_fill {
            stats.inserted_spells += 1;
            stats.inserted_years = stats.inserted_years.saturating_add(counted);
            segments.push(Segment {
                start,
                end,
                status: previous_status.clone(),
                origin: SpellOrigin::Inserted,
            });
            debug!("Person {}: forward-filled {start}-{end} with {previous_status}", person.id);
            Finding::new(
                FindingKind::InsertedSpell,
                format!("{start}-{end} carried forward status {previous_status}"),
            )
        } else if self.policy == GapFillPolicy::LeaveGap {
            stats.gaps += 1;
            stats.gap_years = stats.gap_years.saturating_add(counted);
            gaps.push(UnobservedGap {
                person: person.id,
                start_year: start,
                end_year: end,
                reason: GapReason::PolicyLeaveGap,
            });
            debug!("Person {}: left {start}-{end} unobserved", person.id);
            Finding::new(FindingKind::UnobservedGap, format!("{start}-{end} left unobserved"))
        } else {
            stats.unknown_spells += 1;
            stats.unknown_years = stats.unknown_years.saturating_add(counted);
            segments.push(Segment {
                start,
                end,
                status: Status::Unknown,
                origin: SpellOrigin::Imputed,
            });
            let reason = if self.policy == GapFillPolicy::ForwardFill {
                format!("gap of {length} years exceeds fillable maximum {}", self.max_fill_gap)
            } else {
                "gap marked unknown".to_string()
            };
            debug!("Person {}: marked {start}-{end} unknown ({reason})", person.id);
            Finding::new(FindingKind::UnknownSpell, format!("{start}-{end}: {reason}"))
        };

        findings.push(finding.raw_person(&person.raw_id).person(person.id).year(start));
    }
}

/// Year run with one status and origin, before merging
#[derive(Debug)]
struct Segment {
    start: i32,
    end: i32,
    status: Status,
    origin: SpellOrigin,
}

/// Number of years in `start..=end`
fn year_count(start: i32, end: i32) -> u64 {
    u64::try_from(i64::from(end) - i64::from(start) + 1).unwrap_or(0)
}

/// Collapse adjacent segments with equal status and origin into spells
fn merge_segments(person: &Person, segments: Vec<Segment>) -> Vec<Spell> {
    let mut spells: Vec<Spell> = Vec::new();
    for segment in segments {
        if let Some(last) = spells.last_mut() {
            if i64::from(last.end_year) + 1 == i64::from(segment.start)
                && last.status == segment.status
                && last.origin == segment.origin
            {
                last.end_year = segment.end;
                continue;
            }
        }
        let ordinal = u32::try_from(spells.len()).unwrap_or(u32::MAX);
        spells.push(Spell {
            id: SpellId {
                person: person.id,
                ordinal,
            },
            start_year: segment.start,
            end_year: segment.end,
            status: segment.status,
            age_at_start: person.age_in(segment.start),
            origin: segment.origin,
        });
    }
    spells
}

/// Check ordering, non-overlap and contiguity of one person's spells
///
/// Consecutive spells must be contiguous unless an open gap covers exactly
/// the years between them.
pub fn validate_person(spells: &PersonSpells) -> Result<()> {
    for spell in &spells.spells {
        if spell.end_year < spell.start_year || spell.id.person != spells.person {
            return Err(PanelError::invariant(
                "spell repair",
                format!("malformed spell {} ({}-{})", spell.id, spell.start_year, spell.end_year),
            ));
        }
    }
    for pair in spells.spells.windows(2) {
        let (first, second) = (&pair[0], &pair[1]);
        if second.start_year <= first.end_year {
            return Err(PanelError::OverlappingSpell {
                person: spells.person,
                first: first.id,
                second: second.id,
            });
        }
        // Ordered and non-overlapping past this point, so the bounds cannot overflow.
        if second.start_year != first.end_year + 1 {
            let bridged = spells.gaps.iter().any(|gap| {
                gap.start_year == first.end_year + 1 && gap.end_year == second.start_year - 1
            });
            if !bridged {
                return Err(PanelError::invariant(
                    "spell repair",
                    format!(
                        "person {} has an unannotated gap between {} and {}",
                        spells.person, first.end_year, second.start_year
                    ),
                ));
            }
        }
    }
    Ok(())
}

/// Check every person's spells
pub fn validate_spells(table: &SpellTable) -> Result<()> {
    table.persons().iter().try_for_each(validate_person)
}
