//! Resolved event-to-person associations

use super::types::{PersonId, RowRef, SpellId};

/// One event attached to one canonical person under one role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Event key
    pub event_id: String,
    /// Year of the event
    pub event_year: i32,
    /// Canonical person
    pub person: PersonId,
    /// Index into the configured role set
    pub role: usize,
    /// Spell covering `event_year`; `None` when the year is uncovered
    pub matched_spell: Option<SpellId>,
    /// First raw event row that produced this attachment
    pub source: RowRef,
}

impl Attachment {
    /// Whether the event landed inside a spell
    #[must_use]
    pub const fn is_covered(&self) -> bool {
        self.matched_spell.is_some()
    }
}
