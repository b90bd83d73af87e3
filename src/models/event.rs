//! Point-in-time events and their role identifiers

use smallvec::SmallVec;

use super::types::RowRef;

/// Raw identifiers of an event, aligned with the configured [`RoleSet`]
pub type RoleIdentifiers = SmallVec<[Option<String>; 2]>;

/// Ordered set of role names declared for the event register
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet {
    names: Vec<String>,
}

impl RoleSet {
    /// Build a role set from names in declaration order
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Position of a role
    #[must_use]
    pub fn index_of(&self, role: &str) -> Option<usize> {
        self.names.iter().position(|name| name == role)
    }

    /// Name of the role at `index`
    #[must_use]
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// All role names in order
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of roles
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no roles are declared
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A typed event-register record as handed over by the parsing collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// Event key as reported
    pub event_id: String,
    /// Year of the event
    pub year: i32,
    /// Optional event type code
    pub event_type: Option<String>,
    /// `(role, raw identifier)` pairs; roles not listed are absent
    pub identifiers: Vec<(String, Option<String>)>,
}

impl EventRecord {
    /// Create a record without identifiers
    pub fn new(event_id: impl Into<String>, year: i32) -> Self {
        Self {
            event_id: event_id.into(),
            year,
            event_type: None,
            identifiers: Vec::new(),
        }
    }

    /// Add an identifier for `role`
    #[must_use]
    pub fn with_identifier(mut self, role: &str, id: Option<&str>) -> Self {
        self.identifiers
            .push((role.to_string(), id.map(ToString::to_string)));
        self
    }

    /// Set the event type
    #[must_use]
    pub fn with_type(mut self, event_type: &str) -> Self {
        self.event_type = Some(event_type.to_string());
        self
    }
}

/// An ingested, immutable event row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Where the row came from
    pub source: RowRef,
    /// Event key; duplicate raw rows share it
    pub id: String,
    /// Year of the event
    pub year: i32,
    /// Optional event type code
    pub event_type: Option<String>,
    /// Normalized raw identifiers per role
    pub identifiers: RoleIdentifiers,
}

impl Event {
    /// Raw identifier for the role at `role`, if present
    #[must_use]
    pub fn identifier(&self, role: usize) -> Option<&str> {
        self.identifiers.get(role).and_then(Option::as_deref)
    }
}
