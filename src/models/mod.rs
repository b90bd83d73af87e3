//! Domain models for the register panel
//!
//! Raw rows live in the [`RecordStore`](crate::store::RecordStore); everything
//! here is either a raw row type or a derived entity that refers back to raw
//! rows by [`RowRef`].

pub mod attachment;
pub mod event;
pub mod person;
pub mod spell;
pub mod types;

pub use attachment::Attachment;
pub use event::{Event, EventRecord, RoleIdentifiers, RoleSet};
pub use person::Person;
pub use spell::{GapReason, Spell, SpellOrigin, UnobservedGap};
pub use types::{Gender, PersonId, RowRef, SpellId, Status, StatusRecord, StatusRow};
