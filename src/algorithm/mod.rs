//! Panel construction stages
//!
//! Each stage takes immutable inputs and returns a new structure:
//! identity reconciliation, spell repair, risk-set filtering, event
//! attachment, panel assembly and the reconciliation audit.

pub mod attach;
pub mod audit;
pub mod identity;
pub mod panel;
pub mod risk_set;
pub mod spells;

pub use attach::{AttachOutcome, EventAttacher, validate_attachments};
pub use audit::{AuditOutcome, ReconciliationAuditor};
pub use identity::{IdentityMap, IdentityReconciler, Reconciliation, RoleResolution};
pub use panel::{Panel, PanelAssembler, PanelRow, RoleCounts};
pub use risk_set::{RiskSet, RiskSetEntry, RiskSetFilter};
pub use spells::{
    PersonRepair, PersonSpells, RepairOutcome, RepairStats, SpellRepairer, SpellTable,
    validate_person, validate_spells,
};
