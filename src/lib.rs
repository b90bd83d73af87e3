//! Register linkage and panel construction
//!
//! Turns longitudinal status registers and point-in-time event registers into
//! a person-year analysis panel: identity reconciliation, spell repair,
//! risk-set filtering, event attachment, panel assembly and a reconciliation
//! audit, each with structural checks and a findings report.

pub mod algorithm;
pub mod async_io;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod store;
pub mod synthetic;
pub mod utils;

// Core types
pub use config::{AgeBand, DatasetKind, GapFillPolicy, PanelConfig, SourceConfig, YearRange};
pub use error::{PanelError, QualityBreach, Result};
pub use pipeline::{PanelPipeline, PanelRun};
pub use store::RecordStore;

// Stage outputs
pub use algorithm::{Panel, PanelRow, RiskSet, RiskSetEntry, SpellTable};
pub use report::{Finding, FindingKind, RunReport};

// IO
pub use async_io::load_record_store_async;
pub use utils::io::{read_parquet, write_parquet};

// Arrow types
pub use arrow::record_batch::RecordBatch;
