//! Arrow data handling utilities
//!
//! Column-level readers used when ingesting register batches.

pub mod conversion;

pub use conversion::{get_column, parse_year, read_int, read_text, read_year};
