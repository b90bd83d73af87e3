//! Shared helpers: Arrow column access, Parquet IO and logging

pub mod arrow;
pub mod io;
pub mod logging;

pub use io::{DEFAULT_BATCH_SIZE, read_parquet, write_parquet};
pub use logging::{log_operation_complete, log_operation_start, log_stage_complete, log_warning};
