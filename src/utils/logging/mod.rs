//! Logging and progress helpers
//!
//! Consistent log lines for file operations and pipeline stages, plus
//! `indicatif` progress bars for long runs.

pub mod log;
pub mod progress;

pub use log::{log_operation_complete, log_operation_start, log_stage_complete, log_warning};
pub use progress::{StageProgress, create_main_progress_bar, finish_progress_bar};
