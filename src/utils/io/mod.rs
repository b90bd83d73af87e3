//! File IO helpers for Parquet sources and outputs

pub mod parquet;

pub use parquet::{DEFAULT_BATCH_SIZE, get_batch_size, read_parquet, write_parquet};
