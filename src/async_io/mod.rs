//! Async Parquet loading of declared register sources

pub mod batch_ops;
pub mod file_ops;
pub mod loader;

pub use batch_ops::read_parquet_async;
pub use file_ops::{find_parquet_files_async, open_parquet_file_async, source_files_async};
pub use loader::{SourceLoader, load_record_store_async};
