//! Parquet file operations
//!
//! Synchronous reading and writing of Parquet files as Arrow record batches.
//! The async loader in [`crate::async_io`] shares the batch size settings.

use std::fs::File;
use std::path::Path;

use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::error::{PanelError, Result};
use crate::utils::logging::{log_operation_complete, log_operation_start};

/// Default batch size for Parquet reading
pub const DEFAULT_BATCH_SIZE: usize = 16384;

/// Batch size from the `REG_PANEL_BATCH_SIZE` environment variable
#[must_use]
pub fn get_batch_size() -> Option<usize> {
    std::env::var("REG_PANEL_BATCH_SIZE")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
}

/// Read a Parquet file into Arrow record batches
pub fn read_parquet(path: &Path, batch_size: Option<usize>) -> Result<Vec<RecordBatch>> {
    let start = std::time::Instant::now();
    log_operation_start("Reading parquet file", path);

    let file = File::open(path)
        .map_err(|e| anyhow::anyhow!("Failed to open file {}: {}", path.display(), e))?;
    let batch_size = batch_size.or_else(get_batch_size).unwrap_or(DEFAULT_BATCH_SIZE);
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?
        .with_batch_size(batch_size)
        .build()?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;

    log_operation_complete("read", path, batches.len(), Some(start.elapsed()));
    Ok(batches)
}

/// Write record batches to a Parquet file
///
/// All batches must share the schema of the first one. Writing an empty
/// slice is an error, since there is no schema to write.
pub fn write_parquet(path: &Path, batches: &[RecordBatch]) -> Result<()> {
    let Some(first) = batches.first() else {
        return Err(PanelError::config(format!(
            "nothing to write to {}",
            path.display()
        )));
    };
    let start = std::time::Instant::now();
    log_operation_start("Writing parquet file", path);

    let file = File::create(path)
        .map_err(|e| anyhow::anyhow!("Failed to create file {}: {}", path.display(), e))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, first.schema(), Some(props))?;
    for batch in batches {
        writer.write(batch)?;
    }
    writer.close()?;

    let rows: usize = batches.iter().map(RecordBatch::num_rows).sum();
    log_operation_complete("wrote", path, rows, Some(start.elapsed()));
    Ok(())
}
