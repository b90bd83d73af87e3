//! Async Parquet batch reading

use std::path::Path;

use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use parquet::arrow::async_reader::ParquetRecordBatchStreamBuilder;

use super::file_ops::open_parquet_file_async;
use crate::error::Result;
use crate::utils::io::{DEFAULT_BATCH_SIZE, get_batch_size};
use crate::utils::{log_operation_complete, log_operation_start};

/// Read a Parquet file asynchronously into Arrow record batches
///
/// The batch size falls back to `REG_PANEL_BATCH_SIZE`, then to
/// [`DEFAULT_BATCH_SIZE`].
pub async fn read_parquet_async(path: &Path, batch_size: Option<usize>) -> Result<Vec<RecordBatch>> {
    let start = std::time::Instant::now();
    log_operation_start("Reading parquet file asynchronously", path);

    let file = open_parquet_file_async(path).await?;
    let batch_size = batch_size
        .or_else(get_batch_size)
        .unwrap_or(DEFAULT_BATCH_SIZE);

    let stream = ParquetRecordBatchStreamBuilder::new(file)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create parquet reader for {}: {}", path.display(), e))?
        .with_batch_size(batch_size)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build parquet stream {}", e))?;

    let batches = stream
        .try_collect::<Vec<_>>()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read record batches from {}: {}", path.display(), e))?;

    log_operation_complete("read", path, batches.len(), Some(start.elapsed()));
    Ok(batches)
}
