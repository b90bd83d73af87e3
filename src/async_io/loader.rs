//! Loading declared sources into a record store
//!
//! Sources are read concurrently but ingested strictly in declared order, so
//! "first row wins" rules downstream see the same order on every run.

use arrow::record_batch::RecordBatch;
use futures::future::try_join_all;
use log::info;

use super::batch_ops::read_parquet_async;
use super::file_ops::source_files_async;
use crate::config::{PanelConfig, SourceConfig};
use crate::error::Result;
use crate::store::RecordStore;

/// Reads declared Parquet sources
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceLoader {
    batch_size: Option<usize>,
}

impl SourceLoader {
    /// Create a loader with the default batch size
    #[must_use]
    pub const fn new() -> Self {
        Self { batch_size: None }
    }

    /// Set the batch size for reading
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: Option<usize>) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Read every file of one source, in path order
    pub async fn load_source(&self, source: &SourceConfig) -> Result<Vec<RecordBatch>> {
        let files = source_files_async(&source.path).await?;
        let per_file = try_join_all(files.iter().map(|path| read_parquet_async(path, self.batch_size))).await?;
        Ok(per_file.into_iter().flatten().collect())
    }

    /// Read all sources of `config` and ingest them into a new store
    pub async fn load_store(&self, config: &PanelConfig) -> Result<RecordStore> {
        let mut store = RecordStore::from_config(config)?;
        let loaded = try_join_all(config.sources.iter().map(|source| self.load_source(source))).await?;

        for (source, batches) in config.sources.iter().zip(loaded) {
            let mut accepted = 0;
            for batch in &batches {
                accepted += store.ingest_batch(&source.name, batch, config)?;
            }
            info!(
                "Ingested {} rows into '{}' from {} batches",
                accepted,
                source.name,
                batches.len()
            );
        }
        Ok(store)
    }
}

/// Read all sources of `config` into a record store
pub async fn load_record_store_async(config: &PanelConfig) -> Result<RecordStore> {
    SourceLoader::new()
        .with_batch_size(config.batch_size)
        .load_store(config)
        .await
}
