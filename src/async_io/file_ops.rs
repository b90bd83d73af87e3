//! Async file discovery for Parquet sources

use std::path::{Path, PathBuf};

use itertools::Itertools;
use tokio::fs::{self, File};

use crate::error::Result;
use crate::utils::{log_operation_complete, log_warning};

/// Find all Parquet files directly inside `dir`, sorted by path
pub async fn find_parquet_files_async(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read directory {}: {}", dir.display(), e))?;

    let mut parquet_files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read directory entry: {e}"))?
    {
        let path = entry.path();
        let metadata = fs::metadata(&path).await.map_err(|e| {
            anyhow::anyhow!("Failed to read metadata for {}: {}", path.display(), e)
        })?;
        if metadata.is_file() && path.extension().is_some_and(|ext| ext == "parquet") {
            parquet_files.push(path);
        }
    }
    // Directory order is platform dependent.
    let parquet_files = parquet_files.into_iter().sorted().collect_vec();

    if parquet_files.is_empty() {
        log_warning("No Parquet files found in directory", Some(dir));
    } else {
        log_operation_complete("found", dir, parquet_files.len(), None);
    }
    Ok(parquet_files)
}

/// Files making up a declared source path
pub async fn source_files_async(path: &Path) -> Result<Vec<PathBuf>> {
    let metadata = fs::metadata(path)
        .await
        .map_err(|e| anyhow::anyhow!("Source path {} is not readable: {}", path.display(), e))?;
    if metadata.is_dir() {
        find_parquet_files_async(path).await
    } else {
        Ok(vec![path.to_path_buf()])
    }
}

/// Open a Parquet file for async reading
pub async fn open_parquet_file_async(path: &Path) -> Result<File> {
    File::open(path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open file {}: {}", path.display(), e).into())
}
