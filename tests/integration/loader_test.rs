use reg_panel::async_io::source_files_async;
use reg_panel::config::SourceConfig;
use reg_panel::{DatasetKind, PanelPipeline, load_record_store_async, read_parquet, write_parquet};

use crate::utils::{scratch_dir, synthetic, test_config};

#[tokio::test]
async fn loads_declared_parquet_sources() -> reg_panel::Result<()> {
    let dir = scratch_dir("loader");
    let registers = synthetic(13);
    std::fs::create_dir_all(dir.join("bef"))?;
    write_parquet(&dir.join("bef").join("part-0.parquet"), &[registers.status_batch()?])?;
    write_parquet(&dir.join("mfr.parquet"), &[registers.event_batch()?])?;

    let mut config = test_config();
    config.sources = vec![
        SourceConfig {
            name: "bef".to_string(),
            kind: DatasetKind::Status,
            path: dir.join("bef"),
        },
        SourceConfig {
            name: "mfr".to_string(),
            kind: DatasetKind::Event,
            path: dir.join("mfr.parquet"),
        },
    ];

    let loaded = load_record_store_async(&config).await?;
    assert_eq!(loaded.status_row_count(), registers.status.len());
    assert_eq!(loaded.event_row_count(), registers.events.len());

    let in_memory = registers.into_store(&config)?;
    let pipeline = PanelPipeline::new(config)?;
    let from_files = pipeline.run(&loaded)?;
    let from_memory = pipeline.run(&in_memory)?;
    assert_eq!(from_files.panel, from_memory.panel);

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}

#[tokio::test]
async fn directory_sources_list_parquet_files_in_path_order() -> reg_panel::Result<()> {
    let dir = scratch_dir("discovery");
    let batch = synthetic(5).status_batch()?;
    write_parquet(&dir.join("part-1.parquet"), &[batch.clone()])?;
    write_parquet(&dir.join("part-0.parquet"), &[batch])?;
    std::fs::write(dir.join("notes.txt"), "not parquet")?;

    let files = source_files_async(&dir).await?;
    assert_eq!(files, vec![dir.join("part-0.parquet"), dir.join("part-1.parquet")]);
    assert!(source_files_async(&dir.join("missing")).await.is_err());

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}

#[test]
fn written_panel_reads_back() -> reg_panel::Result<()> {
    let dir = scratch_dir("roundtrip");
    let registers = synthetic(17);
    let batch = registers.status_batch()?;
    let path = dir.join("status.parquet");
    write_parquet(&path, &[batch.clone()])?;

    let read = read_parquet(&path, None)?;
    let rows: usize = read.iter().map(|b| b.num_rows()).sum();
    assert_eq!(rows, batch.num_rows());
    assert!(write_parquet(&dir.join("empty.parquet"), &[]).is_err());

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}
