//! Shared fixtures for the integration tests

use std::path::PathBuf;

use reg_panel::models::{EventRecord, Gender, StatusRecord};
use reg_panel::synthetic::{SyntheticConfig, SyntheticRegisters};
use reg_panel::{DatasetKind, PanelConfig, PanelPipeline, PanelRun, RecordStore};

/// Configuration with `mother`/`father` roles and quiet progress
#[must_use]
pub fn test_config() -> PanelConfig {
    PanelConfig {
        workers: Some(2),
        ..Default::default()
    }
}

/// Store with a `bef` status dataset and an `mfr` event dataset
pub fn store_with(config: &PanelConfig, status: Vec<StatusRecord>, events: Vec<EventRecord>) -> RecordStore {
    let mut store = RecordStore::new(config.role_set());
    store.declare("bef", DatasetKind::Status).unwrap();
    store.declare("mfr", DatasetKind::Event).unwrap();
    store.push_status("bef", status).unwrap();
    store.push_events("mfr", events).unwrap();
    store
}

/// Yearly status rows for `id` over `years` with one status code
pub fn yearly(id: &str, cohort: i32, gender: Gender, years: impl IntoIterator<Item = i32>, status: &str) -> Vec<StatusRecord> {
    years
        .into_iter()
        .map(|year| StatusRecord::new(id, year, status).with_cohort(cohort).with_gender(gender))
        .collect()
}

/// Birth event with optional parent identifiers
#[must_use]
pub fn birth(id: &str, year: i32, mother: Option<&str>, father: Option<&str>) -> EventRecord {
    EventRecord::new(id, year)
        .with_type("birth")
        .with_identifier("mother", mother)
        .with_identifier("father", father)
}

/// Synthetic registers for `seed`
#[must_use]
pub fn synthetic(seed: u64) -> SyntheticRegisters {
    SyntheticRegisters::generate(&SyntheticConfig {
        seed,
        ..Default::default()
    })
}

/// Run the pipeline over a synthetic store
pub fn run_synthetic(seed: u64, config: &PanelConfig) -> PanelRun {
    let store = synthetic(seed).into_store(config).unwrap();
    PanelPipeline::new(config.clone()).unwrap().run(&store).unwrap()
}

/// Fresh scratch directory under the system temp dir
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("reg-panel-{}-{}", name, std::process::id()));
    if dir.exists() {
        std::fs::remove_dir_all(&dir).unwrap();
    }
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
