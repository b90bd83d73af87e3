use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{error, info};
use reg_panel::report::findings_to_record_batch;
use reg_panel::{PanelConfig, PanelPipeline, Result, load_record_store_async, write_parquet};

#[global_allocator]
static ALLOC: snmalloc_rs::SnMalloc = snmalloc_rs::SnMalloc;

const USAGE: &str = "usage: reg-panel <config.json> <output-dir>";

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [config_path, output_dir] = args.as_slice() else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    if let Err(e) = run(Path::new(config_path), &PathBuf::from(output_dir)).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(config_path: &Path, output_dir: &Path) -> Result<()> {
    let start = Instant::now();
    let config = PanelConfig::from_json_file(config_path)?;
    info!("{config}");

    let store = load_record_store_async(&config).await?;
    let pipeline = PanelPipeline::new(config)?;
    // The stages are CPU bound and run on their own rayon pool.
    let run = tokio::task::block_in_place(|| pipeline.run(&store))?;

    std::fs::create_dir_all(output_dir)?;
    write_parquet(&output_dir.join("panel.parquet"), &[run.panel.to_record_batch()?])?;
    write_parquet(
        &output_dir.join("findings.parquet"),
        &[findings_to_record_batch(&run.report.findings)?],
    )?;
    std::fs::write(output_dir.join("report.json"), run.report.to_json()?)?;

    println!("{}", run.report.summary());
    info!("Finished in {:?}", start.elapsed());
    Ok(())
}
