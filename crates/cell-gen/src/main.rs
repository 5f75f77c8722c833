mod config;
mod telemetry;

use std::{
    io::{self, BufWriter, Write},
    sync::Arc,
    thread,
};

use anyhow::anyhow;
use cell::{CellFacade, MemoryRegistryStore};
use clap::Parser;
use config::{AppConfig, CliArgs};
use telemetry::init_telemetry;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = AppConfig::try_from(args)?;

    init_telemetry(config.log_json)?;
    log_startup_info(&config);

    let store = Arc::new(MemoryRegistryStore::new());
    let facade = CellFacade::new(store, config.cell.clone(), config.categories.clone())?;
    facade.start()?;

    let ids = generate(&facade, &config)?;

    let mut out = BufWriter::new(io::stdout().lock());
    for id in &ids {
        writeln!(out, "{id}")?;
    }
    out.flush()?;

    facade.close();

    #[cfg(feature = "tracing")]
    tracing::info!(count = ids.len(), "generation finished");
    Ok(())
}

/// Splits `count` IDs per category across `threads` workers sharing one
/// facade. Output is grouped by worker.
fn generate(
    facade: &CellFacade<MemoryRegistryStore>,
    config: &AppConfig,
) -> anyhow::Result<Vec<String>> {
    let jobs: Vec<_> = config
        .categories
        .iter()
        .flat_map(|category| std::iter::repeat_n(category, config.count))
        .collect();
    let chunk = jobs.len().div_ceil(config.threads).max(1);

    thread::scope(|s| {
        let handles: Vec<_> = jobs
            .chunks(chunk)
            .map(|slice| {
                s.spawn(move || {
                    slice
                        .iter()
                        .map(|category| facade.generate_id(*category))
                        .collect::<cell::Result<Vec<String>>>()
                })
            })
            .collect();

        let mut ids = Vec::with_capacity(jobs.len());
        for handle in handles {
            let batch = handle
                .join()
                .map_err(|_| anyhow!("generator thread panicked"))??;
            ids.extend(batch);
        }
        Ok(ids)
    })
}

fn log_startup_info(_config: &AppConfig) {
    if cfg!(debug_assertions) {
        #[cfg(feature = "tracing")]
        tracing::info!("Starting cell-gen with full config: {:#?}", _config);
    } else {
        #[cfg(feature = "tracing")]
        tracing::info!(
            categories = _config.categories.len(),
            count = _config.count,
            threads = _config.threads,
            pattern = %_config.cell.cell.pattern,
            "Starting cell-gen"
        );
    }
}
