pub mod console;
pub mod describe;
pub mod display;
pub mod engine;
pub mod error;
pub mod sensing;
pub mod settings;
pub mod tasks;
mod utils;

use std::sync::Arc;

use anyhow::Context;
use log::{info, warn};

use describe::{OpenAiGenerator, TextGenerator};
use engine::Engine;
use sensing::AppleScriptObserver;
use settings::SettingsStore;

pub use error::{GenerationError, ObserverError, StoreError};

pub fn run() -> anyhow::Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    let default_level = if settings::debug_enabled() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();

    info!("tasktrail starting up...");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    let data_dir = settings::data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let settings_store = SettingsStore::in_dir(&data_dir)?;
    let settings = settings_store.get();

    let api_key = settings::api_key();
    if api_key.is_none() {
        warn!(
            "{} not set; unrecognized windows will get fallback descriptions",
            settings::API_KEY_ENV
        );
    }
    let generator: Arc<dyn TextGenerator> =
        Arc::new(OpenAiGenerator::new(settings.generator.clone(), api_key)?);

    let engine = Engine::open(settings, &data_dir, Arc::new(AppleScriptObserver), generator);
    engine.start().await?;

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = console::run_console(&engine, stdin) => {
            if let Err(err) = result {
                warn!("console stopped: {err:#}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received");
        }
    }

    engine.shutdown().await?;
    if let Err(err) = settings_store.remember_view(engine.view_mode()) {
        warn!("failed to save view mode: {err:#}");
    }
    info!("tasktrail stopped");
    Ok(())
}
