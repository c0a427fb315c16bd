//! Main application entry point

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sv_core::{DisplayRegistry, DisplaySettings, DisplayWorker};

mod demo;

fn main() -> Result<()> {
    // Initialize tracing, honouring RUST_LOG
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = match std::env::args().nth(1) {
        Some(path) => DisplaySettings::from_json_file(&path)
            .with_context(|| format!("Failed to load settings from {}", path))?,
        None => DisplaySettings::default(),
    };
    info!("Starting stackview with {:?}", settings);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(settings.worker_threads.max(1))
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")?;

    let registry = DisplayRegistry::new(
        sv_views::default_view_registry(),
        settings,
        DisplayWorker::new(runtime.handle().clone()),
    );

    runtime.block_on(demo::run(registry.clone()))?;

    registry.clear();
    info!("Shut down");
    Ok(())
}
