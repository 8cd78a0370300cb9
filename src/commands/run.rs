use anyhow::{Context, Result};
use std::path::PathBuf;

use waqt::coordinator::{SourceRegistry, WaqtServer};

use super::load_config;

/// Run every configured source and serve the control API until Ctrl+C
pub async fn run(config_path: Option<PathBuf>, bind: Option<String>) -> Result<()> {
    let mut config = load_config(config_path.as_deref())?;
    if let Some(bind) = bind {
        config.api.bind_address = bind;
    }

    println!("Starting waqt");
    println!("=============");
    println!("  Timezone: {}", config.general.timezone);
    println!("  Data dir: {}", config.general.data_dir.display());
    println!("  Sources:");
    for source in &config.sources {
        println!(
            "    {} ({}, {})",
            source.name,
            source.kind.as_str(),
            source.wake_policy().name()
        );
    }
    println!();

    tokio::fs::create_dir_all(&config.general.data_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.general.data_dir.display()))?;

    let registry = SourceRegistry::from_config(&config).context("Failed to build sources")?;
    let server =
        WaqtServer::new(config.api.clone(), registry).context("Failed to create server")?;

    let info = server.info();
    println!("API Endpoints:");
    println!("  GET  /api/health                  - Health check");
    println!("  GET  /api/sources                 - List sources");
    println!("  GET  /api/sources/{{name}}/snapshot - Latest snapshot");
    println!("  POST /api/sources/{{name}}/refresh  - Refresh now");
    println!("  POST /api/neohub/{{name}}/command   - Thermostat command");
    println!("  POST /api/speaker/{{name}}/command  - Speaker command");
    println!();
    println!("Listening on http://{}", info.bind_address);
    println!("Press Ctrl+C to stop.\n");

    server
        .start_with_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown signal received");
                }
                Err(e) => {
                    tracing::error!("Failed to wait for Ctrl+C: {}", e);
                }
            }
        })
        .await?;

    println!("waqt stopped.");
    Ok(())
}
