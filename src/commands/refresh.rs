use anyhow::{Context, Result};
use std::path::PathBuf;

use waqt::coordinator::SourceRegistry;
use waqt::models::{NormalizedSnapshot, SnapshotValue};

use super::load_config;

/// Refresh sources once and print the resulting snapshots
pub async fn refresh(config_path: Option<PathBuf>, source: Option<String>, json: bool) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    tokio::fs::create_dir_all(&config.general.data_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.general.data_dir.display()))?;

    let registry = SourceRegistry::from_config(&config).context("Failed to build sources")?;

    let coordinators: Vec<_> = match &source {
        Some(name) => vec![registry
            .get(name)
            .with_context(|| format!("Unknown source: {name}"))?],
        None => registry.iter().collect(),
    };

    let mut failures = 0;
    for coordinator in coordinators {
        let result = coordinator.refresh().await;
        coordinator.shutdown();

        match result {
            Ok(snapshot) if json => println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?),
            Ok(snapshot) => print_snapshot(&snapshot),
            Err(e) => {
                failures += 1;
                eprintln!("{}: {e}", coordinator.name());
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} source(s) unavailable");
    }
    Ok(())
}

fn print_snapshot(snapshot: &NormalizedSnapshot) {
    println!(
        "{} ({}, {}, {})",
        snapshot.source,
        snapshot.date,
        snapshot.origin.as_str(),
        snapshot.fetched_at.format("%H:%M:%S")
    );

    for (key, value) in &snapshot.values {
        let rendered = match value {
            SnapshotValue::Instant(at) => at.to_rfc3339(),
            SnapshotValue::Text(text) => text.clone(),
            SnapshotValue::Number(n) => n.to_string(),
            SnapshotValue::Flag(flag) => flag.to_string(),
            SnapshotValue::List(items) => items.join(", "),
        };
        println!("  {key:<28} {rendered}");
    }
    println!();
}
