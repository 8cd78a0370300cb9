use anyhow::{Context, Result};
use std::path::PathBuf;

use waqt::config::SourceKind;
use waqt::fetcher::{NeoHubClient, NeoHubCommand, SpeakerClient, SpeakerCommand};

use super::load_config;

/// Common parameters of the device commands
pub struct DeviceParams {
    pub config: Option<PathBuf>,
    pub source: String,
    /// Command as JSON, e.g. `{"command":"standby","device":"Lounge","on":true}`
    pub command: String,
}

/// Send one command to a configured neoHub
pub async fn neohub(params: DeviceParams) -> Result<()> {
    let config = load_config(params.config.as_deref())?;
    let source = config
        .source(&params.source)
        .with_context(|| format!("Unknown source: {}", params.source))?;

    let SourceKind::Neohub { host, port, .. } = &source.kind else {
        anyhow::bail!("Source '{}' is not a neohub", params.source);
    };

    let command: NeoHubCommand =
        serde_json::from_str(&params.command).context("Invalid neoHub command")?;

    let client = NeoHubClient::new(host.clone(), *port);
    let response = client.send_command(&command).await?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Send one command to a configured speaker
pub async fn speaker(params: DeviceParams) -> Result<()> {
    let config = load_config(params.config.as_deref())?;
    let source = config
        .source(&params.source)
        .with_context(|| format!("Unknown source: {}", params.source))?;

    let SourceKind::Speaker { address, .. } = &source.kind else {
        anyhow::bail!("Source '{}' is not a speaker", params.source);
    };

    let command: SpeakerCommand =
        serde_json::from_str(&params.command).context("Invalid speaker command")?;

    let client = SpeakerClient::new(address.clone())?;
    let response = client.send_command(&command).await?;

    match response.json() {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", String::from_utf8_lossy(response.as_bytes())),
    }
    Ok(())
}
