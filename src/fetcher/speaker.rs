//! Remote speaker bridge client
//!
//! The speaker exposes plain GET endpoints under its base address; status is
//! polled from `/getUpdate` and commands are query-string driven.

use serde::{Deserialize, Serialize};

use super::{HttpFetcher, RawPayload};
use crate::error::Error;
use crate::utils::join_url;

/// Default priority for queued audio
pub const DEFAULT_MEDIA_PRIORITY: u32 = 5;

/// Default number of repeats for announcements
pub const DEFAULT_REPEAT_NUM: u32 = 2;

/// Status endpoint path
pub const STATUS_PATH: &str = "getUpdate";

/// Commands accepted by the speaker bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum SpeakerCommand {
    /// Play an audio file or URL
    PlayAudio {
        media_id: String,
        #[serde(default = "default_volume")]
        volume: f64,
        #[serde(default = "default_true")]
        announcement_music: bool,
        #[serde(default = "default_repeat")]
        repeat_num: u32,
        #[serde(default = "default_priority")]
        priority: u32,
    },

    /// Set the volume (0.0 - 1.0)
    SetVolume { volume: f64 },

    /// Seek within the current media
    SetPosition { position: f64 },

    /// Resume playback
    Play,

    /// Pause playback
    Pause,

    /// Stop playback
    Stop,

    /// Switch the active source
    SelectSource { source: String },
}

fn default_volume() -> f64 {
    0.5
}

fn default_true() -> bool {
    true
}

fn default_repeat() -> u32 {
    DEFAULT_REPEAT_NUM
}

fn default_priority() -> u32 {
    DEFAULT_MEDIA_PRIORITY
}

impl SpeakerCommand {
    /// Validate command arguments
    pub fn validate(&self) -> Result<(), Error> {
        match self {
            Self::PlayAudio { volume, .. } | Self::SetVolume { volume }
                if !(0.0..=1.0).contains(volume) =>
            {
                Err(Error::invalid_command(format!("volume {volume} outside 0.0-1.0")))
            }
            Self::PlayAudio { media_id, .. } if media_id.trim().is_empty() => {
                Err(Error::invalid_command("media_id cannot be empty"))
            }
            Self::SetPosition { position } if *position < 0.0 => {
                Err(Error::invalid_command("position cannot be negative"))
            }
            _ => Ok(()),
        }
    }

    /// Endpoint path and query parameters for this command
    pub fn to_request(&self) -> (&'static str, Vec<(String, String)>) {
        match self {
            Self::PlayAudio {
                media_id,
                volume,
                announcement_music,
                repeat_num,
                priority,
            } => (
                "playAudioFile",
                vec![
                    ("audioFile".to_string(), media_id.clone()),
                    ("volume".to_string(), volume.to_string()),
                    ("announcement_music".to_string(), announcement_music.to_string()),
                    ("repeatNum".to_string(), repeat_num.to_string()),
                    ("priority".to_string(), priority.to_string()),
                ],
            ),
            Self::SetVolume { volume } => ("setVolume", vec![("volume".to_string(), volume.to_string())]),
            Self::SetPosition { position } => {
                ("setPos", vec![("position".to_string(), position.to_string())])
            }
            Self::Play => ("media_play", Vec::new()),
            Self::Pause => ("media_pause", Vec::new()),
            Self::Stop => ("media_stop", Vec::new()),
            Self::SelectSource { source } => {
                ("select_source", vec![("source".to_string(), source.clone())])
            }
        }
    }
}

/// Command client for one speaker bridge
#[derive(Debug, Clone)]
pub struct SpeakerClient {
    address: String,
    http: HttpFetcher,
}

impl SpeakerClient {
    /// Create a client for a base address such as `http://10.0.0.12:5000`
    pub fn new(address: impl Into<String>) -> Result<Self, Error> {
        let address = address.into();
        let http = HttpFetcher::new(join_url(&address, STATUS_PATH))?;
        Ok(Self { address, http })
    }

    /// Base address
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Status fetcher for the coordinator
    pub fn status_fetcher(&self) -> HttpFetcher {
        self.http.clone()
    }

    /// Send a command and return the raw response body
    pub async fn send_command(&self, command: &SpeakerCommand) -> Result<RawPayload, Error> {
        command.validate()?;
        let (path, params) = command.to_request();
        let url = join_url(&self.address, path);

        tracing::info!(url = %url, params = ?params, "Sending speaker command");
        Ok(self.http.get_with_params(&url, &params).await?)
    }
}
