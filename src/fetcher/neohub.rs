//! Heatmiser neoHub TCP client
//!
//! The hub speaks JSON over a plain TCP socket:
//! - request: a JSON document terminated by `"\0\r"`
//! - response: read until a newline is seen or the socket closes, then
//!   trailing NUL bytes are stripped before decoding
//!
//! Every connect and read is bounded by a fixed timeout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::{Fetcher, RawPayload};
use crate::error::Error;
use crate::utils::error::FetchError;

/// Default neoHub port
pub const DEFAULT_NEOHUB_PORT: u16 = 4242;

/// Default socket timeout for hub requests
pub const DEFAULT_NEOHUB_TIMEOUT: Duration = Duration::from_secs(5);

/// Lowest frost temperature accepted by a NeoStat
pub const MIN_FROST_TEMPERATURE: f64 = 5.0;

/// Highest frost temperature accepted by a NeoStat
pub const MAX_FROST_TEMPERATURE: f64 = 17.0;

/// Hold temperature used when cancelling a hold without a known hold value
pub const DEFAULT_CANCEL_HOLD_TEMPERATURE: f64 = 20.0;

/// Identifier recorded by the hub for holds placed from here
const HOLD_ID: &str = "waqt";

const READ_CHUNK: usize = 4096;

/// Low level neoHub JSON client
#[derive(Debug, Clone)]
pub struct NeoHubClient {
    host: String,
    port: u16,
    timeout: Duration,
}

impl NeoHubClient {
    /// Create a client with the default timeout
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self::with_timeout(host, port, DEFAULT_NEOHUB_TIMEOUT)
    }

    /// Create a client with a custom timeout
    pub fn with_timeout(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    /// Hub host name or address
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Hub port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Send one request and decode the JSON response
    ///
    /// # Errors
    ///
    /// - `FetchError::Unreachable` if the hub cannot be reached or does not answer
    /// - `FetchError::BadPayload` if the answer is not valid JSON
    pub async fn json_request(&self, request: &Value) -> Result<Value, FetchError> {
        let addr = format!("{}:{}", self.host, self.port);

        let mut stream = timeout(self.timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| FetchError::Unreachable(format!("connect to {addr} timed out")))?
            .map_err(|e| FetchError::Unreachable(format!("connect to {addr}: {e}")))?;

        let mut frame = request.to_string().into_bytes();
        frame.extend_from_slice(b"\0\r");

        timeout(self.timeout, stream.write_all(&frame))
            .await
            .map_err(|_| FetchError::Unreachable(format!("write to {addr} timed out")))?
            .map_err(|e| FetchError::Unreachable(format!("write to {addr}: {e}")))?;

        let mut buf = Vec::with_capacity(READ_CHUNK);
        let mut chunk = [0u8; READ_CHUNK];

        // The first read must produce something, otherwise the hub is not answering
        let n = timeout(self.timeout, stream.read(&mut chunk))
            .await
            .map_err(|_| FetchError::Unreachable(format!("no response from {addr}")))?
            .map_err(|e| FetchError::Unreachable(format!("read from {addr}: {e}")))?;
        buf.extend_from_slice(&chunk[..n]);

        while n > 0 && !buf.contains(&b'\n') {
            match timeout(self.timeout, stream.read(&mut chunk)).await {
                Ok(Ok(0)) | Err(_) => break,
                Ok(Ok(more)) => buf.extend_from_slice(&chunk[..more]),
                Ok(Err(e)) => {
                    tracing::debug!(hub = %addr, error = %e, "Read ended with error");
                    break;
                }
            }
        }

        decode_response(&buf)
    }

    /// Send a device command
    pub async fn send_command(&self, command: &NeoHubCommand) -> Result<Value, Error> {
        command.validate()?;
        let request = command.to_request();
        tracing::info!(hub = %self.host, request = %request, "Sending neoHub command");
        Ok(self.json_request(&request).await?)
    }
}

/// Decode a raw hub response frame
///
/// Keeps the text before the first newline and strips trailing NULs and
/// carriage returns. Raw control characters the hub sometimes emits inside
/// strings are escaped so the decoded value keeps them.
pub fn decode_response(buf: &[u8]) -> Result<Value, FetchError> {
    let text = String::from_utf8_lossy(buf);
    let line = text.split('\n').next().unwrap_or_default();
    let line = line.trim_end_matches(['\0', '\r']);

    serde_json::from_str(&escape_control_chars(line))
        .map_err(|e| FetchError::BadPayload(e.to_string()))
}

/// Escape control characters inside JSON strings; drop them elsewhere
fn escape_control_chars(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in line.chars() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(c);
                continue;
            }
            match c {
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
                c => out.push(c),
            }
        } else if c == '"' {
            in_string = true;
            out.push(c);
        } else if c.is_ascii_whitespace() || !c.is_control() {
            out.push(c);
        }
    }

    out
}

/// Commands accepted by a NeoStat through the hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum NeoHubCommand {
    /// Set the target temperature
    SetTemperature { device: String, temperature: f64 },

    /// Hold a temperature for a duration
    Hold {
        device: String,
        temperature: f64,
        hours: u32,
        minutes: u32,
    },

    /// Cancel a running hold
    CancelHold {
        device: String,
        #[serde(default)]
        temperature: Option<f64>,
    },

    /// Standby on/off (frost protection mode on the hub)
    Standby { device: String, on: bool },

    /// Set the frost protection temperature
    SetFrostTemperature { device: String, temperature: f64 },
}

impl NeoHubCommand {
    /// Device the command targets
    pub fn device(&self) -> &str {
        match self {
            Self::SetTemperature { device, .. }
            | Self::Hold { device, .. }
            | Self::CancelHold { device, .. }
            | Self::Standby { device, .. }
            | Self::SetFrostTemperature { device, .. } => device,
        }
    }

    /// Validate command arguments before they reach the hub
    pub fn validate(&self) -> Result<(), Error> {
        if self.device().trim().is_empty() {
            return Err(Error::invalid_command("device name cannot be empty"));
        }

        match self {
            Self::SetFrostTemperature { temperature, .. }
                if !(MIN_FROST_TEMPERATURE..=MAX_FROST_TEMPERATURE).contains(temperature) =>
            {
                Err(Error::invalid_command(format!(
                    "frost temperature {temperature} outside {MIN_FROST_TEMPERATURE}-{MAX_FROST_TEMPERATURE}"
                )))
            }
            Self::Hold { minutes, .. } if *minutes >= 60 => Err(Error::invalid_command(format!(
                "hold minutes {minutes} must be below 60"
            ))),
            _ => Ok(()),
        }
    }

    /// Build the hub JSON request
    pub fn to_request(&self) -> Value {
        match self {
            Self::SetTemperature {
                device,
                temperature,
            } => json!({ "SET_TEMP": [temperature, device] }),
            Self::Hold {
                device,
                temperature,
                hours,
                minutes,
            } => json!({
                "HOLD": [
                    { "temp": temperature, "id": HOLD_ID, "hours": hours, "minutes": minutes },
                    device
                ]
            }),
            Self::CancelHold {
                device,
                temperature,
            } => json!({
                "HOLD": [
                    {
                        "temp": temperature.unwrap_or(DEFAULT_CANCEL_HOLD_TEMPERATURE),
                        "id": HOLD_ID,
                        "hours": 0,
                        "minutes": 0
                    },
                    device
                ]
            }),
            // Standby on the NeoStat is the hub's frost mode
            Self::Standby { device, on: true } => json!({ "FROST_ON": device }),
            Self::Standby { device, on: false } => json!({ "FROST_OFF": device }),
            Self::SetFrostTemperature {
                device,
                temperature,
            } => json!({ "SET_FROST": [temperature.trunc() as i64, device] }),
        }
    }
}

/// Fetcher that polls a hub for device status
///
/// Issues `INFO` and `ENGINEERS_DATA` and merges them into one object keyed
/// by device name.
#[derive(Debug, Clone)]
pub struct NeoHubFetcher {
    client: Arc<NeoHubClient>,
}

impl NeoHubFetcher {
    /// Create a fetcher over a shared client
    pub fn new(client: Arc<NeoHubClient>) -> Self {
        Self { client }
    }

    /// Merge INFO and ENGINEERS_DATA responses
    pub fn merge(info: &Value, engineers: Option<&Value>) -> Result<Value, FetchError> {
        let devices = info
            .get("devices")
            .and_then(Value::as_array)
            .ok_or_else(|| FetchError::BadPayload("INFO response has no devices".to_string()))?;

        let mut merged = Map::new();
        for device in devices {
            let Some(name) = device.get("device").and_then(Value::as_str) else {
                tracing::warn!(device = %device, "Skipping device without a name");
                continue;
            };

            let mut entry = device.clone();
            if let (Some(obj), Some(eng)) = (entry.as_object_mut(), engineers.and_then(|e| e.get(name))) {
                obj.insert("engineers_data".to_string(), eng.clone());
            }
            merged.insert(name.to_string(), entry);
        }

        Ok(Value::Object(merged))
    }
}

#[async_trait]
impl Fetcher for NeoHubFetcher {
    fn describe(&self) -> String {
        format!("neohub://{}:{}", self.client.host(), self.client.port())
    }

    async fn fetch(&self) -> Result<RawPayload, FetchError> {
        let info = self.client.json_request(&json!({ "INFO": 0 })).await?;

        let engineers = match self.client.json_request(&json!({ "ENGINEERS_DATA": 0 })).await {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(hub = %self.client.host(), error = %e, "Engineers data unavailable");
                None
            }
        };

        let merged = Self::merge(&info, engineers.as_ref())?;
        RawPayload::from_json(&merged)
    }
}
