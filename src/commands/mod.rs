pub mod device;
pub mod offset;
pub mod refresh;
pub mod run;

use anyhow::Result;
use std::path::Path;

use waqt::config::Config;

// Re-export command functions for convenience
pub use device::{neohub, speaker, DeviceParams};
pub use offset::offset;
pub use refresh::refresh;
pub use run::run;

/// Load configuration from a file, or from the environment when none is given
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path),
        None => Config::from_env(),
    }
}
