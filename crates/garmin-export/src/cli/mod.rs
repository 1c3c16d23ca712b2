//! Command-line front end

pub mod commands;

use tracing::debug;

use crate::config::{ConfigFile, ConfigOverrides, ExportConfig};
use crate::error::Result;

/// Resolve settings from the config file and command-line overrides
pub fn load_config(overrides: ConfigOverrides) -> Result<ExportConfig> {
    let path = ConfigFile::default_path()?;
    let file = ConfigFile::load(&path)?;
    if file.is_some() {
        debug!(path = %path.display(), "Loaded config file");
    }
    ExportConfig::resolve(file, overrides)
}
