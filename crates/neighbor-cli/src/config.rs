//! Dummy Neighbor CLI Configuration
//!
//! Loads scenario parameters from an optional TOML file. Any key left out
//! keeps its default, so the smallest useful file is a single line:
//!
//! ```toml
//! [neighbor]
//! reply_limit = 4
//! ```

use std::path::Path;

use neighbor_core::NeighborConfig;
use serde::{Deserialize, Serialize};

use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the CLI application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scenario parameters
    pub neighbor: NeighborConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.neighbor
            .validate()
            .map_err(|e| CliError::Config(e.to_string()))
    }

    /// Commented example configuration with every default spelled out
    pub fn example_config() -> String {
        let defaults = toml::to_string_pretty(&Self::default()).unwrap_or_default();
        format!(
            "# Dummy neighbor configuration\n# Every key is optional.\n\n{}",
            defaults
        )
    }
}
