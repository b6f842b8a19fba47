//! Tool configuration loaded from a discoverable JSON file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::compress::CompressOptions;
use crate::concat::ConcatOptions;
use crate::mirror::MirrorOptions;

/// File name looked up in the working directory when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "site-tools.config.json";

/// Settings for every tool. Missing sections and fields keep their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ToolkitConfig {
    /// File concatenator settings.
    pub concat: ConcatOptions,
    /// Asset mirror settings.
    pub mirror: MirrorOptions,
    /// Image compressor settings.
    pub compress: CompressOptions,
}

impl ToolkitConfig {
    /// Attempt to load configuration from the provided directory.
    ///
    /// When the configuration file does not exist or fails to parse, defaults are returned.
    pub fn discover(dir: &Path) -> Self {
        let candidate = dir.join(DEFAULT_CONFIG_FILE);
        Self::from_path(&candidate).unwrap_or_default()
    }

    /// Read configuration from a specific JSON file.
    pub fn from_path(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Load an explicitly requested file strictly, or fall back to discovery in `dir`.
    pub fn load(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        let Some(path) = explicit else {
            return Ok(Self::discover(dir));
        };

        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }
}
