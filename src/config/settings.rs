//! Settings loading from config.toml
//!
//! The settings file is optional. It can name the database and list buckets that
//! should exist on startup; configured buckets are seeded when no visible bucket
//! with the same name is present.

use crate::{
    core::bucket::BucketDetails,
    errors::{Error, Result},
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Location of the settings file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

const DEFAULT_COLOR: &str = "#9e9e9e";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize)]
pub struct LedgerConfig {
    /// Database URL; `DATABASE_URL` takes precedence
    #[serde(default)]
    pub database_url: Option<String>,
    /// Buckets to seed
    #[serde(default)]
    pub buckets: Vec<BucketSeed>,
}

/// Configuration for a single bucket
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BucketSeed {
    /// Name of the bucket
    pub name: String,
    /// Display color
    #[serde(default = "default_color")]
    pub color: String,
    /// Optional savings target
    #[serde(default)]
    pub target: Option<f64>,
    /// Optional date for the target, written as `"YYYY-MM-DD"`
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

impl BucketSeed {
    /// Bucket details to create this seed with.
    #[must_use]
    pub fn to_details(&self) -> BucketDetails {
        BucketDetails {
            name: self.name.clone(),
            color: self.color.clone(),
            target_amount: self.target,
            target_date: self.target_date,
        }
    }
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns [`Error::Config`] if the file cannot be read or is not valid settings TOML.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<LedgerConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads settings from `path`, falling back to defaults when the file does not exist.
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<LedgerConfig> {
    let path = path.as_ref();
    if !path.exists() {
        debug!(?path, "No settings file, using defaults");
        return Ok(LedgerConfig::default());
    }
    load_config(path)
}

/// Loads settings from the default location (./config.toml)
pub fn load_default_config() -> Result<LedgerConfig> {
    load_config_or_default(DEFAULT_CONFIG_PATH)
}
