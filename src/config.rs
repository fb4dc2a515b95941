//! Application Configuration
//!
//! Everything the entry point needs is carried in an explicit `AppConfig`
//! value: input location, report names, rule table and enrichment settings.
//! The value can be read from a YAML file and is then overridden by CLI
//! arguments.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

// =============================================================================
// Input / Output
// =============================================================================

/// Where device records come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// CSV file with device records
    pub path: PathBuf,
    /// Use the built-in sample records when the file cannot be read
    pub fallback_to_sample: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./devices.csv"),
            fallback_to_sample: true,
        }
    }
}

/// Where reports are written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// Per-device CSV report file name
    pub categorized_csv: String,
    /// JSON summary file name
    pub summary_json: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            categorized_csv: "categorized_devices.csv".to_string(),
            summary_json: "categorization_results.json".to_string(),
        }
    }
}

impl OutputConfig {
    pub fn categorized_csv_path(&self) -> PathBuf {
        self.dir.join(&self.categorized_csv)
    }

    pub fn summary_json_path(&self) -> PathBuf {
        self.dir.join(&self.summary_json)
    }
}

// =============================================================================
// Enrichment
// =============================================================================

/// Settings for the optional online CPU lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Disabled by default
    pub enabled: bool,
    /// Search endpoint; the query is appended as `?q=`
    pub search_url: String,
    /// Guesses below this confidence are ignored
    pub confidence_threshold: f64,
    /// Maximum lookups in flight
    pub max_concurrency: usize,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            search_url: "https://www.google.com/search".to_string(),
            confidence_threshold: 0.6,
            max_concurrency: 3,
            timeout_secs: 10,
            user_agent: concat!("device-categorizer/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Complete configuration for a categorization run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub input: InputConfig,
    pub output: OutputConfig,
    /// Custom rule table (YAML or JSON); the built-in table when absent
    pub rules_path: Option<PathBuf>,
    pub enrichment: EnrichmentConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Cannot read config {}: {}", path.display(), e))
        })?;
        let config: AppConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        let threshold = self.enrichment.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::Configuration(format!(
                "confidence_threshold must be within [0, 1], got {}",
                threshold
            )));
        }
        if self.enrichment.max_concurrency == 0 {
            return Err(Error::Configuration(
                "max_concurrency must be at least 1".into(),
            ));
        }
        if self.enrichment.timeout_secs == 0 {
            return Err(Error::Configuration("timeout_secs must be at least 1".into()));
        }
        if self.output.categorized_csv.is_empty() || self.output.summary_json.is_empty() {
            return Err(Error::Configuration("report file names must not be empty".into()));
        }
        Ok(())
    }
}
