use crate::models::media::{MediaIds, SeasonFact};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level settings from `libscan.yaml`, overridable through
/// `LIBSCAN__<SECTION>__<KEY>` environment variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub scanner: ScannerSettings,
    pub logging: LoggingSettings,
}

/// Scan pacing and high-quality variant switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerSettings {
    #[serde(default = "default_bundle_size")]
    pub bundle_size: usize,

    /// Delay between bundles, in milliseconds.
    #[serde(default = "default_update_rate_ms")]
    pub update_rate_ms: u64,

    #[serde(default)]
    pub enable_hq_movie: bool,

    #[serde(default)]
    pub enable_hq_show: bool,
}

impl ScannerSettings {
    pub fn update_rate(&self) -> Duration {
        Duration::from_millis(self.update_rate_ms)
    }
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            bundle_size: default_bundle_size(),
            update_rate_ms: default_update_rate_ms(),
            enable_hq_movie: false,
            enable_hq_show: false,
        }
    }
}

fn default_bundle_size() -> usize {
    20
}

fn default_update_rate_ms() -> u64 {
    4000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_log_prefix")]
    pub log_prefix: String,

    #[serde(default)]
    pub debug_mode: bool,

    /// Mirror log output to the console.
    #[serde(default = "default_console")]
    pub console: bool,

    /// Write the log file as JSON lines instead of plain text.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            log_prefix: default_log_prefix(),
            debug_mode: false,
            console: default_console(),
            json: false,
        }
    }
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_log_prefix() -> String {
    "libscan".to_string()
}

fn default_console() -> bool {
    true
}

/// Items to scan, as read from a catalog file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    pub shows: Vec<CatalogShow>,
    pub movies: Vec<CatalogMovie>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogShow {
    #[serde(flatten)]
    pub ids: MediaIds,
    pub title: String,
    #[serde(default)]
    pub rating_key: Option<String>,
    #[serde(default)]
    pub is_hq: bool,
    #[serde(default)]
    pub seasons: Vec<SeasonFact>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogMovie {
    #[serde(flatten)]
    pub ids: MediaIds,
    pub title: String,
    #[serde(default)]
    pub rating_key: Option<String>,
    #[serde(default)]
    pub is_hq: bool,
    #[serde(default)]
    pub processing: bool,
}
