use crate::models::{Catalog, Settings};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use std::fs;

/// Prefix of environment variables that override file settings
pub const ENV_PREFIX: &str = "LIBSCAN";

/// Configuration manager for the settings file and catalog files.
///
/// Settings live in `libscan.yaml` inside the configuration directory. Any
/// value can be overridden from the environment, e.g.
/// `LIBSCAN__SCANNER__BUNDLE_SIZE=40`.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager, creating `config_dir` if needed.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            settings_path: config_dir.join("libscan.yaml"),
            config_dir,
        })
    }

    /// Load settings from the file (if present) layered under the environment.
    pub fn load_settings(&self) -> Result<Settings> {
        self.load_settings_with(Environment::with_prefix(ENV_PREFIX))
    }

    fn load_settings_with(&self, environment: Environment) -> Result<Settings> {
        if !self.settings_path.exists() {
            tracing::warn!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            );
        }

        let settings: Settings = Config::builder()
            .add_source(
                File::new(self.settings_path.as_str(), FileFormat::Yaml).required(false),
            )
            .add_source(
                environment
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?
            .try_deserialize()
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        tracing::debug!(
            "Loaded settings: bundle_size={}, update_rate={}ms, hq_movie={}, hq_show={}",
            settings.scanner.bundle_size,
            settings.scanner.update_rate_ms,
            settings.scanner.enable_hq_movie,
            settings.scanner.enable_hq_show
        );
        Ok(settings)
    }

    /// Save settings to `libscan.yaml`.
    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(settings).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    /// Load a catalog of items to scan.
    ///
    /// Relative paths are resolved against the configuration directory.
    pub fn load_catalog<P: AsRef<Utf8Path>>(&self, path: P) -> Result<Catalog> {
        let path = path.as_ref();
        let path = if path.is_relative() {
            self.config_dir.join(path)
        } else {
            path.to_path_buf()
        };

        let file_contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read catalog: {}", path))?;

        let catalog: Catalog = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse catalog: {}", path))?;

        tracing::info!(
            "Loaded catalog from {}: {} shows, {} movies",
            path,
            catalog.shows.len(),
            catalog.movies.len()
        );
        Ok(catalog)
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }
}
