use crate::models::AnalysisConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use std::fs;

/// File name of the analysis configuration inside the config directory
pub const CONFIG_FILE_NAME: &str = "modmine.yaml";

/// Prefix for environment overrides, e.g. `MODMINE_TRAINING__SEED=7`
pub const ENV_PREFIX: &str = "MODMINE";

/// Configuration manager for loading and saving the analysis configuration.
///
/// Values are layered, later sources winning:
/// 1. Built-in defaults ([`AnalysisConfig::default`])
/// 2. `modmine.yaml` in the config directory (optional)
/// 3. `MODMINE_*` environment variables, `__` separating nested keys
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing `modmine.yaml`; created if missing
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        // Create config directory if it doesn't exist
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            config_path: config_dir.join(CONFIG_FILE_NAME),
            config_dir,
        })
    }

    /// Load the layered configuration.
    ///
    /// # Returns
    /// The loaded AnalysisConfig, or defaults (plus any environment
    /// overrides) if the file doesn't exist
    pub fn load_config(&self) -> Result<AnalysisConfig> {
        self.load_with_env(Self::environment())
    }

    /// Save the configuration file.
    ///
    /// # Arguments
    /// * `config` - The AnalysisConfig to save
    pub fn save_config(&self, config: &AnalysisConfig) -> Result<()> {
        let yaml_string = serde_yaml_ng::to_string(config)
            .context("Failed to serialize analysis config to YAML")?;

        fs::write(&self.config_path, yaml_string)
            .with_context(|| format!("Failed to write analysis config: {}", self.config_path))?;

        tracing::info!("Saved analysis config to {}", self.config_path);
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Get the configuration file path.
    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn load_with_env(&self, env: Environment) -> Result<AnalysisConfig> {
        if !self.config_path.exists() {
            tracing::warn!(
                "Analysis config file not found at {}, using defaults",
                self.config_path
            );
        }

        let defaults = Config::try_from(&AnalysisConfig::default())
            .context("Failed to build default analysis config")?;

        let config: AnalysisConfig = Config::builder()
            .add_source(defaults)
            .add_source(File::new(self.config_path.as_str(), FileFormat::Yaml).required(false))
            .add_source(env)
            .build()
            .with_context(|| format!("Failed to read analysis config: {}", self.config_path))?
            .try_deserialize()
            .with_context(|| format!("Failed to parse analysis config: {}", self.config_path))?;

        tracing::info!("Loaded analysis config from {}", self.config_dir);
        Ok(config)
    }
}
