use serde::{Deserialize, Serialize};

/// Top-level analysis configuration, loaded from `modmine.yaml`
///
/// Every section falls back to its defaults so partial files are valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub training: TrainingConfig,
    pub limits: LimitsConfig,
    pub hardware: HardwareDefaults,
    pub logging: LoggingConfig,
}

/// Hyperparameters for the conflict classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub learning_rate: f64,
    pub max_epochs: usize,
    /// Training stops once the epoch mean squared error drops below this
    pub early_stop_mse: f64,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            max_epochs: 1000,
            early_stop_mse: 0.01,
            seed: 42,
        }
    }
}

/// Deadlines for the superlinear operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub training_timeout_secs: u64,
    pub bottleneck_scan_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            training_timeout_secs: 30,
            bottleneck_scan_timeout_secs: 10,
        }
    }
}

/// Capacities assumed when a session carries no hardware profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareDefaults {
    pub vram_capacity_mb: f64,
    pub system_ram_gb: f64,
}

impl Default for HardwareDefaults {
    fn default() -> Self {
        Self {
            vram_capacity_mb: 8192.0,
            system_ram_gb: 16.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_dir: String,
    pub log_prefix: String,
    pub debug_mode: bool,
    pub console_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".to_string(),
            log_prefix: "modmine".to_string(),
            debug_mode: false,
            console_output: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.training.learning_rate, 0.1);
        assert_eq!(config.training.max_epochs, 1000);
        assert_eq!(config.hardware.vram_capacity_mb, 8192.0);
        assert_eq!(config.logging.log_prefix, "modmine");
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "training:\n  seed: 7\n";
        let config: AnalysisConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.training.seed, 7);
        assert_eq!(config.training.max_epochs, 1000);
        assert_eq!(config.limits.training_timeout_secs, 30);
    }
}
