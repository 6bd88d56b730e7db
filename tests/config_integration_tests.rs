//! Integration tests for ConfigManager and configuration file handling
//!
//! These tests verify:
//! - Default configuration when no file exists
//! - Saving and reloading `modmine.yaml`
//! - Partial files falling back to defaults per field
//! - Malformed files surfacing a readable error
//! - Loaded configuration reaching the orchestrator

use camino::Utf8PathBuf;
use modmine::models::AnalysisConfig;
use modmine::{AnalysisOrchestrator, ConfigManager};
use std::fs;
use tempfile::TempDir;

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

#[test]
fn test_create_config_manager() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    assert_eq!(manager.config_dir(), &config_path);
    assert_eq!(
        manager.config_path().as_str(),
        config_path.join("modmine.yaml").as_str()
    );
}

#[test]
fn test_config_dir_is_created() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let nested = config_path.join("nested").join("config");

    let manager = ConfigManager::new(&nested).unwrap();

    assert!(nested.exists());
    assert_eq!(manager.config_dir(), &nested);
}

#[test]
fn test_load_default_config() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    // Config file doesn't exist, should return defaults
    let config = manager.load_config().unwrap();

    assert_eq!(config.training.learning_rate, 0.1);
    assert_eq!(config.training.max_epochs, 1000);
    assert_eq!(config.training.seed, 42);
    assert_eq!(config.limits.training_timeout_secs, 30);
    assert_eq!(config.hardware.system_ram_gb, 16.0);
}

#[test]
fn test_save_and_reload_config() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let mut config = AnalysisConfig::default();
    config.training.seed = 99;
    config.training.early_stop_mse = 0.05;
    config.limits.bottleneck_scan_timeout_secs = 3;
    config.logging.debug_mode = true;
    manager.save_config(&config).unwrap();

    assert!(manager.config_path().exists());
    let loaded = manager.load_config().unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_partial_file_keeps_other_defaults() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    fs::write(
        manager.config_path(),
        "hardware:\n  vram_capacity_mb: 4096\nlimits:\n  training_timeout_secs: 5\n",
    )
    .unwrap();

    let config = manager.load_config().unwrap();
    assert_eq!(config.hardware.vram_capacity_mb, 4096.0);
    assert_eq!(config.hardware.system_ram_gb, 16.0);
    assert_eq!(config.limits.training_timeout_secs, 5);
    assert_eq!(config.limits.bottleneck_scan_timeout_secs, 10);
    assert_eq!(config.training.max_epochs, 1000);
}

#[test]
fn test_malformed_file_is_an_error() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    fs::write(manager.config_path(), "training: [not, a, map").unwrap();

    let err = manager.load_config().unwrap_err();
    assert!(
        format!("{:#}", err).contains("analysis config"),
        "unexpected error: {:#}",
        err
    );
}

#[test]
fn test_loaded_config_reaches_orchestrator() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let mut config = AnalysisConfig::default();
    config.limits.training_timeout_secs = 7;
    manager.save_config(&config).unwrap();

    let orchestrator = AnalysisOrchestrator::new(manager.load_config().unwrap());
    assert_eq!(orchestrator.config().limits.training_timeout_secs, 7);
    assert!(!orchestrator.training_signal().is_cancelled());
}
