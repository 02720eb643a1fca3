/*!
 * Tests for application configuration
 */

use anyhow::Result;
use std::fs;
use mdtranslate::app_config::{Config, LogLevel, ProviderConfig, TranslationProvider};
use log::LevelFilter;
use crate::common;

/// Test that the default configuration is valid and translates Chinese to English
#[test]
fn test_default_config_shouldValidate() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.source_language, "zh");
    assert_eq!(config.target_language, "en");
    assert_eq!(config.translation.provider, TranslationProvider::Ollama);
}

/// Test that a configuration survives a trip through a JSON file
#[test]
fn test_config_fromFile_shouldPreserveSettings() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut config = Config::default();
    config.target_language = "fr".to_string();
    config.translation.provider = TranslationProvider::DeepSeek;
    config.pipeline.retry.acceptance_ratio = 0.2;
    config.jobs.max_input_chars = 5000;

    let path = temp_dir.path().join("conf.json");
    fs::write(&path, serde_json::to_string_pretty(&config)?)?;
    let loaded: Config = serde_json::from_str(&fs::read_to_string(&path)?)?;

    assert_eq!(loaded.target_language, "fr");
    assert_eq!(loaded.translation.provider, TranslationProvider::DeepSeek);
    assert!((loaded.pipeline.retry.acceptance_ratio - 0.2).abs() < 1e-9);
    assert_eq!(loaded.jobs.max_input_chars, 5000);
    assert!(loaded.validate().is_ok());
    Ok(())
}

/// Test that invalid languages are rejected
#[test]
fn test_validate_withUnknownLanguage_shouldFail() {
    let config = Config {
        source_language: "xyz".to_string(),
        ..Config::default()
    };
    assert!(config.validate().is_err());
}

/// Test that out-of-range temperatures are rejected
#[test]
fn test_validate_withInvalidTemperature_shouldFail() {
    let mut config = Config::default();
    config.translation.temperature = 3.5;
    assert!(config.validate().is_err());
}

/// Test that inverted retry thresholds are rejected
#[test]
fn test_validate_withInvertedRetryThresholds_shouldFail() {
    let mut config = Config::default();
    config.pipeline.retry.acceptance_ratio = 0.8;
    config.pipeline.retry.fallback_acceptance_ratio = 0.5;
    assert!(config.validate().is_err());
}

/// Test that unknown provider types in the provider list are rejected
#[test]
fn test_validate_withUnknownProviderType_shouldFail() {
    let mut config = Config::default();
    let mut provider = ProviderConfig::new(TranslationProvider::Ollama);
    provider.provider_type = "bard".to_string();
    config.translation.available_providers.push(provider);
    assert!(config.validate().is_err());
}

/// Test model resolution order: explicit override, provider entry, built-in default
#[test]
fn test_get_model_shouldPreferOverrideThenProviderEntry() {
    let mut config = Config::default();
    assert_eq!(config.translation.get_model(), "qwen2.5:7b");

    config.translation.provider = TranslationProvider::Mimo;
    assert_eq!(config.translation.get_model(), "mimo-v2-flash");

    config.translation.model = Some("deepseek-r1:14b".to_string());
    assert_eq!(config.translation.get_model(), "deepseek-r1:14b");
}

/// Test log level mapping
#[test]
fn test_log_level_shouldMapToLevelFilter() {
    assert_eq!(LogLevel::default(), LogLevel::Info);
    assert_eq!(LogLevel::Debug.to_level_filter(), LevelFilter::Debug);
    assert_eq!(LogLevel::Error.to_level_filter(), LevelFilter::Error);
}
