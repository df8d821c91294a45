//! Unit tests for configuration validation and loading.

use super::*;
use anyhow::Result;
use std::fs;
use tempfile::TempDir;

use crate::error::EncoderError;

#[test]
fn test_default_config_is_valid() -> Result<()> {
    let config = EncoderConfig::default();
    config.validate()?;

    assert_eq!(config.latent_head_width(), 48);
    assert_eq!(config.cross_head_width(), 384);
    Ok(())
}

#[test]
fn test_zero_dimension_rejected() {
    let config = EncoderConfig { vocab_size: 0, ..EncoderConfig::default() };

    let err = config.validate().unwrap_err();
    assert!(matches!(err, EncoderError::Config(_)));
    assert!(err.to_string().contains("vocab_size"));
}

#[test]
fn test_latent_heads_must_divide_latent_dim() {
    let config = EncoderConfig { latent_dim: 10, latent_heads: 3, ..EncoderConfig::default() };

    let err = config.validate().unwrap_err();
    assert!(matches!(err, EncoderError::Config(_)));
    assert!(err.to_string().contains("latent_heads"));
}

#[test]
fn test_cross_heads_must_divide_latent_dim() {
    let config = EncoderConfig { cross_heads: 5, ..EncoderConfig::default() };

    let err = config.validate().unwrap_err();
    assert!(matches!(err, EncoderError::Config(_)));
    assert!(err.to_string().contains("cross_heads"));
}

#[test]
fn test_input_dim_must_equal_hidden() {
    let config = EncoderConfig { input_dim: 512, hidden: 384, ..EncoderConfig::default() };

    let err = config.validate().unwrap_err();
    assert!(matches!(err, EncoderError::Config(_)));
    assert!(err.to_string().contains("input_dim"));
}

#[test]
fn test_config_serialization_round_trip() -> Result<()> {
    let config = EncoderConfig { num_latents: 16, latent_dim: 64, latent_heads: 4, ..EncoderConfig::default() };

    let json = serde_json::to_string(&config)?;
    let deserialized: EncoderConfig = serde_json::from_str(&json)?;

    assert_eq!(deserialized.num_latents, 16);
    assert_eq!(deserialized.latent_dim, 64);
    assert_eq!(deserialized.latent_heads, 4);
    assert_eq!(deserialized.vocab_size, config.vocab_size);
    Ok(())
}

#[test]
fn test_from_file_accepts_original_single_letter_keys() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config_content = r#"{
        "vocab_size": 100,
        "hidden": 8,
        "embedding": 4,
        "max_len": 16,
        "C": 8,
        "N": 4,
        "D": 8,
        "cross_heads": 2,
        "latent_heads": 2,
        "ffw": 16,
        "process_layers": 2
    }"#;
    let config_path = temp_dir.path().join("config.json");
    fs::write(&config_path, config_content)?;

    let config = EncoderConfig::from_file(&config_path)?;

    assert_eq!(config.input_dim, 8);
    assert_eq!(config.num_latents, 4);
    assert_eq!(config.latent_dim, 8);
    // Fields absent from the document fall back to the defaults.
    assert_eq!(config.n_segments, 2);
    Ok(())
}

#[test]
fn test_from_file_rejects_malformed_document() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("config.json");
    fs::write(&config_path, "not json")?;

    let err = EncoderConfig::from_file(&config_path).unwrap_err();
    assert!(matches!(err, EncoderError::Parse(_)));
    Ok(())
}

#[test]
fn test_from_file_rejects_invalid_config() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("config.json");
    fs::write(&config_path, r#"{"D": 10, "latent_heads": 3}"#)?;

    let err = EncoderConfig::from_file(&config_path).unwrap_err();
    assert!(matches!(err, EncoderError::Config(_)));
    Ok(())
}

#[test]
fn test_from_file_missing_document() {
    let err = EncoderConfig::from_file(std::path::Path::new("/nonexistent/config.json")).unwrap_err();
    assert!(matches!(err, EncoderError::Io(_)));
}
