//! Configuration resolution tests
//!
//! Covers the CLI > environment > TOML > default priority order and the
//! handling of missing or invalid config files.
//!
//! Note: Uses serial_test to keep tests that set RIFFPLAY_* environment
//! variables from racing each other.

use riffplay_common::config::{
    locate_config_file, ConfigOverrides, Settings, TomlConfig, ENV_CHUNK_FRAMES, ENV_CONFIG,
    ENV_DEVICE, ENV_MAX_DATA_BYTES,
};
use riffplay_common::Error;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn clear_env() {
    env::remove_var(ENV_CONFIG);
    env::remove_var(ENV_DEVICE);
    env::remove_var(ENV_CHUNK_FRAMES);
    env::remove_var(ENV_MAX_DATA_BYTES);
}

fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
#[serial]
fn test_toml_values_used_when_no_overrides() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
        device = "pulse"
        chunk_frames = 512
        max_data_bytes = 4096

        [logging]
        level = "warn"
        "#,
    );

    let settings = Settings::resolve(Some(&path), &ConfigOverrides::default()).unwrap();

    assert_eq!(settings.device, "pulse");
    assert_eq!(settings.chunk_frames, 512);
    assert_eq!(settings.max_data_bytes, 4096);
    assert_eq!(settings.log_level, "warn");
    assert_eq!(settings.config_file.as_deref(), Some(path.as_path()));
}

#[test]
#[serial]
fn test_environment_overrides_toml() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "device = \"pulse\"\nchunk_frames = 512\n");

    env::set_var(ENV_DEVICE, "hw:1,0");
    env::set_var(ENV_CHUNK_FRAMES, "256");

    let settings = Settings::resolve(Some(&path), &ConfigOverrides::default()).unwrap();
    clear_env();

    assert_eq!(settings.device, "hw:1,0");
    assert_eq!(settings.chunk_frames, 256);
}

#[test]
#[serial]
fn test_cli_overrides_environment() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "device = \"pulse\"\n");

    env::set_var(ENV_DEVICE, "from-env");
    env::set_var(ENV_MAX_DATA_BYTES, "1000");

    let overrides = ConfigOverrides {
        device: Some("from-cli".to_string()),
        chunk_frames: Some(64),
        max_data_bytes: None,
    };
    let settings = Settings::resolve(Some(&path), &overrides).unwrap();
    clear_env();

    assert_eq!(settings.device, "from-cli");
    assert_eq!(settings.chunk_frames, 64);
    assert_eq!(settings.max_data_bytes, 1000);
}

#[test]
#[serial]
fn test_config_path_from_environment() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "chunk_frames = 128\n");

    env::set_var(ENV_CONFIG, &path);
    let located = locate_config_file(None);
    let settings = Settings::resolve(None, &ConfigOverrides::default());
    clear_env();

    assert_eq!(located.unwrap(), Some(path));
    assert_eq!(settings.unwrap().chunk_frames, 128);
}

#[test]
#[serial]
fn test_explicit_missing_file_is_error() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");

    let result = Settings::resolve(Some(&missing), &ConfigOverrides::default());
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_invalid_environment_value_is_error() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "");

    env::set_var(ENV_CHUNK_FRAMES, "lots");
    let result = Settings::resolve(Some(&path), &ConfigOverrides::default());
    clear_env();

    match result {
        Err(Error::Config(message)) => assert!(message.contains(ENV_CHUNK_FRAMES)),
        other => panic!("Expected Config error, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_zero_chunk_override_rejected() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "");

    let overrides = ConfigOverrides {
        chunk_frames: Some(0),
        ..ConfigOverrides::default()
    };
    let result = Settings::resolve(Some(&path), &overrides);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_load_rejects_invalid_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "chunk_frames = 0\n");

    let result = TomlConfig::load(&path);
    assert!(matches!(result, Err(Error::Config(_))));
}
