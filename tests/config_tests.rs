// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use capscreens::Config;
use capscreens::backends::{CodeType, DeviceSelector};
use capscreens::config::{LocationBackendType, PermissionPolicy};
use std::time::Duration;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.permission_policy, PermissionPolicy::Prompt);
    assert_eq!(config.camera, DeviceSelector::Back);
    assert_eq!(
        config.single_fix.timeout(),
        Duration::from_secs(15),
        "Single fix should time out after 15 seconds"
    );
    assert!(config.validate().is_ok(), "Defaults must be valid");
}

#[test]
fn test_config_save_and_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let mut config = Config::default();
    config.camera = DeviceSelector::Front;
    config.code_types = [CodeType::Qr, CodeType::Code128].into_iter().collect();
    config.single_fix.timeout_ms = 5_000;
    config.save(&path).unwrap();

    let loaded = Config::read(&path).unwrap().unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_missing_file_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");

    assert!(Config::read(&path).unwrap().is_none());
    assert_eq!(Config::load(&path), Config::default());
}

#[test]
fn test_unparsable_file_loads_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(Config::read(&path).is_err());
    assert_eq!(Config::load(&path), Config::default());
}

#[test]
fn test_invalid_values_rejected() {
    let mut config = Config::default();
    config.code_types.clear();
    assert!(config.validate().is_err(), "Empty code types");

    let mut config = Config::default();
    config.single_fix.timeout_ms = 0;
    assert!(config.validate().is_err(), "Zero timeout");

    let mut config = Config::default();
    config.watch.min_interval_ms = 0;
    assert!(config.validate().is_err(), "Zero watch interval");

    let mut config = Config::default();
    config.frame_interval_ms = 0;
    assert!(config.validate().is_err(), "Zero frame interval");

    let mut config = Config::default();
    config.location_backend = LocationBackendType::Replay;
    assert!(config.validate().is_err(), "Replay without a file");
}

#[test]
fn test_invalid_file_is_not_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"code_types": []}"#).unwrap();

    assert!(Config::read(&path).is_err());
    assert_eq!(Config::load(&path), Config::default());
}
