// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration loading

use facetrack_fts::config::{CameraDescriptor, Config, ConfigSource};

#[test]
fn test_config_default_has_no_cameras() {
    let config = Config::default();
    assert!(config.cameras.is_empty());
    assert_eq!(config.shutdown_deadline_seconds, 10);
}

#[test]
fn test_config_source_loads_defaults_without_file() {
    let source = ConfigSource::load(None).expect("defaults must validate");
    assert_eq!(source.snapshot(), Config::default());
}

#[test]
fn test_config_validate_rejects_duplicate_camera_ids() {
    let mut config = Config::default();
    config.cameras.push(CameraDescriptor::stub("cam-a"));
    config.cameras.push(CameraDescriptor::stub("cam-a"));
    assert!(config.validate().is_err());
}

#[test]
fn test_config_round_trips_through_yaml() {
    let mut config = Config::default();
    config.cameras.push(CameraDescriptor::stub("cam-a"));
    let yaml = serde_yaml::to_string(&config).unwrap();
    let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(config, parsed);
}
