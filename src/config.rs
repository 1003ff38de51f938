// SPDX-License-Identifier: MPL-2.0

//! Configuration loading, snapshotting, and hot-reload
//!
//! [`Config`] is the single source of truth handed to the
//! [`crate::controller::FtsController`]. It is layered from built-in
//! defaults, an optional YAML file, and `FTS_*` environment variable
//! overrides using the `config` crate.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::constants::*;

/// How a camera's capture source is reached
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceKind {
    /// The machine's built-in camera (device index 0 by convention)
    Builtin { index: u32 },
    /// A USB camera at a given device index
    Usb { index: u32 },
    /// An RTSP stream
    Rtsp {
        url: String,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        password: Option<String>,
    },
    /// An ONVIF-managed device; `endpoint` is the device-service URL
    /// resolved during discovery
    Onvif {
        endpoint: String,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        password: Option<String>,
    },
    /// A deterministic synthetic source used for local smoke-testing
    Stub,
}

/// Crossing-direction policy for a tripwire
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DirectionPolicy {
    Enter,
    Exit,
    Both,
    /// Alias for `Both`, accepted for source compatibility.
    Monitoring,
}

impl DirectionPolicy {
    /// Normalize the "monitoring" alias to `Both`.
    pub fn normalized(self) -> Self {
        match self {
            DirectionPolicy::Monitoring => DirectionPolicy::Both,
            other => other,
        }
    }
}

/// Orientation of a tripwire line
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// A virtual line on the image plane whose crossing emits an attendance event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tripwire {
    pub id: String,
    pub name: String,
    pub orientation: Orientation,
    /// Position in `[0, 1]` along the relevant axis
    pub position: f32,
    /// Hysteresis band width in `[0, 1]`, also used as display width
    pub spacing: f32,
    pub direction: DirectionPolicy,
}

impl Default for Tripwire {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            name: "default".to_string(),
            orientation: Orientation::Horizontal,
            position: 0.5,
            spacing: 0.05,
            direction: DirectionPolicy::Both,
        }
    }
}

/// Describes one camera enabled (or disabled) in the fleet
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CameraDescriptor {
    pub id: String,
    pub source: SourceKind,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub enabled: bool,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub tripwires: Vec<Tripwire>,
}

impl CameraDescriptor {
    pub fn stub(id: &str) -> Self {
        Self {
            id: id.to_string(),
            source: SourceKind::Stub,
            width: 640,
            height: 480,
            fps: 15,
            enabled: true,
            location: None,
            tripwires: vec![Tripwire::default()],
        }
    }
}

/// Paths to the opaque, pre-trained detector and embedding models
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ModelPaths {
    #[serde(default)]
    pub detector_path: Option<PathBuf>,
    #[serde(default)]
    pub embedder_path: Option<PathBuf>,
}

/// Camera discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryConfig {
    #[serde(default)]
    pub discover_subnet: Option<String>,
    #[serde(default = "default_discover_ports")]
    pub discover_ports: Vec<u16>,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_local_device_count")]
    pub local_device_count: usize,
    #[serde(default = "default_network_fanout")]
    pub network_fanout: usize,
}

fn default_discover_ports() -> Vec<u16> {
    DISCOVER_NETWORK_PORTS.to_vec()
}
fn default_probe_timeout_ms() -> u64 {
    DISCOVER_PROBE_TIMEOUT.as_millis() as u64
}
fn default_local_device_count() -> usize {
    DISCOVER_LOCAL_DEVICE_COUNT
}
fn default_network_fanout() -> usize {
    DISCOVER_NETWORK_FANOUT
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            discover_subnet: None,
            discover_ports: default_discover_ports(),
            probe_timeout_ms: default_probe_timeout_ms(),
            local_device_count: default_local_device_count(),
            network_fanout: default_network_fanout(),
        }
    }
}

/// Pipeline-wide thresholds and tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    #[serde(default = "default_detect_threshold")]
    pub detect_threshold: f32,
    #[serde(default = "default_identify_threshold")]
    pub identify_threshold: f32,
    #[serde(default = "default_reid_margin")]
    pub reid_margin: f32,
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,
    #[serde(default = "default_expire_frames")]
    pub expire_frames: u32,
    #[serde(default = "default_fail_threshold_per_minute")]
    pub fail_threshold_per_minute: u32,
    #[serde(default)]
    pub inference_workers: Option<usize>,
}

fn default_detect_threshold() -> f32 {
    DEFAULT_DETECT_THRESHOLD
}
fn default_identify_threshold() -> f32 {
    DEFAULT_IDENTIFY_THRESHOLD
}
fn default_reid_margin() -> f32 {
    DEFAULT_REID_MARGIN
}
fn default_iou_threshold() -> f32 {
    DEFAULT_IOU_THRESHOLD
}
fn default_expire_frames() -> u32 {
    DEFAULT_EXPIRE_FRAMES
}
fn default_fail_threshold_per_minute() -> u32 {
    DEFAULT_FAIL_THRESHOLD_PER_MINUTE
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detect_threshold: default_detect_threshold(),
            identify_threshold: default_identify_threshold(),
            reid_margin: default_reid_margin(),
            iou_threshold: default_iou_threshold(),
            expire_frames: default_expire_frames(),
            fail_threshold_per_minute: default_fail_threshold_per_minute(),
            inference_workers: None,
        }
    }
}

/// Attendance recorder configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecorderConfig {
    #[serde(default = "default_debounce_window_seconds")]
    pub debounce_window_seconds: u64,
    #[serde(default = "default_spill_path")]
    pub spill_path: PathBuf,
    #[serde(default = "default_backoff_ceiling_seconds")]
    pub backoff_ceiling_seconds: u64,
}

fn default_debounce_window_seconds() -> u64 {
    DEFAULT_DEBOUNCE_WINDOW.as_secs()
}
fn default_spill_path() -> PathBuf {
    PathBuf::from("attendance_spill.ndjson")
}
fn default_backoff_ceiling_seconds() -> u64 {
    30
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            debounce_window_seconds: default_debounce_window_seconds(),
            spill_path: default_spill_path(),
            backoff_ceiling_seconds: default_backoff_ceiling_seconds(),
        }
    }
}

/// MJPEG publisher configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MjpegConfig {
    #[serde(default = "default_placeholder_hz")]
    pub placeholder_hz: u32,
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
}

fn default_placeholder_hz() -> u32 {
    DEFAULT_PLACEHOLDER_HZ
}
fn default_subscriber_buffer() -> usize {
    DEFAULT_MJPEG_SUBSCRIBER_BUFFER
}

impl Default for MjpegConfig {
    fn default() -> Self {
        Self {
            placeholder_hz: default_placeholder_hz(),
            subscriber_buffer: default_subscriber_buffer(),
        }
    }
}

/// Full configuration snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub cameras: Vec<CameraDescriptor>,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub recorder: RecorderConfig,
    #[serde(default)]
    pub mjpeg: MjpegConfig,
    #[serde(default = "default_shutdown_deadline_seconds")]
    pub shutdown_deadline_seconds: u64,
    #[serde(default)]
    pub models: ModelPaths,
    #[serde(default = "default_identity_index_path")]
    pub identity_index_path: PathBuf,
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,
    #[serde(default = "default_reload_interval_ms")]
    pub reload_interval_ms: u64,
}

fn default_shutdown_deadline_seconds() -> u64 {
    DEFAULT_SHUTDOWN_DEADLINE.as_secs()
}
fn default_identity_index_path() -> PathBuf {
    PathBuf::from("identities.idx")
}
fn default_embedding_dimension() -> usize {
    DEFAULT_EMBEDDING_DIMENSION
}
fn default_reload_interval_ms() -> u64 {
    DEFAULT_CONFIG_RELOAD_INTERVAL.as_millis() as u64
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cameras: Vec::new(),
            discovery: DiscoveryConfig::default(),
            pipeline: PipelineConfig::default(),
            recorder: RecorderConfig::default(),
            mjpeg: MjpegConfig::default(),
            shutdown_deadline_seconds: default_shutdown_deadline_seconds(),
            models: ModelPaths::default(),
            identity_index_path: default_identity_index_path(),
            embedding_dimension: default_embedding_dimension(),
            reload_interval_ms: default_reload_interval_ms(),
        }
    }
}

impl Config {
    pub fn shutdown_deadline(&self) -> Duration {
        Duration::from_secs(self.shutdown_deadline_seconds)
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_secs(self.recorder.debounce_window_seconds)
    }

    pub fn reload_interval(&self) -> Duration {
        Duration::from_millis(self.reload_interval_ms)
    }

    /// Validate required fields, mirroring `ErrConfigInvalid(field)`.
    ///
    /// Camera ids must be unique and non-empty; everything else has a
    /// usable default, so this is deliberately narrow.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashMap::new();
        for cam in &self.cameras {
            if cam.id.is_empty() {
                return Err(ConfigError::Invalid("cameras[].id".to_string()));
            }
            if seen.insert(cam.id.clone(), ()).is_some() {
                return Err(ConfigError::Invalid(format!(
                    "cameras[].id (duplicate: {})",
                    cam.id
                )));
            }
            if cam.width == 0 || cam.height == 0 {
                return Err(ConfigError::Invalid(format!(
                    "cameras[{}].width/height",
                    cam.id
                )));
            }
        }
        Ok(())
    }
}

/// Loads and watches [`Config`] from layered sources
///
/// Priority, ascending: built-in defaults -> optional YAML file -> `FTS_*`
/// environment variable overrides.
pub struct ConfigSource {
    path: Option<PathBuf>,
    current: Config,
}

impl ConfigSource {
    /// Load a snapshot from an optional YAML file plus environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = Self::build(path)?;
        config.validate()?;
        Ok(Self {
            path: path.map(PathBuf::from),
            current: config,
        })
    }

    fn build(path: Option<&Path>) -> Result<Config, ConfigError> {
        let mut builder = config::Config::builder().add_source(
            config::Config::try_from(&Config::default())
                .map_err(|e| ConfigError::Load(format!("failed to seed defaults: {e}")))?,
        );

        if let Some(path) = path {
            if path.exists() {
                builder = builder.add_source(config::File::from(path));
            } else {
                warn!(path = %path.display(), "configured file does not exist, using defaults");
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix("FTS")
                .separator("__")
                .try_parsing(true),
        );

        let built = builder
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        built
            .try_deserialize()
            .map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Current configuration snapshot.
    pub fn snapshot(&self) -> Config {
        self.current.clone()
    }

    /// Spawn a background task that polls the backing file's mtime and
    /// pushes a new snapshot whenever the content changes and parses
    /// successfully. A bad reload is logged and the previous snapshot stays
    /// live.
    pub fn watch(self) -> tokio::sync::watch::Receiver<Config> {
        let (tx, rx) = tokio::sync::watch::channel(self.current.clone());
        let ConfigSource { path, mut current } = self;
        tokio::spawn(async move {
            let Some(path) = path else { return };
            let mut last_modified = std::fs::metadata(&path).and_then(|m| m.modified()).ok();
            let interval = current.reload_interval();
            loop {
                tokio::time::sleep(interval).await;
                let Ok(modified) = std::fs::metadata(&path).and_then(|m| m.modified()) else {
                    continue;
                };
                if Some(modified) == last_modified {
                    continue;
                }
                last_modified = Some(modified);
                match Self::build(Some(&path)) {
                    Ok(new_config) => {
                        if let Err(e) = new_config.validate() {
                            warn!(error = %e, "reloaded config failed validation, keeping previous");
                            continue;
                        }
                        if new_config != current {
                            info!("configuration changed, publishing new snapshot");
                            current = new_config.clone();
                            if tx.send(new_config).is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to reload configuration, keeping previous");
                    }
                }
            }
        });
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.cameras.is_empty());
        assert_eq!(config.pipeline.detect_threshold, DEFAULT_DETECT_THRESHOLD);
        assert_eq!(
            config.recorder.debounce_window_seconds,
            DEFAULT_DEBOUNCE_WINDOW.as_secs()
        );
    }

    #[test]
    fn test_config_validate_rejects_empty_id() {
        let mut config = Config::default();
        config.cameras.push(CameraDescriptor {
            id: String::new(),
            ..CameraDescriptor::stub("x")
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_rejects_duplicate_id() {
        let mut config = Config::default();
        config.cameras.push(CameraDescriptor::stub("cam-a"));
        config.cameras.push(CameraDescriptor::stub("cam-a"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_direction_policy_monitoring_alias() {
        assert_eq!(
            DirectionPolicy::Monitoring.normalized(),
            DirectionPolicy::Both
        );
        assert_eq!(DirectionPolicy::Enter.normalized(), DirectionPolicy::Enter);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let source = ConfigSource::load(None).expect("defaults must validate");
        let snapshot = source.snapshot();
        assert_eq!(snapshot, Config::default());
    }
}
