// SPDX-License-Identifier: MPL-2.0

//! Service-wide default constants
//!
//! These mirror the configuration key table in the specification; every
//! value here is the default used when the corresponding
//! [`crate::config::Config`] field is not overridden.

use std::time::Duration;

/// Local USB/builtin device indices probed during discovery, `0..K`
pub const DISCOVER_LOCAL_DEVICE_COUNT: usize = 10;

/// Bounded fan-out for concurrent network discovery probes
pub const DISCOVER_NETWORK_FANOUT: usize = 50;

/// Ports probed during network discovery
pub const DISCOVER_NETWORK_PORTS: [u16; 4] = [80, 554, 8080, 8554];

/// Per-target timeout for network discovery probes
pub const DISCOVER_PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Minimum detector confidence for a detection to proceed to embedding
pub const DEFAULT_DETECT_THRESHOLD: f32 = 0.5;

/// Minimum identification score for a match to be accepted
pub const DEFAULT_IDENTIFY_THRESHOLD: f32 = 0.6;

/// Additional margin above `identify.threshold` required to override a
/// track's sticky identity with a different one
pub const DEFAULT_REID_MARGIN: f32 = 0.15;

/// IoU threshold for greedy detection-to-track association
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.3;

/// Frames without an association before a track is aged out
pub const DEFAULT_EXPIRE_FRAMES: u32 = 30;

/// Consecutive per-frame failures before a pipeline is considered degraded
pub const DEFAULT_FAIL_THRESHOLD: u32 = 30;

/// Per-minute error ceiling before a pipeline is promoted to `Degraded`
pub const DEFAULT_FAIL_THRESHOLD_PER_MINUTE: u32 = 60;

/// Debounce window for the attendance recorder
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_secs(300);

/// Deadline for graceful pipeline shutdown before forceful cancellation
pub const DEFAULT_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);

/// Rate at which the MJPEG publisher emits a placeholder frame when idle
pub const DEFAULT_PLACEHOLDER_HZ: u32 = 1;

/// Per-subscriber MJPEG channel depth (drop-oldest on overflow)
pub const DEFAULT_MJPEG_SUBSCRIBER_BUFFER: usize = 1;

/// Capture -> Detect channel capacity (drop-oldest backpressure)
pub const CAPTURE_CHANNEL_CAPACITY: usize = 1;

/// Detect -> {Publish, Record} channel capacity
pub const DETECT_FANOUT_CHANNEL_CAPACITY: usize = 4;

/// Embedding dimension produced by the configured embedding model
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 128;

/// Index size above which an approximate nearest-neighbor structure should
/// be preferred over a flat scan
pub const FLAT_SCAN_MAX_SIZE: usize = 5_000;

/// `ConfigSource::Watch` poll interval for the backing file's mtime
pub const DEFAULT_CONFIG_RELOAD_INTERVAL: Duration = Duration::from_millis(2_000);
