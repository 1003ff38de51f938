// SPDX-License-Identifier: MPL-2.0

//! Local V4L2 device enumeration

use crate::backends::camera::v4l2_utils::probe_local_device;
use crate::config::SourceKind;

#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredLocalDevice {
    pub index: u32,
    pub driver: String,
    pub card: String,
    pub source: SourceKind,
    /// `(width, height)` the device currently reports, when probed
    pub resolution: Option<(u32, u32)>,
    /// Frames per second the device currently reports, when probed
    pub fps: Option<f32>,
    /// Whether the device answered its capability probe
    pub reachable: bool,
    pub probed_at_unix_ms: i64,
}

/// Probe `/dev/video0` through `/dev/video{count - 1}`, returning only the
/// indices that answer a `VIDIOC_QUERYCAP` ioctl. Index 0 is reported as
/// the machine's builtin camera by convention; every other answering index
/// is a USB camera.
pub fn discover_local_devices(count: usize) -> Vec<DiscoveredLocalDevice> {
    (0..count as u32)
        .filter_map(|index| {
            probe_local_device(index).map(|info| DiscoveredLocalDevice {
                index,
                driver: info.driver,
                card: info.card,
                source: if index == 0 { SourceKind::Builtin { index } } else { SourceKind::Usb { index } },
                resolution: info.resolution,
                fps: info.fps,
                reachable: true,
                probed_at_unix_ms: chrono::Utc::now().timestamp_millis(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_local_devices_does_not_panic_without_hardware() {
        let devices = discover_local_devices(2);
        assert!(devices.len() <= 2);
    }

    #[test]
    fn test_discover_local_devices_marks_index_zero_builtin() {
        let devices = discover_local_devices(1);
        if let Some(device) = devices.first() {
            assert!(matches!(device.source, SourceKind::Builtin { index: 0 }));
        }
    }
}
