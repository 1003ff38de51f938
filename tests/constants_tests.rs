// SPDX-License-Identifier: MPL-2.0

//! Integration tests for shared default tunables

use facetrack_fts::constants::*;

#[test]
fn test_thresholds_are_within_unit_range() {
    assert!(DEFAULT_DETECT_THRESHOLD > 0.0 && DEFAULT_DETECT_THRESHOLD < 1.0);
    assert!(DEFAULT_IDENTIFY_THRESHOLD > 0.0 && DEFAULT_IDENTIFY_THRESHOLD < 1.0);
    assert!(DEFAULT_IOU_THRESHOLD > 0.0 && DEFAULT_IOU_THRESHOLD < 1.0);
}

#[test]
fn test_reid_margin_raises_the_bar_above_identify_threshold() {
    assert!(DEFAULT_IDENTIFY_THRESHOLD + DEFAULT_REID_MARGIN <= 1.0);
}

#[test]
fn test_failure_thresholds_are_positive() {
    assert!(DEFAULT_FAIL_THRESHOLD > 0);
    assert!(DEFAULT_FAIL_THRESHOLD_PER_MINUTE > 0);
}

#[test]
fn test_network_discovery_defaults() {
    assert!(!DISCOVER_NETWORK_PORTS.is_empty());
    assert!(DISCOVER_NETWORK_FANOUT > 0);
    assert!(DISCOVER_LOCAL_DEVICE_COUNT > 0);
}
