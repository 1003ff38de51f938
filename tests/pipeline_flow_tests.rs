// SPDX-License-Identifier: MPL-2.0

//! End-to-end tests driving a full stub camera pipeline through the
//! controller: capture -> detect -> track -> identify -> record.

use facetrack_fts::config::{CameraDescriptor, Config, DirectionPolicy, Orientation, SourceKind, Tripwire};
use facetrack_fts::controller::FtsController;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

fn scratch_path(name: &str) -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("fts-e2e-{}-{}-{}", std::process::id(), n, name))
}

/// A still image whose every pixel matches the stub capture backend's
/// synthetic face-marker color, so it detects and embeds the same way a
/// live stub frame's marker crop does.
fn marker_still_png() -> Vec<u8> {
    let image = image::RgbImage::from_pixel(64, 64, image::Rgb([230, 200, 180]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

fn stub_camera_config(camera_id: &str) -> Config {
    let mut config = Config::default();
    config.cameras.push(CameraDescriptor {
        id: camera_id.to_string(),
        source: SourceKind::Stub,
        width: 640,
        height: 480,
        fps: 200,
        enabled: true,
        location: None,
        tripwires: vec![Tripwire {
            id: "line".to_string(),
            name: "door".to_string(),
            orientation: Orientation::Vertical,
            position: 0.5,
            spacing: 0.05,
            direction: DirectionPolicy::Both,
        }],
    });
    config.identity_index_path = scratch_path("identities.idx");
    config.recorder.spill_path = scratch_path("spill.ndjson");
    config
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_enroll_then_pipeline_identifies_and_records_crossing() {
    let config = stub_camera_config("cam-a");
    let controller = FtsController::new();
    controller.start(config).await.unwrap();

    controller.enroll("E001", &marker_still_png()).await.unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    let mut events = Vec::new();
    while tokio::time::Instant::now() < deadline {
        events = controller.recent_attendance("E001").await;
        if !events.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    assert!(!events.is_empty(), "expected at least one attendance event for E001");
    assert_eq!(events[0].tripwire_id, "line");

    let status = controller.status().await;
    assert_eq!(status.identities, 1);
    let camera = status.cameras.iter().find(|c| c.id == "cam-a").unwrap();
    assert!(camera.detections_total > 0);
    assert!(camera.recognitions_total > 0);

    controller.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unidentified_face_never_produces_attendance_event() {
    let config = stub_camera_config("cam-b");
    let controller = FtsController::new();
    controller.start(config).await.unwrap();

    // Let several crossings happen without ever enrolling anyone.
    tokio::time::sleep(Duration::from_millis(800)).await;

    let status = controller.status().await;
    let camera = status.cameras.iter().find(|c| c.id == "cam-b").unwrap();
    assert!(camera.detections_total > 0, "stub marker should still be detected");
    assert_eq!(camera.recognitions_total, 0, "no identity is enrolled to match against");
    assert!(controller.recent_attendance("someone").await.is_empty());

    controller.stop().await.unwrap();
}

#[tokio::test]
async fn test_apply_config_hot_swaps_cameras_without_disturbing_untouched_ones() {
    let mut config = stub_camera_config("cam-a");
    config.cameras.push(CameraDescriptor::stub("cam-b"));

    let controller = FtsController::new();
    controller.start(config.clone()).await.unwrap();

    let mut next = config.clone();
    next.cameras.retain(|c| c.id != "cam-b");
    next.cameras.push(CameraDescriptor::stub("cam-c"));
    controller.apply_config(next).await.unwrap();

    let status = controller.status().await;
    let ids: Vec<&str> = status.cameras.iter().map(|c| c.id.as_str()).collect();
    assert!(ids.contains(&"cam-a"));
    assert!(ids.contains(&"cam-c"));
    assert!(!ids.contains(&"cam-b"));

    controller.stop().await.unwrap();
}
