// SPDX-License-Identifier: MPL-2.0

//! Per-camera pipeline: Capture -> Detect -> Embed -> Identify -> Track ->
//! TripwireEvaluate -> Publish/Record, run as a supervised async task per
//! configured camera.
//!
//! Capture itself runs on a dedicated OS thread via
//! [`crate::backends::camera::frame_loop::CaptureLoopController`], since
//! [`crate::backends::camera::CaptureBackend::read_frame`] blocks. Frames
//! cross into async-land over a [`tokio::sync::watch`] channel (latest
//! frame only, matching the capture -> detect stage's capacity-1
//! drop-oldest policy from the data flow design). Identity is applied to
//! a track one frame after it is first associated — tripwire crossings
//! reference whatever identity the track most recently carried, which in
//! practice is set within the first few frames of a track's life.

pub mod channel;
pub mod state;

use crate::attendance::AttendanceRecorder;
use crate::backends::camera::frame_loop::{CaptureLoopController, LoopAction};
use crate::backends::camera::{backend_for, CameraFrame, CaptureBackend};
use crate::config::{CameraDescriptor, DirectionPolicy, PipelineConfig};
use crate::identity::IdentityIndex;
use crate::mjpeg::MjpegPublisher;
use crate::models::ModelRegistry;
use crate::tracking::tripwire::CrossingDirection;
use crate::tracking::TrackStore;
use rand::Rng;
use state::PipelineState;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{info, warn};

const MAX_BACKOFF: Duration = Duration::from_secs(30);

enum StopReason {
    Shutdown,
    FailureThreshold,
}

/// Cumulative counters and last-error surfaced through `FTSController::status`.
pub struct PipelineMetrics {
    pub detections_total: AtomicU64,
    pub recognitions_total: AtomicU64,
    last_error: Mutex<Option<String>>,
    started_at: Instant,
}

impl PipelineMetrics {
    fn new() -> Self {
        Self {
            detections_total: AtomicU64::new(0),
            recognitions_total: AtomicU64::new(0),
            last_error: Mutex::new(None),
            started_at: Instant::now(),
        }
    }

    fn record_error(&self, msg: String) {
        *self.last_error.lock().unwrap() = Some(msg);
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

#[derive(Clone, Copy)]
struct TrackingParams {
    iou_threshold: f32,
    expire_frames: u32,
    identify_threshold: f32,
    reid_margin: f32,
    detect_threshold: f32,
}

impl From<&PipelineConfig> for TrackingParams {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            iou_threshold: config.iou_threshold,
            expire_frames: config.expire_frames,
            identify_threshold: config.identify_threshold,
            reid_margin: config.reid_margin,
            detect_threshold: config.detect_threshold,
        }
    }
}

/// Supervises the full capture/detect/track/publish/record lifecycle for
/// one configured camera.
pub struct CameraPipeline {
    pub id: String,
    state: Arc<Mutex<PipelineState>>,
    shutdown: Arc<AtomicBool>,
    supervisor: Option<tokio::task::JoinHandle<()>>,
    metrics: Arc<PipelineMetrics>,
}

impl CameraPipeline {
    pub fn spawn(
        descriptor: CameraDescriptor,
        pipeline_config: PipelineConfig,
        models: ModelRegistry,
        identity_index: Arc<IdentityIndex>,
        recorder: Arc<AttendanceRecorder>,
        mjpeg: Arc<MjpegPublisher>,
    ) -> Self {
        let id = descriptor.id.clone();
        let state = Arc::new(Mutex::new(PipelineState::Initializing));
        let shutdown = Arc::new(AtomicBool::new(false));
        let metrics = Arc::new(PipelineMetrics::new());
        let tracking_params = TrackingParams::from(&pipeline_config);
        let tripwires = descriptor.tripwires.clone();

        let (capture_tx, capture_rx) = watch::channel::<Option<CameraFrame>>(None);

        let supervisor = tokio::spawn(run_supervisor(
            descriptor,
            pipeline_config,
            Arc::clone(&state),
            Arc::clone(&shutdown),
            Arc::clone(&metrics),
            capture_tx,
        ));

        tokio::spawn(run_processing_stage(
            capture_rx,
            models,
            identity_index,
            recorder,
            mjpeg,
            tracking_params,
            tripwires,
            id.clone(),
            Arc::clone(&metrics),
        ));

        Self { id, state, shutdown, supervisor: Some(supervisor), metrics }
    }

    pub fn state(&self) -> PipelineState {
        *self.state.lock().unwrap()
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub async fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.supervisor.take() {
            let _ = handle.await;
        }
        *self.state.lock().unwrap() = PipelineState::Stopped;
    }
}

async fn run_supervisor(
    descriptor: CameraDescriptor,
    pipeline_config: PipelineConfig,
    state: Arc<Mutex<PipelineState>>,
    shutdown: Arc<AtomicBool>,
    metrics: Arc<PipelineMetrics>,
    capture_tx: watch::Sender<Option<CameraFrame>>,
) {
    let fail_threshold_per_minute = pipeline_config.fail_threshold_per_minute.max(1);
    let mut attempt: u32 = 0;

    while !shutdown.load(Ordering::SeqCst) {
        *state.lock().unwrap() = if attempt == 0 { PipelineState::Initializing } else { PipelineState::Degraded };

        let open_descriptor = descriptor.clone();
        let open_result = tokio::task::spawn_blocking(move || {
            let mut backend = backend_for(&open_descriptor);
            backend.open().map(|_| backend).map_err(|e| e.to_string())
        })
        .await;

        let open_outcome: Result<Box<dyn CaptureBackend>, String> = match open_result {
            Ok(inner) => inner,
            Err(join_err) => Err(join_err.to_string()),
        };

        let backend = match open_outcome {
            Ok(backend) => backend,
            Err(msg) => {
                attempt += 1;
                let backoff = jittered_backoff(attempt);
                warn!(camera = %descriptor.id, error = %msg, attempt, backoff_ms = backoff.as_millis(), "capture open failed; retrying");
                metrics.record_error(msg);
                tokio::time::sleep(backoff).await;
                continue;
            }
        };

        *state.lock().unwrap() = PipelineState::Running;
        info!(camera = %descriptor.id, "capture running");

        let stop_reason: Arc<Mutex<Option<StopReason>>> = Arc::new(Mutex::new(None));
        let reason_handle = Arc::clone(&stop_reason);
        let shutdown_handle = Arc::clone(&shutdown);
        let metrics_handle = Arc::clone(&metrics);
        let capture_tx_handle = capture_tx.clone();
        let camera_id = descriptor.id.clone();
        let consecutive_failures = Arc::new(AtomicU32::new(0));
        let window_start = Arc::new(Mutex::new(Instant::now()));
        let window_failures = Arc::new(AtomicU32::new(0));

        let mut controller = CaptureLoopController::start_with_init(
            &format!("capture-{camera_id}"),
            move || Ok(backend),
            move |backend: &mut Box<dyn CaptureBackend>| {
                if shutdown_handle.load(Ordering::SeqCst) {
                    *reason_handle.lock().unwrap() = Some(StopReason::Shutdown);
                    return LoopAction::Stop;
                }

                match backend.read_frame() {
                    Ok(frame) => {
                        consecutive_failures.store(0, Ordering::SeqCst);
                        let _ = capture_tx_handle.send(Some(frame));
                        LoopAction::Continue
                    }
                    Err(e) => {
                        warn!(camera = %camera_id, error = %e, "capture read failed");
                        metrics_handle.record_error(e.to_string());
                        let consecutive = consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;

                        let mut start = window_start.lock().unwrap();
                        if start.elapsed() > Duration::from_secs(60) {
                            *start = Instant::now();
                            window_failures.store(0, Ordering::SeqCst);
                        }
                        let per_minute = window_failures.fetch_add(1, Ordering::SeqCst) + 1;

                        if consecutive >= crate::constants::DEFAULT_FAIL_THRESHOLD || per_minute > fail_threshold_per_minute {
                            *reason_handle.lock().unwrap() = Some(StopReason::FailureThreshold);
                            LoopAction::Stop
                        } else {
                            LoopAction::Continue
                        }
                    }
                }
            },
        );

        let _ = tokio::task::spawn_blocking(move || controller.join()).await;

        match stop_reason.lock().unwrap().take() {
            Some(StopReason::Shutdown) | None => break,
            Some(StopReason::FailureThreshold) => {
                attempt += 1;
                let backoff = jittered_backoff(attempt);
                warn!(camera = %descriptor.id, attempt, backoff_ms = backoff.as_millis(), "capture degraded; retrying after backoff");
                let _ = capture_tx.send(None);
                tokio::time::sleep(backoff).await;
            }
        }
    }

    *state.lock().unwrap() = PipelineState::Stopped;
}

fn jittered_backoff(attempt: u32) -> Duration {
    let base = (Duration::from_secs(1) * 2u32.saturating_pow(attempt.min(5))).min(MAX_BACKOFF);
    let jitter = rand::thread_rng().gen_range(0.5..1.5);
    Duration::from_secs_f64((base.as_secs_f64() * jitter).max(0.1))
}

#[allow(clippy::too_many_arguments)]
async fn run_processing_stage(
    mut capture_rx: watch::Receiver<Option<CameraFrame>>,
    models: ModelRegistry,
    identity_index: Arc<IdentityIndex>,
    recorder: Arc<AttendanceRecorder>,
    mjpeg: Arc<MjpegPublisher>,
    params: TrackingParams,
    tripwires: Vec<crate::config::Tripwire>,
    camera_id: String,
    metrics: Arc<PipelineMetrics>,
) {
    let mut track_store =
        TrackStore::new(params.iou_threshold, params.expire_frames, params.identify_threshold, params.reid_margin);
    let mut placeholder_ticker =
        tokio::time::interval(Duration::from_secs_f64(1.0 / crate::constants::DEFAULT_PLACEHOLDER_HZ as f64));

    loop {
        let frame = tokio::select! {
            changed = capture_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                match capture_rx.borrow_and_update().clone() {
                    Some(frame) => frame,
                    None => continue,
                }
            }
            _ = placeholder_ticker.tick() => {
                // No real frame arrived since the last tick: synthesize a
                // "no signal" placeholder so subscribers keep seeing
                // something while the capture backend is degraded.
                if capture_rx.borrow().is_none() {
                    mjpeg.publish_placeholder();
                }
                continue;
            }
        };

        let Some(rgb) = frame.to_rgb24() else {
            warn!(camera = %camera_id, "frame could not be converted to RGB24");
            continue;
        };

        let detections = match models.detect(&rgb, frame.width, frame.height) {
            Ok(detections) => detections
                .into_iter()
                .filter(|d| d.confidence >= params.detect_threshold)
                .collect::<Vec<_>>(),
            Err(e) => {
                warn!(camera = %camera_id, error = %e, "detect inference failed");
                metrics.record_error(e.to_string());
                continue;
            }
        };
        metrics.detections_total.fetch_add(detections.len() as u64, Ordering::Relaxed);

        let events = track_store.update(&detections, &tripwires, frame.width, frame.height);

        let active: Vec<(u64, crate::models::Detection)> =
            track_store.active_tracks().map(|t| (t.id, t.last_box)).collect();
        for (track_id, last_box) in active {
            match models.embed(&rgb, frame.width, frame.height, &last_box) {
                Ok(embedding) => {
                    if let Some(identity_match) = identity_index.query(&embedding, 1).into_iter().next() {
                        let accepted =
                            track_store.apply_identity(track_id, &identity_match.employee_id, identity_match.similarity);
                        if accepted {
                            metrics.recognitions_total.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
                Err(e) => {
                    warn!(camera = %camera_id, error = %e, "embed inference failed");
                    metrics.record_error(e.to_string());
                }
            }
        }

        for event in events {
            let Some(employee_id) = event.identity else { continue };
            let now_ms = chrono::Utc::now().timestamp_millis();
            let direction = match event.direction {
                CrossingDirection::Enter => DirectionPolicy::Enter,
                CrossingDirection::Exit => DirectionPolicy::Exit,
            };
            if let Err(e) = recorder.record(&employee_id, &camera_id, &event.tripwire_id, direction, now_ms).await {
                metrics.record_error(e.to_string());
                warn!(camera = %camera_id, error = %e, "attendance record failed");
            }
        }

        mjpeg.publish(&frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jittered_backoff_grows_and_caps() {
        let small = jittered_backoff(0);
        let large = jittered_backoff(10);
        assert!(small <= Duration::from_secs(2));
        assert!(large <= MAX_BACKOFF + Duration::from_secs(1));
    }

    #[test]
    fn test_tracking_params_from_pipeline_config() {
        let config = PipelineConfig::default();
        let params = TrackingParams::from(&config);
        assert_eq!(params.iou_threshold, config.iou_threshold);
    }
}
