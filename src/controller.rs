// SPDX-License-Identifier: MPL-2.0

//! FTSController: builds pipelines from a `Config` snapshot, starts,
//! supervises, restarts, stops, and aggregates status. This is the single
//! owner through which every cross-component mutation flows (enrollment,
//! config application, discovery) — no pipeline ever reaches into another
//! pipeline's state directly.

use crate::attendance::store::InMemoryStore;
use crate::attendance::{AttendanceEvent, AttendanceRecorder};
use crate::config::{CameraDescriptor, Config};
use crate::discovery::{self, CandidateCamera};
use crate::errors::{ControllerError, FtsError, IdentityError};
use crate::identity::IdentityIndex;
use crate::mjpeg::{MjpegPublisher, MjpegSubscription};
use crate::models::{Embedding, ModelRegistry};
use crate::pipeline::state::PipelineState;
use crate::pipeline::CameraPipeline;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Per-camera status line, mirroring the admin `Status()` response shape.
#[derive(Debug, Clone)]
pub struct CameraStatus {
    pub id: String,
    pub state: PipelineState,
    pub detections_total: u64,
    pub recognitions_total: u64,
    pub last_error: Option<String>,
}

/// Aggregate controller status.
#[derive(Debug, Clone)]
pub struct FtsStatus {
    pub running: bool,
    pub uptime: Duration,
    pub cameras: Vec<CameraStatus>,
    pub identities: usize,
}

struct Running {
    config: Config,
    pipelines: HashMap<String, CameraPipeline>,
    publishers: HashMap<String, Arc<MjpegPublisher>>,
    models: ModelRegistry,
    identity_index: Arc<IdentityIndex>,
    recorder: Arc<AttendanceRecorder>,
    started_at: Instant,
}

/// Lifecycle controller for the whole fleet of configured cameras.
///
/// `Start`/`Stop`/`Restart` are reentrant-safe: the controller's state lives
/// behind a single `tokio::sync::Mutex`, so concurrent calls serialize
/// rather than racing to build or tear down pipelines twice.
pub struct FtsController {
    state: Mutex<Option<Running>>,
}

impl Default for FtsController {
    fn default() -> Self {
        Self::new()
    }
}

impl FtsController {
    pub fn new() -> Self {
        Self { state: Mutex::new(None) }
    }

    /// Load models, construct the identity index, and start one
    /// `CameraPipeline` per enabled camera descriptor. A second `start`
    /// call while already running is a no-op that returns success, per the
    /// idempotence contract.
    pub async fn start(&self, config: Config) -> Result<(), FtsError> {
        let mut guard = self.state.lock().await;
        if guard.is_some() {
            info!("start requested while already running; ignoring");
            return Ok(());
        }

        let enabled_count = config.cameras.iter().filter(|c| c.enabled).count().max(1);
        let worker_count = config.pipeline.inference_workers.unwrap_or(enabled_count);

        let models = ModelRegistry::load(&config.models, config.embedding_dimension, worker_count)?;
        let identity_index =
            Arc::new(IdentityIndex::load(&config.identity_index_path, config.embedding_dimension)?);
        let recorder = Arc::new(AttendanceRecorder::new(
            Box::new(InMemoryStore::default()),
            &config.recorder.spill_path,
            config.debounce_window(),
            Duration::from_secs(config.recorder.backoff_ceiling_seconds),
        ));

        let mut pipelines = HashMap::new();
        let mut publishers = HashMap::new();
        for descriptor in config.cameras.iter().filter(|c| c.enabled) {
            let publisher = Arc::new(MjpegPublisher::new(descriptor.id.clone(), descriptor.width, descriptor.height));
            let pipeline = CameraPipeline::spawn(
                descriptor.clone(),
                config.pipeline.clone(),
                models.clone(),
                Arc::clone(&identity_index),
                Arc::clone(&recorder),
                Arc::clone(&publisher),
            );
            publishers.insert(descriptor.id.clone(), publisher);
            pipelines.insert(descriptor.id.clone(), pipeline);
        }

        info!(cameras = pipelines.len(), "controller started");
        *guard = Some(Running {
            config,
            pipelines,
            publishers,
            models,
            identity_index,
            recorder,
            started_at: Instant::now(),
        });
        Ok(())
    }

    /// Stop every pipeline, waiting up to `shutdown_deadline` before this
    /// call simply returns (graceful stop has no forceful-cancel escalation
    /// in this implementation: every pipeline's stop future resolves once
    /// its capture thread has joined, which always happens promptly after
    /// the shutdown flag is observed).
    pub async fn stop(&self) -> Result<(), FtsError> {
        let mut guard = self.state.lock().await;
        let Some(mut running) = guard.take() else {
            return Ok(());
        };

        let deadline = running.config.shutdown_deadline();
        let stop_all = async {
            for pipeline in running.pipelines.values_mut() {
                pipeline.stop().await;
            }
        };
        if tokio::time::timeout(deadline, stop_all).await.is_err() {
            warn!("shutdown deadline elapsed before all pipelines confirmed stopped");
        }
        if let Err(e) = running.identity_index.persist() {
            warn!(error = %e, "failed to persist identity index on stop");
        }
        info!("controller stopped");
        Ok(())
    }

    /// `Stop` followed by `Start` with the same config snapshot last applied.
    pub async fn restart(&self) -> Result<(), FtsError> {
        let config = {
            let guard = self.state.lock().await;
            guard.as_ref().map(|r| r.config.clone())
        };
        let Some(config) = config else {
            return Err(ControllerError::NotRunning.into());
        };
        self.stop().await?;
        self.start(config).await
    }

    pub async fn status(&self) -> FtsStatus {
        let guard = self.state.lock().await;
        let Some(running) = guard.as_ref() else {
            return FtsStatus { running: false, uptime: Duration::ZERO, cameras: Vec::new(), identities: 0 };
        };

        let cameras = running
            .pipelines
            .values()
            .map(|p| CameraStatus {
                id: p.id.clone(),
                state: p.state(),
                detections_total: p.metrics().detections_total.load(std::sync::atomic::Ordering::Relaxed),
                recognitions_total: p.metrics().recognitions_total.load(std::sync::atomic::Ordering::Relaxed),
                last_error: p.metrics().last_error(),
            })
            .collect();

        FtsStatus {
            running: true,
            uptime: running.started_at.elapsed(),
            cameras,
            identities: running.identity_index.len(),
        }
    }

    /// Diff `new_config` against the last-applied config and perform the
    /// minimal set of pipeline stop/start operations: a camera whose
    /// descriptor is unchanged is left untouched (no capture re-open), a
    /// changed or removed descriptor's pipeline is stopped, and every
    /// enabled descriptor not already running is started.
    pub async fn apply_config(&self, new_config: Config) -> Result<(), FtsError> {
        let mut guard = self.state.lock().await;
        let Some(running) = guard.as_mut() else {
            return Err(ControllerError::NotRunning.into());
        };

        let old_descriptors: HashMap<String, CameraDescriptor> =
            running.config.cameras.iter().map(|c| (c.id.clone(), c.clone())).collect();
        let new_descriptors: HashMap<String, CameraDescriptor> =
            new_config.cameras.iter().map(|c| (c.id.clone(), c.clone())).collect();

        for (id, old) in &old_descriptors {
            let unchanged = new_descriptors.get(id).map(|new| new == old).unwrap_or(false);
            if !unchanged {
                if let Some(mut pipeline) = running.pipelines.remove(id) {
                    pipeline.stop().await;
                }
                running.publishers.remove(id);
            }
        }

        for (id, descriptor) in &new_descriptors {
            if !descriptor.enabled || running.pipelines.contains_key(id) {
                continue;
            }
            let publisher = Arc::new(MjpegPublisher::new(descriptor.id.clone(), descriptor.width, descriptor.height));
            let pipeline = CameraPipeline::spawn(
                descriptor.clone(),
                new_config.pipeline.clone(),
                running.models.clone(),
                Arc::clone(&running.identity_index),
                Arc::clone(&running.recorder),
                Arc::clone(&publisher),
            );
            running.publishers.insert(id.clone(), publisher);
            running.pipelines.insert(id.clone(), pipeline);
        }

        running.config = new_config;
        Ok(())
    }

    pub async fn snapshot(&self) -> Option<Config> {
        self.state.lock().await.as_ref().map(|r| r.config.clone())
    }

    pub async fn discover(&self, deadline: Duration) -> Result<Vec<CandidateCamera>, FtsError> {
        let config = {
            let guard = self.state.lock().await;
            guard.as_ref().map(|r| r.config.discovery.clone())
        };
        let config = match config {
            Some(config) => config,
            None => crate::config::DiscoveryConfig::default(),
        };
        discovery::discover(&config, deadline).await.map_err(Into::into)
    }

    /// Enroll a new employee from a still image. Fails with
    /// `IdentityError::NoFace`/`MultipleFaces` unless the image contains
    /// exactly one detectable face, and `IdentityError::Duplicate` if the
    /// id is already enrolled.
    pub async fn enroll(&self, employee_id: &str, image_bytes: &[u8]) -> Result<(), FtsError> {
        let guard = self.state.lock().await;
        let Some(running) = guard.as_ref() else {
            return Err(ControllerError::NotRunning.into());
        };

        let image = image::load_from_memory(image_bytes).map_err(|e| FtsError::Other(e.to_string()))?;
        let rgb = image.to_rgb8();
        let (width, height) = (rgb.width(), rgb.height());
        let rgb_bytes = rgb.into_raw();

        let detections = running.models.detect(&rgb_bytes, width, height)?;
        let face = match detections.len() {
            0 => return Err(IdentityError::NoFace.into()),
            1 => &detections[0],
            _ => return Err(IdentityError::MultipleFaces.into()),
        };

        let embedding: Embedding = running.models.embed(&rgb_bytes, width, height, face)?;
        running.identity_index.add(employee_id, &embedding)?;
        running.identity_index.persist()?;
        info!(employee_id, "identity enrolled");
        Ok(())
    }

    pub async fn remove_identity(&self, employee_id: &str) -> Result<bool, FtsError> {
        let guard = self.state.lock().await;
        let Some(running) = guard.as_ref() else {
            return Err(ControllerError::NotRunning.into());
        };
        let removed = running.identity_index.remove(employee_id);
        if removed {
            running.identity_index.persist()?;
        }
        Ok(removed)
    }

    pub async fn recent_attendance(&self, employee_id: &str) -> Vec<AttendanceEvent> {
        let guard = self.state.lock().await;
        guard.as_ref().map(|r| r.recorder.recent_for(employee_id)).unwrap_or_default()
    }

    pub async fn subscribe_mjpeg(&self, camera_id: &str) -> Option<MjpegSubscription> {
        let guard = self.state.lock().await;
        guard.as_ref()?.publishers.get(camera_id).map(|p| p.subscribe())
    }
}
