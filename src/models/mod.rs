// SPDX-License-Identifier: MPL-2.0

//! Face detector / embedder model registry
//!
//! The detector and embedder are treated as opaque, pre-trained inference
//! engines loaded once at startup (no training support in this crate).
//! Both are trait objects behind a small fixed-size pool, because
//! inference engines are not assumed to be internally thread-safe — the
//! same pattern [`crate::backends::camera::frame_loop`] uses for capture
//! threads, applied here to a shared resource pool instead of a single
//! thread.

pub mod detector;
pub mod embedder;
pub mod pool;

pub use detector::{Detection, FaceDetector, StubDetector};
pub use embedder::{Embedding, FaceEmbedder, StubEmbedder};

use crate::config::ModelPaths;
use crate::errors::ModelError;
use pool::InferencePool;
use std::sync::Arc;
use tracing::info;

/// Holds the shared detector and embedder pools for the whole process.
#[derive(Clone)]
pub struct ModelRegistry {
    detectors: Arc<InferencePool<Box<dyn FaceDetector>>>,
    embedders: Arc<InferencePool<Box<dyn FaceEmbedder>>>,
    pub embedding_dimension: usize,
}

impl ModelRegistry {
    /// Load the configured models, or fall back to the deterministic stubs
    /// when no path is configured. `worker_count` sizes both pools.
    pub fn load(
        paths: &ModelPaths,
        embedding_dimension: usize,
        worker_count: usize,
    ) -> Result<Self, ModelError> {
        let worker_count = worker_count.max(1);

        let detectors: Vec<Box<dyn FaceDetector>> = (0..worker_count)
            .map(|_| -> Result<Box<dyn FaceDetector>, ModelError> {
                match &paths.detector_path {
                    None => Ok(Box::new(StubDetector::default())),
                    Some(path) => Err(ModelError::Load(format!(
                        "no built-in detector backend for {}; configure a stub-compatible path or leave detector_path unset",
                        path.display()
                    ))),
                }
            })
            .collect::<Result<_, _>>()?;

        let embedders: Vec<Box<dyn FaceEmbedder>> = (0..worker_count)
            .map(|_| -> Result<Box<dyn FaceEmbedder>, ModelError> {
                match &paths.embedder_path {
                    None => Ok(Box::new(StubEmbedder::new(embedding_dimension))),
                    Some(path) => Err(ModelError::Load(format!(
                        "no built-in embedder backend for {}; configure a stub-compatible path or leave embedder_path unset",
                        path.display()
                    ))),
                }
            })
            .collect::<Result<_, _>>()?;

        info!(workers = worker_count, dimension = embedding_dimension, "model registry loaded");

        Ok(Self {
            detectors: Arc::new(InferencePool::new(detectors)),
            embedders: Arc::new(InferencePool::new(embedders)),
            embedding_dimension,
        })
    }

    pub fn detect(&self, rgb: &[u8], width: u32, height: u32) -> Result<Vec<Detection>, ModelError> {
        self.detectors.with(|detector| detector.detect(rgb, width, height))
    }

    pub fn embed(&self, rgb: &[u8], width: u32, height: u32, detection: &Detection) -> Result<Embedding, ModelError> {
        self.embedders.with(|embedder| embedder.embed(rgb, width, height, detection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_loads_stub_by_default() {
        let registry = ModelRegistry::load(&ModelPaths::default(), 128, 2).unwrap();
        assert_eq!(registry.embedding_dimension, 128);
    }

    #[test]
    fn test_registry_worker_count_clamped_to_one() {
        let registry = ModelRegistry::load(&ModelPaths::default(), 128, 0).unwrap();
        let rgb = vec![0u8; 32 * 32 * 3];
        assert!(registry.detect(&rgb, 32, 32).is_ok());
    }
}
