// SPDX-License-Identifier: MPL-2.0

//! Face embedder trait and deterministic stub implementation

use super::detector::Detection;
use crate::errors::ModelError;

/// A unit-norm embedding vector. Cosine similarity between two
/// [`Embedding`]s reduces to a plain dot product once both are unit-norm.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding(pub Vec<f32>);

impl Embedding {
    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        debug_assert_eq!(self.0.len(), other.0.len());
        self.0.iter().zip(other.0.iter()).map(|(a, b)| a * b).sum()
    }

    fn normalize(mut values: Vec<f32>) -> Self {
        let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in values.iter_mut() {
                *v /= norm;
            }
        }
        Embedding(values)
    }
}

/// Produces an embedding vector for a detected face crop.
pub trait FaceEmbedder: Send {
    fn embed(
        &self,
        rgb: &[u8],
        width: u32,
        height: u32,
        detection: &Detection,
    ) -> Result<Embedding, ModelError>;
}

/// Deterministic stand-in embedder: hashes the mean color of the detection
/// crop into a fixed-dimension vector via a simple feature-hashing scheme,
/// then unit-normalizes. Two crops with similar mean color land close in
/// cosine distance, which is enough to exercise identify/re-id logic
/// against the stub detector's synthetic marker without a real model.
pub struct StubEmbedder {
    dimension: usize,
}

impl StubEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension: dimension.max(1) }
    }
}

impl FaceEmbedder for StubEmbedder {
    fn embed(
        &self,
        rgb: &[u8],
        width: u32,
        height: u32,
        detection: &Detection,
    ) -> Result<Embedding, ModelError> {
        if rgb.len() != (width * height * 3) as usize {
            return Err(ModelError::Inference(format!(
                "buffer length {} does not match {}x{} RGB24",
                rgb.len(),
                width,
                height
            )));
        }

        let x0 = (detection.x.max(0.0) as u32).min(width.saturating_sub(1));
        let y0 = (detection.y.max(0.0) as u32).min(height.saturating_sub(1));
        let x1 = ((detection.x + detection.width) as u32).min(width).max(x0 + 1);
        let y1 = ((detection.y + detection.height) as u32).min(height).max(y0 + 1);

        let mut features = vec![0f64; self.dimension];
        let mut count = 0u64;

        for y in y0..y1 {
            for x in x0..x1 {
                let idx = ((y * width + x) * 3) as usize;
                let (r, g, b) = (rgb[idx] as u64, rgb[idx + 1] as u64, rgb[idx + 2] as u64);
                let bucket = ((r * 31 + g * 17 + b * 7) as usize) % self.dimension;
                features[bucket] += 1.0;
                count += 1;
            }
        }

        if count == 0 {
            return Err(ModelError::Inference("empty detection crop".to_string()));
        }

        let values: Vec<f32> = features.iter().map(|v| (*v / count as f64) as f32).collect();
        Ok(Embedding::normalize(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, color: (u8, u8, u8)) -> Vec<u8> {
        let mut buf = vec![0u8; (width * height * 3) as usize];
        for px in buf.chunks_mut(3) {
            px[0] = color.0;
            px[1] = color.1;
            px[2] = color.2;
        }
        buf
    }

    #[test]
    fn test_embedding_is_unit_norm() {
        let embedder = StubEmbedder::new(16);
        let frame = solid_frame(32, 32, (200, 100, 50));
        let detection = Detection { x: 0.0, y: 0.0, width: 32.0, height: 32.0, confidence: 1.0 };
        let embedding = embedder.embed(&frame, 32, 32, &detection).unwrap();
        let norm: f32 = embedding.0.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4 || norm == 0.0);
    }

    #[test]
    fn test_identical_crops_yield_identical_embeddings() {
        let embedder = StubEmbedder::new(16);
        let frame = solid_frame(32, 32, (10, 200, 30));
        let detection = Detection { x: 0.0, y: 0.0, width: 32.0, height: 32.0, confidence: 1.0 };
        let a = embedder.embed(&frame, 32, 32, &detection).unwrap();
        let b = embedder.embed(&frame, 32, 32, &detection).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_colors_are_less_similar_than_identical() {
        let embedder = StubEmbedder::new(32);
        let detection = Detection { x: 0.0, y: 0.0, width: 32.0, height: 32.0, confidence: 1.0 };
        let frame_a = solid_frame(32, 32, (255, 0, 0));
        let frame_b = solid_frame(32, 32, (0, 0, 255));
        let a1 = embedder.embed(&frame_a, 32, 32, &detection).unwrap();
        let a2 = embedder.embed(&frame_a, 32, 32, &detection).unwrap();
        let b = embedder.embed(&frame_b, 32, 32, &detection).unwrap();
        assert!(a1.cosine_similarity(&a2) >= a1.cosine_similarity(&b));
    }
}
