// SPDX-License-Identifier: MPL-2.0

//! Face detector trait and deterministic stub implementation

use crate::errors::ModelError;

/// A bounding box detection with a detector confidence score in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl Detection {
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Intersection-over-union against another detection's box.
    pub fn iou(&self, other: &Detection) -> f32 {
        let ax2 = self.x + self.width;
        let ay2 = self.y + self.height;
        let bx2 = other.x + other.width;
        let by2 = other.y + other.height;

        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = ax2.min(bx2);
        let iy2 = ay2.min(by2);

        let iw = (ix2 - ix1).max(0.0);
        let ih = (iy2 - iy1).max(0.0);
        let intersection = iw * ih;
        if intersection <= 0.0 {
            return 0.0;
        }

        let area_a = self.width * self.height;
        let area_b = other.width * other.height;
        let union = area_a + area_b - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

/// Detects faces in an RGB24 frame buffer.
///
/// Implementations are expected to be reusable across many calls but are
/// not required to be `Sync` — the caller serializes access through
/// [`super::pool::InferencePool`].
pub trait FaceDetector: Send {
    fn detect(&self, rgb: &[u8], width: u32, height: u32) -> Result<Vec<Detection>, ModelError>;
}

/// Deterministic stand-in detector used when no real model is configured.
///
/// Scans for the bright "face marker" square that
/// [`crate::backends::camera::stub_backend::StubCaptureBackend`] paints
/// into synthetic frames, by locating the bounding box of pixels whose
/// channels all exceed [`Self::BRIGHTNESS_THRESHOLD`]. Real camera frames
/// rarely contain such a uniformly bright patch, so this naturally
/// produces zero detections against non-synthetic input.
#[derive(Default)]
pub struct StubDetector;

impl StubDetector {
    const BRIGHTNESS_THRESHOLD: u8 = 200;
    const MIN_PATCH: u32 = 8;
}

impl FaceDetector for StubDetector {
    fn detect(&self, rgb: &[u8], width: u32, height: u32) -> Result<Vec<Detection>, ModelError> {
        if rgb.len() != (width * height * 3) as usize {
            return Err(ModelError::Inference(format!(
                "buffer length {} does not match {}x{} RGB24",
                rgb.len(),
                width,
                height
            )));
        }

        let (mut min_x, mut min_y, mut max_x, mut max_y) = (width, height, 0u32, 0u32);
        let mut found = false;

        for y in 0..height {
            for x in 0..width {
                let idx = ((y * width + x) * 3) as usize;
                let (r, g, b) = (rgb[idx], rgb[idx + 1], rgb[idx + 2]);
                if r > Self::BRIGHTNESS_THRESHOLD
                    && g > Self::BRIGHTNESS_THRESHOLD - 20
                    && b > Self::BRIGHTNESS_THRESHOLD - 40
                {
                    found = true;
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                }
            }
        }

        if !found || max_x.saturating_sub(min_x) < Self::MIN_PATCH {
            return Ok(Vec::new());
        }

        Ok(vec![Detection {
            x: min_x as f32,
            y: min_y as f32,
            width: (max_x - min_x) as f32,
            height: (max_y - min_y) as f32,
            confidence: 0.95,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_iou_full_overlap() {
        let a = Detection { x: 0.0, y: 0.0, width: 10.0, height: 10.0, confidence: 1.0 };
        assert_eq!(a.iou(&a), 1.0);
    }

    #[test]
    fn test_detection_iou_disjoint() {
        let a = Detection { x: 0.0, y: 0.0, width: 10.0, height: 10.0, confidence: 1.0 };
        let b = Detection { x: 100.0, y: 100.0, width: 10.0, height: 10.0, confidence: 1.0 };
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_stub_detector_finds_bright_patch() {
        let width = 64u32;
        let height = 64u32;
        let mut rgb = vec![0u8; (width * height * 3) as usize];
        for y in 20..40 {
            for x in 20..40 {
                let idx = ((y * width + x) * 3) as usize;
                rgb[idx] = 230;
                rgb[idx + 1] = 200;
                rgb[idx + 2] = 180;
            }
        }
        let detector = StubDetector::default();
        let detections = detector.detect(&rgb, width, height).unwrap();
        assert_eq!(detections.len(), 1);
        assert!(detections[0].width >= 15.0);
    }

    #[test]
    fn test_stub_detector_empty_on_dark_frame() {
        let width = 32u32;
        let height = 32u32;
        let rgb = vec![0u8; (width * height * 3) as usize];
        let detector = StubDetector::default();
        assert!(detector.detect(&rgb, width, height).unwrap().is_empty());
    }

    #[test]
    fn test_stub_detector_rejects_mismatched_buffer() {
        let detector = StubDetector::default();
        assert!(detector.detect(&[0u8; 10], 32, 32).is_err());
    }
}
