// SPDX-License-Identifier: MPL-2.0

//! Greedy IoU-based detection-to-track association
//!
//! Matches detections against existing tracks by descending IoU,
//! accepting each pairing the first time both sides are still free. This
//! is the bipartite-matching shortcut real-time trackers lean on instead
//! of the Hungarian algorithm: cheap, deterministic, and close enough for
//! video frame rates.

use crate::models::Detection;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Association {
    pub detection_index: usize,
    pub track_index: usize,
    pub iou: f32,
}

/// Greedily pairs detections with tracks above `threshold`, highest IoU
/// first. Returns the chosen pairs plus the leftover detection/track
/// indices that found no match.
pub fn associate(
    detections: &[Detection],
    track_boxes: &[Detection],
    threshold: f32,
) -> (Vec<Association>, Vec<usize>, Vec<usize>) {
    let mut candidates: Vec<Association> = Vec::new();
    for (di, detection) in detections.iter().enumerate() {
        for (ti, track_box) in track_boxes.iter().enumerate() {
            let iou = detection.iou(track_box);
            if iou >= threshold {
                candidates.push(Association { detection_index: di, track_index: ti, iou });
            }
        }
    }
    candidates.sort_by(|a, b| b.iou.total_cmp(&a.iou));

    let mut used_detections = vec![false; detections.len()];
    let mut used_tracks = vec![false; track_boxes.len()];
    let mut accepted = Vec::new();

    for candidate in candidates {
        if used_detections[candidate.detection_index] || used_tracks[candidate.track_index] {
            continue;
        }
        used_detections[candidate.detection_index] = true;
        used_tracks[candidate.track_index] = true;
        accepted.push(candidate);
    }

    let unmatched_detections: Vec<usize> = (0..detections.len()).filter(|i| !used_detections[*i]).collect();
    let unmatched_tracks: Vec<usize> = (0..track_boxes.len()).filter(|i| !used_tracks[*i]).collect();

    (accepted, unmatched_detections, unmatched_tracks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: f32, y: f32, w: f32, h: f32) -> Detection {
        Detection { x, y, width: w, height: h, confidence: 1.0 }
    }

    #[test]
    fn test_associate_exact_overlap() {
        let detections = vec![det(0.0, 0.0, 10.0, 10.0)];
        let tracks = vec![det(0.0, 0.0, 10.0, 10.0)];
        let (accepted, unmatched_d, unmatched_t) = associate(&detections, &tracks, 0.3);
        assert_eq!(accepted.len(), 1);
        assert!(unmatched_d.is_empty());
        assert!(unmatched_t.is_empty());
    }

    #[test]
    fn test_associate_below_threshold_unmatched() {
        let detections = vec![det(0.0, 0.0, 10.0, 10.0)];
        let tracks = vec![det(9.0, 9.0, 10.0, 10.0)];
        let (accepted, unmatched_d, unmatched_t) = associate(&detections, &tracks, 0.5);
        assert!(accepted.is_empty());
        assert_eq!(unmatched_d, vec![0]);
        assert_eq!(unmatched_t, vec![0]);
    }

    #[test]
    fn test_associate_picks_best_of_competing_tracks() {
        let detections = vec![det(0.0, 0.0, 10.0, 10.0)];
        let tracks = vec![det(1.0, 1.0, 10.0, 10.0), det(0.0, 0.0, 10.0, 10.0)];
        let (accepted, _, unmatched_t) = associate(&detections, &tracks, 0.1);
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].track_index, 1);
        assert_eq!(unmatched_t, vec![0]);
    }
}
