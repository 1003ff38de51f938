// SPDX-License-Identifier: MPL-2.0

//! Per-camera face tracking: detection-to-track association, track aging,
//! sticky identity, and tripwire crossing evaluation.

pub mod iou;
pub mod tripwire;

use crate::config::Tripwire;
use crate::models::Detection;
use tripwire::{CrossingDirection, TripwireSide};

/// A face followed across frames within a single camera.
pub struct Track {
    pub id: u64,
    pub last_box: Detection,
    pub identity: Option<String>,
    pub identity_score: f32,
    frames_since_seen: u32,
    tripwire_sides: Vec<TripwireSide>,
}

impl Track {
    fn new(id: u64, detection: Detection, tripwire_count: usize) -> Self {
        Self {
            id,
            last_box: detection,
            identity: None,
            identity_score: 0.0,
            frames_since_seen: 0,
            tripwire_sides: vec![TripwireSide::default(); tripwire_count],
        }
    }

    pub fn is_seen_this_frame(&self) -> bool {
        self.frames_since_seen == 0
    }
}

/// An attendance-relevant crossing produced while updating a camera's tracks.
#[derive(Debug, Clone)]
pub struct TripwireEvent {
    pub track_id: u64,
    pub tripwire_id: String,
    pub direction: CrossingDirection,
    pub identity: Option<String>,
}

/// Holds all active tracks for one camera and advances them frame by frame.
pub struct TrackStore {
    tracks: Vec<Track>,
    next_track_id: u64,
    iou_threshold: f32,
    expire_frames: u32,
    identify_threshold: f32,
    reid_margin: f32,
}

impl TrackStore {
    pub fn new(iou_threshold: f32, expire_frames: u32, identify_threshold: f32, reid_margin: f32) -> Self {
        Self {
            tracks: Vec::new(),
            next_track_id: 1,
            iou_threshold,
            expire_frames,
            identify_threshold,
            reid_margin,
        }
    }

    /// Associate `detections` with existing tracks, spawn new tracks for
    /// unmatched detections, age out stale tracks, and evaluate `tripwires`
    /// against the updated positions.
    pub fn update(
        &mut self,
        detections: &[Detection],
        tripwires: &[Tripwire],
        frame_width: u32,
        frame_height: u32,
    ) -> Vec<TripwireEvent> {
        let track_boxes: Vec<Detection> = self.tracks.iter().map(|t| t.last_box).collect();
        let (associations, unmatched_detections, unmatched_tracks) =
            iou::associate(detections, &track_boxes, self.iou_threshold);

        for track in self.tracks.iter_mut() {
            track.frames_since_seen += 1;
        }

        for association in &associations {
            let track = &mut self.tracks[association.track_index];
            track.last_box = detections[association.detection_index];
            track.frames_since_seen = 0;
        }

        for detection_index in unmatched_detections {
            let tripwire_count = tripwires.len();
            let id = self.next_track_id;
            self.next_track_id += 1;
            self.tracks.push(Track::new(id, detections[detection_index], tripwire_count));
        }

        let _ = unmatched_tracks;
        self.tracks.retain(|t| t.frames_since_seen <= self.expire_frames);

        let mut events = Vec::new();
        for track in self.tracks.iter_mut() {
            if !track.is_seen_this_frame() {
                continue;
            }
            let center = track.last_box.center();
            if track.tripwire_sides.len() != tripwires.len() {
                track.tripwire_sides.resize(tripwires.len(), TripwireSide::default());
            }
            for (tripwire, side) in tripwires.iter().zip(track.tripwire_sides.iter_mut()) {
                if let Some(direction) = side.update(tripwire, center, frame_width, frame_height) {
                    events.push(TripwireEvent {
                        track_id: track.id,
                        tripwire_id: tripwire.id.clone(),
                        direction,
                        identity: track.identity.clone(),
                    });
                }
            }
        }

        events
    }

    /// Apply an identify/re-id result to a track, respecting the sticky
    /// identity rule: a different identity only overrides the current one
    /// if its score exceeds `identify_threshold + reid_margin`. Returns
    /// whether `candidate` is the track's identity as of this call — i.e.
    /// whether it was newly accepted or re-affirmed a match that was
    /// already above threshold, not merely a nearest neighbor below it.
    pub fn apply_identity(&mut self, track_id: u64, candidate: &str, score: f32) -> bool {
        let Some(track) = self.tracks.iter_mut().find(|t| t.id == track_id) else {
            return false;
        };

        match &track.identity {
            None if score >= self.identify_threshold => {
                track.identity = Some(candidate.to_string());
                track.identity_score = score;
                true
            }
            Some(current) if current != candidate => {
                if score >= self.identify_threshold + self.reid_margin {
                    track.identity = Some(candidate.to_string());
                    track.identity_score = score;
                    true
                } else {
                    false
                }
            }
            Some(current) => {
                track.identity_score = track.identity_score.max(score);
                current == candidate
            }
            None => false,
        }
    }

    pub fn active_tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(|t| t.is_seen_this_frame())
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DirectionPolicy, Orientation};

    fn det(x: f32, y: f32) -> Detection {
        Detection { x, y, width: 20.0, height: 20.0, confidence: 1.0 }
    }

    fn store() -> TrackStore {
        TrackStore::new(0.3, 2, 0.6, 0.15)
    }

    #[test]
    fn test_new_detection_spawns_track() {
        let mut store = store();
        let events = store.update(&[det(10.0, 10.0)], &[], 640, 480);
        assert!(events.is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_track_expires_after_missed_frames() {
        let mut store = store();
        store.update(&[det(10.0, 10.0)], &[], 640, 480);
        store.update(&[], &[], 640, 480);
        store.update(&[], &[], 640, 480);
        store.update(&[], &[], 640, 480);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_consistent_detection_keeps_same_track_id() {
        let mut store = store();
        store.update(&[det(10.0, 10.0)], &[], 640, 480);
        let first_id = store.tracks[0].id;
        store.update(&[det(12.0, 11.0)], &[], 640, 480);
        assert_eq!(store.tracks[0].id, first_id);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_apply_identity_requires_margin_to_override() {
        let mut store = store();
        store.update(&[det(10.0, 10.0)], &[], 640, 480);
        let id = store.tracks[0].id;

        assert!(store.apply_identity(id, "alice", 0.65));
        assert_eq!(store.tracks[0].identity.as_deref(), Some("alice"));

        assert!(!store.apply_identity(id, "bob", 0.70));
        assert_eq!(store.tracks[0].identity.as_deref(), Some("alice"));

        assert!(store.apply_identity(id, "bob", 0.90));
        assert_eq!(store.tracks[0].identity.as_deref(), Some("bob"));
    }

    #[test]
    fn test_apply_identity_below_threshold_is_rejected() {
        let mut store = store();
        store.update(&[det(10.0, 10.0)], &[], 640, 480);
        let id = store.tracks[0].id;

        assert!(!store.apply_identity(id, "alice", 0.40));
        assert_eq!(store.tracks[0].identity, None);
    }

    #[test]
    fn test_tripwire_crossing_emitted_for_moving_track() {
        let mut store = store();
        let tripwire = Tripwire {
            id: "line".to_string(),
            name: "door".to_string(),
            orientation: Orientation::Horizontal,
            position: 0.5,
            spacing: 0.05,
            direction: DirectionPolicy::Both,
        };

        store.update(&[det(0.0, 10.0)], std::slice::from_ref(&tripwire), 200, 200);
        let events = store.update(&[det(0.0, 180.0)], std::slice::from_ref(&tripwire), 200, 200);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].tripwire_id, "line");
    }
}
