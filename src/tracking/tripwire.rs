// SPDX-License-Identifier: MPL-2.0

//! Hysteresis-banded tripwire crossing detection
//!
//! A tripwire is a line at normalized position `p` along the frame's
//! height (horizontal orientation) or width (vertical orientation). A
//! track's side of the line is `+1` above/right of the band, `-1`
//! below/left of it, and held at its previous value while inside the
//! band `[p - spacing/2, p + spacing/2]`. A crossing event fires only
//! when the side flips between two non-zero values, which keeps a track
//! hovering exactly on the line from emitting repeated enter/exit noise.

use crate::config::{DirectionPolicy, Orientation, Tripwire};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossingDirection {
    Enter,
    Exit,
}

/// Per-track, per-tripwire side state. `None` until the track has been
/// observed clearly on one side at least once.
#[derive(Debug, Clone, Copy, Default)]
pub struct TripwireSide(Option<i8>);

impl TripwireSide {
    fn band_side(normalized: f32, tripwire: &Tripwire) -> i8 {
        let half = tripwire.spacing / 2.0;
        if normalized > tripwire.position + half {
            1
        } else if normalized < tripwire.position - half {
            -1
        } else {
            0
        }
    }

    /// Feed a new detection center and report a crossing if one occurred.
    /// `frame_width`/`frame_height` normalize the center into `[0, 1]`.
    pub fn update(
        &mut self,
        tripwire: &Tripwire,
        center: (f32, f32),
        frame_width: u32,
        frame_height: u32,
    ) -> Option<CrossingDirection> {
        let normalized = match tripwire.orientation {
            Orientation::Horizontal => center.1 / frame_height.max(1) as f32,
            Orientation::Vertical => center.0 / frame_width.max(1) as f32,
        };

        let observed = Self::band_side(normalized, tripwire);
        let new_side = if observed == 0 { self.0.unwrap_or(0) } else { observed };

        let crossing = match (self.0, new_side) {
            (Some(prev), cur) if prev != 0 && cur != 0 && prev != cur => {
                let direction = if cur > prev { CrossingDirection::Enter } else { CrossingDirection::Exit };
                policy_allows(tripwire.direction.normalized(), direction).then_some(direction)
            }
            _ => None,
        };

        if new_side != 0 {
            self.0 = Some(new_side);
        }

        crossing
    }
}

fn policy_allows(policy: DirectionPolicy, direction: CrossingDirection) -> bool {
    match policy {
        DirectionPolicy::Both | DirectionPolicy::Monitoring => true,
        DirectionPolicy::Enter => direction == CrossingDirection::Enter,
        DirectionPolicy::Exit => direction == CrossingDirection::Exit,
    }
}
