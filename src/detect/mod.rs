//! Detection collaborator boundary.
//!
//! The object detector and tracker are external collaborators: given a frame
//! and a rectangular zone of interest, they return `(box, track_id,
//! class_id)` tuples for objects inside the zone. Model internals, zone
//! membership computation, and tracking algorithmics live outside this
//! crate.
//!
//! The boundary is a pure call returning an explicit result value, not a
//! stateful object whose fields are read after each call. Track ids are
//! stable across consecutive frames for one physical object while tracking
//! succeeds, but not across detector restarts or long occlusions.

mod stub;

pub use stub::ScriptedDetector;

use anyhow::Result;

use crate::frame::RawFrame;
use crate::ZonePolygon;

/// One detected object in one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Detection {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    /// Detector-assigned identifier, stable across consecutive frames for
    /// the same physical object.
    pub track_id: u64,
    /// Detector class code; unknown codes are skipped by the counter.
    pub class_id: u8,
}

impl Detection {
    pub fn new(x: i32, y: i32, w: i32, h: i32, track_id: u64, class_id: u8) -> Self {
        Self {
            x,
            y,
            w,
            h,
            track_id,
            class_id,
        }
    }

    /// Box centroid.
    pub fn centroid(&self) -> (i32, i32) {
        (self.x + self.w / 2, self.y + self.h / 2)
    }
}

/// Zone-restricted detector interface, polled once per frame.
pub trait ZoneDetector {
    fn detect(&mut self, frame: &RawFrame, zone: &ZonePolygon) -> Result<Vec<Detection>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centroid_is_box_center() {
        let d = Detection::new(100, 200, 40, 60, 1, 0);
        assert_eq!(d.centroid(), (120, 230));
    }
}
