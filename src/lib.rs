//! lanewatch - resilient line-crossing traffic counter.
//!
//! This crate implements the core pipeline for counting objects that cross a
//! fixed horizontal line in a live video stream:
//!
//! 1. **Ingestion** (`ingest`): an external decoder process emits fixed-size
//!    raw frames over a pipe. Short reads and process death are recovered by
//!    unconditional decoder restart.
//! 2. **Detection** (`detect`): an external collaborator turns a frame plus a
//!    zone polygon into `(box, track_id, class_id)` tuples. Only the stub
//!    implementation lives in this crate.
//! 3. **Counting** (`count`): a tracker-ID-deduplicated crossing counter.
//!    Each track id increments exactly one class counter exactly once.
//! 4. **Aggregation** (`interval`): counts are bucketed into wall-clock
//!    aligned 15-minute windows in a fixed civil timezone and flushed at
//!    bucket boundaries.
//! 5. **Persistence** (`store`): idempotent upsert of one row per
//!    `(date, interval label)` key.
//!
//! The supervisor (`supervisor`) ties these together into a run-forever loop
//! with coarse fault recovery: stream faults restart the decoder, processing
//! faults skip the frame, persistence faults lose at most one bucket.

use serde::{Deserialize, Serialize};

pub mod config;
pub mod count;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod interval;
pub mod render;
pub mod store;
pub mod supervisor;

pub use count::CrossingCounter;
pub use detect::{Detection, ScriptedDetector, ZoneDetector};
pub use frame::RawFrame;
pub use ingest::{FrameSource, StreamConfig, StreamStats};
pub use interval::{IntervalAggregator, IntervalRecord};
pub use render::{FrameSink, LogSink, NullSink};
pub use store::{InMemoryIntervalStore, IntervalStore, SqliteIntervalStore};
pub use supervisor::{Supervisor, SupervisorState};

// -------------------- Object classes --------------------

/// Object categories persisted per interval.
///
/// Detector class codes 0..=4 map onto four labels; codes 1 and 2 both
/// collapse to `B`. The variant names mirror the persisted column codes
/// rather than guessed long names, since the upstream model defines them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectClass {
    Cyc,
    B,
    P,
    C,
}

impl ObjectClass {
    /// All classes in column order.
    pub const ALL: [ObjectClass; 4] = [
        ObjectClass::Cyc,
        ObjectClass::B,
        ObjectClass::P,
        ObjectClass::C,
    ];

    /// Map a detector class code to a label. Unknown codes return `None`
    /// and are silently skipped by the counter.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ObjectClass::Cyc),
            1 | 2 => Some(ObjectClass::B),
            3 => Some(ObjectClass::P),
            4 => Some(ObjectClass::C),
            _ => None,
        }
    }

    /// Column / display code for this class.
    pub fn code(&self) -> &'static str {
        match self {
            ObjectClass::Cyc => "cyc",
            ObjectClass::B => "b",
            ObjectClass::P => "p",
            ObjectClass::C => "c",
        }
    }
}

// -------------------- Per-class counters --------------------

/// Per-class counters. Used both for the live (UI) tally and the
/// interval-scoped tally; both reset together at bucket boundaries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    pub cyc: u64,
    pub b: u64,
    pub p: u64,
    pub c: u64,
}

impl ClassCounts {
    pub fn add(&mut self, class: ObjectClass) {
        match class {
            ObjectClass::Cyc => self.cyc += 1,
            ObjectClass::B => self.b += 1,
            ObjectClass::P => self.p += 1,
            ObjectClass::C => self.c += 1,
        }
    }

    pub fn get(&self, class: ObjectClass) -> u64 {
        match class {
            ObjectClass::Cyc => self.cyc,
            ObjectClass::B => self.b,
            ObjectClass::P => self.p,
            ObjectClass::C => self.c,
        }
    }

    pub fn total(&self) -> u64 {
        self.cyc + self.b + self.p + self.c
    }

    pub fn is_zero(&self) -> bool {
        self.total() == 0
    }
}

// -------------------- Zone --------------------

/// 4-point rectangle handed to the detector as its region of interest.
pub type ZonePolygon = [(i32, i32); 4];

/// Static horizontal band of the frame detection is restricted to.
///
/// Configured once, immutable during a run. The polygon is recomputed each
/// frame from the current frame width so the band always spans the full
/// frame horizontally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZoneBand {
    /// Upper line offset in pixels from the top of the frame.
    pub top: u32,
    /// Lower line offset in pixels from the top of the frame.
    pub bottom: u32,
}

impl ZoneBand {
    pub fn new(top: u32, bottom: u32) -> Self {
        Self { top, bottom }
    }

    pub fn polygon(&self, frame_width: u32) -> ZonePolygon {
        let w = frame_width as i32;
        let top = self.top as i32;
        let bottom = self.bottom as i32;
        [(0, top), (w, top), (w, bottom), (0, bottom)]
    }
}

// -------------------- Tests --------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_codes_collapse_one_and_two() {
        assert_eq!(ObjectClass::from_code(0), Some(ObjectClass::Cyc));
        assert_eq!(ObjectClass::from_code(1), Some(ObjectClass::B));
        assert_eq!(ObjectClass::from_code(2), Some(ObjectClass::B));
        assert_eq!(ObjectClass::from_code(3), Some(ObjectClass::P));
        assert_eq!(ObjectClass::from_code(4), Some(ObjectClass::C));
    }

    #[test]
    fn unknown_class_codes_are_none() {
        assert_eq!(ObjectClass::from_code(5), None);
        assert_eq!(ObjectClass::from_code(255), None);
    }

    #[test]
    fn class_counts_track_each_class() {
        let mut counts = ClassCounts::default();
        counts.add(ObjectClass::B);
        counts.add(ObjectClass::B);
        counts.add(ObjectClass::P);

        assert_eq!(counts.get(ObjectClass::B), 2);
        assert_eq!(counts.get(ObjectClass::P), 1);
        assert_eq!(counts.get(ObjectClass::Cyc), 0);
        assert_eq!(counts.total(), 3);
        assert!(!counts.is_zero());
    }

    #[test]
    fn zone_polygon_spans_frame_width() {
        let zone = ZoneBand::new(250, 800);
        let polygon = zone.polygon(1920);
        assert_eq!(polygon, [(0, 250), (1920, 250), (1920, 800), (0, 800)]);
    }
}
