//! Tracker-ID-deduplicated crossing counter.
//!
//! Converts per-frame detection lists into exactly-once crossing events. A
//! detection counts when its track id has not been counted before and its
//! centroid lies within a small tolerance band around the configured
//! crossing line. The counted-id map makes the test one-shot per id: an
//! object sitting in the band across consecutive frames counts only on the
//! first frame, and an id that leaves and re-enters the band never
//! re-counts while it remains resident.
//!
//! Residence is bounded by a sliding window rather than growing without
//! bound for the life of the process: an id unseen for longer than the
//! eviction horizon is pruned, since track ids are only meaningfully unique
//! within a bounded tracking horizon anyway. An id that is still being
//! observed has its last-seen stamp refreshed every frame, so a visible
//! object cannot be evicted and double-counted.
//!
//! Owned exclusively by the single frame-processing thread; no locking.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::detect::Detection;
use crate::{ClassCounts, ObjectClass};

/// Prune the counted-id map every this many observed frames.
const EVICTION_STRIDE: u64 = 256;

pub struct CrossingCounter {
    crossing_line: i32,
    tolerance: i32,
    eviction_horizon: Duration,
    /// track id -> last seen. Insertion marks the id as counted.
    counted: HashMap<u64, Instant>,
    frames_observed: u64,
    live: ClassCounts,
    interval: ClassCounts,
}

impl CrossingCounter {
    pub fn new(crossing_line: i32, tolerance: i32, eviction_horizon: Duration) -> Self {
        Self {
            crossing_line,
            tolerance,
            eviction_horizon,
            counted: HashMap::new(),
            frames_observed: 0,
            live: ClassCounts::default(),
            interval: ClassCounts::default(),
        }
    }

    /// Consume one frame's detections.
    pub fn observe(&mut self, detections: &[Detection]) {
        self.observe_at(detections, Instant::now());
    }

    /// `observe` with an explicit clock, for tests and eviction control.
    pub fn observe_at(&mut self, detections: &[Detection], now: Instant) {
        for detection in detections {
            // Unknown class codes are skipped entirely: no counting, no
            // entry in the counted-id map.
            let Some(class) = ObjectClass::from_code(detection.class_id) else {
                continue;
            };

            if let Some(last_seen) = self.counted.get_mut(&detection.track_id) {
                *last_seen = now;
                continue;
            }

            let (_cx, cy) = detection.centroid();
            if (cy - self.crossing_line).abs() <= self.tolerance {
                self.counted.insert(detection.track_id, now);
                self.live.add(class);
                self.interval.add(class);
            }
        }

        self.frames_observed += 1;
        if self.frames_observed % EVICTION_STRIDE == 0 {
            self.evict_stale(now);
        }
    }

    /// Drop ids unseen for longer than the eviction horizon.
    pub fn evict_stale(&mut self, now: Instant) {
        let horizon = self.eviction_horizon;
        self.counted
            .retain(|_, last_seen| now.duration_since(*last_seen) <= horizon);
    }

    /// Counters since the last interval boundary, for the render sink.
    pub fn live_counts(&self) -> ClassCounts {
        self.live
    }

    /// Counters scoped to the open interval.
    pub fn interval_counts(&self) -> ClassCounts {
        self.interval
    }

    /// Snapshot the interval counters and zero both counter sets.
    ///
    /// Called exactly once per bucket boundary, before any detection from
    /// the new bucket is observed, so no frame's counts straddle the
    /// boundary.
    pub fn take_interval(&mut self) -> ClassCounts {
        let counts = self.interval;
        self.interval = ClassCounts::default();
        self.live = ClassCounts::default();
        counts
    }

    /// Number of track ids currently marked as counted.
    pub fn counted_ids(&self) -> usize {
        self.counted.len()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: i32 = 540;
    const TOL: i32 = 7;

    fn counter() -> CrossingCounter {
        CrossingCounter::new(LINE, TOL, Duration::from_secs(30 * 60))
    }

    /// Box whose centroid lands at the given y.
    fn crossing(track_id: u64, class_id: u8, cy: i32) -> Detection {
        Detection::new(100, cy - 20, 40, 40, track_id, class_id)
    }

    #[test]
    fn id_counts_at_most_once() {
        let mut c = counter();
        let d = crossing(1, 0, LINE);

        // Same id sitting in the band across many frames.
        for _ in 0..10 {
            c.observe(&[d]);
        }

        assert_eq!(c.live_counts().cyc, 1);
        assert_eq!(c.interval_counts().cyc, 1);
        assert_eq!(c.counted_ids(), 1);
    }

    #[test]
    fn id_never_recounts_after_leaving_and_reentering_band() {
        let mut c = counter();
        c.observe(&[crossing(1, 0, LINE)]);
        c.observe(&[crossing(1, 0, LINE + 200)]);
        c.observe(&[crossing(1, 0, LINE)]);

        assert_eq!(c.live_counts().cyc, 1);
    }

    #[test]
    fn centroid_outside_band_never_counts() {
        let mut c = counter();
        c.observe(&[crossing(1, 0, LINE - TOL - 1)]);
        c.observe(&[crossing(2, 0, LINE + TOL + 1)]);
        c.observe(&[crossing(3, 0, 0)]);

        assert!(c.live_counts().is_zero());
        assert_eq!(c.counted_ids(), 0);
    }

    #[test]
    fn band_edges_are_inclusive() {
        let mut c = counter();
        c.observe(&[crossing(1, 0, LINE - TOL)]);
        c.observe(&[crossing(2, 0, LINE + TOL)]);

        assert_eq!(c.live_counts().cyc, 2);
    }

    #[test]
    fn unknown_class_never_counts_nor_registers() {
        let mut c = counter();
        c.observe(&[crossing(1, 9, LINE)]);

        assert!(c.live_counts().is_zero());
        assert_eq!(c.counted_ids(), 0);
    }

    #[test]
    fn simultaneous_distinct_ids_all_count() {
        let mut c = counter();
        c.observe(&[
            crossing(1, 1, LINE),
            crossing(2, 1, LINE - 3),
            crossing(3, 4, LINE + 3),
        ]);

        assert_eq!(c.live_counts().b, 2);
        assert_eq!(c.live_counts().c, 1);
        assert_eq!(c.counted_ids(), 3);
    }

    #[test]
    fn take_interval_zeroes_both_counter_sets() {
        let mut c = counter();
        c.observe(&[crossing(1, 1, LINE)]);

        let flushed = c.take_interval();
        assert_eq!(flushed.b, 1);
        assert!(c.live_counts().is_zero());
        assert!(c.interval_counts().is_zero());

        // The id stays counted across the boundary.
        c.observe(&[crossing(1, 1, LINE)]);
        assert!(c.interval_counts().is_zero());
    }

    #[test]
    fn stale_ids_are_evicted_past_the_horizon() {
        let mut c = CrossingCounter::new(LINE, TOL, Duration::from_secs(60));
        let t0 = Instant::now();
        c.observe_at(&[crossing(1, 0, LINE)], t0);
        assert_eq!(c.counted_ids(), 1);

        c.evict_stale(t0 + Duration::from_secs(30));
        assert_eq!(c.counted_ids(), 1);

        c.evict_stale(t0 + Duration::from_secs(61));
        assert_eq!(c.counted_ids(), 0);
    }

    #[test]
    fn visible_id_is_refreshed_and_survives_eviction() {
        let mut c = CrossingCounter::new(LINE, TOL, Duration::from_secs(60));
        let t0 = Instant::now();
        c.observe_at(&[crossing(1, 0, LINE)], t0);

        // Still visible much later: last-seen refreshes, no recount.
        let t1 = t0 + Duration::from_secs(55);
        c.observe_at(&[crossing(1, 0, LINE)], t1);

        c.evict_stale(t1 + Duration::from_secs(30));
        assert_eq!(c.counted_ids(), 1);
        assert_eq!(c.live_counts().cyc, 1);
    }
}
