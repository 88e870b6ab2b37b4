//! Wall-clock interval aggregation.
//!
//! Counts are bucketed into fixed-width windows aligned to wall-clock
//! quarter-hours in a configured civil timezone, not to elapsed time since
//! process start. Two restarts of the process therefore produce identical
//! bucket boundaries, and the persistence key `(date, label)` never
//! fragments one logical window across differently-phased runs.
//!
//! The aggregator is ticked once per processed frame. When the computed
//! bucket start moves past the recorded one, the just-closed bucket is
//! finalized under its own key, handed to the store, and both counter sets
//! are zeroed before any detection of the new bucket is observed. A store
//! failure is logged and the bucket's data discarded; there is no retry
//! queue, a missed interval is accepted data loss.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;

use crate::count::CrossingCounter;
use crate::store::IntervalStore;
use crate::ClassCounts;

/// One finalized bucket, ready for persistence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntervalRecord {
    /// Civil date of the bucket start in the deployment timezone.
    pub date: NaiveDate,
    /// Human-readable window, e.g. `"09:00 - 09:15"`.
    pub label: String,
    pub counts: ClassCounts,
}

/// Truncate `now` down to the nearest bucket boundary.
pub fn bucket_start(now: DateTime<Tz>, bucket_minutes: u32) -> DateTime<Tz> {
    now - ChronoDuration::minutes((now.minute() % bucket_minutes) as i64)
        - ChronoDuration::seconds(now.second() as i64)
        - ChronoDuration::nanoseconds(now.nanosecond() as i64)
}

/// `"HH:MM - HH:MM"` window label for a bucket start.
pub fn bucket_label(start: DateTime<Tz>, bucket_minutes: u32) -> String {
    let end = start + ChronoDuration::minutes(bucket_minutes as i64);
    format!("{} - {}", start.format("%H:%M"), end.format("%H:%M"))
}

pub struct IntervalAggregator {
    tz: Tz,
    bucket_minutes: u32,
    last_interval: DateTime<Tz>,
}

impl IntervalAggregator {
    /// The first bucket opens at the current wall-clock boundary, so the
    /// first tick never flushes a phantom empty bucket.
    pub fn new(tz: Tz, bucket_minutes: u32) -> Self {
        let now = Utc::now().with_timezone(&tz);
        Self::starting_at(tz, bucket_minutes, now)
    }

    pub fn starting_at(tz: Tz, bucket_minutes: u32, now: DateTime<Tz>) -> Self {
        Self {
            tz,
            bucket_minutes,
            last_interval: bucket_start(now, bucket_minutes),
        }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn last_interval(&self) -> DateTime<Tz> {
        self.last_interval
    }

    /// Called once per processed frame. Returns the flushed record when a
    /// bucket boundary was crossed, `None` otherwise.
    pub fn tick(
        &mut self,
        counter: &mut CrossingCounter,
        store: &mut dyn IntervalStore,
    ) -> Option<IntervalRecord> {
        let now = Utc::now().with_timezone(&self.tz);
        self.tick_at(now, counter, store)
    }

    /// `tick` with an explicit clock, for tests.
    pub fn tick_at(
        &mut self,
        now: DateTime<Tz>,
        counter: &mut CrossingCounter,
        store: &mut dyn IntervalStore,
    ) -> Option<IntervalRecord> {
        let current = bucket_start(now, self.bucket_minutes);
        // Bucket transitions are strictly monotonic; a clock step backwards
        // keeps accumulating into the open bucket.
        if current <= self.last_interval {
            return None;
        }

        let record = IntervalRecord {
            date: self.last_interval.date_naive(),
            label: bucket_label(self.last_interval, self.bucket_minutes),
            counts: counter.take_interval(),
        };

        // Fire-and-forget: a failed upsert loses this bucket only.
        if let Err(e) = store.upsert(&record) {
            log::error!(
                "interval upsert failed for {} {}: {:#}",
                record.date,
                record.label,
                e
            );
        } else {
            log::info!(
                "interval {} {} persisted: cyc={} b={} p={} c={}",
                record.date,
                record.label,
                record.counts.cyc,
                record.counts.b,
                record.counts.p,
                record.counts.c
            );
        }

        self.last_interval = current;
        Some(record)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Detection;
    use crate::store::InMemoryIntervalStore;
    use anyhow::{anyhow, Result};
    use chrono::TimeZone;
    use std::time::Duration;

    const TZ: Tz = chrono_tz::Europe::Brussels;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Tz> {
        TZ.with_ymd_and_hms(2026, 3, 10, h, m, s).unwrap()
    }

    fn counter() -> CrossingCounter {
        CrossingCounter::new(540, 7, Duration::from_secs(1800))
    }

    fn crossing(track_id: u64, class_id: u8) -> Detection {
        Detection::new(100, 520, 40, 40, track_id, class_id)
    }

    struct FailingStore;

    impl IntervalStore for FailingStore {
        fn upsert(&mut self, _record: &IntervalRecord) -> Result<()> {
            Err(anyhow!("store unavailable"))
        }
    }

    #[test]
    fn bucket_start_truncates_to_quarter_hour() {
        let start = bucket_start(at(9, 7, 42), 15);
        assert_eq!(start, at(9, 0, 0));
        assert_eq!(bucket_label(start, 15), "09:00 - 09:15");
    }

    #[test]
    fn bucket_start_is_identity_on_boundaries() {
        assert_eq!(bucket_start(at(9, 15, 0), 15), at(9, 15, 0));
        assert_eq!(bucket_start(at(9, 29, 59), 15), at(9, 15, 0));
    }

    #[test]
    fn no_flush_within_one_bucket() {
        let mut agg = IntervalAggregator::starting_at(TZ, 15, at(9, 1, 0));
        let mut c = counter();
        let mut store = InMemoryIntervalStore::default();

        assert!(agg.tick_at(at(9, 5, 0), &mut c, &mut store).is_none());
        assert!(agg.tick_at(at(9, 14, 59), &mut c, &mut store).is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn rollover_flushes_closed_bucket_under_its_own_key() {
        let mut agg = IntervalAggregator::starting_at(TZ, 15, at(9, 1, 0));
        let mut c = counter();
        let mut store = InMemoryIntervalStore::default();

        c.observe(&[crossing(1, 1), crossing(2, 1)]);
        let record = agg
            .tick_at(at(9, 16, 3), &mut c, &mut store)
            .expect("boundary crossed");

        assert_eq!(record.label, "09:00 - 09:15");
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2026, 3, 10).unwrap());
        assert_eq!(record.counts.b, 2);

        let stored = store.get("2026-03-10", "09:00 - 09:15").unwrap();
        assert_eq!(stored.b, 2);
    }

    #[test]
    fn rollover_resets_live_and_interval_counts() {
        let mut agg = IntervalAggregator::starting_at(TZ, 15, at(9, 1, 0));
        let mut c = counter();
        let mut store = InMemoryIntervalStore::default();

        c.observe(&[crossing(1, 0)]);
        agg.tick_at(at(9, 16, 0), &mut c, &mut store);

        assert!(c.live_counts().is_zero());
        assert!(c.interval_counts().is_zero());

        // Fresh ids in the new bucket accumulate from zero.
        c.observe(&[crossing(7, 4)]);
        let record = agg.tick_at(at(9, 31, 0), &mut c, &mut store).unwrap();
        assert_eq!(record.counts.c, 1);
        assert_eq!(record.counts.cyc, 0);
        assert_eq!(record.label, "09:15 - 09:30");
    }

    #[test]
    fn store_failure_discards_bucket_and_continues() {
        let mut agg = IntervalAggregator::starting_at(TZ, 15, at(9, 1, 0));
        let mut c = counter();
        let mut store = FailingStore;

        c.observe(&[crossing(1, 3)]);
        // No panic, no error escapes; counters are reset regardless.
        let record = agg.tick_at(at(9, 17, 0), &mut c, &mut store).unwrap();
        assert_eq!(record.counts.p, 1);
        assert!(c.interval_counts().is_zero());

        c.observe(&[crossing(2, 3)]);
        let next = agg.tick_at(at(9, 32, 0), &mut c, &mut store).unwrap();
        assert_eq!(next.counts.p, 1);
    }

    #[test]
    fn clock_stepping_backwards_does_not_roll() {
        let mut agg = IntervalAggregator::starting_at(TZ, 15, at(9, 20, 0));
        let mut c = counter();
        let mut store = InMemoryIntervalStore::default();

        assert!(agg.tick_at(at(9, 5, 0), &mut c, &mut store).is_none());
        assert_eq!(agg.last_interval(), at(9, 15, 0));
    }

    #[test]
    fn midnight_rollover_dates_the_closed_bucket() {
        let start = TZ.with_ymd_and_hms(2026, 3, 10, 23, 50, 0).unwrap();
        let after = TZ.with_ymd_and_hms(2026, 3, 11, 0, 1, 0).unwrap();

        let mut agg = IntervalAggregator::starting_at(TZ, 15, start);
        let mut c = counter();
        let mut store = InMemoryIntervalStore::default();

        c.observe(&[crossing(1, 0)]);
        let record = agg.tick_at(after, &mut c, &mut store).unwrap();

        assert_eq!(record.date, NaiveDate::from_ymd_opt(2026, 3, 10).unwrap());
        assert_eq!(record.label, "23:45 - 00:00");
    }
}
