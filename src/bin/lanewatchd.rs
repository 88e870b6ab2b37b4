//! lanewatchd - traffic counting daemon
//!
//! This daemon:
//! 1. Reads raw frames from an external decoder process (restarted on any
//!    stream fault)
//! 2. Runs the configured detector over the zone of interest
//! 3. Counts line crossings, deduplicated by track id
//! 4. Aggregates counts into wall-clock 15-minute buckets
//! 5. Upserts one row per (date, interval) into the local store

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lanewatch::config::LanewatchConfig;
use lanewatch::{
    CrossingCounter, FrameSource, IntervalAggregator, LogSink, ScriptedDetector,
    SqliteIntervalStore, StreamConfig, Supervisor,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = LanewatchConfig::load()?;
    log::info!(
        "lanewatchd {} starting: stream={} db={} tz={} bucket={}min",
        env!("CARGO_PKG_VERSION"),
        cfg.stream.url,
        cfg.db_path,
        cfg.interval.timezone,
        cfg.interval.minutes
    );
    log::info!(
        "zone band {}..{}, crossing line {} +/- {}",
        cfg.zone.band.top,
        cfg.zone.band.bottom,
        cfg.zone.crossing_line,
        cfg.zone.tolerance
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::SeqCst);
        })?;
    }

    let source = FrameSource::new(StreamConfig {
        url: cfg.stream.url.clone(),
        width: cfg.stream.width,
        height: cfg.stream.height,
    })?;
    let store = SqliteIntervalStore::open(&cfg.db_path)?;
    let counter = CrossingCounter::new(cfg.zone.crossing_line, cfg.zone.tolerance, cfg.eviction);
    let aggregator = IntervalAggregator::new(cfg.interval.timezone, cfg.interval.minutes);

    // Detection is an external collaborator; until a model backend is wired
    // in, the stub reports no detections.
    let detector = ScriptedDetector::new();
    log::warn!("no detection backend configured; running with the stub detector");

    let sink = LogSink::new(Duration::from_secs(5));

    let mut supervisor = Supervisor::new(
        source,
        detector,
        sink,
        counter,
        aggregator,
        Box::new(store),
        cfg.zone.band,
    );
    supervisor.run(&shutdown)
}
