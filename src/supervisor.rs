//! Run-forever supervision loop.
//!
//! One logical thread processes frames strictly sequentially:
//! read -> detect -> count -> aggregate -> (maybe) persist -> render.
//!
//! Fault domains get distinct recovery actions:
//! - a stream fault (short read, dead decoder) restarts the decoder,
//!   unconditionally and immediately;
//! - a processing fault (detector, counter, aggregator, sink) skips the
//!   frame and keeps the decoder running, avoiding needless decoder churn.
//!
//! The counted-id map and both counter sets live above the restart path and
//! survive any number of decoder restarts. There is no terminal state
//! reachable by normal operation; `run` loops until the shutdown flag is
//! raised.

use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::count::CrossingCounter;
use crate::detect::ZoneDetector;
use crate::frame::RawFrame;
use crate::ingest::FrameSource;
use crate::interval::IntervalAggregator;
use crate::render::FrameSink;
use crate::store::IntervalStore;
use crate::ZoneBand;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SupervisorState {
    Running,
    Restarting,
}

/// Outcome of one loop iteration; exposed for tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Processed,
    FrameSkipped,
    DecoderRestarted,
}

pub struct Supervisor<D: ZoneDetector, S: FrameSink> {
    source: FrameSource,
    detector: D,
    sink: S,
    counter: CrossingCounter,
    aggregator: IntervalAggregator,
    store: Box<dyn IntervalStore>,
    zone: ZoneBand,
    state: SupervisorState,
}

impl<D: ZoneDetector, S: FrameSink> Supervisor<D, S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: FrameSource,
        detector: D,
        sink: S,
        counter: CrossingCounter,
        aggregator: IntervalAggregator,
        store: Box<dyn IntervalStore>,
        zone: ZoneBand,
    ) -> Self {
        Self {
            source,
            detector,
            sink,
            counter,
            aggregator,
            store,
            zone,
            state: SupervisorState::Running,
        }
    }

    /// Spawn the decoder.
    pub fn connect(&mut self) -> Result<()> {
        self.source.connect()
    }

    /// Run until the shutdown flag is raised. The only error that can
    /// escape is a failure to start the decoder for the very first time;
    /// everything after that is recovered in-loop.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<()> {
        self.connect()?;
        self.state = SupervisorState::Running;
        log::info!("supervisor running");

        while !shutdown.load(Ordering::SeqCst) {
            self.step();
        }

        log::info!("shutdown requested; supervisor exiting");
        Ok(())
    }

    /// One loop iteration: read a frame and process it, or recover.
    pub fn step(&mut self) -> StepOutcome {
        let now = Utc::now().with_timezone(&self.aggregator.timezone());
        self.step_at(now)
    }

    /// `step` with an explicit clock for the aggregator, so tests can
    /// drive bucket boundaries.
    pub fn step_at(&mut self, now: DateTime<Tz>) -> StepOutcome {
        match self.source.next_frame() {
            Ok(frame) => {
                self.state = SupervisorState::Running;
                match self.process(&frame, now) {
                    Ok(()) => StepOutcome::Processed,
                    Err(e) => {
                        log::error!("processing fault, frame skipped: {:#}", e);
                        StepOutcome::FrameSkipped
                    }
                }
            }
            Err(e) => {
                log::warn!("stream fault: {:#}", e);
                self.state = SupervisorState::Restarting;
                if let Err(e) = self.source.restart() {
                    // Never give up: the next iteration tries again.
                    log::error!("decoder restart failed: {:#}", e);
                }
                StepOutcome::DecoderRestarted
            }
        }
    }

    fn process(&mut self, frame: &RawFrame, now: DateTime<Tz>) -> Result<()> {
        let polygon = self.zone.polygon(frame.width());
        let detections = self.detector.detect(frame, &polygon)?;
        self.counter.observe(&detections);
        self.aggregator
            .tick_at(now, &mut self.counter, self.store.as_mut());

        let live = self.counter.live_counts();
        if let Err(e) = self.sink.present(frame, &live) {
            // Rendering is advisory; a broken sink never stalls counting.
            log::error!("render sink error: {:#}", e);
        }
        Ok(())
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn counter(&self) -> &CrossingCounter {
        &self.counter
    }

    pub fn source(&self) -> &FrameSource {
        &self.source
    }
}
