//! Render/UI collaborator boundary.
//!
//! The dashboard (overlay drawing, live display) lives outside this crate.
//! The pipeline hands each processed frame and the current live counts to a
//! `FrameSink`; sinks are purely consumers and never call back into the
//! core. Sink errors are advisory: the supervisor logs them and keeps
//! processing.

use anyhow::Result;
use std::time::{Duration, Instant};

use crate::frame::RawFrame;
use crate::ClassCounts;

pub trait FrameSink {
    fn present(&mut self, frame: &RawFrame, live: &ClassCounts) -> Result<()>;
}

/// Discards everything. Headless deployments.
#[derive(Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn present(&mut self, _frame: &RawFrame, _live: &ClassCounts) -> Result<()> {
        Ok(())
    }
}

/// Logs the live tally on a fixed cadence instead of rendering it.
pub struct LogSink {
    every: Duration,
    last_logged: Option<Instant>,
}

impl LogSink {
    pub fn new(every: Duration) -> Self {
        Self {
            every,
            last_logged: None,
        }
    }
}

impl FrameSink for LogSink {
    fn present(&mut self, frame: &RawFrame, live: &ClassCounts) -> Result<()> {
        let due = match self.last_logged {
            Some(last) => last.elapsed() >= self.every,
            None => true,
        };
        if due {
            log::info!(
                "live counts ({}x{}): cyc={} b={} p={} c={}",
                frame.width(),
                frame.height(),
                live.cyc,
                live.b,
                live.p,
                live.c
            );
            self.last_logged = Some(Instant::now());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sink_accepts_frames() -> Result<()> {
        let frame = RawFrame::new(vec![0u8; 4 * 2 * 3], 4, 2)?;
        NullSink.present(&frame, &ClassCounts::default())
    }

    #[test]
    fn log_sink_never_errors() -> Result<()> {
        let frame = RawFrame::new(vec![0u8; 4 * 2 * 3], 4, 2)?;
        let mut sink = LogSink::new(Duration::from_secs(5));
        sink.present(&frame, &ClassCounts::default())?;
        sink.present(&frame, &ClassCounts::default())
    }
}
