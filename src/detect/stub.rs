//! Scripted stub detector.
//!
//! Plays back a pre-built per-frame script of detection results. Used by
//! tests to drive the counter deterministically, and by the daemon as the
//! default no-op backend until a real model integration is wired in. An
//! exhausted script returns no detections rather than an error.

use anyhow::{anyhow, Result};
use std::collections::VecDeque;

use super::{Detection, ZoneDetector};
use crate::frame::RawFrame;
use crate::ZonePolygon;

enum Step {
    Detections(Vec<Detection>),
    Fault(String),
}

/// Detector that replays a fixed script, one entry per frame.
#[derive(Default)]
pub struct ScriptedDetector {
    script: VecDeque<Step>,
    frames_seen: u64,
}

impl ScriptedDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the detections returned for the next un-scripted frame.
    pub fn push_frame(&mut self, detections: Vec<Detection>) -> &mut Self {
        self.script.push_back(Step::Detections(detections));
        self
    }

    /// Queue a detection failure, to exercise processing-fault recovery.
    pub fn push_fault(&mut self, message: &str) -> &mut Self {
        self.script.push_back(Step::Fault(message.to_string()));
        self
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }
}

impl ZoneDetector for ScriptedDetector {
    fn detect(&mut self, _frame: &RawFrame, _zone: &ZonePolygon) -> Result<Vec<Detection>> {
        self.frames_seen += 1;
        match self.script.pop_front() {
            Some(Step::Detections(detections)) => Ok(detections),
            Some(Step::Fault(message)) => Err(anyhow!("scripted detector fault: {}", message)),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::RawFrame;
    use crate::ZoneBand;

    fn test_frame() -> RawFrame {
        RawFrame::new(vec![0u8; 4 * 2 * 3], 4, 2).unwrap()
    }

    #[test]
    fn replays_script_then_returns_empty() -> Result<()> {
        let mut detector = ScriptedDetector::new();
        detector
            .push_frame(vec![Detection::new(0, 0, 10, 10, 1, 0)])
            .push_fault("model exploded");

        let frame = test_frame();
        let zone = ZoneBand::new(0, 2).polygon(4);

        let first = detector.detect(&frame, &zone)?;
        assert_eq!(first.len(), 1);

        assert!(detector.detect(&frame, &zone).is_err());

        let third = detector.detect(&frame, &zone)?;
        assert!(third.is_empty());
        assert_eq!(detector.frames_seen(), 3);
        Ok(())
    }
}
