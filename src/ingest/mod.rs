//! Frame ingestion.
//!
//! This module keeps a raw-frame byte stream flowing despite upstream
//! failures. Two backends exist:
//!
//! - an external ffmpeg decoder process writing fixed-size BGR24 frames to a
//!   pipe (production)
//! - a synthetic `stub://` source (tests), optionally scripted to drop out
//!   after a fixed number of frames
//!
//! The ingestion layer owns the decoder process lifecycle. It does not retry
//! reads, buffer partial frames, or back off between restarts: any short or
//! zero read is reported as a dropout and the supervisor restarts the
//! decoder unconditionally.

mod stream;

pub use stream::{FrameSource, StreamConfig, StreamStats};
