//! Raw stream frame source.
//!
//! `FrameSource` wraps an external ffmpeg process configured to decode a
//! network stream into raw BGR24 frames on stdout. `next_frame()` blocks
//! until a full frame is available; a short or zero read is a dropout error
//! and the caller is expected to call `restart()`, which kills the current
//! process and spawns a fresh one with identical arguments. Restarts are
//! unconditional and immediate; a 24/7 deployment never gives up on its
//! stream.
//!
//! `stub://` URLs select a synthetic in-process backend for tests. A query
//! suffix `?frames=N` scripts a dropout after N frames per connection, so
//! restart behaviour can be exercised without a decoder binary.

use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::process::{Child, ChildStdout, Command, Stdio};

use crate::frame::{frame_len, RawFrame};

/// Configuration for a stream source.
#[derive(Clone, Debug)]
pub struct StreamConfig {
    /// Input stream URL (e.g. an HLS playlist), or `stub://...` for tests.
    pub url: String,
    /// Expected frame width in pixels.
    pub width: u32,
    /// Expected frame height in pixels.
    pub height: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: "stub://traffic_cam".to_string(),
            width: 1920,
            height: 1080,
        }
    }
}

/// Counters exposed for health logging.
#[derive(Clone, Debug)]
pub struct StreamStats {
    pub frames_read: u64,
    pub restarts: u64,
    pub url: String,
}

/// Raw frame source with transparent decoder restart.
pub struct FrameSource {
    backend: StreamBackend,
}

enum StreamBackend {
    Synthetic(SyntheticStreamSource),
    Ffmpeg(FfmpegStreamSource),
}

impl FrameSource {
    pub fn new(config: StreamConfig) -> Result<Self> {
        if config.width == 0 || config.height == 0 {
            return Err(anyhow!("stream dimensions must be non-zero"));
        }
        let backend = if config.url.starts_with("stub://") {
            StreamBackend::Synthetic(SyntheticStreamSource::new(config))
        } else {
            StreamBackend::Ffmpeg(FfmpegStreamSource::new(config))
        };
        Ok(Self { backend })
    }

    /// Spawn the decoder and begin reading.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            StreamBackend::Synthetic(source) => source.connect(),
            StreamBackend::Ffmpeg(source) => source.connect(),
        }
    }

    /// Block until one full frame has been read.
    ///
    /// Any error (zero read, short read, dead decoder) is a stream dropout;
    /// the frame is never partially recombined across reads.
    pub fn next_frame(&mut self) -> Result<RawFrame> {
        match &mut self.backend {
            StreamBackend::Synthetic(source) => source.next_frame(),
            StreamBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    /// Kill the current decoder and start a fresh one with identical
    /// arguments. Logged as a warning; no backoff, no retry limit.
    pub fn restart(&mut self) -> Result<()> {
        match &mut self.backend {
            StreamBackend::Synthetic(source) => source.restart(),
            StreamBackend::Ffmpeg(source) => source.restart(),
        }
    }

    pub fn stats(&self) -> StreamStats {
        match &self.backend {
            StreamBackend::Synthetic(source) => source.stats(),
            StreamBackend::Ffmpeg(source) => source.stats(),
        }
    }
}

// ----------------------------------------------------------------------------
// ffmpeg decoder process backend
// ----------------------------------------------------------------------------

struct FfmpegStreamSource {
    config: StreamConfig,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    frames_read: u64,
    restarts: u64,
}

impl FfmpegStreamSource {
    fn new(config: StreamConfig) -> Self {
        Self {
            config,
            child: None,
            stdout: None,
            frames_read: 0,
            restarts: 0,
        }
    }

    fn spawn(&mut self) -> Result<()> {
        let mut child = Command::new("ffmpeg")
            .args([
                "-re",
                "-i",
                &self.config.url,
                "-f",
                "image2pipe",
                "-pix_fmt",
                "bgr24",
                "-vcodec",
                "rawvideo",
                "-bufsize",
                "512k",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .context("spawn ffmpeg decoder")?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("ffmpeg decoder has no stdout pipe"))?;
        self.child = Some(child);
        self.stdout = Some(stdout);
        Ok(())
    }

    fn kill_current(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            // The process may already be gone; reap it either way.
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    fn connect(&mut self) -> Result<()> {
        self.spawn()?;
        log::info!("FrameSource: decoder started for {}", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<RawFrame> {
        let stdout = self
            .stdout
            .as_mut()
            .ok_or_else(|| anyhow!("decoder not connected"))?;

        let mut buf = vec![0u8; frame_len(self.config.width, self.config.height)];
        stdout
            .read_exact(&mut buf)
            .map_err(|e| anyhow!("stream dropout on {}: {}", self.config.url, e))?;

        self.frames_read += 1;
        RawFrame::new(buf, self.config.width, self.config.height)
    }

    fn restart(&mut self) -> Result<()> {
        log::warn!(
            "FrameSource: no frame from {}; restarting decoder (restart #{})",
            self.config.url,
            self.restarts + 1
        );
        self.kill_current();
        self.spawn()?;
        self.restarts += 1;
        Ok(())
    }

    fn stats(&self) -> StreamStats {
        StreamStats {
            frames_read: self.frames_read,
            restarts: self.restarts,
            url: self.config.url.clone(),
        }
    }
}

impl Drop for FfmpegStreamSource {
    fn drop(&mut self) {
        self.kill_current();
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticStreamSource {
    config: StreamConfig,
    /// Frames emitted per connection before a scripted dropout, if any.
    frames_per_run: Option<u64>,
    frames_this_run: u64,
    frames_read: u64,
    restarts: u64,
    connected: bool,
}

impl SyntheticStreamSource {
    fn new(config: StreamConfig) -> Self {
        let frames_per_run = parse_frames_per_run(&config.url);
        Self {
            config,
            frames_per_run,
            frames_this_run: 0,
            frames_read: 0,
            restarts: 0,
            connected: false,
        }
    }

    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        self.frames_this_run = 0;
        log::info!(
            "FrameSource: connected to {} (synthetic)",
            self.config.url
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<RawFrame> {
        if !self.connected {
            return Err(anyhow!("decoder not connected"));
        }
        if let Some(limit) = self.frames_per_run {
            if self.frames_this_run >= limit {
                return Err(anyhow!(
                    "stream dropout on {}: synthetic stream ended",
                    self.config.url
                ));
            }
        }

        self.frames_this_run += 1;
        self.frames_read += 1;

        let pixels = self.generate_pixels();
        RawFrame::new(pixels, self.config.width, self.config.height)
    }

    /// Simple deterministic fill varying per frame.
    fn generate_pixels(&self) -> Vec<u8> {
        let len = frame_len(self.config.width, self.config.height);
        let mut pixels = vec![0u8; len];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frames_read) % 256) as u8;
        }
        pixels
    }

    fn restart(&mut self) -> Result<()> {
        log::warn!(
            "FrameSource: no frame from {}; restarting decoder (restart #{})",
            self.config.url,
            self.restarts + 1
        );
        self.restarts += 1;
        self.frames_this_run = 0;
        self.connected = true;
        Ok(())
    }

    fn stats(&self) -> StreamStats {
        StreamStats {
            frames_read: self.frames_read,
            restarts: self.restarts,
            url: self.config.url.clone(),
        }
    }
}

/// Parse the `?frames=N` suffix of a stub URL.
fn parse_frames_per_run(url: &str) -> Option<u64> {
    let (_, query) = url.split_once('?')?;
    for pair in query.split('&') {
        if let Some(value) = pair.strip_prefix("frames=") {
            return value.parse().ok();
        }
    }
    None
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config(url: &str) -> StreamConfig {
        StreamConfig {
            url: url.to_string(),
            width: 64,
            height: 48,
        }
    }

    #[test]
    fn synthetic_source_produces_full_frames() -> Result<()> {
        let mut source = FrameSource::new(stub_config("stub://cam"))?;
        source.connect()?;

        let frame = source.next_frame()?;
        assert_eq!(frame.width(), 64);
        assert_eq!(frame.height(), 48);
        assert_eq!(frame.byte_len(), 64 * 48 * 3);
        Ok(())
    }

    #[test]
    fn scripted_dropout_then_restart_resumes() -> Result<()> {
        let mut source = FrameSource::new(stub_config("stub://cam?frames=2"))?;
        source.connect()?;

        assert!(source.next_frame().is_ok());
        assert!(source.next_frame().is_ok());
        assert!(source.next_frame().is_err());

        source.restart()?;
        assert!(source.next_frame().is_ok());

        let stats = source.stats();
        assert_eq!(stats.restarts, 1);
        assert_eq!(stats.frames_read, 3);
        Ok(())
    }

    #[test]
    fn read_before_connect_is_an_error() -> Result<()> {
        let mut source = FrameSource::new(stub_config("stub://cam"))?;
        assert!(source.next_frame().is_err());
        Ok(())
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        let config = StreamConfig {
            url: "stub://cam".to_string(),
            width: 0,
            height: 48,
        };
        assert!(FrameSource::new(config).is_err());
    }

    #[test]
    fn frames_query_parsing() {
        assert_eq!(parse_frames_per_run("stub://cam?frames=5"), Some(5));
        assert_eq!(parse_frames_per_run("stub://cam?x=1&frames=9"), Some(9));
        assert_eq!(parse_frames_per_run("stub://cam"), None);
        assert_eq!(parse_frames_per_run("stub://cam?frames=abc"), None);
    }
}
