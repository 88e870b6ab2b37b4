//! Raw frame container.
//!
//! Frames arrive from the decoder as contiguous BGR24 byte buffers of exactly
//! `width * height * 3` bytes. Ownership is transient: a frame is read once,
//! processed, and dropped. No partial-frame buffering exists anywhere in the
//! pipeline; a short read is a stream dropout, not a frame fragment.

use anyhow::{bail, Result};

/// Bytes per pixel for the fixed BGR24 output format.
pub const BYTES_PER_PIXEL: usize = 3;

/// Byte length of one raw frame at the given dimensions.
pub const fn frame_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * BYTES_PER_PIXEL
}

/// One decoded raw frame.
#[derive(Clone, Debug)]
pub struct RawFrame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl RawFrame {
    /// Wrap a raw buffer. The buffer must be exactly one frame long.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = frame_len(width, height);
        if data.len() != expected {
            bail!(
                "raw frame buffer is {} bytes, expected {} ({}x{} BGR24)",
                data.len(),
                expected,
                width,
                height
            );
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw BGR24 pixel bytes, row-major, no padding.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}
