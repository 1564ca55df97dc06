//! Frame ingestion sources.
//!
//! This module provides different sources for live frames:
//! - Synthetic scenes (`stub://…`) for tests and demos
//! - Still images on disk (feature: ingest-image)
//!
//! Sources draw their current image on demand; the `FrameSampler` turns that into an
//! immutable `Frame` stamped with the sampling time. Sources MUST NOT log pixel content.

#[cfg(feature = "ingest-image")]
pub mod image_file;
pub mod synthetic;

#[cfg(feature = "ingest-image")]
pub use image_file::StillImageSource;
pub use synthetic::{CaptureStats, SyntheticScene, SyntheticSource};

use anyhow::{anyhow, Result};

use crate::frame::{Frame, PixelLayout};

/// A live image source (camera, file, synthetic scene).
pub trait VideoSource: Send {
    /// Native resolution; `(0, 0)` while the source is not ready.
    fn dimensions(&self) -> (u32, u32);

    /// Draw the current image into `buf`, replacing its contents.
    fn draw(&mut self, buf: &mut Vec<u8>) -> Result<PixelLayout>;
}

/// Snapshots a source into frames, reusing one scratch buffer between ticks.
#[derive(Debug, Default)]
pub struct FrameSampler {
    scratch: Vec<u8>,
    frames_sampled: u64,
    not_ready: u64,
}

impl FrameSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture one frame at the source's native resolution.
    ///
    /// Returns `Ok(None)` when the source reports a zero size.
    pub fn sample<S: VideoSource + ?Sized>(&mut self, source: &mut S, now_ms: u64) -> Result<Option<Frame>> {
        let (width, height) = source.dimensions();
        if width == 0 || height == 0 {
            self.not_ready += 1;
            log::debug!("source not ready; skipping sample");
            return Ok(None);
        }
        self.scratch.clear();
        let layout = source.draw(&mut self.scratch)?;
        let expected = width as usize * height as usize * layout.bytes_per_pixel();
        if self.scratch.len() != expected {
            return Err(anyhow!(
                "source drew {} bytes, expected {} for {}x{}",
                self.scratch.len(),
                expected,
                width,
                height
            ));
        }
        let frame = Frame::new(self.scratch.as_slice(), width, height, layout, 0)?
            .with_capture_time(now_ms);
        self.frames_sampled += 1;
        Ok(Some(frame))
    }

    pub fn frames_sampled(&self) -> u64 {
        self.frames_sampled
    }

    pub fn not_ready_ticks(&self) -> u64 {
        self.not_ready
    }
}
