//! Still image source.
//!
//! Serves one decoded image as a live source. Used by `frame_score` and for replaying
//! reference photos through the session pipeline.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use crate::analysis::reference::decode_frame;
use crate::frame::{Frame, PixelLayout};
use crate::ingest::VideoSource;
use crate::session::{CaptureConstraints, CaptureDevice};

pub struct StillImageSource {
    path: PathBuf,
    frame: Frame,
}

impl StillImageSource {
    /// Decode a local image file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.to_string_lossy().contains("://") {
            return Err(anyhow!("still image source only supports local paths"));
        }
        let bytes = std::fs::read(path).with_context(|| format!("read image {}", path.display()))?;
        let frame = decode_frame(&bytes).with_context(|| format!("decode image {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            frame,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The decoded image.
    pub fn frame(&self) -> &Frame {
        &self.frame
    }
}

impl VideoSource for StillImageSource {
    fn dimensions(&self) -> (u32, u32) {
        (self.frame.width(), self.frame.height())
    }

    fn draw(&mut self, buf: &mut Vec<u8>) -> Result<PixelLayout> {
        buf.clear();
        buf.extend_from_slice(self.frame.pixels());
        Ok(self.frame.layout())
    }
}

impl CaptureDevice for StillImageSource {
    fn acquire(&mut self, _constraints: &CaptureConstraints) -> Result<()> {
        log::info!("StillImageSource: opened {}", self.path.display());
        Ok(())
    }

    fn release(&mut self) {}
}
