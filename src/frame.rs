//! Frame container.
//!
//! - `Frame`: immutable width×height grid of RGB(A) samples captured at one instant.
//! - `PixelLayout`: how many bytes each sample occupies.
//!
//! Frames are cheap to clone (the pixel buffer is shared) so the control loop can hand
//! the same capture to the heuristic scorer and to an inference worker without copying.
//! There is no mutable access to pixels after construction.

use anyhow::{anyhow, Result};
use std::sync::Arc;

/// Luminance weights (ITU-R BT.601).
const LUMA_R: f32 = 0.299;
const LUMA_G: f32 = 0.587;
const LUMA_B: f32 = 0.114;

/// Perceived luminance of an RGB sample.
#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> f32 {
    LUMA_R * r as f32 + LUMA_G * g as f32 + LUMA_B * b as f32
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    Rgb8,
    Rgba8,
}

impl PixelLayout {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelLayout::Rgb8 => 3,
            PixelLayout::Rgba8 => 4,
        }
    }
}

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// One captured bitmap.
#[derive(Clone)]
pub struct Frame {
    data: Arc<[u8]>,
    width: u32,
    height: u32,
    layout: PixelLayout,
    /// Wall-clock capture time in milliseconds (clock supplied by the sampler).
    captured_at_ms: u64,
}

impl Frame {
    /// Build a frame, validating that the buffer covers exactly `width × height` samples.
    pub fn new(
        data: impl Into<Arc<[u8]>>,
        width: u32,
        height: u32,
        layout: PixelLayout,
        captured_at_ms: u64,
    ) -> Result<Self> {
        let data = data.into();
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(layout.bytes_per_pixel()))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "frame length mismatch: expected {} bytes for {}x{} {:?}, got {}",
                expected,
                width,
                height,
                layout,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            layout,
            captured_at_ms,
        })
    }

    /// Convenience constructor for RGBA buffers.
    pub fn rgba(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        Self::new(data, width, height, PixelLayout::Rgba8, 0)
    }

    /// A frame filled with one color.
    pub fn uniform(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let count = width as usize * height as usize;
        let mut data = Vec::with_capacity(count * 4);
        for _ in 0..count {
            data.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
        }
        Self {
            data: data.into(),
            width,
            height,
            layout: PixelLayout::Rgba8,
            captured_at_ms: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn captured_at_ms(&self) -> u64 {
        self.captured_at_ms
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.layout.bytes_per_pixel()
    }

    /// Read-only view of the interleaved samples.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// RGB at pixel coordinates. Caller guarantees `x < width`, `y < height`.
    #[inline]
    pub fn rgb_at(&self, x: u32, y: u32) -> [u8; 3] {
        let bpp = self.bytes_per_pixel();
        let i = (y as usize * self.width as usize + x as usize) * bpp;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// Nearest-neighbour resample into a packed RGB buffer of `width × height`.
    ///
    /// Used to feed fixed-size model inputs.
    pub fn resample_rgb(&self, width: u32, height: u32) -> Result<Vec<u8>> {
        if self.is_empty() {
            return Err(anyhow!("cannot resample an empty frame"));
        }
        if width == 0 || height == 0 {
            return Err(anyhow!("resample target must be non-empty"));
        }
        let mut out = Vec::with_capacity(width as usize * height as usize * 3);
        for ty in 0..height {
            let sy = (ty as u64 * self.height as u64 / height as u64) as u32;
            for tx in 0..width {
                let sx = (tx as u64 * self.width as u64 / width as u64) as u32;
                out.extend_from_slice(&self.rgb_at(sx, sy));
            }
        }
        Ok(out)
    }

    /// Re-stamp a frame with its capture time without copying pixels.
    pub(crate) fn with_capture_time(mut self, captured_at_ms: u64) -> Self {
        self.captured_at_ms = captured_at_ms;
        self
    }
}

impl std::fmt::Debug for Frame {
    // Pixel contents are never printed.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("layout", &self.layout)
            .field("captured_at_ms", &self.captured_at_ms)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
