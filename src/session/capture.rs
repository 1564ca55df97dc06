use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::frame::PixelLayout;
use crate::ingest::VideoSource;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    User,
    Environment,
}

/// Resolution and device hints passed to the capture device.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub facing: FacingMode,
    pub audio: bool,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            ideal_width: 1280,
            ideal_height: 720,
            facing: FacingMode::Environment,
            audio: true,
        }
    }
}

/// A camera/microphone handle that must be acquired before use and released after.
pub trait CaptureDevice: Send {
    fn acquire(&mut self, constraints: &CaptureConstraints) -> Result<()>;
    fn release(&mut self);
}

/// Holds an acquired device and releases it on every exit path.
pub struct CaptureGuard<D: CaptureDevice> {
    device: D,
    released: bool,
}

impl<D: CaptureDevice> CaptureGuard<D> {
    /// Acquire the device. On failure the device is dropped; callers may retry with a new one.
    pub fn acquire(mut device: D, constraints: &CaptureConstraints) -> Result<Self, SessionError> {
        device
            .acquire(constraints)
            .map_err(|e| SessionError::CaptureUnavailable(format!("{:#}", e)))?;
        Ok(Self {
            device,
            released: false,
        })
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Release early. Idempotent.
    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.device.release();
        }
    }
}

impl<D: CaptureDevice> Drop for CaptureGuard<D> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<D: CaptureDevice + VideoSource> VideoSource for CaptureGuard<D> {
    fn dimensions(&self) -> (u32, u32) {
        if self.released {
            (0, 0)
        } else {
            self.device.dimensions()
        }
    }

    fn draw(&mut self, buf: &mut Vec<u8>) -> Result<PixelLayout> {
        self.device.draw(buf)
    }
}
