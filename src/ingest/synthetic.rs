//! Synthetic frame source (`stub://`) for tests and demos.

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::frame::PixelLayout;
use crate::ingest::VideoSource;
use crate::session::{CaptureConstraints, CaptureDevice};

const CHECKER_CELL: u32 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyntheticScene {
    /// Uniform mid-gray.
    Gray,
    /// Horizontal gradient drifting by one step per frame.
    Gradient,
    /// Light/dark checkerboard; high edge density.
    Checker,
    /// Seeded RGB noise.
    Noise,
    /// Reports a zero size forever.
    NotReady,
    /// Refuses capture acquisition.
    Denied,
}

impl SyntheticScene {
    fn parse(name: &str) -> Result<Self> {
        match name {
            "gray" => Ok(Self::Gray),
            "gradient" => Ok(Self::Gradient),
            "checker" => Ok(Self::Checker),
            "noise" => Ok(Self::Noise),
            "not-ready" => Ok(Self::NotReady),
            "denied" => Ok(Self::Denied),
            other => Err(anyhow!("unknown synthetic scene '{}'", other)),
        }
    }
}

/// Acquire/release counters shared with whoever created the source.
#[derive(Debug, Default)]
pub struct CaptureStats {
    pub acquired: AtomicU64,
    pub released: AtomicU64,
}

impl CaptureStats {
    /// Acquisitions not yet released.
    pub fn active(&self) -> u64 {
        self.acquired
            .load(Ordering::SeqCst)
            .saturating_sub(self.released.load(Ordering::SeqCst))
    }
}

pub struct SyntheticSource {
    url: String,
    scene: SyntheticScene,
    width: u32,
    height: u32,
    frame_count: u64,
    rng: StdRng,
    stats: Arc<CaptureStats>,
}

impl SyntheticSource {
    /// Open `stub://<scene>` at the given resolution.
    pub fn open(url: &str, width: u32, height: u32) -> Result<Self> {
        let name = url
            .strip_prefix("stub://")
            .ok_or_else(|| anyhow!("synthetic sources use stub:// urls, got {}", url))?;
        let scene = SyntheticScene::parse(name)?;
        Ok(Self {
            url: url.to_string(),
            scene,
            width,
            height,
            frame_count: 0,
            rng: StdRng::seed_from_u64(0x5eed),
            stats: Arc::new(CaptureStats::default()),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn scene(&self) -> SyntheticScene {
        self.scene
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frame_count
    }

    pub fn capture_stats(&self) -> Arc<CaptureStats> {
        self.stats.clone()
    }

    fn pixel(&mut self, x: u32, y: u32) -> [u8; 3] {
        match self.scene {
            SyntheticScene::Gray | SyntheticScene::NotReady | SyntheticScene::Denied => {
                [128, 128, 128]
            }
            SyntheticScene::Gradient => {
                let v = ((x as u64 * 255 / self.width.max(1) as u64 + self.frame_count) % 256) as u8;
                [v, v / 2, 255 - v]
            }
            SyntheticScene::Checker => {
                if (x / CHECKER_CELL + y / CHECKER_CELL) % 2 == 0 {
                    [235, 235, 235]
                } else {
                    [30, 30, 30]
                }
            }
            SyntheticScene::Noise => {
                let v = self.rng.next_u32().to_le_bytes();
                [v[0], v[1], v[2]]
            }
        }
    }
}

impl VideoSource for SyntheticSource {
    fn dimensions(&self) -> (u32, u32) {
        match self.scene {
            SyntheticScene::NotReady => (0, 0),
            _ => (self.width, self.height),
        }
    }

    fn draw(&mut self, buf: &mut Vec<u8>) -> Result<PixelLayout> {
        let (width, height) = self.dimensions();
        buf.clear();
        buf.reserve(width as usize * height as usize * 4);
        for y in 0..height {
            for x in 0..width {
                let [r, g, b] = self.pixel(x, y);
                buf.extend_from_slice(&[r, g, b, 255]);
            }
        }
        self.frame_count += 1;
        Ok(PixelLayout::Rgba8)
    }
}

impl CaptureDevice for SyntheticSource {
    fn acquire(&mut self, constraints: &CaptureConstraints) -> Result<()> {
        if self.scene == SyntheticScene::Denied {
            return Err(anyhow!("permission denied for {}", self.url));
        }
        log::info!(
            "SyntheticSource: acquired {} ({}x{}, ideal {}x{})",
            self.url,
            self.width,
            self.height,
            constraints.ideal_width,
            constraints.ideal_height
        );
        self.stats.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&mut self) {
        self.stats.released.fetch_add(1, Ordering::SeqCst);
        log::info!("SyntheticSource: released {}", self.url);
    }
}
