//! Reference photo loading.
//!
//! References are addressed by URL-ish strings (`/reference-photos/cozy-corner.jpg`,
//! `https://…`). They are loaded on every comparison; nothing is cached here.

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::frame::Frame;

pub trait ReferenceLoader: Send + Sync {
    fn load(&self, reference: &str) -> Result<Frame>;
}

/// In-memory references keyed by their address.
#[derive(Clone, Debug, Default)]
pub struct MemoryReferenceLoader {
    frames: HashMap<String, Frame>,
}

impl MemoryReferenceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reference: impl Into<String>, frame: Frame) {
        self.frames.insert(reference.into(), frame);
    }

    pub fn with(mut self, reference: impl Into<String>, frame: Frame) -> Self {
        self.insert(reference, frame);
        self
    }
}

impl ReferenceLoader for MemoryReferenceLoader {
    fn load(&self, reference: &str) -> Result<Frame> {
        self.frames
            .get(reference)
            .cloned()
            .ok_or_else(|| anyhow!("unknown reference image {}", reference))
    }
}

/// Resolve a reference address to a local path under `root`.
///
/// Leading slashes are stripped so site-absolute paths land inside the root; `..`
/// components are rejected.
pub fn resolve_local(root: &std::path::Path, reference: &str) -> Result<PathBuf> {
    let relative = reference.trim_start_matches('/');
    if relative.is_empty() {
        return Err(anyhow!("empty reference path"));
    }
    let relative = std::path::Path::new(relative);
    if relative
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return Err(anyhow!("reference path escapes root: {}", reference));
    }
    Ok(root.join(relative))
}

#[cfg(feature = "ingest-image")]
pub use image_loader::ImageReferenceLoader;
#[cfg(feature = "ingest-image")]
pub(crate) use image_loader::decode_frame;

#[cfg(feature = "ingest-image")]
mod image_loader {
    use anyhow::{anyhow, Context, Result};
    use image::GenericImageView;
    use std::path::PathBuf;

    use super::{resolve_local, ReferenceLoader};
    use crate::frame::{Frame, PixelLayout};

    /// Decodes reference photos from disk, or over HTTP(S) with `reference-http`.
    #[derive(Clone, Debug)]
    pub struct ImageReferenceLoader {
        root: PathBuf,
    }

    impl ImageReferenceLoader {
        pub fn new(root: impl Into<PathBuf>) -> Self {
            Self { root: root.into() }
        }

        fn read_bytes(&self, reference: &str) -> Result<Vec<u8>> {
            if reference.starts_with("http://") || reference.starts_with("https://") {
                return fetch_remote(reference);
            }
            let path = resolve_local(&self.root, reference)?;
            std::fs::read(&path)
                .with_context(|| format!("read reference image {}", path.display()))
        }
    }

    impl ReferenceLoader for ImageReferenceLoader {
        fn load(&self, reference: &str) -> Result<Frame> {
            let bytes = self.read_bytes(reference)?;
            if bytes.is_empty() {
                return Err(anyhow!("empty reference image {}", reference));
            }
            decode_frame(&bytes)
        }
    }

    pub(crate) fn decode_frame(bytes: &[u8]) -> Result<Frame> {
        let image = image::load_from_memory(bytes).context("decode reference image")?;
        let (width, height) = image.dimensions();
        let rgb = image.into_rgb8();
        Frame::new(rgb.into_raw(), width, height, PixelLayout::Rgb8, 0)
    }

    #[cfg(feature = "reference-http")]
    fn fetch_remote(reference: &str) -> Result<Vec<u8>> {
        use std::io::Read;

        let url = url::Url::parse(reference).context("parse reference url")?;
        let response = ureq::get(url.as_str())
            .call()
            .with_context(|| format!("fetch reference image from {}", url))?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .context("read reference image")?;
        Ok(bytes)
    }

    #[cfg(not(feature = "reference-http"))]
    fn fetch_remote(reference: &str) -> Result<Vec<u8>> {
        Err(anyhow!(
            "remote reference {} requires the reference-http feature",
            reference
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn memory_loader_returns_clone() -> Result<()> {
        let loader = MemoryReferenceLoader::new().with("/a.jpg", Frame::uniform(2, 2, [1, 2, 3]));
        assert_eq!(loader.load("/a.jpg")?.rgb_at(1, 1), [1, 2, 3]);
        assert!(loader.load("/missing.jpg").is_err());
        Ok(())
    }

    #[test]
    fn resolves_site_absolute_paths_under_root() -> Result<()> {
        let path = resolve_local(Path::new("/srv/www"), "/reference-photos/kitchen.jpg")?;
        assert_eq!(path, Path::new("/srv/www/reference-photos/kitchen.jpg"));
        assert!(resolve_local(Path::new("/srv"), "/../etc/passwd").is_err());
        assert!(resolve_local(Path::new("/srv"), "/").is_err());
        Ok(())
    }

    #[cfg(feature = "ingest-image")]
    #[test]
    fn image_loader_decodes_png_from_disk() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let photos = dir.path().join("reference-photos");
        std::fs::create_dir_all(&photos)?;
        let img = image::RgbImage::from_pixel(3, 2, image::Rgb([9, 8, 7]));
        img.save(photos.join("corner.png"))?;

        let loader = ImageReferenceLoader::new(dir.path());
        let frame = loader.load("/reference-photos/corner.png")?;
        assert_eq!((frame.width(), frame.height()), (3, 2));
        assert_eq!(frame.rgb_at(2, 1), [9, 8, 7]);
        Ok(())
    }
}
