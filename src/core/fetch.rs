//! Frame fetchers - the host's "load this URL into an image" hook
//!
//! The engine never decodes by itself; it hands each slot URL to a
//! `FrameFetcher` on a worker thread and gets back a `FrameImage` or a
//! `FetchError`.

use log::debug;
use std::path::{Path, PathBuf};

use crate::entities::{FetchError, FrameImage};

/// Loads one frame by URL. Called from worker threads.
pub trait FrameFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<FrameImage, FetchError>;
}

/// Reads frames from the local filesystem and decodes them with `image`.
///
/// Accepts plain paths and `file://` URLs; relative paths resolve against `root`.
#[derive(Debug, Clone, Default)]
pub struct FileFetcher {
    root: Option<PathBuf>,
}

impl FileFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, url: &str) -> PathBuf {
        let path = Path::new(url.strip_prefix("file://").unwrap_or(url));
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl FrameFetcher for FileFetcher {
    fn fetch(&self, url: &str) -> Result<FrameImage, FetchError> {
        let path = self.resolve(url);
        let reader = image::ImageReader::open(&path)
            .map_err(|e| FetchError::Io(format!("{}: {}", path.display(), e)))?
            .with_guessed_format()
            .map_err(|e| FetchError::Io(format!("{}: {}", path.display(), e)))?;
        let decoded = reader
            .decode()
            .map_err(|e| FetchError::Decode(format!("{}: {}", path.display(), e)))?;

        let frame = FrameImage::from_rgba(decoded.to_rgba8());
        if frame.is_empty() {
            return Err(FetchError::Empty);
        }
        debug!("Fetched {} ({}x{})", path.display(), frame.width(), frame.height());
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn temp_dir(tag: &str) -> PathBuf {
        let name = format!("scrubseq-fetch-{}-{}", tag, std::process::id());
        let dir = std::env::temp_dir().join(name);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_fetch_png_relative_to_root() {
        let dir = temp_dir("png");
        RgbaImage::from_pixel(3, 2, Rgba([9, 8, 7, 255]))
            .save(dir.join("f_001.png"))
            .unwrap();

        let fetcher = FileFetcher::with_root(&dir);
        let frame = fetcher.fetch("f_001.png").unwrap();
        assert_eq!((frame.width(), frame.height()), (3, 2));
        assert_eq!(frame.pixels().get_pixel(0, 0), &Rgba([9, 8, 7, 255]));

        let url = format!("file://{}", dir.join("f_001.png").display());
        assert!(FileFetcher::new().fetch(&url).is_ok());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_and_garbage_files() {
        let dir = temp_dir("bad");
        std::fs::write(dir.join("junk_000.png"), b"not an image").unwrap();
        let fetcher = FileFetcher::with_root(&dir);

        assert!(matches!(fetcher.fetch("nope_000.png"), Err(FetchError::Io(_))));
        assert!(fetcher.fetch("junk_000.png").is_err());

        std::fs::remove_dir_all(&dir).ok();
    }
}
