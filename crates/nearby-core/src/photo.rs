//! Photo scaling and the content-addressed photo asset store
//!
//! Contact photos travel as raw image bytes. Before a photo is shown or
//! persisted it is scaled down to a reasonable size, re-encoded as PNG, and
//! stored under its content hash so concurrent exchanges of the same image
//! never write the same asset twice.

use std::collections::HashSet;
use std::fs;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Mutex;

use sha2::{Digest, Sha256};
use tracing::debug;

/// Longest allowed side of a stored contact photo, in pixels
pub const REASONABLE_PHOTO_SIZE: u32 = 200;

// ----------------------------------------------------------------------------
// Scaling
// ----------------------------------------------------------------------------

/// Decode image bytes and scale them so the longest side is at most
/// [`REASONABLE_PHOTO_SIZE`], preserving the aspect ratio.
///
/// Returns the PNG encoding of the scaled image, or `None` when the bytes do
/// not decode to a supported image format.
pub fn scale_to_reasonable(bytes: &[u8]) -> Option<Vec<u8>> {
    let img = image::load_from_memory(bytes).ok()?;

    let scaled = if img.width() > REASONABLE_PHOTO_SIZE || img.height() > REASONABLE_PHOTO_SIZE {
        img.thumbnail(REASONABLE_PHOTO_SIZE, REASONABLE_PHOTO_SIZE)
    } else {
        img
    };

    let mut out = Cursor::new(Vec::new());
    scaled
        .write_to(&mut out, image::ImageOutputFormat::Png)
        .ok()?;
    Some(out.into_inner())
}

/// Content hash used to name photo assets
pub fn content_hash(png: &[u8]) -> String {
    hex::encode(Sha256::digest(png))
}

// ----------------------------------------------------------------------------
// Photo Store
// ----------------------------------------------------------------------------

/// Content-addressed storage for contact photo assets
pub trait PhotoStore: Send + Sync {
    /// Persist a PNG asset under the given content hash, or reuse the
    /// existing asset when one is already stored under that hash. Returns a
    /// local handle to the asset.
    fn put_or_reuse(&self, hash: &str, png: &[u8]) -> std::io::Result<PathBuf>;

    /// Remove assets that are no longer referenced, returning the removed
    /// paths.
    fn sweep_stale(&self) -> Vec<PathBuf>;
}

/// Filesystem-backed [`PhotoStore`] keeping one `<hash>.png` file per asset
pub struct AssetStore {
    dir: PathBuf,
    referenced: Mutex<HashSet<String>>,
}

impl AssetStore {
    /// Open (creating if necessary) an asset directory
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            referenced: Mutex::new(HashSet::new()),
        })
    }

    fn asset_path(&self, hash: &str) -> PathBuf {
        self.dir.join(format!("{hash}.png"))
    }
}

impl PhotoStore for AssetStore {
    fn put_or_reuse(&self, hash: &str, png: &[u8]) -> std::io::Result<PathBuf> {
        let path = self.asset_path(hash);
        self.referenced
            .lock()
            .expect("asset store lock poisoned")
            .insert(hash.to_string());

        if path.exists() {
            debug!(%hash, "reusing existing photo asset");
        } else {
            fs::write(&path, png)?;
            debug!(%hash, path = %path.display(), "saved photo asset");
        }
        Ok(path)
    }

    fn sweep_stale(&self) -> Vec<PathBuf> {
        let referenced = self
            .referenced
            .lock()
            .expect("asset store lock poisoned")
            .clone();

        let mut removed = Vec::new();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return removed,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let stem = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or_default();
            let is_png = path.extension().is_some_and(|ext| ext == "png");

            if is_png && !referenced.contains(stem) && fs::remove_file(&path).is_ok() {
                removed.push(path);
            }
        }
        removed
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([40, 80, 120]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, image::ImageOutputFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn scaling_caps_the_longest_side() {
        let png = sample_png(400, 100);
        let scaled = scale_to_reasonable(&png).unwrap();
        let img = image::load_from_memory(&scaled).unwrap();
        assert!(img.width() <= REASONABLE_PHOTO_SIZE);
        assert!(img.height() <= REASONABLE_PHOTO_SIZE);
    }

    #[test]
    fn small_images_are_not_upscaled() {
        let png = sample_png(16, 16);
        let scaled = scale_to_reasonable(&png).unwrap();
        let img = image::load_from_memory(&scaled).unwrap();
        assert_eq!((img.width(), img.height()), (16, 16));
    }

    #[test]
    fn non_image_bytes_are_rejected() {
        assert!(scale_to_reasonable(b"definitely not an image").is_none());
    }

    #[test]
    fn put_or_reuse_writes_once_per_hash() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::open(dir.path()).unwrap();
        let png = sample_png(8, 8);
        let hash = content_hash(&png);

        let first = store.put_or_reuse(&hash, &png).unwrap();
        let second = store.put_or_reuse(&hash, &png).unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn sweep_removes_unreferenced_assets() {
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::open(dir.path()).unwrap();
        let png = sample_png(8, 8);
        let hash = content_hash(&png);
        store.put_or_reuse(&hash, &png).unwrap();

        // An asset left behind by an earlier session, unknown to this store.
        fs::write(dir.path().join("deadbeef.png"), b"old").unwrap();

        let removed = store.sweep_stale();
        assert_eq!(removed.len(), 1);
        assert!(removed[0].ends_with("deadbeef.png"));
        assert!(store.asset_path(&hash).exists());
    }
}
