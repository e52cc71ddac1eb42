//! Lead-image variant generation.
//!
//! Takes raw image bytes and writes independent resized renditions at three
//! fixed maximum widths, re-encoded as JPEG at a fixed quality. Undecodable
//! bytes yield an empty variant map (a missing or unsupported image is
//! tolerated), and a failure on one width skips that rendition alone. Each
//! rendition is encoded fully into memory before the file write, so a failed
//! encode never leaves a partial file on disk.

use image::codecs::jpeg::JpegEncoder;
use image::GenericImageView;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Target maximum widths, in pixels. The width label doubles as the variant
/// key in the persisted article.
pub const VARIANT_WIDTHS: [u32; 3] = [320, 640, 1024];

const JPEG_QUALITY: u8 = 80;

/// Height bound passed alongside each width; tall enough that only the width
/// ever constrains scaling.
const MAX_HEIGHT: u32 = 10_000;

/// Decode `blob` and write one rendition per target width into `image_dir`.
///
/// Returns the mapping from width label to the file's path relative to the
/// site's asset root (`images/<base>-<width>.jpg`). Smaller source images are
/// re-encoded at their native size rather than upscaled.
pub fn write_variants(blob: &[u8], base: &str, image_dir: &Path) -> BTreeMap<String, String> {
    let mut variants = BTreeMap::new();
    let img = match image::load_from_memory(blob) {
        Ok(img) => img,
        Err(e) => {
            debug!(error = %e, bytes = blob.len(), "Image bytes did not decode; skipping variants");
            return variants;
        }
    };

    for width in VARIANT_WIDTHS {
        let scaled = if img.width() > width {
            img.thumbnail(width, MAX_HEIGHT)
        } else {
            img.clone()
        };
        let rgb = scaled.to_rgb8();

        let mut encoded = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY);
        if let Err(e) = encoder.encode_image(&rgb) {
            warn!(width, error = %e, "Failed to encode rendition; skipping width");
            continue;
        }

        let filename = format!("{base}-{width}.jpg");
        let path = image_dir.join(&filename);
        if let Err(e) = std::fs::write(&path, &encoded) {
            warn!(width, path = %path.display(), error = %e, "Failed to write rendition; skipping width");
            continue;
        }
        variants.insert(width.to_string(), format!("images/{filename}"));
    }

    debug!(count = variants.len(), base, "Wrote image variants");
    variants
}
