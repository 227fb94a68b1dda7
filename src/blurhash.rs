//! BlurHash placeholder strings for stored images.
//!
//! The hash is computed from a small downsampled copy of the image, so the
//! cost is dominated by the decode. Component grid and bounding box are
//! fixed: determinism across runs matters more than fidelity here, because
//! the hash is persisted once and compared against re-runs.

use image::imageops::FilterType;
use std::path::Path;

use crate::error::EnrichError;

/// Downsample bound. The raster is resized to fit inside this box while
/// preserving aspect ratio before encoding.
const DOWNSAMPLE_BOUND: u32 = 32;

/// Fixed BlurHash component grid.
const COMPONENTS_X: u32 = 4;
const COMPONENTS_Y: u32 = 4;

/// Compute the BlurHash string for an image file.
pub async fn encode_file(path: &Path) -> Result<String, EnrichError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || encode_sync(&path))
        .await
        .map_err(|e| EnrichError::extractor("blurhash", e))?
}

fn encode_sync(path: &Path) -> Result<String, EnrichError> {
    let img = image::open(path).map_err(|e| EnrichError::extractor("blurhash", e))?;

    // Fit inside the bound, force an alpha channel.
    let small = img
        .resize(DOWNSAMPLE_BOUND, DOWNSAMPLE_BOUND, FilterType::Triangle)
        .to_rgba8();
    let (width, height) = small.dimensions();

    blurhash::encode(COMPONENTS_X, COMPONENTS_Y, width, height, small.as_raw())
        .map_err(|e| EnrichError::extractor("blurhash", format!("{e:?}")))
}
