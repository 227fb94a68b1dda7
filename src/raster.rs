//! Header-level raster properties for a stored image.
//!
//! Reads dimensions, format, and color layout from the image header without
//! decoding pixel data, so corrupt or enormous files cost little. Density
//! (DPI) is taken from the containers that declare it — the JFIF APP0
//! segment for JPEG and the pHYs chunk for PNG — and omitted otherwise.

use image::{ColorType, ImageDecoder, ImageReader};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::EnrichError;

/// How much of the file the density probe is willing to scan. Both JFIF
/// APP0 and pHYs sit near the start of the stream.
const DENSITY_SCAN_LIMIT: usize = 64 * 1024;

/// Basic properties of a raster image, read from its header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RasterMetadata {
    pub width: u32,
    pub height: u32,
    /// Lowercase format name, e.g. `"jpeg"`, `"png"`, `"webp"`.
    pub format: String,
    /// File size in bytes.
    pub size: u64,
    pub has_alpha: bool,
    /// `"srgb"` for color images, `"b-w"` for grayscale.
    pub color_space: String,
    /// Declared DPI, when the container carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub density: Option<f64>,
    /// Width over height, rounded to 2 decimals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<f64>,
}

/// Inspect an image file without decoding its pixels.
pub async fn inspect(path: &Path) -> Result<RasterMetadata, EnrichError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || inspect_sync(&path))
        .await
        .map_err(|e| EnrichError::extractor("raster", e))?
}

fn inspect_sync(path: &Path) -> Result<RasterMetadata, EnrichError> {
    let size = std::fs::metadata(path)
        .map_err(|e| EnrichError::extractor("raster", e))?
        .len();

    let reader = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| EnrichError::extractor("raster", e))?;
    let format = reader.format().ok_or_else(|| {
        EnrichError::extractor("raster", "unrecognized image format")
    })?;

    let decoder = reader
        .into_decoder()
        .map_err(|e| EnrichError::extractor("raster", e))?;
    let (width, height) = decoder.dimensions();
    let color = decoder.color_type();

    let aspect_ratio = if height > 0 {
        Some(round2(width as f64 / height as f64))
    } else {
        None
    };

    Ok(RasterMetadata {
        width,
        height,
        format: format!("{format:?}").to_lowercase(),
        size,
        has_alpha: color.has_alpha(),
        color_space: color_space_name(color).to_string(),
        density: probe_density(path),
        aspect_ratio,
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn color_space_name(color: ColorType) -> &'static str {
    match color {
        ColorType::L8 | ColorType::L16 | ColorType::La8 | ColorType::La16 => "b-w",
        _ => "srgb",
    }
}

/// Read the declared DPI from the file header, if any.
fn probe_density(path: &Path) -> Option<f64> {
    use std::io::Read;

    let mut head = Vec::new();
    std::fs::File::open(path)
        .ok()?
        .take(DENSITY_SCAN_LIMIT as u64)
        .read_to_end(&mut head)
        .ok()?;

    if head.starts_with(&[0xFF, 0xD8]) {
        jfif_density(&head)
    } else if head.starts_with(b"\x89PNG\r\n\x1a\n") {
        phys_density(&head)
    } else {
        None
    }
}

/// JFIF APP0: `FF E0 <len> "JFIF\0" <ver> <units> <xdensity> <ydensity>`.
fn jfif_density(bytes: &[u8]) -> Option<f64> {
    let mut i = 2; // past SOI
    while i + 4 <= bytes.len() {
        if bytes[i] != 0xFF {
            return None;
        }
        let marker = bytes[i + 1];
        if marker == 0xDA {
            // start of scan, no APP0 before it
            return None;
        }
        let len = u16::from_be_bytes([bytes[i + 2], bytes[i + 3]]) as usize;
        let payload = bytes.get(i + 4..i + 2 + len)?;
        if marker == 0xE0 && payload.len() >= 12 && &payload[0..5] == b"JFIF\0" {
            let units = payload[7];
            let x_density = u16::from_be_bytes([payload[8], payload[9]]) as f64;
            return match units {
                1 => Some(x_density),               // dots per inch
                2 => Some((x_density * 2.54).round()), // dots per cm
                _ => None,                          // aspect-ratio only
            };
        }
        i += 2 + len;
    }
    None
}

/// PNG pHYs chunk: pixels per unit (X, Y) plus a unit flag (1 = meter).
fn phys_density(bytes: &[u8]) -> Option<f64> {
    let mut i = 8; // past signature
    while i + 8 <= bytes.len() {
        let len = u32::from_be_bytes(bytes[i..i + 4].try_into().ok()?) as usize;
        let chunk_type = &bytes[i + 4..i + 8];
        if chunk_type == b"pHYs" {
            let data = bytes.get(i + 8..i + 8 + 9)?;
            let ppu_x = u32::from_be_bytes(data[0..4].try_into().ok()?) as f64;
            return match data[8] {
                1 => Some((ppu_x * 0.0254).round()), // per meter -> per inch
                _ => None,
            };
        }
        if chunk_type == b"IDAT" || chunk_type == b"IEND" {
            return None;
        }
        i += 8 + len + 4; // length + type + data + crc
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;
    use std::fs;
    use tempfile::TempDir;

    fn write_png(dir: &TempDir, name: &str, width: u32, height: u32) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let img = RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        img.save(&path).unwrap();
        path
    }

    #[tokio::test]
    async fn inspect_reads_header_properties() {
        let dir = TempDir::new().unwrap();
        let path = write_png(&dir, "wide.png", 4, 2);

        let meta = inspect(&path).await.unwrap();
        assert_eq!(meta.width, 4);
        assert_eq!(meta.height, 2);
        assert_eq!(meta.format, "png");
        assert!(meta.has_alpha);
        assert_eq!(meta.color_space, "srgb");
        assert_eq!(meta.aspect_ratio, Some(2.0));
        assert!(meta.size > 0);
    }

    #[tokio::test]
    async fn aspect_ratio_rounds_to_two_decimals() {
        let dir = TempDir::new().unwrap();
        let path = write_png(&dir, "odd.png", 3, 9);

        let meta = inspect(&path).await.unwrap();
        assert_eq!(meta.aspect_ratio, Some(0.33));
    }

    #[tokio::test]
    async fn inspect_non_image_is_typed_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, b"not an image at all").unwrap();

        let err = inspect(&path).await.unwrap_err();
        assert!(matches!(err, EnrichError::Extractor { stage: "raster", .. }));
    }

    #[tokio::test]
    async fn inspect_missing_file_is_typed_failure() {
        let err = inspect(Path::new("/nonexistent/ghost.png")).await.unwrap_err();
        assert!(matches!(err, EnrichError::Extractor { stage: "raster", .. }));
    }

    // ── density probes ───────────────────────────────────────────────

    #[test]
    fn jfif_density_dpi_units() {
        // SOI + APP0 with units=1 (dpi), density 300x300
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        bytes.extend_from_slice(b"JFIF\0");
        bytes.extend_from_slice(&[1, 2]); // version
        bytes.push(1); // units: dpi
        bytes.extend_from_slice(&300u16.to_be_bytes());
        bytes.extend_from_slice(&300u16.to_be_bytes());
        bytes.extend_from_slice(&[0, 0]); // thumbnail dims

        assert_eq!(jfif_density(&bytes), Some(300.0));
    }

    #[test]
    fn jfif_density_aspect_only_is_none() {
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        bytes.extend_from_slice(b"JFIF\0");
        bytes.extend_from_slice(&[1, 2]);
        bytes.push(0); // units: aspect ratio only
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.extend_from_slice(&[0, 0]);

        assert_eq!(jfif_density(&bytes), None);
    }

    #[test]
    fn phys_density_meters_to_dpi() {
        // 2835 pixels per meter ~ 72 dpi
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.extend_from_slice(&9u32.to_be_bytes());
        bytes.extend_from_slice(b"pHYs");
        bytes.extend_from_slice(&2835u32.to_be_bytes());
        bytes.extend_from_slice(&2835u32.to_be_bytes());
        bytes.push(1);
        bytes.extend_from_slice(&[0, 0, 0, 0]); // crc, unchecked

        assert_eq!(phys_density(&bytes), Some(72.0));
    }

    #[test]
    fn plain_png_has_no_density() {
        let dir = TempDir::new().unwrap();
        let path = write_png(&dir, "plain.png", 2, 2);
        assert_eq!(probe_density(&path), None);
    }
}
