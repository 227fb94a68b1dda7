//! EXIF extraction and normalization.
//!
//! [`extract`] reads the embedded tag segment of an image and produces an
//! [`ExifRecord`]: camera identity, capture settings, a normalized capture
//! timestamp, dimensions, orientation, and a signed-decimal GPS coordinate.
//!
//! Two distinct terminal states matter to callers:
//!
//! - `Ok(None)` — the file parsed fine but carries no tag segment. Valid,
//!   common (screenshots, stripped uploads), and not logged as a failure.
//! - `Err(_)` — the file could not be parsed at all.
//!
//! Fields absent from the source tags are absent from the record; nothing is
//! zero-filled.

mod reader;

pub use reader::{dms_to_decimal, extract, extract_sync, format_exposure, normalize_capture_timestamp};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalized EXIF data for one image.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExifRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera: Option<CameraInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<CaptureSettings>,
    /// Capture instant, normalized to UTC.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// EXIF orientation code (1–8).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps: Option<GpsCoordinate>,
}

impl ExifRecord {
    /// True when no group was populated at all.
    pub fn is_empty(&self) -> bool {
        self.camera.is_none()
            && self.settings.is_none()
            && self.date_time.is_none()
            && self.width.is_none()
            && self.height.is_none()
            && self.orientation.is_none()
            && self.gps.is_none()
    }
}

/// Camera identity tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub software: Option<String>,
}

/// Capture settings, rendered human-readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso: Option<u32>,
    /// e.g. `"f/2.8"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aperture: Option<String>,
    /// `"1/250"` for sub-second exposures, `"2s"` otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shutter_speed: Option<String>,
    /// e.g. `"50mm"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<String>,
    /// Whether the flash fired.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flash: Option<bool>,
}

/// GPS position in signed decimal degrees (negative = south / west).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpsCoordinate {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters; negative when below sea level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    /// GPS atomic clock time of the fix, `"HH:MM:SS"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Direction the camera pointed, degrees from north.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<f64>,
}
