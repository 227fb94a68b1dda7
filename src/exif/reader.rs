use chrono::{DateTime, NaiveDateTime, Utc};
use exif::{In, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::{CameraInfo, CaptureSettings, ExifRecord, GpsCoordinate};
use crate::error::EnrichError;

/// Extract EXIF data from an image file.
///
/// Returns `Ok(None)` when the file carries no tag segment, or when the
/// segment exists but yields no usable fields.
pub async fn extract(path: &Path) -> Result<Option<ExifRecord>, EnrichError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || extract_sync(&path))
        .await
        .map_err(|e| EnrichError::extractor("exif", e))?
}

/// Blocking core of [`extract`].
pub fn extract_sync(path: &Path) -> Result<Option<ExifRecord>, EnrichError> {
    let file = File::open(path).map_err(|e| EnrichError::extractor("exif", e))?;
    let mut reader = BufReader::new(file);

    let exif = match exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif) => exif,
        // No tag segment is a valid terminal state, distinct from a parse error.
        Err(exif::Error::NotFound(_)) => return Ok(None),
        Err(e) => return Err(EnrichError::extractor("exif", e)),
    };

    let record = build_record(&exif);
    Ok(if record.is_empty() { None } else { Some(record) })
}

fn build_record(exif: &exif::Exif) -> ExifRecord {
    let mut record = ExifRecord::default();

    let make = text_field(exif, Tag::Make);
    let model = text_field(exif, Tag::Model);
    let software = text_field(exif, Tag::Software);
    if make.is_some() || model.is_some() || software.is_some() {
        record.camera = Some(CameraInfo { make, model, software });
    }

    let iso = uint_field(exif, Tag::PhotographicSensitivity);
    let aperture = rational_field(exif, Tag::FNumber).map(|f| format!("f/{f}"));
    let shutter_speed = rational_field(exif, Tag::ExposureTime).map(format_exposure);
    let focal_length = rational_field(exif, Tag::FocalLength).map(|f| format!("{f}mm"));
    let flash = uint_field(exif, Tag::Flash).map(|bits| bits & 1 == 1);
    if iso.is_some()
        || aperture.is_some()
        || shutter_speed.is_some()
        || focal_length.is_some()
        || flash.is_some()
    {
        record.settings = Some(CaptureSettings {
            iso,
            aperture,
            shutter_speed,
            focal_length,
            flash,
        });
    }

    record.date_time = raw_ascii(exif, Tag::DateTimeOriginal)
        .or_else(|| raw_ascii(exif, Tag::DateTime))
        .and_then(|raw| normalize_capture_timestamp(&raw));

    record.width =
        uint_field(exif, Tag::PixelXDimension).or_else(|| uint_field(exif, Tag::ImageWidth));
    record.height =
        uint_field(exif, Tag::PixelYDimension).or_else(|| uint_field(exif, Tag::ImageLength));
    record.orientation = uint_field(exif, Tag::Orientation);

    record.gps = extract_gps(exif);

    record
}

/// Read a text tag, stripping the quoting that display formatting adds.
fn text_field(exif: &exif::Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let s = field
        .display_value()
        .to_string()
        .trim()
        .trim_matches('"')
        .to_string();
    if s.is_empty() { None } else { Some(s) }
}

/// Read an ASCII tag verbatim, without display formatting.
fn raw_ascii(exif: &exif::Exif, tag: Tag) -> Option<String> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Ascii(v) if !v.is_empty() => {
            let s = String::from_utf8_lossy(&v[0]).trim().to_string();
            if s.is_empty() { None } else { Some(s) }
        }
        _ => None,
    }
}

fn uint_field(exif: &exif::Exif, tag: Tag) -> Option<u32> {
    exif.get_field(tag, In::PRIMARY)?.value.get_uint(0)
}

fn rational_field(exif: &exif::Exif, tag: Tag) -> Option<f64> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Rational(r) if !r.is_empty() => Some(r[0].to_f64()),
        _ => None,
    }
}

/// Render an exposure time: `"1/250"` when sub-second, `"2s"` otherwise.
pub fn format_exposure(seconds: f64) -> String {
    if seconds > 0.0 && seconds < 1.0 {
        format!("1/{}", (1.0 / seconds).round())
    } else {
        format!("{seconds}s")
    }
}

/// Normalize a capture timestamp string to a UTC instant.
///
/// Accepts RFC 3339, `"YYYY-MM-DD HH:MM:SS"` (with space or `T`), and the
/// tag-native `"YYYY:MM:DD HH:MM:SS"` form. Anything else yields `None`.
pub fn normalize_capture_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim().trim_matches('"').trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
        }
    }

    // Tag-native form: rewrite the date separators and retry.
    let rewritten = rewrite_exif_date(s)?;
    NaiveDateTime::parse_from_str(&rewritten, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

/// `"YYYY:MM:DD ..."` → `"YYYY-MM-DD ..."`.
fn rewrite_exif_date(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    if bytes.len() >= 10 && bytes[4] == b':' && bytes[7] == b':' {
        let mut out = s.to_string();
        out.replace_range(4..5, "-");
        out.replace_range(7..8, "-");
        Some(out)
    } else {
        None
    }
}

fn extract_gps(exif: &exif::Exif) -> Option<GpsCoordinate> {
    // Both coordinates are required; partial GPS tags yield no gps field.
    let latitude = dms_field(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef)?;
    let longitude = dms_field(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef)?;

    let altitude = rational_field(exif, Tag::GPSAltitude).map(|alt| {
        // ref 1 = below sea level
        if uint_field(exif, Tag::GPSAltitudeRef) == Some(1) {
            -alt
        } else {
            alt
        }
    });

    Some(GpsCoordinate {
        latitude,
        longitude,
        altitude,
        timestamp: gps_timestamp(exif),
        direction: rational_field(exif, Tag::GPSImgDirection),
    })
}

/// Read one coordinate axis: DMS rationals plus hemisphere reference.
fn dms_field(exif: &exif::Exif, tag: Tag, ref_tag: Tag) -> Option<f64> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let reference = exif
        .get_field(ref_tag, In::PRIMARY)?
        .display_value()
        .to_string();

    match &field.value {
        Value::Rational(r) if r.len() >= 3 => Some(dms_to_decimal(
            r[0].to_f64(),
            r[1].to_f64(),
            r[2].to_f64(),
            &reference,
        )),
        _ => None,
    }
}

/// Convert degrees/minutes/seconds plus a hemisphere reference to signed
/// decimal degrees, rounded to 6 places.
pub fn dms_to_decimal(degrees: f64, minutes: f64, seconds: f64, reference: &str) -> f64 {
    let dd = degrees + minutes / 60.0 + seconds / 3600.0;
    let signed = if reference.contains('S') || reference.contains('W') {
        -dd
    } else {
        dd
    };
    (signed * 1_000_000.0).round() / 1_000_000.0
}

fn gps_timestamp(exif: &exif::Exif) -> Option<String> {
    match &exif.get_field(Tag::GPSTimeStamp, In::PRIMARY)?.value {
        Value::Rational(r) if r.len() >= 3 => Some(format!(
            "{:02}:{:02}:{:02}",
            r[0].to_f64() as u32,
            r[1].to_f64() as u32,
            r[2].to_f64() as u32
        )),
        _ => None,
    }
}
