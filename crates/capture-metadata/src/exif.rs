//! EXIF extraction via `rexif`
//!
//! The raw EXIF entries are first collected into [`ExifFields`] and then
//! interpreted, so the interpretation can be tested without sample files.

use crate::{CaptureMetadata, MetadataSource};
use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;
use rexif::{ExifTag, TagValue};
use std::fs;
use std::path::Path;

/// Reads capture metadata from JPEG/TIFF EXIF blocks
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifMetadataSource;

impl ExifMetadataSource {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataSource for ExifMetadataSource {
    fn extract(&self, path: &Path) -> Result<Option<CaptureMetadata>> {
        let contents = fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let exif = rexif::parse_buffer(&contents)
            .map_err(|e| anyhow!("Failed to parse EXIF in {}: {}", path.display(), e))?;

        let mut fields = ExifFields::default();
        for entry in &exif.entries {
            fields.record(&entry.tag, &entry.value);
        }

        let metadata = fields.into_metadata();
        if metadata.is_empty() {
            log::debug!("No capture metadata in {}", path.display());
            Ok(None)
        } else {
            Ok(Some(metadata))
        }
    }
}

/// The subset of raw EXIF values we care about
#[derive(Debug, Clone, Default)]
pub(crate) struct ExifFields {
    pub make: Option<String>,
    pub model: Option<String>,
    pub date_time_original: Option<String>,
    pub date_time: Option<String>,
    pub latitude: Option<Vec<f64>>,
    pub latitude_ref: Option<String>,
    pub longitude: Option<Vec<f64>>,
    pub longitude_ref: Option<String>,
}

impl ExifFields {
    fn record(&mut self, tag: &ExifTag, value: &TagValue) {
        match tag {
            ExifTag::Make => self.make = ascii(value),
            ExifTag::Model => self.model = ascii(value),
            ExifTag::DateTimeOriginal => self.date_time_original = ascii(value),
            ExifTag::DateTime => self.date_time = ascii(value),
            ExifTag::GPSLatitude => self.latitude = rationals(value),
            ExifTag::GPSLatitudeRef => self.latitude_ref = ascii(value),
            ExifTag::GPSLongitude => self.longitude = rationals(value),
            ExifTag::GPSLongitudeRef => self.longitude_ref = ascii(value),
            _ => {}
        }
    }

    pub(crate) fn into_metadata(self) -> CaptureMetadata {
        let captured_at = self
            .date_time_original
            .as_deref()
            .and_then(parse_capture_time)
            .or_else(|| self.date_time.as_deref().and_then(parse_capture_time));

        CaptureMetadata {
            captured_at,
            camera_make: self.make,
            camera_model: self.model,
            latitude: self
                .latitude
                .as_deref()
                .and_then(|dms| dms_to_decimal(dms, self.latitude_ref.as_deref())),
            longitude: self
                .longitude
                .as_deref()
                .and_then(|dms| dms_to_decimal(dms, self.longitude_ref.as_deref())),
        }
    }
}

fn ascii(value: &TagValue) -> Option<String> {
    match value {
        TagValue::Ascii(s) => {
            let trimmed = s.trim_matches(|c: char| c == '\0' || c.is_whitespace());
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        _ => None,
    }
}

fn rationals(value: &TagValue) -> Option<Vec<f64>> {
    match value {
        TagValue::URational(values) => Some(
            values
                .iter()
                .map(|r| {
                    if r.denominator == 0 {
                        0.0
                    } else {
                        r.numerator as f64 / r.denominator as f64
                    }
                })
                .collect(),
        ),
        _ => None,
    }
}

/// Parse an EXIF timestamp ("2024:01:15 14:30:25"), tolerating a fractional
/// second suffix. Cameras write all-zero or blank dates when the clock was unset.
pub(crate) fn parse_capture_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    let base = raw.get(..19)?;
    if base.starts_with("0000") {
        return None;
    }
    NaiveDateTime::parse_from_str(base, "%Y:%m:%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(base, "%Y-%m-%d %H:%M:%S"))
        .ok()
}

/// Degrees/minutes/seconds plus an N/S/E/W reference to signed decimal degrees
pub(crate) fn dms_to_decimal(dms: &[f64], reference: Option<&str>) -> Option<f64> {
    let degrees = *dms.first()?;
    let minutes = dms.get(1).copied().unwrap_or(0.0);
    let seconds = dms.get(2).copied().unwrap_or(0.0);
    let value = degrees + minutes / 60.0 + seconds / 3600.0;

    if !value.is_finite() {
        return None;
    }

    match reference.map(|r| r.trim().to_ascii_uppercase()) {
        Some(r) if r.starts_with('S') || r.starts_with('W') => Some(-value),
        _ => Some(value),
    }
}
