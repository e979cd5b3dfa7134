//! Capture metadata extraction for Folio
//!
//! Provides the [`CaptureMetadata`] record shown next to the preview (capture
//! time, camera, GPS position) and the [`MetadataSource`] seam the browser reads
//! it through. [`ExifMetadataSource`] is the production implementation.

pub mod exif;

pub use exif::ExifMetadataSource;

use anyhow::Result;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Metadata extracted from one image file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureMetadata {
    /// Local capture time as recorded by the camera (no time zone)
    pub captured_at: Option<NaiveDateTime>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    /// Decimal degrees, north positive
    pub latitude: Option<f64>,
    /// Decimal degrees, east positive
    pub longitude: Option<f64>,
}

impl CaptureMetadata {
    /// True when none of the fields could be read
    pub fn is_empty(&self) -> bool {
        self.captured_at.is_none()
            && self.camera_make.is_none()
            && self.camera_model.is_none()
            && self.coordinates().is_none()
    }

    /// "Make Model", without repeating the make when the model already starts with it
    pub fn camera_label(&self) -> Option<String> {
        match (&self.camera_make, &self.camera_model) {
            (Some(make), Some(model)) => {
                if model.to_lowercase().starts_with(&make.to_lowercase()) {
                    Some(model.clone())
                } else {
                    Some(format!("{} {}", make, model))
                }
            }
            (Some(make), None) => Some(make.clone()),
            (None, Some(model)) => Some(model.clone()),
            (None, None) => None,
        }
    }

    /// Latitude and longitude, only when both are known
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }

    pub fn format_coordinates(&self) -> Option<String> {
        let (lat, lon) = self.coordinates()?;
        let ns = if lat < 0.0 { 'S' } else { 'N' };
        let ew = if lon < 0.0 { 'W' } else { 'E' };
        Some(format!("{:.6}° {}, {:.6}° {}", lat.abs(), ns, lon.abs(), ew))
    }
}

/// Something that can read capture metadata from a file.
///
/// `Ok(None)` means the file was readable but carried nothing useful. Errors are
/// per-file; callers treat them as "no metadata".
pub trait MetadataSource: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Option<CaptureMetadata>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn metadata(make: Option<&str>, model: Option<&str>) -> CaptureMetadata {
        CaptureMetadata {
            camera_make: make.map(str::to_string),
            camera_model: model.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_camera_label() {
        assert_eq!(
            metadata(Some("NIKON CORPORATION"), Some("NIKON Z 6")).camera_label(),
            Some("NIKON CORPORATION NIKON Z 6".to_string())
        );
        assert_eq!(
            metadata(Some("Canon"), Some("Canon EOS R5")).camera_label(),
            Some("Canon EOS R5".to_string())
        );
        assert_eq!(
            metadata(Some("FUJIFILM"), Some("X-T4")).camera_label(),
            Some("FUJIFILM X-T4".to_string())
        );
        assert_eq!(metadata(None, Some("X100V")).camera_label(), Some("X100V".to_string()));
        assert_eq!(metadata(None, None).camera_label(), None);
    }

    #[test]
    fn test_coordinates_need_both_axes() {
        let mut meta = CaptureMetadata {
            latitude: Some(-33.8688),
            ..Default::default()
        };
        assert!(meta.coordinates().is_none());
        assert!(meta.is_empty());

        meta.longitude = Some(151.2093);
        assert_eq!(meta.coordinates(), Some((-33.8688, 151.2093)));
        assert_eq!(
            meta.format_coordinates(),
            Some("33.868800° S, 151.209300° E".to_string())
        );
        assert!(!meta.is_empty());
    }

    #[test]
    fn test_is_empty_with_capture_time() {
        let meta = CaptureMetadata {
            captured_at: NaiveDate::from_ymd_opt(2024, 1, 15)
                .and_then(|d| d.and_hms_opt(14, 30, 25)),
            ..Default::default()
        };
        assert!(!meta.is_empty());
        assert!(CaptureMetadata::default().is_empty());
    }
}
