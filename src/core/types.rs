//! Core types for image optimization settings.

use serde::{Deserialize, Serialize};
use crate::utils::OutputFormat;

/// Configuration for one image transformation.
///
/// A clone of the current configuration travels with every work item, so
/// later changes to the global settings never reach items already submitted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Configuration {
    /// Lossy compression settings
    pub compression: CompressionConfiguration,
    /// Resize settings for image dimensions
    pub resize: ResizeConfiguration,
    /// Output format and metadata handling
    pub export: ExportConfiguration,
}

/// Compression strength as a fraction of the encoder's quality scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionConfiguration {
    pub enabled: bool,
    /// Quality in (0, 1]; 0.75 maps to encoder quality 75
    pub value: f32,
}

impl Default for CompressionConfiguration {
    fn default() -> Self {
        Self {
            enabled: true,
            value: 0.75,
        }
    }
}

impl CompressionConfiguration {
    /// Encoder quality on the 1-100 scale, or `None` when compression is off.
    pub fn quality(&self) -> Option<u8> {
        self.enabled
            .then(|| (self.value * 100.0).round().clamp(1.0, 100.0) as u8)
    }
}

/// Resize settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResizeConfiguration {
    pub enabled: bool,
    pub mode: ResizeMode,
}

impl Default for ResizeConfiguration {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: ResizeMode::LongestSide { size: 1920 },
        }
    }
}

/// How target dimensions are derived from the source dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum ResizeMode {
    /// Fit inside a `width` x `height` box, keeping the aspect ratio
    WidthHeight { width: u32, height: u32 },
    /// Scale so the longer edge becomes `size`
    LongestSide { size: u32 },
    /// Scale to roughly `megapixels` million pixels
    Megapixel { megapixels: f64 },
}

/// Export settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfiguration {
    pub format: OutputFormat,
    /// Keep EXIF metadata
    pub exif: bool,
    /// Keep GPS metadata
    pub gps: bool,
}

impl Default for ExportConfiguration {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jpeg,
            exif: false,
            gps: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_maps_to_encoder_quality() {
        let compression = CompressionConfiguration { enabled: true, value: 0.8 };
        assert_eq!(compression.quality(), Some(80));

        let tiny = CompressionConfiguration { enabled: true, value: 0.001 };
        assert_eq!(tiny.quality(), Some(1));

        let off = CompressionConfiguration { enabled: false, value: 0.5 };
        assert_eq!(off.quality(), None);
    }

    #[test]
    fn resize_mode_is_tagged_in_json() {
        let json = serde_json::to_value(ResizeMode::WidthHeight { width: 1920, height: 1080 })
            .unwrap();
        assert_eq!(json["mode"], "widthHeight");
        assert_eq!(json["width"], 1920);

        let parsed: ResizeMode =
            serde_json::from_str(r#"{"mode":"megapixel","megapixels":6.0}"#).unwrap();
        assert_eq!(parsed, ResizeMode::Megapixel { megapixels: 6.0 });
    }

    #[test]
    fn defaults_match_first_run_settings() {
        let config = Configuration::default();
        assert_eq!(config.export.format, OutputFormat::Jpeg);
        assert_eq!(config.resize.mode, ResizeMode::LongestSide { size: 1920 });
        assert_eq!(config.compression.quality(), Some(75));
    }
}
