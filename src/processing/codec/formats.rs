//! Maps export settings to format-specific encoders.
//!
//! Metadata is never carried over: the `image` encoders write pixel data only,
//! so EXIF and GPS blocks are always stripped.

use std::io::Cursor;
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageFormat};
use crate::processing::TransformError;
use crate::utils::OutputFormat;

type Result<T> = std::result::Result<T, TransformError>;

// rav1e speed, 0 (slowest) to 10
const AVIF_SPEED: u8 = 8;

/// Encodes `image` as `format`.
///
/// `quality` is the 1-100 compression quality, `None` uses the format default.
/// PNG, WebP and GIF are lossless here, quality only trades effort for size.
pub fn encode_image(
    image: &DynamicImage,
    format: OutputFormat,
    quality: Option<u8>,
) -> Result<Vec<u8>> {
    let quality = quality.unwrap_or_else(|| format.default_quality());
    let mut buf = Vec::new();

    match format {
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))
                .map_err(|e| TransformError::write(format!("JPEG encode failed: {e}")))?;
        }
        OutputFormat::Png => {
            let compression = if quality < 100 {
                CompressionType::Best
            } else {
                CompressionType::Default
            };
            image
                .write_with_encoder(PngEncoder::new_with_quality(
                    &mut buf,
                    compression,
                    PngFilter::Adaptive,
                ))
                .map_err(|e| TransformError::write(format!("PNG encode failed: {e}")))?;
        }
        OutputFormat::WebP => {
            to_rgb_or_rgba(image)
                .write_with_encoder(WebPEncoder::new_lossless(&mut buf))
                .map_err(|e| TransformError::write(format!("WebP encode failed: {e}")))?;
        }
        OutputFormat::Avif => {
            to_rgb_or_rgba(image)
                .write_with_encoder(AvifEncoder::new_with_speed_quality(
                    &mut buf,
                    AVIF_SPEED,
                    quality,
                ))
                .map_err(|e| TransformError::write(format!("AVIF encode failed: {e}")))?;
        }
        OutputFormat::Gif => {
            DynamicImage::ImageRgba8(image.to_rgba8())
                .write_to(&mut Cursor::new(&mut buf), ImageFormat::Gif)
                .map_err(|e| TransformError::write(format!("GIF encode failed: {e}")))?;
        }
    }

    Ok(buf)
}

/// 8-bit RGB or RGBA, the layouts the WebP and AVIF encoders accept.
fn to_rgb_or_rgba(image: &DynamicImage) -> DynamicImage {
    if image.color().has_alpha() {
        DynamicImage::ImageRgba8(image.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(image.to_rgb8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DynamicImage {
        DynamicImage::ImageRgba8(image::RgbaImage::from_fn(8, 6, |x, y| {
            image::Rgba([(x * 30) as u8, (y * 40) as u8, 128, 255])
        }))
    }

    #[test]
    fn every_format_round_trips_dimensions() {
        for format in [OutputFormat::Jpeg, OutputFormat::Png, OutputFormat::WebP, OutputFormat::Gif] {
            let bytes = encode_image(&sample(), format, Some(75)).unwrap();
            let decoded = image::load_from_memory(&bytes).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (8, 6), "{format}");
        }
    }

    #[test]
    fn avif_produces_output() {
        let bytes = encode_image(&sample(), OutputFormat::Avif, None).unwrap();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn jpeg_quality_changes_size() {
        let image = DynamicImage::ImageRgb8(image::RgbImage::from_fn(64, 64, |x, y| {
            image::Rgb([(x * 4) as u8, (y * 4) as u8, ((x + y) * 2) as u8])
        }));
        let small = encode_image(&image, OutputFormat::Jpeg, Some(10)).unwrap();
        let large = encode_image(&image, OutputFormat::Jpeg, Some(100)).unwrap();
        assert!(small.len() < large.len());
    }
}
