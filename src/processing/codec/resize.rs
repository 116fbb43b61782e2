//! Resize logic mapping resize modes to target dimensions.

use image::DynamicImage;
use image::imageops::FilterType;
use crate::core::{ResizeConfiguration, ResizeMode};

/// Computes the output dimensions for a `width` x `height` source.
///
/// Every mode keeps the aspect ratio. Targets larger than the source enlarge
/// the image. Degenerate sources are returned unchanged.
pub fn target_dimensions(width: u32, height: u32, mode: &ResizeMode) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }

    let (w, h) = (width as f64, height as f64);
    let scale = match *mode {
        ResizeMode::WidthHeight { width: box_w, height: box_h } => {
            (box_w as f64 / w).min(box_h as f64 / h)
        }
        ResizeMode::LongestSide { size } => size as f64 / w.max(h),
        ResizeMode::Megapixel { megapixels } => (megapixels * 1_000_000.0 / (w * h)).sqrt(),
    };

    if !scale.is_finite() || scale <= 0.0 {
        return (width, height);
    }

    let scaled = |side: f64| (side * scale).round().max(1.0) as u32;
    (scaled(w), scaled(h))
}

/// Applies the resize specified in `settings` to `image`.
///
/// Returns the original image unchanged when resizing is disabled or the
/// target equals the current size.
pub fn apply_resize(image: DynamicImage, settings: &ResizeConfiguration) -> DynamicImage {
    if !settings.enabled {
        return image;
    }

    let (width, height) = (image.width(), image.height());
    let (target_w, target_h) = target_dimensions(width, height, &settings.mode);
    if (target_w, target_h) == (width, height) {
        return image;
    }

    image.resize_exact(target_w, target_h, FilterType::Lanczos3)
}
