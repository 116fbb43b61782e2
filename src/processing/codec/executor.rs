//! Default image codec built on the pure-Rust `image` crate.
//!
//! Decoding, resizing and encoding all happen on the calling worker thread;
//! the worker pool provides the parallelism across images.

use std::sync::OnceLock;
use image::DynamicImage;
use tracing::{debug, info};

use crate::core::Configuration;
use crate::processing::{ImageTransform, TransformError, TransformOutput};
use crate::utils::{OutputFormat, derived_file_name};

use super::formats::encode_image;
use super::resize::apply_resize;

/// Encoder warmup result, shared by every pool for the process lifetime.
static WARMUP: OnceLock<Result<(), String>> = OnceLock::new();

/// Resize, compress and re-encode images with the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCodec;

impl ImageCodec {
    pub fn new() -> Self {
        Self
    }
}

/// Encodes a tiny image in every output format once.
///
/// Runs lazy encoder setup before any context accepts work.
fn warm_up() -> Result<(), String> {
    let probe = DynamicImage::new_rgba8(2, 2);
    for format in OutputFormat::ALL {
        encode_image(&probe, format, None).map_err(|e| format!("{format} warmup failed: {e}"))?;
    }
    info!("Image codec ready ({} output formats)", OutputFormat::ALL.len());
    Ok(())
}

impl ImageTransform for ImageCodec {
    fn init_context(&self, context: usize) -> Result<(), TransformError> {
        debug!("Initializing codec for worker {}", context);
        WARMUP
            .get_or_init(warm_up)
            .clone()
            .map_err(TransformError::init)
    }

    fn transform(
        &self,
        name: &str,
        input: &[u8],
        config: &Configuration,
    ) -> Result<TransformOutput, TransformError> {
        let image = image::load_from_memory(input)
            .map_err(|e| TransformError::transform(format!("Failed to decode '{name}': {e}")))?;

        debug!("Loaded '{}': {}×{}", name, image.width(), image.height());

        // No-op when resizing is disabled
        let image = apply_resize(image, &config.resize);

        let format = config.export.format;
        let data = encode_image(&image, format, config.compression.quality())?;

        debug!(
            "'{}' → {} ({} → {} bytes)",
            name,
            format,
            input.len(),
            data.len()
        );

        Ok(TransformOutput {
            data,
            mime_type: format.mime_type().to_string(),
            file_name: derived_file_name(name, format),
        })
    }
}
