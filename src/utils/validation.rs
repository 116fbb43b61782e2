use crate::core::{Configuration, ResizeMode};
use crate::utils::{OptimizerError, OptimizerResult};

/// Validates image processing settings
pub fn validate_settings(settings: &Configuration) -> OptimizerResult<()> {
    // Validate quality settings
    let value = settings.compression.value;
    if !(value > 0.0 && value <= 1.0) {
        return Err(OptimizerError::validation(
            format!("Invalid compression value: {}. Must be in (0, 1]", value)
        ));
    }

    // Validate resize settings
    match settings.resize.mode {
        ResizeMode::WidthHeight { width, height } => {
            if width == 0 || height == 0 {
                return Err(OptimizerError::validation("Width and height cannot be 0"));
            }
        }
        ResizeMode::LongestSide { size } => {
            if size == 0 {
                return Err(OptimizerError::validation("Size cannot be 0"));
            }
        }
        ResizeMode::Megapixel { megapixels } => {
            if !(megapixels.is_finite() && megapixels > 0.0) {
                return Err(OptimizerError::validation(
                    format!("Invalid megapixel target: {}", megapixels)
                ));
            }
        }
    }

    Ok(())
}
