pub mod error;
pub mod validation;
pub mod formats;
pub mod fs;

pub use error::{ErrorRecord, OptimizerError, OptimizerResult};
pub use validation::validate_settings;
pub use formats::{OutputFormat, derived_file_name};
pub use fs::{available_path, ensure_dir, unique_name};
