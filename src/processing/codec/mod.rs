//! Native image processing via the `image` crate.
//!
//! # Architecture
//!
//! - [`ImageCodec`]: [`ImageTransform`](crate::processing::ImageTransform) used by default.
//! - [`resize`]: Maps resize modes to target dimensions and applies them.
//! - [`formats`]: Maps export settings to format-specific encoders.

mod executor;
pub mod formats;
pub mod resize;

pub use executor::ImageCodec;
pub use resize::target_dimensions;
