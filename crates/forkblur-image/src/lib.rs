#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Error types for the image module.
pub mod error;

/// packed raster representation.
pub mod image;

/// packed 32-bit pixel type.
pub mod pixel;

pub use crate::error::ImageError;
pub use crate::image::{ImageSize, PackedImage};
pub use crate::pixel::Pixel;
