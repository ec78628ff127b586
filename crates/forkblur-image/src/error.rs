/// An error type for the image module.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ImageError {
    /// Error when the data length does not match the image size.
    #[error("Data length ({0}) does not match the image size ({1})")]
    InvalidDataLength(usize, usize),

    /// Error when the image has a zero dimension.
    #[error("Invalid image size {0}x{1}, both dimensions must be > 0")]
    InvalidImageSize(usize, usize),

    /// Error when a pixel coordinate lies outside the image.
    #[error("Pixel ({0}, {1}) is out of bounds for an image of size {2}x{3}")]
    PixelIndexOutOfBounds(usize, usize, usize, usize),
}
