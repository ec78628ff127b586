use crate::{error::ImageError, pixel::Pixel};

/// Image size in pixels
///
/// A struct to represent the size of an image in pixels.
///
/// # Examples
///
/// ```
/// use forkblur_image::ImageSize;
///
/// let image_size = ImageSize {
///   width: 10,
///   height: 20,
/// };
///
/// assert_eq!(image_size.width, 10);
/// assert_eq!(image_size.height, 20);
/// assert_eq!(image_size.num_pixels(), 200);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageSize {
    /// Width of the image in pixels
    pub width: usize,
    /// Height of the image in pixels
    pub height: usize,
}

impl ImageSize {
    /// The number of pixels of an image with this size.
    pub fn num_pixels(&self) -> usize {
        self.width * self.height
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "ImageSize {{ width: {}, height: {} }}",
            self.width, self.height
        )
    }
}

impl From<[usize; 2]> for ImageSize {
    fn from(size: [usize; 2]) -> Self {
        ImageSize {
            width: size[0],
            height: size[1],
        }
    }
}

/// Represents a raster of packed pixels.
///
/// The pixels are stored row major in a flat buffer of `width * height` elements.
#[derive(Clone, Debug, PartialEq)]
pub struct PackedImage {
    size: ImageSize,
    data: Vec<Pixel>,
}

impl PackedImage {
    /// Create a new image from pixel data.
    ///
    /// # Arguments
    ///
    /// * `size` - The size of the image in pixels.
    /// * `data` - The pixel data of the image.
    ///
    /// # Returns
    ///
    /// A new image with the given pixel data.
    ///
    /// # Errors
    ///
    /// If the length of the pixel data does not match the image size, an error is returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use forkblur_image::{ImageSize, PackedImage, Pixel};
    ///
    /// let image = PackedImage::new(
    ///     ImageSize {
    ///         width: 10,
    ///         height: 20,
    ///     },
    ///     vec![Pixel::BLACK; 10 * 20],
    /// ).unwrap();
    ///
    /// assert_eq!(image.width(), 10);
    /// assert_eq!(image.height(), 20);
    /// ```
    pub fn new(size: ImageSize, data: Vec<Pixel>) -> Result<Self, ImageError> {
        if data.len() != size.num_pixels() {
            return Err(ImageError::InvalidDataLength(data.len(), size.num_pixels()));
        }

        Ok(Self { size, data })
    }

    /// Create a new image with the given size filled with a single pixel value.
    ///
    /// # Arguments
    ///
    /// * `size` - The size of the image in pixels.
    /// * `val` - The value of every pixel.
    pub fn from_size_val(size: ImageSize, val: Pixel) -> Result<Self, ImageError> {
        Self::new(size, vec![val; size.num_pixels()])
    }

    /// Create a new image from raw packed `0xAARRGGBB` words.
    pub fn from_raw(size: ImageSize, data: Vec<u32>) -> Result<Self, ImageError> {
        Self::new(size, data.into_iter().map(Pixel).collect())
    }

    /// The size of the image in pixels.
    pub fn size(&self) -> ImageSize {
        self.size
    }

    /// The width of the image in pixels.
    pub fn width(&self) -> usize {
        self.size.width
    }

    /// The height of the image in pixels.
    pub fn height(&self) -> usize {
        self.size.height
    }

    /// The pixel data as a slice.
    pub fn as_slice(&self) -> &[Pixel] {
        &self.data
    }

    /// Consume the image and return the pixel buffer.
    pub fn into_vec(self) -> Vec<Pixel> {
        self.data
    }

    /// Get the pixel at the given coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::PixelIndexOutOfBounds`] if the coordinates are outside the image.
    pub fn get_pixel(&self, x: usize, y: usize) -> Result<Pixel, ImageError> {
        let idx = self.index_of(x, y)?;
        Ok(self.data[idx])
    }

    /// Set the pixel at the given coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::PixelIndexOutOfBounds`] if the coordinates are outside the image.
    pub fn set_pixel(&mut self, x: usize, y: usize, pixel: Pixel) -> Result<(), ImageError> {
        let idx = self.index_of(x, y)?;
        self.data[idx] = pixel;
        Ok(())
    }

    fn index_of(&self, x: usize, y: usize) -> Result<usize, ImageError> {
        if x >= self.size.width || y >= self.size.height {
            return Err(ImageError::PixelIndexOutOfBounds(
                x,
                y,
                self.size.width,
                self.size.height,
            ));
        }
        Ok(y * self.size.width + x)
    }
}
