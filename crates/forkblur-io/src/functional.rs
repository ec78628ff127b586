use std::path::Path;

use forkblur_image::{ImageSize, PackedImage, Pixel};

use crate::error::IoError;

/// Reads an image from the given file path as a packed raster.
///
/// The method tries to read from any image format supported by the image crate.
/// Every pixel is converted to RGB and packed as `0xffRRGGBB`.
///
/// # Arguments
///
/// * `file_path` - The path to a valid image file.
///
/// # Returns
///
/// A packed image containing the image data.
pub fn read_image_packed(file_path: impl AsRef<Path>) -> Result<PackedImage, IoError> {
    let file_path = file_path.as_ref().to_owned();

    // verify the file exists
    if !file_path.exists() {
        return Err(IoError::FileDoesNotExist(file_path.to_path_buf()));
    }

    // open the file and map it to memory
    let file = std::fs::File::open(file_path)?;
    let mmap = unsafe { memmap2::Mmap::map(&file)? };

    // decode the data directly from memory
    let img = image::ImageReader::new(std::io::Cursor::new(&mmap[..]))
        .with_guessed_format()?
        .decode()?
        .into_rgb8();

    let size = ImageSize {
        width: img.width() as usize,
        height: img.height() as usize,
    };

    let data = img
        .pixels()
        .map(|p| Pixel::from_rgb(p[0], p[1], p[2]))
        .collect();

    Ok(PackedImage::new(size, data)?)
}

/// The image dimensions as accepted by the encoders.
fn encoded_dims(size: ImageSize) -> Result<(u32, u32), IoError> {
    match (u32::try_from(size.width), u32::try_from(size.height)) {
        (Ok(width), Ok(height)) => Ok((width, height)),
        _ => Err(IoError::InvalidImageDimensions(size.width, size.height)),
    }
}

/// Writes a packed image to the given file path.
///
/// The alpha channel is dropped and the format is deduced from the file extension.
///
/// # Arguments
///
/// * `file_path` - The path to the output image.
/// * `image` - The packed image to write.
pub fn write_image_packed(file_path: impl AsRef<Path>, image: &PackedImage) -> Result<(), IoError> {
    let data = image
        .as_slice()
        .iter()
        .flat_map(|p| p.rgb())
        .collect::<Vec<u8>>();

    let (width, height) = encoded_dims(image.size())?;
    let rgb = image::RgbImage::from_raw(width, height, data)
        .ok_or(IoError::InvalidImageDimensions(image.width(), image.height()))?;

    rgb.save(file_path)?;

    Ok(())
}
