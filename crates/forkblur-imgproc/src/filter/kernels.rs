use forkblur_image::Pixel;

use super::span::Span;

/// Number of taps of the 3x3 box kernel.
const BOX_TAPS: u32 = 9;

/// How the kernel treats pixels on the image border.
///
/// Border pixels have at least one neighbor outside the image, so the box kernel
/// is never evaluated for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BorderMode {
    /// Skip border pixels. The destination keeps whatever it already holds.
    ///
    /// A freshly allocated destination is black, and on later passes the border
    /// holds the value the same physical buffer held two passes before.
    Untouched,

    /// Copy the source value into the destination for border pixels.
    #[default]
    Copy,
}

/// Check if the flat index lies on the border of the image.
///
/// # Arguments
///
/// * `index` - The flat index into the buffer.
/// * `width` - The width of the image in pixels.
/// * `len` - The number of pixels of the image.
#[inline]
pub fn is_border(index: usize, width: usize, len: usize) -> bool {
    let col = index % width;
    index < width || index + width >= len || col == 0 || col == width - 1
}

/// Compute the box blur of one interior pixel.
///
/// Sums the 3x3 neighborhood per channel, divides each sum by nine with
/// truncation and packs the result with an opaque alpha channel.
///
/// PRECONDITION: `index` is not a border pixel, see [`is_border`].
///
/// # Arguments
///
/// * `src` - The source buffer.
/// * `width` - The width of the image in pixels.
/// * `index` - The flat index of the pixel to compute.
#[inline]
pub fn box_blur_pixel(src: &[Pixel], width: usize, index: usize) -> Pixel {
    let above = index - width;
    let below = index + width;

    let mut acc = [0.0f32; 3];
    for row in [above, index, below] {
        for pixel in &src[row - 1..=row + 1] {
            acc[0] += pixel.red() as f32;
            acc[1] += pixel.green() as f32;
            acc[2] += pixel.blue() as f32;
        }
    }

    Pixel::from_rgb(
        (acc[0] as u32 / BOX_TAPS) as u8,
        (acc[1] as u32 / BOX_TAPS) as u8,
        (acc[2] as u32 / BOX_TAPS) as u8,
    )
}

/// Apply the box kernel sequentially over a span.
///
/// # Arguments
///
/// * `src` - The full source buffer.
/// * `dst` - The destination slice covering exactly `span`.
/// * `span` - The range of flat indices to process.
/// * `width` - The width of the image in pixels.
/// * `border` - The border handling.
///
/// PRECONDITION: `dst.len() == span.length` and `span.end() <= src.len()`.
pub fn apply_span(src: &[Pixel], dst: &mut [Pixel], span: Span, width: usize, border: BorderMode) {
    debug_assert_eq!(dst.len(), span.length);

    let len = src.len();
    for (index, out) in span.range().zip(dst.iter_mut()) {
        if is_border(index, width, len) {
            if border == BorderMode::Copy {
                *out = src[index];
            }
            continue;
        }
        *out = box_blur_pixel(src, width, index);
    }
}
