/// A packed 32-bit pixel.
///
/// The top byte holds the alpha channel and the remaining three bytes hold the
/// red, green and blue channels, i.e. `0xAARRGGBB`.
///
/// # Examples
///
/// ```
/// use forkblur_image::Pixel;
///
/// let pixel = Pixel::from_rgb(255, 128, 0);
///
/// assert_eq!(pixel.alpha(), 255);
/// assert_eq!(pixel.red(), 255);
/// assert_eq!(pixel.green(), 128);
/// assert_eq!(pixel.blue(), 0);
/// assert_eq!(u32::from(pixel), 0xffff8000);
/// ```
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Pixel(pub u32);

impl Pixel {
    /// Fully transparent black, the value of a freshly allocated buffer.
    pub const BLACK: Pixel = Pixel(0x0000_0000);

    /// Opaque white.
    pub const WHITE: Pixel = Pixel(0xffff_ffff);

    /// Create an opaque pixel from its color channels.
    ///
    /// The alpha channel is set to `0xff`.
    #[inline]
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self::from_argb(0xff, r, g, b)
    }

    /// Create a pixel from its alpha and color channels.
    #[inline]
    pub const fn from_argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Pixel(((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | (b as u32))
    }

    /// The alpha channel.
    #[inline]
    pub const fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// The red channel.
    #[inline]
    pub const fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    /// The green channel.
    #[inline]
    pub const fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// The blue channel.
    #[inline]
    pub const fn blue(self) -> u8 {
        self.0 as u8
    }

    /// The color channels as `[r, g, b]`.
    #[inline]
    pub const fn rgb(self) -> [u8; 3] {
        [self.red(), self.green(), self.blue()]
    }
}

impl From<u32> for Pixel {
    fn from(value: u32) -> Self {
        Pixel(value)
    }
}

impl From<Pixel> for u32 {
    fn from(pixel: Pixel) -> Self {
        pixel.0
    }
}

impl std::fmt::Display for Pixel {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}
