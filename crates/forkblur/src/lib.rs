#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

#[doc(inline)]
pub use forkblur_image as image;

#[doc(inline)]
pub use forkblur_imgproc as imgproc;

#[doc(inline)]
pub use forkblur_io as io;
