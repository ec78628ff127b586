use forkblur_image::{ImageError, ImageSize, PackedImage, Pixel};

use super::kernels::{self, BorderMode};
use super::span::{PassStats, Span, SplitPolicy};
use crate::parallel::{ExecutionStrategy, ParallelError, WorkerPool};

/// An error type for the filter operations.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum FilterError {
    /// Error from the image types.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// Error from the worker pool.
    #[error(transparent)]
    Parallel(#[from] ParallelError),
}

/// A pair of equally sized pixel buffers with a tag marking the current one.
///
/// During a pass the current buffer is read and the other one is written.
/// Swapping only flips the tag, the buffers themselves are never moved or copied.
#[derive(Debug, Clone)]
pub struct DoubleBuffer {
    buffers: [Vec<Pixel>; 2],
    current: usize,
}

impl DoubleBuffer {
    /// Create a buffer pair whose current buffer is `src`.
    ///
    /// The second buffer is allocated once with [`Pixel::BLACK`].
    pub fn new(src: Vec<Pixel>) -> Self {
        let next = vec![Pixel::BLACK; src.len()];
        Self {
            buffers: [src, next],
            current: 0,
        }
    }

    /// The number of pixels of each buffer.
    pub fn len(&self) -> usize {
        self.buffers[0].len()
    }

    /// Check if the buffers hold no pixel.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The index (0 or 1) of the current buffer, 0 being the buffer passed to [`DoubleBuffer::new`].
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// The current buffer.
    pub fn current(&self) -> &[Pixel] {
        &self.buffers[self.current]
    }

    /// Borrow the current buffer for reading and the next buffer for writing.
    pub fn split(&mut self) -> (&[Pixel], &mut [Pixel]) {
        let [first, second] = &mut self.buffers;
        if self.current == 0 {
            (first.as_slice(), second.as_mut_slice())
        } else {
            (second.as_slice(), first.as_mut_slice())
        }
    }

    /// Make the next buffer the current one.
    pub fn swap(&mut self) {
        self.current ^= 1;
    }

    /// Consume the pair and return the current buffer.
    pub fn into_current(self) -> Vec<Pixel> {
        let [first, second] = self.buffers;
        if self.current == 0 {
            first
        } else {
            second
        }
    }
}

/// Parameters of the iterative box blur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterConfig {
    /// The number of passes.
    pub iterations: usize,
    /// How the passes are executed.
    pub strategy: ExecutionStrategy,
    /// When span tasks stop splitting.
    pub policy: SplitPolicy,
    /// How border pixels are handled.
    pub border: BorderMode,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            strategy: ExecutionStrategy::default(),
            policy: SplitPolicy::default(),
            border: BorderMode::default(),
        }
    }
}

impl FilterConfig {
    /// Set the number of passes.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the execution strategy.
    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the split policy.
    pub fn with_policy(mut self, policy: SplitPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the border handling.
    pub fn with_border(mut self, border: BorderMode) -> Self {
        self.border = border;
        self
    }
}

fn check_size(len: usize, size: ImageSize) -> Result<(), ImageError> {
    if size.width == 0 || size.height == 0 {
        return Err(ImageError::InvalidImageSize(size.width, size.height));
    }
    if len != size.num_pixels() {
        return Err(ImageError::InvalidDataLength(len, size.num_pixels()));
    }
    Ok(())
}

fn check_buffers(src: &[Pixel], dst: &[Pixel], size: ImageSize) -> Result<(), FilterError> {
    check_size(src.len(), size)?;
    if src.len() != dst.len() {
        return Err(ParallelError::SizeMismatch(src.len(), dst.len()).into());
    }
    Ok(())
}

/// Apply one box blur pass sequentially.
///
/// # Arguments
///
/// * `src` - The source buffer.
/// * `dst` - The destination buffer.
/// * `size` - The size of the image.
/// * `border` - The border handling.
///
/// # Errors
///
/// Fails if `src` and `dst` do not both hold `size.width * size.height` pixels.
pub fn box_blur_serial(
    src: &[Pixel],
    dst: &mut [Pixel],
    size: ImageSize,
    border: BorderMode,
) -> Result<(), FilterError> {
    check_buffers(src, dst, size)?;
    kernels::apply_span(src, dst, Span::new(0, src.len()), size.width, border);
    Ok(())
}

/// Apply one box blur pass on a worker pool.
///
/// Submits the root span covering the whole image and returns once every
/// span task has completed.
///
/// # Arguments
///
/// * `pool` - The worker pool.
/// * `src` - The source buffer, read only during the pass.
/// * `dst` - The destination buffer, each index written at most once.
/// * `size` - The size of the image.
/// * `policy` - When span tasks stop splitting.
/// * `border` - The border handling.
///
/// # Returns
///
/// The shape of the task tree of the pass.
pub fn box_blur_pass(
    pool: &WorkerPool,
    src: &[Pixel],
    dst: &mut [Pixel],
    size: ImageSize,
    policy: SplitPolicy,
    border: BorderMode,
) -> Result<PassStats, FilterError> {
    check_buffers(src, dst, size)?;

    let width = size.width;
    let stats = pool.for_each_span(dst, policy, |span, out| {
        kernels::apply_span(src, out, span, width, border);
    });

    log::trace!(
        "box blur pass: {} leaves, max depth {}",
        stats.leaves,
        stats.max_depth
    );

    Ok(stats)
}

fn box_blur_buffers(
    src: Vec<Pixel>,
    size: ImageSize,
    config: &FilterConfig,
) -> Result<Vec<Pixel>, FilterError> {
    check_size(src.len(), size)?;
    if let ExecutionStrategy::Fixed(0) = config.strategy {
        return Err(ParallelError::InvalidThreadCount(0).into());
    }

    if config.iterations == 0 {
        return Ok(src);
    }

    let pool = WorkerPool::with_strategy(config.strategy)?;
    log::debug!(
        "box blur {} on {:?}: {} iterations",
        size,
        pool,
        config.iterations
    );

    let mut buffers = DoubleBuffer::new(src);
    for _ in 0..config.iterations {
        let (current, next) = buffers.split();
        box_blur_pass(&pool, current, next, size, config.policy, config.border)?;
        buffers.swap();
    }

    Ok(buffers.into_current())
}

/// Blur an image by applying the 3x3 box filter repeatedly.
///
/// The pass `n + 1` reads the output of pass `n`. Two buffers are allocated
/// for the whole run and alternate between the source and destination roles.
///
/// # Arguments
///
/// * `image` - The source image.
/// * `config` - The filter parameters.
///
/// # Returns
///
/// The filtered image. With zero iterations the input image is returned as is.
///
/// # Example
///
/// ```
/// use forkblur_image::{PackedImage, Pixel};
/// use forkblur_imgproc::filter::{box_blur_iterative, FilterConfig};
///
/// let image = PackedImage::from_size_val([4, 4].into(), Pixel::WHITE).unwrap();
/// let config = FilterConfig::default().with_iterations(1);
///
/// let filtered = box_blur_iterative(image, &config).unwrap();
///
/// assert!(filtered.as_slice().iter().all(|&p| p == Pixel::WHITE));
/// ```
pub fn box_blur_iterative(
    image: PackedImage,
    config: &FilterConfig,
) -> Result<PackedImage, FilterError> {
    let size = image.size();
    let data = box_blur_buffers(image.into_vec(), size, config)?;
    Ok(PackedImage::new(size, data)?)
}

/// Run the iterative box blur on a raw buffer with a dedicated pool of `worker_count` threads.
///
/// Border pixels follow [`BorderMode::Untouched`].
///
/// # Arguments
///
/// * `src` - The source pixels, row major.
/// * `width` - The width of the image.
/// * `height` - The height of the image.
/// * `worker_count` - The number of worker threads.
/// * `iterations` - The number of passes.
///
/// # Errors
///
/// Fails if `width * height != src.len()`, if a dimension is zero, or if the
/// worker pool cannot be created.
pub fn run_filter(
    src: Vec<Pixel>,
    width: u32,
    height: u32,
    worker_count: u32,
    iterations: u32,
) -> Result<Vec<Pixel>, FilterError> {
    let size = ImageSize {
        width: width as usize,
        height: height as usize,
    };
    let config = FilterConfig::default()
        .with_iterations(iterations as usize)
        .with_strategy(ExecutionStrategy::Fixed(worker_count as usize))
        .with_border(BorderMode::Untouched);

    box_blur_buffers(src, size, &config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_buffer_swap() {
        let src = vec![Pixel::WHITE; 6];
        let src_ptr = src.as_ptr();

        let mut buffers = DoubleBuffer::new(src);
        assert_eq!(buffers.len(), 6);
        assert_eq!(buffers.current_index(), 0);

        let (current, next) = buffers.split();
        assert_eq!(current.as_ptr(), src_ptr);
        assert_ne!(next.as_ptr(), src_ptr);
        assert!(next.iter().all(|&p| p == Pixel::BLACK));
        next[0] = Pixel(7);
        let next_ptr = next.as_ptr();

        buffers.swap();
        assert_eq!(buffers.current_index(), 1);
        assert_eq!(buffers.current()[0], Pixel(7));
        let (current, next) = buffers.split();
        assert_eq!(current.as_ptr(), next_ptr);
        assert_eq!(next.as_ptr(), src_ptr);

        buffers.swap();
        assert_eq!(buffers.into_current().as_ptr(), src_ptr);
    }

    #[test]
    fn test_box_blur_serial_white() -> Result<(), FilterError> {
        let size = ImageSize {
            width: 4,
            height: 4,
        };
        let src = vec![Pixel::WHITE; 16];

        let mut dst = vec![Pixel::BLACK; 16];
        box_blur_serial(&src, &mut dst, size, BorderMode::Copy)?;
        assert_eq!(dst, vec![Pixel::WHITE; 16]);

        let mut dst = vec![Pixel::BLACK; 16];
        box_blur_serial(&src, &mut dst, size, BorderMode::Untouched)?;
        #[rustfmt::skip]
        let expected: Vec<Pixel> = [
            0, 0, 0, 0,
            0, 1, 1, 0,
            0, 1, 1, 0,
            0, 0, 0, 0,
        ]
        .iter()
        .map(|&v| if v == 1 { Pixel::WHITE } else { Pixel::BLACK })
        .collect();
        assert_eq!(dst, expected);

        Ok(())
    }

    #[test]
    fn test_box_blur_pass_single_red() -> Result<(), FilterError> {
        let size = ImageSize {
            width: 5,
            height: 5,
        };
        let mut src = vec![Pixel::BLACK; 25];
        src[12] = Pixel(0x00ff0000);

        let pool = WorkerPool::new(2)?;
        let mut dst = vec![Pixel::BLACK; 25];
        box_blur_pass(
            &pool,
            &src,
            &mut dst,
            size,
            SplitPolicy::default().with_threshold(4),
            BorderMode::Untouched,
        )?;

        // 255 / 9 = 28
        let red = Pixel::from_rgb(28, 0, 0);
        for (i, &p) in dst.iter().enumerate() {
            let (x, y) = (i % 5, i / 5);
            if (1..4).contains(&x) && (1..4).contains(&y) {
                assert_eq!(p, red, "pixel ({x}, {y})");
            } else {
                assert_eq!(p, Pixel::BLACK, "pixel ({x}, {y})");
            }
        }

        Ok(())
    }

    #[test]
    fn test_box_blur_pass_size_checks() -> Result<(), FilterError> {
        let pool = WorkerPool::new(1)?;
        let src = vec![Pixel::BLACK; 16];
        let policy = SplitPolicy::default();

        let mut dst = vec![Pixel::BLACK; 15];
        let res = box_blur_pass(&pool, &src, &mut dst, [4, 4].into(), policy, BorderMode::Copy);
        assert_eq!(res, Err(ParallelError::SizeMismatch(16, 15).into()));

        let mut dst = vec![Pixel::BLACK; 16];
        let res = box_blur_pass(&pool, &src, &mut dst, [5, 4].into(), policy, BorderMode::Copy);
        assert_eq!(res, Err(ImageError::InvalidDataLength(16, 20).into()));

        Ok(())
    }

    #[test]
    fn test_run_filter_invalid_input() {
        let res = run_filter(vec![Pixel::BLACK; 10], 4, 4, 2, 1);
        assert_eq!(res, Err(ImageError::InvalidDataLength(10, 16).into()));

        let res = run_filter(vec![], 0, 4, 2, 1);
        assert_eq!(res, Err(ImageError::InvalidImageSize(0, 4).into()));

        let res = run_filter(vec![Pixel::BLACK; 16], 4, 4, 0, 1);
        assert_eq!(res, Err(ParallelError::InvalidThreadCount(0).into()));

        let res = run_filter(vec![Pixel::BLACK; 16], 4, 4, 0, 0);
        assert_eq!(res, Err(ParallelError::InvalidThreadCount(0).into()));
    }

    #[test]
    fn test_run_filter_zero_iterations() -> Result<(), FilterError> {
        let src: Vec<Pixel> = (0..12).map(Pixel).collect();
        let src_ptr = src.as_ptr();
        let expected = src.clone();

        let out = run_filter(src, 4, 3, 2, 0)?;
        assert_eq!(out.as_ptr(), src_ptr);
        assert_eq!(out, expected);
        Ok(())
    }

    #[test]
    fn test_run_filter_swap_identity() -> Result<(), FilterError> {
        for iterations in 1..=4 {
            let src = vec![Pixel::WHITE; 64];
            let src_ptr = src.as_ptr();
            let out = run_filter(src, 8, 8, 2, iterations)?;
            assert_eq!(
                out.as_ptr() == src_ptr,
                iterations % 2 == 0,
                "iterations: {iterations}"
            );
        }
        Ok(())
    }

    #[test]
    fn test_box_blur_iterative_config() -> Result<(), FilterError> {
        let image = PackedImage::from_size_val([6, 5].into(), Pixel::from_rgb(90, 45, 18))?;
        let config = FilterConfig::default()
            .with_iterations(3)
            .with_strategy(ExecutionStrategy::Serial)
            .with_border(BorderMode::Copy);

        let filtered = box_blur_iterative(image.clone(), &config)?;
        assert_eq!(filtered, image);
        Ok(())
    }
}
