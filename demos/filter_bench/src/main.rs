use argh::FromArgs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use forkblur::{
    image::PackedImage,
    imgproc::{
        filter::{box_blur_iterative, kernels::BorderMode, FilterConfig},
        parallel::ExecutionStrategy,
    },
    io::functional as F,
};

/// Speedup expected per thread for a parallel run to be considered ok.
const INITIAL_SPEED_UP: f64 = 0.7;

const DEFAULT_THREADS: [usize; 6] = [1, 2, 4, 8, 16, 32];

#[derive(FromArgs)]
/// Compare the sequential and the fork-join box blur on an image
struct Args {
    /// path to the source image
    #[argh(positional)]
    image: PathBuf,

    /// directory where the filtered images are written
    #[argh(option, short = 'o', default = "PathBuf::from(\".\")")]
    output_dir: PathBuf,

    /// number of filter passes
    #[argh(option, short = 'n', default = "100")]
    iterations: usize,

    /// thread count to benchmark, repeat for several runs
    #[argh(option, short = 't')]
    threads: Vec<usize>,

    /// border handling: untouched or copy
    #[argh(option, default = "BorderMode::Untouched", from_str_fn(parse_border))]
    border: BorderMode,
}

fn parse_border(value: &str) -> Result<BorderMode, String> {
    match value.to_lowercase().as_str() {
        "untouched" => Ok(BorderMode::Untouched),
        "copy" => Ok(BorderMode::Copy),
        _ => Err(format!("Invalid border mode: {value}")),
    }
}

fn run_timed(
    image: &PackedImage,
    config: &FilterConfig,
) -> Result<(PackedImage, Duration), Box<dyn std::error::Error>> {
    let image = image.clone();
    let start = Instant::now();
    let filtered = box_blur_iterative(image, config)?;
    Ok((filtered, start.elapsed()))
}

fn write_output(
    output_dir: &Path,
    file_name: &str,
    image: &PackedImage,
) -> Result<(), Box<dyn std::error::Error>> {
    let file_path = output_dir.join(file_name);
    F::write_image_packed(&file_path, image)?;
    println!("Output image: {}\n", file_path.display());
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Args = argh::from_env();

    let image = F::read_image_packed(&args.image)?;
    println!("Source image: {}", args.image.display());
    println!("Image size is {}x{}\n", image.width(), image.height());

    let file_name = args
        .image
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| format!("Invalid image path: {}", args.image.display()))?;

    std::fs::create_dir_all(&args.output_dir)?;

    let config = FilterConfig::default()
        .with_iterations(args.iterations)
        .with_border(args.border);

    println!("Starting sequential image filter.");
    let (sample, sample_time) =
        run_timed(&image, &config.with_strategy(ExecutionStrategy::Serial))?;
    println!(
        "Sequential image filter took {} milliseconds.",
        sample_time.as_millis()
    );
    write_output(&args.output_dir, &format!("Filtered{file_name}"), &sample)?;

    let processors = std::thread::available_parallelism().map_or(1, |n| n.get());
    println!("Available processors: {processors}\n");

    let threads = if args.threads.is_empty() {
        DEFAULT_THREADS.to_vec()
    } else {
        args.threads
    };

    for num_threads in threads {
        println!("Starting parallel image filter using {num_threads} threads.");
        let (filtered, elapsed) = run_timed(
            &image,
            &config.with_strategy(ExecutionStrategy::Fixed(num_threads)),
        )?;

        let speed_up = sample_time.as_secs_f64() / elapsed.as_secs_f64().max(f64::EPSILON);
        let sample_speed_up = INITIAL_SPEED_UP * num_threads as f64;
        let ok = speed_up >= sample_speed_up;
        log::debug!("{num_threads} threads: {elapsed:?} against {sample_time:?}");

        println!(
            "Parallel image filter took {} milliseconds using {num_threads} threads.",
            elapsed.as_millis()
        );
        if filtered == sample {
            println!("Output image verified successfully!");
        } else {
            println!("INCORRECT IMAGE!");
        }
        println!(
            "Speedup: {speed_up:.5} {} ({} {sample_speed_up:.1})",
            if ok { "ok" } else { "not ok" },
            if ok { ">=" } else { "<" },
        );

        write_output(
            &args.output_dir,
            &format!("ParallelFiltered{num_threads}_{file_name}"),
            &filtered,
        )?;
    }

    Ok(())
}
