use std::path::PathBuf;

use clap::Parser;
use log::error;

use whitestripe::batch::{discover_jobs, ensure_dir, run_batch};
use whitestripe::logging::{level_for, setup_logging};
use whitestripe::params::{DEFAULT_BINS, DEFAULT_TAIL_TRIM, DEFAULT_WIDTH};
use whitestripe::{Contrast, Result, WhiteStripeParams};

#[derive(Parser, Debug)]
#[command(name = "whitestripe")]
#[command(author, version, about = "WhiteStripe intensity normalization of NIfTI volumes", long_about = None)]
struct Parameters {
    /// Input volume or directory of volumes
    #[arg(short, long, value_name = "PATH")]
    image: PathBuf,
    /// Brain mask, or directory of masks paired with the images in sorted order
    #[arg(short, long, value_name = "PATH")]
    mask: Option<PathBuf>,
    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,
    /// t1, t2, flair, pd, md, fa, other, or a peak policy: first, last, largest
    #[arg(short, long, default_value = "t1")]
    contrast: String,
    /// Quantile half-width of the stripe on both sides of the mode
    #[arg(short, long, default_value_t = DEFAULT_WIDTH)]
    width: f64,
    /// Overrides --width below the mode
    #[arg(long)]
    width_l: Option<f64>,
    /// Overrides --width above the mode
    #[arg(long)]
    width_u: Option<f64>,
    #[arg(long, default_value_t = DEFAULT_BINS)]
    n_bins: usize,
    /// Histogram tails below this fraction of the peak count are dropped before mode search
    #[arg(long, default_value_t = DEFAULT_TAIL_TRIM)]
    tail_trim: f64,
    /// Write a histogram plot per volume here
    #[arg(long, value_name = "DIR")]
    plot_dir: Option<PathBuf>,
    #[arg(short = 'j', long, value_name = "N")]
    threads: Option<usize>,
    #[arg(short, long)]
    verbose: bool,
}

fn run(args: &Parameters) -> Result<bool> {
    let contrast: Contrast = args.contrast.parse()?;
    let params = WhiteStripeParams::default()
        .with_contrast(contrast)
        .with_widths(args.width, args.width_l, args.width_u)
        .with_bins(args.n_bins)
        .with_tail_trim(args.tail_trim);
    params.validate()?;

    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(|e| whitestripe::Error::Configuration(format!("failed to configure thread pool: {}", e)))?;
    }

    ensure_dir(&args.output)?;
    if let Some(plot_dir) = &args.plot_dir {
        ensure_dir(plot_dir)?;
    }

    let jobs = discover_jobs(&args.image, args.mask.as_deref(), &args.output)?;
    let report = run_batch(jobs, &params, args.plot_dir.as_deref());
    for (job, e) in report.failures() {
        error!("{}: {}", job.image.display(), e);
    }
    Ok(report.all_succeeded())
}

fn main() {
    let args = Parameters::parse();
    let _logger = match setup_logging(level_for(args.verbose)) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    match run(&args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    }
}
