//! Population driver: one independent WhiteStripe run per volume, in parallel.
//!
//! A failing volume is reported and skipped, its siblings still run, and no
//! output file is written for it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use itertools::Itertools;
use log::{error, info, warn};
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::nifti_io::{is_nifti, load_mask, load_volume, save_volume, split_nifti_name};
use crate::params::WhiteStripeParams;
use crate::plot_histogram::plot_histogram;
use crate::whitestripe;

pub const OUTPUT_SUFFIX: &str = "_ws";

#[derive(Debug, Clone, PartialEq)]
pub struct BatchJob {
    pub image: PathBuf,
    pub mask: Option<PathBuf>,
    pub output: PathBuf,
}

/// Per-volume numbers worth reporting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageSummary {
    pub mode: f64,
    pub location: f64,
    pub scale: f64,
    pub stripe_voxels: usize,
}

#[derive(Debug)]
pub struct ItemOutcome {
    pub job: BatchJob,
    pub result: Result<ImageSummary>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&BatchJob, &Error)> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().err().map(|e| (&o.job, e)))
    }

    pub fn all_succeeded(&self) -> bool {
        self.succeeded() == self.outcomes.len()
    }
}

/// `<output_dir>/<stem>_ws<ext>`
pub fn output_path(image: &Path, output_dir: &Path) -> PathBuf {
    let (stem, ext) = split_nifti_name(image);
    output_dir.join(format!("{}{}{}", stem, OUTPUT_SUFFIX, ext))
}

pub fn list_nifti_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let io_err = |source| Error::Io { path: dir.to_path_buf(), source };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && is_nifti(&path) {
            files.push(path);
        }
    }
    Ok(files.into_iter().sorted().collect())
}

/// Pairs images with masks. `image` and `mask` may each be a file or a
/// directory; directory contents are paired in sorted order, and a single
/// mask file is shared by every image.
pub fn discover_jobs(image: &Path, mask: Option<&Path>, output_dir: &Path) -> Result<Vec<BatchJob>> {
    let images = if image.is_dir() { list_nifti_files(image)? } else { vec![image.to_path_buf()] };
    if images.is_empty() {
        return Err(Error::Configuration(format!("no NIfTI files found in {}", image.display())));
    }

    let masks: Vec<Option<PathBuf>> = match mask {
        None => vec![None; images.len()],
        Some(mask) if mask.is_dir() => {
            let masks = list_nifti_files(mask)?;
            if masks.len() != images.len() {
                return Err(Error::Configuration(format!(
                    "{} images but {} masks in {}",
                    images.len(),
                    masks.len(),
                    mask.display()
                )));
            }
            masks.into_iter().map(Some).collect()
        }
        Some(mask) => vec![Some(mask.to_path_buf()); images.len()],
    };

    Ok(images
        .into_iter()
        .zip(masks)
        .map(|(image, mask)| {
            let output = output_path(&image, output_dir);
            BatchJob { image, mask, output }
        })
        .collect())
}

pub fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|source| Error::Io { path: dir.to_path_buf(), source })
}

/// Load, normalize, optionally plot, then write. Nothing is written on failure.
pub fn process_job(job: &BatchJob, params: &WhiteStripeParams, plot_dir: Option<&Path>) -> Result<ImageSummary> {
    let volume = load_volume(&job.image)?;
    let mask = job.mask.as_deref().map(load_mask).transpose()?;
    let result = whitestripe(&volume, mask.as_ref(), params)?;

    if let Some(plot_dir) = plot_dir {
        let (stem, _) = split_nifti_name(&job.image);
        let plot_path = plot_dir.join(format!("{}_hist.png", stem));
        // diagnostics only, the normalized volume is still written
        if let Err(e) = plot_histogram(&plot_path, &result.histogram, &result.mode, Some(&result.stripe)) {
            warn!("{}: {}", job.image.display(), e);
        }
    }

    save_volume(&result.normalized, &job.output)?;
    Ok(ImageSummary {
        mode: result.mode.value,
        location: result.parameters.location,
        scale: result.parameters.scale,
        stripe_voxels: result.stripe.len(),
    })
}

pub fn run_batch(jobs: Vec<BatchJob>, params: &WhiteStripeParams, plot_dir: Option<&Path>) -> BatchReport {
    let total = jobs.len();
    let done = AtomicUsize::new(0);

    let outcomes: Vec<ItemOutcome> = jobs
        .into_par_iter()
        .map(|job| {
            let result = process_job(&job, params, plot_dir);
            let n = done.fetch_add(1, Ordering::Relaxed) + 1;
            match &result {
                Ok(s) => info!(
                    "[{}/{}] {} -> {} (mode {:.3}, mean {:.3}, std {:.3})",
                    n,
                    total,
                    job.image.display(),
                    job.output.display(),
                    s.mode,
                    s.location,
                    s.scale
                ),
                Err(e) => error!("[{}/{}] {} failed: {}", n, total, job.image.display(), e),
            }
            ItemOutcome { job, result }
        })
        .collect();

    let report = BatchReport { outcomes };
    info!("{} of {} volumes normalized", report.succeeded(), total);
    report
}
