use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use log::debug;
use ndarray::Array1;
use ndarray_stats::QuantileExt;

use crate::error::{Error, Result};
use crate::histogram::Histogram;
use crate::smooth::HistogramSmoother;

const MIN_PEAK_BINS: usize = 4;

/// Which local maximum of the smoothed histogram marks the reference tissue.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModePolicy {
    First,
    Last,
    Largest,
}

/// MR contrast of the input volume.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Contrast {
    T1,
    T2,
    Flair,
    Pd,
    Md,
    Fa,
    Other,
    /// Explicit policy, no contrast implied
    Peak(ModePolicy),
}

impl Contrast {
    pub fn policy(self) -> ModePolicy {
        match self {
            Contrast::T1 | Contrast::Fa | Contrast::Other => ModePolicy::Last,
            Contrast::T2 | Contrast::Flair => ModePolicy::Largest,
            Contrast::Pd | Contrast::Md => ModePolicy::First,
            Contrast::Peak(policy) => policy,
        }
    }
}

impl FromStr for Contrast {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "t1" => Ok(Contrast::T1),
            "t2" => Ok(Contrast::T2),
            "flair" => Ok(Contrast::Flair),
            "pd" => Ok(Contrast::Pd),
            "md" => Ok(Contrast::Md),
            "fa" => Ok(Contrast::Fa),
            "other" => Ok(Contrast::Other),
            "first" => Ok(Contrast::Peak(ModePolicy::First)),
            "last" => Ok(Contrast::Peak(ModePolicy::Last)),
            "largest" => Ok(Contrast::Peak(ModePolicy::Largest)),
            v => Err(Error::Configuration(format!(
                "unknown contrast '{}', expected one of t1, t2, flair, pd, md, fa, other, first, last, largest",
                v
            ))),
        }
    }
}

impl fmt::Display for Contrast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Contrast::T1 => "t1",
            Contrast::T2 => "t2",
            Contrast::Flair => "flair",
            Contrast::Pd => "pd",
            Contrast::Md => "md",
            Contrast::Fa => "fa",
            Contrast::Other => "other",
            Contrast::Peak(ModePolicy::First) => "first",
            Contrast::Peak(ModePolicy::Last) => "last",
            Contrast::Peak(ModePolicy::Largest) => "largest",
        };
        f.write_str(name)
    }
}

/// Detected tissue peak together with the curve it was read from.
#[derive(Debug, Clone)]
pub struct TissueMode {
    pub value: f64,
    pub bin_centers: Array1<f64>,
    pub smoothed: Array1<f64>,
}

/// Drops every bin whose count is below `proportion * max(counts)`.
pub fn trim_tails(hist: &Histogram, proportion: f64) -> Histogram {
    let max_count = hist.counts.iter().copied().max().unwrap_or(0);
    let threshold = proportion * max_count as f64;
    hist.retain_bins(|c| c as f64 >= threshold)
}

/// Indices of strict interior local maxima.
pub fn local_maxima(curve: &Array1<f64>) -> Vec<usize> {
    curve
        .iter()
        .tuple_windows()
        .enumerate()
        .filter(|(_, (a, b, c))| b > a && b > c)
        .map(|(i, _)| i + 1)
        .collect()
}

/// Tail trimming (First / Last only), then smoothing, then peak selection.
pub fn find_mode(
    hist: &Histogram,
    policy: ModePolicy,
    tail_trim: f64,
    smoother: &HistogramSmoother,
) -> Result<TissueMode> {
    // Largest is left untrimmed
    let hist = match policy {
        ModePolicy::First | ModePolicy::Last if tail_trim > 0.0 => {
            let trimmed = trim_tails(hist, tail_trim);
            debug!("tail trim kept {} of {} bins", trimmed.len(), hist.len());
            trimmed
        }
        _ => hist.clone(),
    };

    // a cubic fit needs four bins, and flat counts have no strict maximum
    if policy != ModePolicy::Largest && (hist.len() < MIN_PEAK_BINS || hist.counts.iter().all_equal()) {
        return Err(Error::PeakNotFound(format!("no peak possible among {} bins left after tail trimming", hist.len())));
    }

    let smoothed = smoother.smooth(hist.bin_centers.view(), hist.counts.view())?;

    let idx = match policy {
        ModePolicy::Largest => smoothed
            .argmax()
            .map_err(|e| Error::PeakNotFound(format!("smoothed histogram has no maximum: {}", e)))?,
        ModePolicy::First | ModePolicy::Last => {
            let maxima = local_maxima(&smoothed);
            debug!("{} local maxima in the smoothed histogram", maxima.len());
            let pick = if policy == ModePolicy::First { maxima.first() } else { maxima.last() };
            *pick.ok_or_else(|| {
                Error::PeakNotFound(format!(
                    "no local maximum among {} bins in [{:.3}, {:.3}]",
                    hist.len(),
                    hist.bin_centers[0],
                    hist.bin_centers[hist.len() - 1],
                ))
            })?
        }
    };

    Ok(TissueMode { value: hist.bin_centers[idx], bin_centers: hist.bin_centers, smoothed })
}
