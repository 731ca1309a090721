use itertools::{Itertools, MinMaxResult};
use ndarray::{Array1, ArrayView1};

use crate::error::{Error, Result};

/// Equal-width histogram over the observed range of a voxel population.
#[derive(Debug, Clone)]
pub struct Histogram {
    pub bin_centers: Array1<f64>,
    pub counts: Array1<u64>,
    pub bin_width: f64,
}

impl Histogram {
    /// Bins `values` like `numpy.histogram`: `n_bins` equal bins over `[min, max]`,
    /// the last bin closed on the right. A constant population gets a unit-wide range.
    pub fn new(values: ArrayView1<f64>, n_bins: usize) -> Result<Self> {
        if n_bins == 0 {
            return Err(Error::Configuration("histogram needs at least one bin".into()));
        }
        let (lo, hi) = match values.iter().copied().filter(|v| v.is_finite()).minmax() {
            MinMaxResult::NoElements => return Err(Error::NoVoxelsOfInterest),
            MinMaxResult::OneElement(v) => (v - 0.5, v + 0.5),
            MinMaxResult::MinMax(lo, hi) if lo == hi => (lo - 0.5, hi + 0.5),
            MinMaxResult::MinMax(lo, hi) => (lo, hi),
        };
        let bin_width = (hi - lo) / n_bins as f64;

        let mut counts: Array1<u64> = Array1::zeros((n_bins,));
        values.iter().filter(|v| v.is_finite()).for_each(|&v| {
            let idx = (((v - lo) / bin_width) as usize).min(n_bins - 1);
            counts[idx] += 1;
        });
        let bin_centers = Array1::from_iter((0..n_bins).map(|i| lo + (i as f64 + 0.5) * bin_width));

        Ok(Self { bin_centers, counts, bin_width })
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.counts.sum()
    }

    /// Keeps the bins whose count satisfies `keep`. Centers need not stay evenly spaced.
    pub(crate) fn retain_bins(&self, keep: impl Fn(u64) -> bool) -> Histogram {
        let (bin_centers, counts): (Vec<f64>, Vec<u64>) = self
            .bin_centers
            .iter()
            .zip(self.counts.iter())
            .filter(|(_, c)| keep(**c))
            .map(|(&x, &c)| (x, c))
            .unzip();
        Histogram { bin_centers: Array1::from(bin_centers), counts: Array1::from(counts), bin_width: self.bin_width }
    }
}
