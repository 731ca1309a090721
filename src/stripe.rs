use itertools::Itertools;
use log::debug;
use ndarray::{ArrayView1, Zip};

use crate::error::{Error, Result};
use crate::volume::{check_shape, Mask, Volume};

/// Voxels whose intensity falls strictly inside the quantile window around the mode.
#[derive(Debug, Clone)]
pub struct Stripe {
    pub mask: Mask,
    /// Intensity thresholds (exclusive)
    pub lower: f64,
    pub upper: f64,
    pub mode_quantile: f64,
    pub lower_quantile: f64,
    pub upper_quantile: f64,
}

impl Stripe {
    pub fn len(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.mask.iter().any(|&m| m)
    }
}

/// Fraction of `voi` strictly below `mode`.
pub fn mode_quantile(voi: ArrayView1<f64>, mode: f64) -> f64 {
    if voi.is_empty() {
        return 0.0;
    }
    voi.iter().filter(|&&v| v < mode).count() as f64 / voi.len() as f64
}

pub fn quantile_bounds(mode_quantile: f64, width_lower: f64, width_upper: f64) -> (f64, f64) {
    let lower = (mode_quantile - width_lower).clamp(0.0, 1.0);
    let upper = (mode_quantile + width_upper).clamp(0.0, 1.0);
    (lower, upper)
}

/// Empirical quantile of ascending `sorted` with linear interpolation between order statistics.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    let h = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

pub fn select_stripe(
    volume: &Volume,
    region: &Mask,
    voi: ArrayView1<f64>,
    mode: f64,
    width_lower: f64,
    width_upper: f64,
) -> Result<Stripe> {
    check_shape(volume, region)?;
    if voi.is_empty() {
        return Err(Error::NoVoxelsOfInterest);
    }
    if !(width_lower >= 0.0 && width_upper >= 0.0) {
        return Err(Error::Configuration(format!(
            "stripe widths must be non-negative, got {} and {}",
            width_lower, width_upper
        )));
    }

    let q = mode_quantile(voi, mode);
    let (lower_quantile, upper_quantile) = quantile_bounds(q, width_lower, width_upper);
    let sorted = voi.iter().copied().sorted_by(|a, b| a.total_cmp(b)).collect_vec();
    let lower = quantile_sorted(&sorted, lower_quantile);
    let upper = quantile_sorted(&sorted, upper_quantile);
    debug!(
        "mode {:.4} at quantile {:.4}, window [{:.4}, {:.4}] -> intensities ({:.4}, {:.4})",
        mode, q, lower_quantile, upper_quantile, lower, upper
    );

    let mask = Zip::from(&volume.data)
        .and(region)
        .map_collect(|&v, &r| r && v > lower && v < upper);
    let stripe = Stripe { mask, lower, upper, mode_quantile: q, lower_quantile, upper_quantile };
    if stripe.is_empty() {
        return Err(Error::EmptyStripe { lower, upper });
    }
    Ok(stripe)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use more_asserts::{assert_ge, assert_le};
    use ndarray::{array, Array1, ArrayD, IxDyn};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn random_volume(seed: u64) -> (Volume, Mask) {
        let mut rng = StdRng::seed_from_u64(seed);
        let data = ArrayD::from_shape_fn(IxDyn(&[8, 8, 8]), |_| rng.random_range(1.0..200.0));
        let volume = Volume::from_data(data);
        let region = volume.foreground();
        (volume, region)
    }

    #[test]
    fn test_mode_quantile_counts_strictly_below() {
        let voi = array![1.0, 2.0, 3.0, 3.0, 4.0];
        assert_abs_diff_eq!(mode_quantile(voi.view(), 3.0), 0.4);
        assert_abs_diff_eq!(mode_quantile(voi.view(), 0.0), 0.0);
        assert_abs_diff_eq!(mode_quantile(voi.view(), 10.0), 1.0);
    }

    #[test]
    fn test_bounds_stay_ordered_inside_unit_interval() {
        for i in 0..=100 {
            let q = i as f64 / 100.0;
            for (wl, wu) in [(0.0, 0.0), (0.05, 0.05), (0.3, 0.01), (0.0, 0.7), (1.5, 2.0)] {
                let (lo, hi) = quantile_bounds(q, wl, wu);
                assert_ge!(lo, 0.0);
                assert_le!(lo, hi);
                assert_le!(hi, 1.0);
            }
        }
    }

    #[test]
    fn test_quantile_interpolates_linearly() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_abs_diff_eq!(quantile_sorted(&sorted, 0.0), 1.0);
        assert_abs_diff_eq!(quantile_sorted(&sorted, 0.5), 2.5);
        assert_abs_diff_eq!(quantile_sorted(&sorted, 1.0), 4.0);
        assert_abs_diff_eq!(quantile_sorted(&sorted, 0.1), 1.3, epsilon = 1e-12);
        assert_abs_diff_eq!(quantile_sorted(&[5.0], 0.7), 5.0);
    }

    #[test]
    fn test_stripe_grows_with_width() {
        let (volume, region) = random_volume(11);
        let voi: Array1<f64> = volume.data.iter().copied().collect();
        let mut previous = 0;
        for w in [0.01, 0.02, 0.05, 0.1, 0.2, 0.5] {
            let stripe = select_stripe(&volume, &region, voi.view(), 100.0, w, w).unwrap();
            assert_ge!(stripe.len(), previous);
            previous = stripe.len();
        }
        let mut previous = 0;
        for wu in [0.01, 0.05, 0.3] {
            let stripe = select_stripe(&volume, &region, voi.view(), 100.0, 0.02, wu).unwrap();
            assert_ge!(stripe.len(), previous);
            previous = stripe.len();
        }
    }

    #[test]
    fn test_stripe_is_inside_region_and_window() {
        let (volume, _) = random_volume(3);
        let region = volume.data.mapv(|v| v < 150.0);
        let voi: Array1<f64> = volume.data.iter().copied().filter(|&v| v < 150.0).collect();
        let stripe = select_stripe(&volume, &region, voi.view(), 75.0, 0.05, 0.1).unwrap();
        Zip::from(&stripe.mask).and(&region).and(&volume.data).for_each(|&s, &r, &v| {
            if s {
                assert!(r);
                assert!(v > stripe.lower && v < stripe.upper);
            }
        });
        assert_abs_diff_eq!(stripe.upper_quantile - stripe.mode_quantile, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_width_is_empty_stripe() {
        let (volume, region) = random_volume(5);
        let voi: Array1<f64> = volume.data.iter().copied().collect();
        let result = select_stripe(&volume, &region, voi.view(), 100.0, 0.0, 0.0);
        assert!(matches!(result, Err(Error::EmptyStripe { .. })));
    }

    #[test]
    fn test_negative_width_rejected() {
        let (volume, region) = random_volume(5);
        let voi: Array1<f64> = volume.data.iter().copied().collect();
        let result = select_stripe(&volume, &region, voi.view(), 100.0, -0.1, 0.05);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
