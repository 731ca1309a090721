use crate::error::{Error, Result};
use crate::mode::Contrast;
use crate::smooth::SmootherConfig;

pub const DEFAULT_WIDTH: f64 = 0.05;
pub const DEFAULT_BINS: usize = 2000;
pub const DEFAULT_TAIL_TRIM: f64 = 0.2;

#[derive(Debug, Clone, PartialEq)]
pub struct WhiteStripeParams {
    pub contrast: Contrast,
    /// Quantile distance below the mode's quantile
    pub width_lower: f64,
    /// Quantile distance above the mode's quantile
    pub width_upper: f64,
    pub n_bins: usize,
    /// Bins below this fraction of the tallest bin are trimmed from the tails
    pub tail_trim: f64,
    pub smoother: SmootherConfig,
}

impl Default for WhiteStripeParams {
    fn default() -> Self {
        Self {
            contrast: Contrast::T1,
            width_lower: DEFAULT_WIDTH,
            width_upper: DEFAULT_WIDTH,
            n_bins: DEFAULT_BINS,
            tail_trim: DEFAULT_TAIL_TRIM,
            smoother: SmootherConfig::default(),
        }
    }
}

impl WhiteStripeParams {
    pub fn with_contrast(mut self, contrast: Contrast) -> Self {
        self.contrast = contrast;
        self
    }

    /// Symmetric window, sets both sides.
    pub fn with_width(mut self, width: f64) -> Self {
        self.width_lower = width;
        self.width_upper = width;
        self
    }

    /// Common width, each side overridable.
    pub fn with_widths(mut self, width: f64, width_lower: Option<f64>, width_upper: Option<f64>) -> Self {
        self.width_lower = width_lower.unwrap_or(width);
        self.width_upper = width_upper.unwrap_or(width);
        self
    }

    pub fn with_bins(mut self, n_bins: usize) -> Self {
        self.n_bins = n_bins;
        self
    }

    pub fn with_tail_trim(mut self, tail_trim: f64) -> Self {
        self.tail_trim = tail_trim;
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (name, w) in [("width_lower", self.width_lower), ("width_upper", self.width_upper)] {
            if !(0.0..=1.0).contains(&w) {
                return Err(Error::Configuration(format!("{} must be within [0, 1], got {}", name, w)));
            }
        }
        if self.n_bins < 4 {
            return Err(Error::Configuration(format!("at least 4 histogram bins needed, got {}", self.n_bins)));
        }
        if !(0.0..1.0).contains(&self.tail_trim) {
            return Err(Error::Configuration(format!("tail trim must be within [0, 1), got {}", self.tail_trim)));
        }
        if self.smoother.n_splines < 4 {
            return Err(Error::Configuration(format!(
                "at least 4 spline basis functions needed, got {}",
                self.smoother.n_splines
            )));
        }
        if self.smoother.lambdas.is_empty() || self.smoother.lambdas.iter().any(|l| !(*l > 0.0)) {
            return Err(Error::Configuration("smoothing penalties must be positive and non-empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = WhiteStripeParams::default();
        assert_eq!(params.contrast, Contrast::T1);
        assert_eq!(params.width_lower, 0.05);
        assert_eq!(params.width_upper, 0.05);
        assert_eq!(params.n_bins, 2000);
        assert_eq!(params.tail_trim, 0.2);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_side_widths_override_common_width() {
        let params = WhiteStripeParams::default().with_widths(0.1, None, Some(0.02));
        assert_eq!(params.width_lower, 0.1);
        assert_eq!(params.width_upper, 0.02);
    }

    #[test]
    fn test_invalid_values() {
        assert!(WhiteStripeParams::default().with_width(1.5).validate().is_err());
        assert!(WhiteStripeParams::default().with_width(-0.01).validate().is_err());
        assert!(WhiteStripeParams::default().with_width(f64::NAN).validate().is_err());
        assert!(WhiteStripeParams::default().with_bins(2).validate().is_err());
        assert!(WhiteStripeParams::default().with_tail_trim(1.0).validate().is_err());
        let mut params = WhiteStripeParams::default();
        params.smoother.lambdas.clear();
        assert!(matches!(params.validate(), Err(Error::Configuration(_))));
    }
}
