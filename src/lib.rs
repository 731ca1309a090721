use log::{debug, info};

pub mod batch;
pub mod error;
pub mod histogram;
pub mod logging;
pub mod mode;
pub mod nifti_io;
pub mod normalize;
pub mod params;
pub mod phantom;
pub mod plot_histogram;
pub mod smooth;
pub mod stripe;
pub mod volume;

pub use error::{Error, Result};
pub use histogram::Histogram;
pub use mode::{find_mode, Contrast, ModePolicy, TissueMode};
pub use normalize::{normalize, NormalizationParameters};
pub use params::WhiteStripeParams;
pub use smooth::{HistogramSmoother, SmootherConfig};
pub use stripe::{select_stripe, Stripe};
pub use volume::{Mask, Volume, VolumeMeta};

/// Everything produced for one volume; only `normalized` is meant to be persisted.
#[derive(Debug, Clone)]
pub struct WhiteStripeResult {
    pub normalized: Volume,
    pub histogram: Histogram,
    pub mode: TissueMode,
    pub stripe: Stripe,
    pub parameters: NormalizationParameters,
}

/// WhiteStripe normalization of a single volume.
///
/// Voxels of interest are the strictly positive voxels, restricted to `mask`
/// when one is given. Their histogram is smoothed, the tissue mode picked
/// according to the contrast, and the volume rescaled by the mean and
/// standard deviation of the voxels in the quantile window around that mode.
/// The input volume is left untouched.
pub fn whitestripe(volume: &Volume, mask: Option<&Mask>, params: &WhiteStripeParams) -> Result<WhiteStripeResult> {
    params.validate()?;

    let region = volume::region_of_interest(volume, mask)?;
    let voi = volume::voxels_of_interest(volume, &region)?;
    debug!("{} voxels of interest", voi.len());

    let histogram = Histogram::new(voi.view(), params.n_bins)?;
    let smoother = HistogramSmoother::new(params.smoother.clone());
    let mode = find_mode(&histogram, params.contrast.policy(), params.tail_trim, &smoother)?;
    debug!("{} mode ({:?}) at {:.4}", params.contrast, params.contrast.policy(), mode.value);

    let stripe = select_stripe(volume, &region, voi.view(), mode.value, params.width_lower, params.width_upper)?;
    let (normalized, parameters) = normalize(volume, &stripe)?;
    info!(
        "white stripe: mode {:.4}, {} voxels in ({:.4}, {:.4}), mean {:.4}, std {:.4}",
        mode.value,
        stripe.len(),
        stripe.lower,
        stripe.upper,
        parameters.location,
        parameters.scale
    );

    Ok(WhiteStripeResult { normalized, histogram, mode, stripe, parameters })
}
