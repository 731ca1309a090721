use ndarray::Zip;
use num_traits::Float;

use crate::error::{Error, Result};
use crate::stripe::Stripe;
use crate::volume::{check_shape, Volume};

/// Location and scale of the stripe on the original intensities.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NormalizationParameters {
    pub location: f64,
    pub scale: f64,
}

/// Mean and population standard deviation.
pub fn mean_std<T: Float>(values: impl Iterator<Item = T> + Clone) -> Option<(T, T)> {
    let (n, sum) = values.clone().fold((0usize, T::zero()), |(n, s), v| (n + 1, s + v));
    if n == 0 {
        return None;
    }
    let n = T::from(n)?;
    let mean = sum / n;
    let var = values.fold(T::zero(), |acc, v| acc + (v - mean) * (v - mean)) / n;
    Some((mean, var.sqrt()))
}

pub fn stripe_parameters(volume: &Volume, stripe: &Stripe) -> Result<NormalizationParameters> {
    check_shape(volume, &stripe.mask)?;
    let stripe_values = Zip::from(&volume.data)
        .and(&stripe.mask)
        .fold(Vec::new(), |mut acc, &v, &s| {
            if s {
                acc.push(v);
            }
            acc
        });
    let (location, scale) = mean_std(stripe_values.iter().copied()).ok_or(Error::EmptyStripe {
        lower: stripe.lower,
        upper: stripe.upper,
    })?;
    if !(scale.is_finite() && scale > 0.0) {
        return Err(Error::DegenerateScale { location, scale });
    }
    Ok(NormalizationParameters { location, scale })
}

/// `(volume - location) / scale` as a new volume with the same metadata.
pub fn apply(volume: &Volume, params: &NormalizationParameters) -> Volume {
    volume.with_data(volume.data.mapv(|v| (v - params.location) / params.scale))
}

pub fn normalize(volume: &Volume, stripe: &Stripe) -> Result<(Volume, NormalizationParameters)> {
    let params = stripe_parameters(volume, stripe)?;
    Ok((apply(volume, &params), params))
}
