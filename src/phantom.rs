use ndarray::{ArrayD, IxDyn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::error::{Error, Result};
use crate::volume::Volume;

/// Intensity distribution of one synthetic tissue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TissueClass {
    pub mean: f64,
    pub std: f64,
    /// Relative share of the non-background voxels
    pub weight: f64,
}

/// Synthetic volume: zero background plus tissues drawn from normal
/// distributions truncated at `truncate_sigma` standard deviations.
pub fn phantom(
    shape: &[usize],
    background_fraction: f64,
    tissues: &[TissueClass],
    truncate_sigma: f64,
    seed: u64,
) -> Result<Volume> {
    let total_weight: f64 = tissues.iter().map(|t| t.weight).sum();
    if tissues.is_empty() || !(total_weight > 0.0) {
        return Err(Error::Configuration("phantom needs at least one weighted tissue".into()));
    }
    if !(truncate_sigma > 0.0) {
        return Err(Error::Configuration(format!("truncation must be positive, got {}", truncate_sigma)));
    }
    // the rejection loop below only terminates for these
    if let Some(t) = tissues.iter().find(|t| !(t.std >= 0.0 && t.weight >= 0.0 && t.mean.is_finite())) {
        return Err(Error::Configuration(format!("invalid tissue {:?}", t)));
    }
    let normals = tissues
        .iter()
        .map(|t| Normal::new(t.mean, t.std).map_err(|e| Error::Configuration(format!("tissue {:?}: {}", t, e))))
        .collect::<Result<Vec<_>>>()?;

    let mut rng = StdRng::seed_from_u64(seed);
    let data = ArrayD::from_shape_fn(IxDyn(shape), |_| {
        if rng.random::<f64>() < background_fraction {
            return 0.0;
        }
        let mut pick = rng.random::<f64>() * total_weight;
        let idx = tissues
            .iter()
            .position(|t| {
                pick -= t.weight;
                pick < 0.0
            })
            .unwrap_or(tissues.len() - 1);
        let (tissue, normal) = (&tissues[idx], &normals[idx]);
        loop {
            let v = normal.sample(&mut rng);
            if (v - tissue.mean).abs() <= truncate_sigma * tissue.std {
                return v;
            }
        }
    });
    Ok(Volume::from_data(data))
}
