use ndarray::{Array1, ArrayD, Zip};
use nifti::NiftiHeader;

use crate::error::{Error, Result};

pub type Mask = ArrayD<bool>;

pub const IDENTITY_AFFINE: [[f64; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Spatial metadata carried through normalization untouched.
#[derive(Debug, Clone)]
pub struct VolumeMeta {
    /// Voxel-to-world transform, row-major
    pub affine: [[f64; 4]; 4],
    /// Header of the file the volume was read from, if any
    pub header: Option<NiftiHeader>,
}

impl Default for VolumeMeta {
    fn default() -> Self {
        Self { affine: IDENTITY_AFFINE, header: None }
    }
}

#[derive(Debug, Clone)]
pub struct Volume {
    pub data: ArrayD<f64>,
    pub meta: VolumeMeta,
}

impl Volume {
    pub fn new(data: ArrayD<f64>, meta: VolumeMeta) -> Self {
        Self { data, meta }
    }

    pub fn from_data(data: ArrayD<f64>) -> Self {
        Self::new(data, VolumeMeta::default())
    }

    /// New volume with the same metadata and a different intensity payload.
    pub fn with_data(&self, data: ArrayD<f64>) -> Self {
        Self { data, meta: self.meta.clone() }
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Strictly positive voxels.
    pub fn foreground(&self) -> Mask {
        self.data.mapv(|v| v > 0.0)
    }
}

pub(crate) fn check_shape(volume: &Volume, mask: &Mask) -> Result<()> {
    if volume.shape() != mask.shape() {
        return Err(Error::ShapeMismatch {
            image: volume.shape().to_vec(),
            mask: mask.shape().to_vec(),
        });
    }
    Ok(())
}

/// Region the stripe may be drawn from: foreground, restricted to `mask` when given.
pub fn region_of_interest(volume: &Volume, mask: Option<&Mask>) -> Result<Mask> {
    let mut region = volume.foreground();
    if let Some(mask) = mask {
        check_shape(volume, mask)?;
        Zip::from(&mut region).and(mask).for_each(|r, &m| *r = *r && m);
    }
    Ok(region)
}

/// Intensities of the voxels selected by `region`, in memory order.
pub fn voxels_of_interest(volume: &Volume, region: &Mask) -> Result<Array1<f64>> {
    let voi: Array1<f64> = Zip::from(&volume.data)
        .and(region)
        .fold(Vec::new(), |mut acc, &v, &r| {
            if r && v.is_finite() {
                acc.push(v);
            }
            acc
        })
        .into();
    if voi.is_empty() {
        return Err(Error::NoVoxelsOfInterest);
    }
    Ok(voi)
}
