//! NIfTI-1 volume I/O
//!
//! Reads `.nii` / `.nii.gz` into [`Volume`]s and writes normalized volumes
//! back as float32, reusing the source header so orientation survives.

use std::path::Path;

use log::debug;
use ndarray::ArrayD;
use nifti::volume::ndarray::IntoNdArray;
use nifti::writer::WriterOptions;
use nifti::{NiftiHeader, NiftiObject, ReaderOptions};

use crate::error::{Error, Result};
use crate::volume::{Mask, Volume, VolumeMeta, IDENTITY_AFFINE};

/// Check if a path names a NIfTI file
pub fn is_nifti(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("").to_lowercase();
    name.ends_with(".nii") || name.ends_with(".nii.gz")
}

/// Split `subj01_t1.nii.gz` into (`subj01_t1`, `.nii.gz`)
pub fn split_nifti_name(path: &Path) -> (String, String) {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("").to_string();
    for ext in [".nii.gz", ".nii"] {
        if name.to_lowercase().ends_with(ext) {
            let stem = name[..name.len() - ext.len()].to_string();
            return (stem, name[name.len() - ext.len()..].to_string());
        }
    }
    (name, String::new())
}

pub fn load_volume(path: &Path) -> Result<Volume> {
    let read_err = |source| Error::ReadVolume { path: path.to_path_buf(), source };
    let obj = ReaderOptions::new().read_file(path).map_err(read_err)?;
    let header = obj.header().clone();
    let data: ArrayD<f64> = obj.into_volume().into_ndarray::<f64>().map_err(read_err)?;
    debug!("loaded {} with shape {:?}", path.display(), data.shape());

    let affine = affine_from_header(&header);
    Ok(Volume::new(data, VolumeMeta { affine, header: Some(header) }))
}

/// Any voxel above zero belongs to the mask.
pub fn load_mask(path: &Path) -> Result<Mask> {
    Ok(load_volume(path)?.data.mapv(|v| v > 0.0))
}

/// Writes float32 data. Scaling is reset since the payload is stored unscaled.
pub fn save_volume(volume: &Volume, path: &Path) -> Result<()> {
    let mut header = match &volume.meta.header {
        Some(header) => header.clone(),
        None => header_from_affine(&volume.meta.affine),
    };
    header.scl_slope = 1.0;
    header.scl_inter = 0.0;

    let data = volume.data.mapv(|v| v as f32);
    WriterOptions::new(path)
        .reference_header(&header)
        .write_nifti(&data)
        .map_err(|source| Error::WriteVolume { path: path.to_path_buf(), source })?;
    debug!("wrote {}", path.display());
    Ok(())
}

/// Get affine transformation matrix from header: sform, then qform, then voxel scaling.
fn affine_from_header(header: &NiftiHeader) -> [[f64; 4]; 4] {
    if header.sform_code > 0 {
        let row = |r: &[f32; 4]| [r[0] as f64, r[1] as f64, r[2] as f64, r[3] as f64];
        [row(&header.srow_x), row(&header.srow_y), row(&header.srow_z), [0.0, 0.0, 0.0, 1.0]]
    } else if header.qform_code > 0 {
        qform_affine(header)
    } else {
        let p = &header.pixdim;
        [
            [p[1] as f64, 0.0, 0.0, 0.0],
            [0.0, p[2] as f64, 0.0, 0.0],
            [0.0, 0.0, p[3] as f64, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }
}

/// Rotation from the (b, c, d) quaternion, scaled by pixdim, with pixdim[0]
/// as the handedness of the third axis.
fn qform_affine(header: &NiftiHeader) -> [[f64; 4]; 4] {
    let (b, c, d) = (header.quatern_b as f64, header.quatern_c as f64, header.quatern_d as f64);
    // a is implied; clamp round-off just past unit norm
    let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();
    let rotation = [
        [a * a + b * b - c * c - d * d, 2.0 * (b * c - a * d), 2.0 * (b * d + a * c)],
        [2.0 * (b * c + a * d), a * a + c * c - b * b - d * d, 2.0 * (c * d - a * b)],
        [2.0 * (b * d - a * c), 2.0 * (c * d + a * b), a * a + d * d - b * b - c * c],
    ];
    let qfac = if header.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
    let zooms = [header.pixdim[1] as f64, header.pixdim[2] as f64, header.pixdim[3] as f64 * qfac];
    let offset = [header.quatern_x as f64, header.quatern_y as f64, header.quatern_z as f64];

    let mut affine = IDENTITY_AFFINE;
    for (i, row) in rotation.iter().enumerate() {
        for (j, r) in row.iter().enumerate() {
            affine[i][j] = r * zooms[j];
        }
        affine[i][3] = offset[i];
    }
    affine
}

fn header_from_affine(affine: &[[f64; 4]; 4]) -> NiftiHeader {
    let row = |r: &[f64; 4]| [r[0] as f32, r[1] as f32, r[2] as f32, r[3] as f32];
    let mut header = NiftiHeader::default();
    header.sform_code = 2;
    header.srow_x = row(&affine[0]);
    header.srow_y = row(&affine[1]);
    header.srow_z = row(&affine[2]);
    for (i, axis) in affine.iter().take(3).enumerate() {
        header.pixdim[i + 1] = axis[..3].iter().map(|v| v * v).sum::<f64>().sqrt() as f32;
    }
    header
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use approx::assert_abs_diff_eq;
    use ndarray::IxDyn;

    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("whitestripe_io_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    fn ramp_volume() -> Volume {
        let data = ArrayD::from_shape_fn(IxDyn(&[4, 3, 2]), |idx| (idx[0] * 6 + idx[1] * 2 + idx[2]) as f64 * 1.5);
        let mut meta = VolumeMeta::default();
        meta.affine = [[2.0, 0.0, 0.0, -10.0], [0.0, 2.0, 0.0, 20.0], [0.0, 0.0, 3.0, 5.0], [0.0, 0.0, 0.0, 1.0]];
        Volume::new(data, meta)
    }

    #[test]
    fn test_nifti_names() {
        assert!(is_nifti(Path::new("/data/subj01_T1.nii.gz")));
        assert!(is_nifti(Path::new("mask.NII")));
        assert!(!is_nifti(Path::new("notes.txt")));
        assert_eq!(
            split_nifti_name(Path::new("/data/subj01_T1.nii.gz")),
            ("subj01_T1".to_string(), ".nii.gz".to_string())
        );
        assert_eq!(split_nifti_name(Path::new("a.nii")), ("a".to_string(), ".nii".to_string()));
    }

    #[test]
    fn test_affine_from_pixdim() {
        let mut header = NiftiHeader::default();
        header.pixdim[1] = 1.0;
        header.pixdim[2] = 2.0;
        header.pixdim[3] = 3.0;
        header.sform_code = 0;

        let affine = affine_from_header(&header);
        assert_eq!(affine[0][0], 1.0);
        assert_eq!(affine[1][1], 2.0);
        assert_eq!(affine[2][2], 3.0);
    }

    #[test]
    fn test_affine_from_qform() {
        let mut header = NiftiHeader::default();
        header.qform_code = 1;
        header.pixdim = [1.0, 2.0, 3.0, 4.0, 0.0, 0.0, 0.0, 0.0];
        header.quatern_x = 10.0;
        header.quatern_y = 20.0;
        header.quatern_z = 30.0;
        let affine = affine_from_header(&header);
        assert_eq!(affine, [[2.0, 0.0, 0.0, 10.0], [0.0, 3.0, 0.0, 20.0], [0.0, 0.0, 4.0, 30.0], [0.0, 0.0, 0.0, 1.0]]);

        // 90 degrees about z, left-handed
        header.quatern_d = std::f32::consts::FRAC_1_SQRT_2;
        header.pixdim[0] = -1.0;
        let affine = affine_from_header(&header);
        let expected = [[0.0, -3.0, 0.0, 10.0], [2.0, 0.0, 0.0, 20.0], [0.0, 0.0, -4.0, 30.0], [0.0, 0.0, 0.0, 1.0]];
        for (row, want) in affine.iter().zip(expected.iter()) {
            for (v, w) in row.iter().zip(want.iter()) {
                assert_abs_diff_eq!(*v, *w, epsilon = 1e-6);
            }
        }

        // sform still wins
        header.sform_code = 2;
        header.srow_x = [1.0, 0.0, 0.0, -5.0];
        header.srow_y = [0.0, 1.0, 0.0, 0.0];
        header.srow_z = [0.0, 0.0, 1.0, 0.0];
        assert_eq!(affine_from_header(&header)[0], [1.0, 0.0, 0.0, -5.0]);
    }

    #[test]
    fn test_save_and_load_gz() {
        let volume = ramp_volume();
        let path = temp_path("ramp.nii.gz");
        save_volume(&volume, &path).unwrap();

        let loaded = load_volume(&path).unwrap();
        assert_eq!(loaded.shape(), volume.shape());
        for (a, b) in loaded.data.iter().zip(volume.data.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-5);
        }
        assert_eq!(loaded.meta.affine, volume.meta.affine);

        // header of the loaded file is reused on the next write
        let again = temp_path("ramp_again.nii");
        save_volume(&loaded, &again).unwrap();
        let reloaded = load_volume(&again).unwrap();
        assert_eq!(reloaded.meta.affine, volume.meta.affine);
        assert_eq!(reloaded.meta.header.unwrap().pixdim[..4], loaded.meta.header.unwrap().pixdim[..4]);
    }

    #[test]
    fn test_load_mask_binarises() {
        let path = temp_path("mask.nii");
        save_volume(&ramp_volume(), &path).unwrap();
        let mask = load_mask(&path).unwrap();
        assert!(!mask[[0, 0, 0]]);
        assert!(mask[[3, 2, 1]]);
        assert_eq!(mask.iter().filter(|&&m| m).count(), 23);
    }

    #[test]
    fn test_missing_file() {
        let result = load_volume(Path::new("/nonexistent/subj.nii.gz"));
        assert!(matches!(result, Err(Error::ReadVolume { .. })));
    }
}
