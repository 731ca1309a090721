use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Histogram smoothing failed: {0}")]
    Fitting(String),

    #[error("No tissue peak found: {0}")]
    PeakNotFound(String),

    #[error("White stripe is empty: no voxel strictly inside ({lower}, {upper})")]
    EmptyStripe { lower: f64, upper: f64 },

    #[error("White stripe has zero spread (mean {location}, std {scale})")]
    DegenerateScale { location: f64, scale: f64 },

    #[error("No voxels of interest: mask and foreground do not overlap")]
    NoVoxelsOfInterest,

    #[error("Shape mismatch: image {image:?}, mask {mask:?}")]
    ShapeMismatch { image: Vec<usize>, mask: Vec<usize> },

    #[error("Failed to read volume '{path}': {source}")]
    ReadVolume {
        path: PathBuf,
        #[source]
        source: nifti::NiftiError,
    },

    #[error("Failed to write volume '{path}': {source}")]
    WriteVolume {
        path: PathBuf,
        #[source]
        source: nifti::NiftiError,
    },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Histogram plot failed: {0}")]
    Plot(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stripe_message_has_bounds() {
        let err = Error::EmptyStripe { lower: 98.5, upper: 101.25 };
        let msg = err.to_string();
        assert!(msg.contains("98.5"));
        assert!(msg.contains("101.25"));
    }

    #[test]
    fn test_io_error_keeps_path_and_source() {
        let err = Error::Io {
            path: PathBuf::from("/data/t1/subj01.nii.gz"),
            source: io::Error::new(io::ErrorKind::NotFound, "file not found"),
        };
        assert!(err.to_string().contains("/data/t1/subj01.nii.gz"));
        assert!(err.to_string().contains("file not found"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_shape_mismatch_message() {
        let err = Error::ShapeMismatch { image: vec![10, 10, 10], mask: vec![10, 10, 9] };
        assert_eq!(err.to_string(), "Shape mismatch: image [10, 10, 10], mask [10, 10, 9]");
    }
}
