use std::path::PathBuf;

use clap::Parser;
use ndarray::{ArrayD, IxDyn};

use whitestripe::batch::ensure_dir;
use whitestripe::nifti_io::save_volume;
use whitestripe::phantom::{phantom, TissueClass};
use whitestripe::{Result, Volume};

/// Writes a synthetic T1-like brain volume (CSF, grey and white matter
/// over a zero background) and an all-ones mask for trying the pipeline.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Parameters {
    ///Output directory
    #[arg(long)]
    output: PathBuf,
    ///Volume edge length in voxels
    #[arg(long, default_value_t = 64)]
    size: usize,
    #[arg(long, default_value_t = 0.3)]
    background: f64,
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn run(params: &Parameters) -> Result<()> {
    let tissues = [
        TissueClass { mean: 30.0, std: 6.0, weight: 0.15 },
        TissueClass { mean: 70.0, std: 7.0, weight: 0.4 },
        TissueClass { mean: 110.0, std: 6.0, weight: 0.45 },
    ];
    let shape = [params.size; 3];
    let volume = phantom(&shape, params.background, &tissues, 3.0, params.seed)?;
    let mask = Volume::from_data(ArrayD::from_elem(IxDyn(&shape), 1.0));

    ensure_dir(&params.output)?;
    save_volume(&volume, &params.output.join("phantom_T1.nii.gz"))?;
    save_volume(&mask, &params.output.join("phantom_mask.nii.gz"))?;
    Ok(())
}

fn main() {
    let params = Parameters::parse();
    if let Err(e) = run(&params) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
