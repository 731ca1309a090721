use std::path::Path;

use plotters::prelude::{
    AreaSeries, BitMapBackend, ChartBuilder, Color, IntoDrawingArea, LineSeries, PathElement, BLACK, BLUE, GREEN, RED,
    WHITE,
};

use crate::error::{Error, Result};
use crate::histogram::Histogram;
use crate::mode::TissueMode;
use crate::stripe::Stripe;

fn plot_err(e: impl std::fmt::Display) -> Error {
    Error::Plot(e.to_string())
}

/// Raw voxel-of-interest histogram, the smoothed curve the mode was read
/// from, the mode and the stripe thresholds, as a PNG.
pub fn plot_histogram(path: &Path, hist: &Histogram, mode: &TissueMode, stripe: Option<&Stripe>) -> Result<()> {
    let width = 1600;
    let height = 1000;
    if hist.is_empty() {
        return Err(Error::Plot("empty histogram".into()));
    }
    let x_min = hist.bin_centers[0] - hist.bin_width / 2.0;
    let x_max = hist.bin_centers[hist.len() - 1] + hist.bin_width / 2.0;
    let y_max = hist
        .counts
        .iter()
        .map(|&c| c as f64)
        .chain(mode.smoothed.iter().copied())
        .fold(1.0f64, f64::max)
        * 1.05;

    let root = BitMapBackend::new(path, (width, height)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(20i32)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, 0.0..y_max)
        .map_err(plot_err)?;

    chart.configure_mesh().x_desc("intensity").y_desc("count").draw().map_err(plot_err)?;

    chart
        .draw_series(
            AreaSeries::new(
                hist.bin_centers.iter().zip(hist.counts.iter()).map(|(&x, &c)| (x, c as f64)),
                0.0,
                RED.mix(0.2),
            )
            .border_style(BLUE),
        )
        .map_err(plot_err)?;

    chart
        .draw_series(LineSeries::new(
            mode.bin_centers.iter().copied().zip(mode.smoothed.iter().copied()),
            BLACK.stroke_width(2),
        ))
        .map_err(plot_err)?;

    let mut markers = vec![(mode.value, GREEN.stroke_width(2))];
    if let Some(stripe) = stripe {
        markers.push((stripe.lower, GREEN.mix(0.5).stroke_width(1)));
        markers.push((stripe.upper, GREEN.mix(0.5).stroke_width(1)));
    }
    chart
        .draw_series(markers.into_iter().map(|(x, style)| PathElement::new(vec![(x, 0.0), (x, y_max)], style)))
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    Ok(())
}
