use itertools::{Itertools, MinMaxResult};
use log::debug;
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, ArrayView1};

use crate::error::{Error, Result};

const DEGREE: usize = 3;
const MAX_LOG_MEAN: f64 = 30.0;
const RIDGE: f64 = 1e-8;

/// Poisson P-spline fit settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SmootherConfig {
    /// Number of cubic B-spline basis functions
    pub n_splines: usize,
    /// Smoothing penalties tried, the one with the lowest UBRE score wins
    pub lambdas: Vec<f64>,
    pub max_iter: usize,
    /// Relative deviance change that ends IRLS
    pub tol: f64,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            n_splines: 20,
            lambdas: logspace(-3.0, 3.0, 11),
            max_iter: 100,
            tol: 1e-8,
        }
    }
}

pub fn logspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => vec![],
        1 => vec![10f64.powf(start)],
        _ => (0..num)
            .map(|i| 10f64.powf(start + (stop - start) * i as f64 / (num - 1) as f64))
            .collect(),
    }
}

/// Smooths histogram counts with a Poisson generalized additive model:
/// log(E[count]) is a penalized cubic spline of the bin position.
#[derive(Debug, Clone, Default)]
pub struct HistogramSmoother {
    config: SmootherConfig,
}

struct PenalizedFit {
    lambda: f64,
    mu: DVector<f64>,
    deviance: f64,
    edf: f64,
}

impl PenalizedFit {
    fn ubre(&self, n: usize) -> f64 {
        let n = n as f64;
        self.deviance / n + 2.0 * self.edf / n - 1.0
    }
}

impl HistogramSmoother {
    pub fn new(config: SmootherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SmootherConfig {
        &self.config
    }

    /// Fitted mean count at every bin center.
    pub fn smooth(&self, bin_centers: ArrayView1<f64>, counts: ArrayView1<u64>) -> Result<Array1<f64>> {
        let n = bin_centers.len();
        if counts.len() != n {
            return Err(Error::Fitting(format!("{} bin centers but {} counts", n, counts.len())));
        }
        if n < DEGREE + 1 {
            return Err(Error::Fitting(format!("{} bins are too few for a cubic spline fit", n)));
        }
        let (lo, hi) = match bin_centers.iter().minmax() {
            MinMaxResult::MinMax(lo, hi) if lo.is_finite() && hi.is_finite() && hi > lo => (*lo, *hi),
            _ => return Err(Error::Fitting("bin centers do not span a finite range".into())),
        };
        if counts.iter().all(|&c| c == 0) {
            return Err(Error::Fitting("all bin counts are zero".into()));
        }
        if counts.iter().all_equal() {
            return Err(Error::Fitting("bin counts are constant".into()));
        }

        let n_splines = self.config.n_splines.min(n);
        if n_splines < DEGREE + 1 {
            return Err(Error::Fitting(format!("{} basis functions are too few", n_splines)));
        }
        let scaled = bin_centers.mapv(|x| (x - lo) / (hi - lo));
        let basis = bspline_basis(scaled.view(), n_splines);
        let penalty = difference_penalty(n_splines);
        let y = DVector::from_iterator(n, counts.iter().map(|&c| c as f64));

        let mut best: Option<(f64, PenalizedFit)> = None;
        for &lambda in &self.config.lambdas {
            let Some(fit) = self.fit(&basis, &y, &penalty, lambda) else {
                debug!("lambda {:.3e}: IRLS did not converge", lambda);
                continue;
            };
            let score = fit.ubre(n);
            debug!(
                "lambda {:.3e}: deviance {:.4}, edf {:.2}, ubre {:.6}",
                lambda, fit.deviance, fit.edf, score
            );
            if best.as_ref().map_or(true, |(s, _)| score < *s) {
                best = Some((score, fit));
            }
        }

        let (score, fit) = best.ok_or_else(|| {
            Error::Fitting(format!("no smoothing penalty out of {} converged", self.config.lambdas.len()))
        })?;
        debug!("selected lambda {:.3e} (ubre {:.6}, edf {:.2})", fit.lambda, score, fit.edf);
        Ok(Array1::from_iter(fit.mu.iter().copied()))
    }

    // Penalized IRLS for a log-link Poisson model
    fn fit(&self, basis: &DMatrix<f64>, y: &DVector<f64>, penalty: &DMatrix<f64>, lambda: f64) -> Option<PenalizedFit> {
        let n = y.len();
        let k = basis.ncols();
        let regularizer = penalty * lambda + DMatrix::identity(k, k) * RIDGE;

        let mut mu = y.map(|v| v + 0.1);
        let mut eta = mu.map(f64::ln);
        let mut deviance_old = f64::INFINITY;

        for iter in 0..self.config.max_iter {
            let z = DVector::from_fn(n, |i, _| eta[i] + (y[i] - mu[i]) / mu[i]);
            let weighted = DMatrix::from_fn(n, k, |i, j| basis[(i, j)] * mu[i]);
            let lhs = basis.tr_mul(&weighted) + &regularizer;
            let rhs = basis.tr_mul(&mu.component_mul(&z));
            let beta = lhs.cholesky()?.solve(&rhs);

            eta = (basis * beta).map(|e| e.clamp(-MAX_LOG_MEAN, MAX_LOG_MEAN));
            mu = eta.map(f64::exp);
            let deviance = poisson_deviance(y, &mu);
            if !deviance.is_finite() {
                return None;
            }
            if (deviance_old - deviance).abs() <= self.config.tol * (deviance.abs() + 0.1) {
                let edf = effective_dof(basis, &mu, &regularizer)?;
                debug!("lambda {:.3e}: converged after {} iterations", lambda, iter + 1);
                return Some(PenalizedFit { lambda, mu, deviance, edf });
            }
            deviance_old = deviance;
        }
        None
    }
}

// trace of the influence matrix at the converged weights
fn effective_dof(basis: &DMatrix<f64>, mu: &DVector<f64>, regularizer: &DMatrix<f64>) -> Option<f64> {
    let weighted = DMatrix::from_fn(basis.nrows(), basis.ncols(), |i, j| basis[(i, j)] * mu[i]);
    let gram = basis.tr_mul(&weighted);
    let inverse = (&gram + regularizer).cholesky()?.inverse();
    Some((inverse * gram).trace())
}

fn poisson_deviance(y: &DVector<f64>, mu: &DVector<f64>) -> f64 {
    2.0 * y
        .iter()
        .zip(mu.iter())
        .map(|(&y, &m)| {
            let log_ratio = if y > 0.0 { y * (y / m).ln() } else { 0.0 };
            log_ratio - (y - m)
        })
        .sum::<f64>()
}

/// Cubic B-spline design matrix on uniform knots over [0, 1].
pub(crate) fn bspline_basis(x: ArrayView1<f64>, n_splines: usize) -> DMatrix<f64> {
    let n_intervals = n_splines - DEGREE;
    let step = 1.0 / n_intervals as f64;
    let knot = |j: usize| (j as f64 - DEGREE as f64) * step;

    let mut basis = DMatrix::zeros(x.len(), n_splines);
    for (row, &u) in x.iter().enumerate() {
        let u = u.clamp(0.0, 1.0);
        let span = ((u / step) as usize).min(n_intervals - 1) + DEGREE;
        let values = basis_funs(span, u, knot);
        for (r, v) in values.iter().enumerate() {
            basis[(row, span - DEGREE + r)] = *v;
        }
    }
    basis
}

// Cox-de Boor recursion for the DEGREE + 1 functions that are non-zero on `span`
fn basis_funs(span: usize, u: f64, knot: impl Fn(usize) -> f64) -> [f64; DEGREE + 1] {
    let mut values = [0.0; DEGREE + 1];
    let mut left = [0.0; DEGREE + 1];
    let mut right = [0.0; DEGREE + 1];
    values[0] = 1.0;
    for j in 1..=DEGREE {
        left[j] = u - knot(span + 1 - j);
        right[j] = knot(span + j) - u;
        let mut saved = 0.0;
        for r in 0..j {
            let temp = values[r] / (right[r + 1] + left[j - r]);
            values[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        values[j] = saved;
    }
    values
}

/// D'D for the second-order difference operator D.
pub(crate) fn difference_penalty(k: usize) -> DMatrix<f64> {
    let d = DMatrix::from_fn(k - 2, k, |i, j| match j as isize - i as isize {
        0 | 2 => 1.0,
        1 => -2.0,
        _ => 0.0,
    });
    d.tr_mul(&d)
}
