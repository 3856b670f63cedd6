use std::f64::consts::PI;

use faer::{Col, Mat};
use thiserror::Error;

use crate::model::{LikelihoodError, ProbabilityModel};

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum GaussianError {
    #[error("expected a point of dimension {expected}, got {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("covariance must be a {dim}x{dim} matrix, got {rows}x{cols}")]
    CovarianceShape { dim: usize, rows: usize, cols: usize },
    #[error("covariance is not symmetric at ({row}, {col})")]
    NotSymmetric { row: usize, col: usize },
    #[error("covariance is not positive definite")]
    NotPositiveDefinite,
}

impl LikelihoodError for GaussianError {
    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Multivariate normal distribution scored by its full negative log density,
/// normalising constant included.
///
/// The covariance is stored through its eigendecomposition `Σ = U S Uᵀ`, so
/// the quadratic form is `Σᵢ (Uᵀ(x − μ))ᵢ² / sᵢ`.
#[derive(Debug, Clone)]
pub struct GaussianModel {
    mean: Box<[f64]>,
    eigvecs: Mat<f64>,
    inv_eigvals: Col<f64>,
    log_normalizer: f64,
}

impl GaussianModel {
    /// A Gaussian with identity covariance.
    pub fn standard(mean: &[f64]) -> Self {
        let dim = mean.len();
        GaussianModel {
            mean: mean.into(),
            eigvecs: Mat::identity(dim, dim),
            inv_eigvals: Col::full(dim, 1f64),
            log_normalizer: 0.5 * (dim as f64) * (2. * PI).ln(),
        }
    }

    pub fn new(mean: &[f64], covariance: Mat<f64>) -> Result<Self, GaussianError> {
        let dim = mean.len();
        if covariance.nrows() != dim || covariance.ncols() != dim {
            return Err(GaussianError::CovarianceShape {
                dim,
                rows: covariance.nrows(),
                cols: covariance.ncols(),
            });
        }
        for row in 0..dim {
            for col in 0..row {
                let (a, b) = (covariance[(row, col)], covariance[(col, row)]);
                if (a - b).abs() > 1e-12 * a.abs().max(b.abs()).max(1.) {
                    return Err(GaussianError::NotSymmetric { row, col });
                }
            }
        }

        let eig = covariance
            .self_adjoint_eigen(faer::Side::Lower)
            .map_err(|_| GaussianError::NotPositiveDefinite)?;
        let eigvals = eig.S().column_vector().to_owned();
        let largest = eigvals.iter().copied().fold(0f64, f64::max);
        let cutoff = largest * f64::EPSILON * (dim as f64);
        if eigvals.iter().any(|val| !val.is_finite() || *val <= cutoff) {
            return Err(GaussianError::NotPositiveDefinite);
        }

        let log_det: f64 = eigvals.iter().map(|val| val.ln()).sum();
        let mut inv_eigvals = eigvals;
        inv_eigvals.iter_mut().for_each(|val| *val = val.recip());

        Ok(GaussianModel {
            mean: mean.into(),
            eigvecs: eig.U().to_owned(),
            inv_eigvals,
            log_normalizer: 0.5 * log_det + 0.5 * (dim as f64) * (2. * PI).ln(),
        })
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }
}

impl ProbabilityModel for GaussianModel {
    type Err = GaussianError;

    fn dim(&self) -> usize {
        self.mean.len()
    }

    fn negative_log_likelihood(&self, point: &[f64]) -> Result<f64, GaussianError> {
        if point.len() != self.dim() {
            return Err(GaussianError::DimensionMismatch {
                expected: self.dim(),
                found: point.len(),
            });
        }
        let diff = Col::from_fn(self.dim(), |i| point[i] - self.mean[i]);
        let proj = self.eigvecs.transpose() * diff.as_ref();
        let quad: f64 = proj
            .iter()
            .zip(self.inv_eigvals.iter())
            .map(|(p, inv)| p * p * inv)
            .sum();
        Ok(0.5 * quad + self.log_normalizer)
    }
}
