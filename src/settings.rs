use std::{fs::File, io::BufReader, path::Path};

use faer::Mat;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    chain::SamplerError,
    gaussian::{GaussianError, GaussianModel},
    polytope::{Polytope, PolytopeError},
    proposal::GaussianProposal,
};

/// Settings for a single sampling call of the random-walk chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainSettings {
    /// The number of retained draws per call. Only the last one is kept.
    pub num_draws: u64,
    /// The number of proposals per retained draw.
    pub thinning: u64,
    /// Standard deviation of the isotropic Gaussian proposal.
    pub step_size: f64,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            num_draws: 1,
            thinning: 10,
            step_size: 0.2,
        }
    }
}

impl ChainSettings {
    pub fn validate(&self) -> Result<(), SamplerError> {
        if self.num_draws == 0 {
            return Err(SamplerError::InvalidSettings(
                "num_draws must be at least 1".into(),
            ));
        }
        if self.thinning == 0 {
            return Err(SamplerError::InvalidSettings(
                "thinning must be at least 1".into(),
            ));
        }
        if !(self.step_size.is_finite() && self.step_size > 0.) {
            return Err(SamplerError::InvalidSettings(format!(
                "step_size must be finite and positive, got {}",
                self.step_size
            )));
        }
        Ok(())
    }

    pub fn proposal(&self) -> GaussianProposal {
        GaussianProposal {
            step_size: self.step_size,
        }
    }
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read problem file")]
    Io(#[from] std::io::Error),
    #[error("could not parse problem file")]
    Parse(#[from] serde_json::Error),
    #[error("invalid constraints")]
    Polytope(#[from] PolytopeError),
    #[error("invalid base model")]
    Gaussian(#[from] GaussianError),
    #[error("{0}")]
    Shape(String),
    #[error("starting point {0:?} violates the constraints")]
    InfeasibleStart(Vec<f64>),
}

/// Problem geometry and base model, as read from a JSON problem file.
///
/// ```json
/// {
///   "constraints": [[1, 1, 1], [-1, 0, 0], [0, -1, 0], [0, 0, -1]],
///   "bounds": [1, 0, 0, 0],
///   "mean": [0, 0, 0],
///   "starting_point": [0, 0, 0]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProblemConfig {
    pub constraints: Vec<Vec<f64>>,
    pub bounds: Vec<f64>,
    pub mean: Vec<f64>,
    /// Identity when absent.
    #[serde(default)]
    pub covariance: Option<Vec<Vec<f64>>>,
    pub starting_point: Vec<f64>,
}

impl Default for ProblemConfig {
    /// The corner of the unit simplex in three dimensions with a standard
    /// normal base model, started at the origin.
    fn default() -> Self {
        Self {
            constraints: vec![
                vec![1., 1., 1.],
                vec![-1., 0., 0.],
                vec![0., -1., 0.],
                vec![0., 0., -1.],
            ],
            bounds: vec![1., 0., 0., 0.],
            mean: vec![0., 0., 0.],
            covariance: None,
            starting_point: vec![0., 0., 0.],
        }
    }
}

/// A validated problem, ready to be handed to the driver.
#[derive(Debug, Clone)]
pub struct Problem {
    pub region: Polytope,
    pub model: GaussianModel,
    pub starting_point: Box<[f64]>,
}

impl ProblemConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn build(&self) -> Result<Problem, ConfigError> {
        let region = Polytope::from_rows(&self.constraints, &self.bounds)?;
        let dim = region.dim();

        if self.mean.len() != dim {
            return Err(ConfigError::Shape(format!(
                "mean has {} entries, the constraints have {} columns",
                self.mean.len(),
                dim
            )));
        }
        if self.starting_point.len() != dim {
            return Err(ConfigError::Shape(format!(
                "starting point has {} entries, the constraints have {} columns",
                self.starting_point.len(),
                dim
            )));
        }

        let model = match &self.covariance {
            None => GaussianModel::standard(&self.mean),
            Some(rows) => {
                if rows.len() != dim || rows.iter().any(|row| row.len() != dim) {
                    return Err(ConfigError::Shape(format!(
                        "covariance must be a {dim}x{dim} matrix"
                    )));
                }
                let cov = Mat::from_fn(dim, dim, |i, j| rows[i][j]);
                GaussianModel::new(&self.mean, cov)?
            }
        };

        if !region.contains(&self.starting_point) {
            return Err(ConfigError::InfeasibleStart(self.starting_point.clone()));
        }

        Ok(Problem {
            region,
            model,
            starting_point: self.starting_point.clone().into(),
        })
    }
}
